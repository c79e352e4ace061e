mod config;
mod execution;
mod session;
mod system;

pub use config::ConfigurationError;
pub use execution::ExecutionError;
use serde::Serialize;
pub use session::SessionError;
pub use system::SystemError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    InputOutput(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    System(#[from] SystemError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl Error {
    /// Whether this failure should be shown to the user as text.
    ///
    /// Only command failures and invalid configuration are surfaced; the rest
    /// collapse into a state transition.
    pub fn is_user_visible(&self) -> bool {
        match self {
            Error::Configuration(ConfigurationError::ConfigInvalid { .. }) => true,
            Error::Execution(ExecutionError::Failed { .. } | ExecutionError::Spawn { .. }) => true,
            Error::InputOutput(_) => true,
            _ => false,
        }
    }
}

impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
