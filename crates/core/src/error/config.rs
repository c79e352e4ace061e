use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("home directory not available")]
    HomeDirectoryNotAvailable,

    #[error("invalid WireGuard configuration: {reason}")]
    ConfigInvalid { reason: String },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("invalid file: {reason}")]
    InvalidFile { reason: String },

    #[error("profile not found: {id}")]
    ProfileNotFound { id: String },

    #[error("no tunnel profile selected")]
    NoProfileSelected,
}
