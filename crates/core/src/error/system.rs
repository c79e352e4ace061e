use thiserror::Error;

#[derive(Debug, Error)]
pub enum SystemError {
    #[error("unsupported platform: {platform}")]
    UnsupportedPlatform { platform: String },

    #[error("mutex poisoned: {0}")]
    MutexPoisoned(String),
}
