use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a tunnel command is already in progress")]
    Busy,

    #[error("tunnel is already connected")]
    AlreadyConnected,
}
