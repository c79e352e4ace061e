use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("elevation was not granted")]
    Denied { output: String },

    #[error("tunnel already exists: {output}")]
    AlreadyExists { output: String },

    #[error("command `{command}` failed: {output}")]
    Failed { command: String, output: String },

    #[error("failed to start `{command}`: {reason}")]
    Spawn { command: String, reason: String },
}

impl ExecutionError {
    /// Raw text reported by the failing command, when there is any.
    pub fn output(&self) -> &str {
        match self {
            ExecutionError::Denied { output }
            | ExecutionError::AlreadyExists { output }
            | ExecutionError::Failed { output, .. } => output,
            ExecutionError::Spawn { reason, .. } => reason,
        }
    }
}
