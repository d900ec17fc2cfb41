use thiserror::Error;

/// Error that stops the task chain.
///
/// Tasks signal unrecoverable failures by returning this through `anyhow`;
/// the executor downcasts it back, records a critical finding attributed to
/// `task` (or "pipeline" when unset) and halts. Any other error type is
/// treated the same way but attributed to "pipeline".
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct FatalError {
    pub message: String,
    pub task: Option<String>,
}

impl FatalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            task: None,
        }
    }

    pub fn in_task(task: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            task: Some(task.to_string()),
        }
    }
}

/// Failure talking to a package registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The package or requested version does not exist.
    #[error("{0}")]
    NotFound(String),
    /// Transport-level failure: timeout, refused connection, DNS.
    #[error("{0}")]
    Network(String),
    /// Anything else: unexpected status codes, malformed responses.
    #[error("{0}")]
    Other(String),
}

/// Failure running an external CLI tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The binary is not installed or not on PATH.
    #[error("{0}")]
    NotFound(String),
    /// The tool ran but failed, timed out or produced unusable output.
    #[error("{0}")]
    Failed(String),
}
