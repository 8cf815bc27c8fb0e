//! Trigger-side errors.

use ftpwatch_client::FtpError;

pub type TriggerResult<T> = Result<T, TriggerError>;

/// Errors raised while binding or running a trigger.
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    /// Invalid settings, raised once at bind time.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The descriptor or registered connection could not be resolved.
    #[error("Connection setting is invalid: {0}")]
    Descriptor(#[source] FtpError),

    /// Connecting the listener's client failed at start.
    #[error("Unable to connect to the FTP server: {0}")]
    Connection(#[source] FtpError),

    /// A remote call made on behalf of a binding failed.
    #[error("FTP operation failed: {0}")]
    Remote(#[source] FtpError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Lifecycle call made in the wrong listener state.
    #[error("Listener is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
}

impl TriggerError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Failure reported by an executor for one dispatch.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Handler failed: {0}")]
    Handler(String),

    #[error("Dispatch cancelled")]
    Cancelled,

    #[error("Executor is closed")]
    Closed,
}
