//! Client-side error type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorised client error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpError {
    pub kind: FtpErrorKind,
    pub message: String,
    /// FTP reply code that triggered the error, if any.
    pub code: Option<u16>,
    /// Remote path involved in the failing operation, if any.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FtpErrorKind {
    /// Connection descriptor does not match `scheme://[user[:pass]@]host[:port]`.
    InvalidFormat,
    /// Options / parameter validation error.
    InvalidConfig,
    /// TCP / DNS resolution failure.
    ConnectionFailed,
    /// Wrong username/password.
    AuthFailed,
    /// Operation attempted on a client that is not connected.
    NotConnected,
    /// File/directory not found on the server.
    NotFound,
    /// Permission denied on the server.
    PermissionDenied,
    /// Transfer aborted or incomplete.
    TransferFailed,
    /// Server sent an unexpected or un-parseable response.
    ProtocolError,
    /// An I/O error on the local side.
    IoError,
    /// Operation observed a cancellation request before it started.
    Cancelled,
    /// The backend does not support the requested feature.
    Unsupported,
    /// Catch-all.
    Unknown,
}

pub type FtpResult<T> = Result<T, FtpError>;

// ── Construction helpers ─────────────────────────────────────────────

impl FtpError {
    pub fn new(kind: FtpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            code: None,
            path: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::InvalidFormat, msg)
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::InvalidConfig, msg)
    }

    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::ConnectionFailed, msg)
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::AuthFailed, msg)
    }

    pub fn not_connected() -> Self {
        Self::new(FtpErrorKind::NotConnected, "Client is not connected")
    }

    pub fn not_found(path: &str) -> Self {
        Self::new(FtpErrorKind::NotFound, format!("'{}' not found", path)).with_path(path)
    }

    pub fn transfer_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::TransferFailed, msg)
    }

    pub fn protocol_error(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::ProtocolError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::IoError, msg)
    }

    pub fn cancelled() -> Self {
        Self::new(FtpErrorKind::Cancelled, "Operation cancelled")
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Unsupported, msg)
    }

    /// Classify an FTP reply code into the most appropriate error kind.
    pub fn from_reply(code: u16, text: &str) -> Self {
        let kind = match code {
            421 => FtpErrorKind::NotConnected,
            425 | 426 | 451 | 452 | 552 => FtpErrorKind::TransferFailed,
            430 | 530 => FtpErrorKind::AuthFailed,
            450 | 550 => {
                let lower = text.to_lowercase();
                if lower.contains("permission") || lower.contains("denied") {
                    FtpErrorKind::PermissionDenied
                } else {
                    FtpErrorKind::NotFound
                }
            }
            _ if code >= 400 => FtpErrorKind::ProtocolError,
            _ => FtpErrorKind::Unknown,
        };
        Self::new(kind, text).with_code(code)
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == FtpErrorKind::Cancelled
    }
}

impl fmt::Display for FtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, &self.path) {
            (Some(code), Some(path)) => {
                write!(f, "[FTP {:?} {}] {} ({})", self.kind, code, self.message, path)
            }
            (Some(code), None) => write!(f, "[FTP {:?} {}] {}", self.kind, code, self.message),
            (None, Some(path)) => write!(f, "[FTP {:?}] {} ({})", self.kind, self.message, path),
            (None, None) => write!(f, "[FTP {:?}] {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for FtpError {}

impl From<std::io::Error> for FtpError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Self::new(FtpErrorKind::NotFound, e.to_string()),
            std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted => Self::connection_failed(e.to_string()),
            _ => Self::io_error(e.to_string()),
        }
    }
}

impl From<FtpError> for String {
    fn from(e: FtpError) -> String {
        e.to_string()
    }
}
