//! Core error types.

use std::fmt;
use std::path::PathBuf;

use crate::errors::MultiError;

/// Core errors for request/response handling.
#[derive(Debug)]
pub enum Error {
    /// I/O error (file open, stream write, body read).
    Io(std::io::Error),

    /// HTTP error.
    Http(http::Error),

    /// JSON encoding or decoding error.
    Json(serde_json::Error),

    /// The served path is a directory, not a file.
    IsDirectory(PathBuf),

    /// Redirect target is empty.
    InvalidUrl,

    /// A decoded structured response reported failure with errors.
    Api(MultiError),

    /// A decoded structured response reported failure without errors.
    Status(u16),

    /// Custom error with message.
    Custom(String),
}

impl Error {
    /// HTTP status to report when this error reaches the client unwritten.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound => 404,
            Error::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => 403,
            Error::IsDirectory(_) => 403,
            Error::InvalidUrl | Error::Json(_) => 400,
            Error::Status(code) if *code >= 400 => *code,
            _ => 500,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Http(e) => write!(f, "HTTP error: {}", e),
            Error::Json(e) => write!(f, "JSON error: {}", e),
            Error::IsDirectory(path) => write!(f, "file is a directory: {}", path.display()),
            Error::InvalidUrl => f.write_str("invalid redirect url"),
            Error::Api(errs) => write!(f, "{}", errs),
            Error::Status(code) => {
                let reason = http::StatusCode::from_u16(*code)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unknown Status");
                write!(f, "{}", reason)
            }
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Http(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Api(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<http::Error> for Error {
    fn from(e: http::Error) -> Self {
        Error::Http(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<MultiError> for Error {
    fn from(e: MultiError) -> Self {
        Error::Api(e)
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Custom(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Custom(msg.to_string())
    }
}

impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            other => std::io::Error::other(other),
        }
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
