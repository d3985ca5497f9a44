//! Error handling for Uroflow-RS
//!
//! Errors are split by the layer that raises them:
//!
//! - [`LinkError`] - serial device link faults (open, read, write)
//! - [`SessionError`] - refused session transitions
//! - [`ExportError`] - refused session exports
//!
//! All of them fold into [`UroflowError`], the crate-wide error type, so
//! callers can use `?` across layers. Protocol noise (malformed sample lines)
//! is deliberately *not* an error; see [`crate::session::decode`].

use thiserror::Error;

/// Faults on the serial device link
#[derive(Error, Debug)]
pub enum LinkError {
    /// The port could not be opened or claimed
    #[error("Failed to connect to {port}: {reason}")]
    ConnectFailed { port: String, reason: String },

    /// Any other OS-level fault on the link
    #[error("Unexpected link error: {0}")]
    Unexpected(String),

    /// An operation needed an open port
    #[error("Device link is not open")]
    NotOpen,

    /// Read/write failure on an open port
    #[error("Link I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LinkError {
    /// Classify a `serialport` open error
    pub fn from_open_error(port: &str, err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::NoDevice
            | serialport::ErrorKind::Io(std::io::ErrorKind::NotFound)
            | serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                LinkError::ConnectFailed {
                    port: port.to_string(),
                    reason: err.description,
                }
            }
            _ => LinkError::Unexpected(format!("{}: {}", port, err.description)),
        }
    }
}

impl From<serialport::Error> for LinkError {
    fn from(err: serialport::Error) -> Self {
        LinkError::Unexpected(err.description)
    }
}

/// Refused session state transitions
#[derive(Error, Debug)]
pub enum SessionError {
    /// Start was requested while the device link is closed
    #[error("Cannot start a session: device link is unavailable")]
    LinkUnavailable,

    /// The start byte could not be written
    #[error("Failed to send start command: {0}")]
    StartCommand(#[source] LinkError),
}

/// Refused session exports
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    /// No samples were captured
    #[error("Cannot export an empty session")]
    EmptySession,

    /// A required metadata field is blank
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A metadata field is out of range
    #[error("Invalid value for {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
}

/// Main error type for Uroflow-RS operations
#[derive(Error, Debug)]
pub enum UroflowError {
    /// Device link errors
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// Session transition errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Export errors
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication with the acquisition worker
    #[error("Channel error: {0}")]
    Channel(String),

    /// Measurement history errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Operator console input errors
    #[error("Command error: {0}")]
    Command(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<UroflowError>,
    },
}

impl UroflowError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        UroflowError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

impl From<serde_json::Error> for UroflowError {
    fn from(err: serde_json::Error) -> Self {
        UroflowError::Serialization(err.to_string())
    }
}

/// Result type alias for Uroflow-RS operations
pub type Result<T> = std::result::Result<T, UroflowError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<UroflowError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}
