//! Error types for the zkbackup library
//!
//! Every fallible operation returns [`Result<T>`]. The error type is a sum
//! type with one variant per failure category, so callers can match on the
//! broad class of a failure (I/O, corruption, bad user input, ...) without
//! string inspection. Each variant carries a message, an ordered chain of
//! key/value context pairs accumulated as the error propagates, and an
//! optional underlying cause.
//!
//! The rendered form is stable and greppable:
//!
//! ```text
//! [Corruption] checksum mismatch {path=/data/log.1, expected=12345, calculated=54321}
//! [IO] failed to open txnlog {path=/data/log.1}: No such file or directory (os error 2)
//! ```

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Type alias for Results in the zkbackup library
pub type Result<T> = std::result::Result<T, BackupError>;

/// Boxed error cause attached to a [`BackupError`]
pub type Cause = Box<dyn StdError + Send + Sync + 'static>;

/// Broad classification of a [`BackupError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// OS-level file or directory operation failed
    Io,
    /// Bad input supplied by the caller
    User,
    /// Live-service probe failed
    ZooKeeper,
    /// A logical cross-file check failed
    Validation,
    /// On-disk bytes violate the file format
    Corruption,
    /// Missing or invalid configuration values
    Configuration,
    /// Catch-all for errors that fit no other category
    Unknown,
}

impl ErrorCategory {
    /// Display name used in the rendered error string
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Io => "IO",
            ErrorCategory::User => "User",
            ErrorCategory::ZooKeeper => "ZooKeeper",
            ErrorCategory::Validation => "Validation",
            ErrorCategory::Corruption => "Corruption",
            ErrorCategory::Configuration => "Configuration",
            ErrorCategory::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message, ordered context chain and optional cause carried by every
/// [`BackupError`] variant.
///
/// Context pairs render in insertion order, so the innermost annotation
/// appears first.
#[derive(Debug, Default)]
pub struct ErrorDetail {
    message: String,
    context: Vec<(&'static str, String)>,
    cause: Option<Cause>,
}

impl ErrorDetail {
    fn new(message: impl Into<String>) -> Self {
        ErrorDetail {
            message: message.into(),
            context: Vec::new(),
            cause: None,
        }
    }

    /// The bare message, without context or cause
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Ordered context pairs attached so far
    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;

        if !self.context.is_empty() {
            f.write_str(" {")?;
            for (i, (key, value)) in self.context.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}={}", key, value)?;
            }
            f.write_str("}")?;
        }

        if let Some(cause) = &self.cause {
            write!(f, ": {}", cause)?;
        }

        Ok(())
    }
}

impl StdError for ErrorDetail {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_ref()
            .map(|c| c.as_ref() as &(dyn StdError + 'static))
    }
}

/// Main error type for all zkbackup operations
#[derive(Debug, Error)]
pub enum BackupError {
    /// I/O errors during file and directory operations
    #[error("[IO] {0}")]
    Io(#[source] ErrorDetail),

    /// Malformed input supplied by the caller (bad file name, empty filter result)
    #[error("[User] {0}")]
    User(#[source] ErrorDetail),

    /// Live ZooKeeper probe failures; never fatal for backup
    #[error("[ZooKeeper] {0}")]
    ZooKeeper(#[source] ErrorDetail),

    /// Logical cross-file checks that failed
    #[error("[Validation] {0}")]
    Validation(#[source] ErrorDetail),

    /// On-disk bytes that violate the log or snapshot format
    #[error("[Corruption] {0}")]
    Corruption(#[source] ErrorDetail),

    /// Missing or invalid CLI/configuration values
    #[error("[Configuration] {0}")]
    Configuration(#[source] ErrorDetail),
}

impl BackupError {
    /// Create an I/O error
    pub fn io(message: impl Into<String>) -> Self {
        BackupError::Io(ErrorDetail::new(message))
    }

    /// Create a user error
    pub fn user(message: impl Into<String>) -> Self {
        BackupError::User(ErrorDetail::new(message))
    }

    /// Create a ZooKeeper error
    pub fn zookeeper(message: impl Into<String>) -> Self {
        BackupError::ZooKeeper(ErrorDetail::new(message))
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        BackupError::Validation(ErrorDetail::new(message))
    }

    /// Create a corruption error
    pub fn corruption(message: impl Into<String>) -> Self {
        BackupError::Corruption(ErrorDetail::new(message))
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        BackupError::Configuration(ErrorDetail::new(message))
    }

    /// Append a key/value pair to the context chain
    pub fn with_context(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.detail_mut().context.push((key, value.to_string()));
        self
    }

    /// Attach the underlying cause
    pub fn with_source(mut self, cause: impl Into<Cause>) -> Self {
        self.detail_mut().cause = Some(cause.into());
        self
    }

    /// The category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            BackupError::Io(_) => ErrorCategory::Io,
            BackupError::User(_) => ErrorCategory::User,
            BackupError::ZooKeeper(_) => ErrorCategory::ZooKeeper,
            BackupError::Validation(_) => ErrorCategory::Validation,
            BackupError::Corruption(_) => ErrorCategory::Corruption,
            BackupError::Configuration(_) => ErrorCategory::Configuration,
        }
    }

    /// The message this error was created with, without context or cause
    pub fn message(&self) -> &str {
        self.detail().message()
    }

    /// Check if this error indicates on-disk corruption
    pub fn is_corruption(&self) -> bool {
        matches!(self, BackupError::Corruption(_))
    }

    /// Detail carried by the active variant
    pub fn detail(&self) -> &ErrorDetail {
        match self {
            BackupError::Io(d)
            | BackupError::User(d)
            | BackupError::ZooKeeper(d)
            | BackupError::Validation(d)
            | BackupError::Corruption(d)
            | BackupError::Configuration(d) => d,
        }
    }

    fn detail_mut(&mut self) -> &mut ErrorDetail {
        match self {
            BackupError::Io(d)
            | BackupError::User(d)
            | BackupError::ZooKeeper(d)
            | BackupError::Validation(d)
            | BackupError::Corruption(d)
            | BackupError::Configuration(d) => d,
        }
    }
}
