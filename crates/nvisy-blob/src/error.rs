//! Structured error handling for blob task operations.

use strum::{AsRefStr, Display, IntoStaticStr};
use thiserror::Error;

/// Type alias for boxed dynamic errors that can be sent across threads.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Type alias for Results with our custom Error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Categories of errors that can occur in blob task operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or invalid local input (e.g. the source file does not exist).
    InvalidArgument,
    /// Unknown or unsupported text encoding name.
    Encoding,
    /// Destination file exists and the collision policy is `Error`.
    Collision,
    /// Failure surfaced by the blob store.
    Backend,
    /// The container or blob does not exist.
    NotFound,
    /// Local filesystem failure.
    Io,
    /// The operation was cancelled by the caller.
    Cancelled,
    /// Invalid provider or connection configuration.
    Configuration,
}

/// Structured error type with classification and an optional source.
#[must_use]
#[derive(Debug, Error)]
#[error("[{kind}]{}", message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Primary error message.
    pub message: Option<String>,
    /// Underlying source error, if any.
    #[source]
    pub source: Option<BoxedError>,
}

impl Error {
    /// Creates a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Adds a message to this error.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Adds a source error to this error.
    pub fn with_source(mut self, source: impl Into<BoxedError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument).with_message(message)
    }

    /// Creates a new encoding error naming the offending value.
    pub fn encoding(name: &str) -> Self {
        Self::new(ErrorKind::Encoding).with_message(format!(
            "encoding '{name}' is not supported, use e.g. utf-8, unicode, \
             bigendianunicode, utf-32 or ascii"
        ))
    }

    /// Creates a new collision error for an existing destination path.
    pub fn collision(path: impl std::fmt::Display) -> Self {
        Self::new(ErrorKind::Collision).with_message(format!(
            "file already exists in destination path {path}, delete the existing file \
             or change the file exists action to rename or overwrite"
        ))
    }

    /// Creates a new backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Backend).with_message(message)
    }

    /// Creates a new not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound).with_message(message)
    }

    /// Creates a new cancellation error.
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled).with_message("operation was cancelled")
    }

    /// Creates a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration).with_message(message)
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error kind as a string.
    pub fn kind_str(&self) -> &'static str {
        self.kind.into()
    }

    /// Wraps this error as a [`ErrorKind::Backend`] failure of `operation`.
    ///
    /// Local validation kinds (argument, encoding, collision, cancellation)
    /// pass through untouched so callers can still tell them apart.
    pub fn wrap_backend(self, operation: &str, message: &str) -> Self {
        match self.kind {
            ErrorKind::InvalidArgument
            | ErrorKind::Encoding
            | ErrorKind::Collision
            | ErrorKind::Cancelled => self,
            _ => Error::backend(format!("{operation}: {message}")).with_source(self),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io)
            .with_message(err.to_string())
            .with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = Error::invalid_argument("source file missing.txt does not exist");
        assert_eq!(
            err.to_string(),
            "[invalid_argument]: source file missing.txt does not exist"
        );
        assert_eq!(err.kind_str(), "invalid_argument");
    }

    #[test]
    fn wrap_backend_keeps_local_kinds() {
        let err = Error::encoding("utf-7").wrap_backend("upload_file", "upload failed");
        assert_eq!(err.kind(), ErrorKind::Encoding);

        let err = Error::not_found("blob").wrap_backend("upload_file", "upload failed");
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert!(std::error::Error::source(&err).is_some());
    }
}
