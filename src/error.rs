//! Resolution errors.

use std::fmt;

/// Broad classification of a resolution failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The name, address or service does not exist.
    NotFound,
    /// The resolver signaled a transient condition; retrying later may succeed.
    TemporaryFailure,
    /// Malformed response, decode failure or unexpected backend fault.
    Internal,
    /// The request was cancelled before an outcome was obtained.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotFound => "not found",
            Self::TemporaryFailure => "temporary failure",
            Self::Internal => "internal error",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Errors surfaced by every lookup operation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// See [`ErrorKind::NotFound`].
    #[error("{0}")]
    NotFound(String),
    /// See [`ErrorKind::TemporaryFailure`].
    #[error("temporary failure: {0}")]
    TemporaryFailure(String),
    /// See [`ErrorKind::Internal`].
    #[error("internal error: {0}")]
    Internal(String),
    /// See [`ErrorKind::Cancelled`].
    #[error("operation was cancelled")]
    Cancelled,
}

impl Error {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::TemporaryFailure(_) => ErrorKind::TemporaryFailure,
            Self::Internal(_) => ErrorKind::Internal,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub(crate) fn internal(msg: impl fmt::Display) -> Self {
        Self::Internal(msg.to_string())
    }
}
