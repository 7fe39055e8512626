//! Error taxonomy shared by every facade of the crate.
//!
//! The same five kinds travel through the in-process API, the C-ABI (as
//! one-byte status codes) and the wire protocol (as transport statuses).
//! Errors always propagate to the immediate caller; nothing in the library
//! panics on malformed input.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong inside the queue engine and its facades.
#[derive(Debug, Error)]
pub enum Error {
    /// Null pointers, empty required strings, duplicate handles, unknown
    /// backend tags and other caller mistakes.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No such queue or no such task ID.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate queue name.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Spawn, fork, I/O, persistence and channel failures.
    #[error("os error: {0}")]
    Os(String),

    /// A remote call exceeded its deadline.
    #[error("deadline exceeded: {0}")]
    Timeout(String),
}

/// Status codes surfaced over the C-ABI. Zero is success, everything else
/// identifies the error kind.
pub const STATUS_OK: u8 = 0;
pub const STATUS_INVALID_ARGUMENT: u8 = 1;
pub const STATUS_NOT_FOUND: u8 = 2;
pub const STATUS_ALREADY_EXISTS: u8 = 3;
pub const STATUS_OS_ERROR: u8 = 4;
pub const STATUS_TIMEOUT: u8 = 5;

impl Error {
    /// One-byte status code for the C-ABI.
    pub fn status(&self) -> u8 {
        match self {
            Error::InvalidArgument(_) => STATUS_INVALID_ARGUMENT,
            Error::NotFound(_) => STATUS_NOT_FOUND,
            Error::AlreadyExists(_) => STATUS_ALREADY_EXISTS,
            Error::Os(_) => STATUS_OS_ERROR,
            Error::Timeout(_) => STATUS_TIMEOUT,
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    pub fn os(msg: impl Into<String>) -> Self {
        Error::Os(msg.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Os(err.to_string())
    }
}

impl From<nix::errno::Errno> for Error {
    fn from(err: nix::errno::Errno) -> Self {
        Error::Os(err.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Os(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Os(err.to_string())
    }
}

/// Transport status carried inside wire error responses.
///
/// Client-side errors collapse onto these the way a gRPC mapping would:
/// invalid-argument and os-error both become `Internal`, not-found and
/// already-exists keep their identity, and a missed deadline is
/// `DeadlineExceeded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireStatus {
    Internal,
    NotFound,
    AlreadyExists,
    DeadlineExceeded,
}

impl From<&Error> for WireStatus {
    fn from(err: &Error) -> Self {
        match err {
            Error::InvalidArgument(_) | Error::Os(_) => WireStatus::Internal,
            Error::NotFound(_) => WireStatus::NotFound,
            Error::AlreadyExists(_) => WireStatus::AlreadyExists,
            Error::Timeout(_) => WireStatus::DeadlineExceeded,
        }
    }
}

impl WireStatus {
    /// Rebuild a library error from a wire status and message on the client.
    pub fn into_error(self, message: String) -> Error {
        match self {
            WireStatus::Internal => Error::Os(message),
            WireStatus::NotFound => Error::NotFound(message),
            WireStatus::AlreadyExists => Error::AlreadyExists(message),
            WireStatus::DeadlineExceeded => Error::Timeout(message),
        }
    }
}
