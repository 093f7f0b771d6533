//! Error taxonomy for credential store operations.
//!
//! "Not found" is deliberately absent from this enum: a missing credential is
//! reported as `None`, `false`, or an empty list by the store operations.

use std::fmt;

use thiserror::Error;

/// Which identifier a length limit was exceeded on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierField {
    /// The combined `service/account` target name.
    Target,
    /// The account name on its own.
    Account,
}

impl fmt::Display for IdentifierField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Target => write!(f, "target name"),
            Self::Account => write!(f, "account name"),
        }
    }
}

/// Error type for credential store operations.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// An argument was absent or not representable by the backend.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The secret exceeds the backend's maximum blob size.
    #[error("payload too large: {len} bytes exceeds the backend maximum of {max}")]
    PayloadTooLarge { len: usize, max: usize },

    /// An identifier exceeds the backend's maximum length.
    #[error("{field} too long: {len} exceeds the backend maximum of {max}")]
    IdentifierTooLong {
        field: IdentifierField,
        len: usize,
        max: usize,
    },

    /// The native secure storage could not be reached or initialized.
    #[error("backend unavailable: {message}")]
    BackendUnavailable { message: String },

    /// The native call failed for a reason other than a missing entry.
    #[error("backend failure: {message}")]
    BackendFailure { message: String },
}

/// Fieldless view of [`CredentialError`] for matching on category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    PayloadTooLarge,
    IdentifierTooLong,
    BackendUnavailable,
    BackendFailure,
}

impl CredentialError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub(crate) fn failure(message: impl Into<String>) -> Self {
        Self::BackendFailure {
            message: message.into(),
        }
    }

    pub(crate) fn unavailable(message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            message: message.into(),
        }
    }

    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            Self::IdentifierTooLong { .. } => ErrorKind::IdentifierTooLong,
            Self::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            Self::BackendFailure { .. } => ErrorKind::BackendFailure,
        }
    }

    /// Whether the error was raised by validation, before any native call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidArgument | ErrorKind::PayloadTooLarge | ErrorKind::IdentifierTooLong
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CredentialError>;
