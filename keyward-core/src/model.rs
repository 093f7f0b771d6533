//! Domain model types for keyward.
//!
//! This module defines:
//! - [`Identity`] - The (service, account) pair addressing one credential
//! - [`CredentialRecord`] - An account/password pair returned by enumeration
//! - [`FindQuery`] - The parsed form of a combined `service/account` search key

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::encoding::Secret;
use crate::error::{CredentialError, Result};

/// Separator between service and account in combined keys and target names.
pub const TARGET_SEPARATOR: char = '/';

/// The composite key of a stored credential.
///
/// Both fields may be empty. Two identities are equal only when both fields
/// are exactly equal.
///
/// # Examples
///
/// ```
/// use keyward_core::Identity;
///
/// let id = Identity::new("github", "octocat");
/// assert_eq!(id.target(), "github/octocat");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    /// The service the credential belongs to.
    pub service: String,

    /// The account within the service.
    pub account: String,
}

impl Identity {
    /// Create a new identity.
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    /// The combined target identifier, `{service}/{account}`.
    pub fn target(&self) -> String {
        format!("{}{}{}", self.service, TARGET_SEPARATOR, self.account)
    }

    /// Reject fields the native facilities cannot represent.
    ///
    /// Every backend takes service and account as C strings, so an embedded
    /// NUL would silently truncate the key.
    pub fn validate(&self) -> Result<()> {
        if self.service.contains('\0') {
            return Err(CredentialError::invalid("service must not contain NUL characters"));
        }
        if self.account.contains('\0') {
            return Err(CredentialError::invalid("account must not contain NUL characters"));
        }
        Ok(())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.target())
    }
}

/// One credential returned when enumerating a service.
///
/// The service is not repeated here; enumeration is always scoped to one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// The account name.
    pub account: String,

    /// The stored secret.
    pub password: Secret,
}

/// A search key given to `find_password`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindQuery {
    /// `service/account`, split at the first separator.
    Exact(Identity),

    /// A bare service name.
    Service(String),
}

impl FindQuery {
    /// Parse a combined key.
    ///
    /// ```
    /// use keyward_core::{FindQuery, Identity};
    ///
    /// assert_eq!(
    ///     FindQuery::parse("mail/alice/work"),
    ///     FindQuery::Exact(Identity::new("mail", "alice/work")),
    /// );
    /// assert_eq!(FindQuery::parse("mail"), FindQuery::Service("mail".into()));
    /// ```
    pub fn parse(key: &str) -> Self {
        match key.split_once(TARGET_SEPARATOR) {
            Some((service, account)) => Self::Exact(Identity::new(service, account)),
            None => Self::Service(key.to_string()),
        }
    }
}
