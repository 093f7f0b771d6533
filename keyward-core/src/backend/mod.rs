//! Native secure-storage backends.
//!
//! This module provides:
//! - [`CredentialBackend`] - Trait every storage backend implements
//! - [`MemoryBackend`] - In-memory implementation for testing
//! - [`KeyringBackend`] - OS keyring implementation (with `keyring-store` feature)
//! - [`BackendKind`] and [`create_backend`] - One-time backend selection at startup
//!
//! Backends see payloads as bytes. Validation, encoding, and limit checks
//! happen in [`CredentialStore`](crate::CredentialStore) before a backend is
//! called, so implementations only translate between the trait and the native
//! facility. Whatever the facility itself does to a payload (such as dropping
//! a trailing NUL) is the backend's business, never the store's.
//!
//! # Example
//!
//! ```rust,ignore
//! use keyward_core::backend::{BackendKind, create_backend};
//!
//! // Use the OS keyring, or memory if it cannot be opened
//! let backend = create_backend(BackendKind::Auto, "keyward")?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::encoding::Payload;
use crate::error::{CredentialError, Result};
use crate::model::{FindQuery, Identity};
use crate::quirks::QuirkProfile;

mod memory;
#[cfg(feature = "keyring-store")]
mod keyring;

pub use memory::MemoryBackend;
#[cfg(feature = "keyring-store")]
pub use keyring::KeyringBackend;

/// Abstraction over native secure-storage facilities.
///
/// Implementations include:
/// - [`MemoryBackend`] - In-memory storage for testing
/// - [`KeyringBackend`] (with `keyring-store` feature) - OS keyring
#[async_trait]
pub trait CredentialBackend: Send + Sync + fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Limits and storage behaviors of the native facility.
    fn profile(&self) -> QuirkProfile;

    /// Read the payload stored for an identity.
    ///
    /// Returns `Ok(None)` if no credential exists.
    async fn read(&self, identity: &Identity) -> Result<Option<Payload>>;

    /// Store a payload, overwriting any existing one.
    async fn write(&self, identity: &Identity, payload: &[u8]) -> Result<()>;

    /// Remove a credential.
    ///
    /// Returns `Ok(false)` if nothing was stored.
    async fn erase(&self, identity: &Identity) -> Result<bool>;

    /// List every account stored under a service with its payload.
    ///
    /// Returns an empty vec for an unknown service.
    async fn enumerate(&self, service: &str) -> Result<Vec<(String, Payload)>>;

    /// Resolve a combined search key to at most one payload.
    ///
    /// The default reads `service/account` keys directly. A bare service
    /// resolves only when exactly one account exists under it.
    async fn search(&self, query: &FindQuery) -> Result<Option<Payload>> {
        match query {
            FindQuery::Exact(identity) => self.read(identity).await,
            FindQuery::Service(service) => {
                let mut found = self.enumerate(service).await?;
                if found.len() == 1 {
                    Ok(found.pop().map(|(_, payload)| payload))
                } else {
                    tracing::debug!(
                        service = %service,
                        matches = found.len(),
                        "service search did not resolve to a single credential"
                    );
                    Ok(None)
                }
            }
        }
    }
}

/// Which backend to open at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The OS keyring, falling back to memory when it cannot be opened.
    #[default]
    Auto,
    /// The OS keyring; fail if it cannot be opened.
    Keyring,
    /// In-memory storage. Nothing persists.
    Memory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Keyring => "keyring",
            Self::Memory => "memory",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for BackendKind {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "keyring" => Ok(Self::Keyring),
            "memory" => Ok(Self::Memory),
            other => Err(CredentialError::invalid(format!(
                "unknown backend '{}' (expected auto, keyring, or memory)",
                other
            ))),
        }
    }
}

/// Open a backend of the requested kind.
///
/// `namespace` prefixes the bookkeeping entries the keyring backend keeps
/// alongside the credentials.
///
/// # Backend Selection Logic
///
/// - `Memory`: always a fresh [`MemoryBackend`]
/// - `Keyring`: a [`KeyringBackend`], or `BackendUnavailable`
/// - `Auto`: a [`KeyringBackend`] when it can be opened, else [`MemoryBackend`]
///   with a warning
pub fn create_backend(kind: BackendKind, namespace: &str) -> Result<Box<dyn CredentialBackend>> {
    match kind {
        BackendKind::Memory => {
            tracing::debug!("Using in-memory credential storage");
            Ok(Box::new(MemoryBackend::new()))
        }
        BackendKind::Keyring => open_keyring(namespace),
        BackendKind::Auto => match open_keyring(namespace) {
            Ok(backend) => Ok(backend),
            Err(e) => {
                tracing::warn!(
                    "Keyring unavailable ({}), falling back to memory storage. \
                     Credentials will not persist across restarts.",
                    e
                );
                Ok(Box::new(MemoryBackend::new()))
            }
        },
    }
}

#[cfg(feature = "keyring-store")]
fn open_keyring(namespace: &str) -> Result<Box<dyn CredentialBackend>> {
    let backend = KeyringBackend::try_new(namespace)?;
    tracing::info!(platform = %backend.profile().platform, "Using OS keyring for credential storage");
    Ok(Box::new(backend))
}

#[cfg(not(feature = "keyring-store"))]
fn open_keyring(_namespace: &str) -> Result<Box<dyn CredentialBackend>> {
    Err(CredentialError::unavailable(
        "keyring storage requested but the keyring-store feature is not enabled",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::encode;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("auto".parse::<BackendKind>().unwrap(), BackendKind::Auto);
        assert_eq!("Keyring".parse::<BackendKind>().unwrap(), BackendKind::Keyring);
        assert_eq!(" memory ".parse::<BackendKind>().unwrap(), BackendKind::Memory);
        assert!(matches!(
            "vault".parse::<BackendKind>(),
            Err(CredentialError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_backend_kind_display_roundtrip() {
        for kind in [BackendKind::Auto, BackendKind::Keyring, BackendKind::Memory] {
            assert_eq!(kind.to_string().parse::<BackendKind>().unwrap(), kind);
        }
    }

    #[tokio::test]
    async fn test_create_backend_memory() {
        let backend = create_backend(BackendKind::Memory, "keyward-test").unwrap();
        assert_eq!(backend.name(), "memory");

        let id = Identity::new("svc", "acct");
        backend.write(&id, b"value").await.unwrap();
        assert_eq!(backend.read(&id).await.unwrap().unwrap().as_slice(), b"value");
    }

    #[tokio::test]
    async fn test_create_backend_auto_always_succeeds() {
        // Either the keyring or the memory fallback, depending on the host.
        let backend = create_backend(BackendKind::Auto, "keyward-test").unwrap();
        assert!(["keyring", "memory"].contains(&backend.name()));
    }

    #[tokio::test]
    async fn test_default_search_service_requires_single_match() {
        let backend = MemoryBackend::new();
        let query = FindQuery::Service("svc".into());
        assert!(backend.search(&query).await.unwrap().is_none());

        backend.write(&Identity::new("svc", "one"), &encode("1")).await.unwrap();
        let found = backend.search(&query).await.unwrap().unwrap();
        assert_eq!(found.as_slice(), b"1");

        backend.write(&Identity::new("svc", "two"), &encode("2")).await.unwrap();
        assert!(backend.search(&query).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_default_search_exact() {
        let backend = MemoryBackend::new();
        backend.write(&Identity::new("svc", "a/b"), b"nested").await.unwrap();

        let found = backend.search(&FindQuery::parse("svc/a/b")).await.unwrap();
        assert_eq!(found.unwrap().as_slice(), b"nested");
        assert!(backend.search(&FindQuery::parse("svc/a")).await.unwrap().is_none());
    }
}
