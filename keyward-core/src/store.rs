//! The credential store facade.
//!
//! [`CredentialStore`] is the only type callers need. It validates input,
//! encodes secrets, enforces the active backend's [`QuirkProfile`] limits, and
//! maps "not found" to ordinary return values. Payload bytes reach the backend
//! exactly as encoded:
//!
//! | Operation | Missing credential |
//! |---|---|
//! | [`get_password`](CredentialStore::get_password) | `Ok(None)` |
//! | [`delete_password`](CredentialStore::delete_password) | `Ok(false)` |
//! | [`find_password`](CredentialStore::find_password) | `Ok(None)` |
//! | [`find_credentials`](CredentialStore::find_credentials) | `Ok(vec![])` |
//!
//! # Example
//!
//! ```rust,ignore
//! use keyward_core::{BackendKind, CredentialStore};
//!
//! let store = CredentialStore::from_kind(BackendKind::Auto, "keyward")?;
//!
//! store.set_password("github", "octocat", Some("ghp_token")).await?;
//! let token = store.get_password("github", "octocat").await?;
//! assert_eq!(token.unwrap().expose(), "ghp_token");
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::backend::{BackendKind, CredentialBackend, create_backend};
use crate::encoding::{self, Secret};
use crate::error::{CredentialError, Result};
use crate::model::{CredentialRecord, FindQuery, Identity};
use crate::quirks::QuirkProfile;

/// Store and retrieve secrets through one native backend.
///
/// The backend and its quirk profile are fixed at construction. Every call is
/// a fresh round trip; nothing is cached. Cloning is cheap and clones share
/// the backend, so one store can be handed to many concurrent callers.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn CredentialBackend>,
    profile: QuirkProfile,
}

impl CredentialStore {
    /// Create a store over an already constructed backend.
    pub fn new(backend: impl CredentialBackend + 'static) -> Self {
        Self::from_arc(Arc::new(backend))
    }

    /// Create a store over a shared backend.
    pub fn from_arc(backend: Arc<dyn CredentialBackend>) -> Self {
        let profile = backend.profile();
        Self { backend, profile }
    }

    /// Select and open a backend, then wrap it in a store.
    ///
    /// See [`create_backend`] for the selection rules.
    pub fn from_kind(kind: BackendKind, namespace: &str) -> Result<Self> {
        let backend: Arc<dyn CredentialBackend> = create_backend(kind, namespace)?.into();
        Ok(Self::from_arc(backend))
    }

    /// Name of the active backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Quirk profile of the active backend.
    pub fn profile(&self) -> QuirkProfile {
        self.profile
    }

    fn identity(&self, service: &str, account: &str) -> Result<Identity> {
        let identity = Identity::new(service, account);
        identity.validate()?;
        self.profile.check_identity(&identity)?;
        Ok(identity)
    }

    /// Store a password, overwriting any existing one for the same identity.
    ///
    /// An absent password is rejected with `InvalidArgument`; it is never
    /// stored as an empty string.
    pub async fn set_password(
        &self,
        service: &str,
        account: &str,
        password: Option<&str>,
    ) -> Result<()> {
        let password = password.ok_or_else(|| {
            CredentialError::invalid(format!("password for {}/{} must be a string", service, account))
        })?;
        let identity = self.identity(service, account)?;

        let payload = encoding::encode(password);
        self.profile.check_payload(&payload)?;

        debug!(service, account, backend = self.backend.name(), "setting password");
        self.backend.write(&identity, &payload).await
    }

    /// Retrieve a password.
    ///
    /// Returns `Ok(None)` if no credential exists for the identity.
    pub async fn get_password(&self, service: &str, account: &str) -> Result<Option<Secret>> {
        let identity = self.identity(service, account)?;

        debug!(service, account, backend = self.backend.name(), "getting password");
        match self.backend.read(&identity).await? {
            Some(payload) => Ok(Some(encoding::decode(payload)?)),
            None => Ok(None),
        }
    }

    /// Delete a password.
    ///
    /// Returns whether a credential existed and was removed.
    pub async fn delete_password(&self, service: &str, account: &str) -> Result<bool> {
        let identity = self.identity(service, account)?;

        debug!(service, account, backend = self.backend.name(), "deleting password");
        let deleted = self.backend.erase(&identity).await?;
        if !deleted {
            debug!(service, account, "no credential to delete");
        }
        Ok(deleted)
    }

    /// Find a password by combined key.
    ///
    /// `service/account` (split at the first `/`) looks up that identity. A
    /// bare service name resolves only if the backend finds exactly one
    /// credential under it. Returns `Ok(None)` otherwise.
    pub async fn find_password(&self, key: &str) -> Result<Option<Secret>> {
        let query = FindQuery::parse(key);
        match &query {
            FindQuery::Exact(identity) => {
                identity.validate()?;
                self.profile.check_identity(identity)?;
            }
            FindQuery::Service(service) => {
                Identity::new(service.as_str(), "").validate()?;
            }
        }

        debug!(key, backend = self.backend.name(), "finding password");
        match self.backend.search(&query).await? {
            Some(payload) => Ok(Some(encoding::decode(payload)?)),
            None => Ok(None),
        }
    }

    /// List every credential stored under a service.
    ///
    /// Order is unspecified. Returns an empty vec for an unknown service.
    pub async fn find_credentials(&self, service: &str) -> Result<Vec<CredentialRecord>> {
        Identity::new(service, "").validate()?;

        debug!(service, backend = self.backend.name(), "enumerating credentials");
        let entries = self.backend.enumerate(service).await?;
        entries
            .into_iter()
            .map(|(account, payload)| {
                Ok(CredentialRecord {
                    account,
                    password: encoding::decode(payload)?,
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("backend", &self.backend)
            .field("profile", &self.profile)
            .finish()
    }
}
