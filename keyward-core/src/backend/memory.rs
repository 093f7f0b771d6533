//! In-memory credential backend.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::CredentialBackend;
use crate::encoding::{self, Payload};
use crate::error::Result;
use crate::model::Identity;
use crate::quirks::{Platform, QuirkProfile};

/// In-memory credential backend for testing and development.
///
/// This backend is not persistent; data is lost when the process exits.
/// Storage is binary-safe. By default it has no limits, but
/// [`emulating`](Self::emulating) gives it another platform's quirk profile so
/// the limits and trailing-NUL behavior of that platform can be exercised on
/// any host. An emulated null-terminating facility drops one trailing NUL on
/// write, as the real one does when it stores a C string.
///
/// # Thread Safety
///
/// This implementation uses interior mutability via `RwLock` and is
/// safe to share across threads.
pub struct MemoryBackend {
    data: RwLock<BTreeMap<Identity, Payload>>,
    profile: QuirkProfile,
}

impl MemoryBackend {
    /// Create a new empty memory backend without limits.
    pub fn new() -> Self {
        Self::emulating(Platform::Unrestricted)
    }

    /// Create an empty memory backend that reports `platform`'s quirk profile.
    pub fn emulating(platform: Platform) -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            profile: platform.profile(),
        }
    }

    /// Number of stored credentials across all services.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("credentials", &self.len())
            .field("platform", &self.profile.platform)
            .finish()
    }
}

#[async_trait]
impl CredentialBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn profile(&self) -> QuirkProfile {
        self.profile
    }

    async fn read(&self, identity: &Identity) -> Result<Option<Payload>> {
        Ok(self.data.read().get(identity).cloned())
    }

    async fn write(&self, identity: &Identity, payload: &[u8]) -> Result<()> {
        let mut stored = Payload::new(payload.to_vec());
        if self.profile.absorbs_trailing_nul && encoding::absorb_trailing_nul(&mut stored) {
            tracing::debug!(platform = %self.profile.platform, "absorbed trailing NUL byte");
        }
        self.data.write().insert(identity.clone(), stored);
        Ok(())
    }

    async fn erase(&self, identity: &Identity) -> Result<bool> {
        Ok(self.data.write().remove(identity).is_some())
    }

    async fn enumerate(&self, service: &str) -> Result<Vec<(String, Payload)>> {
        let data = self.data.read();
        Ok(data
            .iter()
            .filter(|(identity, _)| identity.service == service)
            .map(|(identity, payload)| (identity.account.clone(), payload.clone()))
            .collect())
    }
}
