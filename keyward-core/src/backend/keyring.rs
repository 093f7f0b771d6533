//! OS keyring-backed credential storage implementation.

use async_trait::async_trait;
use keyring::Entry;
use keyring::credential::{CredentialBuilder, CredentialBuilderApi};
use parking_lot::Mutex;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::CredentialBackend;
use crate::encoding::Payload;
use crate::error::{CredentialError, IdentifierField, Result};
use crate::model::Identity;
use crate::quirks::{Platform, QuirkProfile, WINDOWS_MAX_PAYLOAD_BYTES};

/// Account name used to check that the keyring can be reached.
const PROBE_ACCOUNT: &str = "__probe__";

/// Native stand-in for an empty service or account name.
const EMPTY_FIELD: &str = "~";

/// Largest serialized account index shard (the Windows blob limit).
const INDEX_SHARD_BYTES: usize = WINDOWS_MAX_PAYLOAD_BYTES;

/// OS keyring-backed credential backend.
///
/// This backend uses the platform's native keyring service through the
/// `keyring` crate:
/// - macOS: Keychain
/// - Linux: Secret Service API (via D-Bus)
/// - Windows: Credential Manager
///
/// Secrets are written with `set_secret`, so payload bytes reach the native
/// facility unchanged and a trailing NUL survives on every platform.
///
/// # Entry Naming
///
/// Service and account map onto the native service and user fields. On
/// Windows the generic credential's target name is `{service}/{account}`.
/// The Keychain treats an empty attribute as a wildcard, so an empty name is
/// stored as `~` and a name that starts with `~` gets one more `~` in front.
///
/// # Enumeration
///
/// The `keyring` crate has no search API, so the backend keeps an account
/// index per service in the keyring itself: service `{namespace}.index`,
/// account = the indexed service, secret = JSON array of account names. An
/// index that outgrows one Windows blob spills into `{namespace}.index.1`,
/// `{namespace}.index.2`, and so on. Only credentials written through this
/// backend are enumerated.
///
/// Index updates are serialized within one backend (and every store sharing
/// it). Separate processes writing the same service can still race.
///
/// # Example
///
/// ```rust,ignore
/// use keyward_core::backend::{CredentialBackend, KeyringBackend};
/// use keyward_core::Identity;
///
/// let backend = KeyringBackend::try_new("keyward")?;
/// backend.write(&Identity::new("github", "octocat"), b"token").await?;
/// ```
pub struct KeyringBackend {
    native: Native,
    index: AccountIndex,
    profile: QuirkProfile,
    index_lock: Arc<Mutex<()>>,
}

impl KeyringBackend {
    /// Open the keyring, keeping bookkeeping entries under `namespace`.
    ///
    /// Returns `BackendUnavailable` if the native facility cannot be reached.
    pub fn try_new(namespace: &str) -> Result<Self> {
        let backend = Self::with_native(namespace, Native { builder: None });
        let probe = Identity::new(backend.index.base.as_str(), PROBE_ACCOUNT);

        let entry = backend.native.entry(&probe).map_err(|e| {
            CredentialError::unavailable(format!("keyring backend not available: {}", e))
        })?;
        match entry.get_secret() {
            Ok(_) | Err(keyring::Error::NoEntry) | Err(keyring::Error::Ambiguous(_)) => Ok(backend),
            Err(e) => Err(CredentialError::unavailable(format!(
                "keyring backend not available: {}",
                e
            ))),
        }
    }

    /// Store credentials through a caller-supplied `keyring` credential
    /// builder instead of the platform default.
    pub fn with_credential_builder(namespace: &str, builder: Box<CredentialBuilder>) -> Self {
        Self::with_native(
            namespace,
            Native {
                builder: Some(Arc::from(builder)),
            },
        )
    }

    fn with_native(namespace: &str, native: Native) -> Self {
        Self {
            index: AccountIndex {
                native: native.clone(),
                base: format!("{}.index", namespace),
            },
            native,
            profile: native_profile(),
            index_lock: Arc::new(Mutex::new(())),
        }
    }
}

impl std::fmt::Debug for KeyringBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringBackend")
            .field("index_service", &self.index.base)
            .field("platform", &self.profile.platform)
            .field("custom_builder", &self.native.builder.is_some())
            .finish()
    }
}

/// The host platform's limits. Every `keyring` facility stores secret bytes
/// as given, so none of them absorbs a trailing NUL.
fn native_profile() -> QuirkProfile {
    QuirkProfile {
        absorbs_trailing_nul: false,
        ..Platform::current().profile()
    }
}

fn native_name(name: &str) -> Cow<'_, str> {
    if name.is_empty() {
        Cow::Borrowed(EMPTY_FIELD)
    } else if name.starts_with(EMPTY_FIELD) {
        Cow::Owned(format!("{}{}", EMPTY_FIELD, name))
    } else {
        Cow::Borrowed(name)
    }
}

/// The identity as the native facility sees it.
fn native_identity(identity: &Identity) -> Identity {
    Identity::new(native_name(&identity.service), native_name(&identity.account))
}

#[cfg(target_os = "windows")]
fn native_target(target: &str) -> Option<&str> {
    Some(target)
}

#[cfg(not(target_os = "windows"))]
fn native_target(_target: &str) -> Option<&str> {
    None
}

/// Translate a native error, given what the failing call was doing.
///
/// Lengths are reported in UTF-8 bytes of the native names, the unit the
/// `keyring` crate checks.
fn map_error(
    err: keyring::Error,
    action: &str,
    identity: &Identity,
    payload_len: Option<usize>,
) -> CredentialError {
    match err {
        keyring::Error::NoStorageAccess(e) => {
            CredentialError::unavailable(format!("{} {}: {}", action, identity, e))
        }
        keyring::Error::Invalid(attr, reason) => {
            CredentialError::invalid(format!("{} {}: {}", attr, reason, identity))
        }
        keyring::Error::TooLong(attr, max) => {
            let max = max as usize;
            let native = native_identity(identity);
            if attr == "password" || attr == "secret" {
                CredentialError::PayloadTooLarge {
                    len: payload_len.unwrap_or(max + 1),
                    max,
                }
            } else if attr == "user" || attr == "username" {
                CredentialError::IdentifierTooLong {
                    field: IdentifierField::Account,
                    len: native.account.len(),
                    max,
                }
            } else {
                CredentialError::IdentifierTooLong {
                    field: IdentifierField::Target,
                    len: native.target().len(),
                    max,
                }
            }
        }
        keyring::Error::Ambiguous(creds) => CredentialError::failure(format!(
            "{} {}: {} native credentials match",
            action,
            identity,
            creds.len()
        )),
        keyring::Error::PlatformFailure(e) => {
            CredentialError::failure(format!("{} {}: platform keyring failure: {}", action, identity, e))
        }
        e => CredentialError::failure(format!("{} {}: {}", action, identity, e)),
    }
}

/// Blocking access to native entries.
#[derive(Clone)]
struct Native {
    builder: Option<Arc<CredentialBuilder>>,
}

impl Native {
    fn entry(&self, identity: &Identity) -> keyring::Result<Entry> {
        let native = native_identity(identity);
        let full_target = native.target();
        let target = native_target(&full_target);

        match &self.builder {
            Some(builder) => Ok(Entry::new_with_credential(builder.build(
                target,
                &native.service,
                &native.account,
            )?)),
            None => match target {
                Some(target) => Entry::new_with_target(target, &native.service, &native.account),
                None => Entry::new(&native.service, &native.account),
            },
        }
    }

    fn read(&self, identity: &Identity) -> Result<Option<Payload>> {
        let entry = self
            .entry(identity)
            .map_err(|e| map_error(e, "read", identity, None))?;
        match entry.get_secret() {
            Ok(bytes) => Ok(Some(Payload::new(bytes))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(map_error(e, "read", identity, None)),
        }
    }

    fn write(&self, identity: &Identity, payload: &[u8]) -> Result<()> {
        let entry = self
            .entry(identity)
            .map_err(|e| map_error(e, "write", identity, Some(payload.len())))?;
        entry
            .set_secret(payload)
            .map_err(|e| map_error(e, "write", identity, Some(payload.len())))
    }

    fn erase(&self, identity: &Identity) -> Result<bool> {
        let entry = self
            .entry(identity)
            .map_err(|e| map_error(e, "delete", identity, None))?;
        match entry.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(map_error(e, "delete", identity, None)),
        }
    }
}

/// The per-service account lists kept next to the credentials.
#[derive(Clone)]
struct AccountIndex {
    native: Native,
    base: String,
}

impl AccountIndex {
    fn shard(&self, service: &str, n: usize) -> Identity {
        if n == 0 {
            Identity::new(self.base.as_str(), service)
        } else {
            Identity::new(format!("{}.{}", self.base, n), service)
        }
    }

    /// Read every shard, stopping at the first missing one.
    fn load(&self, service: &str) -> Result<BTreeSet<String>> {
        let mut accounts = BTreeSet::new();
        for n in 0.. {
            let shard = self.shard(service, n);
            let Some(bytes) = self.native.read(&shard)? else {
                break;
            };
            let part: Vec<String> = serde_json::from_slice(&bytes).map_err(|e| {
                CredentialError::failure(format!("account index {} is corrupt: {}", shard, e))
            })?;
            accounts.extend(part);
        }
        Ok(accounts)
    }

    fn store(&self, service: &str, accounts: &BTreeSet<String>) -> Result<()> {
        let shards = shard_accounts(accounts, INDEX_SHARD_BYTES)?;
        for (n, bytes) in shards.iter().enumerate() {
            self.native.write(&self.shard(service, n), bytes)?;
        }

        // Drop shards left over from a larger index
        let mut n = shards.len();
        while self.native.erase(&self.shard(service, n))? {
            n += 1;
        }
        Ok(())
    }

    /// Load, edit, and store the index of `service`. `edit` returns whether
    /// it changed anything.
    fn update(
        &self,
        service: &str,
        edit: impl FnOnce(&mut BTreeSet<String>) -> bool,
    ) -> Result<()> {
        let mut accounts = self.load(service)?;
        if edit(&mut accounts) {
            self.store(service, &accounts)?;
        }
        Ok(())
    }
}

/// Split an account set into JSON arrays of at most `budget` bytes each.
///
/// An account too large for any shard still gets a shard of its own.
fn shard_accounts(accounts: &BTreeSet<String>, budget: usize) -> Result<Vec<Vec<u8>>> {
    let serialize_error =
        |e: serde_json::Error| CredentialError::failure(format!("failed to serialize account index: {}", e));

    let mut shards = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    // "[" and "]"
    let mut current_len = 2;

    for account in accounts {
        let len = serde_json::to_string(account).map_err(serialize_error)?.len();
        if !current.is_empty() && current_len + 1 + len > budget {
            shards.push(serde_json::to_vec(&current).map_err(serialize_error)?);
            current.clear();
            current_len = 2;
        }
        if !current.is_empty() {
            current_len += 1;
        }
        current_len += len;
        current.push(account.as_str());
    }
    if !current.is_empty() {
        shards.push(serde_json::to_vec(&current).map_err(serialize_error)?);
    }
    Ok(shards)
}

/// Run a blocking native call off the async runtime's worker threads.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CredentialError::failure(format!("keyring task failed: {}", e)))?
}

#[async_trait]
impl CredentialBackend for KeyringBackend {
    fn name(&self) -> &'static str {
        "keyring"
    }

    fn profile(&self) -> QuirkProfile {
        self.profile
    }

    async fn read(&self, identity: &Identity) -> Result<Option<Payload>> {
        let identity = identity.clone();
        let native = self.native.clone();
        blocking(move || native.read(&identity)).await
    }

    async fn write(&self, identity: &Identity, payload: &[u8]) -> Result<()> {
        let identity = identity.clone();
        let payload = Payload::new(payload.to_vec());
        let native = self.native.clone();
        let index = self.index.clone();
        let index_lock = Arc::clone(&self.index_lock);

        blocking(move || {
            let _guard = index_lock.lock();
            native.write(&identity, &payload)?;

            if let Err(e) = index.update(&identity.service, |accounts| {
                accounts.insert(identity.account.clone())
            }) {
                tracing::warn!(
                    service = %identity.service,
                    account = %identity.account,
                    error = %e,
                    "credential stored but the account index was not updated"
                );
            }
            Ok(())
        })
        .await
    }

    async fn erase(&self, identity: &Identity) -> Result<bool> {
        let identity = identity.clone();
        let native = self.native.clone();
        let index = self.index.clone();
        let index_lock = Arc::clone(&self.index_lock);

        blocking(move || {
            let _guard = index_lock.lock();
            let existed = native.erase(&identity)?;

            if let Err(e) = index.update(&identity.service, |accounts| {
                accounts.remove(&identity.account)
            }) {
                tracing::warn!(
                    service = %identity.service,
                    account = %identity.account,
                    error = %e,
                    "credential deleted but the account index was not updated"
                );
            }
            Ok(existed)
        })
        .await
    }

    async fn enumerate(&self, service: &str) -> Result<Vec<(String, Payload)>> {
        let service = service.to_string();
        let native = self.native.clone();
        let index = self.index.clone();
        let index_lock = Arc::clone(&self.index_lock);

        blocking(move || {
            let _guard = index_lock.lock();
            let accounts = index.load(&service)?;
            let mut found = Vec::with_capacity(accounts.len());
            for account in accounts {
                let identity = Identity::new(service.as_str(), account);
                match native.read(&identity)? {
                    Some(payload) => found.push((identity.account, payload)),
                    None => tracing::warn!(
                        service = %identity.service,
                        account = %identity.account,
                        "account index points at a missing credential"
                    ),
                }
            }
            Ok(found)
        })
        .await
    }
}
