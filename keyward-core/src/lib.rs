//! # Keyward Core
//!
//! One credential-store contract over the host's native secure storage.
//!
//! This crate provides:
//! - [`CredentialStore`] - get, set, delete, and find operations on secrets
//! - [`Identity`] - the (service, account) key of a credential
//! - [`QuirkProfile`] - the limits and storage behaviors of each platform
//! - In-memory and (optionally) keyring-based backends
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use keyward_core::{BackendKind, CredentialStore};
//!
//! async fn remember(token: &str) -> keyward_core::Result<()> {
//!     let store = CredentialStore::from_kind(BackendKind::Auto, "keyward")?;
//!     store.set_password("github", "octocat", Some(token)).await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod encoding;
pub mod error;
pub mod model;
pub mod quirks;
pub mod store;

// Re-export commonly used types at crate root
pub use model::{
    CredentialRecord,
    FindQuery,
    Identity,
};

pub use encoding::{
    Payload,
    Secret,
};

pub use backend::{
    BackendKind,
    CredentialBackend,
    MemoryBackend,
    create_backend,
};

#[cfg(feature = "keyring-store")]
pub use backend::KeyringBackend;

pub use error::{
    CredentialError,
    ErrorKind,
    IdentifierField,
    Result,
};

pub use quirks::{
    Platform,
    QuirkProfile,
};

pub use store::CredentialStore;
