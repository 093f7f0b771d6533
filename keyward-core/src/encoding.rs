//! Conversion between caller strings and backend payload bytes.
//!
//! The canonical representation handed to a backend is the UTF-8 encoding of
//! the secret, byte for byte. Embedded NUL bytes are kept. Nothing here
//! adds or strips terminators; backends that null-terminate their storage
//! declare it through [`QuirkProfile`](crate::quirks::QuirkProfile).

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{CredentialError, Result};

/// Bytes of a secret on their way to or from a backend.
///
/// Zeroized when dropped.
pub type Payload = Zeroizing<Vec<u8>>;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the memory is wiped on drop.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume the secret and return the inner value.
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.0)
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Encode a secret string as backend payload bytes.
pub fn encode(secret: &str) -> Payload {
    Zeroizing::new(secret.as_bytes().to_vec())
}

/// Decode payload bytes read from a backend.
///
/// Fails with `BackendFailure` when the bytes are not valid UTF-8: this layer
/// only ever writes UTF-8, so anything else came from outside it.
pub fn decode(mut payload: Payload) -> Result<Secret> {
    let bytes = std::mem::take(&mut *payload);
    match String::from_utf8(bytes) {
        Ok(value) => Ok(Secret(value)),
        Err(err) => {
            let valid_up_to = err.utf8_error().valid_up_to();
            err.into_bytes().zeroize();
            Err(CredentialError::failure(format!(
                "stored payload is not valid UTF-8 (invalid byte at offset {})",
                valid_up_to
            )))
        }
    }
}

/// Whether the payload ends with a NUL byte.
pub fn ends_with_nul(payload: &[u8]) -> bool {
    payload.last() == Some(&0)
}

/// Remove exactly one trailing NUL byte, if present.
///
/// Returns whether a byte was removed.
pub fn absorb_trailing_nul(payload: &mut Vec<u8>) -> bool {
    if ends_with_nul(payload) {
        payload.pop();
        true
    } else {
        false
    }
}
