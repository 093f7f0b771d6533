//! Per-platform limits and storage behaviors.
//!
//! Every backend carries a [`QuirkProfile`]. The store consults it before each
//! native call so that over-length input fails with a typed error instead of
//! whatever the native facility would report.
//!
//! Trailing-NUL absorption is only described here. The backend that talks to
//! a null-terminating facility is the one that drops the byte; the store
//! never rewrites a payload.
//!
//! | Platform | Payload | Target | Account | Trailing NUL |
//! |---|---|---|---|---|
//! | Windows Credential Manager | 2560 bytes | 32767 | 512 | kept |
//! | macOS Keychain | - | - | - | kept |
//! | Secret Service (libsecret) | - | - | - | absorbed |
//!
//! Target and account lengths are counted in UTF-8 bytes, the unit the
//! `keyring` crate measures them in before calling the Windows credential API.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CredentialError, IdentifierField, Result};
use crate::model::Identity;

/// Maximum credential blob size of the Windows credential API.
pub const WINDOWS_MAX_PAYLOAD_BYTES: usize = 5 * 512;

/// Maximum generic target name length of the Windows credential API.
pub const WINDOWS_MAX_TARGET_LEN: usize = 32767;

/// Maximum user name length accepted for Windows credentials.
pub const WINDOWS_MAX_ACCOUNT_LEN: usize = 512;

/// The native secure-storage family a backend talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// macOS Keychain Services.
    MacOs,
    /// Windows Credential Manager.
    Windows,
    /// freedesktop.org Secret Service as seen through libsecret, which stores
    /// secrets as C strings.
    SecretService,
    /// No native limits; used by the in-memory backend.
    Unrestricted,
}

impl Platform {
    /// The secure-storage family of the host this binary was built for.
    pub const fn current() -> Self {
        if cfg!(target_os = "macos") || cfg!(target_os = "ios") {
            Self::MacOs
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(unix) {
            Self::SecretService
        } else {
            Self::Unrestricted
        }
    }

    /// The quirk profile of this platform.
    pub const fn profile(self) -> QuirkProfile {
        match self {
            Self::Windows => QuirkProfile {
                platform: self,
                max_payload_bytes: Some(WINDOWS_MAX_PAYLOAD_BYTES),
                max_target_len: Some(WINDOWS_MAX_TARGET_LEN),
                max_account_len: Some(WINDOWS_MAX_ACCOUNT_LEN),
                absorbs_trailing_nul: false,
            },
            Self::SecretService => QuirkProfile {
                platform: self,
                max_payload_bytes: None,
                max_target_len: None,
                max_account_len: None,
                absorbs_trailing_nul: true,
            },
            Self::MacOs | Self::Unrestricted => QuirkProfile {
                platform: self,
                max_payload_bytes: None,
                max_target_len: None,
                max_account_len: None,
                absorbs_trailing_nul: false,
            },
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MacOs => "macos",
            Self::Windows => "windows",
            Self::SecretService => "secret_service",
            Self::Unrestricted => "unrestricted",
        };
        write!(f, "{}", name)
    }
}

/// Limits and storage behaviors of one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuirkProfile {
    /// The platform this profile describes.
    pub platform: Platform,

    /// Largest payload, in bytes, the backend stores.
    pub max_payload_bytes: Option<usize>,

    /// Longest combined `service/account` target, in UTF-8 bytes.
    pub max_target_len: Option<usize>,

    /// Longest account name, in UTF-8 bytes.
    pub max_account_len: Option<usize>,

    /// The backend null-terminates stored secrets, so one trailing NUL
    /// supplied by the caller does not survive a round trip.
    pub absorbs_trailing_nul: bool,
}

impl Default for QuirkProfile {
    fn default() -> Self {
        Platform::Unrestricted.profile()
    }
}

impl QuirkProfile {
    /// Check identifier lengths. The target is checked before the account.
    pub fn check_identity(&self, identity: &Identity) -> Result<()> {
        if let Some(max) = self.max_target_len {
            // service + separator + account
            let len = identity.service.len() + 1 + identity.account.len();
            if len > max {
                return Err(CredentialError::IdentifierTooLong {
                    field: IdentifierField::Target,
                    len,
                    max,
                });
            }
        }
        if let Some(max) = self.max_account_len {
            let len = identity.account.len();
            if len > max {
                return Err(CredentialError::IdentifierTooLong {
                    field: IdentifierField::Account,
                    len,
                    max,
                });
            }
        }
        Ok(())
    }

    /// Check the payload size.
    pub fn check_payload(&self, payload: &[u8]) -> Result<()> {
        match self.max_payload_bytes {
            Some(max) if payload.len() > max => Err(CredentialError::PayloadTooLarge {
                len: payload.len(),
                max,
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_payload_limit() {
        let profile = Platform::Windows.profile();
        assert!(profile.check_payload(&vec![b'a'; WINDOWS_MAX_PAYLOAD_BYTES]).is_ok());

        let err = profile
            .check_payload(&vec![b'a'; WINDOWS_MAX_PAYLOAD_BYTES + 1])
            .unwrap_err();
        assert!(matches!(
            err,
            CredentialError::PayloadTooLarge { len: 2561, max: 2560 }
        ));
    }

    #[test]
    fn test_windows_account_limit() {
        let profile = Platform::Windows.profile();
        let ok = Identity::new("svc", "a".repeat(WINDOWS_MAX_ACCOUNT_LEN));
        assert!(profile.check_identity(&ok).is_ok());

        let long = Identity::new("svc", "a".repeat(WINDOWS_MAX_ACCOUNT_LEN + 1));
        let err = profile.check_identity(&long).unwrap_err();
        assert!(matches!(
            err,
            CredentialError::IdentifierTooLong {
                field: IdentifierField::Account,
                ..
            }
        ));
    }

    #[test]
    fn test_windows_target_limit_counts_separator() {
        let profile = Platform::Windows.profile();
        // service (32765) + "/" + account (1) = 32767
        let at_limit = Identity::new("s".repeat(WINDOWS_MAX_TARGET_LEN - 2), "a");
        assert!(profile.check_identity(&at_limit).is_ok());

        let over = Identity::new("s".repeat(WINDOWS_MAX_TARGET_LEN - 1), "a");
        let err = profile.check_identity(&over).unwrap_err();
        assert!(matches!(
            err,
            CredentialError::IdentifierTooLong {
                field: IdentifierField::Target,
                len: 32768,
                max: 32767,
            }
        ));
    }

    #[test]
    fn test_lengths_counted_in_utf8_bytes() {
        let profile = Platform::Windows.profile();
        // Each emoji is four UTF-8 bytes but only two UTF-16 code units.
        let account = "🌞".repeat(WINDOWS_MAX_ACCOUNT_LEN / 4);
        assert!(profile.check_identity(&Identity::new("svc", account)).is_ok());

        let account = "🌞".repeat(200);
        let err = profile.check_identity(&Identity::new("svc", account)).unwrap_err();
        assert!(matches!(
            err,
            CredentialError::IdentifierTooLong {
                field: IdentifierField::Account,
                len: 800,
                max: 512,
            }
        ));
    }

    #[test]
    fn test_unlimited_profiles_accept_everything() {
        for platform in [Platform::MacOs, Platform::SecretService, Platform::Unrestricted] {
            let profile = platform.profile();
            assert!(profile.check_payload(&vec![0u8; 1 << 20]).is_ok());
            let id = Identity::new("s".repeat(40_000), "a".repeat(40_000));
            assert!(profile.check_identity(&id).is_ok());
        }
    }
}
