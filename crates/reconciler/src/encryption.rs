//! Encryption intent for replication targets.
//!
//! Callers describe encryption with a handful of loosely related flags.
//! [`EncryptionOptions::resolve`] turns them into exactly one
//! [`EncryptionIntent`], rejecting contradictory combinations before any
//! remote call is made.

use std::fmt;

use serde::{Deserialize, Serialize};
use tiersync_core::{Error, Result};

pub(crate) const REDACTED: &str = "********";

/// Format of a target encryption key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyFormat {
    Hex,
    Passphrase,
}

/// Raw encryption flags as supplied in a policy.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EncryptionOptions {
    pub preserve_source_encryption: bool,
    pub target_encryption: bool,
    pub target_encryption_key: Option<String>,
    pub target_encryption_key_format: Option<KeyFormat>,
    pub target_encryption_inherit: bool,
}

impl Default for EncryptionOptions {
    fn default() -> Self {
        Self {
            preserve_source_encryption: true,
            target_encryption: false,
            target_encryption_key: None,
            target_encryption_key_format: None,
            target_encryption_inherit: false,
        }
    }
}

impl fmt::Debug for EncryptionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionOptions")
            .field("preserve_source_encryption", &self.preserve_source_encryption)
            .field("target_encryption", &self.target_encryption)
            .field(
                "target_encryption_key",
                &self.target_encryption_key.as_ref().map(|_| REDACTED),
            )
            .field(
                "target_encryption_key_format",
                &self.target_encryption_key_format,
            )
            .field("target_encryption_inherit", &self.target_encryption_inherit)
            .finish()
    }
}

impl EncryptionOptions {
    fn has_target_options(&self) -> bool {
        self.target_encryption
            || self.target_encryption_key.is_some()
            || self.target_encryption_key_format.is_some()
            || self.target_encryption_inherit
    }

    /// Resolve the flags into a single intent.
    ///
    /// Not preserving source encryption and not requesting target
    /// encryption leaves the target unencrypted, which emits the same
    /// settings as [`EncryptionIntent::PreserveSource`].
    ///
    /// # Errors
    ///
    /// [`Error::EncryptionConflict`] when target options accompany
    /// `preserve_source_encryption`, when target encryption names neither
    /// or both of a key and inheritance, or when a key has no format.
    pub fn resolve(&self) -> Result<EncryptionIntent> {
        if self.preserve_source_encryption {
            return if self.has_target_options() {
                Err(Error::encryption_conflict(
                    "cannot specify target_encryption options when preserve_source_encryption=true",
                ))
            } else {
                Ok(EncryptionIntent::PreserveSource)
            };
        }

        if !self.target_encryption {
            return if self.target_encryption_key.is_some() || self.target_encryption_inherit {
                Err(Error::encryption_conflict(
                    "target_encryption_key and target_encryption_inherit require target_encryption=true",
                ))
            } else {
                Ok(EncryptionIntent::PreserveSource)
            };
        }

        match (&self.target_encryption_key, self.target_encryption_inherit) {
            (Some(_), true) => Err(Error::encryption_conflict(
                "target_encryption_key and target_encryption_inherit are mutually exclusive",
            )),
            (None, false) => Err(Error::encryption_conflict(
                "target_encryption=true requires either target_encryption_key or target_encryption_inherit",
            )),
            (None, true) => Ok(EncryptionIntent::TargetInherit),
            (Some(key), false) => {
                let format = self.target_encryption_key_format.ok_or_else(|| {
                    Error::encryption_conflict(
                        "target_encryption_key requires target_encryption_key_format",
                    )
                })?;
                Ok(EncryptionIntent::TargetManagedKey {
                    key: key.clone(),
                    format,
                })
            }
        }
    }
}

/// How the replication target is encrypted.
#[derive(Clone, PartialEq, Eq)]
pub enum EncryptionIntent {
    /// Keep whatever encryption the source already has.
    PreserveSource,
    /// Encrypt the target with a key supplied by the caller.
    TargetManagedKey { key: String, format: KeyFormat },
    /// Inherit encryption from the target's parent dataset.
    TargetInherit,
}

impl fmt::Debug for EncryptionIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreserveSource => f.write_str("PreserveSource"),
            Self::TargetManagedKey { format, .. } => f
                .debug_struct("TargetManagedKey")
                .field("key", &REDACTED)
                .field("format", format)
                .finish(),
            Self::TargetInherit => f.write_str("TargetInherit"),
        }
    }
}

impl EncryptionIntent {
    /// Replication task attributes for this intent.
    pub fn settings(&self) -> EncryptionSettings {
        match self {
            Self::PreserveSource => EncryptionSettings::disabled(),
            Self::TargetManagedKey { key, format } => EncryptionSettings {
                encryption: true,
                encryption_key: Some(key.clone()),
                encryption_key_format: Some(*format),
                encryption_inherit: None,
            },
            Self::TargetInherit => EncryptionSettings {
                encryption: true,
                encryption_key: None,
                encryption_key_format: None,
                encryption_inherit: Some(true),
            },
        }
    }
}

/// Encryption attributes of a replication task.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct EncryptionSettings {
    pub encryption: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_key_format: Option<KeyFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_inherit: Option<bool>,
}

impl EncryptionSettings {
    /// No target-side encryption.
    pub const fn disabled() -> Self {
        Self {
            encryption: false,
            encryption_key: None,
            encryption_key_format: None,
            encryption_inherit: None,
        }
    }

    /// Copy with the key masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            encryption_key: self.encryption_key.as_ref().map(|_| REDACTED.to_string()),
            ..self.clone()
        }
    }
}

impl fmt::Debug for EncryptionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionSettings")
            .field("encryption", &self.encryption)
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| REDACTED),
            )
            .field("encryption_key_format", &self.encryption_key_format)
            .field("encryption_inherit", &self.encryption_inherit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    fn target(key: Option<&str>, format: Option<KeyFormat>, inherit: bool) -> EncryptionOptions {
        EncryptionOptions {
            preserve_source_encryption: false,
            target_encryption: true,
            target_encryption_key: key.map(String::from),
            target_encryption_key_format: format,
            target_encryption_inherit: inherit,
        }
    }

    #[test]
    fn test_default_preserves_source() {
        let intent = EncryptionOptions::default().resolve().unwrap();
        assert_eq!(intent, EncryptionIntent::PreserveSource);
        let value = serde_json::to_value(intent.settings()).unwrap();
        assert_eq!(value, json!({"encryption": false}));
    }

    #[test]
    fn test_preserve_with_target_options_conflicts() {
        let opts = EncryptionOptions {
            target_encryption_inherit: true,
            ..EncryptionOptions::default()
        };
        let err = opts.resolve().err().unwrap();
        assert!(err.is_validation());
    }

    #[test]
    fn test_managed_key_settings() {
        let intent = target(Some("abc123"), Some(KeyFormat::Hex), false)
            .resolve()
            .unwrap();
        let value = serde_json::to_value(intent.settings()).unwrap();
        assert_eq!(
            value,
            json!({"encryption": true, "encryption_key": "abc123", "encryption_key_format": "HEX"})
        );
    }

    #[test]
    fn test_inherit_settings() {
        let intent = target(None, None, true).resolve().unwrap();
        let value = serde_json::to_value(intent.settings()).unwrap();
        assert_eq!(value, json!({"encryption": true, "encryption_inherit": true}));
    }

    #[test]
    fn test_target_encryption_needs_exactly_one_source() {
        assert!(target(None, None, false).resolve().is_err());
        assert!(
            target(Some("k"), Some(KeyFormat::Passphrase), true)
                .resolve()
                .is_err()
        );
    }

    #[test]
    fn test_key_without_format_is_rejected() {
        assert!(target(Some("k"), None, false).resolve().is_err());
    }

    #[test]
    fn test_unencrypted_target_matches_preserve() {
        let opts = EncryptionOptions {
            preserve_source_encryption: false,
            ..EncryptionOptions::default()
        };
        assert_eq!(opts.resolve().unwrap(), EncryptionIntent::PreserveSource);
    }

    #[test]
    fn test_debug_never_prints_key() {
        let opts = target(Some("s3cret"), Some(KeyFormat::Passphrase), false);
        let intent = opts.resolve().unwrap();
        assert!(!format!("{opts:?}").contains("s3cret"));
        assert!(!format!("{intent:?}").contains("s3cret"));
        assert!(!format!("{:?}", intent.settings()).contains("s3cret"));
        assert_eq!(
            intent.settings().redacted().encryption_key.as_deref(),
            Some(REDACTED)
        );
    }
}
