//! Policy file loading.
//!
//! A policy file names the remote store and lists snapshot policies, push
//! replications and pull replications. Sections are parsed raw (tier names
//! as strings, signed counts) and validated into typed policies in one pass,
//! so a bad section fails the run before any remote call is made.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tiersync_core::{Error, PolicyState, Result, RetentionMap, TierCatalog};
use tiersync_reconciler::{
    EncryptionOptions, LocalReplicationPolicy, RemoteReplicationPolicy, SnapshotPolicy,
};
use url::Url;

/// Connection settings for the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// REST base URL, e.g. `https://nas.local/api/v2.0`.
    pub base_url: Url,

    /// Environment variable holding a bearer token.
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Per-request timeout.
    #[serde(rename = "timeout_secs", with = "duration_secs", default = "default_timeout")]
    pub timeout: Duration,

    /// Reject self-signed certificates.
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
}

const fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

const fn default_verify_tls() -> bool {
    true
}

/// Serialization helper for Duration as seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Snapshot tiers for one dataset, as written in the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotPolicySection {
    pub dataset: String,
    #[serde(default, alias = "snapshot_policy")]
    pub tiers: BTreeMap<String, i64>,
    pub recursive: bool,
    #[serde(default)]
    pub state: PolicyState,
}

impl SnapshotPolicySection {
    /// # Errors
    ///
    /// Unknown tiers, non-positive counts, or no tier on a present policy.
    pub fn to_policy(&self) -> Result<SnapshotPolicy> {
        let tiers = RetentionMap::from_raw(self.tiers.iter().map(|(k, v)| (k.as_str(), *v)))?;
        SnapshotPolicy::new(&self.dataset, tiers, self.recursive, self.state)
    }
}

/// Push replication between local datasets, as written in the file.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalReplicationSection {
    #[serde(default)]
    pub name: Option<String>,
    pub source_dataset: String,
    pub target_dataset: String,
    #[serde(default)]
    pub tiers: Vec<String>,
    pub recursive: bool,
    #[serde(default)]
    pub state: PolicyState,
    #[serde(flatten)]
    pub encryption: EncryptionOptions,
}

impl LocalReplicationSection {
    /// # Errors
    ///
    /// Unknown tiers or contradictory encryption options.
    pub fn to_policy(&self) -> Result<LocalReplicationPolicy> {
        let tiers = TierCatalog::validate(&self.tiers)?;
        let policy =
            LocalReplicationPolicy::new(&self.source_dataset, &self.target_dataset, tiers)
                .recursive(self.recursive)
                .with_encryption(self.encryption.resolve()?)
                .with_state(self.state);

        Ok(match &self.name {
            Some(name) => policy.with_name(name),
            None => policy,
        })
    }
}

/// Pull replication from a remote host over SSH, as written in the file.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteReplicationSection {
    #[serde(default)]
    pub name: Option<String>,
    pub source_dataset: String,
    /// Informational only; the connection is defined by the credentials.
    #[serde(default)]
    pub source_host: Option<String>,
    pub target_dataset: String,
    pub ssh_credentials_id: u64,
    #[serde(default)]
    pub tiers: BTreeMap<String, i64>,
    pub recursive: bool,
    #[serde(default)]
    pub state: PolicyState,
    #[serde(flatten)]
    pub encryption: EncryptionOptions,
}

impl RemoteReplicationSection {
    /// # Errors
    ///
    /// Unknown tiers, non-positive counts, no tier on a present policy, or
    /// contradictory encryption options.
    pub fn to_policy(&self) -> Result<RemoteReplicationPolicy> {
        let tiers = RetentionMap::from_raw(self.tiers.iter().map(|(k, v)| (k.as_str(), *v)))?;
        let tiers = match self.state {
            PolicyState::Present => tiers.require_non_empty()?,
            PolicyState::Absent => tiers,
        };

        let policy = RemoteReplicationPolicy::new(
            &self.source_dataset,
            &self.target_dataset,
            self.ssh_credentials_id,
            tiers,
        )
        .recursive(self.recursive)
        .with_encryption(self.encryption.resolve()?)
        .with_state(self.state);

        Ok(match &self.name {
            Some(name) => policy.with_name(name),
            None => policy,
        })
    }
}

/// Contents of a policy file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyFile {
    pub store: StoreConfig,
    #[serde(default)]
    pub snapshot_policies: Vec<SnapshotPolicySection>,
    #[serde(default)]
    pub local_replications: Vec<LocalReplicationSection>,
    #[serde(default)]
    pub remote_replications: Vec<RemoteReplicationSection>,
}

impl PolicyFile {
    /// Load a policy file; `.yaml`/`.yml` files are read as YAML, anything
    /// else as TOML.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {e}", path.display())))?;

        if path
            .extension()
            .is_some_and(|e| e == "yaml" || e == "yml")
        {
            Self::from_yaml_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// # Errors
    ///
    /// [`Error::Config`] on malformed TOML.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::config(format!("failed to parse policy file: {e}")))
    }

    /// # Errors
    ///
    /// [`Error::Config`] on malformed YAML.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::config(format!("failed to parse policy file: {e}")))
    }

    /// Validate every section into typed policies.
    ///
    /// # Errors
    ///
    /// The first section that fails validation.
    pub fn policies(&self) -> Result<Policies> {
        Ok(Policies {
            snapshots: self
                .snapshot_policies
                .iter()
                .map(SnapshotPolicySection::to_policy)
                .collect::<Result<_>>()?,
            local_replications: self
                .local_replications
                .iter()
                .map(LocalReplicationSection::to_policy)
                .collect::<Result<_>>()?,
            remote_replications: self
                .remote_replications
                .iter()
                .map(RemoteReplicationSection::to_policy)
                .collect::<Result<_>>()?,
        })
    }
}

/// Validated policies, ready to reconcile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Policies {
    pub snapshots: Vec<SnapshotPolicy>,
    pub local_replications: Vec<LocalReplicationPolicy>,
    pub remote_replications: Vec<RemoteReplicationPolicy>,
}

impl Policies {
    pub fn len(&self) -> usize {
        self.snapshots
            .len()
            .saturating_add(self.local_replications.len())
            .saturating_add(self.remote_replications.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
