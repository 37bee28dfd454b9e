//! Core error types for tiersync using Railway-Oriented Programming.
//!
//! Every failure the reconciliation pipeline can produce is a variant of
//! [`Error`]. Callers that need to branch on the class of failure use
//! [`Error::kind`] instead of matching on message text.

use std::fmt;

use itertools::Itertools;
use thiserror::Error;

use crate::resource::{ResourceId, ResourceKind};
use crate::tier::Tier;

/// The standard Result type for tiersync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Remote store operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    Query,
    Create,
    Update,
    Delete,
}

impl RemoteOp {
    /// Lowercase verb used in messages and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad caller input, raised before any remote call.
    Validation,
    /// Prerequisite snapshot tasks for a replication policy are missing.
    Binding,
    /// The remote store rejected or failed a call.
    RemoteCall,
    /// The remote store returned a record we could not decode.
    Decode,
    /// Configuration could not be loaded.
    Config,
}

/// Core error type for tiersync operations.
#[derive(Debug, Error)]
pub enum Error {
    // Validation errors
    #[error(
        "invalid tier names: {}. Valid tiers: {}",
        .unknown.join(", "),
        .valid.join(", ")
    )]
    UnknownTiers {
        unknown: Vec<String>,
        valid: Vec<String>,
    },

    #[error("invalid retention count for tier '{tier}': {count}. Must be a positive integer")]
    InvalidRetention { tier: Tier, count: i64 },

    #[error("tier '{tier}' specified more than once")]
    DuplicateTier { tier: Tier },

    #[error("at least one tier with a positive count must be specified when state=present")]
    EmptyPolicy,

    #[error("invalid encryption options: {reason}")]
    EncryptionConflict { reason: String },

    // Binding errors
    #[error(
        "no snapshot tasks found for tiers [{}] on dataset '{dataset}'. Create the snapshot policy first",
        .missing.iter().join(", ")
    )]
    MissingSnapshotTasks { dataset: String, missing: Vec<Tier> },

    // Remote errors
    #[error("failed to {op} {kind} for {key}: {reason}")]
    RemoteCall {
        op: RemoteOp,
        kind: ResourceKind,
        key: String,
        reason: String,
    },

    #[error("malformed {kind} record: {reason}")]
    MalformedResource { kind: ResourceKind, reason: String },

    // Configuration errors
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

impl Error {
    /// Create an unknown tiers error listing every offending name.
    pub fn unknown_tiers<I, S>(unknown: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::UnknownTiers {
            unknown: unknown.into_iter().map(Into::into).collect(),
            valid: Tier::ALL.iter().map(|t| t.as_str().to_string()).collect(),
        }
    }

    /// Create an invalid retention count error.
    pub const fn invalid_retention(tier: Tier, count: i64) -> Self {
        Self::InvalidRetention { tier, count }
    }

    /// Create an encryption conflict error.
    pub fn encryption_conflict(reason: impl Into<String>) -> Self {
        Self::EncryptionConflict {
            reason: reason.into(),
        }
    }

    /// Create a missing snapshot tasks error.
    pub fn missing_snapshot_tasks(dataset: impl Into<String>, missing: Vec<Tier>) -> Self {
        Self::MissingSnapshotTasks {
            dataset: dataset.into(),
            missing,
        }
    }

    /// Create a remote call error.
    pub fn remote_call(
        op: RemoteOp,
        kind: ResourceKind,
        key: impl Into<String>,
        reason: impl fmt::Display,
    ) -> Self {
        Self::RemoteCall {
            op,
            kind,
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a remote call error keyed by resource id.
    pub fn remote_call_for_id(
        op: RemoteOp,
        kind: ResourceKind,
        id: ResourceId,
        reason: impl fmt::Display,
    ) -> Self {
        Self::remote_call(op, kind, format!("id {id}"), reason)
    }

    /// Create a malformed resource error.
    pub fn malformed_resource(kind: ResourceKind, reason: impl fmt::Display) -> Self {
        Self::MalformedResource {
            kind,
            reason: reason.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Classify this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTiers { .. }
            | Self::InvalidRetention { .. }
            | Self::DuplicateTier { .. }
            | Self::EmptyPolicy
            | Self::EncryptionConflict { .. } => ErrorKind::Validation,
            Self::MissingSnapshotTasks { .. } => ErrorKind::Binding,
            Self::RemoteCall { .. } => ErrorKind::RemoteCall,
            Self::MalformedResource { .. } => ErrorKind::Decode,
            Self::Config { .. } => ErrorKind::Config,
        }
    }

    /// Whether this error was raised before any remote call could happen.
    pub const fn is_validation(&self) -> bool {
        matches!(self.kind(), ErrorKind::Validation)
    }
}
