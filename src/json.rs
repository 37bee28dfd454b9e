//! JSON output structures for the CLI.
//!
//! Results go to stdout as a single JSON document; failures use the same
//! envelope with `success: false` and a semantic exit code.

use serde::{Deserialize, Serialize};
use tiersync_core::{Error, ErrorKind};

/// Standard JSON success response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSuccess<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T> JsonSuccess<T> {
    /// Create a new success response
    pub const fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Standard JSON error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonError {
    pub success: bool,
    pub error: ErrorDetail,
}

impl Default for JsonError {
    fn default() -> Self {
        Self::new(ErrorCode::Unknown, "An unknown error occurred")
    }
}

/// Detailed error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (`SCREAMING_SNAKE_CASE`)
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Semantic exit code (1-4)
    pub exit_code: i32,
    /// Optional additional context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Optional suggestion for resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl JsonError {
    /// Create a new JSON error with just a code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                exit_code: 4, // Default to unknown error
                details: None,
                suggestion: None,
            },
        }
    }

    /// Add details to the error
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }

    /// Add a suggestion to the error
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.error.suggestion = Some(suggestion.into());
        self
    }

    #[must_use]
    pub const fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.error.exit_code = exit_code;
        self
    }

    pub const fn exit_code(&self) -> i32 {
        self.error.exit_code
    }

    /// Convert an error that escaped to the binary's edge.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        err.downcast_ref::<Error>().map_or_else(
            || Self::new(ErrorCode::Unknown, format!("{err:#}")),
            Self::from,
        )
    }
}

/// Error codes for machine-readable errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation errors
    UnknownTiers,
    InvalidRetention,
    DuplicateTier,
    EmptyPolicy,
    EncryptionConflict,

    // Binding errors
    MissingSnapshotTasks,

    // Remote errors
    RemoteCallFailed,
    MalformedResource,

    // Config errors
    ConfigError,

    // Generic errors
    Unknown,
}

impl ErrorCode {
    /// Get the string representation of the error code
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownTiers => "UNKNOWN_TIERS",
            Self::InvalidRetention => "INVALID_RETENTION",
            Self::DuplicateTier => "DUPLICATE_TIER",
            Self::EmptyPolicy => "EMPTY_POLICY",
            Self::EncryptionConflict => "ENCRYPTION_CONFLICT",
            Self::MissingSnapshotTasks => "MISSING_SNAPSHOT_TASKS",
            Self::RemoteCallFailed => "REMOTE_CALL_FAILED",
            Self::MalformedResource => "MALFORMED_RESOURCE",
            Self::ConfigError => "CONFIG_ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub const fn of(error: &Error) -> Self {
        match error {
            Error::UnknownTiers { .. } => Self::UnknownTiers,
            Error::InvalidRetention { .. } => Self::InvalidRetention,
            Error::DuplicateTier { .. } => Self::DuplicateTier,
            Error::EmptyPolicy => Self::EmptyPolicy,
            Error::EncryptionConflict { .. } => Self::EncryptionConflict,
            Error::MissingSnapshotTasks { .. } => Self::MissingSnapshotTasks,
            Error::RemoteCall { .. } => Self::RemoteCallFailed,
            Error::MalformedResource { .. } => Self::MalformedResource,
            Error::Config { .. } => Self::ConfigError,
        }
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.as_str().to_string()
    }
}

/// Classify an error into a semantic exit code.
///
/// Exit codes follow this semantic mapping:
/// - 1: Validation and configuration errors (user input issues)
/// - 2: Binding errors (prerequisite snapshot tasks missing)
/// - 3: Remote store errors
/// - 4: Anything else
pub const fn classify_exit_code(error: &Error) -> i32 {
    match error.kind() {
        ErrorKind::Validation | ErrorKind::Config => 1,
        ErrorKind::Binding => 2,
        ErrorKind::RemoteCall | ErrorKind::Decode => 3,
    }
}

const fn suggestion(error: &Error) -> Option<&'static str> {
    match error {
        Error::UnknownTiers { .. } => {
            Some("Run 'tiersync tiers' to list the valid tier names")
        }
        Error::MissingSnapshotTasks { .. } => {
            Some("Add a snapshot policy for the source dataset covering these tiers")
        }
        Error::EncryptionConflict { .. } => Some(
            "Either keep preserve_source_encryption, or set target_encryption with exactly one of target_encryption_key or target_encryption_inherit",
        ),
        Error::RemoteCall { .. } => Some("Check the store base_url and credentials"),
        _ => None,
    }
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        let details = match err {
            Error::UnknownTiers { unknown, valid } => Some(serde_json::json!({
                "unknown": unknown,
                "valid": valid,
            })),
            Error::MissingSnapshotTasks { dataset, missing } => Some(serde_json::json!({
                "dataset": dataset,
                "missing_tiers": missing,
            })),
            _ => None,
        };

        let json_error =
            Self::new(ErrorCode::of(err), err.to_string()).with_exit_code(classify_exit_code(err));
        let json_error = match suggestion(err) {
            Some(sugg) => json_error.with_suggestion(sugg),
            None => json_error,
        };
        match details {
            Some(details) => json_error.with_details(details),
            None => json_error,
        }
    }
}

impl From<Error> for JsonError {
    fn from(err: Error) -> Self {
        Self::from(&err)
    }
}

/// Trait for types that can be serialized to JSON
pub trait JsonSerializable: Serialize {
    /// Convert to pretty-printed JSON string
    ///
    /// # Errors
    ///
    /// Serialization failure.
    fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// Implement for all Serialize types
impl<T: Serialize> JsonSerializable for T {}
