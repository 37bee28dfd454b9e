//! Core types for tiersync.
//!
//! - [`tier`]: the fixed tier catalog (schedule and retention unit per tier)
//! - [`naming`]: the `auto-<tier>-...` ownership naming convention
//! - [`policy`]: validated policy input
//! - [`resource`]: identity of remote resources
//! - [`error`]: the error taxonomy shared by every tiersync crate

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod naming;
pub mod policy;
pub mod resource;
pub mod tier;

pub use error::{Error, ErrorKind, RemoteOp, Result};
pub use naming::Ownership;
pub use policy::{ExecutionMode, PolicyState, RetentionMap};
pub use resource::{ResourceId, ResourceKind};
pub use tier::{RetentionUnit, Schedule, Tier, TierCatalog};
