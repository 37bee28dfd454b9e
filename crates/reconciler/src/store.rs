//! Remote store boundary.
//!
//! The reconciler never knows how the remote connection is established. It
//! receives a [`RemoteStore`] capability from the caller and issues strictly
//! sequential, blocking calls through it.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::{Map, Value};
use thiserror::Error;
use tiersync_core::{RemoteOp, ResourceId, ResourceKind};

/// Result type for raw store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failure reported by a [`RemoteStore`] implementation.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The referenced resource does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: ResourceId },

    /// The store refused the request.
    #[error("rejected: {reason}")]
    Rejected { reason: String },

    /// The store could not be reached or did not answer.
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },

    /// The store answered with something we cannot interpret.
    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },
}

impl StoreError {
    /// Create a rejected error.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Create an unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Create an invalid response error.
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }
}

/// One condition of a query filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `field == value`.
    Eq { field: String, value: Value },
    /// `field` is a string starting with `prefix`.
    StartsWith { field: String, prefix: String },
}

impl Condition {
    /// Whether `record` satisfies this condition.
    pub fn matches(&self, record: &Value) -> bool {
        match self {
            Self::Eq { field, value } => record.get(field) == Some(value),
            Self::StartsWith { field, prefix } => record
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|s| s.starts_with(prefix.as_str())),
        }
    }
}

/// Conjunction of conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// Filter matching every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality condition.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Add a string prefix condition.
    #[must_use]
    pub fn starts_with(mut self, field: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.conditions.push(Condition::StartsWith {
            field: field.into(),
            prefix: prefix.into(),
        });
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Whether `record` satisfies every condition.
    pub fn matches(&self, record: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }
}

/// Per-resource primitives exposed by the remote store.
pub trait RemoteStore {
    /// List records of `kind` matching `filter`.
    fn query(&self, kind: ResourceKind, filter: &Filter) -> StoreResult<Vec<Value>>;

    /// Create a record and return it as stored.
    fn create(&self, kind: ResourceKind, body: &Value) -> StoreResult<Value>;

    /// Patch the fields present in `body` and return the stored record.
    fn update(&self, kind: ResourceKind, id: ResourceId, body: &Value) -> StoreResult<Value>;

    /// Delete a record.
    fn delete(&self, kind: ResourceKind, id: ResourceId) -> StoreResult<()>;
}

/// A call observed by [`InMemoryStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCall {
    pub op: RemoteOp,
    pub kind: ResourceKind,
}

impl StoreCall {
    /// Whether the call could change remote state.
    pub const fn is_mutation(self) -> bool {
        !matches!(self.op, RemoteOp::Query)
    }
}

#[derive(Debug)]
struct InjectedFailure {
    call: StoreCall,
    remaining: usize,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    records: BTreeMap<ResourceKind, BTreeMap<ResourceId, Value>>,
    calls: Vec<StoreCall>,
    failures: Vec<InjectedFailure>,
}

impl Inner {
    fn record_call(&mut self, op: RemoteOp, kind: ResourceKind) -> StoreResult<()> {
        let call = StoreCall { op, kind };
        self.calls.push(call);

        let hit = self.failures.iter_mut().position(|f| {
            if f.call != call {
                return false;
            }
            if f.remaining == 0 {
                true
            } else {
                f.remaining = f.remaining.saturating_sub(1);
                false
            }
        });

        match hit {
            Some(index) => {
                self.failures.remove(index);
                Err(StoreError::rejected(format!("injected {op} failure")))
            }
            None => Ok(()),
        }
    }

    fn allocate_id(&mut self) -> ResourceId {
        self.next_id = self.next_id.saturating_add(1);
        ResourceId::new(self.next_id)
    }

    fn insert(&mut self, kind: ResourceKind, body: &Value) -> StoreResult<Value> {
        let Value::Object(fields) = body else {
            return Err(StoreError::rejected("body must be a JSON object"));
        };

        let id = self.allocate_id();
        let mut stored = fields.clone();
        stored.insert("id".to_string(), Value::from(id.get()));
        let stored = Value::Object(stored);

        self.records
            .entry(kind)
            .or_default()
            .insert(id, stored.clone());
        Ok(stored)
    }
}

/// Process-local [`RemoteStore`] with the same filter semantics as the
/// remote one.
///
/// Assigns sequential ids starting at 1, records every call it receives
/// and can be told to fail a specific call.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::unavailable("store lock poisoned"))
    }

    /// Insert a record directly, bypassing the call log.
    ///
    /// # Errors
    ///
    /// Fails when `body` is not a JSON object.
    pub fn seed(&self, kind: ResourceKind, body: Value) -> StoreResult<ResourceId> {
        let stored = self.lock()?.insert(kind, &body)?;
        stored
            .get("id")
            .and_then(Value::as_u64)
            .map(ResourceId::new)
            .ok_or_else(|| StoreError::invalid_response("stored record has no id"))
    }

    /// Every record of `kind`, ordered by id.
    pub fn records(&self, kind: ResourceKind) -> Vec<Value> {
        self.inner
            .lock()
            .map(|inner| {
                inner
                    .records
                    .get(&kind)
                    .map(|by_id| by_id.values().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner
            .lock()
            .map(|inner| inner.calls.clone())
            .unwrap_or_default()
    }

    /// Number of create/update/delete calls received so far.
    pub fn mutation_count(&self) -> usize {
        self.calls().into_iter().filter(|c| c.is_mutation()).count()
    }

    /// Forget the call log.
    pub fn clear_calls(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.calls.clear();
        }
    }

    /// Make the `nth` (1-based) upcoming `op` on `kind` fail.
    pub fn fail_on(&self, op: RemoteOp, kind: ResourceKind, nth: usize) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failures.push(InjectedFailure {
                call: StoreCall { op, kind },
                remaining: nth.saturating_sub(1),
            });
        }
    }
}

impl RemoteStore for InMemoryStore {
    fn query(&self, kind: ResourceKind, filter: &Filter) -> StoreResult<Vec<Value>> {
        let mut inner = self.lock()?;
        inner.record_call(RemoteOp::Query, kind)?;

        Ok(inner
            .records
            .get(&kind)
            .map(|by_id| {
                by_id
                    .values()
                    .filter(|record| filter.matches(record))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn create(&self, kind: ResourceKind, body: &Value) -> StoreResult<Value> {
        let mut inner = self.lock()?;
        inner.record_call(RemoteOp::Create, kind)?;
        inner.insert(kind, body)
    }

    fn update(&self, kind: ResourceKind, id: ResourceId, body: &Value) -> StoreResult<Value> {
        let mut inner = self.lock()?;
        inner.record_call(RemoteOp::Update, kind)?;

        let Value::Object(patch) = body else {
            return Err(StoreError::rejected("body must be a JSON object"));
        };

        let record = inner
            .records
            .get_mut(&kind)
            .and_then(|by_id| by_id.get_mut(&id))
            .ok_or(StoreError::NotFound { kind, id })?;

        if let Value::Object(fields) = record {
            merge_fields(fields, patch);
        }
        Ok(record.clone())
    }

    fn delete(&self, kind: ResourceKind, id: ResourceId) -> StoreResult<()> {
        let mut inner = self.lock()?;
        inner.record_call(RemoteOp::Delete, kind)?;

        inner
            .records
            .get_mut(&kind)
            .and_then(|by_id| by_id.remove(&id))
            .map(|_| ())
            .ok_or(StoreError::NotFound { kind, id })
    }
}

fn merge_fields(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        if key != "id" {
            target.insert(key.clone(), value.clone());
        }
    }
}
