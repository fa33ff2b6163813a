//! Per-call context and the run-wide shared store.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EffectKeyError;
use crate::observer::EffectObserver;

/// Identity of one call: where it sits in the claim order, which
/// delivery it carries, and which worker ran it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallTag {
    /// Monotonic call number in claim order, starting at 1.
    pub call_no: u64,
    /// Delivery index in `1..=runs` (position in the shuffled sequence).
    pub delivery: u32,
    /// Worker id in `0..concurrency`.
    pub worker: u32,
}

impl fmt::Display for CallTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "call#{} delivery#{} worker#{}",
            self.call_no, self.delivery, self.worker
        )
    }
}

/// An arbitrary key-value map shared by reference across all calls of a
/// run. Handlers use it to model a durable idempotency store; the core
/// never interprets its contents.
///
/// Cloning the handle is cheap and shares the same map. The map itself
/// is safe to touch from any call, but the core adds no coordination on
/// top: a handler doing a separate `get` then `set` can still race,
/// exactly as it would against a real external store. Use
/// [`set_if_absent`](SharedStore::set_if_absent) for an atomic
/// check-then-set.
#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    inner: Arc<DashMap<String, Value>>,
}

impl SharedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.get(key).map(|entry| entry.value().clone())
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.inner.insert(key.into(), value);
    }

    /// Insert only if the key is vacant. Returns `true` if this call
    /// inserted the value.
    pub fn set_if_absent(&self, key: impl Into<String>, value: Value) -> bool {
        let mut inserted = false;
        self.inner.entry(key.into()).or_insert_with(|| {
            inserted = true;
            value
        });
        inserted
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Handed to the handler on every call: fresh per call, tagged with the
/// call's identity, borrowing the run's observer and store.
///
/// The context never owns the observer or the store; both live exactly
/// as long as the run. A handler may keep the context across a timeout
/// — its writes still land (see [`observer`](crate::observer)).
#[derive(Debug, Clone)]
pub struct CallContext {
    tag: CallTag,
    observer: Arc<EffectObserver>,
    store: SharedStore,
}

impl CallContext {
    pub(crate) fn new(tag: CallTag, observer: Arc<EffectObserver>, store: SharedStore) -> Self {
        Self {
            tag,
            observer,
            store,
        }
    }

    /// Declare one occurrence of an external side effect.
    ///
    /// Fails with [`EffectKeyError`] if `key` trims to empty; propagate
    /// it with `?` and the call is recorded as failed.
    pub fn effect(&self, key: &str) -> Result<(), EffectKeyError> {
        self.observer.record_effect(key, self.tag)
    }

    /// Append a line to the run trace, tagged with this call's identity.
    pub fn log(&self, message: impl AsRef<str>) {
        self.observer.record_log(message.as_ref(), self.tag);
    }

    /// The run-wide shared store.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn tag(&self) -> CallTag {
        self.tag
    }
}
