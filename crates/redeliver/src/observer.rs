//! The shared effect observer.
//!
//! One observer lives for exactly one run. Every call — including a
//! call that has already been accounted as timed out but whose handler
//! is still running detached — writes into it. Late writes are accepted
//! on purpose: a "timed out" charge still charged the customer.
//!
//! Duplicate detection is not incremental. It runs once, after all
//! workers join, over the final counters; the window is the whole run.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::context::CallTag;
use crate::error::EffectKeyError;
use crate::outcome::DuplicateEffect;

#[derive(Debug, Default)]
struct ObserverState {
    /// Effect key -> occurrence count. Counters only increase.
    counts: HashMap<String, u64>,
    /// Keys in first-observation order, for deterministic reporting.
    seen: Vec<String>,
    /// Ordered trace of every effect/log call.
    trace: Vec<String>,
}

/// Run-scoped store of effect counts and the trace log.
///
/// Mutated concurrently by every in-flight call; a single mutex guards
/// the state. Sections are short and contention is low.
#[derive(Debug, Default)]
pub(crate) struct EffectObserver {
    state: Mutex<ObserverState>,
}

impl EffectObserver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of an external side effect.
    ///
    /// The key is trimmed; an empty result fails the call (and only the
    /// call) with [`EffectKeyError`].
    pub(crate) fn record_effect(&self, key: &str, tag: CallTag) -> Result<(), EffectKeyError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(EffectKeyError);
        }

        let mut guard = self.lock();
        let state = &mut *guard;
        let count = state.counts.entry(key.to_owned()).or_insert(0);
        if *count == 0 {
            state.seen.push(key.to_owned());
        }
        *count += 1;
        state.trace.push(format!("effect({key}) @{tag}"));
        tracing::trace!(key, %tag, "effect recorded");
        Ok(())
    }

    /// Append a free-form line to the trace. Never fails.
    pub(crate) fn record_log(&self, message: &str, tag: CallTag) {
        let mut state = self.lock();
        state.trace.push(format!("{message} @{tag}"));
        tracing::trace!(message, %tag, "handler log");
    }

    /// Effect keys observed more than once, in first-observation order.
    pub(crate) fn duplicates(&self) -> Vec<DuplicateEffect> {
        let state = self.lock();
        state
            .seen
            .iter()
            .filter_map(|key| {
                let count = state.counts[key];
                (count > 1).then(|| DuplicateEffect {
                    key: key.clone(),
                    count,
                })
            })
            .collect()
    }

    pub(crate) fn trace_snapshot(&self) -> Vec<String> {
        self.lock().trace.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ObserverState> {
        // A poisoning panic can only originate outside the short guarded
        // sections above; the state itself is always coherent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
