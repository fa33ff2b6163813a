//! Error taxonomy.
//!
//! Only configuration problems are fatal to a run. Everything that goes
//! wrong inside a call — handler errors, bad effect keys, timeouts — is
//! caught at the worker boundary and classified into a
//! [`CallOutcome`](crate::CallOutcome) instead of propagating.

use thiserror::Error;

/// Invalid [`RunOptions`](crate::RunOptions). Raised before any job is
/// scheduled; aborts the whole run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("runs must be greater than zero")]
    ZeroRuns,

    #[error("concurrency must be greater than zero")]
    ZeroConcurrency,

    #[error("timeout_ms must be greater than zero")]
    ZeroTimeout,
}

/// An empty (after trimming) key was passed to
/// [`CallContext::effect`](crate::CallContext::effect).
///
/// Scoped to the single call: the handler propagates it with `?` and the
/// worker records the call as failed. Other workers are unaffected.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("effect key must be non-empty after trimming")]
pub struct EffectKeyError;
