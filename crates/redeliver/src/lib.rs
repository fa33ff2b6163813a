//! # Redeliver
//!
//! A deterministic replay harness that hammers an event handler with
//! duplicate deliveries and reports whether its side effects stay
//! idempotent.
//!
//! ## Core Concepts
//!
//! Redeliver separates **delivery** from **effect**:
//! - A [`Replay`] run delivers one fixed payload `runs` times — shuffled,
//!   jittered, and raced across `concurrency` workers.
//! - The handler declares each external side effect by calling
//!   [`CallContext::effect`] with a key of its choosing.
//!
//! The key principle: **One Effect Key = One Real-World Action**.
//! If a key is observed more than once in a run, the handler performed
//! that action more than once under retries — the run is [`Verdict::Unsafe`].
//!
//! ## Architecture
//!
//! ```text
//! RunOptions + seed
//!     │
//!     ▼
//! SeededRng ──► DeliveryPlan (shuffled order + jitter per slot)
//!     │
//!     ▼ claim (atomic cursor)
//! Worker Pool (N workers)
//!     │
//!     ├─► jitter sleep
//!     ├─► Handler.invoke(payload, CallContext) ─── race ──► timeout
//!     │          │
//!     │          ▼ effect() / log()
//!     │    EffectObserver ◄──────────── late writes from timed-out
//!     │    (counts + trace)             calls still land here
//!     ▼
//! Aggregator ──► RunResult { ok, failed, duplicates, verdict, repro }
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Same seed, same schedule** - claim order and jitter magnitudes are
//!    a pure function of `(seed, runs, concurrency, shuffle, jitter_ms)`
//! 2. **Every delivery claimed exactly once** - claims are linearized on
//!    an atomic cursor; call numbers follow claim order
//! 3. **Failures stay in their call** - a handler error or timeout is
//!    classified and recorded, never propagated to other workers
//! 4. **Timeouts change accounting, not execution** - a timed-out handler
//!    keeps running detached; its later effect writes are accepted
//! 5. **The verdict is computed once** - duplicates are scanned after all
//!    workers join, over the whole run window
//!
//! ## Guarantees
//!
//! - **Deterministic scheduling**: a reported seed reproduces the run
//! - **At-most-one claim per delivery**: no delivery runs twice
//! - **No cross-run state**: observer and store live exactly one run
//!
//! Redeliver does **not** guarantee completion order across workers, and
//! it gives the [`SharedStore`] no protection beyond the map itself —
//! coordinating concurrent access is the handler's job, just like a real
//! idempotency store.
//!
//! ## Example
//!
//! ```ignore
//! use redeliver_core::{handler_fn, Replay, RunOptions, Verdict};
//! use serde_json::json;
//!
//! let payload = json!({ "event": "invoice.paid", "invoice": "inv_42" });
//!
//! // A handler that charges on every delivery: not idempotent.
//! let naive = handler_fn(|payload, ctx| async move {
//!     let invoice = payload["invoice"].as_str().unwrap_or_default();
//!     ctx.effect(&format!("charge:{invoice}"))?;
//!     Ok(())
//! });
//!
//! let result = Replay::new(naive, payload)
//!     .with_options(RunOptions {
//!         runs: 7,
//!         concurrency: 3,
//!         shuffle: true,
//!         seed: 42,
//!         ..RunOptions::default()
//!     })
//!     .run()
//!     .await?;
//!
//! assert_eq!(result.verdict, Verdict::Unsafe);
//! assert_eq!(result.duplicates[0].count, 7);
//! ```
//!
//! ## What This Is Not
//!
//! Redeliver is **not**:
//! - A proxy that intercepts real webhook traffic
//! - A fixer that makes handlers idempotent for you
//! - A persistence layer for findings
//! - A loader for handler modules (it takes a ready callable)
//!
//! Redeliver **is**:
//! > A seeded, concurrent delivery storm against one handler, with a
//! > single shared observer deciding Safe or Unsafe at the end.

// Core modules
mod context;
mod engine;
mod error;
mod handler;
mod observer;
mod options;
mod outcome;
mod rng;
mod sequence;

// Engine scenario tests (test-only)
#[cfg(test)]
mod engine_tests;


// Re-export context types
pub use context::{CallContext, CallTag, SharedStore};

// Re-export error types
pub use error::{ConfigError, EffectKeyError};

// Re-export handler types
pub use handler::{handler_fn, Handler};

// Re-export the engine (primary entry point)
pub use engine::Replay;

// Re-export options
pub use options::RunOptions;

// Re-export result types
pub use outcome::{
    CallOutcome, CallRecord, DuplicateEffect, Repro, RunResult, RunStatus, Verdict,
};

// Re-export commonly used external types
pub use async_trait::async_trait;
