//! The replay engine: a bounded worker pool draining a pre-built
//! delivery plan.
//!
//! Workers are cooperative futures joined inside `run()`; the handler
//! invocation itself is spawned as a detached task so a lost timeout
//! race abandons the call without tearing it down. Claims go through a
//! single atomic cursor, which linearizes them and doubles as the call
//! number counter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::context::{CallContext, CallTag, SharedStore};
use crate::error::ConfigError;
use crate::handler::Handler;
use crate::observer::EffectObserver;
use crate::options::RunOptions;
use crate::outcome::{CallOutcome, CallRecord, Repro, RunResult, Verdict};
use crate::sequence::DeliveryPlan;

/// A configured replay run. Primary entry point of the crate.
///
/// ```ignore
/// let result = Replay::new(handler, payload)
///     .with_options(RunOptions { runs: 20, ..RunOptions::default() })
///     .run()
///     .await?;
/// ```
pub struct Replay {
    handler: Arc<dyn Handler>,
    payload: Value,
    options: RunOptions,
}

/// State shared by every worker of one run.
struct RunShared {
    plan: DeliveryPlan,
    cursor: AtomicUsize,
    handler: Arc<dyn Handler>,
    payload: Arc<Value>,
    observer: Arc<EffectObserver>,
    store: SharedStore,
    call_timeout: Duration,
}

impl Replay {
    pub fn new(handler: impl Handler, payload: Value) -> Self {
        Self {
            handler: Arc::new(handler),
            payload,
            options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Execute the run to completion and aggregate the verdict.
    ///
    /// Fails only on invalid options; everything that happens inside a
    /// call is classified into its [`CallOutcome`] instead.
    pub async fn run(self) -> Result<RunResult, ConfigError> {
        let options = self.options.validate()?;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        info!(
            %run_id,
            runs = options.runs,
            concurrency = options.concurrency,
            shuffle = options.shuffle,
            seed = options.seed,
            "replay run starting"
        );

        let shared = Arc::new(RunShared {
            plan: DeliveryPlan::build(&options),
            cursor: AtomicUsize::new(0),
            handler: self.handler,
            payload: Arc::new(self.payload.clone()),
            observer: Arc::new(EffectObserver::new()),
            store: SharedStore::new(),
            call_timeout: Duration::from_millis(options.timeout_ms),
        });

        let workers = (0..options.concurrency).map(|worker| worker_loop(worker, Arc::clone(&shared)));
        let mut records = Vec::with_capacity(options.runs as usize);
        for worker_records in join_all(workers).await {
            records.extend(worker_records);
        }

        // All workers have joined: the detection window closes here.
        // A still-running timed-out handler can keep writing to the
        // observer, but those writes are no longer scanned.
        let duplicates = shared.observer.duplicates();
        let trace = options.trace.then(|| shared.observer.trace_snapshot());
        let repro = Repro::new(&options, &self.payload);
        let result = RunResult::assemble(run_id, records, duplicates, trace, repro, started_at);

        match result.verdict {
            Verdict::Safe => info!(%run_id, ok = result.ok, "verdict: safe"),
            Verdict::Unsafe => warn!(
                %run_id,
                ok = result.ok,
                failed = result.failed,
                duplicates = result.duplicates.len(),
                "verdict: unsafe"
            ),
        }
        Ok(result)
    }
}

/// One worker: claim, jitter, invoke under the timeout race, record.
async fn worker_loop(worker: u32, shared: Arc<RunShared>) -> Vec<CallRecord> {
    let mut records = Vec::new();

    loop {
        // fetch_add linearizes claims across workers; the slot index is
        // also the call number (in claim order), offset by one.
        let slot = shared.cursor.fetch_add(1, Ordering::SeqCst);
        let Some(planned) = shared.plan.calls.get(slot).copied() else {
            break;
        };
        let tag = CallTag {
            call_no: slot as u64 + 1,
            delivery: planned.delivery,
            worker,
        };
        trace!(%tag, jitter_ms = planned.jitter_ms, "claimed delivery");

        if planned.jitter_ms > 0 {
            tokio::time::sleep(Duration::from_millis(planned.jitter_ms)).await;
        }

        let ctx = CallContext::new(tag, Arc::clone(&shared.observer), shared.store.clone());
        let handler = Arc::clone(&shared.handler);
        let payload = Arc::clone(&shared.payload);
        let started_at = Utc::now();

        // Spawned, not awaited inline: losing the race below drops the
        // JoinHandle and detaches the task. The handler keeps running
        // with its context, and late effect writes still land.
        let invocation = tokio::spawn(async move { handler.invoke(&payload, ctx).await });

        let outcome = match timeout(shared.call_timeout, invocation).await {
            Ok(Ok(Ok(()))) => CallOutcome::Ok,
            Ok(Ok(Err(error))) => CallOutcome::Error {
                message: format!("{error:#}"),
            },
            Ok(Err(join_error)) => CallOutcome::Error {
                message: format!("handler panicked: {join_error}"),
            },
            Err(_elapsed) => CallOutcome::TimedOut,
        };
        debug!(%tag, ?outcome, "call finished");

        records.push(CallRecord {
            tag,
            jitter_ms: planned.jitter_ms,
            outcome,
            started_at,
            finished_at: Utc::now(),
        });
    }

    records
}
