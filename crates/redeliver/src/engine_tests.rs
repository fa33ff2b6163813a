//! End-to-end scenarios for the replay engine.
//!
//! These exercise the advertised behavior: deterministic scheduling,
//! duplicate detection, failure isolation, and the timeout-vs-detached
//! execution semantics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;

use crate::{handler_fn, CallOutcome, Replay, RunOptions, RunStatus, Verdict};

fn payload() -> serde_json::Value {
    json!({ "event": "invoice.paid", "invoice": "inv_42" })
}

fn options(runs: u32, concurrency: u32) -> RunOptions {
    RunOptions {
        runs,
        concurrency,
        shuffle: true,
        seed: 42,
        jitter_ms: 0,
        timeout_ms: 5_000,
        trace: false,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn unconditional_effect_is_flagged_unsafe() {
    let handler = handler_fn(|payload, ctx| async move {
        let invoice = payload["invoice"].as_str().unwrap_or("?").to_owned();
        ctx.effect(&format!("charge:{invoice}"))?;
        Ok(())
    });

    let result = Replay::new(handler, payload())
        .with_options(options(7, 3))
        .run()
        .await
        .unwrap();

    assert_eq!((result.ok, result.failed), (7, 0));
    assert_eq!(result.duplicates.len(), 1);
    assert_eq!(result.duplicates[0].key, "charge:inv_42");
    assert_eq!(result.duplicates[0].count, 7);
    assert_eq!(result.verdict, Verdict::Unsafe);
    assert_eq!(result.reported_status(false), RunStatus::Failure);
}

#[tokio::test(flavor = "multi_thread")]
async fn store_guarded_effect_is_safe() {
    let handler = handler_fn(|payload, ctx| async move {
        let key = format!("charge:{}", payload["invoice"].as_str().unwrap_or("?"));
        // Atomic check-then-set against the shared store: only the
        // winning call performs the effect.
        if ctx.store().set_if_absent(&key, json!(true)) {
            ctx.effect(&key)?;
        }
        ctx.log("delivery handled");
        Ok(())
    });

    let result = Replay::new(handler, payload())
        .with_options(options(7, 3))
        .run()
        .await
        .unwrap();

    assert_eq!((result.ok, result.failed), (7, 0));
    assert!(result.duplicates.is_empty());
    assert_eq!(result.verdict, Verdict::Safe);
    assert_eq!(result.reported_status(false), RunStatus::Success);
}

#[tokio::test(flavor = "multi_thread")]
async fn handler_failures_are_counted_not_propagated() {
    let handler = handler_fn(|_payload, _ctx| async move { anyhow::bail!("downstream is down") });

    let result = Replay::new(handler, payload())
        .with_options(options(5, 2))
        .run()
        .await
        .unwrap();

    assert_eq!((result.ok, result.failed), (0, 5));
    assert_eq!(result.verdict, Verdict::Unsafe);
    assert!(result.calls.iter().all(|call| matches!(
        &call.outcome,
        CallOutcome::Error { message } if message.contains("downstream is down")
    )));
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_effect_key_fails_only_that_call() {
    let handler = handler_fn(|_payload, ctx| async move {
        if ctx.tag().call_no == 1 {
            ctx.effect("   ")?;
        } else {
            ctx.effect("ship")?;
        }
        Ok(())
    });

    let result = Replay::new(handler, payload())
        .with_options(options(3, 1))
        .run()
        .await
        .unwrap();

    assert_eq!((result.ok, result.failed), (2, 1));
    assert!(matches!(
        &result.calls[0].outcome,
        CallOutcome::Error { message } if message.contains("effect key")
    ));
    // The two valid calls still count toward duplication.
    assert_eq!(result.duplicates[0].key, "ship");
    assert_eq!(result.duplicates[0].count, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_handler_times_out_without_blocking_the_pool() {
    let handler = handler_fn(|_payload, _ctx| async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    });

    let started = Instant::now();
    let result = Replay::new(handler, payload())
        .with_options(RunOptions {
            timeout_ms: 25,
            ..options(3, 1)
        })
        .run()
        .await
        .unwrap();

    assert_eq!((result.ok, result.failed), (0, 3));
    assert!(result
        .calls
        .iter()
        .all(|call| call.outcome == CallOutcome::TimedOut));
    assert_eq!(result.verdict, Verdict::Unsafe);
    // One worker, three jobs, 25ms deadline each: the pool never waits
    // for the 30s sleeps.
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test(flavor = "multi_thread")]
async fn late_effects_from_timed_out_calls_still_land() {
    // Each call outlives its 60ms deadline and writes at ~90ms. With one
    // worker the run window stays open until ~180ms, so at least the
    // first two late writes land before the duplicate scan.
    let handler = handler_fn(|_payload, ctx| async move {
        tokio::time::sleep(Duration::from_millis(90)).await;
        let _ = ctx.effect("late-charge");
        Ok(())
    });

    let result = Replay::new(handler, payload())
        .with_options(RunOptions {
            timeout_ms: 60,
            shuffle: false,
            ..options(3, 1)
        })
        .run()
        .await
        .unwrap();

    assert_eq!(result.failed, 3);
    assert!(result
        .calls
        .iter()
        .all(|call| call.outcome == CallOutcome::TimedOut));

    let late = result
        .duplicates
        .iter()
        .find(|d| d.key == "late-charge")
        .expect("late writes from timed-out calls must reach the observer");
    // The last write races the final join; two are always in-window.
    assert!(late.count >= 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn detached_handler_may_write_after_the_run_ends() {
    let handler = handler_fn(|_payload, ctx| async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        // The run result is long aggregated by now; these writes are
        // accepted and dropped with the run-scoped observer.
        ctx.log("woke up after the verdict");
        let _ = ctx.effect("ghost");
        Ok(())
    });

    let result = Replay::new(handler, payload())
        .with_options(RunOptions {
            timeout_ms: 20,
            ..options(1, 1)
        })
        .run()
        .await
        .unwrap();

    assert_eq!(result.calls[0].outcome, CallOutcome::TimedOut);
    assert!(result.duplicates.is_empty());

    // Let the detached task fire its late writes; nothing may panic.
    tokio::time::sleep(Duration::from_millis(200)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn identical_options_replay_the_identical_schedule() {
    let run = || async {
        let handler = handler_fn(|_payload, ctx| async move {
            ctx.effect(&format!("evt:{}", ctx.tag().delivery))?;
            Ok(())
        });
        Replay::new(handler, payload())
            .with_options(RunOptions {
                runs: 12,
                concurrency: 4,
                shuffle: true,
                seed: 77,
                jitter_ms: 3,
                timeout_ms: 5_000,
                trace: false,
            })
            .run()
            .await
            .unwrap()
    };

    let first = run().await;
    let second = run().await;

    let schedule = |result: &crate::RunResult| {
        result
            .calls
            .iter()
            .map(|call| (call.tag.call_no, call.tag.delivery, call.jitter_ms))
            .collect::<Vec<_>>()
    };
    assert_eq!(schedule(&first), schedule(&second));
    assert_eq!(first.duplicates, second.duplicates);
    assert_eq!(first.verdict, Verdict::Safe);
    assert_eq!(second.verdict, Verdict::Safe);
}

#[tokio::test(flavor = "multi_thread")]
async fn every_delivery_is_claimed_exactly_once() {
    let invocations = Arc::new(AtomicU64::new(0));
    let seen = Arc::clone(&invocations);
    let handler = handler_fn(move |_payload, _ctx| {
        let seen = Arc::clone(&seen);
        async move {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });

    let result = Replay::new(handler, payload())
        .with_options(options(25, 6))
        .run()
        .await
        .unwrap();

    assert_eq!(invocations.load(Ordering::SeqCst), 25);

    let call_nos: Vec<u64> = result.calls.iter().map(|c| c.tag.call_no).collect();
    assert_eq!(call_nos, (1..=25).collect::<Vec<u64>>());

    let mut deliveries: Vec<u32> = result.calls.iter().map(|c| c.tag.delivery).collect();
    deliveries.sort_unstable();
    assert_eq!(deliveries, (1..=25).collect::<Vec<u32>>());
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_pool_is_clamped_to_runs() {
    let handler = handler_fn(|_payload, _ctx| async move { Ok(()) });

    let result = Replay::new(handler, payload())
        .with_options(options(2, 16))
        .run()
        .await
        .unwrap();

    assert_eq!(result.repro.concurrency, 2);
    assert!(result.calls.iter().all(|call| call.tag.worker < 2));
}

#[tokio::test(flavor = "multi_thread")]
async fn single_delivery_run_is_decided_by_its_one_call() {
    let handler = handler_fn(|_payload, ctx| async move {
        ctx.effect("once")?;
        Ok(())
    });

    let result = Replay::new(handler, payload())
        .with_options(options(1, 1))
        .run()
        .await
        .unwrap();

    assert_eq!(result.calls.len(), 1);
    assert_eq!(result.calls[0].tag.delivery, 1);
    assert_eq!((result.ok, result.failed), (1, 0));
    assert!(result.duplicates.is_empty());
    assert_eq!(result.verdict, Verdict::Safe);
}

#[tokio::test(flavor = "multi_thread")]
async fn trace_is_emitted_only_on_request() {
    let make_handler = || {
        handler_fn(|_payload, ctx| async move {
            ctx.log("handling");
            ctx.effect("notify")?;
            Ok(())
        })
    };

    let silent = Replay::new(make_handler(), payload())
        .with_options(options(2, 1))
        .run()
        .await
        .unwrap();
    assert!(silent.trace.is_none());

    let traced = Replay::new(make_handler(), payload())
        .with_options(RunOptions {
            trace: true,
            shuffle: false,
            ..options(2, 1)
        })
        .run()
        .await
        .unwrap();

    let trace = traced.trace.expect("trace was requested");
    assert_eq!(trace.len(), 4);
    assert!(trace[0].starts_with("handling @call#1 delivery#1"));
    assert!(trace[1].starts_with("effect(notify) @call#1 delivery#1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn panicking_handler_is_contained_as_a_call_failure() {
    let handler = handler_fn(|_payload, ctx| async move {
        if ctx.tag().call_no == 2 {
            panic!("handler blew up");
        }
        ctx.effect(&format!("evt:{}", ctx.tag().delivery))?;
        Ok(())
    });

    let result = Replay::new(handler, payload())
        .with_options(RunOptions {
            shuffle: false,
            ..options(4, 1)
        })
        .run()
        .await
        .unwrap();

    assert_eq!((result.ok, result.failed), (3, 1));
    assert!(matches!(
        &result.calls[1].outcome,
        CallOutcome::Error { message } if message.contains("panicked")
    ));
    assert_eq!(result.verdict, Verdict::Unsafe);
}
