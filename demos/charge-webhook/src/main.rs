//! # Charge Webhook Demo
//!
//! Replays a payment-capture webhook against two handlers: a naive one
//! that charges on every delivery, and a guarded one that checks the
//! shared idempotency store first. Same payload, same seed, opposite
//! verdicts.

use anyhow::Result;
use redeliver_core::{handler_fn, Handler, Replay, RunOptions, RunResult};
use serde_json::json;

// ============================================================================
// Handlers
// ============================================================================

/// Charges the customer on every delivery. Under provider retries this
/// double-charges: the replay flags it.
fn naive_handler() -> impl Handler {
    handler_fn(|payload, ctx| async move {
        let invoice = payload["invoice"].as_str().unwrap_or("?").to_owned();
        ctx.log(format!("capturing payment for {invoice}"));
        ctx.effect(&format!("charge:{invoice}"))?;
        Ok(())
    })
}

/// Records the invoice in the idempotency store before charging; only
/// the first delivery wins the slot.
fn guarded_handler() -> impl Handler {
    handler_fn(|payload, ctx| async move {
        let invoice = payload["invoice"].as_str().unwrap_or("?").to_owned();
        let slot = format!("captured:{invoice}");

        if ctx.store().set_if_absent(&slot, json!(true)) {
            ctx.log(format!("first delivery, capturing {invoice}"));
            ctx.effect(&format!("charge:{invoice}"))?;
        } else {
            ctx.log(format!("duplicate delivery for {invoice}, skipping"));
        }
        Ok(())
    })
}

// ============================================================================
// Main
// ============================================================================

fn report(name: &str, result: &RunResult) {
    println!("--- {name} ---");
    println!("verdict:    {:?}", result.verdict);
    println!("ok/failed:  {}/{}", result.ok, result.failed);
    for dup in &result.duplicates {
        println!("duplicate:  {} x{}", dup.key, dup.count);
    }
    println!(
        "repro:      seed={} runs={} concurrency={} shuffle={}",
        result.repro.seed, result.repro.runs, result.repro.concurrency, result.repro.shuffle
    );
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    let payload = json!({
        "event": "payment.captured",
        "invoice": "inv_42",
        "amount_cents": 1999
    });

    let options = RunOptions {
        runs: 10,
        concurrency: 4,
        shuffle: true,
        seed: 42,
        jitter_ms: 15,
        timeout_ms: 2_000,
        trace: false,
    };

    let naive = Replay::new(naive_handler(), payload.clone())
        .with_options(options.clone())
        .run()
        .await?;
    report("naive handler", &naive);

    let guarded = Replay::new(guarded_handler(), payload)
        .with_options(options)
        .run()
        .await?;
    report("guarded handler", &guarded);

    Ok(())
}
