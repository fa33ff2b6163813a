//! Terminal classification of calls and the aggregated run result.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::context::CallTag;
use crate::options::RunOptions;

/// How one call ended.
///
/// `Error` and `TimedOut` are both failures. A timed-out call's handler
/// may still be running detached; that changes nothing here — the call
/// has been accounted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallOutcome {
    Ok,
    Error { message: String },
    TimedOut,
}

impl CallOutcome {
    pub fn is_failure(&self) -> bool {
        !matches!(self, CallOutcome::Ok)
    }
}

/// Full record of one call: identity, scheduled jitter, outcome, and
/// wall-clock bounds of the accounted execution window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    pub tag: CallTag,
    pub jitter_ms: u64,
    pub outcome: CallOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// An effect key observed more than once within the run window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateEffect {
    pub key: String,
    pub count: u64,
}

/// The binary classification of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Safe,
    Unsafe,
}

/// Externally reported status of a run. Distinct from [`Verdict`]: an
/// override may force `Success`, the verdict is never rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failure,
}

/// Reproduction descriptor: the minimal option set that deterministically
/// replays the same claim order and jitter magnitudes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repro {
    pub seed: u32,
    pub runs: u32,
    pub concurrency: u32,
    pub shuffle: bool,
    pub jitter_ms: u64,
    pub timeout_ms: u64,
    /// Stable fingerprint of the payload, so a later run can confirm it
    /// is replaying against the same input.
    pub payload_fingerprint: String,
}

impl Repro {
    pub(crate) fn new(options: &RunOptions, payload: &Value) -> Self {
        Self {
            seed: options.seed,
            runs: options.runs,
            concurrency: options.concurrency,
            shuffle: options.shuffle,
            jitter_ms: options.jitter_ms,
            timeout_ms: options.timeout_ms,
            payload_fingerprint: fingerprint(payload),
        }
    }
}

/// Hash of the payload's canonical JSON rendering. `serde_json` sorts
/// object keys, so equal payloads fingerprint equally.
fn fingerprint(payload: &Value) -> String {
    let canonical = payload.to_string();
    let mut hasher = DefaultHasher::new();
    canonical.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub verdict: Verdict,
    pub ok: u64,
    pub failed: u64,
    /// Keys observed more than once, in first-observation order.
    pub duplicates: Vec<DuplicateEffect>,
    /// Per-call records, sorted by call number.
    pub calls: Vec<CallRecord>,
    /// The ordered observer trace; populated only when tracing was
    /// requested in the options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<String>>,
    pub repro: Repro,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    pub(crate) fn assemble(
        run_id: Uuid,
        mut calls: Vec<CallRecord>,
        duplicates: Vec<DuplicateEffect>,
        trace: Option<Vec<String>>,
        repro: Repro,
        started_at: DateTime<Utc>,
    ) -> Self {
        calls.sort_by_key(|record| record.tag.call_no);

        let failed = calls.iter().filter(|r| r.outcome.is_failure()).count() as u64;
        let ok = calls.len() as u64 - failed;
        let verdict = if failed > 0 || !duplicates.is_empty() {
            Verdict::Unsafe
        } else {
            Verdict::Safe
        };

        Self {
            run_id,
            verdict,
            ok,
            failed,
            duplicates,
            calls,
            trace,
            repro,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Map the verdict to an externally reported status.
    ///
    /// `force_success` reports `Success` even for an `Unsafe` verdict;
    /// the verdict itself stays untouched.
    pub fn reported_status(&self, force_success: bool) -> RunStatus {
        match self.verdict {
            Verdict::Safe => RunStatus::Success,
            Verdict::Unsafe if force_success => RunStatus::Success,
            Verdict::Unsafe => RunStatus::Failure,
        }
    }
}
