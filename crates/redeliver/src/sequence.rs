//! Delivery sequencing.
//!
//! Turns validated options into a fully materialized schedule: the
//! (possibly shuffled) delivery order plus one jitter magnitude per
//! slot. Slot order is claim order, so pre-drawing both from the seeded
//! RNG makes the whole schedule a pure function of the options — two
//! runs with the same options claim in the same order and sleep the
//! same jitters, no matter how workers interleave.

use crate::options::RunOptions;
use crate::rng::SeededRng;

/// One slot in the schedule: which delivery runs there and how long it
/// waits before invoking the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PlannedCall {
    /// Delivery index in `1..=runs`.
    pub(crate) delivery: u32,
    /// Pre-call delay in milliseconds, drawn as `floor(rand * (jitter_ms + 1))`.
    pub(crate) jitter_ms: u64,
}

/// The materialized schedule for one run.
#[derive(Debug, Clone)]
pub(crate) struct DeliveryPlan {
    pub(crate) calls: Vec<PlannedCall>,
}

impl DeliveryPlan {
    /// Build the schedule from validated options.
    ///
    /// The delivery order is always a permutation of `1..=runs`.
    pub(crate) fn build(options: &RunOptions) -> Self {
        let mut rng = SeededRng::new(options.seed);

        let mut order: Vec<u32> = (1..=options.runs).collect();
        if options.shuffle {
            fisher_yates(&mut order, &mut rng);
        }

        let calls = order
            .into_iter()
            .map(|delivery| PlannedCall {
                delivery,
                jitter_ms: rng.next_below(options.jitter_ms + 1),
            })
            .collect();

        Self { calls }
    }
}

/// In-place Fisher-Yates shuffle consuming the run RNG.
fn fisher_yates(items: &mut [u32], rng: &mut SeededRng) {
    for i in (1..items.len()).rev() {
        let j = rng.next_below(i as u64 + 1) as usize;
        items.swap(i, j);
    }
}
