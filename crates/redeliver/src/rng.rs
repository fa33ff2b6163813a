//! Seeded pseudo-random generator for reproducible scheduling.
//!
//! Shuffle order and jitter magnitudes must be a pure function of the
//! seed so a failing run can be replayed from its reproduction
//! descriptor. That rules out `rand`'s OS-entropy seeding; instead this
//! is a mulberry32-style generator: 32-bit state advanced by a fixed
//! additive constant, mixed through xor/shift/multiply rounds, then
//! normalized by 2^32.

/// Deterministic generator of uniform values in `[0, 1)`.
///
/// The same seed always yields the same sequence, on every platform.
#[derive(Debug, Clone)]
pub(crate) struct SeededRng {
    state: u32,
}

impl SeededRng {
    pub(crate) fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Next uniform value in `[0, 1)`.
    pub(crate) fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_add(0x6D2B_79F5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        f64::from(t ^ (t >> 14)) / 4_294_967_296.0
    }

    /// `floor(next * bound)`: uniform draw in `[0, bound)`.
    ///
    /// `bound == 0` always yields 0.
    pub(crate) fn next_below(&mut self, bound: u64) -> u64 {
        (self.next_f64() * bound as f64) as u64
    }
}
