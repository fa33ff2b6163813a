//! Run configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Options for one replay run.
///
/// All fields are validated before any job executes; invalid input is
/// fatal to the run before scheduling begins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Number of deliveries of the fixed payload. Must be positive.
    pub runs: u32,

    /// Number of concurrent workers. Must be positive; clamped to `runs`.
    pub concurrency: u32,

    /// Permute delivery order with a seeded Fisher-Yates shuffle.
    pub shuffle: bool,

    /// Seed driving shuffle order and jitter magnitudes.
    pub seed: u32,

    /// Upper bound (inclusive) on the random pre-call delay, in ms.
    pub jitter_ms: u64,

    /// Per-call deadline, in ms. Must be positive.
    pub timeout_ms: u64,

    /// Include the ordered observer trace in the result.
    pub trace: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            runs: 10,
            concurrency: 4,
            shuffle: true,
            seed: 1,
            jitter_ms: 0,
            timeout_ms: 5_000,
            trace: false,
        }
    }
}

impl RunOptions {
    /// Validate and return the effective options.
    ///
    /// `concurrency` is clamped to `runs`: a pool never holds more
    /// workers than there are deliveries to claim.
    pub fn validate(&self) -> Result<RunOptions, ConfigError> {
        if self.runs == 0 {
            return Err(ConfigError::ZeroRuns);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        let mut effective = self.clone();
        effective.concurrency = self.concurrency.min(self.runs);
        Ok(effective)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(RunOptions::default().validate().is_ok());
    }

    #[test]
    fn zero_fields_are_rejected() {
        let mut opts = RunOptions::default();
        opts.runs = 0;
        assert_eq!(opts.validate(), Err(ConfigError::ZeroRuns));

        let mut opts = RunOptions::default();
        opts.concurrency = 0;
        assert_eq!(opts.validate(), Err(ConfigError::ZeroConcurrency));

        let mut opts = RunOptions::default();
        opts.timeout_ms = 0;
        assert_eq!(opts.validate(), Err(ConfigError::ZeroTimeout));
    }

    #[test]
    fn concurrency_clamps_to_runs() {
        let opts = RunOptions {
            runs: 2,
            concurrency: 8,
            ..RunOptions::default()
        };
        assert_eq!(opts.validate().unwrap().concurrency, 2);

        let opts = RunOptions {
            runs: 8,
            concurrency: 2,
            ..RunOptions::default()
        };
        assert_eq!(opts.validate().unwrap().concurrency, 2);
    }
}
