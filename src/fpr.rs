//! Empirical false positive rate measurement.
use crate::error::{BloomError, Result};
use crate::filter::BloomFilter;
use crate::storage::BitStorage;
use derive_builder::Builder;
use rayon::prelude::*;
use std::thread;
use tracing::{debug, warn};

/// Number of absent keys tested after the insert phase.
pub const DEFAULT_ROUNDS: u32 = 100_000;

/// Upper bound on operations running at the same time.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 1000;

/// Measures how often a filter answers "present" for keys it never saw.
///
/// Keys are 4-byte big-endian integers: `0..n` are inserted, then `rounds`
/// keys starting at `n + 1` are tested. Both phases run on a dedicated
/// thread pool whose size is the admission gate; the test phase starts
/// only after every insert finished. The filter is cleared before and
/// after the run. Inserted and tested keys must all fit in a `u32`, so
/// `n + rounds` may not exceed `u32::MAX`.
#[derive(Debug, Clone, Builder)]
#[builder(pattern = "owned")]
pub struct FprEstimator {
    #[builder(default = "DEFAULT_ROUNDS")]
    pub rounds: u32,

    #[builder(default = "DEFAULT_MAX_IN_FLIGHT")]
    pub max_in_flight: usize,
}

impl Default for FprEstimator {
    fn default() -> Self {
        Self {
            rounds: DEFAULT_ROUNDS,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

impl FprEstimator {
    /// Worker threads used for a run.
    ///
    /// Never more than `max_in_flight`; capped near the machine's
    /// parallelism since the in-memory backend serializes on one lock and
    /// a single redis connection does the same.
    pub fn workers(&self) -> usize {
        let cores = thread::available_parallelism().map_or(4, |n| n.get());
        self.max_in_flight.min(cores * 4).max(1)
    }

    pub fn estimate<S: BitStorage>(
        &self,
        filter: &BloomFilter<S>,
        n: u32,
    ) -> Result<f64> {
        if self.rounds == 0 {
            return Err(BloomError::InvalidConfig(
                "Estimation needs at least one round".into(),
            ));
        }
        if u64::from(n) + u64::from(self.rounds) > u64::from(u32::MAX) {
            return Err(BloomError::InvalidConfig(format!(
                "Estimation keys overflow u32: n={} rounds={}",
                n, self.rounds
            )));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers())
            .thread_name(|i| format!("bloom-fpr-{i}"))
            .build()
            .map_err(|e| {
                BloomError::InvalidConfig(format!(
                    "Failed to build estimation pool: {}",
                    e
                ))
            })?;

        filter.clear_all()?;
        let outcome = pool.install(|| self.run_phases(filter, n));
        // Leave the filter empty even when a phase failed
        let cleared = filter.clear_all();

        let false_positives = match (outcome, cleared) {
            (Ok(count), Ok(())) => count,
            (Ok(_), Err(e)) => return Err(e),
            (Err(e), Ok(())) => return Err(e),
            (Err(e), Err(clear_err)) => {
                warn!(error = %clear_err, "Failed to clear filter after estimation error");
                return Err(e);
            }
        };
        let rate = false_positives as f64 / self.rounds as f64;
        debug!(n, rounds = self.rounds, false_positives, rate, "Estimated false positive rate");
        Ok(rate)
    }

    fn run_phases<S: BitStorage>(
        &self,
        filter: &BloomFilter<S>,
        n: u32,
    ) -> Result<usize> {
        debug!(n, "Inserting estimation keys");
        (0..n)
            .into_par_iter()
            .try_for_each(|i| filter.add(&i.to_be_bytes()))?;

        debug!(rounds = self.rounds, "Testing disjoint keys");
        (n + 1..=n + self.rounds)
            .into_par_iter()
            .map(|i| {
                let key = i.to_be_bytes();
                filter.test(&key).map(usize::from)
            })
            .try_reduce(|| 0, |a, b| Ok(a + b))
    }
}
