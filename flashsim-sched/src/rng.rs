//! Seeded random number generation for the scheduler.
//!
//! The scheduler owns its generator and threads it explicitly to the one
//! place that needs randomness: the tie-breaking shuffle of events sharing
//! a timestamp. Block managers that want shared randomness go through
//! [`IoScheduler::random_range`](crate::IoScheduler::random_range) so a
//! single seed governs the whole run.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A deterministic generator seeded from the run configuration.
#[derive(Debug, Clone)]
pub struct SchedulerRng {
    rng: ChaCha8Rng,
}

impl SchedulerRng {
    /// Create a generator from a seed. The same seed always produces the
    /// same sequence.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// A uniform value in `0..limit`. Returns 0 when `limit` is 0.
    pub fn random_range(&mut self, limit: usize) -> usize {
        if limit == 0 {
            return 0;
        }
        self.rng.random_range(0..limit)
    }

    /// Shuffle a slice in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }
}
