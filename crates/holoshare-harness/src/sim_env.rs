//! Seeded environment with a manual clock.

use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};

use holoshare_core::Environment;
use parking_lot::Mutex;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Environment whose randomness is reproducible from a seed and whose clock
/// only moves when told to.
///
/// Clones share the RNG and the clock.
#[derive(Debug, Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha8Rng>>,
    clock: Arc<AtomicI64>,
}

impl SimEnv {
    /// Start of simulated time, unix seconds.
    pub const EPOCH: i64 = 1_700_000_000;

    /// Environment seeded with `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
            clock: Arc::new(AtomicI64::new(Self::EPOCH)),
        }
    }

    /// Move the clock forward by `seconds`.
    pub fn advance(&self, seconds: i64) {
        self.clock.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl Environment for SimEnv {
    fn unix_time(&self) -> i64 {
        self.clock.load(Ordering::SeqCst)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().fill_bytes(buffer);
    }
}
