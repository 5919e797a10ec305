//! Environment abstraction for time and randomness.
//!
//! Envelope timestamps and freshly minted identities come from here so that
//! tests can pin both.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;

/// Source of wall-clock time and random bytes.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current time as whole seconds since the unix epoch.
    fn unix_time(&self) -> i64;

    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);
}

/// Production environment backed by the system clock and thread RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn unix_time(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        rand::thread_rng().fill_bytes(buffer);
    }
}
