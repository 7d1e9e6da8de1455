//! Engine configuration.

use std::time::Duration;

/// Default seconds between polling attempts, when the project sets none.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default number of records fetched per recovery batch.
const DEFAULT_RECOVERY_BATCH_SIZE: usize = 100;

/// Default seconds the sweeper sleeps between batches, bounding the load a
/// sweep puts on the provider and the database.
const DEFAULT_RECOVERY_BATCH_DELAY_SECS: u64 = 60;

/// Default cap on simultaneously in-flight polling tasks.
const DEFAULT_MAX_CONCURRENT_POLLS: usize = 512;

/// Tunables of the acquisition lifecycle engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Delay between polling attempts for projects without their own.
    pub poll_interval: Duration,

    /// Records fetched per recovery batch.
    pub recovery_batch_size: usize,

    /// Sleep between recovery batches.
    pub recovery_batch_delay: Duration,

    /// Cap on simultaneously in-flight polling tasks. Polls past the cap
    /// wait for a permit before their first provider call.
    pub max_concurrent_polls: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            recovery_batch_size: DEFAULT_RECOVERY_BATCH_SIZE,
            recovery_batch_delay: Duration::from_secs(DEFAULT_RECOVERY_BATCH_DELAY_SECS),
            max_concurrent_polls: DEFAULT_MAX_CONCURRENT_POLLS,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            poll_interval: Duration::from_secs(env_u64(
                "NUMLEASE_POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            )),
            recovery_batch_size: env_usize(
                "NUMLEASE_RECOVERY_BATCH_SIZE",
                DEFAULT_RECOVERY_BATCH_SIZE,
            ),
            recovery_batch_delay: Duration::from_secs(env_u64(
                "NUMLEASE_RECOVERY_BATCH_DELAY_SECS",
                DEFAULT_RECOVERY_BATCH_DELAY_SECS,
            )),
            max_concurrent_polls: env_usize(
                "NUMLEASE_MAX_CONCURRENT_POLLS",
                DEFAULT_MAX_CONCURRENT_POLLS,
            ),
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
