//! Runtime configuration for the synchronization core.
//!
//! Defaults are tuned for dashboard workloads; every knob can be overridden
//! from the environment:
//!
//! - `ORDERS_DEBOUNCE_MS` - view debounce window (default 250)
//! - `ORDERS_DELTA_CAPACITY` - per-tenant delta channel capacity
//! - `ORDERS_RESYNC_INITIAL_MS` / `ORDERS_RESYNC_MAX_MS` - resync backoff
//! - `ORDERS_RESYNC_ATTEMPTS` - attempts before views are marked degraded

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff policy for resynchronization after a reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResyncConfig {
    /// First retry delay, in milliseconds
    pub initial_backoff_ms: u64,
    /// Backoff ceiling, in milliseconds
    pub max_backoff_ms: u64,
    /// Failed attempts tolerated before views are told the data may be stale
    pub attempts_before_degraded: u32,
}

impl Default for ResyncConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            attempts_before_degraded: 3,
        }
    }
}

impl ResyncConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

/// Configuration for routers and view subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Debounce window for coalescing delta bursts, in milliseconds.
    /// Coalescing bounds recompute cost; it never changes the final state.
    pub debounce_window_ms: u64,

    /// Capacity of the per-tenant delta broadcast channel. A view that lags
    /// past this rebuilds from the canonical set instead of missing deltas.
    pub delta_channel_capacity: usize,

    /// Resynchronization backoff policy
    pub resync: ResyncConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_window_ms: 250,
            delta_channel_capacity: 1024,
            resync: ResyncConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Defaults overridden by any `ORDERS_*` environment variables present.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_parse("ORDERS_DEBOUNCE_MS") {
            config.debounce_window_ms = v;
        }
        if let Some(v) = env_parse("ORDERS_DELTA_CAPACITY") {
            config.delta_channel_capacity = v;
        }
        if let Some(v) = env_parse("ORDERS_RESYNC_INITIAL_MS") {
            config.resync.initial_backoff_ms = v;
        }
        if let Some(v) = env_parse("ORDERS_RESYNC_MAX_MS") {
            config.resync.max_backoff_ms = v;
        }
        if let Some(v) = env_parse("ORDERS_RESYNC_ATTEMPTS") {
            config.resync.attempts_before_degraded = v;
        }
        config
    }

    /// Zero-delay variant for tests, so flushes happen on the next tick.
    pub fn immediate() -> Self {
        Self {
            debounce_window_ms: 0,
            resync: ResyncConfig {
                initial_backoff_ms: 1,
                max_backoff_ms: 4,
                attempts_before_degraded: 2,
            },
            ..Self::default()
        }
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
