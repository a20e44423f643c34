//! Staleness decisions, refresh leases, and the refresh itself.

mod freshness;
mod lease;
mod refresh;

pub use freshness::{
    ProcessingType, Staleness, classify, refresh_interval_from_minutes, resolve_refresh_interval,
    staleness,
};
pub use lease::{Lease, LockCoordinator};
pub use refresh::{CacheRefresher, RefreshReport};

use chrono::Duration;

/// Refresh interval used when neither the account nor its provider declares one.
pub const DEFAULT_REFRESH_INTERVAL_MINUTES: i64 = 24 * 60;

/// How long a refresh lease keeps other callers away.
pub const DEFAULT_LEASE_MINUTES: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub default_refresh_interval: Duration,
    pub lease_duration: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            default_refresh_interval: Duration::minutes(DEFAULT_REFRESH_INTERVAL_MINUTES),
            lease_duration: Duration::minutes(DEFAULT_LEASE_MINUTES),
        }
    }
}
