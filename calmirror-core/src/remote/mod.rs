//! Remote calendar sources.
//!
//! A provider is whatever sits behind an account: it declares how often
//! its data goes stale, fetches the full current event set, and gets a say
//! in what happens after a failed fetch.

mod snapshot;

pub use snapshot::{SNAPSHOT_PROVIDER_ID, SOURCE_KEY, SnapshotProvider};

use chrono::Duration;

use crate::account::AccountRecord;
use crate::error::{MirrorError, MirrorResult, Warning};
use crate::event::Event;

/// Result of a full fetch: the events plus recoverable problems.
#[derive(Debug, Clone, Default)]
pub struct FetchedEvents {
    pub events: Vec<Event>,
    pub warnings: Vec<Warning>,
}

impl FetchedEvents {
    pub fn new(events: Vec<Event>) -> Self {
        FetchedEvents {
            events,
            warnings: Vec::new(),
        }
    }
}

/// What the caching layer should do after a failed fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorPolicy {
    /// Hold the refresh lease this long from now, so peers keep serving the
    /// stale cache instead of hammering the source.
    pub backoff: Option<Duration>,
}

impl ErrorPolicy {
    pub fn propagate() -> Self {
        ErrorPolicy::default()
    }

    pub fn backoff(duration: Duration) -> Self {
        ErrorPolicy {
            backoff: Some(duration),
        }
    }
}

pub trait CalendarProvider: Send + Sync {
    /// Short identifier matching `AccountRecord::provider`.
    fn id(&self) -> &str;

    /// Refresh interval in minutes. Non-positive values mean "use the
    /// configured default".
    fn refresh_interval(&self) -> i64 {
        0
    }

    /// Check that the account is usable at all. Failing here selects the
    /// fallback access instead of the caching one.
    fn initialize(&self, _account: &AccountRecord) -> MirrorResult<()> {
        Ok(())
    }

    fn fetch_all_events(&self, account: &AccountRecord) -> MirrorResult<FetchedEvents>;

    fn handle_error(&self, _account: &AccountRecord, _err: &MirrorError) -> ErrorPolicy {
        ErrorPolicy::propagate()
    }
}
