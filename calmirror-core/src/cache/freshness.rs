//! Decides, on every request, whether the cache may be served as is.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::account::{AccountRecord, CachingState};
use crate::cache::CacheSettings;
use crate::error::MirrorResult;
use crate::remote::CalendarProvider;

/// What the current caller has to do before serving a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingType {
    /// Nothing cached yet and this caller holds the lease: populate it.
    InitialInsert,
    /// Cache is stale and this caller holds the lease: repopulate it.
    Update,
    /// Serve whatever is cached.
    ReadDb,
}

impl ProcessingType {
    pub fn needs_refresh(self) -> bool {
        !matches!(self, ProcessingType::ReadDb)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Staleness {
    NeverRefreshed,
    Stale,
    Fresh,
}

/// Non-positive or unrepresentable intervals fall back to `default`.
pub fn refresh_interval_from_minutes(minutes: i64, default: Duration) -> Duration {
    if minutes <= 0 {
        return default;
    }
    Duration::try_minutes(minutes).unwrap_or(default)
}

/// The account's own setting wins, then the provider's, then the default.
pub fn resolve_refresh_interval(
    account: &AccountRecord,
    provider: &dyn CalendarProvider,
    settings: &CacheSettings,
) -> Duration {
    let provider_interval =
        refresh_interval_from_minutes(provider.refresh_interval(), settings.default_refresh_interval);

    match account.user.refresh_interval_minutes() {
        Some(minutes) => refresh_interval_from_minutes(minutes, provider_interval),
        None => provider_interval,
    }
}

pub fn staleness(caching: &CachingState, interval: Duration, now: DateTime<Utc>) -> Staleness {
    match caching.last_update_at() {
        None => Staleness::NeverRefreshed,
        Some(last_update) if now - last_update >= interval => Staleness::Stale,
        Some(_) => Staleness::Fresh,
    }
}

/// Map the caching state to a decision. `acquire_lease` is only called
/// when the cache is stale or missing, at most once.
pub fn classify<F>(
    caching: &CachingState,
    interval: Duration,
    now: DateTime<Utc>,
    acquire_lease: F,
) -> MirrorResult<ProcessingType>
where
    F: FnOnce() -> MirrorResult<bool>,
{
    let state = staleness(caching, interval, now);
    if state == Staleness::Fresh {
        return Ok(ProcessingType::ReadDb);
    }

    if !acquire_lease()? {
        // Someone else is refreshing
        return Ok(ProcessingType::ReadDb);
    }

    Ok(match state {
        Staleness::NeverRefreshed => ProcessingType::InitialInsert,
        _ => ProcessingType::Update,
    })
}
