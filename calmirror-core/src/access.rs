//! Entry points for reading a cached account.
//!
//! Every query runs the same sequence: classify the cache, refresh it if
//! this caller won the lease, then assemble the answer from storage.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::account::AccountKey;
use crate::alarm::AlarmSource;
use crate::cache::{
    CacheRefresher, CacheSettings, LockCoordinator, ProcessingType, classify,
    resolve_refresh_interval,
};
use crate::clock::Clock;
use crate::error::{MirrorError, MirrorResult, Warning};
use crate::event::{Event, EventId};
use crate::projection::{
    Projection, QueryParams, UpdatesResult, change_exceptions, filter_and_sort, matches_pattern,
    overlay_alarms,
};
use crate::remote::CalendarProvider;
use crate::store::{AccountStore, EventStore};

/// The read operations offered for one account.
pub trait CalendarAccess: Send + Sync {
    fn account(&self) -> AccountKey;

    /// One event, or one change exception when `id.recurrence_id` is set.
    fn get_event(&self, id: &EventId, params: &QueryParams) -> MirrorResult<Projection<Event>>;

    /// Looks up each id; missing ones come back as `None` in their slot.
    fn get_events(
        &self,
        ids: &[EventId],
        params: &QueryParams,
    ) -> MirrorResult<Projection<Vec<Option<Event>>>>;

    fn get_events_for_account(&self, params: &QueryParams) -> MirrorResult<Projection<Vec<Event>>>;

    fn get_change_exceptions(
        &self,
        series_uid: &str,
        params: &QueryParams,
    ) -> MirrorResult<Projection<Vec<Event>>>;

    fn search_events(&self, pattern: &str, params: &QueryParams) -> MirrorResult<Projection<Vec<Event>>>;

    fn get_updated_since(
        &self,
        since: DateTime<Utc>,
        params: &QueryParams,
    ) -> MirrorResult<Projection<UpdatesResult>>;
}

/// Outcome of the classify-then-maybe-refresh step.
#[derive(Debug, Clone, PartialEq)]
pub struct Preparation {
    pub processing: ProcessingType,
    pub warnings: Vec<Warning>,
}

/// Serves an account from the local mirror, refreshing it when stale.
pub struct CachingCalendarAccess {
    key: AccountKey,
    provider: Arc<dyn CalendarProvider>,
    accounts: Arc<dyn AccountStore>,
    events: Arc<dyn EventStore>,
    alarms: Arc<dyn AlarmSource>,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
}

impl CachingCalendarAccess {
    pub fn new(
        key: AccountKey,
        provider: Arc<dyn CalendarProvider>,
        accounts: Arc<dyn AccountStore>,
        events: Arc<dyn EventStore>,
        alarms: Arc<dyn AlarmSource>,
        clock: Arc<dyn Clock>,
        settings: CacheSettings,
    ) -> Self {
        CachingCalendarAccess {
            key,
            provider,
            accounts,
            events,
            alarms,
            clock,
            settings,
        }
    }

    /// Classify the cache and, if this caller wins the lease, refresh it.
    pub fn prepare(&self) -> MirrorResult<Preparation> {
        let mut account = self.accounts.get_account(&self.key)?;
        let now = self.clock.now();
        let interval = resolve_refresh_interval(&account, self.provider.as_ref(), &self.settings);
        let coordinator = LockCoordinator::new(self.accounts.as_ref(), self.settings.lease_duration);

        let caching = account.internal.caching();
        let mut lease = None;
        let processing = classify(&caching, interval, now, || {
            lease = coordinator.acquire(&mut account, now)?;
            Ok(lease.is_some())
        })?;

        debug!(account = %self.key, ?processing, "cache classified");

        let warnings = match lease {
            Some(lease) if processing.needs_refresh() => {
                let refresher = CacheRefresher {
                    accounts: self.accounts.as_ref(),
                    events: self.events.as_ref(),
                    provider: self.provider.as_ref(),
                    clock: self.clock.as_ref(),
                    coordinator,
                };
                refresher.refresh(&mut account, &lease)?.warnings
            }
            _ => Vec::new(),
        };

        Ok(Preparation {
            processing,
            warnings,
        })
    }

    fn cached_events(&self) -> MirrorResult<Vec<Event>> {
        Ok(self
            .events
            .read_events(&self.key)?
            .into_iter()
            .map(|stored| stored.event)
            .collect())
    }

    fn with_alarms(&self, events: &mut [Event], params: &QueryParams) -> MirrorResult<()> {
        if !params.include_alarms || events.is_empty() {
            return Ok(());
        }
        let ids: Vec<EventId> = events.iter().map(Event::id).collect();
        let alarms = self.alarms.alarms_for(&self.key, &ids)?;
        overlay_alarms(events, &alarms);
        Ok(())
    }

    fn list<F>(&self, params: &QueryParams, select: F) -> MirrorResult<Projection<Vec<Event>>>
    where
        F: FnOnce(Vec<Event>) -> Vec<Event>,
    {
        let prepared = self.prepare()?;
        let mut events = select(self.cached_events()?);
        self.with_alarms(&mut events, params)?;
        Ok(Projection::new(events, prepared.warnings))
    }
}

impl CalendarAccess for CachingCalendarAccess {
    fn account(&self) -> AccountKey {
        self.key
    }

    fn get_event(&self, id: &EventId, params: &QueryParams) -> MirrorResult<Projection<Event>> {
        let prepared = self.prepare()?;
        let event = self
            .cached_events()?
            .into_iter()
            .find(|e| e.id() == *id)
            .ok_or_else(|| MirrorError::EventNotFound(id.clone()))?;

        let mut events = [event];
        self.with_alarms(&mut events, params)?;
        let [event] = events;
        Ok(Projection::new(event, prepared.warnings))
    }

    fn get_events(
        &self,
        ids: &[EventId],
        params: &QueryParams,
    ) -> MirrorResult<Projection<Vec<Option<Event>>>> {
        let prepared = self.prepare()?;
        let cached = self.cached_events()?;

        let mut found: Vec<Event> = ids
            .iter()
            .filter_map(|id| cached.iter().find(|e| e.id() == *id).cloned())
            .collect();
        self.with_alarms(&mut found, params)?;

        let data = ids
            .iter()
            .map(|id| found.iter().find(|e| e.id() == *id).cloned())
            .collect();
        Ok(Projection::new(data, prepared.warnings))
    }

    fn get_events_for_account(&self, params: &QueryParams) -> MirrorResult<Projection<Vec<Event>>> {
        self.list(params, |events| filter_and_sort(events, params))
    }

    fn get_change_exceptions(
        &self,
        series_uid: &str,
        params: &QueryParams,
    ) -> MirrorResult<Projection<Vec<Event>>> {
        self.list(params, |events| change_exceptions(events, series_uid, params))
    }

    fn search_events(&self, pattern: &str, params: &QueryParams) -> MirrorResult<Projection<Vec<Event>>> {
        self.list(params, |events| {
            let matching = events
                .into_iter()
                .filter(|e| matches_pattern(e, pattern))
                .collect();
            filter_and_sort(matching, params)
        })
    }

    fn get_updated_since(
        &self,
        since: DateTime<Utc>,
        params: &QueryParams,
    ) -> MirrorResult<Projection<UpdatesResult>> {
        let prepared = self.prepare()?;

        let changed = self
            .events
            .read_events(&self.key)?
            .into_iter()
            .filter(|stored| stored.stored_at > since)
            .map(|stored| stored.event)
            .collect();
        let mut new_and_modified = filter_and_sort(changed, params);
        self.with_alarms(&mut new_and_modified, params)?;

        let deleted = self
            .events
            .read_tombstones(&self.key, since)?
            .into_iter()
            .map(|t| t.id)
            .collect();

        Ok(Projection::new(
            UpdatesResult {
                new_and_modified,
                deleted,
            },
            prepared.warnings,
        ))
    }
}
