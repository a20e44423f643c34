#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use calmirror_core::cache::CacheSettings;
use calmirror_core::{CachingCalendarAccess, CalendarMirror};
use calmirror_core::account::{AccountKey, AccountRecord, REFRESH_INTERVAL_KEY};
use calmirror_core::alarm::MemoryAlarmSource;
use calmirror_core::clock::FixedClock;
use calmirror_core::error::{MirrorError, MirrorResult, Warning};
use calmirror_core::event::{Event, EventStatus, EventTime};
use calmirror_core::remote::{CalendarProvider, ErrorPolicy, FetchedEvents};
use calmirror_core::store::{AccountStore, MemoryAccountStore, MemoryEventStore};
use chrono::{DateTime, Duration, TimeZone, Utc};

pub const PROVIDER_ID: &str = "scripted";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 20, 12, 0, 0).unwrap()
}

pub fn make_test_event(uid: &str, summary: &str, day: u32) -> Event {
    let start = Utc.with_ymd_and_hms(2025, 3, day, 15, 0, 0).unwrap();
    Event {
        uid: uid.to_string(),
        recurrence_id: None,
        summary: summary.to_string(),
        description: None,
        location: None,
        start: EventTime::DateTime(start),
        end: EventTime::DateTime(start + Duration::hours(1)),
        status: EventStatus::Confirmed,
        recurrence: None,
        reminders: vec![],
        updated: None,
        sequence: None,
    }
}

/// A remote source whose answers are set by the test.
#[derive(Default)]
pub struct ScriptedProvider {
    events: Mutex<Vec<Event>>,
    warnings: Mutex<Vec<Warning>>,
    failure: Mutex<Option<String>>,
    init_failure: Mutex<Option<String>>,
    backoff: Mutex<Option<Duration>>,
    delay: Mutex<Option<StdDuration>>,
    fetches: AtomicUsize,
    handled_errors: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(events: Vec<Event>) -> Self {
        let provider = ScriptedProvider::default();
        provider.set_events(events);
        provider
    }

    pub fn set_events(&self, events: Vec<Event>) {
        *self.events.lock().unwrap() = events;
    }

    pub fn set_warnings(&self, warnings: Vec<Warning>) {
        *self.warnings.lock().unwrap() = warnings;
    }

    pub fn fail_with(&self, message: Option<&str>) {
        *self.failure.lock().unwrap() = message.map(String::from);
    }

    pub fn fail_init_with(&self, message: &str) {
        *self.init_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn back_off(&self, duration: Duration) {
        *self.backoff.lock().unwrap() = Some(duration);
    }

    pub fn slow_down(&self, delay: StdDuration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn handled_errors(&self) -> usize {
        self.handled_errors.load(Ordering::SeqCst)
    }
}

impl CalendarProvider for ScriptedProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn initialize(&self, _account: &AccountRecord) -> MirrorResult<()> {
        match self.init_failure.lock().unwrap().clone() {
            Some(message) => Err(MirrorError::Config(message)),
            None => Ok(()),
        }
    }

    fn fetch_all_events(&self, _account: &AccountRecord) -> MirrorResult<FetchedEvents> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let failure = self.failure.lock().unwrap().clone();
        if let Some(message) = failure {
            return Err(MirrorError::Remote(message));
        }

        Ok(FetchedEvents {
            events: self.events.lock().unwrap().clone(),
            warnings: self.warnings.lock().unwrap().clone(),
        })
    }

    fn handle_error(&self, _account: &AccountRecord, _err: &MirrorError) -> ErrorPolicy {
        self.handled_errors.fetch_add(1, Ordering::SeqCst);
        match *self.backoff.lock().unwrap() {
            Some(backoff) => ErrorPolicy::backoff(backoff),
            None => ErrorPolicy::propagate(),
        }
    }
}

pub struct Harness {
    pub key: AccountKey,
    pub accounts: Arc<MemoryAccountStore>,
    pub events: Arc<MemoryEventStore>,
    pub alarms: Arc<MemoryAlarmSource>,
    pub clock: Arc<FixedClock>,
    pub provider: Arc<ScriptedProvider>,
    pub mirror: CalendarMirror,
}

impl Harness {
    /// One account with a 60 minute refresh interval and no caching block.
    pub fn new(events: Vec<Event>) -> Self {
        let key = AccountKey::new(1, 2, 3);
        let accounts = Arc::new(MemoryAccountStore::new());
        let events_store = Arc::new(MemoryEventStore::new());
        let alarms = Arc::new(MemoryAlarmSource::new());
        let clock = Arc::new(FixedClock::new(start_time()));
        let provider = Arc::new(ScriptedProvider::new(events));

        let mut record = AccountRecord::new(key, PROVIDER_ID);
        record.user.set(REFRESH_INTERVAL_KEY, 60);
        accounts.insert_account(record).unwrap();

        let mirror = CalendarMirror::new(accounts.clone(), events_store.clone())
            .with_provider(provider.clone())
            .with_alarms(alarms.clone())
            .with_clock(clock.clone());

        Harness {
            key,
            accounts,
            events: events_store,
            alarms,
            clock,
            provider,
            mirror,
        }
    }

    /// Direct caching access, bypassing provider initialization.
    pub fn caching_access(&self) -> CachingCalendarAccess {
        CachingCalendarAccess::new(
            self.key,
            self.provider.clone(),
            self.accounts.clone(),
            self.events.clone(),
            self.alarms.clone(),
            self.clock.clone(),
            CacheSettings::default(),
        )
    }

    pub fn account(&self) -> AccountRecord {
        self.accounts.get_account(&self.key).unwrap()
    }

    pub fn last_update(&self) -> Option<i64> {
        self.account().internal.caching().last_update
    }

    /// Overwrite the caching block as if a previous refresh left it so.
    pub fn set_last_update(&self, at: DateTime<Utc>) {
        let account = self.account();
        let mut internal = account.internal.clone();
        internal.caching_mut().last_update = Some(at.timestamp_millis());
        self.accounts
            .update_account(&self.key, &internal, None, account.version)
            .unwrap();
    }
}
