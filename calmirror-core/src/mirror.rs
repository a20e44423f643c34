//! Wiring: the shared collaborators plus a provider registry, handing out
//! per-account access.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::access::{CachingCalendarAccess, CalendarAccess};
use crate::account::{AccountKey, AccountRecord};
use crate::alarm::{AlarmSource, NoAlarms};
use crate::cache::{CacheSettings, Staleness, resolve_refresh_interval, staleness};
use crate::clock::{Clock, SystemClock};
use crate::error::{MirrorError, MirrorResult};
use crate::fallback::FallbackAccess;
use crate::remote::CalendarProvider;
use crate::store::{AccountStore, EventStore};

/// Caching state of one account, read without taking a lease.
#[derive(Debug, Clone, PartialEq)]
pub struct CachingStatus {
    pub key: AccountKey,
    pub provider: String,
    pub last_update: Option<DateTime<Utc>>,
    pub lease_expiry: Option<DateTime<Utc>>,
    pub locked: bool,
    pub staleness: Staleness,
    pub refresh_interval: Duration,
    pub cached_events: usize,
}

pub struct CalendarMirror {
    accounts: Arc<dyn AccountStore>,
    events: Arc<dyn EventStore>,
    alarms: Arc<dyn AlarmSource>,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
    providers: HashMap<String, Arc<dyn CalendarProvider>>,
}

impl CalendarMirror {
    pub fn new(accounts: Arc<dyn AccountStore>, events: Arc<dyn EventStore>) -> Self {
        CalendarMirror {
            accounts,
            events,
            alarms: Arc::new(NoAlarms),
            clock: Arc::new(SystemClock),
            settings: CacheSettings::default(),
            providers: HashMap::new(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn CalendarProvider>) -> Self {
        self.providers.insert(provider.id().to_string(), provider);
        self
    }

    pub fn with_alarms(mut self, alarms: Arc<dyn AlarmSource>) -> Self {
        self.alarms = alarms;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_settings(mut self, settings: CacheSettings) -> Self {
        self.settings = settings;
        self
    }

    fn provider_for(&self, account: &AccountRecord) -> MirrorResult<Arc<dyn CalendarProvider>> {
        self.providers.get(&account.provider).cloned().ok_or_else(|| {
            MirrorError::Config(format!(
                "No provider '{}' registered for account {}",
                account.provider, account.key
            ))
        })
    }

    /// Access to one account: caching when its provider initializes,
    /// the fallback otherwise.
    pub fn open(&self, key: &AccountKey) -> MirrorResult<Box<dyn CalendarAccess>> {
        let account = self.accounts.get_account(key)?;

        let provider = match self
            .provider_for(&account)
            .and_then(|p| p.initialize(&account).map(|_| p))
        {
            Ok(provider) => provider,
            Err(e) => {
                warn!(account = %key, error = %e, "calendar source unusable, serving fallback");
                return Ok(Box::new(FallbackAccess::new(*key, &e)));
            }
        };

        Ok(Box::new(CachingCalendarAccess::new(
            *key,
            provider,
            self.accounts.clone(),
            self.events.clone(),
            self.alarms.clone(),
            self.clock.clone(),
            self.settings.clone(),
        )))
    }

    pub fn add_account(&self, record: AccountRecord) -> MirrorResult<AccountRecord> {
        let record = self.accounts.insert_account(record)?;
        info!(account = %record.key, provider = %record.provider, "account added");
        Ok(record)
    }

    /// Delete the account and everything mirrored for it.
    pub fn remove_account(&self, key: &AccountKey) -> MirrorResult<()> {
        self.accounts.delete_account(key)?;
        self.events.delete_all(key)?;
        info!(account = %key, "account removed, cache purged");
        Ok(())
    }

    pub fn caching_status(&self, key: &AccountKey) -> MirrorResult<CachingStatus> {
        let account = self.accounts.get_account(key)?;
        let now = self.clock.now();

        let refresh_interval = match self.provider_for(&account) {
            Ok(provider) => resolve_refresh_interval(&account, provider.as_ref(), &self.settings),
            Err(_) => self.settings.default_refresh_interval,
        };

        let caching = account.internal.caching();
        Ok(CachingStatus {
            key: *key,
            provider: account.provider.clone(),
            last_update: caching.last_update_at(),
            lease_expiry: caching.lease_expiry(),
            locked: caching.is_locked_at(now),
            staleness: staleness(&caching, refresh_interval, now),
            refresh_interval,
            cached_events: self.events.read_events(key)?.len(),
        })
    }
}
