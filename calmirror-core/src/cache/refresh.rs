//! Pulls the remote event set into the local mirror.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::account::AccountRecord;
use crate::cache::lease::{Lease, LockCoordinator};
use crate::clock::Clock;
use crate::diff::CacheDiff;
use crate::error::{MirrorError, MirrorResult, Warning};
use crate::remote::CalendarProvider;
use crate::store::{AccountStore, EventStore};

/// What a completed refresh did.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub warnings: Vec<Warning>,
    pub completed_at: DateTime<Utc>,
}

pub struct CacheRefresher<'a> {
    pub accounts: &'a dyn AccountStore,
    pub events: &'a dyn EventStore,
    pub provider: &'a dyn CalendarProvider,
    pub clock: &'a dyn Clock,
    pub coordinator: LockCoordinator<'a>,
}

impl CacheRefresher<'_> {
    /// Synchronize the mirror for `account`. Only call this while holding `lease`.
    ///
    /// A failed fetch leaves storage and `lastUpdate` untouched; the
    /// provider's error hook may extend the lease as a backoff before the
    /// error is returned.
    ///
    /// The event batch is committed before `lastUpdate`. If that last write
    /// fails the error is returned with the batch already in place: it is
    /// the remote's current state, and the unchanged `lastUpdate` keeps the
    /// account stale, so the next refresh finds an empty diff and only
    /// records the stamp.
    pub fn refresh(&self, account: &mut AccountRecord, lease: &Lease) -> MirrorResult<RefreshReport> {
        let fetched = match self.provider.fetch_all_events(account) {
            Ok(fetched) => fetched,
            Err(err) => {
                self.handle_fetch_error(account, &err);
                return Err(err);
            }
        };

        let cached = self
            .events
            .read_events(&account.key)?
            .into_iter()
            .map(|stored| stored.event)
            .collect();

        let diff = CacheDiff::between(cached, fetched.events);
        let (created, updated, deleted) = diff.counts();

        let mut warnings = fetched.warnings;
        warnings.extend(diff.warnings.iter().cloned());
        for warning in &warnings {
            warn!(account = %account.key, %warning, "refresh warning");
        }

        let completed_at = self.clock.now();
        if !diff.is_empty() {
            self.events
                .write_events(&account.key, &diff.changes, completed_at)?;
        }

        if completed_at > lease.held_until {
            warn!(
                account = %account.key,
                held_until = %lease.held_until,
                "refresh outlived its lease"
            );
        }

        self.record_success(account, completed_at)?;

        info!(
            account = %account.key,
            created, updated, deleted,
            warnings = warnings.len(),
            "cache refreshed"
        );

        Ok(RefreshReport {
            created,
            updated,
            deleted,
            warnings,
            completed_at,
        })
    }

    fn handle_fetch_error(&self, account: &mut AccountRecord, err: &MirrorError) {
        warn!(account = %account.key, error = %err, "remote fetch failed, keeping cached data");

        let policy = self.provider.handle_error(account, err);
        let Some(backoff) = policy.backoff else {
            return;
        };

        let Some(until) = self.clock.now().checked_add_signed(backoff) else {
            warn!(account = %account.key, %backoff, "refresh backoff out of range, ignoring");
            return;
        };
        match self.coordinator.hold_until(account, until) {
            Ok(true) => info!(account = %account.key, %until, "backing off refreshes"),
            Ok(false) => {}
            Err(e) => warn!(account = %account.key, error = %e, "could not record refresh backoff"),
        }
    }

    /// Advance `lastUpdate`, retrying once on a version conflict.
    fn record_success(&self, account: &mut AccountRecord, at: DateTime<Utc>) -> MirrorResult<()> {
        match self.write_last_update(account, at) {
            Err(e) if e.is_conflict() => {
                *account = self.accounts.get_account(&account.key)?;
                self.write_last_update(account, at)
            }
            result => result,
        }
    }

    fn write_last_update(&self, account: &mut AccountRecord, at: DateTime<Utc>) -> MirrorResult<()> {
        let mut internal = account.internal.clone();
        let caching = internal.caching_mut();
        let at_ms = at.timestamp_millis();
        caching.last_update = Some(caching.last_update.map_or(at_ms, |prev| prev.max(at_ms)));

        *account = self
            .accounts
            .update_account(&account.key, &internal, None, account.version)?;
        Ok(())
    }
}
