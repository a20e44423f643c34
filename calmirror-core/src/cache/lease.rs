//! Refresh leases encoded in the account record.
//!
//! There is no in-process lock here. A lease is a `lockedForUpdateUntil`
//! stamp written with the store's conditional update, so the store's
//! version check decides the winner across every process sharing it.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::account::AccountRecord;
use crate::error::{MirrorError, MirrorResult};
use crate::store::AccountStore;

/// A successfully claimed right to refresh one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    pub held_until: DateTime<Utc>,
    /// Account version the winning write was conditioned on.
    pub attempt_version: u64,
}

pub struct LockCoordinator<'a> {
    store: &'a dyn AccountStore,
    lease_duration: Duration,
}

impl<'a> LockCoordinator<'a> {
    pub fn new(store: &'a dyn AccountStore, lease_duration: Duration) -> Self {
        LockCoordinator {
            store,
            lease_duration,
        }
    }

    /// Try to claim the refresh lease for `account` as last read.
    ///
    /// On success `account` is replaced by the stored record carrying the
    /// lease. On a version conflict it is replaced by a fresh read and
    /// `None` is returned; the peer's write stands and nothing is retried.
    pub fn acquire(
        &self,
        account: &mut AccountRecord,
        now: DateTime<Utc>,
    ) -> MirrorResult<Option<Lease>> {
        let caching = account.internal.caching();
        if caching.is_locked_at(now) {
            debug!(
                account = %account.key,
                locked_until = caching.locked_for_update_until,
                "refresh lease held elsewhere"
            );
            return Ok(None);
        }

        let held_until = now.checked_add_signed(self.lease_duration).ok_or_else(|| {
            MirrorError::Config(format!(
                "Lease duration of {} is out of range",
                self.lease_duration
            ))
        })?;
        let attempt_version = account.version;

        let mut internal = account.internal.clone();
        internal.caching_mut().locked_for_update_until = Some(held_until.timestamp_millis());

        match self
            .store
            .update_account(&account.key, &internal, None, attempt_version)
        {
            Ok(updated) => {
                debug!(account = %account.key, %held_until, "refresh lease acquired");
                *account = updated;
                Ok(Some(Lease {
                    held_until,
                    attempt_version,
                }))
            }
            Err(e) if e.is_conflict() => {
                debug!(
                    account = %account.key,
                    version = attempt_version,
                    "lost refresh lease race"
                );
                *account = self.store.get_account(&account.key)?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Push the lease expiry out to `until`, keeping peers on the cached data.
    /// Returns false if a concurrent write got there first.
    pub fn hold_until(&self, account: &mut AccountRecord, until: DateTime<Utc>) -> MirrorResult<bool> {
        let mut internal = account.internal.clone();
        internal.caching_mut().locked_for_update_until = Some(until.timestamp_millis());

        match self
            .store
            .update_account(&account.key, &internal, None, account.version)
        {
            Ok(updated) => {
                *account = updated;
                Ok(true)
            }
            Err(e) if e.is_conflict() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
