//! Persistence collaborators: account records and the mirrored event set.
//!
//! The caching layer only relies on the contracts below. In particular the
//! conditional account write is the sole cross-process coordination
//! primitive, so implementations must make it atomic with respect to every
//! other writer of the same account.

mod file;
mod memory;

pub use file::{FileAccountStore, FileEventStore};
pub use memory::{MemoryAccountStore, MemoryEventStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::{AccountKey, AccountRecord, InternalConfig, UserConfig};
use crate::diff::EventDiff;
use crate::error::MirrorResult;
use crate::event::{EventId, StoredEvent, Tombstone};

pub trait AccountStore: Send + Sync {
    fn get_account(&self, key: &AccountKey) -> MirrorResult<AccountRecord>;

    /// Stores a new account at version 1.
    fn insert_account(&self, record: AccountRecord) -> MirrorResult<AccountRecord>;

    /// Rewrites the configuration blocks if the stored version still equals
    /// `expected_version`, returning the record at its new version.
    /// Fails with `MirrorError::ConcurrentModification` otherwise.
    /// `user: None` leaves the user block as stored.
    fn update_account(
        &self,
        key: &AccountKey,
        internal: &InternalConfig,
        user: Option<&UserConfig>,
        expected_version: u64,
    ) -> MirrorResult<AccountRecord>;

    fn delete_account(&self, key: &AccountKey) -> MirrorResult<()>;
}

/// Local mirror of an account's events.
///
/// `write_events` must apply the whole batch atomically: readers see either
/// the state before or after a refresh, never a mix. The batch is committed
/// ahead of the account's `lastUpdate`, so a mirror may briefly hold newer
/// events than its stamp says; it is then treated as stale, never the reverse.
pub trait EventStore: Send + Sync {
    fn read_events(&self, account: &AccountKey) -> MirrorResult<Vec<StoredEvent>>;

    fn write_events(
        &self,
        account: &AccountKey,
        changes: &[EventDiff],
        at: DateTime<Utc>,
    ) -> MirrorResult<()>;

    /// Events removed by refreshes strictly after `since`.
    fn read_tombstones(
        &self,
        account: &AccountKey,
        since: DateTime<Utc>,
    ) -> MirrorResult<Vec<Tombstone>>;

    fn delete_all(&self, account: &AccountKey) -> MirrorResult<()>;
}

/// Everything an event store keeps for one account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSet {
    #[serde(default)]
    pub events: Vec<StoredEvent>,
    #[serde(default)]
    pub tombstones: Vec<Tombstone>,
}

impl EventSet {
    pub fn apply(&mut self, changes: &[EventDiff], at: DateTime<Utc>) {
        for change in changes {
            let id = change.id();
            match change {
                EventDiff::Create(event) | EventDiff::Update { new: event, .. } => {
                    self.remove(&id);
                    self.tombstones.retain(|t| t.id != id);
                    self.events.push(StoredEvent {
                        event: event.clone(),
                        stored_at: at,
                    });
                }
                EventDiff::Delete(_) => {
                    if self.remove(&id) {
                        self.tombstones.retain(|t| t.id != id);
                        self.tombstones.push(Tombstone {
                            id,
                            deleted_at: at,
                        });
                    }
                }
            }
        }
    }

    pub fn tombstones_since(&self, since: DateTime<Utc>) -> Vec<Tombstone> {
        self.tombstones
            .iter()
            .filter(|t| t.deleted_at > since)
            .cloned()
            .collect()
    }

    fn remove(&mut self, id: &EventId) -> bool {
        let before = self.events.len();
        self.events.retain(|stored| stored.event.id() != *id);
        self.events.len() != before
    }
}
