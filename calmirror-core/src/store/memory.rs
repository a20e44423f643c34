//! In-process stores for embedding and tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::account::{AccountKey, AccountRecord, InternalConfig, UserConfig};
use crate::diff::EventDiff;
use crate::error::{MirrorError, MirrorResult};
use crate::event::{StoredEvent, Tombstone};
use crate::store::{AccountStore, EventSet, EventStore};

fn lock<T>(mutex: &Mutex<T>) -> MirrorResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| MirrorError::Storage("store mutex poisoned".into()))
}

#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<HashMap<AccountKey, AccountRecord>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountStore for MemoryAccountStore {
    fn get_account(&self, key: &AccountKey) -> MirrorResult<AccountRecord> {
        lock(&self.accounts)?
            .get(key)
            .cloned()
            .ok_or(MirrorError::AccountNotFound(*key))
    }

    fn insert_account(&self, mut record: AccountRecord) -> MirrorResult<AccountRecord> {
        let mut accounts = lock(&self.accounts)?;
        if accounts.contains_key(&record.key) {
            return Err(MirrorError::Config(format!(
                "Account {} already exists",
                record.key
            )));
        }
        record.version = 1;
        accounts.insert(record.key, record.clone());
        Ok(record)
    }

    fn update_account(
        &self,
        key: &AccountKey,
        internal: &InternalConfig,
        user: Option<&UserConfig>,
        expected_version: u64,
    ) -> MirrorResult<AccountRecord> {
        let mut accounts = lock(&self.accounts)?;
        let record = accounts
            .get_mut(key)
            .ok_or(MirrorError::AccountNotFound(*key))?;

        if record.version != expected_version {
            return Err(MirrorError::ConcurrentModification {
                key: *key,
                expected: expected_version,
            });
        }

        record.internal = internal.clone();
        if let Some(user) = user {
            record.user = user.clone();
        }
        record.version += 1;
        Ok(record.clone())
    }

    fn delete_account(&self, key: &AccountKey) -> MirrorResult<()> {
        lock(&self.accounts)?
            .remove(key)
            .map(|_| ())
            .ok_or(MirrorError::AccountNotFound(*key))
    }
}

#[derive(Debug, Default)]
pub struct MemoryEventStore {
    sets: Mutex<HashMap<AccountKey, EventSet>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for MemoryEventStore {
    fn read_events(&self, account: &AccountKey) -> MirrorResult<Vec<StoredEvent>> {
        Ok(lock(&self.sets)?
            .get(account)
            .map(|set| set.events.clone())
            .unwrap_or_default())
    }

    fn write_events(
        &self,
        account: &AccountKey,
        changes: &[EventDiff],
        at: DateTime<Utc>,
    ) -> MirrorResult<()> {
        // Single lock for the whole batch keeps it atomic for readers
        lock(&self.sets)?
            .entry(*account)
            .or_default()
            .apply(changes, at);
        Ok(())
    }

    fn read_tombstones(
        &self,
        account: &AccountKey,
        since: DateTime<Utc>,
    ) -> MirrorResult<Vec<Tombstone>> {
        Ok(lock(&self.sets)?
            .get(account)
            .map(|set| set.tombstones_since(since))
            .unwrap_or_default())
    }

    fn delete_all(&self, account: &AccountKey) -> MirrorResult<()> {
        lock(&self.sets)?.remove(account);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conditional_update_rejects_stale_version() {
        let store = MemoryAccountStore::new();
        let key = AccountKey::new(1, 2, 3);
        let record = store.insert_account(AccountRecord::new(key, "snapshot")).unwrap();
        assert_eq!(record.version, 1);

        let updated = store
            .update_account(&key, &InternalConfig::default(), None, 1)
            .unwrap();
        assert_eq!(updated.version, 2);

        let err = store
            .update_account(&key, &InternalConfig::default(), None, 1)
            .unwrap_err();
        assert!(err.is_conflict(), "expected conflict, got {err:?}");
    }

    #[test]
    fn test_update_without_user_block_keeps_stored_user_config() {
        let store = MemoryAccountStore::new();
        let key = AccountKey::new(1, 2, 3);
        let mut record = AccountRecord::new(key, "snapshot");
        record.user.set("source", "/tmp/events.json");
        store.insert_account(record).unwrap();

        let updated = store
            .update_account(&key, &InternalConfig::default(), None, 1)
            .unwrap();
        assert_eq!(updated.user.get_str("source"), Some("/tmp/events.json"));
    }

    #[test]
    fn test_missing_account() {
        let store = MemoryAccountStore::new();
        let err = store.get_account(&AccountKey::new(1, 1, 1)).unwrap_err();
        assert!(matches!(err, MirrorError::AccountNotFound(_)));
    }
}
