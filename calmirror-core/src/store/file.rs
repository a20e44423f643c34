//! Filesystem-backed stores shared by every process pointed at the same
//! data directory.
//!
//! Accounts live in one directory each, holding numbered version files
//! (`00000000000000000007.json`). A conditional write links a fully written
//! temp file to `<expected + 1>.json`; the link fails when the name already
//! exists, so exactly one writer per version wins across processes.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use crate::account::{AccountKey, AccountRecord, InternalConfig, UserConfig};
use crate::diff::EventDiff;
use crate::error::{MirrorError, MirrorResult};
use crate::event::{StoredEvent, Tombstone};
use crate::store::{AccountStore, EventSet, EventStore};

/// Reads retry when a version file is pruned between listing and opening.
const READ_ATTEMPTS: usize = 3;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_path(dir: &Path, stem: &str) -> PathBuf {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    dir.join(format!(".{}.{}.{}.tmp", stem, std::process::id(), n))
}

/// Write `contents` to a fresh temp file in `dir`, then hand it to `finish`
/// to link or rename into place. The temp file never outlives the call.
fn write_via_temp<F>(dir: &Path, stem: &str, contents: &[u8], finish: F) -> std::io::Result<()>
where
    F: FnOnce(&Path) -> std::io::Result<()>,
{
    let temp = temp_path(dir, stem);
    let result = std::fs::write(&temp, contents).and_then(|()| finish(&temp));
    // Already gone after a successful rename
    let _ = std::fs::remove_file(&temp);
    result
}

fn version_file_name(version: u64) -> String {
    format!("{:020}.json", version)
}

fn parse_version(path: &Path) -> Option<u64> {
    if path.extension()? != "json" {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

pub struct FileAccountStore {
    root: PathBuf,
}

impl FileAccountStore {
    pub fn new(data_dir: &Path) -> Self {
        FileAccountStore {
            root: data_dir.join("accounts"),
        }
    }

    fn account_dir(&self, key: &AccountKey) -> PathBuf {
        self.root
            .join(key.context.to_string())
            .join(key.user.to_string())
            .join(key.account.to_string())
    }

    fn versions(&self, key: &AccountKey) -> MirrorResult<Vec<u64>> {
        let dir = self.account_dir(key);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        let mut versions: Vec<u64> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| parse_version(&entry.path()))
            .collect();
        versions.sort_unstable();
        Ok(versions)
    }

    /// Publish `record` as its version file. Fails with `AlreadyExists` if
    /// another writer claimed that version first.
    fn publish(&self, record: &AccountRecord) -> std::io::Result<()> {
        let dir = self.account_dir(&record.key);
        std::fs::create_dir_all(&dir)?;

        let content = serde_json::to_vec_pretty(record)?;
        let target = dir.join(version_file_name(record.version));
        write_via_temp(&dir, "account", &content, |temp| std::fs::hard_link(temp, &target))
    }

    /// Publish `next` as the successor of `next.version - 1`.
    ///
    /// Pruning frees old version names, so a writer still conditioned on a
    /// pruned version can link it again. Such a write sits below the latest
    /// version and is never read; it is withdrawn and reported as a conflict.
    fn commit(&self, next: &AccountRecord) -> MirrorResult<()> {
        let conflict = || MirrorError::ConcurrentModification {
            key: next.key,
            expected: next.version - 1,
        };

        match self.publish(next) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Err(conflict()),
            Err(e) => return Err(e.into()),
        }

        let latest = self.versions(&next.key)?.pop();
        if latest != Some(next.version) {
            let _ = std::fs::remove_file(
                self.account_dir(&next.key).join(version_file_name(next.version)),
            );
            return Err(conflict());
        }

        self.prune_before(&next.key, next.version);
        Ok(())
    }

    fn prune_before(&self, key: &AccountKey, version: u64) {
        let dir = self.account_dir(key);
        if let Ok(versions) = self.versions(key) {
            for old in versions.into_iter().filter(|v| *v < version) {
                let _ = std::fs::remove_file(dir.join(version_file_name(old)));
            }
        }
    }
}

impl AccountStore for FileAccountStore {
    fn get_account(&self, key: &AccountKey) -> MirrorResult<AccountRecord> {
        let dir = self.account_dir(key);

        for _ in 0..READ_ATTEMPTS {
            let Some(latest) = self.versions(key)?.pop() else {
                return Err(MirrorError::AccountNotFound(*key));
            };

            match std::fs::read(dir.join(version_file_name(latest))) {
                Ok(bytes) => {
                    let mut record: AccountRecord = serde_json::from_slice(&bytes)?;
                    record.version = latest;
                    return Ok(record);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(MirrorError::Storage(format!(
            "Account {} kept changing while being read",
            key
        )))
    }

    fn insert_account(&self, mut record: AccountRecord) -> MirrorResult<AccountRecord> {
        if !self.versions(&record.key)?.is_empty() {
            return Err(MirrorError::Config(format!(
                "Account {} already exists",
                record.key
            )));
        }

        record.version = 1;
        match self.publish(&record) {
            Ok(()) => Ok(record),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(MirrorError::Config(format!(
                "Account {} already exists",
                record.key
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn update_account(
        &self,
        key: &AccountKey,
        internal: &InternalConfig,
        user: Option<&UserConfig>,
        expected_version: u64,
    ) -> MirrorResult<AccountRecord> {
        let current = self.get_account(key)?;
        if current.version != expected_version {
            return Err(MirrorError::ConcurrentModification {
                key: *key,
                expected: expected_version,
            });
        }

        let mut next = current;
        next.internal = internal.clone();
        if let Some(user) = user {
            next.user = user.clone();
        }
        next.version = expected_version + 1;

        self.commit(&next)?;
        Ok(next)
    }

    fn delete_account(&self, key: &AccountKey) -> MirrorResult<()> {
        match std::fs::remove_dir_all(self.account_dir(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(MirrorError::AccountNotFound(*key)),
            Err(e) => Err(e.into()),
        }
    }
}

/// One JSON document per account, replaced with write-then-rename.
pub struct FileEventStore {
    root: PathBuf,
}

impl FileEventStore {
    pub fn new(data_dir: &Path) -> Self {
        FileEventStore {
            root: data_dir.join("events"),
        }
    }

    fn path(&self, key: &AccountKey) -> PathBuf {
        self.root
            .join(key.context.to_string())
            .join(key.user.to_string())
            .join(format!("{}.json", key.account))
    }

    fn load(&self, key: &AccountKey) -> MirrorResult<EventSet> {
        match std::fs::read(self.path(key)) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(EventSet::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &AccountKey, set: &EventSet) -> MirrorResult<()> {
        let path = self.path(key);
        let dir = path
            .parent()
            .ok_or_else(|| MirrorError::Storage(format!("Invalid event path {}", path.display())))?;
        std::fs::create_dir_all(dir)?;

        let content = serde_json::to_vec(set)?;
        write_via_temp(dir, "events", &content, |temp| std::fs::rename(temp, &path))?;
        Ok(())
    }
}

impl EventStore for FileEventStore {
    fn read_events(&self, account: &AccountKey) -> MirrorResult<Vec<StoredEvent>> {
        Ok(self.load(account)?.events)
    }

    fn write_events(
        &self,
        account: &AccountKey,
        changes: &[EventDiff],
        at: DateTime<Utc>,
    ) -> MirrorResult<()> {
        let mut set = self.load(account)?;
        set.apply(changes, at);
        self.save(account, &set)
    }

    fn read_tombstones(
        &self,
        account: &AccountKey,
        since: DateTime<Utc>,
    ) -> MirrorResult<Vec<Tombstone>> {
        Ok(self.load(account)?.tombstones_since(since))
    }

    fn delete_all(&self, account: &AccountKey) -> MirrorResult<()> {
        match std::fs::remove_file(self.path(account)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
