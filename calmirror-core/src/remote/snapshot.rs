//! A remote source backed by a JSON snapshot file.
//!
//! The account's user configuration names the file (`source`) and it holds
//! a JSON array of events, as an exporter or a sync job would leave it.

use std::path::PathBuf;

use chrono::Duration;
use serde_json::Value;
use tracing::warn;

use crate::account::AccountRecord;
use crate::error::{MirrorError, MirrorResult, Warning};
use crate::event::Event;
use crate::remote::{CalendarProvider, ErrorPolicy, FetchedEvents};

pub const SNAPSHOT_PROVIDER_ID: &str = "snapshot";

/// User configuration key naming the snapshot file.
pub const SOURCE_KEY: &str = "source";

#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    refresh_minutes: i64,
    retry_after: Option<Duration>,
}

impl Default for SnapshotProvider {
    fn default() -> Self {
        SnapshotProvider {
            refresh_minutes: 0,
            retry_after: Some(Duration::minutes(5)),
        }
    }
}

impl SnapshotProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_refresh_interval(mut self, minutes: i64) -> Self {
        self.refresh_minutes = minutes;
        self
    }

    /// How long to keep peers off a broken source after a failed fetch.
    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    fn source_path(account: &AccountRecord) -> MirrorResult<PathBuf> {
        let raw = account.user.get_str(SOURCE_KEY).ok_or_else(|| {
            MirrorError::Config(format!("Account {} has no '{}' configured", account.key, SOURCE_KEY))
        })?;
        Ok(PathBuf::from(shellexpand::tilde(raw).into_owned()))
    }
}

impl CalendarProvider for SnapshotProvider {
    fn id(&self) -> &str {
        SNAPSHOT_PROVIDER_ID
    }

    fn refresh_interval(&self) -> i64 {
        self.refresh_minutes
    }

    fn initialize(&self, account: &AccountRecord) -> MirrorResult<()> {
        Self::source_path(account).map(|_| ())
    }

    fn fetch_all_events(&self, account: &AccountRecord) -> MirrorResult<FetchedEvents> {
        let path = Self::source_path(account)?;
        let content = std::fs::read_to_string(&path).map_err(|e| {
            MirrorError::Remote(format!("Could not read {}: {}", path.display(), e))
        })?;

        let entries: Vec<Value> = serde_json::from_str(&content).map_err(|e| {
            MirrorError::Remote(format!("{} is not a JSON array of events: {}", path.display(), e))
        })?;

        let mut fetched = FetchedEvents::default();
        for (index, entry) in entries.into_iter().enumerate() {
            match serde_json::from_value::<Event>(entry) {
                Ok(event) => fetched.events.push(event),
                Err(e) => fetched.warnings.push(Warning::new(
                    "invalid_event",
                    format!("Skipping entry {} in {}: {}", index, path.display(), e),
                )),
            }
        }

        Ok(fetched)
    }

    fn handle_error(&self, account: &AccountRecord, err: &MirrorError) -> ErrorPolicy {
        warn!(account = %account.key, error = %err, "snapshot source unavailable");
        match self.retry_after {
            Some(retry_after) => ErrorPolicy::backoff(retry_after),
            None => ErrorPolicy::propagate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountKey;
    use serde_json::json;

    fn account_with_source(path: &std::path::Path) -> AccountRecord {
        let mut account = AccountRecord::new(AccountKey::new(1, 1, 1), SNAPSHOT_PROVIDER_ID);
        account.user.set(SOURCE_KEY, path.to_string_lossy().to_string());
        account
    }

    #[test]
    fn test_initialize_requires_source() {
        let account = AccountRecord::new(AccountKey::new(1, 1, 1), SNAPSHOT_PROVIDER_ID);
        let err = SnapshotProvider::new().initialize(&account).unwrap_err();
        assert!(matches!(err, MirrorError::Config(_)));
    }

    #[test]
    fn test_fetch_skips_invalid_entries_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        let events = json!([
            {
                "uid": "good",
                "summary": "Standup",
                "start": { "DateTime": "2025-03-20T09:00:00Z" },
                "end": { "DateTime": "2025-03-20T09:15:00Z" }
            },
            { "summary": "no uid or times" }
        ]);
        std::fs::write(&path, events.to_string()).unwrap();

        let fetched = SnapshotProvider::new()
            .fetch_all_events(&account_with_source(&path))
            .unwrap();

        assert_eq!(fetched.events.len(), 1);
        assert_eq!(fetched.events[0].uid, "good");
        assert_eq!(fetched.warnings.len(), 1);
        assert_eq!(fetched.warnings[0].code, "invalid_event");
    }

    #[test]
    fn test_fetch_of_missing_file_is_a_remote_error() {
        let dir = tempfile::tempdir().unwrap();
        let account = account_with_source(&dir.path().join("missing.json"));

        let err = SnapshotProvider::new().fetch_all_events(&account).unwrap_err();
        assert!(matches!(err, MirrorError::Remote(_)));
    }

    #[test]
    fn test_handle_error_backs_off_by_default() {
        let account = AccountRecord::new(AccountKey::new(1, 1, 1), SNAPSHOT_PROVIDER_ID);
        let err = MirrorError::Remote("down".into());

        let policy = SnapshotProvider::new().handle_error(&account, &err);
        assert_eq!(policy.backoff, Some(Duration::minutes(5)));

        let policy = SnapshotProvider::new()
            .with_retry_after(None)
            .handle_error(&account, &err);
        assert_eq!(policy, ErrorPolicy::propagate());
    }
}
