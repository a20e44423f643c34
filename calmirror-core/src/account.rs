//! Account records and the caching sub-record embedded in them.
//!
//! The persistence layer stores the internal configuration as free-form
//! JSON. Here it is a structured record: the `caching` block is typed and
//! every other provider field is carried through untouched.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// User configuration key holding a per-account refresh interval in minutes.
pub const REFRESH_INTERVAL_KEY: &str = "refreshInterval";

/// Identifies one (context, user, account) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountKey {
    pub context: u32,
    pub user: u32,
    pub account: u32,
}

impl AccountKey {
    pub fn new(context: u32, user: u32, account: u32) -> Self {
        AccountKey {
            context,
            user,
            account,
        }
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.context, self.user, self.account)
    }
}

/// Caching bookkeeping: when the mirror was last refreshed and until when
/// a refresh lease is held. Both are epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachingState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_for_update_until: Option<i64>,
}

impl CachingState {
    /// Absent or negative means the account was never refreshed.
    pub fn last_update_at(&self) -> Option<DateTime<Utc>> {
        self.last_update
            .filter(|ms| *ms >= 0)
            .and_then(DateTime::from_timestamp_millis)
    }

    pub fn lease_expiry(&self) -> Option<DateTime<Utc>> {
        self.locked_for_update_until
            .and_then(DateTime::from_timestamp_millis)
    }

    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.lease_expiry().is_some_and(|until| until > now)
    }
}

/// The internal (system-controlled) configuration block of an account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InternalConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caching: Option<CachingState>,
    /// Provider-specific fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InternalConfig {
    pub fn caching(&self) -> CachingState {
        self.caching.clone().unwrap_or_default()
    }

    /// Returns the caching block, creating it on first use.
    pub fn caching_mut(&mut self) -> &mut CachingState {
        self.caching.get_or_insert_with(CachingState::default)
    }
}

/// The user-controlled configuration block of an account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserConfig(pub Map<String, Value>);

impl UserConfig {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    pub fn refresh_interval_minutes(&self) -> Option<i64> {
        self.0.get(REFRESH_INTERVAL_KEY).and_then(|v| v.as_i64())
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }
}

/// A persisted account: its identity, both configuration blocks, and the
/// version stamp the store uses for optimistic concurrency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub key: AccountKey,
    /// Identifier of the provider serving this account (e.g. "snapshot").
    pub provider: String,
    #[serde(default)]
    pub internal: InternalConfig,
    #[serde(default)]
    pub user: UserConfig,
    #[serde(default)]
    pub version: u64,
}

impl AccountRecord {
    pub fn new(key: AccountKey, provider: &str) -> Self {
        AccountRecord {
            key,
            provider: provider.to_string(),
            internal: InternalConfig::default(),
            user: UserConfig::default(),
            version: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_internal_config_preserves_provider_fields() {
        let raw = json!({
            "caching": { "lastUpdate": 1700000000000i64, "lockedForUpdateUntil": 1700000600000i64 },
            "color": "#ff0000",
            "etag": "abc"
        });

        let config: InternalConfig = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(config.caching().last_update, Some(1_700_000_000_000));
        assert_eq!(config.extra.get("color"), Some(&json!("#ff0000")));

        assert_eq!(serde_json::to_value(&config).unwrap(), raw);
    }

    #[test]
    fn test_missing_caching_block_is_never_refreshed() {
        let config: InternalConfig = serde_json::from_value(json!({})).unwrap();
        assert!(config.caching.is_none());
        assert_eq!(config.caching().last_update_at(), None);
    }

    #[test]
    fn test_negative_last_update_means_never() {
        let state = CachingState {
            last_update: Some(-1),
            locked_for_update_until: None,
        };
        assert_eq!(state.last_update_at(), None);
    }

    #[test]
    fn test_lease_in_the_past_is_not_locked() {
        let now = Utc.with_ymd_and_hms(2025, 3, 20, 12, 0, 0).unwrap();
        let mut state = CachingState::default();
        assert!(!state.is_locked_at(now));

        state.locked_for_update_until = Some(now.timestamp_millis());
        assert!(!state.is_locked_at(now), "expiry equal to now is unlocked");

        state.locked_for_update_until = Some(now.timestamp_millis() + 1);
        assert!(state.is_locked_at(now));
    }

    #[test]
    fn test_user_config_refresh_interval() {
        let mut user = UserConfig::default();
        assert_eq!(user.refresh_interval_minutes(), None);
        user.set(REFRESH_INTERVAL_KEY, 60);
        assert_eq!(user.refresh_interval_minutes(), Some(60));
    }
}
