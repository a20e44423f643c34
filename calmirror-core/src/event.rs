//! Provider-neutral event types.
//!
//! Remote sources convert whatever they fetch into these types, and the
//! cache stores and projects them without knowing where they came from.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A calendar event (provider-neutral)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub uid: String,
    /// Set on change exceptions of a recurring series (RECURRENCE-ID)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_id: Option<EventTime>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
    #[serde(default)]
    pub status: EventStatus,
    /// RRULE, EXDATE lines for series masters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reminders: Vec<Reminder>,
    /// Last modification timestamp reported by the remote source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<i64>,
}

impl Event {
    pub fn id(&self) -> EventId {
        EventId {
            uid: self.uid.clone(),
            recurrence_id: self.recurrence_id.clone(),
        }
    }

    pub fn is_series_master(&self) -> bool {
        self.recurrence_id.is_none() && self.recurrence.as_ref().is_some_and(|r| !r.is_empty())
    }

    pub fn is_change_exception(&self) -> bool {
        self.recurrence_id.is_some()
    }
}

/// Identifies one cached event: the series uid plus, for change
/// exceptions, the original start of the overridden occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_id: Option<EventTime>,
}

impl EventId {
    pub fn new(uid: impl Into<String>) -> Self {
        EventId {
            uid: uid.into(),
            recurrence_id: None,
        }
    }

    pub fn with_recurrence(uid: impl Into<String>, recurrence_id: EventTime) -> Self {
        EventId {
            uid: uid.into(),
            recurrence_id: Some(recurrence_id),
        }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.recurrence_id {
            Some(rid) => write!(f, "{} ({})", self.uid, rid),
            None => write!(f, "{}", self.uid),
        }
    }
}

/// A reminder/alarm for an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    /// Minutes before the event to trigger
    pub minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventTime {
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
}

impl EventTime {
    /// All-day dates are anchored at UTC midnight.
    pub fn to_utc(&self) -> DateTime<Utc> {
        match self {
            EventTime::DateTime(dt) => *dt,
            EventTime::Date(d) => d.and_time(chrono::NaiveTime::MIN).and_utc(),
        }
    }

    /// Accepts RFC3339 date-times or YYYY-MM-DD dates.
    pub fn parse(s: &str) -> Option<EventTime> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(EventTime::DateTime(dt.with_timezone(&Utc)));
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .map(EventTime::Date)
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTime::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            EventTime::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum EventStatus {
    #[default]
    Confirmed,
    Tentative,
    Cancelled,
}

/// An event as held by the event store, stamped with the instant it was
/// last written into the mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event: Event,
    pub stored_at: DateTime<Utc>,
}

/// Marks an event removed from the mirror by a refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tombstone {
    pub id: EventId,
    pub deleted_at: DateTime<Utc>,
}
