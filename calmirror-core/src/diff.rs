//! Diff between the cached event set and a fresh remote snapshot.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Warning;
use crate::event::{Event, EventId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffKind::Create => write!(f, "+"),
            DiffKind::Update => write!(f, "~"),
            DiffKind::Delete => write!(f, "-"),
        }
    }
}

/// One storage operation produced by a refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventDiff {
    Create(Event),
    Update { old: Event, new: Event },
    Delete(Event),
}

impl fmt::Display for EventDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.event().summary)
    }
}

impl EventDiff {
    pub fn get_diff(old_event: Option<Event>, new_event: Option<Event>) -> Option<EventDiff> {
        match (old_event, new_event) {
            (None, Some(new)) => Some(EventDiff::Create(new)),
            (Some(old), None) => Some(EventDiff::Delete(old)),
            (Some(old), Some(new)) if old != new => Some(EventDiff::Update { old, new }),
            _ => None,
        }
    }

    pub fn kind(&self) -> DiffKind {
        match self {
            EventDiff::Create(_) => DiffKind::Create,
            EventDiff::Update { .. } => DiffKind::Update,
            EventDiff::Delete(_) => DiffKind::Delete,
        }
    }

    /// The event this diff is about (the new version when there is one).
    pub fn event(&self) -> &Event {
        match self {
            EventDiff::Create(event) | EventDiff::Delete(event) => event,
            EventDiff::Update { new, .. } => new,
        }
    }

    pub fn id(&self) -> EventId {
        self.event().id()
    }
}

/// The full set of changes needed to bring the cache in line with the remote.
#[derive(Debug, Default)]
pub struct CacheDiff {
    pub changes: Vec<EventDiff>,
    pub warnings: Vec<Warning>,
}

impl CacheDiff {
    pub fn between(cached: Vec<Event>, remote: Vec<Event>) -> CacheDiff {
        let mut warnings = Vec::new();

        let mut remote_by_id: HashMap<EventId, Event> = HashMap::with_capacity(remote.len());
        let mut remote_order = Vec::with_capacity(remote.len());
        for event in remote {
            let id = event.id();
            if remote_by_id.contains_key(&id) {
                warnings.push(Warning::new(
                    "duplicate_event",
                    format!("Remote source returned event {} more than once; keeping the first", id),
                ));
                continue;
            }
            remote_order.push(id.clone());
            remote_by_id.insert(id, event);
        }

        let mut changes = Vec::new();
        let mut seen: HashSet<EventId> = HashSet::new();

        for old in cached {
            let id = old.id();
            seen.insert(id.clone());
            let new = remote_by_id.remove(&id);
            if let Some(diff) = EventDiff::get_diff(Some(old), new) {
                changes.push(diff);
            }
        }

        // Remote-only events, in the order the source returned them
        for id in remote_order {
            if seen.contains(&id) {
                continue;
            }
            if let Some(diff) = remote_by_id
                .remove(&id)
                .and_then(|new| EventDiff::get_diff(None, Some(new)))
            {
                changes.push(diff);
            }
        }

        CacheDiff { changes, warnings }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// (created, updated, deleted)
    pub fn counts(&self) -> (usize, usize, usize) {
        let mut created = 0;
        let mut updated = 0;
        let mut deleted = 0;

        for diff in &self.changes {
            match diff.kind() {
                DiffKind::Create => created += 1,
                DiffKind::Update => updated += 1,
                DiffKind::Delete => deleted += 1,
            }
        }

        (created, updated, deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventStatus, EventTime};
    use chrono::{TimeZone, Utc};

    fn make_test_event(uid: &str, summary: &str) -> Event {
        Event {
            uid: uid.to_string(),
            recurrence_id: None,
            summary: summary.to_string(),
            description: None,
            location: None,
            start: EventTime::DateTime(Utc.with_ymd_and_hms(2025, 3, 20, 15, 0, 0).unwrap()),
            end: EventTime::DateTime(Utc.with_ymd_and_hms(2025, 3, 20, 16, 0, 0).unwrap()),
            status: EventStatus::Confirmed,
            recurrence: None,
            reminders: vec![],
            updated: None,
            sequence: None,
        }
    }

    #[test]
    fn test_diff_classifies_create_update_delete() {
        let cached = vec![
            make_test_event("keep", "Same"),
            make_test_event("change", "Before"),
            make_test_event("gone", "Removed remotely"),
        ];
        let remote = vec![
            make_test_event("keep", "Same"),
            make_test_event("change", "After"),
            make_test_event("new", "Added remotely"),
        ];

        let diff = CacheDiff::between(cached, remote);

        assert_eq!(diff.counts(), (1, 1, 1));
        assert!(diff.warnings.is_empty());

        let kinds: Vec<(DiffKind, String)> = diff
            .changes
            .iter()
            .map(|d| (d.kind(), d.event().uid.clone()))
            .collect();
        assert!(kinds.contains(&(DiffKind::Update, "change".to_string())));
        assert!(kinds.contains(&(DiffKind::Delete, "gone".to_string())));
        assert!(kinds.contains(&(DiffKind::Create, "new".to_string())));
    }

    #[test]
    fn test_diff_of_identical_sets_is_empty() {
        let events = vec![make_test_event("a", "A"), make_test_event("b", "B")];
        let diff = CacheDiff::between(events.clone(), events);
        assert!(diff.is_empty());
    }

    #[test]
    fn test_change_exception_is_distinct_from_master() {
        let master = make_test_event("series", "Weekly");
        let mut exception = make_test_event("series", "Moved occurrence");
        exception.recurrence_id = Some(EventTime::DateTime(
            Utc.with_ymd_and_hms(2025, 3, 27, 15, 0, 0).unwrap(),
        ));

        let diff = CacheDiff::between(vec![master.clone()], vec![master, exception]);
        assert_eq!(diff.counts(), (1, 0, 0));
        assert!(diff.changes[0].event().is_change_exception());
    }

    #[test]
    fn test_duplicate_remote_events_keep_first_and_warn() {
        let remote = vec![make_test_event("dup", "First"), make_test_event("dup", "Second")];

        let diff = CacheDiff::between(vec![], remote);

        assert_eq!(diff.counts(), (1, 0, 0));
        assert_eq!(diff.changes[0].event().summary, "First");
        assert_eq!(diff.warnings.len(), 1);
        assert_eq!(diff.warnings[0].code, "duplicate_event");
    }
}
