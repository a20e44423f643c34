//! Read-only views over the cached event set.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::date_range::DateRange;
use crate::error::Warning;
use crate::event::{Event, EventId, Reminder};

/// A query result together with any warnings raised while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection<T> {
    pub data: T,
    pub warnings: Vec<Warning>,
}

impl<T> Projection<T> {
    pub fn new(data: T, warnings: Vec<Warning>) -> Self {
        Projection { data, warnings }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Start,
    End,
    Summary,
    Uid,
    Updated,
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(SortField::Start),
            "end" => Ok(SortField::End),
            "summary" | "title" => Ok(SortField::Summary),
            "uid" => Ok(SortField::Uid),
            "updated" => Ok(SortField::Updated),
            other => Err(format!(
                "Unknown sort field '{}'. Expected start, end, summary, uid or updated",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub field: SortField,
    pub descending: bool,
}

impl SortOrder {
    pub fn ascending(field: SortField) -> Self {
        SortOrder {
            field,
            descending: false,
        }
    }

    pub fn descending(field: SortField) -> Self {
        SortOrder {
            field,
            descending: true,
        }
    }

    fn compare(&self, a: &Event, b: &Event) -> Ordering {
        let primary = match self.field {
            SortField::Start => a.start.to_utc().cmp(&b.start.to_utc()),
            SortField::End => a.end.to_utc().cmp(&b.end.to_utc()),
            SortField::Summary => a.summary.to_lowercase().cmp(&b.summary.to_lowercase()),
            SortField::Uid => a.uid.cmp(&b.uid),
            SortField::Updated => a.updated.cmp(&b.updated),
        };
        let ordering = primary.then_with(|| a.id().cmp(&b.id()));

        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::ascending(SortField::Start)
    }
}

/// Caller-controlled shape of a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    pub range: DateRange,
    /// Defaults to start ascending (recurrence id for change exceptions).
    pub order: Option<SortOrder>,
    pub limit: Option<usize>,
    /// Replace each event's reminders with the user's stored alarms.
    pub include_alarms: bool,
}

impl QueryParams {
    pub fn in_range(range: DateRange) -> Self {
        QueryParams {
            range,
            ..Default::default()
        }
    }
}

/// Events changed in the mirror since a given instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdatesResult {
    pub new_and_modified: Vec<Event>,
    pub deleted: Vec<EventId>,
}

/// Range filter, sort, then limit.
pub fn filter_and_sort(events: Vec<Event>, params: &QueryParams) -> Vec<Event> {
    let order = params.order.unwrap_or_default();
    let mut events: Vec<Event> = events
        .into_iter()
        .filter(|e| params.range.overlaps(e))
        .collect();
    events.sort_by(|a, b| order.compare(a, b));

    if let Some(limit) = params.limit {
        events.truncate(limit);
    }
    events
}

/// Change exceptions of one series, ordered by the occurrence they replace
/// unless the caller asked for something else.
pub fn change_exceptions(events: Vec<Event>, series_uid: &str, params: &QueryParams) -> Vec<Event> {
    let exceptions: Vec<Event> = events
        .into_iter()
        .filter(|e| e.uid == series_uid && e.is_change_exception())
        .collect();

    if params.order.is_some() {
        return filter_and_sort(exceptions, params);
    }

    let mut exceptions: Vec<Event> = exceptions
        .into_iter()
        .filter(|e: &Event| params.range.overlaps(e))
        .collect();
    exceptions.sort_by(|a, b| a.recurrence_id.cmp(&b.recurrence_id));
    if let Some(limit) = params.limit {
        exceptions.truncate(limit);
    }
    exceptions
}

/// Case-insensitive substring match on summary, description and location.
/// An empty pattern matches everything.
pub fn matches_pattern(event: &Event, pattern: &str) -> bool {
    let needle = pattern.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }

    std::iter::once(Some(event.summary.as_str()))
        .chain([event.description.as_deref(), event.location.as_deref()])
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
}

/// Replace reminders with the user's alarms; events without stored alarms
/// end up with none.
pub fn overlay_alarms(events: &mut [Event], alarms: &HashMap<EventId, Vec<Reminder>>) {
    for event in events {
        event.reminders = alarms.get(&event.id()).cloned().unwrap_or_default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventStatus, EventTime};
    use chrono::{Duration, TimeZone, Utc};

    fn make_test_event(uid: &str, summary: &str, day: u32) -> Event {
        let start = Utc.with_ymd_and_hms(2025, 3, day, 15, 0, 0).unwrap();
        Event {
            uid: uid.to_string(),
            recurrence_id: None,
            summary: summary.to_string(),
            description: None,
            location: None,
            start: EventTime::DateTime(start),
            end: EventTime::DateTime(start + Duration::hours(1)),
            status: EventStatus::Confirmed,
            recurrence: None,
            reminders: vec![],
            updated: None,
            sequence: None,
        }
    }

    fn uids(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.uid.as_str()).collect()
    }

    #[test]
    fn test_default_order_is_start_ascending() {
        let events = vec![
            make_test_event("c", "C", 22),
            make_test_event("a", "A", 20),
            make_test_event("b", "B", 21),
        ];
        let sorted = filter_and_sort(events, &QueryParams::default());
        assert_eq!(uids(&sorted), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_descending_summary_with_limit() {
        let events = vec![
            make_test_event("1", "alpha", 20),
            make_test_event("2", "Charlie", 21),
            make_test_event("3", "bravo", 22),
        ];
        let params = QueryParams {
            order: Some(SortOrder::descending(SortField::Summary)),
            limit: Some(2),
            ..Default::default()
        };
        let sorted = filter_and_sort(events, &params);
        assert_eq!(uids(&sorted), vec!["2", "3"]);
    }

    #[test]
    fn test_range_filter_applies_before_limit() {
        let events = vec![
            make_test_event("early", "Early", 1),
            make_test_event("in-1", "In", 20),
            make_test_event("in-2", "In", 21),
        ];
        let params = QueryParams {
            range: DateRange::new(Some(Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap()), None),
            limit: Some(1),
            ..Default::default()
        };
        assert_eq!(uids(&filter_and_sort(events, &params)), vec!["in-1"]);
    }

    #[test]
    fn test_change_exceptions_sorted_by_recurrence_id() {
        let master = make_test_event("series", "Weekly", 3);
        let mut later = make_test_event("series", "Moved", 17);
        later.recurrence_id = Some(EventTime::DateTime(Utc.with_ymd_and_hms(2025, 3, 17, 15, 0, 0).unwrap()));
        let mut earlier = make_test_event("series", "Moved", 25);
        earlier.recurrence_id = Some(EventTime::DateTime(Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap()));
        let other = make_test_event("other", "Other", 10);

        let result = change_exceptions(
            vec![master, later, other, earlier],
            "series",
            &QueryParams::default(),
        );

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].start.to_utc().format("%d").to_string(), "25");
        assert_eq!(result[1].start.to_utc().format("%d").to_string(), "17");
    }

    #[test]
    fn test_matches_pattern_searches_text_fields() {
        let mut event = make_test_event("x", "Team Sync", 20);
        event.location = Some("Room 4B".to_string());

        assert!(matches_pattern(&event, "sync"));
        assert!(matches_pattern(&event, "room 4b"));
        assert!(matches_pattern(&event, "  "));
        assert!(!matches_pattern(&event, "lunch"));
    }

    #[test]
    fn test_overlay_replaces_reminders() {
        let mut with_remote_alarm = make_test_event("a", "A", 20);
        with_remote_alarm.reminders = vec![Reminder { minutes: 30 }];
        let mut events = vec![with_remote_alarm, make_test_event("b", "B", 21)];

        let mut alarms = HashMap::new();
        alarms.insert(EventId::new("b"), vec![Reminder { minutes: 5 }]);
        overlay_alarms(&mut events, &alarms);

        assert!(events[0].reminders.is_empty());
        assert_eq!(events[1].reminders, vec![Reminder { minutes: 5 }]);
    }

    #[test]
    fn test_sort_field_parsing() {
        assert_eq!("Start".parse::<SortField>(), Ok(SortField::Start));
        assert_eq!("title".parse::<SortField>(), Ok(SortField::Summary));
        assert!("priority".parse::<SortField>().is_err());
    }
}
