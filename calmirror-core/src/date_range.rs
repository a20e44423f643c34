//! Date range for filtering events.

use chrono::{DateTime, NaiveDate, Utc};

use crate::event::Event;

/// Half-open window `[from, to)`.
/// None values mean unbounded in that direction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        DateRange { from, to }
    }

    pub fn unbounded() -> Self {
        DateRange::default()
    }

    /// Parse command-line style bounds.
    /// - `from`: "start" or omitted for unbounded, or YYYY-MM-DD
    /// - `to`: YYYY-MM-DD (exclusive: the whole day is included), or omitted
    pub fn from_args(from: Option<&str>, to: Option<&str>) -> Result<Self, String> {
        let from_dt = match from {
            None | Some("start") => None,
            Some(s) => Some(parse_date_start(s)?),
        };

        let to_dt = match to {
            Some(s) => Some(parse_date_end(s)?),
            None => None,
        };

        Ok(DateRange {
            from: from_dt,
            to: to_dt,
        })
    }

    /// Whether the event overlaps the window.
    ///
    /// An end before the start counts as a zero-length event. Series masters
    /// match whenever they start before `to`, since their occurrences are
    /// not expanded.
    pub fn overlaps(&self, event: &Event) -> bool {
        let start = event.start.to_utc();
        let end = event.end.to_utc().max(start);

        if let Some(to) = self.to {
            if start >= to {
                return false;
            }
        }

        if event.is_series_master() {
            return true;
        }

        match self.from {
            // Zero-length events at exactly `from` still count
            Some(from) if end == start => start >= from,
            Some(from) => end > from,
            None => true,
        }
    }
}

/// Parse YYYY-MM-DD as start of day in UTC
fn parse_date_start(s: &str) -> Result<DateTime<Utc>, String> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date format '{}'. Expected YYYY-MM-DD", s))?;
    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

/// Parse YYYY-MM-DD as the start of the following day in UTC
fn parse_date_end(s: &str) -> Result<DateTime<Utc>, String> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date format '{}'. Expected YYYY-MM-DD", s))?;
    let next = date
        .succ_opt()
        .ok_or_else(|| format!("Date '{}' is out of range", s))?;
    Ok(next.and_time(chrono::NaiveTime::MIN).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventStatus, EventTime};
    use chrono::TimeZone;

    fn make_test_event(start_hour: u32, end_hour: u32) -> Event {
        Event {
            uid: "range-test".to_string(),
            recurrence_id: None,
            summary: "Range".to_string(),
            description: None,
            location: None,
            start: EventTime::DateTime(Utc.with_ymd_and_hms(2025, 3, 20, start_hour, 0, 0).unwrap()),
            end: EventTime::DateTime(Utc.with_ymd_and_hms(2025, 3, 20, end_hour, 0, 0).unwrap()),
            status: EventStatus::Confirmed,
            recurrence: None,
            reminders: vec![],
            updated: None,
            sequence: None,
        }
    }

    fn range(from_hour: u32, to_hour: u32) -> DateRange {
        DateRange::new(
            Some(Utc.with_ymd_and_hms(2025, 3, 20, from_hour, 0, 0).unwrap()),
            Some(Utc.with_ymd_and_hms(2025, 3, 20, to_hour, 0, 0).unwrap()),
        )
    }

    #[test]
    fn test_overlap_is_half_open() {
        let event = make_test_event(10, 11);
        assert!(range(9, 12).overlaps(&event));
        assert!(range(10, 11).overlaps(&event));
        assert!(!range(11, 12).overlaps(&event), "event ending at `from` is excluded");
        assert!(!range(8, 10).overlaps(&event), "event starting at `to` is excluded");
    }

    #[test]
    fn test_zero_length_event_at_from_matches() {
        let event = make_test_event(10, 10);
        assert!(range(10, 12).overlaps(&event));
    }

    #[test]
    fn test_end_before_start_is_treated_as_zero_length() {
        let event = make_test_event(10, 8);
        assert!(range(9, 12).overlaps(&event));
        assert!(!range(11, 12).overlaps(&event));
    }

    #[test]
    fn test_series_master_matches_any_window_after_its_start() {
        let mut event = make_test_event(10, 11);
        event.recurrence = Some(vec!["RRULE:FREQ=DAILY".to_string()]);
        assert!(range(20, 23).overlaps(&event));
        assert!(!range(8, 9).overlaps(&event));
    }

    #[test]
    fn test_from_args() {
        let r = DateRange::from_args(Some("start"), Some("2025-03-20")).unwrap();
        assert_eq!(r.from, None);
        assert_eq!(r.to, Some(Utc.with_ymd_and_hms(2025, 3, 21, 0, 0, 0).unwrap()));

        assert!(DateRange::from_args(Some("03/20/2025"), None).is_err());
    }
}
