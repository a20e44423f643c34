use anyhow::{Context, Result};
use calmirror_core::CalendarAccess;
use calmirror_core::projection::QueryParams;
use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;

use crate::render::{Render, format_instant, print_warnings};

pub fn run(access: &dyn CalendarAccess, since: &str) -> Result<()> {
    let since = parse_since(since, Utc::now())?;
    let updates = access.get_updated_since(since, &QueryParams::default())?;
    print_warnings(&updates.warnings);

    let changes = &updates.data;
    if changes.new_and_modified.is_empty() && changes.deleted.is_empty() {
        println!("{}", format!("No changes since {}", format_instant(since)).dimmed());
        return Ok(());
    }

    for event in &changes.new_and_modified {
        println!("{} {}", "~".yellow(), event.render());
    }
    for id in &changes.deleted {
        println!("{} {}", "-".red(), id.to_string().red());
    }

    Ok(())
}

/// An RFC 3339 timestamp, or a humantime duration counted back from `now`.
fn parse_since(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }

    let ago = humantime::parse_duration(raw)
        .with_context(|| format!("Invalid --since '{}'. Use RFC 3339 or a duration like \"2h\"", raw))?;
    let ago = chrono::Duration::from_std(ago)?;
    now.checked_sub_signed(ago)
        .with_context(|| format!("--since '{}' reaches too far back", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_since_timestamp() {
        let at = parse_since("2025-03-19T08:30:00+01:00", now()).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2025, 3, 19, 7, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_since_duration_ago() {
        assert_eq!(parse_since("2h", now()).unwrap(), now() - Duration::hours(2));
        assert_eq!(parse_since("3days", now()).unwrap(), now() - Duration::days(3));
    }

    #[test]
    fn test_parse_since_rejects_garbage() {
        assert!(parse_since("last tuesday", now()).is_err());
    }

    #[test]
    fn test_parse_since_out_of_range_is_an_error() {
        let err = parse_since("300000years", now()).unwrap_err();
        assert!(err.to_string().contains("too far back"), "got {err}");
    }
}
