//! Colored terminal rendering for calmirror-core types.

use calmirror_core::Warning;
use calmirror_core::cache::Staleness;
use calmirror_core::event::{Event, EventStatus, EventTime};
use chrono::{DateTime, Local, Utc};
use owo_colors::OwoColorize;

pub trait Render {
    fn render(&self) -> String;
}

impl Render for Staleness {
    fn render(&self) -> String {
        match self {
            Staleness::Fresh => "fresh".green().to_string(),
            Staleness::Stale => "stale".yellow().to_string(),
            Staleness::NeverRefreshed => "never refreshed".red().to_string(),
        }
    }
}

impl Render for Warning {
    fn render(&self) -> String {
        format!("{} {}", "warning:".yellow().bold(), self)
    }
}

impl Render for Event {
    fn render(&self) -> String {
        let summary = match self.status {
            EventStatus::Cancelled => self.summary.strikethrough().to_string(),
            EventStatus::Tentative => format!("{} (tentative)", self.summary),
            EventStatus::Confirmed => self.summary.clone(),
        };
        format!("{} {} {}", format_time(&self.start), summary, self.uid.dimmed())
    }
}

/// Warnings go to stderr so stdout stays parseable.
pub fn print_warnings(warnings: &[Warning]) {
    for warning in warnings {
        eprintln!("{}", warning.render());
    }
}

pub fn format_instant(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// A day label such as "Today", "Tomorrow" or "Wed Feb 25".
pub fn format_date_label(time: &EventTime) -> String {
    let today = Local::now().date_naive();

    let date = match time {
        EventTime::Date(d) => *d,
        EventTime::DateTime(dt) => dt.with_timezone(&Local).date_naive(),
    };

    match (date - today).num_days() {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        _ => date.format("%a %b %-d %Y").to_string(),
    }
}

/// "15:00", or "all-day" for date-only events.
pub fn format_time(time: &EventTime) -> String {
    match time {
        EventTime::Date(_) => format!("{:>7}", "all-day"),
        EventTime::DateTime(dt) => format!("{:>7}", dt.with_timezone(&Local).format("%H:%M")),
    }
}

/// Print events grouped under a label per day, in the order given.
pub fn print_by_day(events: &[Event]) {
    if events.is_empty() {
        println!("{}", "No events found".dimmed());
        return;
    }

    let mut current_date: Option<String> = None;
    for event in events {
        let label = format_date_label(&event.start);
        if current_date.as_ref() != Some(&label) {
            if current_date.is_some() {
                println!();
            }
            println!("{}", label.bold());
            current_date = Some(label);
        }
        println!("  {}", event.render());
    }
}
