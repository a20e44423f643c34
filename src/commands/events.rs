use anyhow::{Result, anyhow};
use calmirror_core::CalendarAccess;
use calmirror_core::event::{Event, EventId, EventTime};
use calmirror_core::projection::QueryParams;
use owo_colors::OwoColorize;

use crate::render::{Render, format_instant, print_by_day, print_warnings};

pub fn list(access: &dyn CalendarAccess, params: &QueryParams) -> Result<()> {
    let events = access.get_events_for_account(params)?;
    print_warnings(&events.warnings);
    print_by_day(&events.data);
    Ok(())
}

pub fn search(access: &dyn CalendarAccess, pattern: &str, params: &QueryParams) -> Result<()> {
    let events = access.search_events(pattern, params)?;
    print_warnings(&events.warnings);
    print_by_day(&events.data);
    Ok(())
}

pub fn exceptions(access: &dyn CalendarAccess, uid: &str) -> Result<()> {
    let events = access.get_change_exceptions(uid, &QueryParams::default())?;
    print_warnings(&events.warnings);

    if events.data.is_empty() {
        println!("{}", format!("No change exceptions for {}", uid).dimmed());
        return Ok(());
    }

    for event in &events.data {
        let replaces = event
            .recurrence_id
            .as_ref()
            .map(|rid| rid.to_string())
            .unwrap_or_default();
        println!("{} {} {}", replaces.dimmed(), "→".dimmed(), event.render());
    }
    Ok(())
}

pub fn show(access: &dyn CalendarAccess, uid: &str, recurrence_id: Option<&str>) -> Result<()> {
    let id = match recurrence_id {
        Some(raw) => {
            let rid = EventTime::parse(raw)
                .ok_or_else(|| anyhow!("Invalid recurrence id '{}'. Use RFC 3339 or YYYY-MM-DD", raw))?;
            EventId::with_recurrence(uid, rid)
        }
        None => EventId::new(uid),
    };

    let event = access.get_event(&id, &QueryParams::default())?;
    print_warnings(&event.warnings);
    print_details(&event.data);
    Ok(())
}

fn print_details(event: &Event) {
    println!("{}", event.summary.bold());
    println!("  when      {} - {}", event.start, event.end);
    if let Some(location) = &event.location {
        println!("  where     {}", location);
    }
    println!("  status    {:?}", event.status);
    if let Some(rules) = &event.recurrence {
        for rule in rules {
            println!("  repeats   {}", rule);
        }
    }
    if let Some(rid) = &event.recurrence_id {
        println!("  replaces  {}", rid);
    }
    for reminder in &event.reminders {
        println!("  reminder  {} minutes before", reminder.minutes);
    }
    if let Some(updated) = event.updated {
        println!("  updated   {}", format_instant(updated));
    }
    println!("  uid       {}", event.uid.dimmed());

    if let Some(description) = &event.description {
        println!();
        println!("{}", description);
    }
}
