use anyhow::Result;
use calmirror_core::CalendarMirror;
use calmirror_core::account::AccountKey;
use owo_colors::OwoColorize;

use crate::render::{Render, format_instant};

pub fn run(mirror: &CalendarMirror, key: AccountKey) -> Result<()> {
    let status = mirror.caching_status(&key)?;

    let last_update = status
        .last_update
        .map(format_instant)
        .unwrap_or_else(|| "never".to_string());
    let lease = match status.lease_expiry {
        Some(until) if status.locked => format!("held until {}", format_instant(until))
            .yellow()
            .to_string(),
        _ => "free".dimmed().to_string(),
    };

    println!("{}", format!("Account {}", status.key).bold());
    println!("  provider          {}", status.provider);
    println!("  state             {}", status.staleness.render());
    println!("  last update       {}", last_update);
    println!(
        "  refresh interval  {}",
        humantime::format_duration(status.refresh_interval.to_std()?)
    );
    println!("  refresh lease     {}", lease);
    println!("  cached events     {}", status.cached_events);

    Ok(())
}
