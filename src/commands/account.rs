use anyhow::Result;
use calmirror_core::CalendarMirror;
use calmirror_core::account::{AccountKey, AccountRecord, REFRESH_INTERVAL_KEY};
use calmirror_core::remote::{SNAPSHOT_PROVIDER_ID, SOURCE_KEY};
use owo_colors::OwoColorize;

pub fn add(mirror: &CalendarMirror, key: AccountKey, source: &str, refresh: Option<i64>) -> Result<()> {
    let source = std::path::absolute(source)?;
    let source = source.to_string_lossy();

    let mut record = AccountRecord::new(key, SNAPSHOT_PROVIDER_ID);
    record.user.set(SOURCE_KEY, source.to_string());
    if let Some(minutes) = refresh {
        if minutes <= 0 {
            anyhow::bail!("--refresh must be a positive number of minutes");
        }
        record.user.set(REFRESH_INTERVAL_KEY, minutes);
    }

    let record = mirror.add_account(record)?;
    println!("{} Added account {} ({})", "✓".green(), record.key, source.dimmed());
    println!("Events are fetched on first read, e.g. `calmirror events {}`", key.account);

    Ok(())
}

pub fn remove(mirror: &CalendarMirror, key: AccountKey) -> Result<()> {
    mirror.remove_account(&key)?;
    println!("{} Removed account {} and its cached events", "✓".green(), key);
    Ok(())
}
