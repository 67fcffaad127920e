//! History command for archived days.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};

use ft_db::Database;

use super::util::{format_duration, restore_tracker};
use crate::Config;

/// Lists archived days, newest first, or one day's breakdown when `date` is
/// given. Today falls back to the stored ledger when it has not been
/// archived.
pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    config: &Config,
    date: Option<NaiveDate>,
    now: DateTime<Utc>,
) -> Result<()> {
    let tracker = restore_tracker(db, config, now);

    let Some(date) = date else {
        let dates = tracker.history().dates();
        if dates.is_empty() {
            writeln!(writer, "No archived days.")?;
            return Ok(());
        }
        for day in dates {
            let apps = tracker.apps_for_date(day, now).len();
            writeln!(
                writer,
                "{day}  {:>8}  {apps} app{}",
                format_duration(tracker.total_for_date(day, now)),
                if apps == 1 { "" } else { "s" }
            )?;
        }
        return Ok(());
    };

    let apps = tracker.apps_for_date(date, now);
    if apps.is_empty() {
        writeln!(writer, "No usage recorded for {date}.")?;
        return Ok(());
    }
    writeln!(
        writer,
        "{date}: {}",
        format_duration(tracker.total_for_date(date, now))
    )?;
    for (app, ms) in apps {
        writeln!(writer, "  {app:<24} {:>8}", format_duration(ms))?;
    }
    Ok(())
}
