//! Status command for showing today's usage.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};

use ft_db::Database;

use super::util::{format_duration, restore_tracker};
use crate::Config;

pub fn run<W: Write>(writer: &mut W, db: &Database, config: &Config, now: DateTime<Utc>) -> Result<()> {
    let tracker = restore_tracker(db, config, now);

    writeln!(writer, "Focus time for {}", tracker.day())?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    if !config.tracker.tracking_enabled {
        writeln!(writer, "Tracking is disabled.")?;
    }

    let apps = tracker.top_applications(now);
    if apps.is_empty() {
        writeln!(writer, "No usage recorded today.")?;
        return Ok(());
    }

    writeln!(writer, "Total: {}", format_duration(tracker.total_today_ms(now)))?;
    for (app, ms) in apps {
        writeln!(writer, "  {app:<24} {:>8}", format_duration(ms))?;
    }
    let hidden = tracker.all_applications(now).len().saturating_sub(config.tracker.top_apps_limit);
    if hidden > 0 {
        writeln!(writer, "  ... and {hidden} more")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use chrono::{Local, TimeZone};
    use ft_core::{DailyUsageRecord, TodaySnapshot, UsageStore, local_day};
    use insta::assert_snapshot;

    fn noon() -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(2025, 3, 4, 12, 0, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    fn render(db: &Database, config: &Config) -> String {
        let mut output = Vec::new();
        run(&mut output, db, config, noon()).unwrap();
        let output = String::from_utf8(output).unwrap();
        output.replace(&config.database_path.display().to_string(), "[TEMP]/ft.db")
    }

    #[test]
    fn status_command_lists_top_applications() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("ft.db");
        let mut db = Database::open(&db_path).unwrap();

        let durations = BTreeMap::from([
            ("Editor".to_string(), 3_900_000),
            ("Browser".to_string(), 750_000),
            ("Terminal".to_string(), 42_000),
            ("Finder".to_string(), 99_000),
        ]);
        db.save_today(&TodaySnapshot {
            record: DailyUsageRecord::from_durations(local_day(noon()), durations),
            last_activity_at: noon(),
        })
        .unwrap();

        let config = Config {
            database_path: db_path,
            tracker: ft_core::TrackerConfig {
                top_apps_limit: 2,
                ..ft_core::TrackerConfig::default()
            },
        };

        assert_snapshot!(render(&db, &config), @r"
        Focus time for 2025-03-04
        Database: [TEMP]/ft.db
        Total: 1h 18m
          Editor                     1h 05m
          Browser                   12m 30s
          ... and 1 more
        ");
    }

    #[test]
    fn status_command_reports_empty_day() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("ft.db");
        let db = Database::open(&db_path).unwrap();
        let config = Config {
            database_path: db_path,
            tracker: ft_core::TrackerConfig {
                tracking_enabled: false,
                ..ft_core::TrackerConfig::default()
            },
        };

        assert_snapshot!(render(&db, &config), @r"
        Focus time for 2025-03-04
        Database: [TEMP]/ft.db
        Tracking is disabled.
        No usage recorded today.
        ");
    }
}
