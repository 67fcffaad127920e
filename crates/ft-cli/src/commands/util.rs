//! Shared utilities for CLI commands.

use anyhow::Context;
use chrono::{DateTime, Utc};
use ft_core::{Tracker, load_state};
use ft_db::Database;

use crate::Config;

/// Formats milliseconds as `1h 05m`, `12m 30s` or `45s`.
pub fn format_duration(ms: i64) -> String {
    let total_secs = ms.max(0) / 1_000;
    let hours = total_secs / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

/// Converts a user-supplied minute count to milliseconds.
pub fn minutes_to_ms(minutes: i64) -> anyhow::Result<i64> {
    minutes
        .checked_mul(60_000)
        .with_context(|| format!("{minutes} minutes is out of range"))
}

/// Rebuilds a read-only tracker view from storage.
pub fn restore_tracker(db: &Database, config: &Config, now: DateTime<Utc>) -> Tracker {
    Tracker::restore(config.tracker.clone(), load_state(db), now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_each_magnitude() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(45_999), "45s");
        assert_eq!(format_duration(750_000), "12m 30s");
        assert_eq!(format_duration(3_900_000), "1h 05m");
        assert_eq!(format_duration(-5), "0s");
    }

    #[test]
    fn minutes_overflow_is_an_error() {
        assert_eq!(minutes_to_ms(30).unwrap(), 1_800_000);
        assert!(minutes_to_ms(i64::MAX).is_err());
    }
}
