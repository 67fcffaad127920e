//! Day boundaries.
//!
//! A rollover snapshots the ledger under its old date, upserts that snapshot
//! into the archive, then clears the ledger and the notified set. Callers run
//! it on the same thread as sampling so no tick can see a half-rolled ledger.

use chrono::{DateTime, NaiveDate, Utc};

use crate::history::HistoryArchive;
use crate::ledger::UsageLedger;
use crate::record::DailyUsageRecord;
use crate::rules::RuleEngine;
use crate::types::local_day;

/// Returns `true` if `last_activity` falls on an earlier (or later) local day
/// than `now`.
pub fn needs_rollover(last_activity: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    local_day(last_activity) != local_day(now)
}

/// Moves the ledger's contents into the archive and starts `new_day`.
///
/// The active session's clock restarts at `now`. Empty days are not
/// archived. Returns the archived record.
pub fn roll_over(
    ledger: &mut UsageLedger,
    archive: &mut HistoryArchive,
    rules: &mut RuleEngine,
    new_day: NaiveDate,
    now: DateTime<Utc>,
) -> Option<DailyUsageRecord> {
    let snapshot = ledger.start_day(new_day, now);
    rules.clear_notified();
    if snapshot.is_empty() {
        tracing::debug!(date = %snapshot.date, "rolled over empty day");
        return None;
    }
    tracing::info!(
        date = %snapshot.date,
        total_ms = snapshot.total_ms(),
        apps = snapshot.app_durations_ms().len(),
        "archived day"
    );
    archive.upsert(snapshot.clone());
    Some(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use chrono::{Duration, Local, TimeZone};

    fn local(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(y, m, d, h, 0, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn needs_rollover_compares_local_days() {
        let morning = local(2025, 5, 10, 9);
        assert!(!needs_rollover(morning, morning + Duration::hours(3)));
        assert!(needs_rollover(morning, local(2025, 5, 11, 9)));
    }

    #[test]
    fn roll_over_archives_snapshot_and_clears_state() {
        let now = local(2025, 5, 10, 18);
        let today = local_day(now);
        let record = DailyUsageRecord::from_durations(
            today,
            BTreeMap::from([("Editor".to_string(), 3_600_000)]),
        );
        let mut ledger = UsageLedger::with_record(record, 5_000);
        let mut archive = HistoryArchive::new();
        let mut rules = RuleEngine::default();
        rules.add("Editor", 1_000, None).unwrap();
        assert_eq!(rules.evaluate("Editor", 3_600_000).len(), 1);

        let archived = roll_over(&mut ledger, &mut archive, &mut rules, today, now).unwrap();

        assert_eq!(archived.date, today);
        assert_eq!(archived.total_ms(), 3_600_000);
        let stored = archive.record_for_date(today).unwrap();
        assert_eq!(stored.duration_ms("Editor"), 3_600_000);
        assert_eq!(stored.total_ms(), 3_600_000);
        assert!(ledger.record().is_empty());
        assert!(!rules.is_notified("Editor"));
    }

    #[test]
    fn empty_day_is_not_archived() {
        let now = local(2025, 5, 10, 18);
        let mut ledger = UsageLedger::new(local_day(now), 5_000);
        let mut archive = HistoryArchive::new();
        let mut rules = RuleEngine::default();
        assert!(roll_over(&mut ledger, &mut archive, &mut rules, local_day(now), now).is_none());
        assert!(archive.is_empty());
    }
}
