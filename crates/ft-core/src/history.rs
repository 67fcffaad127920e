//! Archive of past days' usage.

use chrono::NaiveDate;

use crate::record::DailyUsageRecord;

/// Past days' records, newest first, at most one per calendar day.
#[derive(Debug, Clone, Default)]
pub struct HistoryArchive {
    records: Vec<DailyUsageRecord>,
    retention_days: Option<usize>,
}

impl HistoryArchive {
    /// Creates an empty archive with no retention cap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an archive from stored records.
    ///
    /// Every record is re-filtered through the classifier, duplicate days
    /// collapse to the last one given, and the result is sorted newest first.
    /// With `retention_days`, only that many of the newest days are kept.
    pub fn load(records: Vec<DailyUsageRecord>, retention_days: Option<usize>) -> Self {
        let mut archive = Self {
            records: Vec::with_capacity(records.len()),
            retention_days,
        };
        for record in records {
            archive.insert(record.refiltered());
        }
        archive.enforce_retention();
        archive
    }

    /// Inserts `record`, replacing any existing record for the same day.
    ///
    /// Returns the replaced record, if there was one.
    pub fn upsert(&mut self, record: DailyUsageRecord) -> Option<DailyUsageRecord> {
        let replaced = self.insert(record);
        self.enforce_retention();
        replaced
    }

    /// The record for `date`, if archived.
    pub fn record_for_date(&self, date: NaiveDate) -> Option<&DailyUsageRecord> {
        self.records.iter().find(|record| record.date == date)
    }

    /// All records, newest first.
    pub fn all(&self) -> &[DailyUsageRecord] {
        &self.records
    }

    /// Archived days, newest first.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.records.iter().map(|record| record.date).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn insert(&mut self, record: DailyUsageRecord) -> Option<DailyUsageRecord> {
        match self.records.binary_search_by(|probe| record.date.cmp(&probe.date)) {
            Ok(index) => self
                .records
                .get_mut(index)
                .map(|slot| std::mem::replace(slot, record)),
            Err(index) => {
                self.records.insert(index, record);
                None
            }
        }
    }

    fn enforce_retention(&mut self) {
        if let Some(keep) = self.retention_days {
            if self.records.len() > keep {
                tracing::debug!(
                    dropped = self.records.len() - keep,
                    "pruning history beyond retention"
                );
                self.records.truncate(keep);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, d).unwrap()
    }

    fn record(d: u32, apps: &[(&str, i64)]) -> DailyUsageRecord {
        let durations: BTreeMap<String, i64> = apps
            .iter()
            .map(|(app, ms)| ((*app).to_string(), *ms))
            .collect();
        DailyUsageRecord::from_durations(day(d), durations)
    }

    #[test]
    fn upsert_same_day_twice_keeps_second() {
        let mut archive = HistoryArchive::new();
        assert!(archive.upsert(record(3, &[("Editor", 1_000)])).is_none());
        let replaced = archive.upsert(record(3, &[("Editor", 9_000)]));

        assert_eq!(replaced.unwrap().total_ms(), 1_000);
        assert_eq!(archive.len(), 1);
        assert_eq!(archive.record_for_date(day(3)).unwrap().total_ms(), 9_000);
    }

    #[test]
    fn all_is_newest_first() {
        let mut archive = HistoryArchive::new();
        archive.upsert(record(2, &[("Editor", 1)]));
        archive.upsert(record(9, &[("Editor", 1)]));
        archive.upsert(record(5, &[("Editor", 1)]));
        assert_eq!(archive.dates(), vec![day(9), day(5), day(2)]);
    }

    #[test]
    fn record_for_date_misses_unknown_days() {
        let mut archive = HistoryArchive::new();
        archive.upsert(record(2, &[("Editor", 1)]));
        assert!(archive.record_for_date(day(3)).is_none());
    }

    #[test]
    fn load_refilters_sorts_and_collapses_duplicates() {
        let archive = HistoryArchive::load(
            vec![
                record(1, &[("Editor", 1_000), ("Finder", 5_000)]),
                record(4, &[("Browser", 2_000), ("softwareupdated", 7_000)]),
                record(1, &[("Editor", 3_000)]),
            ],
            None,
        );

        assert_eq!(archive.dates(), vec![day(4), day(1)]);
        let first = archive.record_for_date(day(1)).unwrap();
        assert_eq!(first.total_ms(), 3_000);
        let fourth = archive.record_for_date(day(4)).unwrap();
        assert_eq!(fourth.total_ms(), 2_000);
        assert_eq!(fourth.app_durations_ms().len(), 1);
    }

    #[test]
    fn totals_match_sums_at_rest() {
        let archive = HistoryArchive::load(
            vec![
                record(1, &[("Editor", 1_000), ("Dock", 5_000), ("Mail", 250)]),
                record(2, &[("Zoom Helper", 2_000), ("Some Helper", 3_000)]),
            ],
            None,
        );
        for record in archive.all() {
            assert_eq!(
                record.total_ms(),
                record.app_durations_ms().values().sum::<i64>()
            );
        }
        assert_eq!(archive.record_for_date(day(2)).unwrap().total_ms(), 2_000);
    }

    #[test]
    fn retention_keeps_newest_days() {
        let mut archive = HistoryArchive::load(
            vec![record(1, &[("Editor", 1)]), record(2, &[("Editor", 1)])],
            Some(2),
        );
        archive.upsert(record(3, &[("Editor", 1)]));
        assert_eq!(archive.dates(), vec![day(3), day(2)]);
    }
}
