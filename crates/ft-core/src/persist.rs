//! Persistence seam and debounced writer.
//!
//! Storage is reached only through [`UsageStore`]. Load failures degrade to
//! empty state, and write failures are logged and retried on the next pass,
//! so a broken store never stops sampling.

use chrono::{DateTime, Utc};

use crate::record::DailyUsageRecord;
use crate::rules::NotificationRule;
use crate::tracker::{PendingChanges, StoredState, TodaySnapshot, Tracker};
use crate::types::elapsed_ms;

/// Storage for today's ledger, the archive and the rule list.
///
/// This trait allows the tracker to work with different backends (e.g. the
/// SQLite database in ft-db, or an in-memory store in tests).
pub trait UsageStore {
    /// The backend's error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Loads today's ledger, if one was saved.
    fn load_today(&self) -> Result<Option<TodaySnapshot>, Self::Error>;

    /// Replaces today's ledger.
    fn save_today(&mut self, snapshot: &TodaySnapshot) -> Result<(), Self::Error>;

    /// Loads every archived day, in any order.
    fn load_history(&self) -> Result<Vec<DailyUsageRecord>, Self::Error>;

    /// Inserts or replaces the archived record for `record.date`.
    fn upsert_day(&mut self, record: &DailyUsageRecord) -> Result<(), Self::Error>;

    /// Deletes archived days older than the newest `keep` days.
    fn prune_history(&mut self, keep: usize) -> Result<usize, Self::Error>;

    /// Loads the rule list in insertion order.
    fn load_rules(&self) -> Result<Vec<NotificationRule>, Self::Error>;

    /// Replaces the rule list.
    fn save_rules(&mut self, rules: &[NotificationRule]) -> Result<(), Self::Error>;
}

/// Loads everything a [`Tracker`] needs, treating each unreadable part as
/// empty.
pub fn load_state<S: UsageStore>(store: &S) -> StoredState {
    let today = store.load_today().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "failed to load today's ledger, starting empty");
        None
    });
    let history = store.load_history().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "failed to load history, starting with empty archive");
        Vec::new()
    });
    let rules = store.load_rules().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "failed to load notification rules");
        Vec::new()
    });
    StoredState {
        today,
        history,
        rules,
    }
}

/// Writes tracker changes to a store, at most once per interval unless the
/// changes are significant (archived days or rule edits).
#[derive(Debug)]
pub struct Persister<S> {
    store: S,
    interval_ms: i64,
    retention_days: Option<usize>,
    last_write: Option<DateTime<Utc>>,
}

impl<S: UsageStore> Persister<S> {
    pub const fn new(store: S, interval_ms: i64, retention_days: Option<usize>) -> Self {
        Self {
            store,
            interval_ms,
            retention_days,
            last_write: None,
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Persists pending changes if the debounce window has passed or the
    /// changes cannot wait.
    pub fn persist_if_due(&mut self, tracker: &mut Tracker, now: DateTime<Utc>) -> bool {
        let changes = tracker.take_changes();
        if changes.is_empty() {
            return false;
        }
        let window_open = self
            .last_write
            .is_none_or(|last| elapsed_ms(last, now) >= self.interval_ms);
        if !window_open && !changes.is_significant() {
            tracker.return_changes(changes);
            return false;
        }
        self.write(tracker, changes, now)
    }

    /// Persists pending changes immediately.
    pub fn persist_now(&mut self, tracker: &mut Tracker, now: DateTime<Utc>) -> bool {
        let changes = tracker.take_changes();
        if changes.is_empty() {
            return true;
        }
        self.write(tracker, changes, now)
    }

    fn write(&mut self, tracker: &mut Tracker, changes: PendingChanges, now: DateTime<Utc>) -> bool {
        self.last_write = Some(now);
        match self.apply(&changes) {
            Ok(()) => {
                tracing::debug!(
                    today = changes.today.is_some(),
                    archived = changes.archived.len(),
                    rules = changes.rules.is_some(),
                    "persisted changes"
                );
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to persist changes, will retry");
                tracker.return_changes(changes);
                false
            }
        }
    }

    fn apply(&mut self, changes: &PendingChanges) -> Result<(), S::Error> {
        for record in &changes.archived {
            self.store.upsert_day(record)?;
        }
        if !changes.archived.is_empty() {
            if let Some(keep) = self.retention_days {
                let pruned = self.store.prune_history(keep)?;
                if pruned > 0 {
                    tracing::debug!(pruned, "pruned stored history");
                }
            }
        }
        if let Some(snapshot) = &changes.today {
            self.store.save_today(snapshot)?;
        }
        if let Some(rules) = &changes.rules {
            self.store.save_rules(rules)?;
        }
        Ok(())
    }
}
