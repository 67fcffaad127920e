//! The tracker: ledger, archive, rules and rollover wired together.
//!
//! All mutation happens through [`Tracker`] on one thread of control. Each
//! sample is fed to [`Tracker::tick`], which attributes time, rolls over at
//! day boundaries and evaluates rules, returning any alerts for the caller
//! to deliver. Nothing here performs I/O; persistence reads the pending
//! changes via [`Tracker::take_changes`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::TrackerConfig;
use crate::history::HistoryArchive;
use crate::ledger::{ActiveSession, Flush, UsageLedger};
use crate::record::DailyUsageRecord;
use crate::rollover::{needs_rollover, roll_over};
use crate::rules::{Alert, NotificationRule, RuleEngine, RuleError};
use crate::types::{ApplicationIdentity, RuleId, elapsed_ms, local_day};

/// Today's persisted ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodaySnapshot {
    pub record: DailyUsageRecord,
    /// When the tracker last saw a foreground sample.
    pub last_activity_at: DateTime<Utc>,
}

/// Everything loaded from storage at startup.
#[derive(Debug, Clone, Default)]
pub struct StoredState {
    pub today: Option<TodaySnapshot>,
    pub history: Vec<DailyUsageRecord>,
    pub rules: Vec<NotificationRule>,
}

/// State changed since the last successful persistence pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingChanges {
    /// Today's ledger changed.
    pub today: Option<TodaySnapshot>,
    /// Days moved into the archive.
    pub archived: Vec<DailyUsageRecord>,
    /// The full rule list, if it changed.
    pub rules: Option<Vec<NotificationRule>>,
}

impl PendingChanges {
    pub fn is_empty(&self) -> bool {
        self.today.is_none() && self.archived.is_empty() && self.rules.is_none()
    }

    /// Whether these changes should be written without waiting for the
    /// debounce window.
    pub fn is_significant(&self) -> bool {
        !self.archived.is_empty() || self.rules.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Dirty {
    today: bool,
    rules: bool,
}

/// Usage accounting and rule evaluation for one desktop session.
#[derive(Debug, Clone)]
pub struct Tracker {
    config: TrackerConfig,
    ledger: UsageLedger,
    archive: HistoryArchive,
    rules: RuleEngine,
    last_rule_check: Option<DateTime<Utc>>,
    last_activity_at: DateTime<Utc>,
    dirty: Dirty,
    archived: Vec<DailyUsageRecord>,
}

impl Tracker {
    /// Creates a tracker with no stored state.
    pub fn new(config: TrackerConfig, now: DateTime<Utc>) -> Self {
        Self::restore(config, StoredState::default(), now)
    }

    /// Creates a tracker from stored state.
    ///
    /// Today's snapshot and the archive are re-filtered through the
    /// classifier. If the snapshot belongs to another day, by its date or by
    /// its last activity, it is archived under the earlier of the two and
    /// today starts empty.
    pub fn restore(config: TrackerConfig, state: StoredState, now: DateTime<Utc>) -> Self {
        let today = local_day(now);
        let mut archive = HistoryArchive::load(state.history, config.history_retention_days);
        let mut dirty = Dirty::default();
        let mut archived = Vec::new();

        let ledger = match state.today {
            Some(snapshot)
                if snapshot.record.date != today
                    || needs_rollover(snapshot.last_activity_at, now) =>
            {
                let mut record = snapshot.record.refiltered();
                record.date = record.date.min(local_day(snapshot.last_activity_at));
                tracing::info!(date = %record.date, "stored ledger is from an earlier day");
                if !record.is_empty() {
                    archive.upsert(record.clone());
                    archived.push(record);
                }
                dirty.today = true;
                UsageLedger::new(today, config.min_session_ms)
            }
            Some(snapshot) => {
                let mut record = snapshot.record.refiltered();
                record.date = today;
                UsageLedger::with_record(record, config.min_session_ms)
            }
            None => UsageLedger::new(today, config.min_session_ms),
        };

        Self {
            ledger,
            archive,
            rules: RuleEngine::new(state.rules),
            last_rule_check: None,
            last_activity_at: now,
            dirty,
            archived,
            config,
        }
    }

    pub const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Processes one foreground sample.
    ///
    /// `None` means the foreground application could not be determined; the
    /// tick is skipped without any state change. Returns alerts to deliver.
    pub fn tick(&mut self, identity: Option<&ApplicationIdentity>, now: DateTime<Utc>) -> Vec<Alert> {
        if !self.config.tracking_enabled {
            return Vec::new();
        }
        let Some(identity) = identity else {
            return Vec::new();
        };

        let mut alerts = Vec::new();
        if self.config.auto_rollover && local_day(now) != self.ledger.day() {
            alerts.extend(self.roll_over_day(now));
        }

        if let Some(flush) = self.ledger.observe(identity, now) {
            alerts.extend(self.apply_flush(&flush));
        }
        self.last_activity_at = now;

        if self.rule_check_due(now) {
            self.last_rule_check = Some(now);
            if let Some(app) = self.ledger.active().map(|session| session.app_name.clone()) {
                let live_ms = self.ledger.live_duration_ms(&app, now);
                alerts.extend(self.evaluate(&app, live_ms));
            }
        }
        alerts
    }

    /// Explicit reset: archives today under its date, then clears the ledger
    /// and the notified set.
    ///
    /// The in-flight session is discarded, not flushed, and its clock
    /// restarts at `now`. Returns the archived record.
    pub fn reset(&mut self, now: DateTime<Utc>) -> Option<DailyUsageRecord> {
        tracing::info!("usage reset requested");
        let archived = roll_over(
            &mut self.ledger,
            &mut self.archive,
            &mut self.rules,
            local_day(now),
            now,
        );
        self.last_activity_at = now;
        self.record_rollover(archived.clone());
        archived
    }

    /// Flushes the in-flight session before the tracker stops.
    ///
    /// Time since the last sample tick is attributed up to `now`; anything
    /// after `now` is lost. Returns alerts raised by the final flush.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Vec<Alert> {
        let alerts = self
            .ledger
            .finish(now)
            .map(|flush| self.apply_flush(&flush))
            .unwrap_or_default();
        self.dirty.today = true;
        alerts
    }

    /// Evaluates rules for a synthetic duration without suppressing
    /// later alerts.
    pub fn test_alert(&self, app_name: &str, duration_ms: i64) -> Vec<Alert> {
        self.rules.preview(app_name, duration_ms)
    }

    // ========== Reads ==========

    /// The local day being accumulated.
    pub const fn day(&self) -> NaiveDate {
        self.ledger.day()
    }

    /// The attributed application, if any.
    pub const fn active(&self) -> Option<&ActiveSession> {
        self.ledger.active()
    }

    pub const fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at
    }

    /// Today's live total in milliseconds.
    pub fn total_today_ms(&self, now: DateTime<Utc>) -> i64 {
        self.ledger.current_total_ms(now)
    }

    /// The configured number of longest-used applications today.
    pub fn top_applications(&self, now: DateTime<Utc>) -> Vec<(String, i64)> {
        self.ledger.top_applications(now, self.config.top_apps_limit)
    }

    /// Every admitted application today, longest first.
    pub fn all_applications(&self, now: DateTime<Utc>) -> Vec<(String, i64)> {
        self.ledger.all_applications(now)
    }

    /// A day's breakdown, longest first.
    ///
    /// The archive wins; the live view only answers for today when nothing
    /// has been archived for it (an explicit reset archives today).
    pub fn apps_for_date(&self, date: NaiveDate, now: DateTime<Utc>) -> Vec<(String, i64)> {
        if let Some(record) = self.archive.record_for_date(date) {
            return record.sorted_apps();
        }
        if date == self.ledger.day() {
            return self.all_applications(now);
        }
        Vec::new()
    }

    /// A day's total, looked up the same way as [`Self::apps_for_date`].
    pub fn total_for_date(&self, date: NaiveDate, now: DateTime<Utc>) -> i64 {
        if let Some(record) = self.archive.record_for_date(date) {
            return record.total_ms();
        }
        if date == self.ledger.day() {
            return self.total_today_ms(now);
        }
        0
    }

    pub const fn history(&self) -> &HistoryArchive {
        &self.archive
    }

    /// Today's flushed ledger as it would be persisted.
    pub fn today_snapshot(&self) -> TodaySnapshot {
        TodaySnapshot {
            record: self.ledger.record().clone(),
            last_activity_at: self.last_activity_at,
        }
    }

    // ========== Rules ==========

    pub fn rules(&self) -> &[NotificationRule] {
        self.rules.rules()
    }

    pub fn add_rule(
        &mut self,
        app_name: impl Into<String>,
        time_limit_ms: i64,
        custom_message: Option<String>,
    ) -> Result<NotificationRule, RuleError> {
        let rule = self.rules.add(app_name, time_limit_ms, custom_message)?;
        self.dirty.rules = true;
        Ok(rule)
    }

    pub fn update_rule(&mut self, rule: NotificationRule) -> Result<(), RuleError> {
        self.rules.update(rule)?;
        self.dirty.rules = true;
        Ok(())
    }

    pub fn set_rule_enabled(&mut self, id: &RuleId, enabled: bool) -> Result<(), RuleError> {
        self.rules.set_enabled(id, enabled)?;
        self.dirty.rules = true;
        Ok(())
    }

    pub fn remove_rule(&mut self, id: &RuleId) -> Result<NotificationRule, RuleError> {
        let removed = self.rules.remove(id)?;
        self.dirty.rules = true;
        Ok(removed)
    }

    // ========== Persistence bookkeeping ==========

    /// Takes everything changed since the last call.
    pub fn take_changes(&mut self) -> PendingChanges {
        let dirty = std::mem::take(&mut self.dirty);
        PendingChanges {
            today: dirty.today.then(|| self.today_snapshot()),
            archived: std::mem::take(&mut self.archived),
            rules: dirty.rules.then(|| self.rules.rules().to_vec()),
        }
    }

    /// Puts back changes that failed to persist so the next pass retries.
    pub fn return_changes(&mut self, changes: PendingChanges) {
        self.dirty.today |= changes.today.is_some();
        self.dirty.rules |= changes.rules.is_some();
        let mut archived = changes.archived;
        archived.append(&mut self.archived);
        self.archived = archived;
    }

    // ========== Internals ==========

    fn roll_over_day(&mut self, now: DateTime<Utc>) -> Vec<Alert> {
        tracing::info!(from = %self.ledger.day(), to = %local_day(now), "calendar day changed");
        let alerts = self
            .ledger
            .finish(now)
            .map(|flush| self.apply_flush(&flush))
            .unwrap_or_default();
        let archived = roll_over(
            &mut self.ledger,
            &mut self.archive,
            &mut self.rules,
            local_day(now),
            now,
        );
        self.record_rollover(archived);
        alerts
    }

    fn record_rollover(&mut self, archived: Option<DailyUsageRecord>) {
        self.dirty.today = true;
        self.last_rule_check = None;
        self.archived.extend(archived);
    }

    fn apply_flush(&mut self, flush: &Flush) -> Vec<Alert> {
        self.dirty.today = true;
        self.evaluate(&flush.app_name, flush.cumulative_ms)
    }

    fn evaluate(&mut self, app_name: &str, cumulative_ms: i64) -> Vec<Alert> {
        if !self.config.notifications_enabled {
            return Vec::new();
        }
        self.rules.evaluate(app_name, cumulative_ms)
    }

    fn rule_check_due(&self, now: DateTime<Utc>) -> bool {
        self.last_rule_check
            .is_none_or(|last| elapsed_ms(last, now) >= self.config.rule_check_interval_ms)
    }
}
