//! Today's usage ledger.
//!
//! The ledger owns today's [`DailyUsageRecord`] and the active session: the
//! application currently attributed and when it took the foreground. Time
//! accrues to the record only when a session is flushed (on a switch, when a
//! filtered app takes over, or at shutdown). Readers get a live view that
//! adds the unflushed elapsed time on top without mutating anything.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::classifier::should_filter;
use crate::record::{DailyUsageRecord, sort_by_duration};
use crate::types::{ApplicationIdentity, elapsed_ms, local_day};

/// The application currently being attributed, not yet flushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    /// Display name of the foreground application.
    pub app_name: String,
    /// When this application took the foreground.
    pub started_at: DateTime<Utc>,
}

/// A session that passed the minimum-duration gate and was added to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flush {
    /// The application that received the time.
    pub app_name: String,
    /// Milliseconds added by this flush.
    pub elapsed_ms: i64,
    /// The application's cumulative milliseconds today after the flush.
    pub cumulative_ms: i64,
}

/// Today's per-application durations plus the active session.
#[derive(Debug, Clone)]
pub struct UsageLedger {
    today: DailyUsageRecord,
    active: Option<ActiveSession>,
    min_session_ms: i64,
}

impl UsageLedger {
    /// Creates an empty ledger for `day`.
    ///
    /// Sessions shorter than `min_session_ms` are discarded when flushed.
    pub const fn new(day: NaiveDate, min_session_ms: i64) -> Self {
        Self::with_record(DailyUsageRecord::new(day), min_session_ms)
    }

    /// Creates a ledger continuing from a stored record.
    pub const fn with_record(today: DailyUsageRecord, min_session_ms: i64) -> Self {
        Self {
            today,
            active: None,
            min_session_ms,
        }
    }

    /// The local calendar day this ledger accumulates.
    pub const fn day(&self) -> NaiveDate {
        self.today.date
    }

    /// Flushed durations for today, excluding the active session.
    pub const fn record(&self) -> &DailyUsageRecord {
        &self.today
    }

    /// The session currently being attributed, if any.
    pub const fn active(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    /// Sum of flushed durations.
    pub fn total_ms(&self) -> i64 {
        self.today.total_ms()
    }

    /// Records one foreground sample.
    ///
    /// Returns the flush produced by a boundary, if the ended session passed
    /// the minimum-duration gate.
    pub fn observe(&mut self, identity: &ApplicationIdentity, now: DateTime<Utc>) -> Option<Flush> {
        if should_filter(identity) {
            if self.active.is_some() {
                tracing::debug!(app = %identity.display_name, "filtered app took foreground");
            }
            return self.finish(now);
        }

        let same_app = self
            .active
            .as_ref()
            .is_some_and(|session| session.app_name == identity.display_name);
        if same_app {
            return None;
        }

        let flushed = self.finish(now);
        tracing::debug!(app = %identity.display_name, "session started");
        self.active = Some(ActiveSession {
            app_name: identity.display_name.clone(),
            started_at: now,
        });
        flushed
    }

    /// Ends the active session, adding its time if it lasted long enough.
    ///
    /// After this call no application is attributed.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Option<Flush> {
        let session = self.active.take()?;
        let elapsed = elapsed_ms(session.started_at, now);
        if elapsed < self.min_session_ms {
            tracing::debug!(
                app = %session.app_name,
                elapsed_ms = elapsed,
                "session below minimum duration, discarded"
            );
            return None;
        }
        let cumulative_ms = self.today.add(&session.app_name, elapsed);
        tracing::debug!(app = %session.app_name, elapsed_ms = elapsed, cumulative_ms, "session flushed");
        Some(Flush {
            app_name: session.app_name,
            elapsed_ms: elapsed,
            cumulative_ms,
        })
    }

    /// Live milliseconds for `app_name`: flushed time plus the active
    /// session's elapsed time if it is the attributed application.
    pub fn live_duration_ms(&self, app_name: &str, now: DateTime<Utc>) -> i64 {
        let flushed = self.today.duration_ms(app_name);
        match &self.active {
            Some(session) if session.app_name == app_name => {
                flushed.saturating_add(elapsed_ms(session.started_at, now))
            }
            _ => flushed,
        }
    }

    /// Flushed durations with the active session's elapsed time added.
    ///
    /// Read-only: the stored durations are not touched.
    pub fn current_totals(&self, now: DateTime<Utc>) -> BTreeMap<String, i64> {
        let mut totals = self.today.app_durations_ms().clone();
        if let Some(session) = &self.active {
            let total = totals.entry(session.app_name.clone()).or_insert(0);
            *total = total.saturating_add(elapsed_ms(session.started_at, now));
        }
        totals
    }

    /// Live total across all applications.
    pub fn current_total_ms(&self, now: DateTime<Utc>) -> i64 {
        self.current_totals(now)
            .values()
            .fold(0, |total, ms| total.saturating_add(*ms))
    }

    /// The `limit` longest-used applications in the live view.
    pub fn top_applications(&self, now: DateTime<Utc>, limit: usize) -> Vec<(String, i64)> {
        let mut apps = self.all_applications(now);
        apps.truncate(limit);
        apps
    }

    /// Every admitted application in the live view, longest first.
    pub fn all_applications(&self, now: DateTime<Utc>) -> Vec<(String, i64)> {
        sort_by_duration(&self.current_totals(now))
    }

    /// Clears today's durations and starts a new day.
    ///
    /// The active session is not flushed: its elapsed time is discarded and
    /// its clock restarts at `now`. Returns the pre-reset record.
    pub fn reset(&mut self, now: DateTime<Utc>) -> DailyUsageRecord {
        self.start_day(local_day(now), now)
    }

    /// Replaces today's record with an empty one for `day`, restarting the
    /// active session clock at `now`. Returns the previous record.
    pub fn start_day(&mut self, day: NaiveDate, now: DateTime<Utc>) -> DailyUsageRecord {
        if let Some(session) = &mut self.active {
            session.started_at = now;
        }
        std::mem::replace(&mut self.today, DailyUsageRecord::new(day))
    }
}
