//! Per-day usage records.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::classifier::should_filter_name;

/// Usage attributed to applications over one local calendar day.
///
/// The day total is always derived from the per-application map, so the two
/// can never disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyUsageRecord {
    /// The local calendar day this record covers.
    pub date: NaiveDate,

    /// Milliseconds attributed to each application, keyed by display name.
    #[serde(default)]
    app_durations_ms: BTreeMap<String, i64>,
}

impl DailyUsageRecord {
    /// Creates an empty record for the given day.
    pub const fn new(date: NaiveDate) -> Self {
        Self {
            date,
            app_durations_ms: BTreeMap::new(),
        }
    }

    /// Creates a record from stored durations.
    ///
    /// Negative durations are clamped to zero.
    pub fn from_durations(date: NaiveDate, durations: BTreeMap<String, i64>) -> Self {
        let app_durations_ms = durations
            .into_iter()
            .map(|(app, ms)| (app, ms.max(0)))
            .collect();
        Self {
            date,
            app_durations_ms,
        }
    }

    /// Milliseconds attributed to each application.
    pub const fn app_durations_ms(&self) -> &BTreeMap<String, i64> {
        &self.app_durations_ms
    }

    /// Milliseconds attributed to one application (zero if absent).
    pub fn duration_ms(&self, app_name: &str) -> i64 {
        self.app_durations_ms.get(app_name).copied().unwrap_or(0)
    }

    /// Sum of all per-application durations.
    pub fn total_ms(&self) -> i64 {
        self.app_durations_ms
            .values()
            .fold(0, |total, ms| total.saturating_add(*ms))
    }

    /// Returns `true` if nothing has been attributed.
    pub fn is_empty(&self) -> bool {
        self.app_durations_ms.is_empty()
    }

    /// Adds time to an application, returning its new cumulative duration.
    pub fn add(&mut self, app_name: &str, ms: i64) -> i64 {
        let entry = self
            .app_durations_ms
            .entry(app_name.to_string())
            .or_insert(0);
        *entry = entry.saturating_add(ms.max(0));
        *entry
    }

    /// Drops every application the classifier rejects.
    ///
    /// Applied on load so that deny-list improvements reach old data.
    #[must_use]
    pub fn refiltered(mut self) -> Self {
        self.app_durations_ms
            .retain(|app, _| !should_filter_name(app));
        self
    }

    /// Applications sorted by duration, longest first.
    ///
    /// Ties keep name order.
    pub fn sorted_apps(&self) -> Vec<(String, i64)> {
        sort_by_duration(&self.app_durations_ms)
    }
}

/// Filters a duration map through the classifier and sorts it longest first.
///
/// The sort is stable over the map's name order, so ties are deterministic.
pub(crate) fn sort_by_duration(durations: &BTreeMap<String, i64>) -> Vec<(String, i64)> {
    let mut apps: Vec<(String, i64)> = durations
        .iter()
        .filter(|(app, _)| !should_filter_name(app))
        .map(|(app, ms)| (app.clone(), *ms))
        .collect();
    apps.sort_by(|a, b| b.1.cmp(&a.1));
    apps
}
