//! Tracker tuning.

use serde::{Deserialize, Serialize};

/// Explicit configuration for the tracker and its sampling loop.
///
/// Every field has a default, so partial TOML or environment overrides work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Interval between foreground samples.
    /// Default: 1000 (1 Hz).
    pub sample_interval_ms: u64,

    /// Sessions shorter than this are discarded when flushed.
    /// Default: 5000 (5 seconds).
    pub min_session_ms: i64,

    /// Minimum spacing between live rule checks on the focused app.
    /// Default: 5000 (5 seconds).
    pub rule_check_interval_ms: i64,

    /// Minimum spacing between routine persistence writes.
    /// Default: 10000 (10 seconds).
    pub persist_interval_ms: i64,

    /// Upper bound on a single foreground probe or notification delivery.
    /// Default: 750.
    pub collaborator_timeout_ms: u64,

    /// When false, samples are ignored entirely.
    pub tracking_enabled: bool,

    /// When false, rules are not evaluated.
    pub notifications_enabled: bool,

    /// Roll over automatically when the local calendar day changes.
    pub auto_rollover: bool,

    /// Keep at most this many archived days. `None` keeps everything.
    pub history_retention_days: Option<usize>,

    /// Default size of the top-applications view.
    pub top_apps_limit: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 1_000,
            min_session_ms: 5_000,
            rule_check_interval_ms: 5_000,
            persist_interval_ms: 10_000,
            collaborator_timeout_ms: 750,
            tracking_enabled: true,
            notifications_enabled: true,
            auto_rollover: true,
            history_retention_days: None,
            top_apps_limit: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: TrackerConfig =
            serde_json::from_str(r#"{"min_session_ms": 0, "auto_rollover": false}"#).unwrap();
        assert_eq!(config.min_session_ms, 0);
        assert!(!config.auto_rollover);
        assert_eq!(config.sample_interval_ms, 1_000);
        assert_eq!(config.top_apps_limit, 8);
    }
}
