//! Core domain logic for the focus time tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Classification: separating user applications from system noise
//! - Accounting: attributing foreground time to applications per day
//! - History: archiving past days, one record per calendar day
//! - Rules: per-application time limits that alert once per day
//! - Sampling: the 1 Hz loop driving all of the above

pub mod classifier;
mod config;
pub mod history;
pub mod ledger;
mod persist;
pub mod record;
pub mod rollover;
pub mod rules;
mod sampling;
mod tracker;
mod types;

pub use classifier::{should_filter, should_filter_name};
pub use config::TrackerConfig;
pub use history::HistoryArchive;
pub use ledger::{ActiveSession, Flush, UsageLedger};
pub use persist::{Persister, UsageStore, load_state};
pub use record::DailyUsageRecord;
pub use rules::{Alert, Notification, NotificationRule, RuleEngine, RuleError};
pub use sampling::{
    ForegroundProbe, Notifier, NotifyError, SamplingLoop, SharedTracker, lock_tracker,
};
pub use tracker::{PendingChanges, StoredState, TodaySnapshot, Tracker};
pub use types::{ApplicationIdentity, RuleId, ValidationError, elapsed_ms, local_day};
