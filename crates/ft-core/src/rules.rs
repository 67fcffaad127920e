//! Per-application time-limit rules and alert suppression.
//!
//! Rules reference applications by name, matched case-insensitively at
//! evaluation time. Once an application has produced an alert it stays
//! suppressed until the next reset or rollover, even if delivery failed.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{RuleId, ValidationError};

/// Category attached to every delivered alert.
pub const ALERT_CATEGORY: &str = "FOCUS_TIME_ALERT";

/// Title attached to every delivered alert.
pub const ALERT_TITLE: &str = "Focus time alert";

/// Rule management errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// The rule failed validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// No rule has the given ID.
    #[error("no rule with id {0}")]
    NotFound(RuleId),
}

/// A user-defined time limit for one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRule {
    pub id: RuleId,
    /// Application display name, matched case-insensitively.
    pub app_name: String,
    /// Alert once the application's daily time reaches this many milliseconds.
    pub time_limit_ms: i64,
    pub enabled: bool,
    /// Replaces the generated alert text when present and non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_message: Option<String>,
}

impl NotificationRule {
    /// Creates an enabled rule with a fresh ID.
    pub fn new(
        app_name: impl Into<String>,
        time_limit_ms: i64,
        custom_message: Option<String>,
    ) -> Result<Self, ValidationError> {
        let rule = Self {
            id: RuleId::generate(),
            app_name: app_name.into(),
            time_limit_ms,
            enabled: true,
            custom_message,
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Checks the app name is non-blank and the limit positive.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.app_name.trim().is_empty() {
            return Err(ValidationError::Empty { field: "app name" });
        }
        if self.time_limit_ms <= 0 {
            return Err(ValidationError::NonPositiveLimit {
                value_ms: self.time_limit_ms,
            });
        }
        Ok(())
    }

    fn matches(&self, app_name: &str) -> bool {
        self.enabled && self.app_name.to_lowercase() == app_name.to_lowercase()
    }

    /// The alert body for this rule at `duration_ms`.
    pub fn message_for(&self, duration_ms: i64) -> String {
        match self.custom_message.as_deref() {
            Some(message) if !message.is_empty() => message.to_string(),
            _ => default_message(&self.app_name, duration_ms),
        }
    }
}

/// Generates the standard alert sentence for `duration_ms` spent in `app_name`.
pub fn default_message(app_name: &str, duration_ms: i64) -> String {
    let total_secs = duration_ms.max(0) / 1_000;
    let hours = total_secs / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    let spent = if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    };
    format!("You've spent {spent} on {app_name}. Time for a break!")
}

/// A rule that fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub rule_id: RuleId,
    pub app_name: String,
    pub duration_ms: i64,
    pub message: String,
}

impl Alert {
    /// Builds the payload handed to the notification collaborator.
    pub fn to_notification(&self, now: DateTime<Utc>) -> Notification {
        Notification {
            title: ALERT_TITLE.to_string(),
            body: self.message.clone(),
            category: ALERT_CATEGORY.to_string(),
            correlation_id: format!("{}-{}", self.rule_id, now.timestamp_millis()),
        }
    }
}

/// What the notification collaborator receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub category: String,
    pub correlation_id: String,
}

/// The rule set plus the applications already alerted this period.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<NotificationRule>,
    /// Lowercased names, matching how rules compare applications.
    notified: HashSet<String>,
}

impl RuleEngine {
    /// Creates an engine from stored rules with nothing notified yet.
    pub fn new(rules: Vec<NotificationRule>) -> Self {
        Self {
            rules,
            notified: HashSet::new(),
        }
    }

    /// All rules in insertion order.
    pub fn rules(&self) -> &[NotificationRule] {
        &self.rules
    }

    /// Looks up a rule by ID.
    pub fn rule(&self, id: &RuleId) -> Option<&NotificationRule> {
        self.rules.iter().find(|rule| &rule.id == id)
    }

    /// Adds a new enabled rule.
    pub fn add(
        &mut self,
        app_name: impl Into<String>,
        time_limit_ms: i64,
        custom_message: Option<String>,
    ) -> Result<NotificationRule, RuleError> {
        let rule = NotificationRule::new(app_name, time_limit_ms, custom_message)?;
        self.rules.push(rule.clone());
        Ok(rule)
    }

    /// Replaces the rule with the same ID.
    pub fn update(&mut self, rule: NotificationRule) -> Result<(), RuleError> {
        rule.validate()?;
        let slot = self
            .rules
            .iter_mut()
            .find(|existing| existing.id == rule.id)
            .ok_or_else(|| RuleError::NotFound(rule.id.clone()))?;
        *slot = rule;
        Ok(())
    }

    /// Enables or disables a rule.
    pub fn set_enabled(&mut self, id: &RuleId, enabled: bool) -> Result<(), RuleError> {
        let rule = self
            .rules
            .iter_mut()
            .find(|rule| &rule.id == id)
            .ok_or_else(|| RuleError::NotFound(id.clone()))?;
        rule.enabled = enabled;
        Ok(())
    }

    /// Removes a rule, returning it.
    pub fn remove(&mut self, id: &RuleId) -> Result<NotificationRule, RuleError> {
        let index = self
            .rules
            .iter()
            .position(|rule| &rule.id == id)
            .ok_or_else(|| RuleError::NotFound(id.clone()))?;
        Ok(self.rules.remove(index))
    }

    /// Returns `true` if `app_name` already alerted this period.
    pub fn is_notified(&self, app_name: &str) -> bool {
        self.notified.contains(&app_name.to_lowercase())
    }

    /// Checks `app_name`'s cumulative time against its rules.
    ///
    /// Emits one alert per qualifying enabled rule, but only the first time
    /// the application qualifies in this period.
    pub fn evaluate(&mut self, app_name: &str, cumulative_ms: i64) -> Vec<Alert> {
        let key = app_name.to_lowercase();
        if self.notified.contains(&key) {
            return Vec::new();
        }
        let alerts = self.matching_alerts(app_name, cumulative_ms);
        if !alerts.is_empty() {
            tracing::info!(app = app_name, cumulative_ms, count = alerts.len(), "time limit reached");
            self.notified.insert(key);
        }
        alerts
    }

    /// Alerts `app_name` would produce at `duration_ms`, ignoring and not
    /// touching the suppression set.
    pub fn preview(&self, app_name: &str, duration_ms: i64) -> Vec<Alert> {
        self.matching_alerts(app_name, duration_ms)
    }

    /// Forgets which applications have alerted.
    pub fn clear_notified(&mut self) {
        self.notified.clear();
    }

    fn matching_alerts(&self, app_name: &str, duration_ms: i64) -> Vec<Alert> {
        self.rules
            .iter()
            .filter(|rule| rule.matches(app_name) && duration_ms >= rule.time_limit_ms)
            .map(|rule| Alert {
                rule_id: rule.id.clone(),
                app_name: app_name.to_string(),
                duration_ms,
                message: rule.message_for(duration_ms),
            })
            .collect()
    }
}
