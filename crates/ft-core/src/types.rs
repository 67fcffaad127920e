//! Core type definitions with validation.

use std::fmt;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A rule time limit must be strictly positive.
    #[error("time limit must be positive, got {value_ms}ms")]
    NonPositiveLimit { value_ms: i64 },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated notification rule identifier.
    ///
    /// Freshly created rules get a random UUID; stored rules keep whatever
    /// non-empty ID they were saved with.
    RuleId, "rule ID"
);

impl RuleId {
    /// Generates a fresh random rule ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// The application currently holding the foreground, as reported by the
/// platform probe on each sample tick.
///
/// Ephemeral: identities are never persisted, only their display names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApplicationIdentity {
    /// Human-readable name (e.g. "Firefox"). This is the ledger key.
    pub display_name: String,
    /// Bundle or package identifier (e.g. "org.mozilla.firefox"). May be empty.
    pub bundle_id: String,
    /// OS process ID, informational only.
    pub process_id: u32,
}

impl ApplicationIdentity {
    /// Builds an identity from its parts.
    pub fn new(display_name: impl Into<String>, bundle_id: impl Into<String>, process_id: u32) -> Self {
        Self {
            display_name: display_name.into(),
            bundle_id: bundle_id.into(),
            process_id,
        }
    }

    /// An identity known only by name, as used when re-filtering stored
    /// ledger keys.
    pub fn from_name(display_name: impl Into<String>) -> Self {
        Self::new(display_name, String::new(), 0)
    }
}

/// Returns the local calendar day a UTC timestamp falls on.
pub fn local_day(timestamp: DateTime<Utc>) -> NaiveDate {
    timestamp.with_timezone(&Local).date_naive()
}

/// Whole milliseconds elapsed from `start` to `end`, clamped at zero.
pub fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_milliseconds().max(0)
}
