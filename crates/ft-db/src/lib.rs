//! Storage layer for the focus time tracker.
//!
//! Provides persistence for today's ledger, the daily archive and the
//! notification rules using `rusqlite`, behind the
//! [`ft_core::UsageStore`] trait.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` can be moved into the sampling loop but not shared with
//! other threads; readers such as the `status` command open their own
//! connection.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with millisecond
//! precision (e.g., `2025-01-15T10:30:00.000Z`), always UTC. Calendar days
//! are stored as `YYYY-MM-DD`, so lexicographic order matches date order.
//!
//! ## Per-application durations
//!
//! The `app_durations` columns store a JSON object mapping application
//! display names to milliseconds. The `total_ms` columns are informational:
//! totals are recomputed from the map on load.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use ft_core::{DailyUsageRecord, NotificationRule, RuleId, TodaySnapshot, UsageStore};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp in {table}: {timestamp}")]
    TimestampParse {
        table: &'static str,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// Failed to parse a stored calendar day.
    #[error("invalid date in {table}: {date}")]
    DateParse {
        table: &'static str,
        date: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored row could not be decoded.
    #[error("invalid record in {table} ({key}): {message}")]
    InvalidRecord {
        table: &'static str,
        key: String,
        message: String,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- Today's ledger: at most one row
            -- day: local calendar day 'YYYY-MM-DD'
            -- app_durations: JSON object of app name -> ms
            CREATE TABLE IF NOT EXISTS today_ledger (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                day TEXT NOT NULL,
                app_durations TEXT NOT NULL,
                total_ms INTEGER NOT NULL DEFAULT 0,
                last_activity_at TEXT NOT NULL
            );

            -- Archive: one row per calendar day
            CREATE TABLE IF NOT EXISTS daily_usage (
                date TEXT PRIMARY KEY,
                app_durations TEXT NOT NULL,
                total_ms INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS notification_rules (
                id TEXT PRIMARY KEY,
                position INTEGER NOT NULL,
                app_name TEXT NOT NULL,
                time_limit_ms INTEGER NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                custom_message TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_rules_position ON notification_rules(position);
            ",
        )?;
        Ok(())
    }
}

impl UsageStore for Database {
    type Error = DbError;

    fn load_today(&self) -> Result<Option<TodaySnapshot>, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT day, app_durations, last_activity_at FROM today_ledger WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((day, durations, last_activity_at)) = row else {
            return Ok(None);
        };

        let date = parse_date(&day, "today_ledger")?;
        let record =
            DailyUsageRecord::from_durations(date, parse_durations(&durations, "today_ledger", &day)?);
        Ok(Some(TodaySnapshot {
            record,
            last_activity_at: parse_timestamp(&last_activity_at, "today_ledger")?,
        }))
    }

    fn save_today(&mut self, snapshot: &TodaySnapshot) -> Result<(), DbError> {
        let record = &snapshot.record;
        self.conn.execute(
            "
            INSERT INTO today_ledger (id, day, app_durations, total_ms, last_activity_at)
            VALUES (1, ?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                day = excluded.day,
                app_durations = excluded.app_durations,
                total_ms = excluded.total_ms,
                last_activity_at = excluded.last_activity_at
            ",
            params![
                format_date(record.date),
                encode_durations(record)?,
                record.total_ms(),
                format_timestamp(snapshot.last_activity_at),
            ],
        )?;
        Ok(())
    }

    fn load_history(&self) -> Result<Vec<DailyUsageRecord>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT date, app_durations FROM daily_usage ORDER BY date DESC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (date, durations) = row?;
            let day = parse_date(&date, "daily_usage")?;
            let durations = parse_durations(&durations, "daily_usage", &date)?;
            records.push(DailyUsageRecord::from_durations(day, durations));
        }
        Ok(records)
    }

    fn upsert_day(&mut self, record: &DailyUsageRecord) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO daily_usage (date, app_durations, total_ms)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(date) DO UPDATE SET
                app_durations = excluded.app_durations,
                total_ms = excluded.total_ms
            ",
            params![
                format_date(record.date),
                encode_durations(record)?,
                record.total_ms()
            ],
        )?;
        Ok(())
    }

    fn prune_history(&mut self, keep: usize) -> Result<usize, DbError> {
        let keep = i64::try_from(keep).unwrap_or(i64::MAX);
        let pruned = self.conn.execute(
            "
            DELETE FROM daily_usage
            WHERE date NOT IN (SELECT date FROM daily_usage ORDER BY date DESC LIMIT ?1)
            ",
            params![keep],
        )?;
        Ok(pruned)
    }

    fn load_rules(&self) -> Result<Vec<NotificationRule>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, app_name, time_limit_ms, enabled, custom_message
            FROM notification_rules
            ORDER BY position ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, bool>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut rules = Vec::new();
        for row in rows {
            let (id, app_name, time_limit_ms, enabled, custom_message) = row?;
            let rule_id =
                RuleId::new(id.clone()).map_err(|err| invalid("notification_rules", &id, err))?;
            let rule = NotificationRule {
                id: rule_id,
                app_name,
                time_limit_ms,
                enabled,
                custom_message,
            };
            rule.validate()
                .map_err(|err| invalid("notification_rules", &id, err))?;
            rules.push(rule);
        }
        Ok(rules)
    }

    fn save_rules(&mut self, rules: &[NotificationRule]) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM notification_rules", [])?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO notification_rules
                (id, position, app_name, time_limit_ms, enabled, custom_message)
                VALUES (?, ?, ?, ?, ?, ?)
                ",
            )?;
            for (position, rule) in (0_i64..).zip(rules) {
                stmt.execute(params![
                    rule.id.as_str(),
                    position,
                    rule.app_name,
                    rule.time_limit_ms,
                    rule.enabled,
                    rule.custom_message,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(count = rules.len(), "saved notification rules");
        Ok(())
    }
}

fn invalid(table: &'static str, key: &str, err: impl std::fmt::Display) -> DbError {
    DbError::InvalidRecord {
        table,
        key: key.to_string(),
        message: err.to_string(),
    }
}

fn encode_durations(record: &DailyUsageRecord) -> Result<String, DbError> {
    serde_json::to_string(record.app_durations_ms())
        .map_err(|err| invalid("daily_usage", &format_date(record.date), err))
}

fn parse_durations(
    json: &str,
    table: &'static str,
    key: &str,
) -> Result<BTreeMap<String, i64>, DbError> {
    serde_json::from_str(json).map_err(|err| invalid(table, key, err))
}

fn parse_date(date: &str, table: &'static str) -> Result<NaiveDate, DbError> {
    NaiveDate::parse_from_str(date, DATE_FORMAT).map_err(|source| DbError::DateParse {
        table,
        date: date.to_string(),
        source,
    })
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_timestamp(timestamp: &str, table: &'static str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            table,
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
