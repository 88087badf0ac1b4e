pub mod checkin;
pub mod newsletter;
pub mod notes;
pub mod queries;

use crate::analyzer::categorizer::Category;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistorySource {
    Browser,
    Video,
}

impl HistorySource {
    pub fn as_str(self) -> &'static str {
        match self {
            HistorySource::Browser => "browser",
            HistorySource::Video => "video",
        }
    }
}

impl fmt::Display for HistorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewSource {
    Browser,
    Video,
    Combined,
}

impl ReviewSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewSource::Browser => "browser",
            ReviewSource::Video => "video",
            ReviewSource::Combined => "combined",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "browser" => Some(ReviewSource::Browser),
            "video" | "youtube" => Some(ReviewSource::Video),
            "combined" => Some(ReviewSource::Combined),
            _ => None,
        }
    }
}

impl fmt::Display for ReviewSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical visit/watch event. Never updated after insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub owner: String,
    pub source: HistorySource,
    pub url: String,
    pub title: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub occurrences: u32,
    pub domain: String,
    pub channel: Option<String>,
    pub channel_url: Option<String>,
    pub category: Category,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityReview {
    pub owner: String,
    pub period_week: NaiveDate,
    pub source: ReviewSource,
    pub summary_md: String,
    pub snapshot: Value,
    pub created_at: DateTime<Utc>,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("Failed to enable foreign keys")?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    /// Inserts one ingestion batch atomically.
    pub fn insert_history_records(&mut self, records: &[HistoryRecord]) -> Result<usize> {
        let transaction = self
            .conn
            .transaction()
            .context("Failed to start transaction")?;

        {
            let mut statement = transaction
                .prepare(
                    "INSERT INTO history_records
                     (owner, source, url, title, occurred_at_ms, occurrences, domain, channel, channel_url, category)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                )
                .context("Failed to prepare history insert")?;

            records.iter().try_for_each(|record| {
                statement
                    .execute(params![
                        &record.owner,
                        record.source.as_str(),
                        &record.url,
                        &record.title,
                        record.occurred_at.timestamp_millis(),
                        record.occurrences,
                        &record.domain,
                        &record.channel,
                        &record.channel_url,
                        record.category.as_str(),
                    ])
                    .context("Failed to insert history record")
                    .map(|_| ())
            })?;
        }

        transaction
            .commit()
            .context("Failed to commit history records")?;

        Ok(records.len())
    }

    /// Records in `[start, end)`, oldest first, in insertion order for ties.
    pub fn history_between(
        &self,
        owner: &str,
        source: HistorySource,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoryRecord>> {
        let mut statement = self.conn.prepare(
            "SELECT owner, source, url, title, occurred_at_ms, occurrences, domain, channel, channel_url, category
             FROM history_records
             WHERE owner = ?1 AND source = ?2 AND occurred_at_ms >= ?3 AND occurred_at_ms < ?4
             ORDER BY occurred_at_ms ASC, id ASC",
        )?;

        let rows = statement
            .query_map(
                params![
                    owner,
                    source.as_str(),
                    start.timestamp_millis(),
                    end.timestamp_millis()
                ],
                |row| history_from_row(row, source),
            )?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query history records")?;

        Ok(rows)
    }

    pub fn latest_history_timestamp(&self, owner: &str) -> Result<Option<DateTime<Utc>>> {
        let millis: Option<i64> = self
            .conn
            .query_row(
                "SELECT MAX(occurred_at_ms) FROM history_records WHERE owner = ?1",
                params![owner],
                |row| row.get(0),
            )
            .context("Failed to query latest history timestamp")?;

        Ok(millis.and_then(DateTime::<Utc>::from_timestamp_millis))
    }

    pub fn upsert_activity_review(&self, review: &ActivityReview) -> Result<()> {
        let snapshot =
            serde_json::to_string(&review.snapshot).context("Failed to serialize snapshot")?;

        self.conn
            .execute(
                "INSERT INTO activity_reviews (owner, period_week, source, summary_md, snapshot, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(owner, period_week, source)
                 DO UPDATE SET summary_md=excluded.summary_md, snapshot=excluded.snapshot, created_at=excluded.created_at",
                params![
                    &review.owner,
                    review.period_week,
                    review.source.as_str(),
                    &review.summary_md,
                    snapshot,
                    review.created_at
                ],
            )
            .context("Failed to upsert activity review")?;

        Ok(())
    }

    pub fn activity_review(
        &self,
        owner: &str,
        period_week: NaiveDate,
        source: ReviewSource,
    ) -> Result<Option<ActivityReview>> {
        self.conn
            .query_row(
                "SELECT owner, period_week, source, summary_md, snapshot, created_at
                 FROM activity_reviews
                 WHERE owner = ?1 AND period_week = ?2 AND source = ?3",
                params![owner, period_week, source.as_str()],
                review_from_row,
            )
            .optional()
            .context("Failed to query activity review")
    }

    pub fn activity_reviews_for_week(
        &self,
        owner: &str,
        period_week: NaiveDate,
    ) -> Result<Vec<ActivityReview>> {
        let mut statement = self.conn.prepare(
            "SELECT owner, period_week, source, summary_md, snapshot, created_at
             FROM activity_reviews
             WHERE owner = ?1 AND period_week = ?2
             ORDER BY source ASC",
        )?;

        let rows = statement
            .query_map(params![owner, period_week], review_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list activity reviews")?;

        Ok(rows)
    }
}

fn history_from_row(row: &Row<'_>, source: HistorySource) -> rusqlite::Result<HistoryRecord> {
    let millis: i64 = row.get(4)?;
    let occurred_at = DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(4, millis))?;
    let category: String = row.get(9)?;

    Ok(HistoryRecord {
        owner: row.get(0)?,
        source,
        url: row.get(2)?,
        title: row.get(3)?,
        occurred_at,
        occurrences: row.get(5)?,
        domain: row.get(6)?,
        channel: row.get(7)?,
        channel_url: row.get(8)?,
        category: Category::from_tag(&category),
    })
}

fn review_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityReview> {
    let source: String = row.get(2)?;
    let source = ReviewSource::parse(&source).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            format!("unknown review source: {source}").into(),
        )
    })?;
    let snapshot: String = row.get(4)?;
    let snapshot: Value = serde_json::from_str(&snapshot)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(error)))?;

    Ok(ActivityReview {
        owner: row.get(0)?,
        period_week: row.get(1)?,
        source,
        summary_md: row.get(3)?,
        snapshot,
        created_at: row.get(5)?,
    })
}
