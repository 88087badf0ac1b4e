use super::Database;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct MetricInput {
    pub key: String,
    pub value: f64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricValue {
    pub key: String,
    pub label: String,
    pub unit: Option<String>,
    pub period_date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyReport {
    pub period_date: NaiveDate,
    pub report_md: String,
    pub created_at: DateTime<Utc>,
}

impl Database {
    /// Creates catalog entries on first sight, then upserts every value in one
    /// transaction.
    pub fn record_metric_values(
        &mut self,
        owner: &str,
        period_date: NaiveDate,
        inputs: &[MetricInput],
    ) -> Result<Vec<MetricValue>> {
        let transaction = self
            .conn
            .transaction()
            .context("Failed to start transaction")?;

        let mut saved = Vec::with_capacity(inputs.len());
        for input in inputs {
            let key = input.key.trim();
            let label = input.label.as_deref().unwrap_or(key);

            transaction
                .execute(
                    "INSERT INTO metrics_catalog (owner, key, label, unit)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(owner, key) DO NOTHING",
                    params![owner, key, label, &input.unit],
                )
                .context("Failed to register metric")?;

            let (metric_id, catalog_label, catalog_unit): (i64, String, Option<String>) =
                transaction
                    .query_row(
                        "SELECT id, label, unit FROM metrics_catalog WHERE owner = ?1 AND key = ?2",
                        params![owner, key],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                    )
                    .context("Failed to resolve metric id")?;

            transaction
                .execute(
                    "INSERT INTO metric_values (owner, metric_id, period_date, value)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(owner, metric_id, period_date)
                     DO UPDATE SET value=excluded.value",
                    params![owner, metric_id, period_date, input.value],
                )
                .context("Failed to upsert metric value")?;

            saved.push(MetricValue {
                key: key.to_string(),
                label: catalog_label,
                unit: catalog_unit,
                period_date,
                value: input.value,
            });
        }

        transaction
            .commit()
            .context("Failed to commit metric values")?;

        Ok(saved)
    }

    pub fn metric_values_for(&self, owner: &str, period_date: NaiveDate) -> Result<Vec<MetricValue>> {
        let mut statement = self.conn.prepare(
            "SELECT c.key, c.label, c.unit, v.period_date, v.value
             FROM metric_values v
             JOIN metrics_catalog c ON c.id = v.metric_id
             WHERE v.owner = ?1 AND c.owner = ?1 AND v.period_date = ?2
             ORDER BY c.key ASC",
        )?;

        let rows = statement
            .query_map(params![owner, period_date], |row| {
                Ok(MetricValue {
                    key: row.get(0)?,
                    label: row.get(1)?,
                    unit: row.get(2)?,
                    period_date: row.get(3)?,
                    value: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query metric values")?;

        Ok(rows)
    }

    pub fn metric_labels(&self, owner: &str) -> Result<Vec<String>> {
        let mut statement = self
            .conn
            .prepare("SELECT label FROM metrics_catalog WHERE owner = ?1 ORDER BY id ASC")?;

        let rows = statement
            .query_map(params![owner], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()
            .context("Failed to query metric labels")?;

        Ok(rows)
    }

    pub fn upsert_weekly_report(
        &self,
        owner: &str,
        period_date: NaiveDate,
        report_md: &str,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO weekly_reports (owner, period_date, report_md, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(owner, period_date)
                 DO UPDATE SET report_md=excluded.report_md, created_at=excluded.created_at",
                params![owner, period_date, report_md, Utc::now()],
            )
            .context("Failed to upsert weekly report")?;

        Ok(())
    }

    pub fn weekly_report(&self, owner: &str, period_date: NaiveDate) -> Result<Option<WeeklyReport>> {
        self.conn
            .query_row(
                "SELECT period_date, report_md, created_at FROM weekly_reports
                 WHERE owner = ?1 AND period_date = ?2",
                params![owner, period_date],
                |row| {
                    Ok(WeeklyReport {
                        period_date: row.get(0)?,
                        report_md: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()
            .context("Failed to query weekly report")
    }
}

#[cfg(test)]
mod tests {
    use super::MetricInput;
    use crate::db::test_support::temp_database;
    use chrono::NaiveDate;

    fn input(key: &str, value: f64) -> MetricInput {
        MetricInput {
            key: key.to_string(),
            value,
            label: None,
            unit: None,
        }
    }

    #[test]
    fn resubmitting_a_period_overwrites_values() {
        let (_dir, mut database) = temp_database();
        let period = NaiveDate::from_ymd_opt(2024, 6, 9).expect("date");

        database
            .record_metric_values("U", period, &[input("commits", 10.0)])
            .expect("first submit");
        database
            .record_metric_values("U", period, &[input("commits", 12.0)])
            .expect("second submit");

        let values = database.metric_values_for("U", period).expect("values");
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, 12.0);
        assert_eq!(values[0].label, "commits");
    }

    #[test]
    fn catalog_is_per_owner() {
        let (_dir, mut database) = temp_database();
        let period = NaiveDate::from_ymd_opt(2024, 6, 9).expect("date");

        database
            .record_metric_values("alice", period, &[input("mrr", 5.0)])
            .expect("alice");
        database
            .record_metric_values("bob", period, &[input("mrr", 7.0)])
            .expect("bob");

        let alice = database.metric_values_for("alice", period).expect("alice values");
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].value, 5.0);
        assert_eq!(database.metric_labels("bob").expect("labels"), vec!["mrr"]);
    }

    #[test]
    fn weekly_report_upsert_replaces_markdown() {
        let (_dir, database) = temp_database();
        let period = NaiveDate::from_ymd_opt(2024, 6, 9).expect("date");

        database.upsert_weekly_report("U", period, "old").expect("first");
        database.upsert_weekly_report("U", period, "new").expect("second");

        let report = database
            .weekly_report("U", period)
            .expect("query")
            .expect("report exists");
        assert_eq!(report.report_md, "new");
    }
}
