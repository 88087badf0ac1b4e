pub mod dedup;
pub mod export;
pub mod normalize;

use crate::analyzer::categorizer::CategoryRules;
use crate::db::{Database, HistorySource};
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Duration, Utc};
use export::UploadHint;
use normalize::{Normalized, Normalizer, RowRejection};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub inserted: usize,
    pub expired: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub errors: Vec<RowRejection>,
    pub cutoff: DateTime<Utc>,
}

pub struct IngestRequest<'a> {
    pub owner: &'a str,
    pub source: HistorySource,
    pub hint: UploadHint<'a>,
    pub body: &'a [u8],
}

/// Parses, normalizes, deduplicates and stores one uploaded export.
pub fn ingest_export(
    database: &mut Database,
    rules: &CategoryRules,
    retention_days: u32,
    request: IngestRequest<'_>,
    now: DateTime<Utc>,
) -> AppResult<BatchSummary> {
    let parsed = export::read_export(request.hint, request.body)?;
    if parsed.format.source() != request.source {
        return Err(AppError::Export(format!(
            "uploaded file looks like a {} export, expected {} history",
            parsed.format, request.source
        )));
    }

    let cutoff = now - Duration::days(i64::from(retention_days));
    let normalizer = Normalizer::new(request.owner, rules, cutoff);

    let mut records = Vec::with_capacity(parsed.rows.len());
    let mut expired = 0;
    let mut errors = Vec::new();
    for (row, raw) in parsed.rows.iter().enumerate() {
        match normalizer.normalize(raw) {
            Normalized::Record(record) => records.push(*record),
            Normalized::Expired => expired += 1,
            Normalized::Rejected(reason) => errors.push(RowRejection { row, reason }),
        }
    }

    let deduplicated = dedup::dedup_batch(records);
    let inserted = database.insert_history_records(&deduplicated.records)?;

    let summary = BatchSummary {
        total: parsed.rows.len(),
        inserted,
        expired,
        duplicates: deduplicated.duplicates,
        rejected: errors.len(),
        errors,
        cutoff,
    };

    if !summary.errors.is_empty() {
        debug!(sample = ?&summary.errors[..summary.errors.len().min(10)], "rejected rows");
    }
    info!(
        owner = request.owner,
        source = %request.source,
        format = %parsed.format,
        total = summary.total,
        inserted = summary.inserted,
        expired = summary.expired,
        duplicates = summary.duplicates,
        rejected = summary.rejected,
        "history batch ingested"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::{IngestRequest, ingest_export};
    use crate::analyzer::categorizer::{Category, CategoryRules};
    use crate::collector::export::UploadHint;
    use crate::collector::normalize::RejectReason;
    use crate::db::HistorySource;
    use crate::db::test_support::temp_database;
    use crate::error::AppError;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn json_hint() -> UploadHint<'static> {
        UploadHint {
            filename: Some("history.json"),
            content_type: Some("application/json"),
        }
    }

    #[test]
    fn batch_summary_counts_each_outcome() {
        let (_dir, mut database) = temp_database();
        let now = Utc::now();
        // five seconds into a minute, so both visits share the bucket
        let recent = ((now - Duration::days(2)).timestamp() / 60 * 60 + 5) * 1000;
        let old = (now - Duration::days(20)).timestamp_millis();
        let body = json!([
            {"url": "https://github.com/a", "visitTime": recent},
            {"url": "https://github.com/a", "visitTime": recent + 1_000},
            {"url": "https://github.com/b", "visitTime": old},
            {"url": "mailto:me@example.com", "visitTime": recent},
            {"title": "no url", "visitTime": recent},
        ])
        .to_string();

        let summary = ingest_export(
            &mut database,
            &CategoryRules::default(),
            14,
            IngestRequest {
                owner: "U",
                source: HistorySource::Browser,
                hint: json_hint(),
                body: body.as_bytes(),
            },
            now,
        )
        .expect("ingest");

        assert_eq!(summary.total, 5);
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.expired, 1);
        assert_eq!(summary.rejected, 2);
        assert_eq!(summary.errors[0].row, 3);
        assert_eq!(summary.errors[0].reason, RejectReason::InvalidProtocol);
        assert_eq!(summary.errors[1].reason, RejectReason::MissingUrl);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.cutoff, now - Duration::days(14));
    }

    #[test]
    fn takeout_uploaded_to_browser_route_is_rejected() {
        let (_dir, mut database) = temp_database();
        let body = json!([{"title": "Watched x", "titleUrl": "https://youtube.com/watch?v=1"}])
            .to_string();

        let result = ingest_export(
            &mut database,
            &CategoryRules::default(),
            14,
            IngestRequest {
                owner: "U",
                source: HistorySource::Browser,
                hint: json_hint(),
                body: body.as_bytes(),
            },
            Utc::now(),
        );

        assert!(matches!(result, Err(AppError::Export(_))));
    }

    #[test]
    fn video_takeout_is_stored_with_channel() {
        let (_dir, mut database) = temp_database();
        let now = Utc::now();
        let body = json!([{
            "title": "Watched Official Trailer",
            "titleUrl": "https://www.youtube.com/watch?v=9",
            "time": (now - Duration::days(1)).to_rfc3339(),
            "subtitles": [{"name": "Studio", "url": "https://www.youtube.com/channel/s"}]
        }])
        .to_string();

        let summary = ingest_export(
            &mut database,
            &CategoryRules::default(),
            14,
            IngestRequest {
                owner: "U",
                source: HistorySource::Video,
                hint: json_hint(),
                body: body.as_bytes(),
            },
            now,
        )
        .expect("ingest");
        assert_eq!(summary.inserted, 1);

        let stored = database
            .history_between(
                "U",
                HistorySource::Video,
                now - Duration::days(2),
                now + Duration::days(1),
            )
            .expect("query");
        assert_eq!(stored[0].channel.as_deref(), Some("Studio"));
        assert_eq!(stored[0].title.as_deref(), Some("Official Trailer"));
        assert_eq!(stored[0].category, Category::Entertainment);
    }
}
