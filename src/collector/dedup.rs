use crate::db::HistoryRecord;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct Deduplicated {
    pub records: Vec<HistoryRecord>,
    pub duplicates: usize,
}

/// Collapses records sharing (url, minute) within one batch. The first
/// occurrence wins; earlier batches are not consulted.
pub fn dedup_batch(records: Vec<HistoryRecord>) -> Deduplicated {
    let mut seen = HashSet::with_capacity(records.len());

    records
        .into_iter()
        .fold(Deduplicated::default(), |mut acc, record| {
            if seen.insert((record.url.clone(), minute_bucket(record.occurred_at))) {
                acc.records.push(record);
            } else {
                acc.duplicates += 1;
            }
            acc
        })
}

fn minute_bucket(instant: DateTime<Utc>) -> i64 {
    instant.timestamp().div_euclid(60)
}

#[cfg(test)]
mod tests {
    use super::dedup_batch;
    use crate::analyzer::categorizer::Category;
    use crate::db::{HistoryRecord, HistorySource};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn record(url: &str, at: DateTime<Utc>, title: &str) -> HistoryRecord {
        HistoryRecord {
            owner: "U".to_string(),
            source: HistorySource::Browser,
            url: url.to_string(),
            title: Some(title.to_string()),
            occurred_at: at,
            occurrences: 1,
            domain: "a.com".to_string(),
            channel: None,
            channel_url: None,
            category: Category::Other,
        }
    }

    #[test]
    fn same_url_same_minute_keeps_first() {
        let base = Utc.with_ymd_and_hms(2024, 6, 5, 10, 15, 5).unwrap();
        let result = dedup_batch(vec![
            record("https://a.com", base, "first"),
            record("https://a.com", base + Duration::seconds(40), "second"),
        ]);

        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].title.as_deref(), Some("first"));
        assert_eq!(result.duplicates, 1);
    }

    #[test]
    fn different_minutes_or_urls_are_kept() {
        let base = Utc.with_ymd_and_hms(2024, 6, 5, 10, 15, 50).unwrap();
        let result = dedup_batch(vec![
            record("https://a.com", base, "a"),
            // crosses the minute boundary
            record("https://a.com", base + Duration::seconds(20), "b"),
            record("https://b.com", base, "c"),
        ]);

        assert_eq!(result.records.len(), 3);
        assert_eq!(result.duplicates, 0);
    }
}
