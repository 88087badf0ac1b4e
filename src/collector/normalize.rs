use super::export::{BrowserRow, ExportRow, RawTimestamp, VideoRow};
use crate::analyzer::categorizer::CategoryRules;
use crate::db::{HistoryRecord, HistorySource};
use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use url::Url;

/// Chrome stores microseconds since 1601-01-01; anything above this is in that unit.
const WEBKIT_EPOCH_THRESHOLD: i64 = 10_000_000_000_000;
const WEBKIT_EPOCH_OFFSET_MS: i64 = 11_644_473_600_000;

const DATE_TIME_FORMATS: [&str; 6] = [
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const NAIVE_TEXT_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    MissingUrl,
    InvalidProtocol,
    InvalidUrl,
    MissingTimestamp,
    InvalidTimestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowRejection {
    pub row: usize,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Record(Box<HistoryRecord>),
    Expired,
    Rejected(RejectReason),
}

pub struct Normalizer<'a> {
    owner: &'a str,
    rules: &'a CategoryRules,
    cutoff: DateTime<Utc>,
}

impl<'a> Normalizer<'a> {
    pub fn new(owner: &'a str, rules: &'a CategoryRules, cutoff: DateTime<Utc>) -> Self {
        Self {
            owner,
            rules,
            cutoff,
        }
    }

    pub fn normalize(&self, row: &ExportRow) -> Normalized {
        let result = match row {
            ExportRow::Browser(row) => self.browser(row),
            ExportRow::Video(row) => self.video(row),
        };

        match result {
            Ok(record) if record.occurred_at < self.cutoff => Normalized::Expired,
            Ok(record) => Normalized::Record(Box::new(record)),
            Err(reason) => Normalized::Rejected(reason),
        }
    }

    fn browser(&self, row: &BrowserRow) -> Result<HistoryRecord, RejectReason> {
        let (url, domain) = validate_url(row.url.as_deref())?;
        let occurred_at = row
            .timestamp
            .as_ref()
            .ok_or(RejectReason::MissingTimestamp)
            .and_then(|raw| resolve_timestamp(raw).ok_or(RejectReason::InvalidTimestamp))?;

        Ok(HistoryRecord {
            owner: self.owner.to_string(),
            source: HistorySource::Browser,
            category: self.rules.categorize(&domain, row.title.as_deref()),
            url,
            title: row.title.clone(),
            occurred_at,
            occurrences: occurrence_count(row.visit_count),
            domain,
            channel: None,
            channel_url: None,
        })
    }

    fn video(&self, row: &VideoRow) -> Result<HistoryRecord, RejectReason> {
        let (url, domain) = validate_url(row.url.as_deref())?;
        let occurred_at = row
            .time
            .as_deref()
            .ok_or(RejectReason::MissingTimestamp)
            .and_then(|raw| parse_text_timestamp(raw).ok_or(RejectReason::InvalidTimestamp))?;
        let title = row.title.as_deref().map(strip_watched_prefix);

        Ok(HistoryRecord {
            owner: self.owner.to_string(),
            source: HistorySource::Video,
            category: self.rules.categorize(&domain, title.as_deref()),
            url,
            title,
            occurred_at,
            occurrences: 1,
            domain,
            channel: row.channel.clone(),
            channel_url: row.channel_url.clone(),
        })
    }
}

fn validate_url(raw: Option<&str>) -> Result<(String, String), RejectReason> {
    let raw = raw
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .ok_or(RejectReason::MissingUrl)?;

    let lowered = raw.to_lowercase();
    if !lowered.starts_with("http://") && !lowered.starts_with("https://") {
        return Err(RejectReason::InvalidProtocol);
    }

    let parsed = Url::parse(raw).map_err(|_| RejectReason::InvalidUrl)?;
    let domain = extract_domain(&parsed).ok_or(RejectReason::InvalidUrl)?;

    Ok((raw.to_string(), domain))
}

/// Lowercased host without a leading `www.`.
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str()
        .map(|host| host.to_lowercase())
        .map(|host| host.trim_start_matches("www.").to_string())
        .filter(|host| !host.is_empty())
}

pub fn resolve_timestamp(raw: &RawTimestamp) -> Option<DateTime<Utc>> {
    match raw {
        RawTimestamp::Epoch(value) => epoch_to_utc(*value),
        RawTimestamp::DateAndTime { date, time } => parse_date_and_time(date, time),
        RawTimestamp::Text(text) => parse_text_timestamp(text),
    }
}

pub fn epoch_to_utc(value: i64) -> Option<DateTime<Utc>> {
    let millis = if value > WEBKIT_EPOCH_THRESHOLD {
        value / 1000 - WEBKIT_EPOCH_OFFSET_MS
    } else {
        value
    };

    DateTime::<Utc>::from_timestamp_millis(millis)
}

/// Separate date and time columns, read as server-local time.
pub fn parse_date_and_time(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let joined = format!("{} {}", date.trim(), time.trim());

    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&joined, format).ok())
        // two-digit years are left to the manual parser
        .filter(|parsed| parsed.year() >= 1000)
        .or_else(|| parse_date_and_time_manually(date, time))
        .and_then(local_to_utc)
}

fn parse_date_and_time_manually(date: &str, time: &str) -> Option<NaiveDateTime> {
    let date_parts = date
        .trim()
        .split(['/', '-', '.'])
        .map(|part| part.trim().parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;
    let [month, day, year] = date_parts.as_slice() else {
        return None;
    };
    let year = if *year < 100 { year + 2000 } else { *year };

    let time_parts = time
        .trim()
        .split(':')
        .map(leading_number)
        .collect::<Vec<_>>();
    let hour = time_parts.first().copied().flatten()?;
    let minute = time_parts.get(1).copied().flatten()?;
    let second = time_parts.get(2).copied().flatten().unwrap_or(0);

    let date = NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, *month, *day)?;
    let time = NaiveTime::from_hms_opt(hour, minute, second)?;

    Some(date.and_time(time))
}

fn leading_number(part: &str) -> Option<u32> {
    let digits = part
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>();
    digits.parse().ok()
}

/// RFC 3339 first, then naive local date-times, then a bare date at UTC midnight.
pub fn parse_text_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    if let Some(parsed) = NAIVE_TEXT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
    {
        return local_to_utc(parsed);
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }

    raw.split_once(char::is_whitespace)
        .and_then(|(date, time)| parse_date_and_time(date, time))
}

fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|datetime| datetime.with_timezone(&Utc))
}

fn occurrence_count(raw: Option<i64>) -> u32 {
    raw.filter(|count| *count > 0)
        .map(|count| u32::try_from(count).unwrap_or(u32::MAX))
        .unwrap_or(1)
}

fn strip_watched_prefix(title: &str) -> String {
    title
        .strip_prefix("Watched ")
        .unwrap_or(title)
        .trim()
        .to_string()
}
