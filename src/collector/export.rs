use crate::db::HistorySource;
use crate::error::{AppError, AppResult};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

/// Layout of an uploaded history file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    BrowserCsv,
    BrowserJson,
    VideoTakeout,
}

impl ExportFormat {
    pub fn source(self) -> HistorySource {
        match self {
            ExportFormat::BrowserCsv | ExportFormat::BrowserJson => HistorySource::Browser,
            ExportFormat::VideoTakeout => HistorySource::Video,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExportFormat::BrowserCsv => "browser csv",
            ExportFormat::BrowserJson => "browser json",
            ExportFormat::VideoTakeout => "video takeout",
        };
        f.write_str(label)
    }
}

/// Upload metadata used for format sniffing.
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadHint<'a> {
    pub filename: Option<&'a str>,
    pub content_type: Option<&'a str>,
}

impl UploadHint<'_> {
    fn says_json(&self) -> bool {
        let by_name = self
            .filename
            .is_some_and(|name| name.to_lowercase().ends_with(".json"));
        let by_mime = self
            .content_type
            .is_some_and(|mime| mime.to_lowercase().contains("json"));
        by_name || by_mime
    }

    fn says_csv(&self) -> bool {
        let by_name = self
            .filename
            .is_some_and(|name| name.to_lowercase().ends_with(".csv"));
        let by_mime = self
            .content_type
            .is_some_and(|mime| mime.to_lowercase().contains("csv"));
        by_name || by_mime
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawTimestamp {
    Epoch(i64),
    DateAndTime { date: String, time: String },
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrowserRow {
    pub url: Option<String>,
    pub title: Option<String>,
    pub timestamp: Option<RawTimestamp>,
    pub visit_count: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoRow {
    pub url: Option<String>,
    pub title: Option<String>,
    pub time: Option<String>,
    pub channel: Option<String>,
    pub channel_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportRow {
    Browser(BrowserRow),
    Video(VideoRow),
}

#[derive(Debug)]
pub struct ParsedExport {
    pub format: ExportFormat,
    pub rows: Vec<ExportRow>,
}

#[derive(Debug, Default, Deserialize)]
struct BrowserCsvRecord {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    last_visit_time: Option<String>,
    #[serde(default, alias = "visitcount")]
    visit_count: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BrowserJsonRecord {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "visitTime")]
    visit_time: Option<Value>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    last_visit_time: Option<Value>,
    #[serde(default, alias = "visitCount")]
    visit_count: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct TakeoutRecord {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "titleUrl")]
    title_url: Option<String>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    subtitles: Vec<TakeoutSubtitle>,
}

#[derive(Debug, Default, Deserialize)]
struct TakeoutSubtitle {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Sniffs the layout of `body` and parses every row. Any structural problem
/// fails the whole file.
pub fn read_export(hint: UploadHint<'_>, body: &[u8]) -> AppResult<ParsedExport> {
    let text = std::str::from_utf8(body)
        .map_err(|_| AppError::Export("file is not valid UTF-8".to_string()))?;
    let text = text.trim_start_matches('\u{feff}');

    if text.trim().is_empty() {
        return Err(AppError::Export("file is empty".to_string()));
    }

    if looks_like_json(hint, text) {
        read_json_export(text)
    } else {
        read_csv_export(text)
    }
}

fn looks_like_json(hint: UploadHint<'_>, text: &str) -> bool {
    let first = text.trim_start().chars().next();
    match first {
        Some('[') => true,
        _ if hint.says_csv() => false,
        _ => hint.says_json(),
    }
}

fn read_json_export(text: &str) -> AppResult<ParsedExport> {
    let items: Vec<Value> = serde_json::from_str(text)
        .map_err(|error| AppError::Export(format!("expected a JSON array of objects: {error}")))?;

    let is_takeout = items
        .iter()
        .find_map(Value::as_object)
        .is_some_and(|object| object.contains_key("titleUrl"));

    let rows = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            if !item.is_object() {
                return Err(AppError::Export(format!("row {index} is not an object")));
            }

            let row = if is_takeout {
                serde_json::from_value::<TakeoutRecord>(item)
                    .map(video_row)
                    .map(ExportRow::Video)
            } else {
                serde_json::from_value::<BrowserJsonRecord>(item)
                    .map(browser_json_row)
                    .map(ExportRow::Browser)
            };

            row.map_err(|error| AppError::Export(format!("row {index} is malformed: {error}")))
        })
        .collect::<AppResult<Vec<_>>>()?;

    let format = if is_takeout {
        ExportFormat::VideoTakeout
    } else {
        ExportFormat::BrowserJson
    };

    Ok(ParsedExport { format, rows })
}

fn read_csv_export(text: &str) -> AppResult<ParsedExport> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: csv::StringRecord = reader
        .headers()
        .map_err(|error| AppError::Export(format!("unreadable CSV header: {error}")))?
        .iter()
        .map(str::to_ascii_lowercase)
        .collect();
    if !headers.iter().any(|column| column == "url") {
        return Err(AppError::Export("CSV header has no url column".to_string()));
    }
    reader.set_headers(headers);

    let rows = reader
        .deserialize::<BrowserCsvRecord>()
        .enumerate()
        .map(|(index, record)| {
            record
                .map(browser_csv_row)
                .map(ExportRow::Browser)
                .map_err(|error| AppError::Export(format!("row {index} is malformed: {error}")))
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ParsedExport {
        format: ExportFormat::BrowserCsv,
        rows,
    })
}

fn browser_csv_row(record: BrowserCsvRecord) -> BrowserRow {
    let timestamp = match (non_empty(record.date), non_empty(record.time)) {
        (Some(date), Some(time)) => Some(RawTimestamp::DateAndTime { date, time }),
        _ => non_empty(record.last_visit_time).map(|raw| match raw.parse::<i64>() {
            Ok(epoch) => RawTimestamp::Epoch(epoch),
            Err(_) => RawTimestamp::Text(raw),
        }),
    };

    BrowserRow {
        url: non_empty(record.url),
        title: non_empty(record.title),
        timestamp,
        visit_count: record
            .visit_count
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .map(|count| count as i64),
    }
}

fn browser_json_row(record: BrowserJsonRecord) -> BrowserRow {
    let visit_time = record.visit_time.as_ref().and_then(epoch_from_value);
    let date_and_time = match (non_empty(record.date), non_empty(record.time)) {
        (Some(date), Some(time)) => Some(RawTimestamp::DateAndTime { date, time }),
        _ => None,
    };
    let last_visit = record.last_visit_time.and_then(|value| match value {
        Value::String(raw) if !raw.trim().is_empty() => Some(match raw.trim().parse::<i64>() {
            Ok(epoch) => RawTimestamp::Epoch(epoch),
            Err(_) => RawTimestamp::Text(raw.trim().to_string()),
        }),
        other => epoch_from_value(&other).map(RawTimestamp::Epoch),
    });

    BrowserRow {
        url: non_empty(record.url),
        title: non_empty(record.title),
        timestamp: visit_time
            .map(RawTimestamp::Epoch)
            .or(date_and_time)
            .or(last_visit),
        visit_count: record.visit_count.as_ref().and_then(count_from_value),
    }
}

fn video_row(record: TakeoutRecord) -> VideoRow {
    let channel = record.subtitles.into_iter().next().unwrap_or_default();

    VideoRow {
        url: non_empty(record.title_url),
        title: non_empty(record.title),
        time: non_empty(record.time),
        channel: non_empty(channel.name),
        channel_url: non_empty(channel.url),
    }
}

fn epoch_from_value(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|raw| raw.is_finite()).map(|raw| raw as i64))
}

fn count_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::String(raw) => raw.trim().parse::<f64>().ok().map(|count| count as i64),
        other => epoch_from_value(other),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{ExportFormat, ExportRow, RawTimestamp, UploadHint, read_export};
    use crate::error::AppError;

    fn hint<'a>(filename: &'a str, content_type: &'a str) -> UploadHint<'a> {
        UploadHint {
            filename: Some(filename),
            content_type: Some(content_type),
        }
    }

    #[test]
    fn chrome_csv_uses_date_and_time_columns() {
        let body = "order,id,date,time,title,url,visitCount,typedCount,transition\n\
                    1,9,10/1/2025,1:33:56,Repo,https://github.com/x,3,0,link\n";
        let parsed = read_export(hint("history.csv", "text/csv"), body.as_bytes()).expect("parse");

        assert_eq!(parsed.format, ExportFormat::BrowserCsv);
        let ExportRow::Browser(row) = &parsed.rows[0] else {
            panic!("expected a browser row");
        };
        assert_eq!(row.url.as_deref(), Some("https://github.com/x"));
        assert_eq!(row.visit_count, Some(3));
        assert_eq!(
            row.timestamp,
            Some(RawTimestamp::DateAndTime {
                date: "10/1/2025".to_string(),
                time: "1:33:56".to_string()
            })
        );
    }

    #[test]
    fn generic_csv_numeric_last_visit_is_epoch() {
        let body = "url,title,last_visit_time,visit_count\nhttps://a.com,,13350000000000000,\n";
        let parsed = read_export(UploadHint::default(), body.as_bytes()).expect("parse");

        let ExportRow::Browser(row) = &parsed.rows[0] else {
            panic!("expected a browser row");
        };
        assert_eq!(row.timestamp, Some(RawTimestamp::Epoch(13_350_000_000_000_000)));
        assert_eq!(row.title, None);
        assert_eq!(row.visit_count, None);
    }

    #[test]
    fn csv_headers_match_in_any_case() {
        let body = "URL,Title,Last_Visit_Time,VisitCount\nhttps://a.com,Home,2024-06-05T10:00:00Z,4\n";
        let parsed = read_export(hint("history.csv", "text/csv"), body.as_bytes()).expect("parse");

        let ExportRow::Browser(row) = &parsed.rows[0] else {
            panic!("expected a browser row");
        };
        assert_eq!(row.url.as_deref(), Some("https://a.com"));
        assert_eq!(row.title.as_deref(), Some("Home"));
        assert_eq!(
            row.timestamp,
            Some(RawTimestamp::Text("2024-06-05T10:00:00Z".to_string()))
        );
        assert_eq!(row.visit_count, Some(4));
    }

    #[test]
    fn json_array_is_sniffed_from_content() {
        let body = r#"[{"url":"https://a.com","visitTime":1717900000000.5,"visitCount":"2"}]"#;
        let parsed = read_export(hint("upload.bin", "application/octet-stream"), body.as_bytes())
            .expect("parse");

        assert_eq!(parsed.format, ExportFormat::BrowserJson);
        let ExportRow::Browser(row) = &parsed.rows[0] else {
            panic!("expected a browser row");
        };
        assert_eq!(row.timestamp, Some(RawTimestamp::Epoch(1_717_900_000_000)));
        assert_eq!(row.visit_count, Some(2));
    }

    #[test]
    fn takeout_is_detected_by_title_url() {
        let body = r#"[
            {"title":"Watched Rust in 100 seconds","titleUrl":"https://www.youtube.com/watch?v=1",
             "time":"2024-06-05T14:03:12.345Z",
             "subtitles":[{"name":"Fireship","url":"https://www.youtube.com/channel/abc"}]}
        ]"#;
        let parsed = read_export(hint("watch-history.json", "application/json"), body.as_bytes())
            .expect("parse");

        assert_eq!(parsed.format, ExportFormat::VideoTakeout);
        let ExportRow::Video(row) = &parsed.rows[0] else {
            panic!("expected a video row");
        };
        assert_eq!(row.channel.as_deref(), Some("Fireship"));
        assert_eq!(row.time.as_deref(), Some("2024-06-05T14:03:12.345Z"));
    }

    #[test]
    fn malformed_files_fail_the_batch() {
        let broken_json = read_export(hint("h.json", "application/json"), b"[{\"url\": ");
        assert!(matches!(broken_json, Err(AppError::Export(_))));

        let not_objects = read_export(UploadHint::default(), b"[1, 2]");
        assert!(matches!(not_objects, Err(AppError::Export(_))));

        let no_url_column = read_export(hint("h.csv", "text/csv"), b"title,date\nx,y\n");
        assert!(matches!(no_url_column, Err(AppError::Export(_))));

        let empty = read_export(UploadHint::default(), b"   ");
        assert!(matches!(empty, Err(AppError::Export(_))));
    }
}
