pub const CREATE_HISTORY_RECORDS: &str = r#"
CREATE TABLE IF NOT EXISTS history_records (
  id             INTEGER PRIMARY KEY AUTOINCREMENT,
  owner          TEXT NOT NULL,
  source         TEXT NOT NULL,
  url            TEXT NOT NULL,
  title          TEXT,
  occurred_at_ms INTEGER NOT NULL,
  occurrences    INTEGER NOT NULL DEFAULT 1,
  domain         TEXT NOT NULL,
  channel        TEXT,
  channel_url    TEXT,
  category       TEXT NOT NULL DEFAULT 'other'
);
"#;

pub const CREATE_ACTIVITY_REVIEWS: &str = r#"
CREATE TABLE IF NOT EXISTS activity_reviews (
  id          INTEGER PRIMARY KEY AUTOINCREMENT,
  owner       TEXT NOT NULL,
  period_week TEXT NOT NULL,
  source      TEXT NOT NULL,
  summary_md  TEXT NOT NULL,
  snapshot    TEXT NOT NULL,
  created_at  TEXT NOT NULL,
  UNIQUE(owner, period_week, source)
);
"#;

pub const CREATE_METRICS_CATALOG: &str = r#"
CREATE TABLE IF NOT EXISTS metrics_catalog (
  id    INTEGER PRIMARY KEY AUTOINCREMENT,
  owner TEXT NOT NULL,
  key   TEXT NOT NULL,
  label TEXT NOT NULL,
  unit  TEXT,
  UNIQUE(owner, key)
);
"#;

pub const CREATE_METRIC_VALUES: &str = r#"
CREATE TABLE IF NOT EXISTS metric_values (
  id          INTEGER PRIMARY KEY AUTOINCREMENT,
  owner       TEXT NOT NULL,
  metric_id   INTEGER NOT NULL REFERENCES metrics_catalog(id) ON DELETE CASCADE,
  period_date TEXT NOT NULL,
  value       REAL NOT NULL,
  UNIQUE(owner, metric_id, period_date)
);
"#;

pub const CREATE_WEEKLY_REPORTS: &str = r#"
CREATE TABLE IF NOT EXISTS weekly_reports (
  id          INTEGER PRIMARY KEY AUTOINCREMENT,
  owner       TEXT NOT NULL,
  period_date TEXT NOT NULL,
  report_md   TEXT NOT NULL,
  created_at  TEXT NOT NULL,
  UNIQUE(owner, period_date)
);
"#;

pub const CREATE_JOURNAL_ENTRIES: &str = r#"
CREATE TABLE IF NOT EXISTS journal_entries (
  id              INTEGER PRIMARY KEY AUTOINCREMENT,
  owner           TEXT NOT NULL,
  entry_date      TEXT NOT NULL,
  mood            INTEGER,
  mood_desc       TEXT,
  energy          INTEGER,
  accomplishments TEXT NOT NULL DEFAULT '[]',
  priority        TEXT,
  blockers        TEXT,
  gratitude       TEXT,
  notes           TEXT,
  UNIQUE(owner, entry_date)
);
"#;

pub const CREATE_JOURNAL_REFLECTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS journal_reflections (
  id            INTEGER PRIMARY KEY AUTOINCREMENT,
  owner         TEXT NOT NULL,
  entry_id      INTEGER NOT NULL REFERENCES journal_entries(id) ON DELETE CASCADE,
  reflection_md TEXT NOT NULL,
  created_at    TEXT NOT NULL,
  UNIQUE(owner, entry_id)
);
"#;

pub const CREATE_BRAINDUMPS: &str = r#"
CREATE TABLE IF NOT EXISTS braindumps (
  id         INTEGER PRIMARY KEY AUTOINCREMENT,
  owner      TEXT NOT NULL,
  title      TEXT,
  content    TEXT NOT NULL,
  created_at TEXT NOT NULL
);
"#;

pub const CREATE_BRAINDUMP_ANALYSES: &str = r#"
CREATE TABLE IF NOT EXISTS braindump_analyses (
  id           INTEGER PRIMARY KEY AUTOINCREMENT,
  owner        TEXT NOT NULL,
  braindump_id INTEGER NOT NULL REFERENCES braindumps(id) ON DELETE CASCADE,
  analysis_md  TEXT NOT NULL,
  insights     TEXT NOT NULL,
  created_at   TEXT NOT NULL,
  UNIQUE(owner, braindump_id)
);
"#;

pub const CREATE_NEWSLETTER_SOURCES: &str = r#"
CREATE TABLE IF NOT EXISTS newsletter_sources (
  id    INTEGER PRIMARY KEY AUTOINCREMENT,
  owner TEXT NOT NULL,
  title TEXT,
  url   TEXT NOT NULL,
  UNIQUE(owner, url)
);
"#;

pub const CREATE_NEWSLETTER_POSTS: &str = r#"
CREATE TABLE IF NOT EXISTS newsletter_posts (
  id           INTEGER PRIMARY KEY AUTOINCREMENT,
  owner        TEXT NOT NULL,
  source_id    INTEGER NOT NULL REFERENCES newsletter_sources(id) ON DELETE CASCADE,
  title        TEXT NOT NULL,
  link         TEXT NOT NULL,
  summary      TEXT NOT NULL DEFAULT '',
  published_at TEXT,
  UNIQUE(owner, source_id, link)
);
"#;

pub const CREATE_NEWSLETTER_DRAFTS: &str = r#"
CREATE TABLE IF NOT EXISTS newsletter_drafts (
  id              INTEGER PRIMARY KEY AUTOINCREMENT,
  owner           TEXT NOT NULL,
  period_week     TEXT NOT NULL,
  subject_options TEXT NOT NULL,
  draft_md        TEXT NOT NULL,
  created_at      TEXT NOT NULL,
  UNIQUE(owner, period_week)
);
"#;

pub const CREATE_DAILY_BRIEFS: &str = r#"
CREATE TABLE IF NOT EXISTS daily_briefs (
  id         INTEGER PRIMARY KEY AUTOINCREMENT,
  owner      TEXT NOT NULL,
  brief_date TEXT NOT NULL,
  items      TEXT NOT NULL,
  created_at TEXT NOT NULL,
  UNIQUE(owner, brief_date)
);
"#;

pub const CREATE_PROFILES: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
  owner        TEXT PRIMARY KEY,
  full_name    TEXT,
  project_type TEXT,
  interests    TEXT NOT NULL DEFAULT '[]',
  updated_at   TEXT NOT NULL
);
"#;

pub const INDEX_HISTORY_OWNER_TIME: &str = "CREATE INDEX IF NOT EXISTS idx_history_owner_time ON history_records(owner, source, occurred_at_ms);";

pub const INDEX_REVIEWS_OWNER_WEEK: &str =
    "CREATE INDEX IF NOT EXISTS idx_reviews_owner_week ON activity_reviews(owner, period_week);";

pub const INDEX_METRIC_VALUES_PERIOD: &str = "CREATE INDEX IF NOT EXISTS idx_metric_values_period ON metric_values(owner, period_date);";

pub const INDEX_POSTS_PUBLISHED: &str = "CREATE INDEX IF NOT EXISTS idx_posts_published ON newsletter_posts(owner, published_at);";

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_HISTORY_RECORDS,
        CREATE_ACTIVITY_REVIEWS,
        CREATE_METRICS_CATALOG,
        CREATE_METRIC_VALUES,
        CREATE_WEEKLY_REPORTS,
        CREATE_JOURNAL_ENTRIES,
        CREATE_JOURNAL_REFLECTIONS,
        CREATE_BRAINDUMPS,
        CREATE_BRAINDUMP_ANALYSES,
        CREATE_NEWSLETTER_SOURCES,
        CREATE_NEWSLETTER_POSTS,
        CREATE_NEWSLETTER_DRAFTS,
        CREATE_DAILY_BRIEFS,
        CREATE_PROFILES,
        INDEX_HISTORY_OWNER_TIME,
        INDEX_REVIEWS_OWNER_WEEK,
        INDEX_METRIC_VALUES_PERIOD,
        INDEX_POSTS_PUBLISHED,
    ]
}
