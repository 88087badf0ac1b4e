use super::Database;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsletterSource {
    pub id: i64,
    pub title: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsletterPost {
    pub source_id: i64,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewsletterDraft {
    pub period_week: NaiveDate,
    pub subject_options: Vec<String>,
    pub draft_md: String,
    pub created_at: DateTime<Utc>,
}

impl Database {
    pub fn upsert_newsletter_source(&self, owner: &str, title: Option<&str>, url: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO newsletter_sources (owner, title, url) VALUES (?1, ?2, ?3)
                 ON CONFLICT(owner, url) DO UPDATE SET title=COALESCE(excluded.title, newsletter_sources.title)",
                params![owner, title, url],
            )
            .context("Failed to upsert newsletter source")?;

        Ok(())
    }

    pub fn remove_newsletter_sources(&self, owner: &str, ids: &[i64]) -> Result<usize> {
        ids.iter().try_fold(0usize, |removed, id| {
            self.conn
                .execute(
                    "DELETE FROM newsletter_sources WHERE owner = ?1 AND id = ?2",
                    params![owner, id],
                )
                .map(|count| removed + count)
                .context("Failed to remove newsletter source")
        })
    }

    pub fn newsletter_sources(&self, owner: &str) -> Result<Vec<NewsletterSource>> {
        let mut statement = self.conn.prepare(
            "SELECT id, title, url FROM newsletter_sources WHERE owner = ?1 ORDER BY id ASC",
        )?;

        let rows = statement
            .query_map(params![owner], |row| {
                Ok(NewsletterSource {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    url: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query newsletter sources")?;

        Ok(rows)
    }

    pub fn upsert_newsletter_posts(&mut self, owner: &str, posts: &[NewsletterPost]) -> Result<usize> {
        let transaction = self
            .conn
            .transaction()
            .context("Failed to start transaction")?;

        {
            let mut statement = transaction.prepare(
                "INSERT INTO newsletter_posts (owner, source_id, title, link, summary, published_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(owner, source_id, link)
                 DO UPDATE SET title=excluded.title, summary=excluded.summary, published_at=excluded.published_at",
            )?;

            posts.iter().try_for_each(|post| {
                statement
                    .execute(params![
                        owner,
                        post.source_id,
                        &post.title,
                        &post.link,
                        &post.summary,
                        post.published_at,
                    ])
                    .context("Failed to upsert newsletter post")
                    .map(|_| ())
            })?;
        }

        transaction
            .commit()
            .context("Failed to commit newsletter posts")?;

        Ok(posts.len())
    }

    /// Posts published at or after `since`, newest first. Undated posts are excluded.
    pub fn newsletter_posts_since(&self, owner: &str, since: DateTime<Utc>) -> Result<Vec<NewsletterPost>> {
        let mut statement = self.conn.prepare(
            "SELECT source_id, title, link, summary, published_at FROM newsletter_posts
             WHERE owner = ?1 AND published_at IS NOT NULL AND published_at >= ?2
             ORDER BY published_at DESC",
        )?;

        let rows = statement
            .query_map(params![owner, since], |row| {
                Ok(NewsletterPost {
                    source_id: row.get(0)?,
                    title: row.get(1)?,
                    link: row.get(2)?,
                    summary: row.get(3)?,
                    published_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query newsletter posts")?;

        Ok(rows)
    }

    pub fn recent_newsletter_drafts(&self, owner: &str, limit: usize) -> Result<Vec<String>> {
        let mut statement = self.conn.prepare(
            "SELECT draft_md FROM newsletter_drafts WHERE owner = ?1
             ORDER BY created_at DESC LIMIT ?2",
        )?;

        let rows = statement
            .query_map(params![owner, limit as i64], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()
            .context("Failed to query newsletter drafts")?;

        Ok(rows)
    }

    pub fn upsert_newsletter_draft(
        &self,
        owner: &str,
        period_week: NaiveDate,
        subject_options: &[String],
        draft_md: &str,
    ) -> Result<()> {
        let subjects =
            serde_json::to_string(subject_options).context("Failed to serialize subject options")?;

        self.conn
            .execute(
                "INSERT INTO newsletter_drafts (owner, period_week, subject_options, draft_md, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(owner, period_week)
                 DO UPDATE SET subject_options=excluded.subject_options, draft_md=excluded.draft_md, created_at=excluded.created_at",
                params![owner, period_week, subjects, draft_md, Utc::now()],
            )
            .context("Failed to upsert newsletter draft")?;

        Ok(())
    }

    pub fn newsletter_draft(&self, owner: &str, period_week: NaiveDate) -> Result<Option<NewsletterDraft>> {
        self.conn
            .query_row(
                "SELECT period_week, subject_options, draft_md, created_at FROM newsletter_drafts
                 WHERE owner = ?1 AND period_week = ?2",
                params![owner, period_week],
                |row| {
                    let subjects: String = row.get(1)?;
                    Ok(NewsletterDraft {
                        period_week: row.get(0)?,
                        subject_options: serde_json::from_str(&subjects).unwrap_or_default(),
                        draft_md: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()
            .context("Failed to query newsletter draft")
    }

    pub fn upsert_daily_brief(&self, owner: &str, brief_date: NaiveDate, items: &Value) -> Result<()> {
        let items = serde_json::to_string(items).context("Failed to serialize brief items")?;

        self.conn
            .execute(
                "INSERT INTO daily_briefs (owner, brief_date, items, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(owner, brief_date)
                 DO UPDATE SET items=excluded.items, created_at=excluded.created_at",
                params![owner, brief_date, items, Utc::now()],
            )
            .context("Failed to upsert daily brief")?;

        Ok(())
    }

    pub fn daily_brief(&self, owner: &str, brief_date: NaiveDate) -> Result<Option<Value>> {
        self.conn
            .query_row(
                "SELECT items FROM daily_briefs WHERE owner = ?1 AND brief_date = ?2",
                params![owner, brief_date],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .context("Failed to query daily brief")?
            .map(|items| serde_json::from_str(&items).context("Stored brief items are not JSON"))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::NewsletterPost;
    use crate::db::test_support::temp_database;
    use chrono::{Duration, Utc};

    #[test]
    fn sources_are_unique_per_url_and_removable() {
        let (_dir, database) = temp_database();
        database
            .upsert_newsletter_source("U", Some("Blog"), "https://a.example/feed")
            .expect("add");
        database
            .upsert_newsletter_source("U", None, "https://a.example/feed")
            .expect("re-add");
        database
            .upsert_newsletter_source("U", None, "https://b.example/feed")
            .expect("add second");

        let sources = database.newsletter_sources("U").expect("list");
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].title.as_deref(), Some("Blog"));

        let removed = database
            .remove_newsletter_sources("U", &[sources[1].id])
            .expect("remove");
        assert_eq!(removed, 1);
        assert_eq!(database.newsletter_sources("U").expect("list").len(), 1);
    }

    #[test]
    fn posts_upsert_by_link_and_filter_by_date() {
        let (_dir, mut database) = temp_database();
        database
            .upsert_newsletter_source("U", None, "https://a.example/feed")
            .expect("add");
        let source_id = database.newsletter_sources("U").expect("list")[0].id;

        let now = Utc::now();
        let post = |link: &str, age_days: i64| NewsletterPost {
            source_id,
            title: format!("post {link}"),
            link: link.to_string(),
            summary: String::new(),
            published_at: Some(now - Duration::days(age_days)),
        };

        database
            .upsert_newsletter_posts("U", &[post("/a", 1), post("/b", 30), post("/a", 2)])
            .expect("upsert");

        let recent = database
            .newsletter_posts_since("U", now - Duration::days(21))
            .expect("recent");
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].link, "/a");
    }

    #[test]
    fn draft_upsert_replaces_subjects() {
        let (_dir, database) = temp_database();
        let period = chrono::NaiveDate::from_ymd_opt(2024, 6, 9).expect("date");

        database
            .upsert_newsletter_draft("U", period, &["one".to_string()], "body one")
            .expect("first");
        database
            .upsert_newsletter_draft("U", period, &["two".to_string()], "body two")
            .expect("second");

        let draft = database
            .newsletter_draft("U", period)
            .expect("query")
            .expect("draft");
        assert_eq!(draft.subject_options, vec!["two"]);
        assert_eq!(database.recent_newsletter_drafts("U", 2).expect("recent"), vec!["body two"]);
    }
}
