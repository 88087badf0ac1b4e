use crate::config::Config;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use reqwest::header::USER_AGENT;
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Fetching never fails outward: an unreachable or unparsable feed has no items.
#[async_trait]
pub trait FeedBackend: Send + Sync {
    async fn fetch(&self, url: &str) -> Vec<FeedItem>;
}

pub struct HttpFeedBackend {
    http: Client,
    user_agent: String,
}

impl HttpFeedBackend {
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create feed HTTP client")?;

        Ok(Self {
            http,
            user_agent: config.feed_user_agent.clone(),
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .context("Feed request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("Feed responded with {status}");
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read feed body")?;

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl FeedBackend for HttpFeedBackend {
    async fn fetch(&self, url: &str) -> Vec<FeedItem> {
        let items = match self.download(url).await {
            Ok(body) => parse_feed(&body),
            Err(error) => Err(error),
        };

        items.unwrap_or_else(|error| {
            warn!(url, error = %error, "feed fetch failed");
            Vec::new()
        })
    }
}

/// RSS or Atom body to items.
pub fn parse_feed(body: &[u8]) -> Result<Vec<FeedItem>> {
    let feed = feed_rs::parser::parse(body).context("Failed to parse feed")?;

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry
                .links
                .first()
                .map(|link| link.href.clone())
                .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()));
            let summary = entry
                .summary
                .map(|text| text.content)
                .or_else(|| entry.content.and_then(|content| content.body))
                .unwrap_or_default();

            FeedItem {
                title: entry.title.map(|text| text.content),
                link,
                summary,
                published_at: entry.published.or(entry.updated),
            }
        })
        .collect::<Vec<_>>();

    Ok(items)
}
