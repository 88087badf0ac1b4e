use crate::config::Config;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

pub const MAX_RESULTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default, alias = "content")]
    pub snippet: String,
    #[serde(default)]
    pub published_date: Option<String>,
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str, recency_days: u32) -> Result<Vec<SearchResult>>;
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

pub struct TavilySearch {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl TavilySearch {
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.ai_timeout_seconds.max(5)))
            .build()
            .context("Failed to create search HTTP client")?;

        Ok(Self {
            http,
            base_url: config.search_api_base_url.trim_end_matches('/').to_string(),
            api_key: config.resolve_search_api_key(),
        })
    }
}

#[async_trait]
impl SearchBackend for TavilySearch {
    async fn search(&self, query: &str, recency_days: u32) -> Result<Vec<SearchResult>> {
        let api_key = self
            .api_key
            .as_deref()
            .context("Search API key is missing")?;

        let response = self
            .http
            .post(format!("{}/search", self.base_url))
            .bearer_auth(api_key)
            .json(&json!({
                "query": query,
                "topic": "general",
                "time_range": time_range(recency_days),
                "max_results": MAX_RESULTS,
            }))
            .send()
            .await
            .context("Search API request failed")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read search response body")?;

        if !status.is_success() {
            bail!("Search API error {}: {}", status, body);
        }

        let parsed: TavilyResponse = serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse search response: {body}"))?;

        Ok(parsed.results)
    }
}

fn time_range(recency_days: u32) -> &'static str {
    match recency_days {
        0..=1 => "day",
        2..=7 => "week",
        8..=31 => "month",
        _ => "year",
    }
}
