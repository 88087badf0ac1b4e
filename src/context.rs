use crate::ai::Summarizer;
use crate::analyzer::categorizer::CategoryRules;
use crate::config::Config;
use crate::db::Database;
use crate::error::AppResult;
use crate::fetch::{FeedBackend, HttpFeedBackend, SearchBackend, TavilySearch};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Everything a request needs. Shared read-only across handlers; the database
/// is opened per phase rather than held here.
pub struct AppContext {
    pub config: Config,
    pub summarizer: Summarizer,
    pub search: Arc<dyn SearchBackend>,
    pub feeds: Arc<dyn FeedBackend>,
}

impl AppContext {
    pub fn from_config(config: Config) -> Result<Self> {
        let summarizer = Summarizer::from_config(&config)?;
        let search: Arc<dyn SearchBackend> = Arc::new(TavilySearch::from_config(&config)?);
        let feeds: Arc<dyn FeedBackend> = Arc::new(HttpFeedBackend::from_config(&config)?);

        Ok(Self {
            config,
            summarizer,
            search,
            feeds,
        })
    }

    pub fn open_database(&self) -> AppResult<Database> {
        Ok(Database::open(&self.config.db_path)?)
    }

    pub fn category_rules(&self) -> AppResult<CategoryRules> {
        let rules = CategoryRules::load_or_default(&self.config.categories_path).with_context(|| {
            format!(
                "Failed to load category rules: {}",
                self.config.categories_path.display()
            )
        })?;

        Ok(rules)
    }
}
