mod ai;
mod analyzer;
mod api;
mod braindump;
mod brief;
mod cli;
mod collector;
mod config;
mod context;
mod db;
mod error;
mod fetch;
mod journal;
mod metrics;
mod newsletter;
mod profile;

use crate::analyzer::categorizer::CategoryRules;
use crate::analyzer::period::resolve_period;
use crate::cli::{AiCommands, Cli, Commands, ConfigCommands};
use crate::collector::export::UploadHint;
use crate::collector::IngestRequest;
use crate::config::Config;
use crate::context::AppContext;
use crate::db::{Database, HistorySource, ReviewSource};
use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Parser;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => handle_serve().await,
        Commands::Config { command } => handle_config_command(command),
        Commands::Doctor => handle_doctor(),
        Commands::Ingest {
            source,
            file,
            owner,
        } => handle_ingest(&source, &file, &owner),
        Commands::Review {
            source,
            week,
            owner,
        } => handle_review(&source, week.as_deref(), &owner).await,
        Commands::Ai { command } => handle_ai_command(command).await,
    }
}

async fn handle_serve() -> Result<()> {
    let config = Config::load_or_default()?;
    config.ensure_bootstrap_files()?;
    let _ = Database::open(&config.db_path)?;
    let _ = load_category_rules(&config)?;

    let context = Arc::new(AppContext::from_config(config)?);
    info!("MyMap service started");

    tokio::select! {
        api_result = api::run_server(context) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load_or_default()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            let masked = if key.contains("api_key") {
                "***hidden***".to_string()
            } else {
                value
            };
            println!("Config saved: {key} = {masked}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = Config::load_or_default()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing");
    }

    let config = Config::load_or_default()?;

    match Database::open(&config.db_path) {
        Ok(_) => println!("[OK] SQLite reachable: {}", config.db_path.display()),
        Err(error) => {
            println!("[WARN] SQLite check failed: {error:#}");
            issues.push("db unreachable");
        }
    }

    match load_category_rules(&config) {
        Ok(rules) => println!(
            "[OK] category rules valid ({} domain overrides)",
            rules.domains.len()
        ),
        Err(error) => {
            println!("[WARN] category rules invalid: {error:#}");
            issues.push("category rules invalid");
        }
    }

    if config.resolve_ai_api_key().is_some() {
        println!(
            "[OK] AI API key is configured (models: {} -> {})",
            config.ai_primary_model, config.ai_fallback_model
        );
    } else {
        println!("[WARN] AI API key is missing; reviews and analyses will fail");
        issues.push("ai api key missing");
    }

    if config.resolve_search_api_key().is_some() {
        println!("[OK] search API key is configured");
    } else {
        println!("[WARN] search API key is missing; daily briefs will be empty");
        issues.push("search api key missing");
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

fn handle_ingest(source: &str, file: &Path, owner: &str) -> Result<()> {
    let source = match ReviewSource::parse(source) {
        Some(ReviewSource::Browser) => HistorySource::Browser,
        Some(ReviewSource::Video) => HistorySource::Video,
        _ => bail!("Unknown history source: {source}. Use browser or video"),
    };

    let config = Config::load_or_default()?;
    let rules = load_category_rules(&config)?;
    let body =
        fs::read(file).with_context(|| format!("Failed to read export: {}", file.display()))?;
    let filename = file.file_name().and_then(|name| name.to_str());

    let mut database = Database::open(&config.db_path)?;
    let summary = collector::ingest_export(
        &mut database,
        &rules,
        config.retention_days,
        IngestRequest {
            owner,
            source,
            hint: UploadHint {
                filename,
                content_type: None,
            },
            body: &body,
        },
        Utc::now(),
    )?;

    println!("Ingested {} history: {}", source, file.display());
    println!("- total rows: {}", summary.total);
    println!("- inserted: {}", summary.inserted);
    println!("- duplicates: {}", summary.duplicates);
    println!(
        "- expired (before {}): {}",
        summary.cutoff.format("%Y-%m-%d"),
        summary.expired
    );
    println!("- rejected: {}", summary.rejected);

    Ok(())
}

async fn handle_review(source: &str, week: Option<&str>, owner: &str) -> Result<()> {
    let source = ReviewSource::parse(source)
        .with_context(|| format!("Unknown review source: {source}. Use browser, video or combined"))?;
    let period = resolve_period("week", week)?;

    let config = Config::load_or_default()?;
    let context = AppContext::from_config(config)?;
    let outcome = analyzer::review_week(&context, owner, source, period).await?;

    println!("{}", outcome.review.summary_md);
    if outcome.used_fallback {
        println!();
        println!("(generated by fallback model {})", context.config.ai_fallback_model);
    }

    Ok(())
}

async fn handle_ai_command(command: AiCommands) -> Result<()> {
    match command {
        AiCommands::Test {
            key,
            base_url,
            model,
        } => {
            let mut config = Config::load_or_default()?;

            if let Some(value) = key {
                config.ai_api_key = Some(value);
            }
            if let Some(value) = base_url {
                config.ai_api_base_url = value;
            }
            if let Some(value) = model {
                config.ai_primary_model = value;
            }

            let response = ai::test_connection(&config).await?;
            println!("AI API connection successful");
            println!("{response}");

            Ok(())
        }
    }
}

fn load_category_rules(config: &Config) -> Result<CategoryRules> {
    CategoryRules::load_or_default(&config.categories_path).with_context(|| {
        format!(
            "Failed to load category rules: {}",
            config.categories_path.display()
        )
    })
}
