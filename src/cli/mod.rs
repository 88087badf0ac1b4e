use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "MyMap",
    about = "Weekly activity reviews, metrics and notes from your own history exports"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP API until interrupted.
    Serve,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Doctor,
    /// Import a browser or video history export file.
    Ingest {
        /// browser or video
        source: String,
        file: PathBuf,
        #[arg(long)]
        owner: String,
    },
    /// Generate and store a weekly review.
    Review {
        /// browser, video or combined
        source: String,
        /// Any date inside the week (YYYY-MM-DD); defaults to this week.
        #[arg(long)]
        week: Option<String>,
        #[arg(long)]
        owner: String,
    },
    Ai {
        #[command(subcommand)]
        command: AiCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}

#[derive(Debug, Subcommand)]
pub enum AiCommands {
    Test {
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn review_week_is_optional() {
        let cli = Cli::try_parse_from(["MyMap", "review", "browser", "--owner", "u1"])
            .expect("parse");

        match cli.command {
            Commands::Review {
                source,
                week,
                owner,
            } => {
                assert_eq!(source, "browser");
                assert_eq!(week, None);
                assert_eq!(owner, "u1");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn ingest_requires_an_owner() {
        assert!(Cli::try_parse_from(["MyMap", "ingest", "browser", "history.csv"]).is_err());
    }
}
