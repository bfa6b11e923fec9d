use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use mentionwatch_core::{MentionKind, SentimentLabel};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mentionwatch")]
#[command(author, version, about = "Track brand mentions on Reddit and score their sentiment", long_about = None)]
pub struct Cli {
    /// TOML config file. Built-in defaults are used when omitted.
    #[arg(short, long, global = true, env = "MENTIONWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a single fetch-classify-store cycle
    Poll,

    /// Poll on the configured interval until interrupted
    Run {
        /// Override `service.poll_interval_minutes`
        #[arg(short, long)]
        interval_minutes: Option<u64>,
    },

    /// Classify a piece of text with the configured classifier
    Classify {
        text: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored mentions, newest first
    List {
        #[command(flatten)]
        filter: FilterArgs,

        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,

        /// Print mentions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Override (or clear) the sentiment of a stored mention
    Tag {
        id: String,

        #[arg(short, long, required_unless_present = "clear")]
        label: Option<SentimentLabel>,

        /// Defaults to the anchor score for the label (10, 50 or 90)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
        score: Option<u8>,

        #[arg(long, default_value = "cli")]
        by: String,

        /// Remove the manual tag instead
        #[arg(long, conflicts_with_all = ["label", "score"])]
        clear: bool,
    },

    /// Set triage flags on a stored mention
    Flag {
        id: String,

        #[arg(long)]
        ignored: Option<bool>,

        #[arg(long)]
        urgent: Option<bool>,
    },

    /// Sentiment totals for stored mentions
    Stats {
        #[command(flatten)]
        filter: FilterArgs,

        /// Also print the per-day series
        #[arg(long)]
        daily: bool,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    #[arg(long)]
    pub label: Option<SentimentLabel>,

    #[arg(long)]
    pub subreddit: Option<String>,

    #[arg(long)]
    pub kind: Option<MentionKind>,

    #[arg(long)]
    pub urgent: bool,

    #[arg(long)]
    pub include_ignored: bool,

    /// First day to include (YYYY-MM-DD, UTC)
    #[arg(long)]
    pub since: Option<NaiveDate>,

    /// First day to exclude (YYYY-MM-DD, UTC)
    #[arg(long)]
    pub until: Option<NaiveDate>,

    /// Case-insensitive text search over title and body
    #[arg(long)]
    pub search: Option<String>,
}
