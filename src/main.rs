mod cli;

use anyhow::{bail, Context, Result};
use background_service::{MonitorService, RedditPipeline};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::Parser;
use cli::{Cli, Commands, FilterArgs};
use database::{Database, MentionFilter, MentionStore};
use llm_interface::{ConfiguredClassifier, SentimentClassifier};
use mentionwatch_core::{AppConfig, ManualTag, Mention};
use sentiment_engine::{map_score, KeywordMatcher};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "mentionwatch=info,background_service=info,reddit_client=info,\
llm_interface=info,database=info,sentiment_engine=warn,mentionwatch_core=info";

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn to_filter(args: FilterArgs, limit: Option<usize>) -> MentionFilter {
    MentionFilter {
        label: args.label,
        subreddit: args.subreddit,
        kind: args.kind,
        urgent_only: args.urgent,
        include_ignored: args.include_ignored,
        since: args.since.map(start_of_day),
        until: args.until.map(start_of_day),
        search: args.search,
        limit,
    }
}

fn snippet(mention: &Mention) -> String {
    let text = mention.text().replace('\n', " ");
    let trimmed = text.trim();
    if trimmed.chars().count() > 80 {
        format!("{}...", trimmed.chars().take(77).collect::<String>())
    } else {
        trimmed.to_string()
    }
}

fn print_mention(mention: &Mention) {
    let mut markers = String::new();
    if mention.manual.is_some() {
        markers.push('*');
    }
    if mention.urgent {
        markers.push('!');
    }
    if mention.ignored {
        markers.push('~');
    }
    println!(
        "{:<12} {} {:>8} {:>3}{:<3} r/{:<20} {}",
        mention.id,
        mention.created_utc.format("%Y-%m-%d %H:%M"),
        mention.effective_label(),
        mention.effective_score(),
        markers,
        mention.subreddit,
        snippet(mention)
    );
}

async fn poll(config: &AppConfig) -> Result<()> {
    let pipeline = RedditPipeline::from_config(config).await?;
    let report = pipeline.run_cycle().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run(config: &AppConfig, interval_minutes: Option<u64>) -> Result<()> {
    let pipeline = RedditPipeline::from_config(config).await?;
    let minutes = interval_minutes.unwrap_or(config.service.poll_interval_minutes);
    let mut service = MonitorService::from_minutes(pipeline, minutes);

    service.start()?;
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("Shutdown requested");
    service.stop().await?;
    Ok(())
}

async fn classify(config: &AppConfig, text: &str, json: bool) -> Result<()> {
    let classifier = ConfiguredClassifier::from_config(config)?;
    let result = classifier.classify(text).await?;
    let keywords = KeywordMatcher::new(&config.tracking.terms).find_matches(text);

    if json {
        let output = serde_json::json!({
            "classifier": classifier.describe(),
            "result": result,
            "keywordsMatched": keywords,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!(
            "{} (confidence {:.2}, score {}) via {}",
            result.label,
            result.confidence,
            result.score,
            classifier.describe()
        );
        for reason in &result.reasons {
            println!("  - {}", reason);
        }
        if !keywords.is_empty() {
            println!("keywords: {}", keywords.join(", "));
        }
    }
    Ok(())
}

async fn list(config: &AppConfig, filter: MentionFilter, json: bool) -> Result<()> {
    let store = Database::open(&config.storage).await?;
    let mentions = store.list_mentions(&filter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&mentions)?);
    } else if mentions.is_empty() {
        println!("No mentions match");
    } else {
        for mention in &mentions {
            print_mention(mention);
        }
    }
    Ok(())
}

async fn stats(config: &AppConfig, filter: MentionFilter, daily: bool, json: bool) -> Result<()> {
    let store = Database::open(&config.storage).await?;
    let summary = store.summary(&filter).await?;
    let series = if daily {
        store.daily_series(&filter).await?
    } else {
        Vec::new()
    };

    if json {
        let output = serde_json::json!({ "summary": summary, "daily": series });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "total {}  positive {}  neutral {}  negative {}  average score {:.1}",
        summary.total, summary.positive, summary.neutral, summary.negative, summary.average_score
    );
    for day in &series {
        println!(
            "{}  {:>4} mentions  +{} ={} -{}  avg {:.1}",
            day.date, day.count, day.positive, day.neutral, day.negative, day.average_score
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Poll => poll(&config).await,
        Commands::Run { interval_minutes } => run(&config, interval_minutes).await,
        Commands::Classify { text, json } => classify(&config, &text, json).await,
        Commands::List {
            filter,
            limit,
            json,
        } => list(&config, to_filter(filter, Some(limit)), json).await,
        Commands::Tag {
            id,
            label,
            score,
            by,
            clear,
        } => {
            let store = Database::open(&config.storage).await?;
            let mention = if clear {
                store.clear_manual_tag(&id).await?
            } else {
                let Some(label) = label else {
                    bail!("--label is required unless --clear is given");
                };
                let tag = ManualTag {
                    label,
                    score: score.unwrap_or_else(|| map_score(label, 0.0)),
                    tagged_by: by,
                    tagged_at: Utc::now(),
                };
                store.apply_manual_tag(&id, tag).await?
            };
            print_mention(&mention);
            Ok(())
        }
        Commands::Flag {
            id,
            ignored,
            urgent,
        } => {
            if ignored.is_none() && urgent.is_none() {
                bail!("nothing to change: pass --ignored and/or --urgent");
            }
            let store = Database::open(&config.storage).await?;
            let mention = store.set_flags(&id, ignored, urgent).await?;
            print_mention(&mention);
            Ok(())
        }
        Commands::Stats {
            filter,
            daily,
            json,
        } => stats(&config, to_filter(filter, None), daily, json).await,
    }
}
