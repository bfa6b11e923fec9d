use database::{Database, MentionStore};
use llm_interface::{BatchClassifier, BatchConfig, ConfiguredClassifier, SentimentClassifier};
use mentionwatch_core::{
    AppConfig, CoreError, ErrorReporter, Mention, MentionKind, RawMention, SentimentLabel,
};
use reddit_client::{MentionSource, RedditSearchClient};
use sentiment_engine::KeywordMatcher;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// What one fetch-classify-store pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub fetched: usize,
    pub skipped_existing: usize,
    pub classified: usize,
    /// Classifications that failed and were stored with the neutral fallback.
    pub fallbacks: usize,
    pub stored: usize,
    pub urgent: usize,
    /// Search kinds whose fetch failed this cycle.
    pub failed_fetches: Vec<MentionKind>,
}

/// Negative mentions at or below the threshold need attention.
pub fn is_urgent(mention: &Mention, threshold: u8) -> bool {
    mention.effective_label() == SentimentLabel::Negative && mention.effective_score() <= threshold
}

pub struct Pipeline<S, C, D> {
    source: S,
    classifier: BatchClassifier<C>,
    store: D,
    matcher: KeywordMatcher,
    query: String,
    kinds: Vec<MentionKind>,
    urgent_threshold: u8,
    reporter: ErrorReporter,
}

/// The production wiring: Reddit search, the configured classifier and store.
pub type RedditPipeline = Pipeline<RedditSearchClient, ConfiguredClassifier, Database>;

impl RedditPipeline {
    pub async fn from_config(config: &AppConfig) -> Result<Self, CoreError> {
        let source = RedditSearchClient::new(&config.reddit)?;
        let classifier = BatchClassifier::new(
            ConfiguredClassifier::from_config(config)?,
            BatchConfig::from_config(&config.classifier),
        );
        let store = Database::open(&config.storage).await?;
        Ok(Pipeline::new(source, classifier, store, config))
    }
}

impl<S, C, D> Pipeline<S, C, D>
where
    S: MentionSource,
    C: SentimentClassifier,
    D: MentionStore,
{
    pub fn new(source: S, classifier: BatchClassifier<C>, store: D, config: &AppConfig) -> Self {
        let mut kinds = vec![MentionKind::Post];
        if config.reddit.search_comments {
            kinds.push(MentionKind::Comment);
        }

        Self {
            source,
            classifier,
            store,
            matcher: KeywordMatcher::new(&config.tracking.terms),
            query: config.tracking.search_query(),
            kinds,
            urgent_threshold: config.tracking.urgent_threshold,
            reporter: ErrorReporter::new(),
        }
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    async fn fetch_new(&self, report: &mut CycleReport) -> Result<Vec<RawMention>, CoreError> {
        let mut seen = HashSet::new();
        let mut fresh = Vec::new();

        for &kind in &self.kinds {
            let fetched = match self.source.fetch(&self.query, kind).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    warn!("Fetching {} mentions failed, continuing", kind);
                    self.reporter.report_error(&e);
                    report.failed_fetches.push(kind);
                    continue;
                }
            };
            report.fetched += fetched.len();

            for raw in fetched {
                if !seen.insert(raw.id.clone()) {
                    continue;
                }
                if self.store.contains(&raw.id).await? {
                    report.skipped_existing += 1;
                    continue;
                }
                fresh.push(raw);
            }
        }
        Ok(fresh)
    }

    /// Fetches, drops ids already stored, classifies the rest and persists them.
    /// A failed fetch for one kind is recorded in the report and does not stop
    /// the other kinds. Store failures abort the cycle.
    pub async fn run_cycle(&self) -> Result<CycleReport, CoreError> {
        let mut report = CycleReport::default();
        info!("Starting mention cycle for {}", self.query);

        let fresh = self.fetch_new(&mut report).await?;
        if fresh.is_empty() {
            info!(
                "No new mentions ({} fetched, {} already stored)",
                report.fetched, report.skipped_existing
            );
            return Ok(report);
        }

        let texts: Vec<String> = fresh.iter().map(RawMention::text).collect();
        let outcome = self.classifier.classify_all(&texts).await;
        report.classified = outcome.results.len();
        report.fallbacks = outcome.failed_count();

        let mentions: Vec<Mention> = fresh
            .into_iter()
            .zip(texts.iter())
            .zip(outcome.results)
            .map(|((raw, text), result)| {
                let keywords = self.matcher.find_matches(text);
                let mut mention = Mention::from_raw(raw, result, keywords);
                mention.urgent = is_urgent(&mention, self.urgent_threshold);
                mention
            })
            .collect();
        report.urgent = mentions.iter().filter(|m| m.urgent).count();
        for mention in mentions.iter().filter(|m| m.urgent) {
            debug!("Flagged {} as urgent (score {})", mention.id, mention.score);
        }

        report.stored = self.store.upsert_mentions(&mentions).await?;
        info!(
            "Cycle complete: {} fetched, {} new, {} stored, {} urgent, {} fallbacks",
            report.fetched,
            report.classified,
            report.stored,
            report.urgent,
            report.fallbacks
        );
        Ok(report)
    }
}
