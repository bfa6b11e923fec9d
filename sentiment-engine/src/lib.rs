//! Deterministic sentiment scoring: the keyword heuristic, the shared
//! label/confidence score mapper, and the tracked-term matcher.

pub mod keyword_matcher;
pub mod keyword_scorer;
pub mod lexicon;
pub mod score_mapper;

pub use keyword_matcher::{match_keywords, KeywordMatcher};
pub use keyword_scorer::{KeywordSentimentScorer, KeywordVerdict, Rule};
pub use lexicon::Lexicon;
pub use score_mapper::map_score;

use mentionwatch_core::AppConfig;

/// Builds the keyword scorer described by the `[classifier]` and `[lexicon]` sections.
pub fn scorer_from_config(config: &AppConfig) -> KeywordSentimentScorer {
    KeywordSentimentScorer::new(
        Lexicon::from_config(&config.lexicon),
        config.classifier.scoring,
    )
}
