use crate::lexicon::Lexicon;
use crate::score_mapper::{map_score, MAX_SCORE, MIN_SCORE, NEUTRAL_SCORE};
use mentionwatch_core::{ScoringScheme, SentimentLabel, SentimentResult};
use tracing::trace;

pub const PRIORITY_NEGATIVE_CONFIDENCE: f64 = 0.9;
pub const PRIORITY_POSITIVE_CONFIDENCE: f64 = 0.8;
pub const COMPARISON_CONFIDENCE: f64 = 0.7;
pub const NEUTRAL_CONFIDENCE: f64 = 0.5;

/// Which rule produced a keyword verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    PriorityNegative,
    PriorityPositive,
    MorePositive,
    MoreNegative,
    Tie,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordVerdict {
    pub label: SentimentLabel,
    pub confidence: f64,
    /// Score from the per-rule arithmetic, before any scheme is applied.
    pub raw_score: u8,
    pub rule: Rule,
    pub positive_hits: Vec<String>,
    pub negative_hits: Vec<String>,
    pub trigger: Option<String>,
}

impl KeywordVerdict {
    pub fn positive_count(&self) -> usize {
        self.positive_hits.len()
    }

    pub fn negative_count(&self) -> usize {
        self.negative_hits.len()
    }

    pub fn reasons(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        match (&self.rule, &self.trigger) {
            (Rule::PriorityNegative, Some(term)) => {
                reasons.push(format!("Red-flag term \"{}\" present", term))
            }
            (Rule::PriorityPositive, Some(term)) => {
                reasons.push(format!("High-signal positive term \"{}\" present", term))
            }
            (Rule::Tie, _) if self.positive_hits.is_empty() => {
                reasons.push("No sentiment keywords found".to_string())
            }
            _ => {}
        }
        if !self.positive_hits.is_empty() {
            reasons.push(format!("Positive keywords: {}", self.positive_hits.join(", ")));
        }
        if !self.negative_hits.is_empty() {
            reasons.push(format!("Negative keywords: {}", self.negative_hits.join(", ")));
        }
        reasons
    }
}

fn hits(text: &str, terms: &[String]) -> Vec<String> {
    terms
        .iter()
        .filter(|term| text.contains(term.as_str()))
        .cloned()
        .collect()
}

fn saturating_score(value: i64) -> u8 {
    value.clamp(MIN_SCORE as i64, MAX_SCORE as i64) as u8
}

/// Lexicon-driven sentiment heuristic.
///
/// Matching is plain substring search over the lower-cased text, so "scam"
/// also fires inside "scammer". Each dictionary entry counts at most once.
#[derive(Debug, Clone, Default)]
pub struct KeywordSentimentScorer {
    lexicon: Lexicon,
    scheme: ScoringScheme,
}

impl KeywordSentimentScorer {
    pub fn new(lexicon: Lexicon, scheme: ScoringScheme) -> Self {
        Self { lexicon, scheme }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn scheme(&self) -> ScoringScheme {
        self.scheme
    }

    pub fn analyze(&self, text: &str) -> KeywordVerdict {
        let lowered = text.to_lowercase();
        let positive_hits = hits(&lowered, &self.lexicon.positive);
        let negative_hits = hits(&lowered, &self.lexicon.negative);
        let positive = positive_hits.len() as i64;
        let negative = negative_hits.len() as i64;

        let red_flag = self
            .lexicon
            .priority_negative
            .iter()
            .find(|term| lowered.contains(term.as_str()));
        let high_signal = self
            .lexicon
            .priority_positive
            .iter()
            .find(|term| lowered.contains(term.as_str()));

        let (label, confidence, raw_score, rule, trigger) = if let Some(term) = red_flag {
            (
                SentimentLabel::Negative,
                PRIORITY_NEGATIVE_CONFIDENCE,
                saturating_score(10 - negative * 5),
                Rule::PriorityNegative,
                Some(term.clone()),
            )
        } else if let Some(term) = high_signal {
            (
                SentimentLabel::Positive,
                PRIORITY_POSITIVE_CONFIDENCE,
                saturating_score(90 + positive * 5),
                Rule::PriorityPositive,
                Some(term.clone()),
            )
        } else if positive > negative {
            (
                SentimentLabel::Positive,
                COMPARISON_CONFIDENCE,
                saturating_score(70 + positive * 8),
                Rule::MorePositive,
                None,
            )
        } else if negative > positive {
            (
                SentimentLabel::Negative,
                COMPARISON_CONFIDENCE,
                saturating_score(30 - negative * 8),
                Rule::MoreNegative,
                None,
            )
        } else {
            (
                SentimentLabel::Neutral,
                NEUTRAL_CONFIDENCE,
                NEUTRAL_SCORE,
                Rule::Tie,
                None,
            )
        };

        trace!(
            "Keyword verdict {:?}: {} positive, {} negative, raw score {}",
            rule,
            positive,
            negative,
            raw_score
        );

        KeywordVerdict {
            label,
            confidence,
            raw_score,
            rule,
            positive_hits,
            negative_hits,
            trigger,
        }
    }

    /// Classifies `text`, producing the final score with the configured scheme.
    pub fn score(&self, text: &str) -> SentimentResult {
        let verdict = self.analyze(text);
        let score = match self.scheme {
            ScoringScheme::Heuristic => verdict.raw_score,
            ScoringScheme::Mapped => map_score(verdict.label, verdict.confidence),
        };
        SentimentResult {
            label: verdict.label,
            confidence: verdict.confidence,
            score,
            reasons: verdict.reasons(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> KeywordSentimentScorer {
        KeywordSentimentScorer::default()
    }

    #[test]
    fn test_empty_text_is_neutral() {
        let result = scorer().score("");
        assert_eq!(result.label, SentimentLabel::Neutral);
        assert_eq!(result.score, 50);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn test_red_flag_overrides_everything() {
        let result = scorer().score("this is a total scam and fraud");
        assert_eq!(result.label, SentimentLabel::Negative);
        assert_eq!(result.confidence, 0.9);
        // scam + fraud are both dictionary hits: max(1, 10 - 2*5)
        assert_eq!(result.score, 1);
    }

    #[test]
    fn test_red_flag_beats_positive_words() {
        let verdict = scorer().analyze("Great product, amazing results, but the MLM structure worries me");
        assert_eq!(verdict.rule, Rule::PriorityNegative);
        assert_eq!(verdict.label, SentimentLabel::Negative);
        assert_eq!(verdict.trigger.as_deref(), Some("mlm"));
        assert_eq!(verdict.negative_count(), 0);
        assert_eq!(verdict.raw_score, 10);
    }

    #[test]
    fn test_high_signal_positive() {
        let result = scorer().score("amazing breakthrough in this field");
        assert_eq!(result.label, SentimentLabel::Positive);
        assert_eq!(result.confidence, 0.8);
        assert_eq!(result.score, 95);
    }

    #[test]
    fn test_generic_positive_comparison() {
        let result = scorer().score("good great excellent");
        assert_eq!(result.label, SentimentLabel::Positive);
        assert_eq!(result.score, 94);
        assert_eq!(result.confidence, 0.7);
    }

    #[test]
    fn test_generic_negative_comparison() {
        let verdict = scorer().analyze("Terrible support and an awful, broken app");
        assert_eq!(verdict.rule, Rule::MoreNegative);
        assert_eq!(verdict.negative_count(), 3);
        assert_eq!(verdict.raw_score, 6);
    }

    #[test]
    fn test_scores_saturate() {
        let verdict =
            scorer().analyze("terrible awful horrible worst useless broken overpriced sketchy");
        assert_eq!(verdict.label, SentimentLabel::Negative);
        assert_eq!(verdict.raw_score, 1);

        let verdict = scorer().analyze("good great excellent amazing awesome best perfect");
        assert_eq!(verdict.raw_score, 100);
    }

    #[test]
    fn test_tie_is_neutral() {
        let result = scorer().score("good but bad");
        assert_eq!(result.label, SentimentLabel::Neutral);
        assert_eq!(result.score, 50);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn test_substring_semantics() {
        let verdict = scorer().analyze("That scammer again");
        assert_eq!(verdict.rule, Rule::PriorityNegative);
        assert_eq!(verdict.trigger.as_deref(), Some("scam"));
    }

    #[test]
    fn test_case_insensitive() {
        let verdict = scorer().analyze("GREAT and EXCELLENT");
        assert_eq!(verdict.label, SentimentLabel::Positive);
        assert_eq!(verdict.positive_count(), 2);
    }

    #[test]
    fn test_mapped_scheme_routes_through_score_mapper() {
        let mapped = KeywordSentimentScorer::new(Lexicon::default(), ScoringScheme::Mapped);
        assert_eq!(mapped.score("good great excellent").score, 97);
        assert_eq!(mapped.score("this is a scam").score, 1);
        assert_eq!(mapped.score("nothing to see").score, 50);
        assert_eq!(mapped.score("promising results").score, 98);
    }

    #[test]
    fn test_reasons_explain_verdict() {
        let result = scorer().score("this is a total scam and fraud");
        assert_eq!(result.reasons[0], "Red-flag term \"scam\" present");
        assert!(result.reasons[1].contains("scam, fraud"));

        let neutral = scorer().score("");
        assert_eq!(neutral.reasons, vec!["No sentiment keywords found".to_string()]);
    }
}
