use crate::providers::{ClaudeProvider, LlmProvider, OpenAiProvider};
use mentionwatch_core::{
    AppConfig, ClassificationError, ClassifierKind, ConfigError, CoreError, SentimentLabel,
    SentimentResult,
};
use sentiment_engine::{map_score, scorer_from_config, KeywordSentimentScorer};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Anything that can turn a piece of text into a sentiment result.
pub trait SentimentClassifier {
    async fn classify(&self, text: &str) -> Result<SentimentResult, CoreError>;
}

impl SentimentClassifier for KeywordSentimentScorer {
    async fn classify(&self, text: &str) -> Result<SentimentResult, CoreError> {
        Ok(self.score(text))
    }
}

/// Sends text to a language model and validates the structured reply.
/// The score is always derived from the returned label and confidence.
pub struct LlmSentimentClassifier<P> {
    provider: P,
    brand_terms: Vec<String>,
}

impl<P: LlmProvider> LlmSentimentClassifier<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            brand_terms: Vec::new(),
        }
    }

    pub fn with_brand_terms(mut self, terms: &[String]) -> Self {
        self.brand_terms = terms.to_vec();
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn build_prompt(&self, text: &str) -> String {
        let brand = if self.brand_terms.is_empty() {
            "the brand mentioned in the text".to_string()
        } else {
            self.brand_terms.join(" / ")
        };
        format!(
            "Classify the sentiment of the following Reddit text toward {brand}.\n\
             Respond with JSON only, in exactly this shape:\n\
             {{\"label\": \"negative\" | \"neutral\" | \"positive\", \
             \"confidence\": <number between 0 and 1>, \
             \"reasons\": [<short strings explaining the label>]}}\n\n\
             Text:\n\"\"\"\n{text}\n\"\"\""
        )
    }
}

impl<P: LlmProvider> SentimentClassifier for LlmSentimentClassifier<P> {
    async fn classify(&self, text: &str) -> Result<SentimentResult, CoreError> {
        if text.trim().is_empty() {
            return Err(CoreError::InvalidInput {
                message: "cannot classify empty text".to_string(),
            });
        }

        let reply = self.provider.complete(&self.build_prompt(text)).await?;
        let result = parse_classification(&reply)?;
        debug!(
            "{} classified text as {} ({:.2}) -> {}",
            self.provider.name(),
            result.label,
            result.confidence,
            result.score
        );
        Ok(result)
    }
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

fn required<'a>(object: &'a Map<String, Value>, field: &str) -> Result<&'a Value, ClassificationError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(ClassificationError::MissingField {
            field: field.to_string(),
        }),
        Some(value) => Ok(value),
    }
}

fn wrong_type(field: &str, expected: &str) -> ClassificationError {
    ClassificationError::WrongType {
        field: field.to_string(),
        expected: expected.to_string(),
    }
}

/// Validates a model reply against `{label, confidence, reasons}`.
///
/// A reply wrapped in a markdown code fence is accepted. Anything else that
/// deviates from the schema is rejected rather than guessed at.
pub fn parse_classification(reply: &str) -> Result<SentimentResult, ClassificationError> {
    let payload: Value = serde_json::from_str(strip_code_fence(reply)).map_err(|e| {
        ClassificationError::MalformedPayload {
            details: e.to_string(),
        }
    })?;
    let object = payload
        .as_object()
        .ok_or_else(|| wrong_type("$", "object"))?;

    let label_text = required(object, "label")?
        .as_str()
        .ok_or_else(|| wrong_type("label", "string"))?;
    let label: SentimentLabel =
        label_text
            .parse()
            .map_err(|label| ClassificationError::UnknownLabel { label })?;

    let confidence = required(object, "confidence")?
        .as_f64()
        .ok_or_else(|| wrong_type("confidence", "number"))?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(ClassificationError::ConfidenceOutOfRange { value: confidence });
    }

    let reasons = required(object, "reasons")?
        .as_array()
        .ok_or_else(|| wrong_type("reasons", "array of strings"))?
        .iter()
        .map(|reason| {
            reason
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| wrong_type("reasons", "array of strings"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SentimentResult {
        label,
        confidence,
        score: map_score(label, confidence),
        reasons,
    })
}

/// The classifier selected by the `[classifier]` config section.
pub enum ConfiguredClassifier {
    Keyword(KeywordSentimentScorer),
    OpenAi(LlmSentimentClassifier<OpenAiProvider>),
    Claude(LlmSentimentClassifier<ClaudeProvider>),
}

impl ConfiguredClassifier {
    /// Fails with a configuration error when an LLM classifier is selected but
    /// its API key variable is not set.
    pub fn from_config(config: &AppConfig) -> Result<Self, CoreError> {
        let classifier = &config.classifier;
        let timeout = Duration::from_secs(classifier.request_timeout_secs);

        let built = match classifier.kind {
            ClassifierKind::Keyword => Self::Keyword(scorer_from_config(config)),
            ClassifierKind::OpenAi => {
                let key = classifier.api_key()?.ok_or_else(|| ConfigError::MissingField {
                    field: "classifier.api_key_env".to_string(),
                })?;
                let provider = OpenAiProvider::new(key, classifier.model.clone(), timeout)?;
                Self::OpenAi(
                    LlmSentimentClassifier::new(provider).with_brand_terms(&config.tracking.terms),
                )
            }
            ClassifierKind::Claude => {
                let key = classifier.api_key()?.ok_or_else(|| ConfigError::MissingField {
                    field: "classifier.api_key_env".to_string(),
                })?;
                let provider = ClaudeProvider::new(key, classifier.model.clone(), timeout)?;
                Self::Claude(
                    LlmSentimentClassifier::new(provider).with_brand_terms(&config.tracking.terms),
                )
            }
        };
        info!("Using {} sentiment classifier", built.describe());
        Ok(built)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Keyword(_) => "keyword",
            Self::OpenAi(_) => "openai",
            Self::Claude(_) => "claude",
        }
    }
}

impl SentimentClassifier for ConfiguredClassifier {
    async fn classify(&self, text: &str) -> Result<SentimentResult, CoreError> {
        match self {
            Self::Keyword(scorer) => scorer.classify(text).await,
            Self::OpenAi(classifier) => classifier.classify(text).await,
            Self::Claude(classifier) => classifier.classify(text).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CannedProvider {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedProvider {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl LlmProvider for CannedProvider {
        fn name(&self) -> &'static str {
            "canned"
        }

        async fn complete(&self, prompt: &str) -> Result<String, CoreError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn test_parse_valid_reply() {
        let result = parse_classification(
            r#"{"label": "positive", "confidence": 0.7, "reasons": ["praises results"]}"#,
        )
        .unwrap();
        assert_eq!(result.label, SentimentLabel::Positive);
        assert_eq!(result.confidence, 0.7);
        assert_eq!(result.score, 97);
        assert_eq!(result.reasons, vec!["praises results".to_string()]);
    }

    #[test]
    fn test_parse_fenced_reply() {
        let reply = "```json\n{\"label\":\"negative\",\"confidence\":1,\"reasons\":[]}\n```";
        let result = parse_classification(reply).unwrap();
        assert_eq!(result.label, SentimentLabel::Negative);
        assert_eq!(result.score, 1);
    }

    #[test]
    fn test_parse_rejects_schema_violations() {
        assert!(matches!(
            parse_classification("not json at all"),
            Err(ClassificationError::MalformedPayload { .. })
        ));
        assert!(matches!(
            parse_classification(r#"["positive"]"#),
            Err(ClassificationError::WrongType { .. })
        ));
        assert_eq!(
            parse_classification(r#"{"confidence": 0.5, "reasons": []}"#),
            Err(ClassificationError::MissingField {
                field: "label".to_string()
            })
        );
        assert_eq!(
            parse_classification(r#"{"label": "mixed", "confidence": 0.5, "reasons": []}"#),
            Err(ClassificationError::UnknownLabel {
                label: "mixed".to_string()
            })
        );
        assert_eq!(
            parse_classification(r#"{"label": "neutral", "confidence": 1.2, "reasons": []}"#),
            Err(ClassificationError::ConfidenceOutOfRange { value: 1.2 })
        );
        assert_eq!(
            parse_classification(r#"{"label": "neutral", "confidence": "high", "reasons": []}"#),
            Err(ClassificationError::WrongType {
                field: "confidence".to_string(),
                expected: "number".to_string()
            })
        );
        assert_eq!(
            parse_classification(r#"{"label": "neutral", "confidence": 0.4}"#),
            Err(ClassificationError::MissingField {
                field: "reasons".to_string()
            })
        );
        assert!(matches!(
            parse_classification(r#"{"label": "neutral", "confidence": 0.4, "reasons": [1]}"#),
            Err(ClassificationError::WrongType { .. })
        ));
    }

    #[tokio::test]
    async fn test_llm_classifier_maps_score() {
        let provider =
            CannedProvider::new(r#"{"label":"negative","confidence":0.6,"reasons":["refund"]}"#);
        let classifier =
            LlmSentimentClassifier::new(provider).with_brand_terms(&["LifeX".to_string()]);

        let result = classifier.classify("They never sent my refund").await.unwrap();
        assert_eq!(result.label, SentimentLabel::Negative);
        assert_eq!(result.score, 4);

        let prompts = classifier.provider().prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("toward LifeX"));
        assert!(prompts[0].contains("They never sent my refund"));
    }

    #[tokio::test]
    async fn test_llm_classifier_propagates_bad_reply() {
        let classifier = LlmSentimentClassifier::new(CannedProvider::new("{\"label\":\"good\"}"));
        let err = classifier.classify("some text").await.unwrap_err();
        assert!(matches!(err, CoreError::Classification(_)));
    }

    #[tokio::test]
    async fn test_llm_classifier_rejects_empty_text() {
        let classifier = LlmSentimentClassifier::new(CannedProvider::new("{}"));
        let err = classifier.classify("   ").await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput { .. }));
        assert!(classifier.provider().prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn test_keyword_classifier_from_default_config() {
        let classifier = ConfiguredClassifier::from_config(&AppConfig::default()).unwrap();
        assert_eq!(classifier.describe(), "keyword");

        let result = tokio_test::block_on(classifier.classify("good great excellent")).unwrap();
        assert_eq!(result.score, 94);
    }

    #[test]
    fn test_llm_classifier_requires_key() {
        let mut config = AppConfig::default();
        config.classifier.kind = ClassifierKind::Claude;
        config.classifier.api_key_env = Some("MENTIONWATCH_UNSET_TEST_KEY".to_string());

        let err = ConfiguredClassifier::from_config(&config).err().unwrap();
        assert!(matches!(
            err,
            CoreError::Config(ConfigError::MissingEnvironmentVariable { .. })
        ));
    }
}
