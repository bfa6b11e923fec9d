use crate::classifier::SentimentClassifier;
use futures::future::join_all;
use mentionwatch_core::{ClassifierConfig, CoreError, ErrorExt, SentimentResult};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Texts classified concurrently per batch.
    pub batch_size: usize,
    /// Pause between consecutive batches.
    pub delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            delay: Duration::from_millis(1000),
        }
    }
}

impl BatchConfig {
    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            delay: Duration::from_millis(config.batch_delay_ms),
        }
    }
}

/// A text whose classification failed and was replaced by the fallback.
#[derive(Debug)]
pub struct BatchFailure {
    pub index: usize,
    pub error: CoreError,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// One result per input, in input order.
    pub results: Vec<SentimentResult>,
    pub failures: Vec<BatchFailure>,
}

impl BatchOutcome {
    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }
}

/// Runs a classifier over many texts in fixed-size concurrent batches.
///
/// A failure never aborts the run: the affected text gets the neutral
/// fallback result and the error is kept in [`BatchOutcome::failures`].
pub struct BatchClassifier<C> {
    classifier: C,
    config: BatchConfig,
}

impl<C: SentimentClassifier> BatchClassifier<C> {
    pub fn new(classifier: C, config: BatchConfig) -> Self {
        Self { classifier, config }
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub async fn classify_all<S: AsRef<str>>(&self, texts: &[S]) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            results: Vec::with_capacity(texts.len()),
            failures: Vec::new(),
        };
        if texts.is_empty() {
            return outcome;
        }

        let batch_size = self.config.batch_size.max(1);
        let batch_count = texts.len().div_ceil(batch_size);
        info!(
            "Classifying {} texts in {} batches of up to {}",
            texts.len(),
            batch_count,
            batch_size
        );

        for (batch_index, chunk) in texts.chunks(batch_size).enumerate() {
            let offset = batch_index * batch_size;
            let results = join_all(
                chunk
                    .iter()
                    .map(|text| self.classifier.classify(text.as_ref())),
            )
            .await;

            for (position, result) in results.into_iter().enumerate() {
                match result {
                    Ok(result) => outcome.results.push(result),
                    Err(error) => {
                        let index = offset + position;
                        error.log_warn();
                        warn!("Using neutral fallback for text {}", index);
                        outcome.results.push(SentimentResult::fallback());
                        outcome.failures.push(BatchFailure { index, error });
                    }
                }
            }

            debug!("Finished batch {}/{}", batch_index + 1, batch_count);
            if batch_index + 1 < batch_count && !self.config.delay.is_zero() {
                tokio::time::sleep(self.config.delay).await;
            }
        }

        if outcome.failures.is_empty() {
            info!("Classified {} texts", outcome.results.len());
        } else {
            warn!(
                "Classified {} texts with {} fallbacks",
                outcome.results.len(),
                outcome.failures.len()
            );
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mentionwatch_core::{LlmError, SentimentLabel, FALLBACK_REASON};
    use sentiment_engine::map_score;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    /// Positive for every text except the ones listed in `fail_on`.
    struct ScriptedClassifier {
        fail_on: Vec<String>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    impl ScriptedClassifier {
        fn failing_on(texts: &[&str]) -> Self {
            Self {
                fail_on: texts.iter().map(|t| t.to_string()).collect(),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl SentimentClassifier for ScriptedClassifier {
        async fn classify(&self, text: &str) -> Result<SentimentResult, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_on.iter().any(|t| t == text) {
                return Err(LlmError::ServiceUnavailable {
                    provider: "scripted".to_string(),
                }
                .into());
            }
            Ok(SentimentResult {
                label: SentimentLabel::Positive,
                confidence: 0.5,
                score: map_score(SentimentLabel::Positive, 0.5),
                reasons: vec![text.to_string()],
            })
        }
    }

    fn no_delay(batch_size: usize) -> BatchConfig {
        BatchConfig {
            batch_size,
            delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_failure_becomes_fallback_in_place() {
        let batch = BatchClassifier::new(ScriptedClassifier::failing_on(&["c"]), no_delay(5));
        let outcome = batch.classify_all(&["a", "b", "c", "d", "e"]).await;

        assert_eq!(outcome.results.len(), 5);
        assert_eq!(outcome.failed_count(), 1);
        assert_eq!(outcome.failures[0].index, 2);

        assert_eq!(outcome.results[2], SentimentResult::fallback());
        assert_eq!(outcome.results[2].reasons, vec![FALLBACK_REASON.to_string()]);
        for index in [0, 1, 3, 4] {
            assert_eq!(outcome.results[index].label, SentimentLabel::Positive);
            assert_eq!(outcome.results[index].score, 95);
        }
    }

    #[tokio::test]
    async fn test_results_keep_input_order_across_batches() {
        let texts: Vec<String> = (0..7).map(|i| format!("text-{}", i)).collect();
        let batch = BatchClassifier::new(ScriptedClassifier::failing_on(&[]), no_delay(3));
        let outcome = batch.classify_all(&texts).await;

        let echoed: Vec<&str> = outcome
            .results
            .iter()
            .map(|r| r.reasons[0].as_str())
            .collect();
        assert_eq!(echoed, texts.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(batch.classifier().calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn test_concurrency_bounded_by_batch_size() {
        let texts = ["1", "2", "3", "4", "5", "6", "7", "8"];
        let batch = BatchClassifier::new(ScriptedClassifier::failing_on(&[]), no_delay(3));
        batch.classify_all(&texts).await;

        let max = batch.classifier().max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 3, "max in flight was {}", max);
        assert!(max >= 2, "batch items did not overlap");
    }

    #[tokio::test]
    async fn test_delay_only_between_batches() {
        let config = BatchConfig {
            batch_size: 2,
            delay: Duration::from_millis(200),
        };
        let batch = BatchClassifier::new(ScriptedClassifier::failing_on(&[]), config);

        // Three batches means two pauses and no trailing one.
        let started = Instant::now();
        batch.classify_all(&["a", "b", "c", "d", "e"]).await;
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(400));
        assert!(elapsed < Duration::from_millis(600), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let batch = BatchClassifier::new(ScriptedClassifier::failing_on(&[]), BatchConfig::default());
        let outcome = batch.classify_all::<&str>(&[]).await;
        assert!(outcome.results.is_empty());
        assert_eq!(batch.classifier().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_batch_config_from_classifier_config() {
        let config = BatchConfig::from_config(&ClassifierConfig {
            batch_size: 8,
            batch_delay_ms: 250,
            ..Default::default()
        });
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.delay, Duration::from_millis(250));
    }
}
