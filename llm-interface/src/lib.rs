//! Sentiment classification backends.
//!
//! `SentimentClassifier` is the seam the pipeline talks to. The keyword scorer
//! implements it directly; LLM providers are wrapped in
//! [`LlmSentimentClassifier`], which validates the model's JSON reply.

pub mod batch;
pub mod classifier;
pub mod providers;

pub use batch::{BatchClassifier, BatchConfig, BatchFailure, BatchOutcome};
pub use classifier::{
    parse_classification, ConfiguredClassifier, LlmSentimentClassifier, SentimentClassifier,
};
pub use providers::{
    ClaudeProvider, LlmProvider, OpenAiProvider, DEFAULT_CLAUDE_MODEL, DEFAULT_OPENAI_MODEL,
};
