use mentionwatch_core::{CoreError, LlmError};
use reqwest::header::HeaderMap;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

const OPENAI_API_BASE: &str = "https://api.openai.com";
const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-3-5-haiku-latest";

const MAX_OUTPUT_TOKENS: u32 = 300;
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

pub const SYSTEM_PROMPT: &str = "You classify the sentiment of Reddit posts and comments \
toward a brand. Reply with a single JSON object and nothing else.";

/// A text-completion backend that returns the model's raw reply.
pub trait LlmProvider {
    fn name(&self) -> &'static str;

    async fn complete(&self, prompt: &str) -> Result<String, CoreError>;
}

fn build_client(timeout: Duration) -> Result<Client, CoreError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

pub(crate) fn parse_retry_after(headers: &HeaderMap) -> u64 {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

fn send_error(provider: &str, e: reqwest::Error) -> CoreError {
    error!("Network error calling {}: {}", provider, e);
    if e.is_timeout() {
        CoreError::Llm(LlmError::RequestTimeout {
            provider: provider.to_string(),
        })
    } else {
        CoreError::Network(e)
    }
}

fn check_status(provider: &str, response: Response) -> Result<Response, CoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let provider = provider.to_string();
    let error = match status.as_u16() {
        401 | 403 => LlmError::InvalidApiKey { provider },
        429 => {
            let retry_after = parse_retry_after(response.headers());
            warn!("{} rate limited, retry after {} seconds", provider, retry_after);
            LlmError::RateLimitExceeded {
                provider,
                retry_after,
            }
        }
        500..=599 => LlmError::ServiceUnavailable { provider },
        code => LlmError::RequestFailed {
            provider,
            status_code: code,
        },
    };
    error!("LLM request failed with status {}: {}", status, error);
    Err(error.into())
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl ChatCompletionResponse {
    pub(crate) fn into_text(self, provider: &str) -> Result<String, LlmError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| LlmError::InvalidResponseFormat {
                provider: provider.to_string(),
            })
    }
}

pub struct OpenAiProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: Option<String>, timeout: Duration) -> Result<Self, CoreError> {
        Ok(Self {
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            base_url: OPENAI_API_BASE.to_string(),
            client: build_client(timeout)?,
        })
    }

    /// Points the provider at an OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, prompt: &str) -> Result<String, CoreError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.0,
            max_tokens: MAX_OUTPUT_TOKENS,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        debug!("Requesting classification from {} ({})", self.name(), self.model);
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(self.api_key.trim())
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(self.name(), e))?;
        let response = check_status(self.name(), response)?;

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to decode {} response: {}", self.name(), e);
            LlmError::InvalidResponseFormat {
                provider: self.name().to_string(),
            }
        })?;
        Ok(parsed.into_text(self.name())?)
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

impl MessagesResponse {
    pub(crate) fn into_text(self, provider: &str) -> Result<String, LlmError> {
        let text = self
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            return Err(LlmError::InvalidResponseFormat {
                provider: provider.to_string(),
            });
        }
        Ok(text)
    }
}

pub struct ClaudeProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl ClaudeProvider {
    pub fn new(api_key: String, model: Option<String>, timeout: Duration) -> Result<Self, CoreError> {
        Ok(Self {
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_CLAUDE_MODEL.to_string()),
            base_url: ANTHROPIC_API_BASE.to_string(),
            client: build_client(timeout)?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl LlmProvider for ClaudeProvider {
    fn name(&self) -> &'static str {
        "claude"
    }

    async fn complete(&self, prompt: &str) -> Result<String, CoreError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_OUTPUT_TOKENS,
            temperature: 0.0,
            system: SYSTEM_PROMPT,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        debug!("Requesting classification from {} ({})", self.name(), self.model);
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.trim())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(self.name(), e))?;
        let response = check_status(self.name(), response)?;

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            error!("Failed to decode {} response: {}", self.name(), e);
            LlmError::InvalidResponseFormat {
                provider: self.name().to_string(),
            }
        })?;
        Ok(parsed.into_text(self.name())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_openai_reply_extraction() {
        let body = r#"{"id":"chatcmpl-1","choices":[{"index":0,"message":{"role":"assistant","content":"{\"label\":\"positive\"}"},"finish_reason":"stop"}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.into_text("openai").unwrap(), r#"{"label":"positive"}"#);

        let empty: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            empty.into_text("openai"),
            Err(LlmError::InvalidResponseFormat { .. })
        ));
    }

    #[test]
    fn test_claude_reply_extraction() {
        let body = r#"{"id":"msg_1","type":"message","content":[{"type":"text","text":"{\"label\":\"neutral\"}"},{"type":"tool_use","id":"x","name":"n","input":{}}]}"#;
        let parsed: MessagesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.into_text("claude").unwrap(), r#"{"label":"neutral"}"#);

        let empty: MessagesResponse = serde_json::from_str(r#"{"content":[]}"#).unwrap();
        assert!(empty.into_text("claude").is_err());
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), 60);

        headers.insert("retry-after", HeaderValue::from_static("17"));
        assert_eq!(parse_retry_after(&headers), 17);

        headers.insert("retry-after", HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after(&headers), 60);
    }

    #[test]
    fn test_provider_defaults() {
        let openai = OpenAiProvider::new("key".to_string(), None, Duration::from_secs(5)).unwrap();
        assert_eq!(openai.model(), DEFAULT_OPENAI_MODEL);
        assert_eq!(openai.name(), "openai");

        let claude = ClaudeProvider::new(
            "key".to_string(),
            Some("claude-custom".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_base_url("http://localhost:9999/");
        assert_eq!(claude.model(), "claude-custom");
        assert_eq!(claude.base_url, "http://localhost:9999");
    }
}
