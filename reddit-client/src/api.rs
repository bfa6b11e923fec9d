use crate::rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
use chrono::{DateTime, TimeZone, Utc};
use mentionwatch_core::{CoreError, MentionKind, RawMention, RedditApiError, RedditConfig};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const REDDIT_WEB_BASE: &str = "https://www.reddit.com";
const SEARCH_ENDPOINT: &str = "/search.json";
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListing {
    pub kind: String,
    pub data: RedditListingData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListingData {
    #[serde(default)]
    pub children: Vec<RedditListingChild>,
    pub after: Option<String>,
}

/// Children stay untyped until their `kind` says what they are.
#[derive(Debug, Clone, Deserialize)]
pub struct RedditListingChild {
    pub kind: String,
    pub data: Value,
}

/// One page of search results converted to mentions.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub mentions: Vec<RawMention>,
    pub after: Option<String>,
}

/// Reddit's `type` search parameter for a mention kind.
pub fn search_type(kind: MentionKind) -> &'static str {
    match kind {
        MentionKind::Post => "link",
        MentionKind::Comment => "comment",
    }
}

fn str_field(data: &Value, field: &str) -> Option<String> {
    data.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

fn created_at(data: &Value) -> Option<DateTime<Utc>> {
    let seconds = data.get("created_utc").and_then(Value::as_f64)?;
    Utc.timestamp_opt(seconds as i64, 0).single()
}

/// Converts a `t3` (post) or `t1` (comment) listing child. Anything else,
/// or a child without a usable id, yields `None`.
pub fn mention_from_child(child: &RedditListingChild) -> Option<RawMention> {
    let kind = match child.kind.as_str() {
        "t3" => MentionKind::Post,
        "t1" => MentionKind::Comment,
        other => {
            debug!("Skipping listing child of kind {}", other);
            return None;
        }
    };
    let data = &child.data;

    let id = str_field(data, "name").or_else(|| {
        str_field(data, "id").map(|id| format!("{}{}", kind.id_prefix(), id))
    })?;

    let (title, body) = match kind {
        MentionKind::Post => (str_field(data, "title"), str_field(data, "selftext")),
        MentionKind::Comment => (None, str_field(data, "body")),
    };

    let Some(created_utc) = created_at(data) else {
        warn!("Listing child {} has no usable created_utc", id);
        return None;
    };

    Some(RawMention {
        id,
        kind,
        subreddit: str_field(data, "subreddit").unwrap_or_default(),
        author: str_field(data, "author"),
        title,
        body,
        permalink: str_field(data, "permalink")
            .map(|p| if p.starts_with('/') { format!("{}{}", REDDIT_WEB_BASE, p) } else { p }),
        created_utc,
    })
}

pub fn parse_listing(listing: RedditListing) -> SearchPage {
    SearchPage {
        mentions: listing
            .data
            .children
            .iter()
            .filter_map(mention_from_child)
            .collect(),
        after: listing.data.after.filter(|a| !a.is_empty()),
    }
}

/// Client for Reddit's public JSON search endpoint.
#[derive(Debug)]
pub struct RedditSearchClient {
    http_client: Client,
    rate_limiter: Arc<RateLimiter>,
    base_url: String,
    config: RedditConfig,
}

impl RedditSearchClient {
    pub fn new(config: &RedditConfig) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(RateLimitConfig::from(config))),
            base_url: REDDIT_WEB_BASE.to_string(),
            config: config.clone(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn config(&self) -> &RedditConfig {
        &self.config
    }

    pub async fn rate_limit_status(&self) -> RateLimitStatus {
        self.rate_limiter.status().await
    }

    pub fn search_params(
        &self,
        query: &str,
        kind: MentionKind,
        after: Option<&str>,
    ) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("q", query.to_string()),
            ("sort", "new".to_string()),
            ("t", self.config.time_window.clone()),
            ("limit", self.config.search_limit.to_string()),
            ("type", search_type(kind).to_string()),
        ];
        if let Some(cursor) = after {
            params.push(("after", cursor.to_string()));
        }
        params
    }

    async fn get(&self, params: &[(&'static str, String)]) -> Result<Response, CoreError> {
        let _permit = self.rate_limiter.acquire_permit().await?;
        let url = format!("{}{}", self.base_url, SEARCH_ENDPOINT);

        debug!("Making Reddit search request: {:?}", params);
        let response = match self.http_client.get(&url).query(params).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for {}: {}", SEARCH_ENDPOINT, e);
                if e.is_timeout() {
                    return Err(RedditApiError::RequestTimeout.into());
                }
                return Err(CoreError::Network(e));
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!("Request successful: {}", status);
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, SEARCH_ENDPOINT);
        let error = match status.as_u16() {
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                warn!("Rate limited, retry after {} seconds", retry_after);
                RedditApiError::RateLimitExceeded { retry_after }
            }
            401 => RedditApiError::Unauthorized {
                endpoint: SEARCH_ENDPOINT.to_string(),
            },
            403 => RedditApiError::Forbidden {
                resource: SEARCH_ENDPOINT.to_string(),
            },
            404 => RedditApiError::NotFound {
                endpoint: SEARCH_ENDPOINT.to_string(),
            },
            code if status.is_server_error() => RedditApiError::ServerError { status_code: code },
            code => RedditApiError::InvalidResponse {
                details: format!("unexpected status {}", code),
            },
        };
        Err(error.into())
    }

    /// Fetches a single page of results.
    pub async fn search_page(
        &self,
        query: &str,
        kind: MentionKind,
        after: Option<&str>,
    ) -> Result<SearchPage, CoreError> {
        let params = self.search_params(query, kind, after);
        let response = self.get(&params).await?;

        let listing: RedditListing = response.json().await.map_err(|e| {
            error!("Failed to parse search listing: {}", e);
            RedditApiError::InvalidResponse {
                details: format!("Failed to parse {} search results", search_type(kind)),
            }
        })?;

        let page = parse_listing(listing);
        debug!(
            "Search page returned {} {} mentions",
            page.mentions.len(),
            kind
        );
        Ok(page)
    }

    /// Follows `after` cursors until results run out or `max_pages` is reached.
    pub async fn search_all(
        &self,
        query: &str,
        kind: MentionKind,
    ) -> Result<Vec<RawMention>, CoreError> {
        let mut mentions = Vec::new();
        let mut after: Option<String> = None;

        for page_number in 0..self.config.max_pages.max(1) {
            let page = self.search_page(query, kind, after.as_deref()).await?;
            let page_len = page.mentions.len();
            mentions.extend(page.mentions);

            match page.after {
                Some(cursor) if page_len > 0 => after = Some(cursor),
                _ => {
                    debug!("Search exhausted after {} pages", page_number + 1);
                    break;
                }
            }
        }

        info!("Retrieved {} {} mentions for {}", mentions.len(), kind, query);
        Ok(mentions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(json: &str) -> RedditListing {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_post_child_conversion() {
        let page = parse_listing(listing(
            r#"{"kind":"Listing","data":{"after":"t3_next","children":[
                {"kind":"t3","data":{"id":"abc","name":"t3_abc","title":"LifeX results",
                 "selftext":"Pretty good so far","author":"alice","subreddit":"longevity",
                 "permalink":"/r/longevity/comments/abc/lifex_results/","created_utc":1709294400.0}}
            ]}}"#,
        ));

        assert_eq!(page.after.as_deref(), Some("t3_next"));
        let post = &page.mentions[0];
        assert_eq!(post.id, "t3_abc");
        assert_eq!(post.kind, MentionKind::Post);
        assert_eq!(post.title.as_deref(), Some("LifeX results"));
        assert_eq!(post.body.as_deref(), Some("Pretty good so far"));
        assert_eq!(post.author.as_deref(), Some("alice"));
        assert_eq!(
            post.permalink.as_deref(),
            Some("https://www.reddit.com/r/longevity/comments/abc/lifex_results/")
        );
        assert_eq!(post.created_utc.timestamp(), 1709294400);
    }

    #[test]
    fn test_comment_child_and_id_fallback() {
        let page = parse_listing(listing(
            r#"{"kind":"Listing","data":{"after":null,"children":[
                {"kind":"t1","data":{"id":"xyz","body":"LifeX is a scam",
                 "author":"bob","subreddit":"Supplements","created_utc":1709294400}},
                {"kind":"t5","data":{"id":"sub","name":"t5_sub"}}
            ]}}"#,
        ));

        assert_eq!(page.mentions.len(), 1);
        let comment = &page.mentions[0];
        assert_eq!(comment.id, "t1_xyz");
        assert_eq!(comment.kind, MentionKind::Comment);
        assert_eq!(comment.title, None);
        assert_eq!(comment.text(), "LifeX is a scam");
        assert!(page.after.is_none());
    }

    #[test]
    fn test_child_without_timestamp_is_skipped() {
        let child = RedditListingChild {
            kind: "t3".to_string(),
            data: serde_json::json!({"name": "t3_a", "title": "x"}),
        };
        assert!(mention_from_child(&child).is_none());
    }

    #[test]
    fn test_search_params() {
        let client = RedditSearchClient::new(&RedditConfig::default()).unwrap();
        let params = client.search_params("\"LifeX\"", MentionKind::Comment, Some("t1_last"));
        let lookup = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(lookup("q"), Some("\"LifeX\""));
        assert_eq!(lookup("sort"), Some("new"));
        assert_eq!(lookup("t"), Some("day"));
        assert_eq!(lookup("limit"), Some("100"));
        assert_eq!(lookup("type"), Some("comment"));
        assert_eq!(lookup("after"), Some("t1_last"));

        let first_page = client.search_params("q", MentionKind::Post, None);
        assert!(first_page.iter().all(|(k, _)| *k != "after"));
        assert!(first_page.contains(&("type", "link".to_string())));
    }
}
