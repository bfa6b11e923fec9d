use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const POST_ID_PREFIX: &str = "t3_";
pub const COMMENT_ID_PREFIX: &str = "t1_";

pub const FALLBACK_REASON: &str = "Classification failed, defaulting to neutral";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Negative,
    Neutral,
    Positive,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Positive => "positive",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a label case-insensitively; surrounding whitespace is ignored.
impl FromStr for SentimentLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "negative" => Ok(SentimentLabel::Negative),
            "neutral" => Ok(SentimentLabel::Neutral),
            "positive" => Ok(SentimentLabel::Positive),
            _ => Err(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MentionKind {
    Post,
    Comment,
}

impl MentionKind {
    /// Infers the kind from a Reddit fullname (`t3_` post, `t1_` comment).
    pub fn from_id(id: &str) -> Option<Self> {
        if id.starts_with(POST_ID_PREFIX) {
            Some(MentionKind::Post)
        } else if id.starts_with(COMMENT_ID_PREFIX) {
            Some(MentionKind::Comment)
        } else {
            None
        }
    }

    pub fn id_prefix(&self) -> &'static str {
        match self {
            MentionKind::Post => POST_ID_PREFIX,
            MentionKind::Comment => COMMENT_ID_PREFIX,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MentionKind::Post => "post",
            MentionKind::Comment => "comment",
        }
    }
}

impl fmt::Display for MentionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MentionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "post" => Ok(MentionKind::Post),
            "comment" => Ok(MentionKind::Comment),
            _ => Err(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub label: SentimentLabel,
    pub confidence: f64,
    pub score: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}

impl SentimentResult {
    /// Substitute used when a single classification in a batch fails.
    pub fn fallback() -> Self {
        Self {
            label: SentimentLabel::Neutral,
            confidence: 0.5,
            score: 50,
            reasons: vec![FALLBACK_REASON.to_string()],
        }
    }
}

/// A fetched item that has not been classified yet.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMention {
    pub id: String,
    pub kind: MentionKind,
    pub subreddit: String,
    pub author: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub permalink: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl RawMention {
    /// Posts are classified on `title + " " + body`, comments on the body alone.
    pub fn text(&self) -> String {
        let body = self.body.as_deref().unwrap_or("");
        match self.kind {
            MentionKind::Post => {
                format!("{} {}", self.title.as_deref().unwrap_or(""), body)
            }
            MentionKind::Comment => body.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualTag {
    #[serde(rename = "manualLabel")]
    pub label: SentimentLabel,
    #[serde(rename = "manualScore")]
    pub score: u8,
    pub tagged_by: String,
    pub tagged_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManualTagFields {
    #[serde(default)]
    manual_label: Option<SentimentLabel>,
    #[serde(default)]
    manual_score: Option<u8>,
    #[serde(default)]
    tagged_by: Option<String>,
    #[serde(default)]
    tagged_at: Option<DateTime<Utc>>,
}

/// The four manual fields are all present or all absent. A partial or
/// out-of-range tag is an error rather than a silently dropped override.
fn manual_tag_fields<'de, D>(deserializer: D) -> Result<Option<ManualTag>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let fields = ManualTagFields::deserialize(deserializer)?;
    match (
        fields.manual_label,
        fields.manual_score,
        fields.tagged_by,
        fields.tagged_at,
    ) {
        (None, None, None, None) => Ok(None),
        (Some(label), Some(score), Some(tagged_by), Some(tagged_at)) => {
            if !(1..=100).contains(&score) {
                return Err(serde::de::Error::custom(format!(
                    "manualScore {} is outside 1..=100",
                    score
                )));
            }
            Ok(Some(ManualTag {
                label,
                score,
                tagged_by,
                tagged_at,
            }))
        }
        _ => Err(serde::de::Error::custom(
            "manual tag needs manualLabel, manualScore, taggedBy and taggedAt together",
        )),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mention {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MentionKind,
    pub subreddit: String,
    pub author: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub label: SentimentLabel,
    pub confidence: f64,
    pub score: u8,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub keywords_matched: Vec<String>,
    #[serde(flatten, deserialize_with = "manual_tag_fields")]
    pub manual: Option<ManualTag>,
    #[serde(default)]
    pub ignored: bool,
    #[serde(default)]
    pub urgent: bool,
}

impl Mention {
    pub fn from_raw(raw: RawMention, result: SentimentResult, keywords_matched: Vec<String>) -> Self {
        Self {
            id: raw.id,
            kind: raw.kind,
            subreddit: raw.subreddit,
            author: raw.author,
            title: raw.title,
            body: raw.body,
            permalink: raw.permalink,
            created_utc: raw.created_utc,
            label: result.label,
            confidence: result.confidence,
            score: result.score,
            reasons: result.reasons,
            keywords_matched,
            manual: None,
            ignored: false,
            urgent: false,
        }
    }

    pub fn effective_label(&self) -> SentimentLabel {
        self.manual.as_ref().map(|m| m.label).unwrap_or(self.label)
    }

    pub fn effective_score(&self) -> u8 {
        self.manual.as_ref().map(|m| m.score).unwrap_or(self.score)
    }

    pub fn text(&self) -> String {
        let body = self.body.as_deref().unwrap_or("");
        match self.title.as_deref() {
            Some(title) => format!("{} {}", title, body),
            None => body.to_string(),
        }
    }
}
