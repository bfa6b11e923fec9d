use chrono::{DateTime, Utc};
use mentionwatch_core::{Mention, MentionKind, SentimentLabel};

/// Selection criteria shared by both backends.
///
/// `since` is inclusive and `until` exclusive. Ignored mentions are left out
/// unless `include_ignored` is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MentionFilter {
    /// Compared against the effective (manual-or-automated) label.
    pub label: Option<SentimentLabel>,
    pub subreddit: Option<String>,
    pub kind: Option<MentionKind>,
    pub urgent_only: bool,
    pub include_ignored: bool,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// Case-insensitive substring over title and body.
    pub search: Option<String>,
    pub limit: Option<usize>,
}

impl MentionFilter {
    pub fn all() -> Self {
        Self {
            include_ignored: true,
            ..Default::default()
        }
    }

    pub fn without_limit(&self) -> Self {
        Self {
            limit: None,
            ..self.clone()
        }
    }

    pub fn matches(&self, mention: &Mention) -> bool {
        if !self.include_ignored && mention.ignored {
            return false;
        }
        if self.urgent_only && !mention.urgent {
            return false;
        }
        if let Some(label) = self.label {
            if mention.effective_label() != label {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if mention.kind != kind {
                return false;
            }
        }
        if let Some(subreddit) = &self.subreddit {
            if !mention.subreddit.eq_ignore_ascii_case(subreddit) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if mention.created_utc < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if mention.created_utc >= until {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let in_title = mention
                .title
                .as_deref()
                .is_some_and(|t| t.to_lowercase().contains(&needle));
            let in_body = mention
                .body
                .as_deref()
                .is_some_and(|b| b.to_lowercase().contains(&needle));
            if !in_title && !in_body {
                return false;
            }
        }
        true
    }
}
