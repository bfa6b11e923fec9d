//! Persistence for classified mentions.
//!
//! Two interchangeable backends sit behind [`MentionStore`]: a single JSON
//! document on disk and a SQLite database. [`Database`] picks one from the
//! `[storage]` config section.

pub mod filter;
pub mod json_store;
pub mod sqlite_store;


pub use filter::MentionFilter;
pub use json_store::JsonFileStore;
pub use sqlite_store::SqliteStore;

use mentionwatch_core::{
    CoreError, DailySentiment, ManualTag, Mention, SentimentSummary, StorageBackend,
    StorageConfig,
};
use tracing::info;

pub trait MentionStore {
    /// Inserts mentions whose ids are not stored yet and leaves existing rows
    /// untouched. Returns the number inserted.
    async fn upsert_mentions(&self, mentions: &[Mention]) -> Result<usize, CoreError>;

    async fn get_mention(&self, id: &str) -> Result<Mention, CoreError>;

    async fn contains(&self, id: &str) -> Result<bool, CoreError>;

    /// Matching mentions, newest first.
    async fn list_mentions(&self, filter: &MentionFilter) -> Result<Vec<Mention>, CoreError>;

    async fn apply_manual_tag(&self, id: &str, tag: ManualTag) -> Result<Mention, CoreError>;

    async fn clear_manual_tag(&self, id: &str) -> Result<Mention, CoreError>;

    /// Updates whichever flags are `Some`.
    async fn set_flags(
        &self,
        id: &str,
        ignored: Option<bool>,
        urgent: Option<bool>,
    ) -> Result<Mention, CoreError>;

    async fn summary(&self, filter: &MentionFilter) -> Result<SentimentSummary, CoreError> {
        let mentions = self.list_mentions(&filter.without_limit()).await?;
        Ok(mentionwatch_core::summarize(&mentions))
    }

    async fn daily_series(&self, filter: &MentionFilter) -> Result<Vec<DailySentiment>, CoreError> {
        let mentions = self.list_mentions(&filter.without_limit()).await?;
        Ok(mentionwatch_core::daily_series(&mentions))
    }
}

pub(crate) fn not_found(id: &str) -> CoreError {
    CoreError::NotFound {
        resource: format!("mention {}", id),
    }
}

/// The configured storage backend.
pub enum Database {
    Json(JsonFileStore),
    Sqlite(SqliteStore),
}

impl Database {
    pub async fn open(config: &StorageConfig) -> Result<Self, CoreError> {
        let database = match config.backend {
            StorageBackend::Json => Self::Json(JsonFileStore::open(&config.json_path).await?),
            StorageBackend::Sqlite => Self::Sqlite(SqliteStore::connect(&config.database_url).await?),
        };
        info!("Opened {} mention store", database.backend_name());
        Ok(database)
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::Sqlite(_) => "sqlite",
        }
    }
}

impl MentionStore for Database {
    async fn upsert_mentions(&self, mentions: &[Mention]) -> Result<usize, CoreError> {
        match self {
            Self::Json(store) => store.upsert_mentions(mentions).await,
            Self::Sqlite(store) => store.upsert_mentions(mentions).await,
        }
    }

    async fn get_mention(&self, id: &str) -> Result<Mention, CoreError> {
        match self {
            Self::Json(store) => store.get_mention(id).await,
            Self::Sqlite(store) => store.get_mention(id).await,
        }
    }

    async fn contains(&self, id: &str) -> Result<bool, CoreError> {
        match self {
            Self::Json(store) => store.contains(id).await,
            Self::Sqlite(store) => store.contains(id).await,
        }
    }

    async fn list_mentions(&self, filter: &MentionFilter) -> Result<Vec<Mention>, CoreError> {
        match self {
            Self::Json(store) => store.list_mentions(filter).await,
            Self::Sqlite(store) => store.list_mentions(filter).await,
        }
    }

    async fn apply_manual_tag(&self, id: &str, tag: ManualTag) -> Result<Mention, CoreError> {
        match self {
            Self::Json(store) => store.apply_manual_tag(id, tag).await,
            Self::Sqlite(store) => store.apply_manual_tag(id, tag).await,
        }
    }

    async fn clear_manual_tag(&self, id: &str) -> Result<Mention, CoreError> {
        match self {
            Self::Json(store) => store.clear_manual_tag(id).await,
            Self::Sqlite(store) => store.clear_manual_tag(id).await,
        }
    }

    async fn set_flags(
        &self,
        id: &str,
        ignored: Option<bool>,
        urgent: Option<bool>,
    ) -> Result<Mention, CoreError> {
        match self {
            Self::Json(store) => store.set_flags(id, ignored, urgent).await,
            Self::Sqlite(store) => store.set_flags(id, ignored, urgent).await,
        }
    }
}
