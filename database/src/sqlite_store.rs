use crate::{not_found, MentionFilter, MentionStore};
use chrono::{DateTime, TimeZone, Utc};
use mentionwatch_core::{
    CoreError, DatabaseError, ManualTag, Mention, MentionKind, SentimentLabel,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use tracing::{debug, error, info, warn};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

const CREATE_MENTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS mentions (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    subreddit TEXT NOT NULL,
    author TEXT,
    title TEXT,
    body TEXT,
    permalink TEXT,
    created_utc INTEGER NOT NULL,
    label TEXT NOT NULL,
    confidence REAL NOT NULL,
    score INTEGER NOT NULL,
    reasons TEXT NOT NULL DEFAULT '[]',
    keywords_matched TEXT NOT NULL DEFAULT '[]',
    manual_label TEXT,
    manual_score INTEGER,
    tagged_by TEXT,
    tagged_at INTEGER,
    ignored INTEGER NOT NULL DEFAULT 0,
    urgent INTEGER NOT NULL DEFAULT 0
)
"#;

const CREATE_CREATED_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_mentions_created_utc ON mentions (created_utc DESC)";

const SELECT_COLUMNS: &str = "SELECT id, kind, subreddit, author, title, body, permalink, \
created_utc, label, confidence, score, reasons, keywords_matched, manual_label, manual_score, \
tagged_by, tagged_at, ignored, urgent FROM mentions";

/// SQLITE_BUSY and SQLITE_LOCKED, including their extended codes.
fn is_locked(e: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db) = e else {
        return false;
    };
    db.code()
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| matches!(code & 0xff, 5 | 6))
}

fn sql(e: sqlx::Error) -> CoreError {
    if is_locked(&e) {
        warn!("SQLite database is locked: {}", e);
        return DatabaseError::DatabaseLocked.into();
    }
    error!("SQLite error: {}", e);
    DatabaseError::Sql(e).into()
}

fn corrupt_row(id: &str, column: &str) -> CoreError {
    DatabaseError::CorruptStore {
        path: format!("mentions.{} for {}", column, id),
    }
    .into()
}

fn timestamp(id: &str, column: &str, seconds: i64) -> Result<DateTime<Utc>, CoreError> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| corrupt_row(id, column))
}

fn json_list(id: &str, column: &str, raw: &str) -> Result<Vec<String>, CoreError> {
    serde_json::from_str(raw).map_err(|_| corrupt_row(id, column))
}

fn mention_from_row(row: &SqliteRow) -> Result<Mention, CoreError> {
    let id: String = row.try_get("id").map_err(sql)?;

    let kind: String = row.try_get("kind").map_err(sql)?;
    let kind = MentionKind::from_str(&kind).map_err(|_| corrupt_row(&id, "kind"))?;
    let label: String = row.try_get("label").map_err(sql)?;
    let label = SentimentLabel::from_str(&label).map_err(|_| corrupt_row(&id, "label"))?;

    let manual_label: Option<String> = row.try_get("manual_label").map_err(sql)?;
    let manual = match manual_label {
        Some(manual_label) => {
            let manual_score: Option<i64> = row.try_get("manual_score").map_err(sql)?;
            let tagged_by: Option<String> = row.try_get("tagged_by").map_err(sql)?;
            let tagged_at: Option<i64> = row.try_get("tagged_at").map_err(sql)?;
            Some(ManualTag {
                label: SentimentLabel::from_str(&manual_label)
                    .map_err(|_| corrupt_row(&id, "manual_label"))?,
                score: manual_score
                    .and_then(|s| u8::try_from(s).ok())
                    .filter(|s| (1..=100).contains(s))
                    .ok_or_else(|| corrupt_row(&id, "manual_score"))?,
                tagged_by: tagged_by.ok_or_else(|| corrupt_row(&id, "tagged_by"))?,
                tagged_at: timestamp(
                    &id,
                    "tagged_at",
                    tagged_at.ok_or_else(|| corrupt_row(&id, "tagged_at"))?,
                )?,
            })
        }
        None => None,
    };

    let score: i64 = row.try_get("score").map_err(sql)?;
    let reasons: String = row.try_get("reasons").map_err(sql)?;
    let keywords: String = row.try_get("keywords_matched").map_err(sql)?;
    let created_utc: i64 = row.try_get("created_utc").map_err(sql)?;

    Ok(Mention {
        kind,
        subreddit: row.try_get("subreddit").map_err(sql)?,
        author: row.try_get("author").map_err(sql)?,
        title: row.try_get("title").map_err(sql)?,
        body: row.try_get("body").map_err(sql)?,
        permalink: row.try_get("permalink").map_err(sql)?,
        created_utc: timestamp(&id, "created_utc", created_utc)?,
        label,
        confidence: row.try_get("confidence").map_err(sql)?,
        score: u8::try_from(score).map_err(|_| corrupt_row(&id, "score"))?,
        reasons: json_list(&id, "reasons", &reasons)?,
        keywords_matched: json_list(&id, "keywords_matched", &keywords)?,
        manual,
        ignored: row.try_get("ignored").map_err(sql)?,
        urgent: row.try_get("urgent").map_err(sql)?,
        id,
    })
}

/// Escapes `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'`.
fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &MentionFilter) {
    builder.push(" WHERE 1 = 1");
    if !filter.include_ignored {
        builder.push(" AND ignored = 0");
    }
    if filter.urgent_only {
        builder.push(" AND urgent = 1");
    }
    if let Some(label) = filter.label {
        builder
            .push(" AND COALESCE(manual_label, label) = ")
            .push_bind(label.as_str().to_string());
    }
    if let Some(kind) = filter.kind {
        builder.push(" AND kind = ").push_bind(kind.as_str().to_string());
    }
    if let Some(subreddit) = &filter.subreddit {
        builder
            .push(" AND LOWER(subreddit) = ")
            .push_bind(subreddit.to_lowercase());
    }
    if let Some(since) = filter.since {
        builder.push(" AND created_utc >= ").push_bind(since.timestamp());
    }
    if let Some(until) = filter.until {
        builder.push(" AND created_utc < ").push_bind(until.timestamp());
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        builder
            .push(" AND (LOWER(COALESCE(title, '')) LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR LOWER(COALESCE(body, '')) LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

/// Mention storage on a SQLite pool. The schema is created when connecting.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self, CoreError> {
        Self::connect_with(database_url, DEFAULT_MAX_CONNECTIONS).await
    }

    pub async fn connect_with(database_url: &str, max_connections: u32) -> Result<Self, CoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: format!("invalid database url {}: {}", database_url, e),
            })?
            .create_if_missing(true);

        if let Some(parent) = options
            .clone()
            .get_filename()
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("Connected to SQLite mention store at {}", database_url);
        Ok(store)
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        for statement in [CREATE_MENTIONS, CREATE_CREATED_INDEX] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| DatabaseError::MigrationFailed {
                    migration: format!("create mentions schema: {}", e),
                })?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_one(&self, id: &str) -> Result<Mention, CoreError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sql)?
            .ok_or_else(|| not_found(id))?;
        mention_from_row(&row)
    }
}

impl MentionStore for SqliteStore {
    async fn upsert_mentions(&self, mentions: &[Mention]) -> Result<usize, CoreError> {
        let mut tx = self.pool.begin().await.map_err(sql)?;
        let mut inserted = 0;

        for mention in mentions {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO mentions (
                    id, kind, subreddit, author, title, body, permalink, created_utc,
                    label, confidence, score, reasons, keywords_matched,
                    manual_label, manual_score, tagged_by, tagged_at, ignored, urgent
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&mention.id)
            .bind(mention.kind.as_str())
            .bind(&mention.subreddit)
            .bind(&mention.author)
            .bind(&mention.title)
            .bind(&mention.body)
            .bind(&mention.permalink)
            .bind(mention.created_utc.timestamp())
            .bind(mention.label.as_str())
            .bind(mention.confidence)
            .bind(mention.score as i64)
            .bind(serde_json::to_string(&mention.reasons)?)
            .bind(serde_json::to_string(&mention.keywords_matched)?)
            .bind(mention.manual.as_ref().map(|m| m.label.as_str()))
            .bind(mention.manual.as_ref().map(|m| m.score as i64))
            .bind(mention.manual.as_ref().map(|m| m.tagged_by.clone()))
            .bind(mention.manual.as_ref().map(|m| m.tagged_at.timestamp()))
            .bind(mention.ignored)
            .bind(mention.urgent)
            .execute(&mut *tx)
            .await
            .map_err(sql)?;
            inserted += result.rows_affected() as usize;
        }

        tx.commit().await.map_err(sql)?;
        debug!("Inserted {} of {} mentions", inserted, mentions.len());
        Ok(inserted)
    }

    async fn get_mention(&self, id: &str) -> Result<Mention, CoreError> {
        self.fetch_one(id).await
    }

    async fn contains(&self, id: &str) -> Result<bool, CoreError> {
        let row = sqlx::query("SELECT 1 FROM mentions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sql)?;
        Ok(row.is_some())
    }

    async fn list_mentions(&self, filter: &MentionFilter) -> Result<Vec<Mention>, CoreError> {
        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY created_utc DESC, id ASC");
        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = builder.build().fetch_all(&self.pool).await.map_err(sql)?;
        rows.iter().map(mention_from_row).collect()
    }

    async fn apply_manual_tag(&self, id: &str, tag: ManualTag) -> Result<Mention, CoreError> {
        let result = sqlx::query(
            "UPDATE mentions SET manual_label = ?, manual_score = ?, tagged_by = ?, tagged_at = ? \
             WHERE id = ?",
        )
        .bind(tag.label.as_str())
        .bind(tag.score as i64)
        .bind(&tag.tagged_by)
        .bind(tag.tagged_at.timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(sql)?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        self.fetch_one(id).await
    }

    async fn clear_manual_tag(&self, id: &str) -> Result<Mention, CoreError> {
        let result = sqlx::query(
            "UPDATE mentions SET manual_label = NULL, manual_score = NULL, tagged_by = NULL, \
             tagged_at = NULL WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(sql)?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        self.fetch_one(id).await
    }

    async fn set_flags(
        &self,
        id: &str,
        ignored: Option<bool>,
        urgent: Option<bool>,
    ) -> Result<Mention, CoreError> {
        let result = sqlx::query(
            "UPDATE mentions SET ignored = COALESCE(?, ignored), urgent = COALESCE(?, urgent) \
             WHERE id = ?",
        )
        .bind(ignored)
        .bind(urgent)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(sql)?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        self.fetch_one(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("LifeX"), "%lifex%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[tokio::test]
    async fn test_busy_database_reports_locked() {
        let path = std::env::temp_dir().join(format!(
            "test_mentionwatch_{}.db",
            uuid::Uuid::new_v4()
        ));
        let url = format!("sqlite://{}", path.display());
        let holder = SqliteStore::connect_with(&url, 1).await.unwrap();
        let mut conn = holder.pool().acquire().await.unwrap();
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .unwrap();

        let options = SqliteConnectOptions::from_str(&url)
            .unwrap()
            .busy_timeout(std::time::Duration::ZERO);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        let contender = SqliteStore { pool };

        let err = contender
            .set_flags("t3_a", Some(true), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Database(DatabaseError::DatabaseLocked)
        ));
        assert!(mentionwatch_core::ErrorExt::is_retryable(&err));

        sqlx::query("ROLLBACK").execute(&mut *conn).await.unwrap();
        drop(conn);
        contender.pool().close().await;
        holder.pool().close().await;
        std::fs::remove_file(&path).ok();
    }
}
