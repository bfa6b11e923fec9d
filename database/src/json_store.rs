use crate::{not_found, MentionFilter, MentionStore};
use mentionwatch_core::{CoreError, DatabaseError, ManualTag, Mention};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// All mentions kept in memory and mirrored to one JSON array on disk.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    mentions: RwLock<HashMap<String, Mention>>,
}

fn newest_first(mentions: &mut [Mention]) {
    mentions.sort_by(|a, b| {
        b.created_utc
            .cmp(&a.created_utc)
            .then_with(|| a.id.cmp(&b.id))
    });
}

impl JsonFileStore {
    /// A missing file is an empty store. It is created on the first write.
    pub async fn open(path: &Path) -> Result<Self, CoreError> {
        let mentions = match tokio::fs::read_to_string(path).await {
            Ok(contents) if contents.trim().is_empty() => Vec::new(),
            Ok(contents) => serde_json::from_str::<Vec<Mention>>(&contents).map_err(|e| {
                error!("Mention store {} is not valid JSON: {}", path.display(), e);
                DatabaseError::CorruptStore {
                    path: path.display().to_string(),
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No mention store at {}, starting empty", path.display());
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        debug!("Loaded {} mentions from {}", mentions.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            mentions: RwLock::new(
                mentions
                    .into_iter()
                    .map(|mention| (mention.id.clone(), mention))
                    .collect(),
            ),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes a temp file next to the store and renames it over the original.
    async fn persist(&self, mentions: &HashMap<String, Mention>) -> Result<(), CoreError> {
        let mut snapshot: Vec<Mention> = mentions.values().cloned().collect();
        newest_first(&mut snapshot);
        let contents = serde_json::to_string_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut temp_name = self.path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        tokio::fs::write(&temp_path, contents).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        debug!("Wrote {} mentions to {}", snapshot.len(), self.path.display());
        Ok(())
    }

    async fn update<F>(&self, id: &str, change: F) -> Result<Mention, CoreError>
    where
        F: FnOnce(&mut Mention),
    {
        let mut mentions = self.mentions.write().await;
        let mut updated = mentions.get(id).cloned().ok_or_else(|| not_found(id))?;
        change(&mut updated);

        let mut next = mentions.clone();
        next.insert(updated.id.clone(), updated.clone());
        self.persist(&next).await?;
        *mentions = next;
        Ok(updated)
    }
}

impl MentionStore for JsonFileStore {
    async fn upsert_mentions(&self, new_mentions: &[Mention]) -> Result<usize, CoreError> {
        let mut mentions = self.mentions.write().await;
        let mut next = mentions.clone();
        let mut inserted = 0;
        for mention in new_mentions {
            if !next.contains_key(&mention.id) {
                next.insert(mention.id.clone(), mention.clone());
                inserted += 1;
            }
        }
        if inserted > 0 {
            // Memory only changes once the file is written.
            self.persist(&next).await?;
            *mentions = next;
        }
        Ok(inserted)
    }

    async fn get_mention(&self, id: &str) -> Result<Mention, CoreError> {
        self.mentions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn contains(&self, id: &str) -> Result<bool, CoreError> {
        Ok(self.mentions.read().await.contains_key(id))
    }

    async fn list_mentions(&self, filter: &MentionFilter) -> Result<Vec<Mention>, CoreError> {
        let mut matching: Vec<Mention> = self
            .mentions
            .read()
            .await
            .values()
            .filter(|mention| filter.matches(mention))
            .cloned()
            .collect();
        newest_first(&mut matching);
        if let Some(limit) = filter.limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }

    async fn apply_manual_tag(&self, id: &str, tag: ManualTag) -> Result<Mention, CoreError> {
        self.update(id, |mention| mention.manual = Some(tag)).await
    }

    async fn clear_manual_tag(&self, id: &str) -> Result<Mention, CoreError> {
        self.update(id, |mention| mention.manual = None).await
    }

    async fn set_flags(
        &self,
        id: &str,
        ignored: Option<bool>,
        urgent: Option<bool>,
    ) -> Result<Mention, CoreError> {
        self.update(id, |mention| {
            if let Some(ignored) = ignored {
                mention.ignored = ignored;
            }
            if let Some(urgent) = urgent {
                mention.urgent = urgent;
            }
        })
        .await
    }
}
