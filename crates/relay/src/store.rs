//! Configuration store.
//!
//! [`ConfigStore`] is the seam between the pipeline and persistence. The
//! webhook path only reads (`get_repository`, `find_repositories`,
//! `get_channel_mappings`, `get_filter_config`); the remaining methods back
//! the admin API.
//!
//! [`MemoryStore`] keeps everything behind a `tokio::sync::RwLock` and can
//! mirror its state to a JSON snapshot file after every mutation.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::models::{ChannelMapping, EventType, FilterConfig, RepositoryConfig};

/// Store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// (repo name, guild) already registered
    #[error("repository {repo_name} is already configured for guild {guild_id}")]
    Duplicate { repo_name: String, guild_id: u64 },

    /// Record does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Input rejected
    #[error("invalid input: {0}")]
    Validation(String),

    /// Snapshot I/O failed
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization failed
    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Input for registering a repository.
#[derive(Debug, Clone)]
pub struct NewRepository {
    pub repo_name: String,
    pub guild_id: u64,
    pub webhook_secret: String,
    pub category_id: Option<u64>,
}

/// Partial update of a repository. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct RepositoryUpdate {
    pub webhook_secret: Option<String>,
    pub category_id: Option<u64>,
    pub enabled: Option<bool>,
}

/// Record store for repositories, channel mappings and filters.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Exact lookup on the unique (repo name, guild) pair.
    async fn get_repository(
        &self,
        repo_name: &str,
        guild_id: u64,
    ) -> Result<Option<RepositoryConfig>, StoreError>;

    /// Every guild's registration of `repo_name`.
    async fn find_repositories(&self, repo_name: &str)
        -> Result<Vec<RepositoryConfig>, StoreError>;

    /// Mappings (enabled or not) for one event type of a repository.
    async fn get_channel_mappings(
        &self,
        repo_id: u64,
        event_type: EventType,
    ) -> Result<Vec<ChannelMapping>, StoreError>;

    async fn get_filter_config(&self, repo_id: u64) -> Result<Option<FilterConfig>, StoreError>;

    async fn get_repository_by_id(&self, id: u64) -> Result<Option<RepositoryConfig>, StoreError>;

    async fn list_repositories(&self, guild_id: u64) -> Result<Vec<RepositoryConfig>, StoreError>;

    async fn create_repository(&self, input: NewRepository)
        -> Result<RepositoryConfig, StoreError>;

    async fn update_repository(
        &self,
        id: u64,
        update: RepositoryUpdate,
    ) -> Result<RepositoryConfig, StoreError>;

    /// Delete a repository along with its mappings and filter config.
    async fn delete_repository(&self, id: u64) -> Result<(), StoreError>;

    async fn list_channel_mappings(&self, repo_id: u64)
        -> Result<Vec<ChannelMapping>, StoreError>;

    /// Create or update the (repo, event type, channel) mapping.
    async fn upsert_channel_mapping(
        &self,
        repo_id: u64,
        event_type: EventType,
        channel_id: u64,
        enabled: bool,
    ) -> Result<ChannelMapping, StoreError>;

    /// Remove mappings for an event type, optionally only one channel.
    /// Returns how many were removed.
    async fn delete_channel_mappings(
        &self,
        repo_id: u64,
        event_type: EventType,
        channel_id: Option<u64>,
    ) -> Result<usize, StoreError>;

    async fn put_filter_config(
        &self,
        repo_id: u64,
        config: FilterConfig,
    ) -> Result<FilterConfig, StoreError>;

    /// Cheap liveness probe for readiness checks.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Serializable store contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    repositories: BTreeMap<u64, RepositoryConfig>,
    #[serde(default)]
    channels: BTreeMap<u64, ChannelMapping>,
    #[serde(default)]
    filters: BTreeMap<u64, FilterConfig>,
}

impl StoreState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn require_repository(&self, id: u64) -> Result<&RepositoryConfig, StoreError> {
        self.repositories
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("repository {id}")))
    }
}

/// In-memory store with optional JSON snapshot persistence.
pub struct MemoryStore {
    state: RwLock<StoreState>,
    path: Option<PathBuf>,
    /// Serializes snapshot writes so they land in mutation order.
    persist: Mutex<()>,
}

impl MemoryStore {
    /// Memory-only store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            path: None,
            persist: Mutex::new(()),
        }
    }

    /// Store backed by a snapshot file. A missing file starts empty.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let state: StoreState = serde_json::from_slice(&bytes)?;
                info!(
                    path = %path.display(),
                    repositories = state.repositories.len(),
                    channels = state.channels.len(),
                    "Loaded configuration snapshot"
                );
                state
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No snapshot found, starting empty");
                StoreState::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            state: RwLock::new(state),
            path: Some(path),
            persist: Mutex::new(()),
        })
    }

    /// Apply a mutation and, if file-backed, write the resulting snapshot.
    ///
    /// The mutation runs on a staged copy. Live state is replaced only once
    /// the snapshot has been written, so a failed write leaves it untouched.
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut StoreState) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _persist = self.persist.lock().await;

        let mut staged = self.state.read().await.clone();
        let result = f(&mut staged)?;

        if let Some(path) = &self.path {
            let bytes = serde_json::to_vec_pretty(&staged)?;
            if let Err(e) = write_snapshot(path, &bytes).await {
                error!(path = %path.display(), error = %e, "Failed to write snapshot");
                return Err(e);
            }
            debug!(path = %path.display(), bytes = bytes.len(), "Snapshot written");
        }

        *self.state.write().await = staged;
        Ok(result)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

async fn write_snapshot(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get_repository(
        &self,
        repo_name: &str,
        guild_id: u64,
    ) -> Result<Option<RepositoryConfig>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .repositories
            .values()
            .find(|r| r.repo_name == repo_name && r.guild_id == guild_id)
            .cloned())
    }

    async fn find_repositories(
        &self,
        repo_name: &str,
    ) -> Result<Vec<RepositoryConfig>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .repositories
            .values()
            .filter(|r| r.repo_name == repo_name)
            .cloned()
            .collect())
    }

    async fn get_channel_mappings(
        &self,
        repo_id: u64,
        event_type: EventType,
    ) -> Result<Vec<ChannelMapping>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .channels
            .values()
            .filter(|c| c.repo_id == repo_id && c.event_type == event_type)
            .cloned()
            .collect())
    }

    async fn get_filter_config(&self, repo_id: u64) -> Result<Option<FilterConfig>, StoreError> {
        Ok(self.state.read().await.filters.get(&repo_id).cloned())
    }

    async fn get_repository_by_id(&self, id: u64) -> Result<Option<RepositoryConfig>, StoreError> {
        Ok(self.state.read().await.repositories.get(&id).cloned())
    }

    async fn list_repositories(&self, guild_id: u64) -> Result<Vec<RepositoryConfig>, StoreError> {
        let state = self.state.read().await;
        let mut repos: Vec<_> = state
            .repositories
            .values()
            .filter(|r| r.guild_id == guild_id)
            .cloned()
            .collect();
        repos.sort_by(|a, b| a.repo_name.cmp(&b.repo_name));
        Ok(repos)
    }

    async fn create_repository(
        &self,
        input: NewRepository,
    ) -> Result<RepositoryConfig, StoreError> {
        let repo_name = input.repo_name.trim().to_string();
        if repo_name.is_empty() {
            return Err(StoreError::Validation("repository name is empty".into()));
        }
        if input.webhook_secret.is_empty() {
            return Err(StoreError::Validation("webhook secret is empty".into()));
        }

        self.mutate(|state| {
            if state
                .repositories
                .values()
                .any(|r| r.repo_name == repo_name && r.guild_id == input.guild_id)
            {
                return Err(StoreError::Duplicate {
                    repo_name,
                    guild_id: input.guild_id,
                });
            }

            let now = Utc::now();
            let repo = RepositoryConfig {
                id: state.allocate_id(),
                repo_name,
                guild_id: input.guild_id,
                webhook_secret: input.webhook_secret,
                category_id: input.category_id,
                enabled: true,
                created_at: now,
                updated_at: now,
            };
            state.repositories.insert(repo.id, repo.clone());
            Ok(repo)
        })
        .await
    }

    async fn update_repository(
        &self,
        id: u64,
        update: RepositoryUpdate,
    ) -> Result<RepositoryConfig, StoreError> {
        if update.webhook_secret.as_deref() == Some("") {
            return Err(StoreError::Validation("webhook secret is empty".into()));
        }

        self.mutate(|state| {
            let repo = state
                .repositories
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("repository {id}")))?;

            let mut changed = false;
            if let Some(secret) = update.webhook_secret {
                repo.webhook_secret = secret;
                changed = true;
            }
            if let Some(category_id) = update.category_id {
                repo.category_id = Some(category_id);
                changed = true;
            }
            if let Some(enabled) = update.enabled {
                repo.enabled = enabled;
                changed = true;
            }
            if changed {
                repo.updated_at = Utc::now();
            }
            Ok(repo.clone())
        })
        .await
    }

    async fn delete_repository(&self, id: u64) -> Result<(), StoreError> {
        self.mutate(|state| {
            state
                .repositories
                .remove(&id)
                .ok_or_else(|| StoreError::NotFound(format!("repository {id}")))?;
            state.channels.retain(|_, c| c.repo_id != id);
            state.filters.remove(&id);
            Ok(())
        })
        .await
    }

    async fn list_channel_mappings(
        &self,
        repo_id: u64,
    ) -> Result<Vec<ChannelMapping>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .channels
            .values()
            .filter(|c| c.repo_id == repo_id)
            .cloned()
            .collect())
    }

    async fn upsert_channel_mapping(
        &self,
        repo_id: u64,
        event_type: EventType,
        channel_id: u64,
        enabled: bool,
    ) -> Result<ChannelMapping, StoreError> {
        self.mutate(|state| {
            state.require_repository(repo_id)?;

            if let Some(existing) = state.channels.values_mut().find(|c| {
                c.repo_id == repo_id && c.event_type == event_type && c.channel_id == channel_id
            }) {
                existing.enabled = enabled;
                return Ok(existing.clone());
            }

            let mapping = ChannelMapping {
                id: state.allocate_id(),
                repo_id,
                event_type,
                channel_id,
                enabled,
                created_at: Utc::now(),
            };
            state.channels.insert(mapping.id, mapping.clone());
            Ok(mapping)
        })
        .await
    }

    async fn delete_channel_mappings(
        &self,
        repo_id: u64,
        event_type: EventType,
        channel_id: Option<u64>,
    ) -> Result<usize, StoreError> {
        self.mutate(|state| {
            state.require_repository(repo_id)?;
            let before = state.channels.len();
            state.channels.retain(|_, c| {
                !(c.repo_id == repo_id
                    && c.event_type == event_type
                    && channel_id.map_or(true, |id| id == c.channel_id))
            });
            Ok(before - state.channels.len())
        })
        .await
    }

    async fn put_filter_config(
        &self,
        repo_id: u64,
        config: FilterConfig,
    ) -> Result<FilterConfig, StoreError> {
        self.mutate(|state| {
            state.require_repository(repo_id)?;
            state.filters.insert(repo_id, config.clone());
            Ok(config)
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let _state = self.state.read().await;
        Ok(())
    }
}
