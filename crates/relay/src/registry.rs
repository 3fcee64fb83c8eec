//! Repository registry: resolves inbound webhooks to a guild's configuration.

use std::sync::Arc;
use thiserror::Error;

use crate::models::RepositoryConfig;
use crate::store::{ConfigStore, StoreError};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("repository {repo_name} is not configured")]
    NotFound { repo_name: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Read-side view over the config store.
#[derive(Clone)]
pub struct Registry {
    store: Arc<dyn ConfigStore>,
}

impl Registry {
    #[must_use]
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    /// Exact lookup on (repo name, guild).
    pub async fn resolve(
        &self,
        repo_name: &str,
        guild_id: u64,
    ) -> Result<RepositoryConfig, RegistryError> {
        self.store
            .get_repository(repo_name, guild_id)
            .await?
            .ok_or_else(|| RegistryError::NotFound {
                repo_name: repo_name.to_string(),
            })
    }

    /// All guilds' registrations of a repository, used when the request
    /// does not name its guild. Empty when the repository is unknown.
    pub async fn candidates(&self, repo_name: &str) -> Result<Vec<RepositoryConfig>, RegistryError> {
        Ok(self.store.find_repositories(repo_name).await?)
    }

    /// Disabled repositories accept no deliveries.
    #[must_use]
    pub const fn is_enabled(config: &RepositoryConfig) -> bool {
        config.enabled
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }
}
