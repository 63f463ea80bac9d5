use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, StorageBackend};
use crate::errors::{ProgressError, ProgressResult};
use crate::storage::{ContentSeed, MemoryStore, MongoStore, ProgressStore};

use cache::{DashboardCache, InvalidationEpoch, MemoryDashboardCache, RedisDashboardCache};

pub mod cache;
pub mod completion_service;
pub mod content_service;
pub mod dashboard_service;
pub mod enrollment_service;
pub mod progress_rules;
pub mod quiz_grader;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ProgressStore>,
    pub cache: Arc<dyn DashboardCache>,
    pub dashboard_epoch: Arc<InvalidationEpoch>,
}

impl AppState {
    /// Connects the configured storage backend and dashboard cache.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn ProgressStore> = match config.storage_backend {
            StorageBackend::Mongo => {
                let uri = config
                    .mongo_uri
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("mongo_uri is required for the mongo backend"))?;
                Arc::new(MongoStore::connect(uri, &config.mongo_database).await?)
            }
            StorageBackend::Memory => {
                let seed = match &config.content_seed_path {
                    Some(path) => ContentSeed::from_path(path)?,
                    None => ContentSeed::default(),
                };
                tracing::warn!(
                    "Using in-memory storage ({} challenges, {} tasks); state is lost on restart",
                    seed.challenges.len(),
                    seed.tasks.len()
                );
                Arc::new(MemoryStore::with_seed(seed).await)
            }
        };

        let ttl = config.dashboard_cache_ttl();
        let cache: Arc<dyn DashboardCache> = match &config.redis_uri {
            Some(uri) => Arc::new(RedisDashboardCache::connect(uri, ttl).await?),
            None => Arc::new(MemoryDashboardCache::new(ttl)),
        };

        Ok(Self::from_parts(config, store, cache))
    }

    pub fn from_parts(
        config: Config,
        store: Arc<dyn ProgressStore>,
        cache: Arc<dyn DashboardCache>,
    ) -> Self {
        Self {
            config,
            store,
            cache,
            dashboard_epoch: Arc::new(InvalidationEpoch::default()),
        }
    }
}

/// Shared handles every engine service works with
#[derive(Clone)]
pub struct EngineContext {
    pub store: Arc<dyn ProgressStore>,
    pub cache: Arc<dyn DashboardCache>,
    pub dashboard_epoch: Arc<InvalidationEpoch>,
    pub storage_timeout: Duration,
}

impl EngineContext {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            cache: state.cache.clone(),
            dashboard_epoch: state.dashboard_epoch.clone(),
            storage_timeout: state.config.storage_timeout(),
        }
    }

    /// Runs one storage call under the configured deadline. Failures and
    /// timeouts both surface as `StorageUnavailable`.
    pub async fn storage<T, F>(&self, operation: &'static str, fut: F) -> ProgressResult<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.storage_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::error!("Storage operation {} failed: {:#}", operation, e);
                Err(ProgressError::StorageUnavailable(e))
            }
            Err(_) => {
                tracing::error!(
                    "Storage operation {} timed out after {:?}",
                    operation,
                    self.storage_timeout
                );
                Err(ProgressError::StorageUnavailable(anyhow::anyhow!(
                    "{} timed out after {:?}",
                    operation,
                    self.storage_timeout
                )))
            }
        }
    }

    /// Cache failures are logged and otherwise ignored
    pub async fn invalidate_dashboard(&self, user_id: &str) {
        self.dashboard_epoch.bump();
        if let Err(e) = self.cache.invalidate(user_id).await {
            tracing::warn!("Failed to invalidate dashboard for {}: {:#}", user_id, e);
        }
    }
}
