use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::RwLock;

use crate::metrics::track_cache_operation;
use crate::models::dashboard::DashboardSummary;

/// Short-lived cache of dashboard summaries, keyed by user.
///
/// Owned by `AppState`; writers invalidate a user's entry after changing
/// that user's progress.
#[async_trait]
pub trait DashboardCache: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<DashboardSummary>>;

    async fn put(&self, user_id: &str, summary: &DashboardSummary) -> Result<()>;

    async fn invalidate(&self, user_id: &str) -> Result<()>;

    async fn ping(&self) -> Result<()>;

    /// Drop every entry. Called on shutdown.
    async fn clear(&self) -> Result<()> {
        Ok(())
    }
}

/// Process-wide count of dashboard invalidations. A summary computed while
/// the count moved is not left in the cache.
#[derive(Debug, Default)]
pub struct InvalidationEpoch(AtomicU64);

impl InvalidationEpoch {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn cache_key(user_id: &str) -> String {
    format!("dashboard:{}", user_id)
}

pub struct RedisDashboardCache {
    redis: ConnectionManager,
    ttl: Duration,
}

impl RedisDashboardCache {
    pub async fn connect(uri: &str, ttl: Duration) -> Result<Self> {
        let client = redis::Client::open(uri).context("Failed to create Redis client")?;

        tracing::info!("Attempting to connect to Redis...");
        let redis = tokio::time::timeout(Duration::from_secs(30), ConnectionManager::new(client))
            .await
            .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        let cache = Self { redis, ttl };
        tokio::time::timeout(Duration::from_secs(5), cache.ping())
            .await
            .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");
        Ok(cache)
    }
}

#[async_trait]
impl DashboardCache for RedisDashboardCache {
    async fn get(&self, user_id: &str) -> Result<Option<DashboardSummary>> {
        let mut conn = self.redis.clone();
        let cached: Option<String> = track_cache_operation("get", async {
            redis::cmd("GET")
                .arg(cache_key(user_id))
                .query_async::<Option<String>>(&mut conn)
                .await
                .context("Failed to read dashboard cache")
        })
        .await?;

        cached
            .map(|json| {
                serde_json::from_str(&json).context("Failed to deserialize cached dashboard")
            })
            .transpose()
    }

    async fn put(&self, user_id: &str, summary: &DashboardSummary) -> Result<()> {
        let mut conn = self.redis.clone();
        let json = serde_json::to_string(summary).context("Failed to serialize dashboard")?;

        track_cache_operation("setex", async {
            redis::cmd("SETEX")
                .arg(cache_key(user_id))
                .arg(self.ttl.as_secs().max(1))
                .arg(json)
                .query_async::<()>(&mut conn)
                .await
                .context("Failed to write dashboard cache")
        })
        .await
    }

    async fn invalidate(&self, user_id: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        track_cache_operation("del", async {
            redis::cmd("DEL")
                .arg(cache_key(user_id))
                .query_async::<()>(&mut conn)
                .await
                .context("Failed to invalidate dashboard cache")
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.redis.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .context("Redis PING failed")?;
        Ok(())
    }
}

/// In-process TTL map used when no Redis is configured
pub struct MemoryDashboardCache {
    entries: RwLock<HashMap<String, (Instant, DashboardSummary)>>,
    ttl: Duration,
}

impl MemoryDashboardCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl DashboardCache for MemoryDashboardCache {
    async fn get(&self, user_id: &str) -> Result<Option<DashboardSummary>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&cache_key(user_id))
            .filter(|(stored_at, _)| stored_at.elapsed() < self.ttl)
            .map(|(_, summary)| summary.clone()))
    }

    async fn put(&self, user_id: &str, summary: &DashboardSummary) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() < self.ttl);
        entries.insert(cache_key(user_id), (Instant::now(), summary.clone()));
        Ok(())
    }

    async fn invalidate(&self, user_id: &str) -> Result<()> {
        self.entries.write().await.remove(&cache_key(user_id));
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(streak: u32) -> DashboardSummary {
        DashboardSummary {
            current_streak: streak,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn memory_cache_round_trip_and_invalidate() {
        let cache = MemoryDashboardCache::new(Duration::from_secs(60));
        cache.put("u1", &summary(3)).await.unwrap();

        assert_eq!(cache.get("u1").await.unwrap(), Some(summary(3)));
        assert_eq!(cache.get("u2").await.unwrap(), None);

        cache.invalidate("u1").await.unwrap();
        assert_eq!(cache.get("u1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_cache_entries_expire() {
        let cache = MemoryDashboardCache::new(Duration::from_millis(10));
        cache.put("u1", &summary(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;

        assert_eq!(cache.get("u1").await.unwrap(), None);

        // Expired entries are swept on the next write
        cache.put("u2", &summary(2)).await.unwrap();
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let cache = MemoryDashboardCache::new(Duration::from_secs(60));
        cache.put("u1", &summary(1)).await.unwrap();
        cache.put("u2", &summary(2)).await.unwrap();

        cache.clear().await.unwrap();
        assert_eq!(cache.len().await, 0);
    }
}
