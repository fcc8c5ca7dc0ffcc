//! Pluggable recommendation cache.
//!
//! Ranking correctness never depends on the cache; it only trades
//! freshness for latency, so every failure path degrades to a miss. The
//! default backend is a no-op.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::RankedArticle;

#[async_trait]
pub trait RecommendationCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<RankedArticle>>;
    async fn put(&self, key: &str, page: &[RankedArticle], ttl_secs: u64);
}

/// Cache key for one feed request shape.
pub fn cache_key(
    user_id: Uuid,
    limit: usize,
    diversify: bool,
    content_type: &str,
    cursor: Option<&str>,
    force_fresh: bool,
) -> String {
    format!(
        "feed:{}:{}:{}:{}:{}:{}",
        user_id,
        limit,
        diversify,
        content_type,
        cursor.unwrap_or("-"),
        force_fresh
    )
}

/// Default backend: every lookup misses.
pub struct NoopCache;

#[async_trait]
impl RecommendationCache for NoopCache {
    async fn get(&self, _key: &str) -> Option<Vec<RankedArticle>> {
        None
    }

    async fn put(&self, _key: &str, _page: &[RankedArticle], _ttl_secs: u64) {}
}

pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl RecommendationCache for RedisCache {
    async fn get(&self, key: &str) -> Option<Vec<RankedArticle>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = match conn.get(key).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key, error = %err, "cache read failed, treating as miss");
                return None;
            }
        };

        let raw = raw?;
        match serde_json::from_str(&raw) {
            Ok(page) => {
                debug!(key, "cache hit");
                Some(page)
            }
            Err(err) => {
                warn!(key, error = %err, "cached payload unreadable, treating as miss");
                None
            }
        }
    }

    async fn put(&self, key: &str, page: &[RankedArticle], ttl_secs: u64) {
        let payload = match serde_json::to_string(page) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(key, error = %err, "failed to serialize page for caching");
                return;
            }
        };

        let mut conn = self.conn.clone();
        if let Err(err) = conn.set_ex::<_, _, ()>(key, payload, ttl_secs).await {
            warn!(key, error = %err, "cache write failed");
        }
    }
}
