//! Redis-based cache for keyword and direct search results.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `REDIS_ENABLED`: Set to "false" to disable caching (default: true)
//! - `REDIS_URL`: Redis connection URL (default: redis://localhost:6379)
//! - `REDIS_CACHE_TTL`: Cache TTL in seconds (default: 300)

use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use civic_core::{defaults, ContentType};

const KEY_PREFIX: &str = "civic:search:";

/// Search cache backed by Redis. Every operation is a no-op when Redis is
/// disabled or unreachable.
#[derive(Clone)]
pub struct SearchCache {
    inner: Arc<SearchCacheInner>,
}

struct SearchCacheInner {
    /// Redis connection manager (None if disabled).
    connection: RwLock<Option<ConnectionManager>>,
    ttl_seconds: u64,
    enabled: bool,
}

impl SearchCache {
    /// Create a search cache from environment configuration.
    pub async fn from_env() -> Self {
        let enabled = std::env::var("REDIS_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let ttl_seconds: u64 = std::env::var("REDIS_CACHE_TTL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::SEARCH_CACHE_TTL_SECS);

        let connection = if enabled {
            match redis::Client::open(redis_url.as_str()) {
                Ok(client) => match ConnectionManager::new(client).await {
                    Ok(conn) => {
                        info!(ttl_seconds, "Redis search cache enabled");
                        Some(conn)
                    }
                    Err(e) => {
                        warn!("Failed to connect to Redis, cache disabled: {}", e);
                        None
                    }
                },
                Err(e) => {
                    warn!("Invalid Redis URL, cache disabled: {}", e);
                    None
                }
            }
        } else {
            info!("Redis search cache disabled via REDIS_ENABLED=false");
            None
        };

        Self {
            inner: Arc::new(SearchCacheInner {
                connection: RwLock::new(connection),
                ttl_seconds,
                enabled,
            }),
        }
    }

    /// Create a disabled cache (for testing or when Redis is unavailable).
    pub fn disabled() -> Self {
        Self {
            inner: Arc::new(SearchCacheInner {
                connection: RwLock::new(None),
                ttl_seconds: defaults::SEARCH_CACHE_TTL_SECS,
                enabled: false,
            }),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.enabled && self.inner.connection.read().await.is_some()
    }

    /// Key for a search. `None` content type means the all-types keyword
    /// search.
    pub fn cache_key(&self, query: &str, content_type: Option<ContentType>, limit: usize) -> String {
        let mut hasher = Sha256::new();
        hasher.update(query.to_lowercase().trim().as_bytes());
        hasher.update([0u8]);
        hasher.update(content_type.map_or("all", |ct| ct.as_str()).as_bytes());
        hasher.update(limit.to_le_bytes());

        let hash = hex::encode(hasher.finalize());
        format!("{}{}", KEY_PREFIX, &hash[..16])
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn_guard = self.inner.connection.write().await;
        let conn = conn_guard.as_mut()?;

        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(data)) => match serde_json::from_str(&data) {
                Ok(result) => {
                    debug!("Cache HIT: {}", key);
                    Some(result)
                }
                Err(e) => {
                    warn!("Cache deserialization error: {}", e);
                    None
                }
            },
            Ok(None) => {
                debug!("Cache MISS: {}", key);
                None
            }
            Err(e) => {
                error!("Redis GET error: {}", e);
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> bool {
        let mut conn_guard = self.inner.connection.write().await;
        let Some(conn) = conn_guard.as_mut() else {
            return false;
        };

        let serialized = match serde_json::to_string(value) {
            Ok(s) => s,
            Err(e) => {
                error!("Cache serialization error: {}", e);
                return false;
            }
        };

        match conn
            .set_ex::<_, _, ()>(key, serialized, self.inner.ttl_seconds)
            .await
        {
            Ok(_) => {
                debug!("Cache SET: {} (TTL: {}s)", key, self.inner.ttl_seconds);
                true
            }
            Err(e) => {
                error!("Redis SET error: {}", e);
                false
            }
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.inner.ttl_seconds)
    }
}
