//! # lingua-cache
//!
//! PredictionCache: a Redis-backed per-user prediction cache shared by
//! every inference service (`spec.md` §4.9).
//!
//! Key convention: `ml:pred:<service>:<endpoint>:<user_id>[:<extra>]`.
//! If Redis is unreachable at startup, the cache disables itself and
//! every operation becomes a no-op — callers always fall through to
//! computing the prediction fresh.
//!
//! ## Architecture Rules
//!
//! - Depends only on `lingua-core`.
//! - Never panics on a Redis failure; every fallible operation degrades
//!   to a no-op and logs a warning.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};

/// Default TTL for cached predictions, seconds (`spec.md` §4.9).
pub const DEFAULT_TTL_SECONDS: u64 = 3600;

/// Health snapshot returned by [`PredictionCache::health`].
#[derive(Debug, Clone, Serialize)]
pub struct CacheHealth {
    pub connected: bool,
    pub redis_url: String,
    pub error: Option<String>,
}

/// A Redis-backed prediction cache with graceful degradation.
///
/// Cheap to clone: the connection manager is an internally-reference-
/// counted handle, matching `redis`'s own `Clone` semantics.
pub struct PredictionCache {
    redis_url: String,
    client: redis::Client,
    conn: RwLock<Option<ConnectionManager>>,
    enabled: AtomicBool,
}

impl PredictionCache {
    /// Builds a cache pointed at `redis_url`. Does not connect yet — the
    /// first operation triggers a lazy connection attempt, matching the
    /// original `prediction_cache` singleton's behaviour.
    pub fn new(redis_url: impl Into<String>) -> Result<Self, redis::RedisError> {
        let redis_url = redis_url.into();
        let client = redis::Client::open(redis_url.as_str())?;
        Ok(Self {
            redis_url,
            client,
            conn: RwLock::new(None),
            enabled: AtomicBool::new(true),
        })
    }

    fn key(service: &str, endpoint: &str, user_id: &str, extra: Option<&str>) -> String {
        match extra {
            Some(extra) if !extra.is_empty() => {
                format!("ml:pred:{service}:{endpoint}:{user_id}:{extra}")
            }
            _ => format!("ml:pred:{service}:{endpoint}:{user_id}"),
        }
    }

    fn scan_pattern(user_id: &str) -> String {
        format!("ml:pred:*:*:{user_id}*")
    }

    fn service_scan_pattern(service: &str) -> String {
        format!("ml:pred:{service}:*")
    }

    /// Deletes every cache key for `pattern` via cursor-based `SCAN`,
    /// shared by [`Self::invalidate_user`] and
    /// [`Self::invalidate_service`].
    async fn scan_delete(&self, pattern: &str) -> u64 {
        let Some(mut conn) = self.connection().await else { return 0 };
        let mut deleted = 0u64;
        let mut cursor: u64 = 0;
        loop {
            let result: Result<(u64, Vec<String>), redis::RedisError> = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await;
            let (next_cursor, keys) = match result {
                Ok(pair) => pair,
                Err(err) => {
                    tracing::warn!(%pattern, error = %err, "cache scan failed");
                    break;
                }
            };
            if !keys.is_empty() {
                match conn.del::<_, u64>(&keys).await {
                    Ok(n) => deleted += n,
                    Err(err) => tracing::warn!(%pattern, error = %err, "cache scan-delete failed"),
                }
            }
            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }
        deleted
    }

    /// Returns a live connection, connecting lazily on first use.
    /// Once a connection attempt fails the cache disables itself
    /// permanently for this instance's lifetime.
    async fn connection(&self) -> Option<ConnectionManager> {
        if !self.enabled.load(Ordering::Relaxed) {
            return None;
        }
        if let Some(conn) = self.conn.read().expect("lock poisoned").as_ref() {
            return Some(conn.clone());
        }
        match self.client.get_connection_manager().await {
            Ok(conn) => {
                *self.conn.write().expect("lock poisoned") = Some(conn.clone());
                tracing::info!(redis_url = %self.redis_url, "prediction cache connected");
                Some(conn)
            }
            Err(err) => {
                tracing::warn!(error = %err, "prediction cache: redis unavailable, disabling cache");
                self.enabled.store(false, Ordering::Relaxed);
                None
            }
        }
    }

    /// Reads and deserialises a cached prediction, or `None` on a miss,
    /// a disabled cache, or a deserialisation error.
    pub async fn get<T: DeserializeOwned>(
        &self,
        service: &str,
        endpoint: &str,
        user_id: &str,
        extra: Option<&str>,
    ) -> Option<T> {
        let mut conn = self.connection().await?;
        let key = Self::key(service, endpoint, user_id, extra);
        match conn.get::<_, Option<String>>(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    tracing::debug!(%key, "cache hit");
                    Some(value)
                }
                Err(err) => {
                    tracing::warn!(%key, error = %err, "cache value failed to deserialize");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(%key, error = %err, "cache get failed");
                None
            }
        }
    }

    /// Stores `value` with the given TTL (defaults to
    /// [`DEFAULT_TTL_SECONDS`]), silently failing if the cache is
    /// disabled or the write errors.
    pub async fn set<T: Serialize + Sync>(
        &self,
        service: &str,
        endpoint: &str,
        user_id: &str,
        extra: Option<&str>,
        value: &T,
        ttl_seconds: Option<u64>,
    ) {
        let Some(mut conn) = self.connection().await else { return };
        let key = Self::key(service, endpoint, user_id, extra);
        let ttl = ttl_seconds.unwrap_or(DEFAULT_TTL_SECONDS);
        let serialized = match serde_json::to_string(value) {
            Ok(s) => s,
            Err(err) => {
                tracing::warn!(%key, error = %err, "cache value failed to serialize");
                return;
            }
        };
        if let Err(err) = conn.set_ex::<_, _, ()>(&key, serialized, ttl).await {
            tracing::warn!(%key, error = %err, "cache set failed");
        }
    }

    /// Deletes a single cache entry.
    pub async fn invalidate(&self, service: &str, endpoint: &str, user_id: &str, extra: Option<&str>) {
        let Some(mut conn) = self.connection().await else { return };
        let key = Self::key(service, endpoint, user_id, extra);
        if let Err(err) = conn.del::<_, ()>(&key).await {
            tracing::warn!(%key, error = %err, "cache invalidate failed");
        }
    }

    /// Deletes every cache key for `user_id` across all services and
    /// endpoints, via cursor-based `SCAN` (never a blocking `KEYS`).
    /// Returns the number of keys deleted. Used by ErasureCoordinator
    /// (`spec.md` §4.11).
    pub async fn invalidate_user(&self, user_id: &str) -> u64 {
        let deleted = self.scan_delete(&Self::scan_pattern(user_id)).await;
        tracing::info!(%user_id, deleted, "cache gdpr purge complete");
        deleted
    }

    /// Flushes every cached prediction for `service`, regardless of
    /// endpoint or user. RetrainScheduler calls this immediately after
    /// publishing a new artifact for that service, never before
    /// (`spec.md` §4.10, §5 "Ordering guarantees").
    pub async fn invalidate_service(&self, service: &str) -> u64 {
        let deleted = self.scan_delete(&Self::service_scan_pattern(service)).await;
        tracing::info!(%service, deleted, "cache service flush complete");
        deleted
    }

    /// Health status for health-check endpoints.
    pub async fn health(&self) -> CacheHealth {
        match self.connection().await {
            Some(mut conn) => match redis::cmd("PING").query_async::<String>(&mut conn).await {
                Ok(_) => CacheHealth {
                    connected: true,
                    redis_url: self.redis_url.clone(),
                    error: None,
                },
                Err(err) => CacheHealth {
                    connected: false,
                    redis_url: self.redis_url.clone(),
                    error: Some(err.to_string()),
                },
            },
            None => CacheHealth {
                connected: false,
                redis_url: self.redis_url.clone(),
                error: Some("redis unavailable".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_without_extra() {
        assert_eq!(
            PredictionCache::key("story", "select", "u1", None),
            "ml:pred:story:select:u1"
        );
    }

    #[test]
    fn key_with_extra() {
        assert_eq!(
            PredictionCache::key("story", "select", "u1", Some("batch-3")),
            "ml:pred:story:select:u1:batch-3"
        );
    }

    #[test]
    fn scan_pattern_matches_all_services_and_endpoints() {
        assert_eq!(PredictionCache::scan_pattern("u1"), "ml:pred:*:*:u1*");
    }

    #[test]
    fn service_scan_pattern_matches_all_endpoints_and_users() {
        assert_eq!(PredictionCache::service_scan_pattern("router"), "ml:pred:router:*");
    }

    #[tokio::test]
    async fn disabled_cache_invalidate_service_is_a_no_op() {
        let cache = PredictionCache::new("redis://127.0.0.1:1").unwrap();
        assert_eq!(cache.invalidate_service("router").await, 0);
    }

    #[tokio::test]
    async fn disabled_cache_is_a_no_op() {
        // An unreachable address disables the cache on first use; every
        // subsequent operation must degrade silently rather than panic.
        let cache = PredictionCache::new("redis://127.0.0.1:1").unwrap();
        let got: Option<serde_json::Value> = cache.get("story", "select", "u1", None).await;
        assert!(got.is_none());
        cache.set("story", "select", "u1", None, &serde_json::json!({"a": 1}), None).await;
        assert_eq!(cache.invalidate_user("u1").await, 0);
    }
}
