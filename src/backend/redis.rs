//! Redis backend implementation.

use super::CacheBackend;
use crate::error::{Error, Result};
use deadpool_redis::{redis::AsyncCommands, Config as PoolConfig, Connection, Pool, Runtime};
use std::time::Duration;

/// Pool statistics information.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub connections: u32,
    pub idle_connections: u32,
}

/// Default Redis connection pool size.
/// Override with the `REDIS_POOL_SIZE` environment variable.
const DEFAULT_POOL_SIZE: u32 = 16;

/// Configuration for the Redis backend.
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: u32,
    pub pool_size: u32,
    pub connection_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            host: "localhost".to_string(),
            port: 6379,
            username: None,
            password: None,
            database: 0,
            pool_size: DEFAULT_POOL_SIZE,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// Build the Redis connection string.
    pub fn connection_string(&self) -> String {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => format!(
                "redis://{}:{}@{}:{}/{}",
                username, password, self.host, self.port, self.database
            ),
            (None, Some(password)) => format!(
                "redis://default:{}@{}:{}/{}",
                password, self.host, self.port, self.database
            ),
            _ => format!("redis://{}:{}/{}", self.host, self.port, self.database),
        }
    }
}

/// Redis backend with connection pooling.
///
/// TTLs are applied with millisecond precision (`PSETEX`). A zero TTL removes
/// the key rather than storing it without expiration.
///
/// # Example
///
/// ```no_run
/// # use cache_proxy::backend::{CacheBackend, RedisBackend, RedisConfig};
/// # use cache_proxy::Result;
/// # async fn example() -> Result<()> {
/// let backend = RedisBackend::new(RedisConfig::default()).await?;
///
/// backend.set("key", b"value".to_vec(), None).await?;
/// let value = backend.get("key").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl RedisBackend {
    /// Create a Redis backend from configuration.
    ///
    /// # Errors
    /// Returns `Err` if pool creation fails.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let pool = Self::create_pool(
            &config.connection_string(),
            config.pool_size,
            Some(config.connection_timeout),
        )?;

        info!("Redis backend initialized: {}:{}", config.host, config.port);

        Ok(RedisBackend { pool })
    }

    /// Create from a connection string.
    ///
    /// Pool size comes from `REDIS_POOL_SIZE` if set, otherwise 16.
    ///
    /// # Errors
    /// Returns `Err` if pool creation fails.
    pub async fn from_connection_string(conn_str: &str) -> Result<Self> {
        let pool_size = std::env::var("REDIS_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_POOL_SIZE);

        let pool = Self::create_pool(conn_str, pool_size, None)?;

        info!(
            "Redis backend initialized from connection string (pool size: {})",
            pool_size
        );

        Ok(RedisBackend { pool })
    }

    fn create_pool(conn_str: &str, pool_size: u32, timeout: Option<Duration>) -> Result<Pool> {
        if pool_size == 0 {
            return Err(Error::ConfigError(
                "Redis pool size must be at least 1".to_string(),
            ));
        }

        let mut limits = deadpool_redis::PoolConfig::new(pool_size as usize);
        limits.timeouts.wait = timeout;
        limits.timeouts.create = timeout;

        let mut cfg = PoolConfig::from_url(conn_str);
        cfg.pool = Some(limits);

        cfg.create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::ConfigError(format!("Failed to create Redis pool: {}", e)))
    }

    async fn connection(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| Error::BackendError(format!("Failed to get Redis connection: {}", e)))
    }

    /// Current pool statistics.
    pub fn pool_stats(&self) -> PoolStats {
        let status = self.pool.status();
        PoolStats {
            connections: status.size as u32,
            idle_connections: status.available as u32,
        }
    }
}

/// Expiry in whole milliseconds for `PSETEX`, or `None` for an already
/// expired entry. Sub-millisecond TTLs round up to 1ms.
fn ttl_millis(ttl: Duration) -> Option<u64> {
    if ttl.is_zero() {
        return None;
    }
    Some(ttl.as_millis().clamp(1, u64::MAX as u128) as u64)
}

impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;

        let value: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| Error::BackendError(format!("Redis GET failed for key {}: {}", key, e)))?;

        if value.is_some() {
            debug!("Redis GET {} -> HIT", key);
        } else {
            debug!("Redis GET {} -> MISS", key);
        }

        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.connection().await?;

        match ttl.map(ttl_millis) {
            Some(None) => {
                conn.del::<_, ()>(key).await.map_err(|e| {
                    Error::BackendError(format!("Redis DEL failed for key {}: {}", key, e))
                })?;
                debug!("Redis SET {} with zero TTL -> removed", key);
            }
            Some(Some(millis)) => {
                conn.pset_ex::<_, _, ()>(key, value, millis)
                    .await
                    .map_err(|e| {
                        Error::BackendError(format!("Redis PSETEX failed for key {}: {}", key, e))
                    })?;
                debug!("Redis SET {} (TTL: {}ms)", key, millis);
            }
            None => {
                conn.set::<_, _, ()>(key, value).await.map_err(|e| {
                    Error::BackendError(format!("Redis SET failed for key {}: {}", key, e))
                })?;
                debug!("Redis SET {}", key);
            }
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;

        conn.del::<_, ()>(key)
            .await
            .map_err(|e| Error::BackendError(format!("Redis DEL failed for key {}: {}", key, e)))?;

        debug!("Redis DELETE {}", key);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        let mut conn = self.connection().await?;

        let pong: String = deadpool_redis::redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis PING failed: {}", e)))?;

        Ok(pong.contains("PONG"))
    }
}
