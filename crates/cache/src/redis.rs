//! Redis cache backend.

use std::time::Duration;

use bytes::Bytes;
use chainmgr_traits::{Cache, CacheError};
use redis::{AsyncCommands, Client};

/// Redis-backed cache with TTL via `SET ... EX`.
#[derive(Debug, Clone)]
pub struct RedisCache {
    client: Client,
}

impl RedisCache {
    /// Create a cache over the Redis instance at `url`
    /// (e.g. `redis://cache.internal:6379`).
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] if the URL is invalid.
    pub fn new(url: &str) -> Result<Self, CacheError> {
        let client =
            Client::open(url).map_err(|e| CacheError(format!("failed to create client: {e}")))?;
        Ok(Self { client })
    }

    /// Verify connectivity with a PING. Run once at startup so a
    /// misconfigured cache fails the boot, not the first request.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] if the server cannot be reached.
    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut connection = self.connection().await?;
        let _: () = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(|e| CacheError(format!("ping failed: {e}")))?;
        Ok(())
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, CacheError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError(format!("connection error: {e}")))
    }
}

impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let mut connection = self.connection().await?;
        let value: Option<Vec<u8>> =
            connection.get(key).await.map_err(|e| CacheError(format!("get error: {e}")))?;
        Ok(value.map(Bytes::from))
    }

    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let mut connection = self.connection().await?;
        let ttl_secs = ttl.as_secs().max(1);
        connection
            .set_ex::<_, _, ()>(key, value.as_ref(), ttl_secs)
            .await
            .map_err(|e| CacheError(format!("put error: {e}")))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut connection = self.connection().await?;
        connection.del::<_, ()>(key).await.map_err(|e| CacheError(format!("delete error: {e}")))
    }
}
