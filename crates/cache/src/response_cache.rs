//! The response cache used by the request pipeline.

use std::time::Duration;

use bytes::Bytes;
use chainmgr_traits::Cache;
use tracing::warn;

use crate::CachedResponse;

/// Namespace prefix for all cache keys.
const KEY_PREFIX: &str = "cache:";

/// TTL'd store of encoded upstream responses over any [`Cache`] backend.
///
/// Lookup and store are best-effort: backend failures are logged and the
/// request proceeds as a miss.
#[derive(Debug)]
pub struct ResponseCache<C> {
    inner: C,
    ttl: Duration,
}

impl<C: Cache> ResponseCache<C> {
    /// Wrap a backend with the given entry TTL.
    pub const fn new(inner: C, ttl: Duration) -> Self {
        Self { inner, ttl }
    }

    /// Fetch and decode the cached response under `key`, if any.
    pub async fn lookup(&self, key: &str) -> Option<CachedResponse> {
        let namespaced = format!("{KEY_PREFIX}{key}");
        match self.inner.get(&namespaced).await {
            Ok(Some(encoded)) => match CachedResponse::decode(&encoded) {
                Ok(response) => Some(response),
                Err(error) => {
                    warn!(key, error = %error, "discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(error) => {
                warn!(key, error = %error, "cache lookup failed");
                None
            }
        }
    }

    /// Encode and store `response` under `key`.
    pub async fn store(&self, key: &str, response: &CachedResponse) {
        let namespaced = format!("{KEY_PREFIX}{key}");
        let encoded = Bytes::from(response.encode());
        if let Err(error) = self.inner.put(&namespaced, encoded, self.ttl).await {
            warn!(key, error = %error, "cache store failed");
        }
    }
}
