//! Cache trait for response caching backends.

use std::{future::Future, time::Duration};

use bytes::Bytes;
use derive_more::{Display, Error};

/// Error from a cache backend.
#[derive(Debug, Display, Error)]
#[display("cache error: {_0}")]
pub struct CacheError(#[error(not(source))] pub String);

/// A key/value store with per-entry TTL.
///
/// Implementations must be cheap to share across request tasks. Backend
/// failures are surfaced as [`CacheError`] and treated as misses by
/// callers; they never fail a request.
pub trait Cache: Send + Sync + 'static {
    /// Get a value by key. `Ok(None)` on miss.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Bytes>, CacheError>> + Send;

    /// Store a value under `key`, expiring after `ttl`.
    fn put(
        &self,
        key: &str,
        value: Bytes,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), CacheError>> + Send;

    /// Remove a key.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), CacheError>> + Send;
}
