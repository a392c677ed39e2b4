//! The request pipeline and proxy router.
//!
//! Every inbound request binds a chain from the path, resolves one eligible
//! endpoint, consults the response cache, and on a miss performs the
//! upstream round-trip with retry. Exhausted retries cool the endpoint
//! down so the next request fails over to a sibling.

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::any,
};
use chainmgr_cache::{CachedResponse, MemoryCache, ResponseCache, cache_key, is_cacheable};
use chainmgr_chains::Registry;
use chainmgr_traits::Cache;
use chainmgr_types::ChainmgrError;
use tracing::{debug, warn};

use crate::{
    ServerError,
    metrics::{self, track_duration},
    upstream::{UpstreamClient, UpstreamResponse, is_hop_by_hop},
};

/// Marker header set on every proxied response.
const CACHE_MARKER_HEADER: &str = "x-humun-cache";
/// Request header that opts a client out of the cache.
const CACHE_OPT_OUT_HEADER: &str = "humun-cache";

/// Retry policy for upstream round-trips.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum attempts per request.
    pub max_retries: u32,
    /// Delay between attempts.
    pub retry_delay: Duration,
    /// Status codes that trigger a retry.
    pub retryable_codes: Vec<u16>,
}

/// Shared state for the proxy listener.
pub struct AppState<C: Cache = MemoryCache> {
    registry: Arc<Registry>,
    cache: Option<ResponseCache<C>>,
    upstream: UpstreamClient,
    retry: RetryConfig,
}

impl<C: Cache> AppState<C> {
    /// Assemble the pipeline state. `cache: None` disables caching
    /// entirely.
    #[must_use]
    pub const fn new(
        registry: Arc<Registry>,
        cache: Option<ResponseCache<C>>,
        upstream: UpstreamClient,
        retry: RetryConfig,
    ) -> Self {
        Self { registry, cache, upstream, retry }
    }
}

impl<C: Cache> std::fmt::Debug for AppState<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("registry", &self.registry)
            .field("cache", &self.cache.is_some())
            .field("retry", &self.retry)
            .finish()
    }
}

/// Create the proxy router.
///
/// # Endpoints
///
/// - `GET|POST /{chain}` — proxy to the selected endpoint for `chain`
/// - `GET|POST /{chain}/read` — same, preferring read-only endpoints
pub fn create_router<C: Cache>(state: Arc<AppState<C>>) -> Router {
    Router::new()
        .route("/{chain}", any(proxy_chain::<C>))
        .route("/{chain}/read", any(proxy_chain_read::<C>))
        .layer(middleware::from_fn(track_duration))
        .with_state(state)
}

async fn proxy_chain<C: Cache>(
    State(state): State<Arc<AppState<C>>>,
    Path(chain): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_proxy(&state, &chain, false, method, headers, body).await
}

async fn proxy_chain_read<C: Cache>(
    State(state): State<Arc<AppState<C>>>,
    Path(chain): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_proxy(&state, &chain, true, method, headers, body).await
}

/// Drive one request through selection, cache, retry, and emission.
async fn handle_proxy<C: Cache>(
    state: &AppState<C>,
    chain: &str,
    read_only: bool,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = if read_only { format!("/{chain}/read") } else { format!("/{chain}") };

    let endpoint = match state.registry.get_endpoint(chain, read_only) {
        Ok(endpoint) => endpoint,
        Err(error) => {
            warn!(chain, error = %error, "endpoint selection failed");
            metrics::record_http_request(&path, 500, method.as_str());
            return ServerError::Selection(error).into_response();
        }
    };
    debug!(chain, endpoint = %endpoint, read_only, "selected endpoint");

    let opted_out = headers
        .get(CACHE_OPT_OUT_HEADER)
        .is_some_and(|value| value.as_bytes() == b"false");
    let key = cache_key(chain, &method, &path, &headers, &body);

    if !opted_out {
        if let Some(cache) = &state.cache {
            if let Some(cached) = cache.lookup(&key).await {
                debug!(chain, key = %key, "cache hit");
                metrics::record_cache_hit(chain, cached.status.as_u16(), method.as_str());
                return emit(cached.status, cached.headers, cached.body, "hit");
            }
        }
    }
    debug!(chain, key = %key, "cache miss");

    let mut attempts: u32 = 0;
    let mut last_response: Option<UpstreamResponse> = None;
    let mut last_error: Option<ChainmgrError> = None;
    let mut outcome: Option<UpstreamResponse> = None;

    while attempts < state.retry.max_retries {
        if attempts > 0 {
            tokio::time::sleep(state.retry.retry_delay).await;
        }
        match state.upstream.forward(&endpoint, method.clone(), &headers, body.clone()).await {
            Err(error) => {
                warn!(endpoint = %endpoint, attempt = attempts, error = %error, "upstream round-trip failed");
                last_error = Some(error);
                last_response = None;
            }
            Ok(response) if state.retry.retryable_codes.contains(&response.status.as_u16()) => {
                debug!(endpoint = %endpoint, attempt = attempts, status = %response.status, "retryable upstream status");
                last_error = None;
                last_response = Some(response);
            }
            Ok(response) => {
                debug!(
                    endpoint = %endpoint,
                    status = %response.status,
                    bytes = response.body.len(),
                    "upstream response"
                );
                outcome = Some(response);
                break;
            }
        }
        attempts += 1;
    }

    let Some(response) = outcome else {
        warn!(chain, endpoint = %endpoint, "upstream retries exhausted");
        if let Err(error) = state.registry.cooldown(chain, &endpoint) {
            warn!(endpoint = %endpoint, error = %error, "failed to cool down endpoint");
        }
        return match (last_error, last_response) {
            (Some(error), _) => {
                metrics::record_http_request(&path, 502, method.as_str());
                ServerError::UpstreamExhausted(error.to_string()).into_response()
            }
            (None, Some(response)) => {
                emit(response.status, response.headers, response.body, "miss")
            }
            (None, None) => {
                metrics::record_http_request(&path, 502, method.as_str());
                ServerError::UpstreamExhausted("connection error. please try again".to_string())
                    .into_response()
            }
        };
    };

    if !opted_out {
        if let Some(cache) = &state.cache {
            let content_encoding = response
                .headers
                .get(header::CONTENT_ENCODING)
                .and_then(|value| value.to_str().ok());
            if is_cacheable(response.status, content_encoding, &response.body) {
                let entry = CachedResponse {
                    status: response.status,
                    headers: response.headers.clone(),
                    body: response.body.clone(),
                };
                cache.store(&key, &entry).await;
            }
        }
    }

    metrics::record_http_request(&path, response.status.as_u16(), method.as_str());
    metrics::record_cache_miss(chain, response.status.as_u16(), method.as_str());
    emit(response.status, response.headers, response.body, "miss")
}

/// Build the client-facing response, stripping hop-by-hop headers and
/// stamping the cache marker.
fn emit(status: StatusCode, headers: HeaderMap, body: Bytes, cache_marker: &str) -> Response {
    let mut builder = Response::builder().status(status);
    for (name, value) in &headers {
        if !is_hop_by_hop(name) {
            builder = builder.header(name, value);
        }
    }
    builder = builder.header(CACHE_MARKER_HEADER, cache_marker);
    builder
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
