//! Upstream HTTP transport for proxied requests.

use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, Method, StatusCode, header};
use bytes::Bytes;
use chainmgr_types::ChainmgrError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Headers that must not travel across the proxy hop, either direction.
const HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::CONTENT_LENGTH,
];

/// Whether `name` is a hop-by-hop header (or framing the proxy recomputes).
pub(crate) fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name)
}

/// A buffered upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers, verbatim (`Content-Encoding` included; bodies are
    /// never decompressed in flight).
    pub headers: HeaderMap,
    /// Buffered response body.
    pub body: Bytes,
}

/// Shared HTTP client for upstream round-trips.
///
/// Endpoints routinely present self-signed or mismatched certificates, so
/// TLS verification is off. Connection reuse is disabled; a proxy cycling
/// through many upstreams gains little from idle pools and stale
/// connections turn into spurious retries. The `Host` header is derived
/// from the endpoint URL so upstream virtual hosting works.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    /// Build the shared client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new() -> Result<Self, ChainmgrError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .pool_max_idle_per_host(0)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ChainmgrError::Internal(format!("failed to build upstream client: {e}")))?;
        Ok(Self { client })
    }

    /// Perform one round-trip against `endpoint`, replaying the buffered
    /// request body.
    ///
    /// # Errors
    ///
    /// Returns [`ChainmgrError::UpstreamTransport`] on connect, send, or
    /// body-read failure. HTTP error statuses are not errors here; the
    /// retry loop decides what to do with them.
    pub async fn forward(
        &self,
        endpoint: &str,
        method: Method,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<UpstreamResponse, ChainmgrError> {
        let url: reqwest::Url = endpoint.parse().map_err(|e| ChainmgrError::UpstreamTransport {
            endpoint: endpoint.to_string(),
            message: format!("invalid endpoint url: {e}"),
        })?;

        let mut outbound = HeaderMap::new();
        for (name, value) in headers {
            if !is_hop_by_hop(name) && name != header::HOST {
                outbound.append(name, value.clone());
            }
        }

        let response = self
            .client
            .request(method, url)
            .headers(outbound)
            .body(body)
            .send()
            .await
            .map_err(|e| transport_error(endpoint, e.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(endpoint, e.to_string()))?;

        Ok(UpstreamResponse { status, headers, body })
    }
}

fn transport_error(endpoint: &str, message: String) -> ChainmgrError {
    ChainmgrError::UpstreamTransport { endpoint: endpoint.to_string(), message }
}
