//! Prometheus metrics for the chainmgr proxy.
//!
//! The recorder is installed once at startup; all emission sites use bare
//! metric names and the `PROMETHEUS_NAMESPACE` prefix, when configured, is
//! applied globally by a prefix layer. The metrics listener serves the
//! exposition at `/metrics` and a liveness probe at `/statusz`.

use std::{sync::Arc, time::Instant};

use axum::{
    Router,
    extract::State,
    http::header::CONTENT_TYPE,
    response::IntoResponse,
    routing::get,
};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use metrics_util::layers::{Layer, PrefixLayer};

/// Histogram buckets for request durations, in seconds.
const DURATION_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Install the global Prometheus recorder.
///
/// `namespace` is prefixed onto every metric name when non-empty. Returns
/// the handle the metrics router renders from. Only one recorder can exist
/// per process.
///
/// # Errors
///
/// Returns an error if a recorder is already installed.
pub fn init_metrics(namespace: &str) -> eyre::Result<PrometheusHandle> {
    let builder = PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Suffix("http_server_request_duration_seconds".to_string()),
        DURATION_BUCKETS,
    )?;
    let recorder = builder.build_recorder();
    let handle = recorder.handle();

    if namespace.is_empty() {
        metrics::set_global_recorder(recorder)
            .map_err(|_| eyre::eyre!("global metrics recorder already installed"))?;
    } else {
        metrics::set_global_recorder(PrefixLayer::new(namespace).layer(recorder))
            .map_err(|_| eyre::eyre!("global metrics recorder already installed"))?;
    }

    Ok(handle)
}

/// Router for the metrics listener: `/metrics` and `/statusz`.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .route("/statusz", get(statusz))
        .with_state(Arc::new(handle))
}

async fn render_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/plain; version=0.0.4")], handle.render())
}

async fn statusz() -> &'static str {
    "ok"
}

/// Middleware recording `http_server_request_duration_seconds` for every
/// request on the proxy listener.
pub async fn track_duration(
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let start = Instant::now();
    let route = request.uri().path().to_string();
    let method = request.method().to_string();

    let response = next.run(request).await;

    histogram!(
        "http_server_request_duration_seconds",
        "route" => route,
        "method" => method,
        "status_code" => response.status().as_u16().to_string()
    )
    .record(start.elapsed().as_secs_f64());

    response
}

/// Count a proxied request by url, status code, and method.
pub(crate) fn record_http_request(url: &str, code: u16, method: &str) {
    counter!(
        "http_requests_total",
        "url" => url.to_string(),
        "code" => code.to_string(),
        "method" => method.to_string()
    )
    .increment(1);
}

/// Count a cache hit by chain, status code, and method.
pub(crate) fn record_cache_hit(chain: &str, code: u16, method: &str) {
    counter!(
        "cache_hit_total",
        "chain" => chain.to_string(),
        "code" => code.to_string(),
        "method" => method.to_string()
    )
    .increment(1);
}

/// Count a cache miss by chain, status code, and method.
pub(crate) fn record_cache_miss(chain: &str, code: u16, method: &str) {
    counter!(
        "cache_miss_total",
        "chain" => chain.to_string(),
        "code" => code.to_string(),
        "method" => method.to_string()
    )
    .increment(1);
}
