//! Gauge helpers for registry and prober state.

use metrics::gauge;

/// Set the `endpoint_enabled` gauge (1 enabled, 0 disabled).
pub(crate) fn record_endpoint_enabled(chain: &str, endpoint: &str, enabled: bool) {
    gauge!(
        "endpoint_enabled",
        "chain" => chain.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .set(if enabled { 1.0 } else { 0.0 });
}

/// Set the `endpoint_block_head` gauge to the endpoint's observed head.
pub(crate) fn record_endpoint_block_head(chain: &str, endpoint: &str, block_head: u64) {
    gauge!(
        "endpoint_block_head",
        "chain" => chain.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .set(block_head as f64);
}

/// Set the `cooldown_until` gauge to a unix timestamp, or 0 when cleared.
pub(crate) fn record_cooldown_until(endpoint: &str, unix_seconds: u64) {
    gauge!("cooldown_until", "endpoint" => endpoint.to_string()).set(unix_seconds as f64);
}
