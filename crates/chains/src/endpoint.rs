//! Endpoint state.

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use chainmgr_config::EndpointConfig;
use chainmgr_traits::NodeClient;
use derive_more::Debug;

/// One addressable upstream of a chain.
///
/// Mutable fields (`enabled`, `cooldown_until`, `block_head`, `client`) are
/// written by the prober and the selector under the owning chain's lock.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Upstream URL; unique within a chain.
    pub url: String,
    /// Whether the endpoint may be selected.
    pub enabled: bool,
    /// Fallback-of-last-resort, skipped while any primary is eligible.
    pub failover: bool,
    /// Serves read queries only; preferred for `/read` routes.
    pub read_only: bool,
    /// Wall-clock time the endpoint stays disabled until; `None` means no
    /// cooldown.
    pub cooldown_until: Option<SystemTime>,
    /// Last observed latest block number.
    pub block_head: u64,
    /// Probe transport, created when the endpoint is enabled and carried
    /// across registry reloads.
    #[debug(skip)]
    pub client: Option<Arc<dyn NodeClient>>,
}

impl Endpoint {
    /// Build an endpoint from its config entry, with no client attached.
    #[must_use]
    pub fn from_config(config: &EndpointConfig) -> Self {
        Self {
            url: config.endpoint.clone(),
            enabled: config.enabled,
            failover: config.failover,
            read_only: config.read_only,
            cooldown_until: None,
            block_head: 0,
            client: None,
        }
    }

    /// Whether the cooldown has elapsed at `now`. An endpoint with no
    /// cooldown counts as elapsed, matching the selector's expiry sweep.
    pub(crate) fn cooldown_elapsed(&self, now: SystemTime) -> bool {
        self.cooldown_until.map_or(true, |until| now > until)
    }

    /// The cooldown deadline as unix seconds, or 0 when cleared.
    pub(crate) fn cooldown_unix(&self) -> u64 {
        self.cooldown_until
            .and_then(|until| until.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |since_epoch| since_epoch.as_secs())
    }
}
