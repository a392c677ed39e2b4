//! Process-wide chain registry.

use std::{
    path::PathBuf,
    sync::{Arc, RwLock},
    time::{Duration, SystemTime},
};

use chainmgr_config::{CONFIG_RELOAD_INTERVAL, ChainConfig};
use chainmgr_traits::NodeClient;
use chainmgr_types::ChainmgrError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{Chain, Endpoint, HttpNodeClient};

/// Creates a probe client for an endpoint URL.
pub type DialFn = dyn Fn(&str) -> Result<Arc<dyn NodeClient>, ChainmgrError> + Send + Sync;

/// Endpoint state carried across a registry reload.
struct CarriedState {
    enabled: bool,
    cooldown_until: Option<SystemTime>,
    client: Option<Arc<dyn NodeClient>>,
}

/// The ordered set of chains the proxy serves.
///
/// Read-mostly: request tasks take the read lock only long enough to clone
/// a chain handle; a reload swaps the whole list under the write lock, so
/// in-flight requests always see either the old or the new registry.
pub struct Registry {
    chains: RwLock<Vec<Arc<Chain>>>,
    cooldown_duration: Duration,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("chains", &self.chains.read().unwrap().len())
            .field("cooldown_duration", &self.cooldown_duration)
            .finish()
    }
}

impl Registry {
    /// Create an empty registry with the given endpoint cooldown duration.
    #[must_use]
    pub fn new(cooldown_duration: Duration) -> Self {
        Self { chains: RwLock::new(Vec::new()), cooldown_duration }
    }

    /// Replace the registry's chains with `configs`, carrying live state
    /// forward.
    ///
    /// For every endpoint whose URL already exists in the registry, the
    /// current `enabled`, `cooldown_until`, and probe client are kept.
    /// Enabled endpoints without a client are dialled. The swap is
    /// all-or-nothing: any failure leaves the previous registry in place.
    ///
    /// # Errors
    ///
    /// Returns [`ChainmgrError::DialFailed`] if any enabled endpoint cannot
    /// be dialled.
    pub fn apply(&self, configs: &[ChainConfig]) -> Result<(), ChainmgrError> {
        self.apply_with(configs, &default_dial)
    }

    /// [`Registry::apply`] with an injectable dialler.
    ///
    /// # Errors
    ///
    /// Returns the dialler's error if any enabled endpoint cannot be
    /// dialled.
    pub fn apply_with(&self, configs: &[ChainConfig], dial: &DialFn) -> Result<(), ChainmgrError> {
        let current = self.chains.read().unwrap().clone();

        let mut next = Vec::with_capacity(configs.len());
        for chain_config in configs {
            let mut endpoints = Vec::with_capacity(chain_config.endpoints.len());
            for endpoint_config in &chain_config.endpoints {
                let mut endpoint = Endpoint::from_config(endpoint_config);
                if let Some(carried) = carried_state(&current, &endpoint.url) {
                    endpoint.enabled = carried.enabled;
                    endpoint.cooldown_until = carried.cooldown_until;
                    endpoint.client = carried.client;
                }
                if endpoint.enabled && endpoint.client.is_none() {
                    endpoint.client = Some(dial(&endpoint.url)?);
                }
                endpoints.push(endpoint);
            }
            info!(
                chain = %chain_config.name,
                endpoints = endpoints.len(),
                "configured chain"
            );
            next.push(Arc::new(Chain::new(chain_config.name.clone(), endpoints)));
        }

        *self.chains.write().unwrap() = next;
        Ok(())
    }

    /// Select the next endpoint URL for a `(chain, read_only)` request.
    ///
    /// # Errors
    ///
    /// Returns [`ChainmgrError::NoSuchChain`] for an unknown chain, or
    /// [`ChainmgrError::NoEligible`] when the chain has no eligible
    /// endpoint.
    pub fn get_endpoint(&self, chain: &str, read_only: bool) -> Result<String, ChainmgrError> {
        self.find_chain(chain)
            .ok_or_else(|| ChainmgrError::NoSuchChain { chain: chain.to_string() })?
            .next_endpoint(read_only)
    }

    /// Put an endpoint of `chain` into cooldown.
    ///
    /// # Errors
    ///
    /// Returns [`ChainmgrError::NoSuchChain`] or
    /// [`ChainmgrError::NoSuchEndpoint`] on a lookup miss.
    pub fn cooldown(&self, chain: &str, endpoint_url: &str) -> Result<(), ChainmgrError> {
        self.find_chain(chain)
            .ok_or_else(|| ChainmgrError::NoSuchChain { chain: chain.to_string() })?
            .cooldown(endpoint_url, self.cooldown_duration)
    }

    /// Snapshot the chain handles (prober passes iterate this).
    #[must_use]
    pub fn chains(&self) -> Vec<Arc<Chain>> {
        self.chains.read().unwrap().clone()
    }

    fn find_chain(&self, name: &str) -> Option<Arc<Chain>> {
        self.chains.read().unwrap().iter().find(|chain| chain.name() == name).cloned()
    }
}

fn default_dial(url: &str) -> Result<Arc<dyn NodeClient>, ChainmgrError> {
    Ok(Arc::new(HttpNodeClient::dial(url)?))
}

fn carried_state(chains: &[Arc<Chain>], url: &str) -> Option<CarriedState> {
    for chain in chains {
        for endpoint in chain.endpoints_snapshot() {
            if endpoint.url == url {
                return Some(CarriedState {
                    enabled: endpoint.enabled,
                    cooldown_until: endpoint.cooldown_until,
                    client: endpoint.client,
                });
            }
        }
    }
    None
}

/// Spawn the config hot-reload task.
///
/// Re-reads `path` on a fixed interval and applies it to the registry. A
/// parse, validation, or dial failure is logged and the previous registry
/// stays live; the process is never left without a registry.
pub fn spawn_hot_reload(
    registry: Arc<Registry>,
    path: PathBuf,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CONFIG_RELOAD_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The initial load already happened synchronously at startup.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {
                    match chainmgr_config::load_chains(&path) {
                        Ok(configs) => match registry.apply(&configs) {
                            Ok(()) => info!(path = %path.display(), "hot reloaded chain config"),
                            Err(error) => warn!(
                                error = %error,
                                "config reload rejected, keeping previous registry"
                            ),
                        },
                        Err(error) => warn!(
                            error = %error,
                            "failed to re-read chain config, keeping previous registry"
                        ),
                    }
                }
            }
        }
    })
}
