//! Background health prober.
//!
//! Periodically walks the registry and refreshes each endpoint's block
//! head, driving endpoints into cooldown when their node stops answering.

use std::{sync::Arc, time::Duration};

use chainmgr_types::ChainmgrError;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{Chain, Registry, metrics};

/// Periodic block-head updater for every chain in the registry.
#[derive(Debug)]
pub struct HealthProber {
    registry: Arc<Registry>,
    interval: Duration,
    workers: usize,
}

impl HealthProber {
    /// Create a prober over `registry`, running one update pass every
    /// `interval` with at most `workers` chains probed concurrently.
    #[must_use]
    pub fn new(registry: Arc<Registry>, interval: Duration, workers: usize) -> Self {
        Self { registry, interval, workers }
    }

    /// Run the prober until `cancel` fires.
    ///
    /// The first interval tick is consumed immediately: the startup pass is
    /// triggered separately by the initial config load.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => self.update_pass().await,
            }
        }
    }

    /// Run one update pass over all chains, bounded by the worker count.
    pub async fn update_pass(&self) {
        let chains = self.registry.chains();
        debug!(chains = chains.len(), "updating chain block heads");
        futures::stream::iter(chains)
            .for_each_concurrent(self.workers, |chain| async move {
                if let Err(error) = self.probe_chain(&chain).await {
                    warn!(chain = %chain.name(), error = %error, "block head update failed");
                }
            })
            .await;
    }

    /// Probe every endpoint of one chain.
    ///
    /// The first failing endpoint is cooled down and ends this chain's
    /// pass; other chains are unaffected. Disabled endpoints are not
    /// probed, since re-enablement is driven by cooldown expiry at
    /// selection time.
    async fn probe_chain(&self, chain: &Arc<Chain>) -> Result<(), ChainmgrError> {
        for target in chain.probe_targets() {
            let Some(client) = target.client else {
                chain.disable_endpoint(&target.url);
                metrics::record_endpoint_enabled(chain.name(), &target.url, false);
                continue;
            };
            if !target.enabled {
                metrics::record_endpoint_enabled(chain.name(), &target.url, false);
                continue;
            }

            match client.block_number().await {
                Err(error) => {
                    if let Err(cooldown_error) = self.registry.cooldown(chain.name(), &target.url)
                    {
                        warn!(
                            endpoint = %target.url,
                            error = %cooldown_error,
                            "failed to cool down endpoint"
                        );
                    }
                    return Err(error);
                }
                Ok(head) => {
                    if let Some(report) = chain.record_block_head(&target.url, head) {
                        metrics::record_endpoint_block_head(
                            chain.name(),
                            &target.url,
                            report.block_head,
                        );
                        metrics::record_endpoint_enabled(chain.name(), &target.url, true);
                        metrics::record_cooldown_until(&target.url, report.cooldown_unix);
                    }
                }
            }
        }
        Ok(())
    }
}
