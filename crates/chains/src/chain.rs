//! A chain and its endpoint selection policy.

use std::{
    sync::{
        Arc, RwLock,
        atomic::{AtomicU32, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use chainmgr_traits::NodeClient;
use chainmgr_types::ChainmgrError;

use crate::{Endpoint, metrics};

/// A selection candidate produced by the eligibility pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Endpoint URL.
    pub url: String,
    /// Whether the endpoint serves read queries only.
    pub read_only: bool,
}

impl From<&Endpoint> for Candidate {
    fn from(endpoint: &Endpoint) -> Self {
        Self { url: endpoint.url.clone(), read_only: endpoint.read_only }
    }
}

/// Probe view of one endpoint, snapshotted so the prober never holds the
/// endpoint lock across an RPC.
pub(crate) struct ProbeTarget {
    pub url: String,
    pub enabled: bool,
    pub client: Option<Arc<dyn NodeClient>>,
}

/// Result of recording a probed block head, for gauge emission.
pub(crate) struct HeadReport {
    pub block_head: u64,
    pub cooldown_unix: u64,
}

/// A named group of interchangeable upstream endpoints.
///
/// Endpoint state lives behind a per-chain read-write lock; the round-robin
/// cursor is a separate atomic so concurrent selections stay strictly
/// rotating without serialising on the lock.
#[derive(Debug)]
pub struct Chain {
    name: String,
    next: AtomicU32,
    endpoints: RwLock<Vec<Endpoint>>,
}

impl Chain {
    /// Create a chain from its endpoints, in selection order.
    #[must_use]
    pub fn new(name: String, endpoints: Vec<Endpoint>) -> Self {
        Self { name, next: AtomicU32::new(0), endpoints: RwLock::new(endpoints) }
    }

    /// The chain's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Produce the ordered candidate list for selection.
    ///
    /// Runs the cooldown expiry sweep, then partitions endpoints into
    /// enabled-with-client and failover sets. Falls back to failover
    /// endpoints when no primary is eligible, or to the chain's single
    /// endpoint as an emergency degrade. Otherwise keeps only endpoints
    /// whose block head equals the highest observed head, so laggards are
    /// never selected.
    #[must_use]
    pub fn eligible_endpoints(&self) -> Vec<Candidate> {
        let now = SystemTime::now();
        let mut endpoints = self.endpoints.write().unwrap();

        for endpoint in endpoints.iter_mut() {
            if !endpoint.enabled && endpoint.cooldown_elapsed(now) {
                endpoint.enabled = true;
                endpoint.cooldown_until = None;
            }
        }

        let mut enabled: Vec<&Endpoint> =
            endpoints.iter().filter(|e| e.enabled && e.client.is_some()).collect();
        let failover: Vec<&Endpoint> = endpoints.iter().filter(|e| e.failover).collect();

        if enabled.is_empty() && !failover.is_empty() {
            return failover.into_iter().map(Candidate::from).collect();
        }
        if enabled.is_empty() && failover.is_empty() && endpoints.len() == 1 {
            return endpoints.iter().map(Candidate::from).collect();
        }
        if enabled.is_empty() {
            return Vec::new();
        }

        // Stable sort keeps config order among equal heads, so round-robin
        // rotation is deterministic.
        enabled.sort_by(|a, b| b.block_head.cmp(&a.block_head));
        let head = enabled[0].block_head;
        enabled.retain(|e| e.block_head == head);
        enabled.into_iter().map(Candidate::from).collect()
    }

    /// Select the next endpoint URL for a request.
    ///
    /// Read-only requests prefer read-only endpoints but fall back to the
    /// full eligibility list rather than failing.
    ///
    /// # Errors
    ///
    /// Returns [`ChainmgrError::NoEligible`] when no endpoint passes
    /// eligibility.
    pub fn next_endpoint(&self, read_only: bool) -> Result<String, ChainmgrError> {
        let eligible = self.eligible_endpoints();
        if eligible.is_empty() {
            return Err(ChainmgrError::NoEligible { chain: self.name.clone() });
        }

        let pool = if read_only {
            let read_only_pool: Vec<Candidate> =
                eligible.iter().filter(|candidate| candidate.read_only).cloned().collect();
            if read_only_pool.is_empty() { eligible } else { read_only_pool }
        } else {
            eligible
        };

        let n = self.next.fetch_add(1, Ordering::Relaxed);
        Ok(pool[n as usize % pool.len()].url.clone())
    }

    /// Put an endpoint into cooldown.
    ///
    /// A no-op when the endpoint is the last eligible one of the chain, so
    /// a correlated failure storm cannot empty the chain.
    ///
    /// # Errors
    ///
    /// Returns [`ChainmgrError::NoSuchEndpoint`] if the URL is not part of
    /// this chain.
    pub fn cooldown(&self, url: &str, duration: Duration) -> Result<(), ChainmgrError> {
        {
            let endpoints = self.endpoints.read().unwrap();
            if !endpoints.iter().any(|e| e.url == url) {
                return Err(ChainmgrError::NoSuchEndpoint { endpoint: url.to_string() });
            }
        }

        // Guard against cooling down the last eligible endpoint, evaluated
        // against the live list at call time.
        if self.eligible_endpoints().len() <= 1 {
            tracing::debug!(chain = %self.name, endpoint = %url, "skipping cooldown of last eligible endpoint");
            return Ok(());
        }

        let until = SystemTime::now() + duration;
        let mut endpoints = self.endpoints.write().unwrap();
        if let Some(endpoint) = endpoints.iter_mut().find(|e| e.url == url) {
            endpoint.enabled = false;
            endpoint.cooldown_until = Some(until);
            let unix = until.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());
            metrics::record_cooldown_until(url, unix);
            tracing::info!(chain = %self.name, endpoint = %url, until_unix = unix, "endpoint cooled down");
        }
        Ok(())
    }

    /// Snapshot the endpoints for probing, without holding the lock.
    pub(crate) fn probe_targets(&self) -> Vec<ProbeTarget> {
        self.endpoints
            .read()
            .unwrap()
            .iter()
            .map(|e| ProbeTarget {
                url: e.url.clone(),
                enabled: e.enabled,
                client: e.client.clone(),
            })
            .collect()
    }

    /// Disable an endpoint (used when it has no client to probe).
    pub(crate) fn disable_endpoint(&self, url: &str) {
        let mut endpoints = self.endpoints.write().unwrap();
        if let Some(endpoint) = endpoints.iter_mut().find(|e| e.url == url) {
            endpoint.enabled = false;
        }
    }

    /// Record a successfully probed block head.
    ///
    /// Heads never move backwards: a node briefly reporting a lower number
    /// leaves the stored head unchanged. Returns the values to emit as
    /// gauges, or `None` if the endpoint vanished in a reload.
    pub(crate) fn record_block_head(&self, url: &str, head: u64) -> Option<HeadReport> {
        let mut endpoints = self.endpoints.write().unwrap();
        let endpoint = endpoints.iter_mut().find(|e| e.url == url)?;
        endpoint.block_head = endpoint.block_head.max(head);
        Some(HeadReport {
            block_head: endpoint.block_head,
            cooldown_unix: endpoint.cooldown_unix(),
        })
    }

    /// Clone the endpoint list (reload carry-forward and tests).
    pub(crate) fn endpoints_snapshot(&self) -> Vec<Endpoint> {
        self.endpoints.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::test_support::{cooled_endpoint, live_endpoint};

    fn chain(endpoints: Vec<Endpoint>) -> Chain {
        Chain::new("testchain".to_string(), endpoints)
    }

    #[test]
    fn test_round_robin_rotation() {
        let c = chain(vec![
            live_endpoint("a", 100),
            live_endpoint("b", 100),
            live_endpoint("c", 100),
        ]);

        let picks: Vec<String> = (0..6).map(|_| c.next_endpoint(false).unwrap()).collect();
        assert_eq!(picks, ["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn test_round_robin_distribution() {
        let c = chain(vec![
            live_endpoint("a", 100),
            live_endpoint("b", 100),
            live_endpoint("c", 100),
        ]);

        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..7 {
            *counts.entry(c.next_endpoint(false).unwrap()).or_default() += 1;
        }
        // 7 selections over 3 endpoints: each picked 2 or 3 times.
        for (url, count) in counts {
            assert!((2..=3).contains(&count), "endpoint {url} selected {count} times");
        }
    }

    #[test]
    fn test_head_filter_excludes_laggards() {
        let c = chain(vec![
            live_endpoint("a", 100),
            live_endpoint("b", 100),
            live_endpoint("c", 99),
        ]);

        let eligible = c.eligible_endpoints();
        let urls: Vec<&str> = eligible.iter().map(|candidate| candidate.url.as_str()).collect();
        assert_eq!(urls, ["a", "b"]);

        for _ in 0..10 {
            assert_ne!(c.next_endpoint(false).unwrap(), "c");
        }
    }

    #[test]
    fn test_laggard_returns_after_catching_up() {
        let c = chain(vec![live_endpoint("a", 100), live_endpoint("b", 99)]);
        assert_eq!(c.eligible_endpoints().len(), 1);

        c.record_block_head("b", 100).unwrap();
        assert_eq!(c.eligible_endpoints().len(), 2);
    }

    #[test]
    fn test_failover_used_when_no_primary_eligible() {
        let mut failover = live_endpoint("fallback", 0);
        failover.failover = true;
        failover.enabled = false;
        failover.cooldown_until = Some(SystemTime::now() + Duration::from_secs(600));
        let c = chain(vec![cooled_endpoint("a", 600), failover]);

        let eligible = c.eligible_endpoints();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].url, "fallback");
    }

    #[test]
    fn test_failover_not_used_while_primary_eligible() {
        let mut failover = live_endpoint("fallback", 100);
        failover.failover = true;
        let c = chain(vec![live_endpoint("a", 100), failover]);

        // The failover endpoint is enabled with a client, so it is also a
        // primary candidate here; the point is the primary never vanishes.
        let eligible = c.eligible_endpoints();
        assert!(eligible.iter().any(|candidate| candidate.url == "a"));
    }

    #[test]
    fn test_single_endpoint_degrade() {
        let mut only = live_endpoint("only", 0);
        only.enabled = false;
        only.cooldown_until = Some(SystemTime::now() + Duration::from_secs(600));
        only.client = None;
        let c = chain(vec![only]);

        let eligible = c.eligible_endpoints();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].url, "only");
        assert_eq!(c.next_endpoint(false).unwrap(), "only");
    }

    #[test]
    fn test_no_eligible_endpoints() {
        let c = chain(vec![cooled_endpoint("a", 600), cooled_endpoint("b", 600)]);
        assert!(matches!(
            c.next_endpoint(false),
            Err(ChainmgrError::NoEligible { .. })
        ));
    }

    #[test]
    fn test_expiry_sweep_re_enables() {
        let mut expired = live_endpoint("a", 100);
        expired.enabled = false;
        expired.cooldown_until = Some(SystemTime::now() - Duration::from_secs(1));
        let c = chain(vec![expired]);

        let eligible = c.eligible_endpoints();
        assert_eq!(eligible.len(), 1);

        let snapshot = c.endpoints_snapshot();
        assert!(snapshot[0].enabled);
        assert!(snapshot[0].cooldown_until.is_none());
    }

    #[test]
    fn test_cooldown_disables_endpoint() {
        let c = chain(vec![live_endpoint("a", 100), live_endpoint("b", 100)]);

        c.cooldown("a", Duration::from_secs(60)).unwrap();

        let snapshot = c.endpoints_snapshot();
        let a = snapshot.iter().find(|e| e.url == "a").unwrap();
        assert!(!a.enabled);
        assert!(a.cooldown_until.is_some());

        let eligible = c.eligible_endpoints();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].url, "b");
    }

    #[test]
    fn test_cooldown_guard_spares_last_eligible() {
        let c = chain(vec![live_endpoint("a", 100), live_endpoint("b", 100)]);

        c.cooldown("a", Duration::from_secs(60)).unwrap();
        // B is now the only eligible endpoint: cooling it down is a no-op.
        c.cooldown("b", Duration::from_secs(60)).unwrap();

        let eligible = c.eligible_endpoints();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].url, "b");
        let snapshot = c.endpoints_snapshot();
        assert!(snapshot.iter().find(|e| e.url == "b").unwrap().enabled);
    }

    #[test]
    fn test_cooldown_guard_counts_head_filtered_list() {
        // B lags, so the eligibility list is just [a]; the guard must spare a.
        let c = chain(vec![live_endpoint("a", 100), live_endpoint("b", 99)]);

        c.cooldown("a", Duration::from_secs(60)).unwrap();

        assert!(c.endpoints_snapshot().iter().find(|e| e.url == "a").unwrap().enabled);
    }

    #[test]
    fn test_cooldown_unknown_endpoint() {
        let c = chain(vec![live_endpoint("a", 100)]);
        assert!(matches!(
            c.cooldown("nope", Duration::from_secs(60)),
            Err(ChainmgrError::NoSuchEndpoint { .. })
        ));
    }

    #[test]
    fn test_chain_never_emptied_by_cooldowns() {
        let c = chain(vec![
            live_endpoint("a", 100),
            live_endpoint("b", 100),
            live_endpoint("c", 100),
        ]);

        for url in ["a", "b", "c", "a", "b", "c"] {
            c.cooldown(url, Duration::from_secs(600)).unwrap();
            assert!(!c.eligible_endpoints().is_empty(), "chain emptied after cooling {url}");
        }
    }

    #[test]
    fn test_read_only_prefers_read_only_endpoints() {
        let mut reader = live_endpoint("reader", 100);
        reader.read_only = true;
        let c = chain(vec![live_endpoint("writer", 100), reader]);

        for _ in 0..4 {
            assert_eq!(c.next_endpoint(true).unwrap(), "reader");
        }
    }

    #[test]
    fn test_read_only_falls_back_to_full_list() {
        let mut reader = live_endpoint("reader", 100);
        reader.read_only = true;
        let c = chain(vec![live_endpoint("writer", 100), reader]);

        c.cooldown("reader", Duration::from_secs(600)).unwrap();
        assert_eq!(c.next_endpoint(true).unwrap(), "writer");
    }

    #[test]
    fn test_record_block_head_is_monotonic() {
        let c = chain(vec![live_endpoint("a", 0)]);

        assert_eq!(c.record_block_head("a", 100).unwrap().block_head, 100);
        assert_eq!(c.record_block_head("a", 90).unwrap().block_head, 100);
        assert_eq!(c.record_block_head("a", 110).unwrap().block_head, 110);
    }

    #[test]
    fn test_record_block_head_unknown_endpoint() {
        let c = chain(vec![live_endpoint("a", 0)]);
        assert!(c.record_block_head("gone", 100).is_none());
    }
}
