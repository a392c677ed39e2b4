//! Shared test doubles for registry, selection, and prober tests.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use chainmgr_config::EndpointConfig;
use chainmgr_traits::NodeClient;
use chainmgr_types::ChainmgrError;

use crate::Endpoint;

/// A scripted [`NodeClient`]: pops queued results, then repeats a default.
pub(crate) struct MockNodeClient {
    script: Mutex<VecDeque<Result<u64, String>>>,
    default: Result<u64, String>,
    calls: AtomicUsize,
}

impl MockNodeClient {
    fn new(script: Vec<Result<u64, String>>, default: Result<u64, String>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            default,
            calls: AtomicUsize::new(0),
        })
    }

    /// Always reports the given head.
    pub(crate) fn with_head(head: u64) -> Arc<Self> {
        Self::new(Vec::new(), Ok(head))
    }

    /// Always fails.
    pub(crate) fn failing() -> Arc<Self> {
        Self::new(Vec::new(), Err("connection refused".to_string()))
    }

    /// Plays back `script`, then repeats `default`.
    pub(crate) fn scripted(script: Vec<Result<u64, String>>, default: Result<u64, String>) -> Arc<Self> {
        Self::new(script, default)
    }

    /// How many times `block_number` was called.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeClient for MockNodeClient {
    async fn block_number(&self) -> Result<u64, ChainmgrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());
        next.map_err(|message| ChainmgrError::UpstreamTransport {
            endpoint: "mock".to_string(),
            message,
        })
    }
}

/// An enabled endpoint with an attached mock client at the given head.
pub(crate) fn live_endpoint(url: &str, head: u64) -> Endpoint {
    let mut endpoint = Endpoint::from_config(&EndpointConfig {
        endpoint: url.to_string(),
        enabled: true,
        failover: false,
        read_only: false,
    });
    endpoint.block_head = head;
    endpoint.client = Some(MockNodeClient::with_head(head));
    endpoint
}

/// A disabled endpoint in cooldown for `secs` more seconds.
pub(crate) fn cooled_endpoint(url: &str, secs: u64) -> Endpoint {
    let mut endpoint = live_endpoint(url, 0);
    endpoint.enabled = false;
    endpoint.cooldown_until = Some(SystemTime::now() + Duration::from_secs(secs));
    endpoint
}
