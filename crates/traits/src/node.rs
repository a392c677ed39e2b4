//! Upstream node client trait.

use async_trait::async_trait;
use chainmgr_types::ChainmgrError;

/// Client handle to one upstream blockchain node.
///
/// The registry holds one per enabled endpoint; the health prober uses it
/// to track block-head freshness. Object-safe so endpoints can carry
/// `Arc<dyn NodeClient>` across registry reloads.
#[async_trait]
pub trait NodeClient: Send + Sync + 'static {
    /// Query the node's latest block number.
    async fn block_number(&self) -> Result<u64, ChainmgrError>;
}
