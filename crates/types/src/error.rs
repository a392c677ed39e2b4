//! Error types for the chainmgr proxy.

use derive_more::{Display, Error};

/// Error type for the chainmgr proxy.
#[derive(Debug, Display, Error)]
#[error(ignore)]
pub enum ChainmgrError {
    /// The requested chain is not present in the registry.
    #[display("no such chain: {chain}")]
    NoSuchChain {
        /// Name of the missing chain.
        chain: String,
    },

    /// The endpoint URL is not part of the chain.
    #[display("no such endpoint: {endpoint}")]
    NoSuchEndpoint {
        /// URL of the missing endpoint.
        endpoint: String,
    },

    /// No endpoint passed eligibility for the chain.
    #[display("no enabled endpoints for chain: {chain}")]
    NoEligible {
        /// Name of the chain without eligible endpoints.
        chain: String,
    },

    /// Chain configuration failed to parse or validate.
    #[display("invalid config: {_0}")]
    ConfigInvalid(String),

    /// An upstream client could not be created for an endpoint.
    #[display("failed to dial endpoint {endpoint}: {message}")]
    DialFailed {
        /// URL of the endpoint that could not be dialled.
        endpoint: String,
        /// Reason the dial failed.
        message: String,
    },

    /// The upstream round-trip failed at the transport level.
    #[display("upstream transport error for {endpoint}: {message}")]
    UpstreamTransport {
        /// URL of the endpoint the round-trip was against.
        endpoint: String,
        /// Transport-level failure description.
        message: String,
    },

    /// The cache backend failed. Never fatal to a request.
    #[display("cache backend error: {_0}")]
    CacheBackend(String),

    /// Internal error.
    #[display("internal error: {_0}")]
    Internal(String),
}

impl ChainmgrError {
    /// Whether this error is best-effort: its failure must never fail the
    /// request that observed it.
    #[must_use]
    pub const fn is_best_effort(&self) -> bool {
        matches!(self, Self::CacheBackend(_))
    }
}
