#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/humun/chainmgr/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod endpoint;
pub use endpoint::Endpoint;

mod chain;
pub use chain::{Candidate, Chain};

mod client;
pub use client::HttpNodeClient;

mod registry;
pub use registry::{DialFn, Registry, spawn_hot_reload};

mod prober;
pub use prober::HealthProber;

mod metrics;

#[cfg(test)]
pub(crate) mod test_support;
