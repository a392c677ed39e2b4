#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/humun/chainmgr/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod cacheability;
pub use cacheability::is_cacheable;

mod fingerprint;
pub use fingerprint::cache_key;

mod memory;
pub use memory::MemoryCache;

mod redis;
pub use self::redis::RedisCache;

mod response_cache;
pub use response_cache::ResponseCache;

mod wire;
pub use wire::CachedResponse;
