#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/humun/chainmgr/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

use std::{collections::HashSet, path::Path};

use eyre::{Context, bail};
use serde::{Deserialize, Serialize};

mod settings;
pub use settings::{
    CONFIG_RELOAD_INTERVAL, DEFAULT_CACHE_TTL, DEFAULT_COOLDOWN_DURATION, DEFAULT_LOG_LEVEL,
    DEFAULT_MAX_RETRIES, DEFAULT_PORT, DEFAULT_PROBE_INTERVAL, DEFAULT_PROBE_WORKERS,
    DEFAULT_PROMETHEUS_PORT, DEFAULT_REDIS_PORT, DEFAULT_RETRYABLE_CODES, DEFAULT_RETRY_DELAY,
    Settings,
};

/// One upstream endpoint of a chain, as configured.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    /// URL of the upstream JSON-RPC endpoint.
    pub endpoint: String,
    /// Whether the endpoint starts out enabled.
    #[serde(default)]
    pub enabled: bool,
    /// Whether the endpoint is a fallback-of-last-resort, used only while
    /// no primary endpoint is eligible.
    #[serde(default)]
    pub failover: bool,
    /// Whether the endpoint serves read queries only.
    #[serde(default)]
    pub read_only: bool,
}

/// A named group of interchangeable upstream endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainConfig {
    /// Unique chain name; clients address it as `/{name}`.
    pub name: String,
    /// The chain's endpoints, in selection order.
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

/// Parse and validate a chain config document (a JSON array of chains).
///
/// # Errors
///
/// Returns an error if the document does not parse, a chain name is empty
/// or duplicated, or a chain lists the same endpoint URL twice.
pub fn parse_chains(data: &[u8]) -> eyre::Result<Vec<ChainConfig>> {
    let chains: Vec<ChainConfig> =
        serde_json::from_slice(data).wrap_err("failed to parse chain config")?;

    let mut names = HashSet::new();
    for chain in &chains {
        if chain.name.is_empty() {
            bail!("chain with empty name in config");
        }
        if !names.insert(chain.name.as_str()) {
            bail!("duplicate chain name in config: {}", chain.name);
        }
        let mut urls = HashSet::new();
        for endpoint in &chain.endpoints {
            if !urls.insert(endpoint.endpoint.as_str()) {
                bail!(
                    "duplicate endpoint {} in chain {}",
                    endpoint.endpoint,
                    chain.name
                );
            }
        }
    }

    Ok(chains)
}

/// Read and parse the chain config file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails [`parse_chains`]
/// validation.
pub fn load_chains(path: impl AsRef<Path>) -> eyre::Result<Vec<ChainConfig>> {
    let path = path.as_ref();
    let data = std::fs::read(path)
        .wrap_err_with(|| format!("failed to read config file {}", path.display()))?;
    parse_chains(&data)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const VALID: &str = r#"[
        { "name": "ethereum",
          "endpoints": [
            { "endpoint": "https://eth-1.example", "enabled": true },
            { "endpoint": "https://eth-2.example", "enabled": true, "readOnly": true },
            { "endpoint": "https://eth-fallback.example", "failover": true }
          ] },
        { "name": "polygon",
          "endpoints": [
            { "endpoint": "https://poly-1.example", "enabled": true }
          ] }
    ]"#;

    #[test]
    fn test_parse_valid_config() {
        let chains = parse_chains(VALID.as_bytes()).unwrap();
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].name, "ethereum");
        assert_eq!(chains[0].endpoints.len(), 3);
        assert!(chains[0].endpoints[0].enabled);
        assert!(!chains[0].endpoints[0].failover);
        assert!(chains[0].endpoints[1].read_only);
        assert!(chains[0].endpoints[2].failover);
        assert!(!chains[0].endpoints[2].enabled);
    }

    #[test]
    fn test_read_only_uses_camel_case() {
        let chains = parse_chains(
            br#"[{ "name": "c", "endpoints": [{ "endpoint": "https://a", "readOnly": true }] }]"#,
        )
        .unwrap();
        assert!(chains[0].endpoints[0].read_only);
    }

    #[rstest]
    #[case::not_json(b"not json".as_slice())]
    #[case::object_not_array(br#"{ "name": "c" }"#.as_slice())]
    #[case::empty_name(br#"[{ "name": "", "endpoints": [] }]"#.as_slice())]
    fn test_rejects_malformed(#[case] data: &[u8]) {
        assert!(parse_chains(data).is_err());
    }

    #[test]
    fn test_rejects_duplicate_endpoint_in_chain() {
        let data = br#"[{ "name": "c", "endpoints": [
            { "endpoint": "https://a", "enabled": true },
            { "endpoint": "https://a" }
        ] }]"#;
        let err = parse_chains(data).unwrap_err();
        assert!(err.to_string().contains("duplicate endpoint"));
    }

    #[test]
    fn test_rejects_duplicate_chain_name() {
        let data = br#"[
            { "name": "c", "endpoints": [] },
            { "name": "c", "endpoints": [] }
        ]"#;
        let err = parse_chains(data).unwrap_err();
        assert!(err.to_string().contains("duplicate chain name"));
    }

    #[test]
    fn test_same_url_allowed_across_chains() {
        let data = br#"[
            { "name": "a", "endpoints": [{ "endpoint": "https://shared" }] },
            { "name": "b", "endpoints": [{ "endpoint": "https://shared" }] }
        ]"#;
        assert!(parse_chains(data).is_ok());
    }

    #[test]
    fn test_load_chains_missing_file() {
        let err = load_chains("/nonexistent/chains.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/chains.json"));
    }
}
