//! Process settings resolved from environment variables.

use std::{path::PathBuf, time::Duration};

use eyre::{Context, bail};

/// Default proxy listen port.
pub const DEFAULT_PORT: u16 = 8080;
/// Default metrics listen port.
pub const DEFAULT_PROMETHEUS_PORT: u16 = 9090;
/// Default log verbosity.
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Default Redis port when only `REDIS_HOST` is set.
pub const DEFAULT_REDIS_PORT: u16 = 6379;
/// Default TTL for cached responses.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10 * 60);
/// Default maximum upstream attempts per request.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default delay between upstream attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
/// Default set of retryable upstream status codes.
pub const DEFAULT_RETRYABLE_CODES: [u16; 4] = [429, 502, 503, 504];
/// Default endpoint cooldown duration.
pub const DEFAULT_COOLDOWN_DURATION: Duration = Duration::from_secs(60);
/// Default interval between health prober passes.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(10);
/// Default worker pool size for block-head update passes.
pub const DEFAULT_PROBE_WORKERS: usize = 10;
/// Interval between chain config hot reloads.
pub const CONFIG_RELOAD_INTERVAL: Duration = Duration::from_secs(60);

/// Process-wide settings, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Proxy listen port (`PORT`).
    pub port: u16,
    /// Metrics listen port (`PROMETHEUS_PORT`).
    pub prometheus_port: u16,
    /// Metric name prefix (`PROMETHEUS_NAMESPACE`); empty for none.
    pub prometheus_namespace: String,
    /// Path to the chain config file (`CONFIG_FILE`).
    pub config_file: PathBuf,
    /// Log verbosity (`LOG_LEVEL`).
    pub log_level: String,
    /// Redis host for the response cache (`REDIS_HOST`).
    pub redis_host: Option<String>,
    /// Redis port for the response cache (`REDIS_PORT`).
    pub redis_port: u16,
    /// Whether the response cache is bypassed entirely (`CACHE_DISABLED`).
    pub cache_disabled: bool,
    /// TTL for cached responses (`CACHE_TTL`).
    pub cache_ttl: Duration,
    /// Maximum upstream attempts per request (`MAX_RETRIES`).
    pub max_retries: u32,
    /// Delay between upstream attempts (`RETRY_DELAY`).
    pub retry_delay: Duration,
    /// Upstream status codes that trigger a retry (`RETRYABLE_CODES`).
    pub retryable_codes: Vec<u16>,
    /// Endpoint cooldown duration (`COOLDOWN_DURATION`).
    pub cooldown_duration: Duration,
    /// Interval between health prober passes (`PROBE_INTERVAL`).
    pub probe_interval: Duration,
    /// Worker pool size for block-head updates (`UPDATE_BLOCK_HEADS_WORKERS`).
    pub probe_workers: usize,
}

impl Settings {
    /// Resolve settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `CONFIG_FILE` is unset or any variable fails to
    /// parse.
    pub fn from_env() -> eyre::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through an injectable variable lookup.
    ///
    /// Tests pass a closure over a map instead of mutating the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `CONFIG_FILE` is absent or any present variable
    /// fails to parse.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> eyre::Result<Self> {
        let Some(config_file) = get("CONFIG_FILE") else {
            bail!("CONFIG_FILE must be set");
        };

        let probe_workers = parse_or("UPDATE_BLOCK_HEADS_WORKERS", &get, DEFAULT_PROBE_WORKERS)?;
        if probe_workers == 0 {
            bail!("UPDATE_BLOCK_HEADS_WORKERS must be at least 1");
        }

        Ok(Self {
            port: parse_or("PORT", &get, DEFAULT_PORT)?,
            prometheus_port: parse_or("PROMETHEUS_PORT", &get, DEFAULT_PROMETHEUS_PORT)?,
            prometheus_namespace: get("PROMETHEUS_NAMESPACE").unwrap_or_default(),
            config_file: PathBuf::from(config_file),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            redis_host: get("REDIS_HOST"),
            redis_port: parse_or("REDIS_PORT", &get, DEFAULT_REDIS_PORT)?,
            cache_disabled: get("CACHE_DISABLED").as_deref() == Some("true"),
            cache_ttl: duration_or("CACHE_TTL", &get, DEFAULT_CACHE_TTL)?,
            max_retries: parse_or("MAX_RETRIES", &get, DEFAULT_MAX_RETRIES)?,
            retry_delay: duration_or("RETRY_DELAY", &get, DEFAULT_RETRY_DELAY)?,
            retryable_codes: codes_or("RETRYABLE_CODES", &get, &DEFAULT_RETRYABLE_CODES)?,
            cooldown_duration: duration_or("COOLDOWN_DURATION", &get, DEFAULT_COOLDOWN_DURATION)?,
            probe_interval: duration_or("PROBE_INTERVAL", &get, DEFAULT_PROBE_INTERVAL)?,
            probe_workers,
        })
    }

    /// Whether the response cache participates in the pipeline.
    #[must_use]
    pub const fn cache_enabled(&self) -> bool {
        !self.cache_disabled
    }

    /// Redis connection URL, if a cache host is configured.
    #[must_use]
    pub fn redis_url(&self) -> Option<String> {
        self.redis_host
            .as_ref()
            .map(|host| format!("redis://{}:{}", host, self.redis_port))
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &str,
    get: &impl Fn(&str) -> Option<String>,
    default: T,
) -> eyre::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .wrap_err_with(|| format!("failed to parse {key}: {raw}")),
        None => Ok(default),
    }
}

fn duration_or(
    key: &str,
    get: &impl Fn(&str) -> Option<String>,
    default: Duration,
) -> eyre::Result<Duration> {
    match get(key) {
        Some(raw) => humantime::parse_duration(raw.trim())
            .wrap_err_with(|| format!("failed to parse {key}: {raw}")),
        None => Ok(default),
    }
}

fn codes_or(
    key: &str,
    get: &impl Fn(&str) -> Option<String>,
    default: &[u16],
) -> eyre::Result<Vec<u16>> {
    match get(key) {
        Some(raw) => raw
            .split(',')
            .map(|code| {
                code.trim()
                    .parse()
                    .wrap_err_with(|| format!("failed to parse {key}: {code}"))
            })
            .collect(),
        None => Ok(default.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rstest::rstest;

    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |key| map.get(key).map(|value| (*value).to_string())
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[("CONFIG_FILE", "/etc/chains.json")])).unwrap();
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.prometheus_port, DEFAULT_PROMETHEUS_PORT);
        assert_eq!(settings.prometheus_namespace, "");
        assert_eq!(settings.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(settings.cache_ttl, Duration::from_secs(600));
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.retry_delay, Duration::from_secs(5));
        assert_eq!(settings.retryable_codes, vec![429, 502, 503, 504]);
        assert_eq!(settings.cooldown_duration, Duration::from_secs(60));
        assert_eq!(settings.probe_interval, Duration::from_secs(10));
        assert_eq!(settings.probe_workers, 10);
        assert!(settings.cache_enabled());
        assert_eq!(settings.redis_url(), None);
    }

    #[test]
    fn test_config_file_required() {
        let err = Settings::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("CONFIG_FILE"));
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("CONFIG_FILE", "/etc/chains.json"),
            ("PORT", "9000"),
            ("CACHE_TTL", "30s"),
            ("RETRY_DELAY", "250ms"),
            ("RETRYABLE_CODES", "500, 503"),
            ("MAX_RETRIES", "5"),
            ("COOLDOWN_DURATION", "2m"),
            ("PROBE_INTERVAL", "1s"),
            ("UPDATE_BLOCK_HEADS_WORKERS", "4"),
            ("PROMETHEUS_NAMESPACE", "humun"),
            ("CACHE_DISABLED", "true"),
        ]))
        .unwrap();
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.cache_ttl, Duration::from_secs(30));
        assert_eq!(settings.retry_delay, Duration::from_millis(250));
        assert_eq!(settings.retryable_codes, vec![500, 503]);
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.cooldown_duration, Duration::from_secs(120));
        assert_eq!(settings.probe_interval, Duration::from_secs(1));
        assert_eq!(settings.probe_workers, 4);
        assert_eq!(settings.prometheus_namespace, "humun");
        assert!(!settings.cache_enabled());
    }

    #[test]
    fn test_redis_url() {
        let settings = Settings::from_lookup(lookup(&[
            ("CONFIG_FILE", "/etc/chains.json"),
            ("REDIS_HOST", "cache.internal"),
            ("REDIS_PORT", "6390"),
        ]))
        .unwrap();
        assert_eq!(settings.redis_url().as_deref(), Some("redis://cache.internal:6390"));
    }

    #[rstest]
    #[case::bad_port("PORT", "not-a-port")]
    #[case::bad_duration("CACHE_TTL", "10 parsecs")]
    #[case::bad_codes("RETRYABLE_CODES", "429,many")]
    #[case::bad_workers("UPDATE_BLOCK_HEADS_WORKERS", "0")]
    fn test_rejects_invalid(#[case] key: &'static str, #[case] value: &'static str) {
        let vars = [("CONFIG_FILE", "/etc/chains.json"), (key, value)];
        assert!(Settings::from_lookup(lookup(&vars)).is_err());
    }
}
