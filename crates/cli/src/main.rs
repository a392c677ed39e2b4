//! The chainmgr proxy binary.
//!
//! Boot order: settings, logging, metrics recorder, initial chain config
//! load (fatal on error) with one immediate block-head pass, background
//! tasks (hot reload, health prober), cache init with a startup PING, then
//! both listeners.

use std::sync::Arc;

use chainmgr_cache::{RedisCache, ResponseCache};
use chainmgr_chains::{HealthProber, Registry, spawn_hot_reload};
use chainmgr_config::Settings;
use chainmgr_server::{AppState, RetryConfig, UpstreamClient, create_router, init_metrics, metrics_router};
use eyre::{Context, eyre};
use tokio_util::sync::CancellationToken;
use tracing::info;

mod logging;
mod server;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let settings = Settings::from_env()?;
    logging::init_tracing(&settings.log_level)?;
    info!("starting chainmgr");

    let metrics_handle = init_metrics(&settings.prometheus_namespace)?;

    let registry = Arc::new(Registry::new(settings.cooldown_duration));
    let configs = chainmgr_config::load_chains(&settings.config_file)?;
    registry.apply(&configs).wrap_err("failed to load chain config")?;

    let prober =
        HealthProber::new(registry.clone(), settings.probe_interval, settings.probe_workers);
    // First load only: bring block heads up before serving.
    prober.update_pass().await;

    let cancel = CancellationToken::new();
    spawn_hot_reload(registry.clone(), settings.config_file.clone(), cancel.clone());
    tokio::spawn(prober.run(cancel.clone()));

    let cache = if settings.cache_enabled() {
        let url = settings
            .redis_url()
            .ok_or_else(|| eyre!("REDIS_HOST must be set unless CACHE_DISABLED=true"))?;
        let redis = RedisCache::new(&url)?;
        redis.ping().await.wrap_err("failed to connect to redis")?;
        info!(url = %url, "connected to redis");
        Some(ResponseCache::new(redis, settings.cache_ttl))
    } else {
        info!("response cache disabled");
        None
    };

    let retry = RetryConfig {
        max_retries: settings.max_retries,
        retry_delay: settings.retry_delay,
        retryable_codes: settings.retryable_codes.clone(),
    };
    let state: AppState<RedisCache> =
        AppState::new(registry, cache, UpstreamClient::new()?, retry);

    let app = create_router(Arc::new(state));
    let metrics_app = metrics_router(metrics_handle);

    server::run_servers(app, metrics_app, &settings, cancel).await
}
