//! Listener startup and graceful shutdown.

use axum::Router;
use chainmgr_config::Settings;
use eyre::{Context, Result};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Wait for a shutdown signal (SIGINT or SIGTERM on Unix, Ctrl+C on Windows).
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {
            info!("received SIGTERM, shutting down");
        }
        _ = sigint.recv() => {
            info!("received SIGINT, shutting down");
        }
    }
}

/// Wait for a shutdown signal (Ctrl+C on non-Unix platforms).
#[cfg(not(unix))]
async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    info!("received Ctrl+C, shutting down");
}

/// Serve the proxy and metrics listeners until a shutdown signal.
///
/// On shutdown the background tasks (prober, hot reload) are cancelled via
/// `cancel` and both listeners drain gracefully.
///
/// # Errors
///
/// Returns an error if either listener fails to bind or the proxy server
/// errors while running.
pub async fn run_servers(
    app: Router,
    metrics_app: Router,
    settings: &Settings,
    cancel: CancellationToken,
) -> Result<()> {
    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("failed to bind to {addr}"))?;
    info!(address = %addr, "chainmgr proxy listening");

    let metrics_addr = format!("0.0.0.0:{}", settings.prometheus_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .wrap_err_with(|| format!("failed to bind metrics server to {metrics_addr}"))?;
    info!(address = %metrics_addr, "metrics exporter listening");

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let metrics_handle = {
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let shutdown = async move {
                shutdown_rx.recv().await.ok();
            };
            axum::serve(metrics_listener, metrics_app)
                .with_graceful_shutdown(shutdown)
                .await
                .ok();
        })
    };

    let shutdown = {
        let shutdown_tx = shutdown_tx.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
            shutdown_tx.send(()).ok();
        }
    };

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await.wrap_err("server error")?;

    metrics_handle.await.ok();

    info!("server shut down successfully");
    Ok(())
}
