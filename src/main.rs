use std::sync::Arc;

use tracing::info;

use chalet::compactor;
use chalet::config::Config;
use chalet::engine::Engine;
use chalet::notify::NotifyHub;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    chalet::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;

    let hub = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::with_policy(
        config.wal_path(),
        hub.clone(),
        config.booking_policy(),
    )?);

    info!("chalet engine ready");
    info!("  wal: {}", config.wal_path().display());
    info!("  calendar version: {}", engine.calendar_version().await);
    info!(
        "  reservations: {} ({} active)",
        engine.reservation_count().await,
        engine.active_reservation_count().await
    );
    let colors: Vec<String> = engine.policy().colors().iter().map(|c| c.to_string()).collect();
    info!("  bookable colors: {}", colors.join(", "));
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let compactor = tokio::spawn(compactor::run_compactor(
        engine.clone(),
        hub,
        config.compact_threshold,
        config.compact_interval,
    ));

    shutdown_signal().await?;
    info!("shutdown signal received");
    compactor.abort();

    // Leave a compact log behind so the next start replays quickly.
    if let Err(e) = engine.compact_wal().await {
        tracing::warn!("final compaction failed: {e}");
    }
    info!("chalet stopped");
    Ok(())
}

/// Resolve on ctrl-c, or SIGTERM on unix.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => r?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
