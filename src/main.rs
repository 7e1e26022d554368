use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use morphwatch_monitor::config::{Cli, MonitorConfig};
use morphwatch_monitor::explorer::client::ExplorerClient;
use morphwatch_monitor::monitor;
use morphwatch_monitor::stats::aggregate::StatsAggregate;
use morphwatch_monitor::stats::persist;
use morphwatch_monitor::stats::store::StatsStore;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    // Initialize structured logging (set RUST_LOG=info for output)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let config = Arc::new(MonitorConfig::resolve(cli)?);

    tracing::info!(
        address = %config.monitored_address,
        pair = %config.pair_label(),
        "Morphwatch monitor starting"
    );

    // Resume from a prior snapshot when it was recorded for this configuration
    let aggregate = match persist::load_snapshot(&config.data_file).await {
        Ok(Some(document)) if document.matches_config(&config) => {
            tracing::info!(
                total = document.monitoring.total_transactions,
                abnormal = document.monitoring.abnormal_transactions,
                "Resuming from persisted snapshot"
            );
            document.into_aggregate()
        }
        Ok(Some(_)) => {
            tracing::warn!(
                path = %config.data_file.display(),
                "Persisted snapshot belongs to a different configuration, starting fresh"
            );
            StatsAggregate::new(Utc::now())
        }
        Ok(None) => StatsAggregate::new(Utc::now()),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load persisted snapshot, starting fresh");
            StatsAggregate::new(Utc::now())
        }
    };

    let store = StatsStore::new(aggregate);
    let client = ExplorerClient::new(&config.explorer_url)?;

    // Single-shot mode: one poll cycle, no query API
    if !config.continuous {
        let report = monitor::run_cycle(&config, &client, &store).await?;
        let snapshot = store.snapshot().await;
        tracing::info!(
            fetched = report.fetched,
            new = report.folded,
            total = snapshot.total_transactions,
            abnormal = snapshot.abnormal_transactions,
            abnormal_percentage = %snapshot.abnormal_percentage,
            "Single poll cycle complete"
        );
        return Ok(());
    }

    // Spawn the query API
    {
        let store = store.clone();
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = morphwatch_monitor::api::serve(store, config).await {
                tracing::error!(error = %e, "Query API failed");
            }
        });
    }

    // Create shutdown signal
    let shutdown = CancellationToken::new();

    let monitor_handle = {
        let config = config.clone();
        let store = store.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = monitor::run_monitor(config, client, store, shutdown).await {
                tracing::error!(error = %e, "Monitor task failed");
            }
        })
    };

    tracing::info!("Monitor running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping monitor...");
    shutdown.cancel();

    let _ = monitor_handle.await;

    tracing::info!("Morphwatch monitor stopped gracefully");
    Ok(())
}
