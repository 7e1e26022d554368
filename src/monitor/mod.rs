use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::classifier::ClassifiedTx;
use crate::config::MonitorConfig;
use crate::explorer::client::ExplorerClient;
use crate::explorer::types::TxRecord;
use crate::stats::persist::{self, SnapshotDocument};
use crate::stats::store::StatsStore;

/// What one poll cycle did.
#[derive(Debug)]
pub struct CycleReport {
    pub fetched: usize,
    pub folded: u64,
    pub duplicates: u64,
    pub abnormal: u64,
    pub persisted: bool,
}

/// Run the poll loop until the shutdown token fires. A failed cycle is
/// logged and retried on the next tick; only cancellation ends the loop.
pub async fn run_monitor(
    config: Arc<MonitorConfig>,
    client: ExplorerClient,
    store: StatsStore,
    shutdown: CancellationToken,
) -> eyre::Result<()> {
    tracing::info!(
        address = %config.monitored_address,
        pair = %config.pair_label(),
        interval_secs = config.poll_interval.as_secs(),
        "Starting continuous monitoring"
    );

    loop {
        tokio::select! {
            result = run_cycle(&config, &client, &store) => {
                match result {
                    Ok(report) => tracing::debug!(
                        fetched = report.fetched,
                        folded = report.folded,
                        duplicates = report.duplicates,
                        abnormal = report.abnormal,
                        persisted = report.persisted,
                        "Poll cycle complete"
                    ),
                    Err(e) => tracing::error!(
                        error = %e,
                        "Poll cycle failed, will retry next interval"
                    ),
                }
            }
            _ = shutdown.cancelled() => {
                tracing::info!("Shutdown received mid-cycle, stopping monitor");
                break;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(config.poll_interval) => {}
            _ = shutdown.cancelled() => {
                tracing::info!("Shutdown received, stopping monitor");
                break;
            }
        }
    }

    Ok(())
}

/// One cycle: fetch since the cursor, classify, fold into the store,
/// persist. A fetch failure aborts the cycle with the cursor and aggregate
/// untouched; a persistence failure is logged and the in-memory state stays
/// authoritative until the next cycle retries the write.
pub async fn run_cycle(
    config: &MonitorConfig,
    client: &ExplorerClient,
    store: &StatsStore,
) -> eyre::Result<CycleReport> {
    let cursor = store.cursor().await;
    let records = client
        .fetch_transactions(config.monitored_address, cursor.as_ref())
        .await?;
    let fetched = records.len();

    let mut batch = Vec::with_capacity(records.len());
    for record in records {
        if record.hash().is_none() {
            if let TxRecord::Malformed { ref reason, .. } = record {
                tracing::warn!(reason = %reason, "Dropping unidentifiable transaction record");
            }
            continue;
        }
        batch.push(ClassifiedTx::new(record, config));
    }

    let outcome = store.apply_batch(batch).await;
    for entry in &outcome.abnormal {
        tracing::warn!(
            hash = %entry.hash,
            to = %entry.to_address,
            to_name = %entry.to_name,
            method = %entry.method,
            "Abnormal transaction detected"
        );
    }

    let document = SnapshotDocument::build(config, &store.export().await);
    let persisted = match persist::save_snapshot(&config.data_file, &document).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to persist snapshot, in-memory statistics retained");
            false
        }
    };

    Ok(CycleReport {
        fetched,
        folded: outcome.folded,
        duplicates: outcome.duplicates,
        abnormal: outcome.abnormal.len() as u64,
        persisted,
    })
}
