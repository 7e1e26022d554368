use std::path::Path;
use std::time::Duration;

use alloy::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::MonitorConfig;

use super::aggregate::{AbnormalTx, StatsAggregate};
use crate::explorer::types::Cursor;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Bound on the snapshot write so a hung disk cannot stall the poll loop.
const PERSIST_TIMEOUT: Duration = Duration::from_secs(10);

/// The durable snapshot: configuration echo, monitoring state, and the
/// recent abnormal list, under a format version tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub version: u32,
    pub config: PersistedConfig,
    pub monitoring: PersistedMonitoring,
    pub abnormal_txs: Vec<AbnormalTx>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedConfig {
    pub monitored_address: Address,
    pub base_token: PersistedToken,
    pub quote_token: PersistedToken,
    pub dex_routers: Vec<PersistedRouter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedToken {
    pub symbol: String,
    pub address: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedRouter {
    pub name: String,
    pub address: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedMonitoring {
    pub start_time: DateTime<Utc>,
    pub cursor: Option<Cursor>,
    pub total_transactions: u64,
    pub abnormal_transactions: u64,
    #[serde(default)]
    pub seen_hashes: Vec<B256>,
}

impl SnapshotDocument {
    pub fn build(config: &MonitorConfig, aggregate: &StatsAggregate) -> Self {
        Self {
            version: SNAPSHOT_FORMAT_VERSION,
            config: PersistedConfig {
                monitored_address: config.monitored_address,
                base_token: PersistedToken {
                    symbol: config.base_token.symbol.clone(),
                    address: config.base_token.address,
                },
                quote_token: PersistedToken {
                    symbol: config.quote_token.symbol.clone(),
                    address: config.quote_token.address,
                },
                dex_routers: config
                    .dex_routers
                    .iter()
                    .map(|r| PersistedRouter {
                        name: r.name.clone(),
                        address: r.address,
                    })
                    .collect(),
            },
            monitoring: PersistedMonitoring {
                start_time: aggregate.start_time,
                cursor: aggregate.cursor.clone(),
                total_transactions: aggregate.total_transactions,
                abnormal_transactions: aggregate.abnormal_transactions,
                seen_hashes: aggregate.seen_hashes(),
            },
            abnormal_txs: aggregate.recent_abnormal.iter().cloned().collect(),
        }
    }

    /// A stored aggregate is only meaningful for the same monitored address
    /// and pair; a changed pair invalidates every past classification.
    pub fn matches_config(&self, config: &MonitorConfig) -> bool {
        self.config.monitored_address == config.monitored_address
            && self.config.base_token.address == config.base_token.address
            && self.config.quote_token.address == config.quote_token.address
    }

    pub fn into_aggregate(self) -> StatsAggregate {
        StatsAggregate::resume(
            self.monitoring.start_time,
            self.monitoring.total_transactions,
            self.monitoring.abnormal_transactions,
            self.abnormal_txs,
            self.monitoring.cursor,
            self.monitoring.seen_hashes,
        )
    }
}

/// Write the snapshot atomically: a reader or a restarted process sees
/// either the previous document or the new one, never a partial write.
pub async fn save_snapshot(path: &Path, document: &SnapshotDocument) -> eyre::Result<()> {
    let bytes = serde_json::to_vec_pretty(document)
        .map_err(|e| eyre::eyre!("Failed to serialize snapshot: {}", e))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    let write = async {
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, path).await
    };

    tokio::time::timeout(PERSIST_TIMEOUT, write)
        .await
        .map_err(|_| {
            eyre::eyre!(
                "Snapshot write to '{}' timed out after {}s",
                path.display(),
                PERSIST_TIMEOUT.as_secs()
            )
        })?
        .map_err(|e| eyre::eyre!("Failed to write snapshot '{}': {}", path.display(), e))?;

    Ok(())
}

/// Load a previously persisted snapshot. `Ok(None)` when no file exists or
/// its format version is not the current one; an unreadable file is an
/// error the caller may downgrade to a fresh start.
pub async fn load_snapshot(path: &Path) -> eyre::Result<Option<SnapshotDocument>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(eyre::eyre!(
                "Failed to read snapshot '{}': {}",
                path.display(),
                e
            ))
        }
    };

    let document: SnapshotDocument = serde_json::from_slice(&bytes)
        .map_err(|e| eyre::eyre!("Failed to parse snapshot '{}': {}", path.display(), e))?;

    if document.version != SNAPSHOT_FORMAT_VERSION {
        tracing::warn!(
            version = document.version,
            expected = SNAPSHOT_FORMAT_VERSION,
            path = %path.display(),
            "Snapshot format version mismatch, ignoring stored data"
        );
        return Ok(None);
    }

    Ok(Some(document))
}
