use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::classifier::ClassifiedTx;
use crate::explorer::types::Cursor;

use super::aggregate::{AbnormalTx, ApplyOutcome, StatsAggregate};

/// Consistent point-in-time copy of the aggregate, safe to hand to the
/// query API while the poll loop keeps writing.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub start_time: DateTime<Utc>,
    pub total_transactions: u64,
    pub abnormal_transactions: u64,
    pub abnormal_percentage: String,
    /// Newest-first.
    pub recent_abnormal: Vec<AbnormalTx>,
    pub cursor: Option<Cursor>,
}

/// What a whole poll batch did to the aggregate.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub folded: u64,
    pub duplicates: u64,
    pub skipped: u64,
    /// Newly recorded abnormal transactions, in fold order.
    pub abnormal: Vec<AbnormalTx>,
}

/// Shared handle on the statistics aggregate. The poll loop writes batches,
/// the query API reads snapshots; a whole batch folds under one write lock
/// so a snapshot never observes a half-applied batch.
#[derive(Clone)]
pub struct StatsStore {
    inner: Arc<RwLock<StatsAggregate>>,
}

impl StatsStore {
    pub fn new(aggregate: StatsAggregate) -> Self {
        Self {
            inner: Arc::new(RwLock::new(aggregate)),
        }
    }

    pub async fn cursor(&self) -> Option<Cursor> {
        self.inner.read().await.cursor.clone()
    }

    pub async fn apply_batch(&self, batch: Vec<ClassifiedTx>) -> BatchOutcome {
        let mut aggregate = self.inner.write().await;
        let mut outcome = BatchOutcome::default();
        for tx in &batch {
            match aggregate.apply(tx) {
                ApplyOutcome::Folded(abnormal) => {
                    outcome.folded += 1;
                    if let Some(entry) = abnormal {
                        outcome.abnormal.push(entry);
                    }
                }
                ApplyOutcome::Duplicate => outcome.duplicates += 1,
                ApplyOutcome::Skipped => outcome.skipped += 1,
            }
        }
        outcome
    }

    pub async fn snapshot(&self) -> StatsSnapshot {
        let aggregate = self.inner.read().await;
        StatsSnapshot {
            start_time: aggregate.start_time,
            total_transactions: aggregate.total_transactions,
            abnormal_transactions: aggregate.abnormal_transactions,
            abnormal_percentage: aggregate.abnormal_percentage(),
            recent_abnormal: aggregate.recent_abnormal.iter().cloned().collect(),
            cursor: aggregate.cursor.clone(),
        }
    }

    /// Clone the aggregate for persistence.
    pub async fn export(&self) -> StatsAggregate {
        self.inner.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classification;
    use crate::explorer::types::{Transaction, TxRecord};
    use alloy::primitives::B256;
    use chrono::TimeZone;

    fn test_hash(n: u64) -> B256 {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&n.to_be_bytes());
        B256::from(bytes)
    }

    fn classified(n: u64, classification: Classification) -> ClassifiedTx {
        ClassifiedTx {
            record: TxRecord::Valid(Transaction {
                hash: test_hash(n),
                timestamp: Utc.with_ymd_and_hms(2024, 11, 20, 12, 0, 0).unwrap()
                    + chrono::Duration::seconds(n as i64),
                from: None,
                to: None,
                to_name: None,
                method: None,
                value: "0".to_string(),
                status: None,
                gas_used: None,
                token_transfers: Vec::new(),
            }),
            classification,
        }
    }

    #[tokio::test]
    async fn test_dedup_across_batches() {
        let store = StatsStore::new(StatsAggregate::new(Utc::now()));

        let first = store
            .apply_batch(vec![
                classified(1, Classification::Expected),
                classified(2, Classification::Abnormal),
            ])
            .await;
        assert_eq!(first.folded, 2);
        assert_eq!(first.duplicates, 0);

        let second = store
            .apply_batch(vec![
                classified(2, Classification::Abnormal),
                classified(3, Classification::Expected),
            ])
            .await;
        assert_eq!(second.folded, 1);
        assert_eq!(second.duplicates, 1);

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.total_transactions, 3);
        assert_eq!(snapshot.abnormal_transactions, 1);
    }

    #[tokio::test]
    async fn test_snapshot_is_consistent() {
        let store = StatsStore::new(StatsAggregate::new(Utc::now()));
        store
            .apply_batch(vec![
                classified(1, Classification::Abnormal),
                classified(2, Classification::Expected),
                classified(3, Classification::Abnormal),
                classified(4, Classification::Expected),
            ])
            .await;

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.total_transactions, 4);
        assert_eq!(snapshot.abnormal_transactions, 2);
        assert_eq!(snapshot.abnormal_percentage, "50.00%");
        assert_eq!(snapshot.recent_abnormal.len(), 2);
        // Newest-first
        assert_eq!(
            snapshot.recent_abnormal[0].hash,
            format!("{:#x}", test_hash(3))
        );
        assert_eq!(snapshot.cursor.unwrap().hash, test_hash(4));
    }
}
