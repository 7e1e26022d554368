use std::collections::{HashSet, VecDeque};

use alloy::primitives::B256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::ClassifiedTx;
use crate::explorer::types::{Cursor, TxRecord};

/// How many abnormal transactions the aggregate keeps for the query API.
pub const RECENT_ABNORMAL_CAPACITY: usize = 100;

/// How many processed hashes the dedup set retains. The explorer pages
/// newest-first with second-granularity timestamps, so a redelivery window
/// can exceed one cursor step.
pub const SEEN_HASH_RETENTION: usize = 256;

/// One abnormal transaction as recorded for the query API and the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbnormalTx {
    pub hash: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub method: String,
    pub to_address: String,
    pub to_name: String,
    pub value: String,
    pub status: String,
    pub gas_used: String,
    pub token_symbols: Vec<String>,
}

impl AbnormalTx {
    pub fn from_record(hash: B256, record: &TxRecord) -> Self {
        match record {
            TxRecord::Valid(tx) => Self {
                hash: format!("{:#x}", hash),
                timestamp: Some(tx.timestamp),
                method: tx.method.clone().unwrap_or_else(unknown),
                to_address: tx
                    .to
                    .map(|a| a.to_string())
                    .unwrap_or_else(unknown),
                to_name: tx.to_name.clone().unwrap_or_else(unknown),
                value: tx.value.clone(),
                status: tx.status.clone().unwrap_or_else(unknown),
                gas_used: tx.gas_used.clone().unwrap_or_else(unknown),
                token_symbols: tx
                    .token_transfers
                    .iter()
                    .map(|leg| {
                        leg.token_symbol.clone().unwrap_or_else(|| {
                            leg.token_address
                                .map(|a| a.to_string())
                                .unwrap_or_else(unknown)
                        })
                    })
                    .collect(),
            },
            TxRecord::Malformed { timestamp, .. } => Self {
                hash: format!("{:#x}", hash),
                timestamp: *timestamp,
                method: unknown(),
                to_address: unknown(),
                to_name: unknown(),
                value: "0".to_string(),
                status: unknown(),
                gas_used: unknown(),
                token_symbols: Vec::new(),
            },
        }
    }
}

fn unknown() -> String {
    "Unknown".to_string()
}

/// Result of folding one classified transaction.
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    /// Newly counted; carries the abnormal record when the verdict was abnormal.
    Folded(Option<AbnormalTx>),
    /// Hash already incorporated, discarded silently.
    Duplicate,
    /// No recoverable identity, nothing to count.
    Skipped,
}

/// The mutable monitoring state: counts, the bounded newest-first abnormal
/// list, the cursor, and the bounded dedup set. Mutated only by the poll
/// loop; the query side sees it through `StatsStore::snapshot`.
#[derive(Debug, Clone)]
pub struct StatsAggregate {
    pub start_time: DateTime<Utc>,
    pub total_transactions: u64,
    pub abnormal_transactions: u64,
    /// Newest at the front; evicted oldest-first past capacity.
    pub recent_abnormal: VecDeque<AbnormalTx>,
    pub cursor: Option<Cursor>,
    seen: HashSet<B256>,
    seen_order: VecDeque<B256>,
}

impl StatsAggregate {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            total_transactions: 0,
            abnormal_transactions: 0,
            recent_abnormal: VecDeque::new(),
            cursor: None,
            seen: HashSet::new(),
            seen_order: VecDeque::new(),
        }
    }

    /// Rebuild an aggregate from persisted state.
    pub fn resume(
        start_time: DateTime<Utc>,
        total_transactions: u64,
        abnormal_transactions: u64,
        recent_abnormal: Vec<AbnormalTx>,
        cursor: Option<Cursor>,
        seen_hashes: Vec<B256>,
    ) -> Self {
        let mut aggregate = Self {
            start_time,
            total_transactions,
            abnormal_transactions,
            recent_abnormal: recent_abnormal.into(),
            cursor,
            seen: HashSet::new(),
            seen_order: VecDeque::new(),
        };
        for hash in seen_hashes {
            aggregate.remember(hash);
        }
        aggregate.recent_abnormal.truncate(RECENT_ABNORMAL_CAPACITY);
        aggregate
    }

    /// Fold one classified transaction into the aggregate.
    pub fn apply(&mut self, tx: &ClassifiedTx) -> ApplyOutcome {
        let Some(hash) = tx.record.hash() else {
            return ApplyOutcome::Skipped;
        };
        if self.seen.contains(&hash) {
            return ApplyOutcome::Duplicate;
        }

        self.total_transactions += 1;
        let abnormal = if tx.classification.is_abnormal() {
            self.abnormal_transactions += 1;
            let entry = AbnormalTx::from_record(hash, &tx.record);
            self.recent_abnormal.push_front(entry.clone());
            self.recent_abnormal.truncate(RECENT_ABNORMAL_CAPACITY);
            Some(entry)
        } else {
            None
        };

        self.remember(hash);
        if let Some(ts) = tx.record.timestamp() {
            self.advance_cursor(ts, hash);
        }

        ApplyOutcome::Folded(abnormal)
    }

    /// Abnormal share of all transactions, two decimals; `"0.00%"` before
    /// anything was counted.
    pub fn abnormal_percentage(&self) -> String {
        if self.total_transactions == 0 {
            return "0.00%".to_string();
        }
        format!(
            "{:.2}%",
            self.abnormal_transactions as f64 / self.total_transactions as f64 * 100.0
        )
    }

    /// Retained dedup hashes, oldest-first.
    pub fn seen_hashes(&self) -> Vec<B256> {
        self.seen_order.iter().copied().collect()
    }

    fn remember(&mut self, hash: B256) {
        if !self.seen.insert(hash) {
            return;
        }
        self.seen_order.push_back(hash);
        while self.seen_order.len() > SEEN_HASH_RETENTION {
            if let Some(evicted) = self.seen_order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
    }

    /// Cursor only moves forward; equal-timestamp stragglers are left to the
    /// hash set.
    fn advance_cursor(&mut self, timestamp: DateTime<Utc>, hash: B256) {
        match &self.cursor {
            Some(cursor) if timestamp <= cursor.timestamp => {}
            _ => self.cursor = Some(Cursor { timestamp, hash }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classification;
    use crate::explorer::types::Transaction;
    use chrono::TimeZone;

    fn test_hash(n: u64) -> B256 {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&n.to_be_bytes());
        B256::from(bytes)
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 20, 12, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    fn classified(n: u64, secs: i64, classification: Classification) -> ClassifiedTx {
        ClassifiedTx {
            record: TxRecord::Valid(Transaction {
                hash: test_hash(n),
                timestamp: ts(secs),
                from: None,
                to: None,
                to_name: None,
                method: Some("transfer".to_string()),
                value: "0".to_string(),
                status: Some("ok".to_string()),
                gas_used: None,
                token_transfers: Vec::new(),
            }),
            classification,
        }
    }

    #[test]
    fn test_percentage_zero_total() {
        let aggregate = StatsAggregate::new(ts(0));
        assert_eq!(aggregate.abnormal_percentage(), "0.00%");
    }

    #[test]
    fn test_percentage_two_decimals() {
        let mut aggregate = StatsAggregate::new(ts(0));
        for n in 0..10u64 {
            let classification = if n < 2 {
                Classification::Abnormal
            } else {
                Classification::Expected
            };
            aggregate.apply(&classified(n + 1, n as i64, classification));
        }
        assert_eq!(aggregate.total_transactions, 10);
        assert_eq!(aggregate.abnormal_transactions, 2);
        assert_eq!(aggregate.abnormal_percentage(), "20.00%");
    }

    #[test]
    fn test_duplicate_hash_counted_once() {
        let mut aggregate = StatsAggregate::new(ts(0));
        let tx = classified(1, 0, Classification::Abnormal);
        assert!(matches!(aggregate.apply(&tx), ApplyOutcome::Folded(Some(_))));
        assert!(matches!(aggregate.apply(&tx), ApplyOutcome::Duplicate));
        assert_eq!(aggregate.total_transactions, 1);
        assert_eq!(aggregate.abnormal_transactions, 1);
        assert_eq!(aggregate.recent_abnormal.len(), 1);
    }

    #[test]
    fn test_recent_list_newest_first_and_bounded() {
        let mut aggregate = StatsAggregate::new(ts(0));
        let extra = 5u64;
        for n in 1..=(RECENT_ABNORMAL_CAPACITY as u64 + extra) {
            aggregate.apply(&classified(n, n as i64, Classification::Abnormal));
        }

        assert_eq!(aggregate.recent_abnormal.len(), RECENT_ABNORMAL_CAPACITY);
        // Newest at the front
        assert_eq!(
            aggregate.recent_abnormal.front().unwrap().hash,
            format!("{:#x}", test_hash(RECENT_ABNORMAL_CAPACITY as u64 + extra))
        );
        // The oldest entries were the ones evicted
        assert_eq!(
            aggregate.recent_abnormal.back().unwrap().hash,
            format!("{:#x}", test_hash(extra + 1))
        );
    }

    #[test]
    fn test_cursor_is_monotonic() {
        let mut aggregate = StatsAggregate::new(ts(0));
        aggregate.apply(&classified(2, 20, Classification::Expected));
        aggregate.apply(&classified(1, 10, Classification::Expected));

        let cursor = aggregate.cursor.clone().unwrap();
        assert_eq!(cursor.timestamp, ts(20));
        assert_eq!(cursor.hash, test_hash(2));
    }

    #[test]
    fn test_seen_retention_bounded() {
        let mut aggregate = StatsAggregate::new(ts(0));
        for n in 1..=(SEEN_HASH_RETENTION as u64 + 50) {
            aggregate.apply(&classified(n, n as i64, Classification::Expected));
        }
        assert_eq!(aggregate.seen_hashes().len(), SEEN_HASH_RETENTION);
        // Evicted hashes are no longer deduplicated; retained ones still are
        assert!(matches!(
            aggregate.apply(&classified(SEEN_HASH_RETENTION as u64 + 50, 1, Classification::Expected)),
            ApplyOutcome::Duplicate
        ));
    }

    #[test]
    fn test_malformed_with_identity_counts_as_abnormal() {
        let mut aggregate = StatsAggregate::new(ts(0));
        let tx = ClassifiedTx {
            record: TxRecord::Malformed {
                hash: Some(test_hash(7)),
                timestamp: None,
                reason: "missing or unparseable timestamp".to_string(),
            },
            classification: Classification::Abnormal,
        };
        assert!(matches!(aggregate.apply(&tx), ApplyOutcome::Folded(Some(_))));
        assert_eq!(aggregate.total_transactions, 1);
        // No timestamp, so the cursor must not move
        assert!(aggregate.cursor.is_none());
    }

    #[test]
    fn test_unidentifiable_record_skipped() {
        let mut aggregate = StatsAggregate::new(ts(0));
        let tx = ClassifiedTx {
            record: TxRecord::Malformed {
                hash: None,
                timestamp: None,
                reason: "missing transaction hash".to_string(),
            },
            classification: Classification::Abnormal,
        };
        assert!(matches!(aggregate.apply(&tx), ApplyOutcome::Skipped));
        assert_eq!(aggregate.total_transactions, 0);
    }
}
