use crate::config::MonitorConfig;
use crate::explorer::types::TxRecord;

/// Verdict on a single transaction against the configured pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Expected,
    Abnormal,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expected => "expected",
            Self::Abnormal => "abnormal",
        }
    }

    pub fn is_abnormal(self) -> bool {
        matches!(self, Self::Abnormal)
    }
}

/// A transaction record with its verdict attached at processing time.
#[derive(Debug, Clone)]
pub struct ClassifiedTx {
    pub record: TxRecord,
    pub classification: Classification,
}

impl ClassifiedTx {
    pub fn new(record: TxRecord, config: &MonitorConfig) -> Self {
        let classification = classify(&record, config);
        Self {
            record,
            classification,
        }
    }
}

/// Classify one transaction record. Pure: the same record and configuration
/// always yield the same verdict.
///
/// Expected means the transaction goes to a configured DEX router or one of
/// the pair token contracts, and every token-transfer leg stays within the
/// base/quote pair. Malformed records and records with no destination are
/// abnormal.
pub fn classify(record: &TxRecord, config: &MonitorConfig) -> Classification {
    let tx = match record {
        TxRecord::Valid(tx) => tx,
        TxRecord::Malformed { .. } => return Classification::Abnormal,
    };

    let Some(to) = tx.to else {
        return Classification::Abnormal;
    };

    if !config.is_dex_router(&to) && !config.is_pair_token(&to) {
        return Classification::Abnormal;
    }

    for leg in &tx.token_transfers {
        match leg.token_address {
            Some(token) if config.is_pair_token(&token) => {}
            _ => return Classification::Abnormal,
        }
    }

    Classification::Expected
}
