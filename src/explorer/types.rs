use std::str::FromStr;

use alloy::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Failure modes of the explorer data source. Network and rate-limit
/// failures are retried on the next poll cycle; decode failures mean the
/// whole response body was unusable.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("explorer request failed: {0}")]
    Network(String),
    #[error("explorer rate limit hit: {0}")]
    RateLimited(String),
    #[error("explorer response malformed: {0}")]
    Decode(String),
}

/// High-water mark of processed transactions: the newest folded timestamp
/// together with the hash that set it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub timestamp: DateTime<Utc>,
    pub hash: B256,
}

// ============================================================
// Raw explorer payload (lenient)
// ============================================================

#[derive(Debug, Deserialize)]
pub struct TransactionsPage {
    #[serde(default)]
    pub items: Vec<JsonValue>,
}

/// One transaction object as the explorer sends it. Every field is optional:
/// the explorer omits or nulls fields freely, and a partially usable record
/// must not fail the page.
#[derive(Debug, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub from: Option<RawAddress>,
    #[serde(default)]
    pub to: Option<RawAddress>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub value: Option<JsonValue>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub gas_used: Option<JsonValue>,
    #[serde(default)]
    pub token_transfers: Vec<RawTokenTransfer>,
}

#[derive(Debug, Deserialize)]
pub struct RawAddress {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawTokenTransfer {
    #[serde(default)]
    pub token: Option<RawToken>,
    #[serde(default)]
    pub total: Option<RawTokenTotal>,
}

#[derive(Debug, Deserialize)]
pub struct RawToken {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawTokenTotal {
    #[serde(default)]
    pub value: Option<JsonValue>,
}

// ============================================================
// Normalized records
// ============================================================

/// A transaction record after normalization. Malformed explorer objects are
/// carried as a placeholder with whatever identity could be recovered, so
/// downstream code never re-inspects raw JSON.
#[derive(Debug, Clone)]
pub enum TxRecord {
    Valid(Transaction),
    Malformed {
        hash: Option<B256>,
        timestamp: Option<DateTime<Utc>>,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Transaction {
    pub hash: B256,
    pub timestamp: DateTime<Utc>,
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub to_name: Option<String>,
    pub method: Option<String>,
    pub value: String,
    pub status: Option<String>,
    pub gas_used: Option<String>,
    pub token_transfers: Vec<TokenTransfer>,
}

/// One token-transfer leg. An unparseable token address stays `None` and
/// makes the transaction abnormal instead of failing the cycle.
#[derive(Debug, Clone)]
pub struct TokenTransfer {
    pub token_address: Option<Address>,
    pub token_symbol: Option<String>,
    pub amount: Option<String>,
}

impl TxRecord {
    pub fn hash(&self) -> Option<B256> {
        match self {
            Self::Valid(tx) => Some(tx.hash),
            Self::Malformed { hash, .. } => *hash,
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Valid(tx) => Some(tx.timestamp),
            Self::Malformed { timestamp, .. } => *timestamp,
        }
    }
}

/// Normalize one raw explorer item into a tagged record.
pub fn normalize(raw: &JsonValue) -> TxRecord {
    let raw_tx: RawTransaction = match serde_json::from_value(raw.clone()) {
        Ok(tx) => tx,
        Err(e) => {
            return TxRecord::Malformed {
                hash: raw
                    .get("hash")
                    .and_then(JsonValue::as_str)
                    .and_then(|s| B256::from_str(s).ok()),
                timestamp: None,
                reason: format!("undecodable transaction object: {}", e),
            }
        }
    };

    let Some(hash_str) = raw_tx.hash else {
        return TxRecord::Malformed {
            hash: None,
            timestamp: parse_timestamp(raw_tx.timestamp.as_deref()),
            reason: "missing transaction hash".to_string(),
        };
    };
    let Ok(hash) = B256::from_str(&hash_str) else {
        return TxRecord::Malformed {
            hash: None,
            timestamp: parse_timestamp(raw_tx.timestamp.as_deref()),
            reason: format!("unparseable transaction hash '{}'", hash_str),
        };
    };

    let Some(timestamp) = parse_timestamp(raw_tx.timestamp.as_deref()) else {
        return TxRecord::Malformed {
            hash: Some(hash),
            timestamp: None,
            reason: "missing or unparseable timestamp".to_string(),
        };
    };

    let token_transfers = raw_tx
        .token_transfers
        .into_iter()
        .map(|leg| TokenTransfer {
            token_address: leg
                .token
                .as_ref()
                .and_then(|t| t.address.as_deref())
                .and_then(|s| Address::from_str(s).ok()),
            token_symbol: leg.token.and_then(|t| t.symbol),
            amount: leg.total.and_then(|t| json_to_string(&t.value?)),
        })
        .collect();

    TxRecord::Valid(Transaction {
        hash,
        timestamp,
        from: parse_address_field(&raw_tx.from),
        to: parse_address_field(&raw_tx.to),
        to_name: raw_tx.to.and_then(|a| a.name),
        method: raw_tx.method,
        value: raw_tx
            .value
            .as_ref()
            .and_then(json_to_string)
            .unwrap_or_else(|| "0".to_string()),
        status: raw_tx.status,
        gas_used: raw_tx.gas_used.as_ref().and_then(json_to_string),
        token_transfers,
    })
}

fn parse_address_field(field: &Option<RawAddress>) -> Option<Address> {
    field
        .as_ref()
        .and_then(|a| a.hash.as_deref())
        .and_then(|s| Address::from_str(s).ok())
}

fn parse_timestamp(s: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s?)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// The explorer serializes numeric fields sometimes as strings, sometimes
/// as numbers.
fn json_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HASH: &str = "0x4242424242424242424242424242424242424242424242424242424242424242";
    const TOKEN: &str = "0x5300000000000000000000000000000000000011";

    #[test]
    fn test_normalize_valid_item() {
        let raw = json!({
            "hash": HASH,
            "timestamp": "2024-11-20T12:00:05.000000Z",
            "from": {"hash": "0x1111111111111111111111111111111111111111"},
            "to": {"hash": "0x2222222222222222222222222222222222222222", "name": "UniversalRouter"},
            "method": "execute",
            "value": "1000",
            "status": "ok",
            "gas_used": 21000,
            "token_transfers": [
                {"token": {"address": TOKEN, "symbol": "WETH"}, "total": {"value": "5"}}
            ]
        });

        let record = normalize(&raw);
        let TxRecord::Valid(tx) = record else {
            panic!("expected valid record");
        };
        assert_eq!(tx.hash, B256::from_str(HASH).unwrap());
        assert_eq!(tx.to_name.as_deref(), Some("UniversalRouter"));
        assert_eq!(tx.method.as_deref(), Some("execute"));
        assert_eq!(tx.value, "1000");
        assert_eq!(tx.gas_used.as_deref(), Some("21000"));
        assert_eq!(tx.token_transfers.len(), 1);
        assert_eq!(
            tx.token_transfers[0].token_address,
            Some(Address::from_str(TOKEN).unwrap())
        );
        assert_eq!(tx.token_transfers[0].token_symbol.as_deref(), Some("WETH"));
        assert_eq!(tx.token_transfers[0].amount.as_deref(), Some("5"));
    }

    #[test]
    fn test_normalize_missing_hash() {
        let record = normalize(&json!({"timestamp": "2024-11-20T12:00:05Z"}));
        let TxRecord::Malformed { hash, timestamp, .. } = record else {
            panic!("expected malformed record");
        };
        assert!(hash.is_none());
        assert!(timestamp.is_some());
    }

    #[test]
    fn test_normalize_bad_timestamp_keeps_identity() {
        let record = normalize(&json!({"hash": HASH, "timestamp": "yesterday"}));
        let TxRecord::Malformed { hash, .. } = record else {
            panic!("expected malformed record");
        };
        assert_eq!(hash, Some(B256::from_str(HASH).unwrap()));
    }

    #[test]
    fn test_normalize_non_object_item() {
        let record = normalize(&json!(5));
        assert!(matches!(record, TxRecord::Malformed { hash: None, .. }));
    }

    #[test]
    fn test_normalize_bad_token_leg_address() {
        let raw = json!({
            "hash": HASH,
            "timestamp": "2024-11-20T12:00:05Z",
            "to": {"hash": "0x2222222222222222222222222222222222222222"},
            "token_transfers": [{"token": {"address": "0xnope", "symbol": "???"}}]
        });
        let TxRecord::Valid(tx) = normalize(&raw) else {
            panic!("expected valid record");
        };
        assert!(tx.token_transfers[0].token_address.is_none());
    }
}
