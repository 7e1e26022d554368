use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::stats::aggregate::AbnormalTx;

// ============================================================
// Response types
// ============================================================

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub monitor_info: MonitorInfo,
    pub token_info: TokenInfoResponse,
    pub dex_contracts: BTreeMap<String, String>,
    pub statistics: Statistics,
    pub recent_abnormal_transactions: Vec<AbnormalTx>,
}

#[derive(Debug, Serialize)]
pub struct MonitorInfo {
    pub start_time: DateTime<Utc>,
    pub current_time: DateTime<Utc>,
    pub monitoring_duration: String,
    pub monitored_address: String,
}

#[derive(Debug, Serialize)]
pub struct TokenInfoResponse {
    pub base_token: TokenDescriptor,
    pub quote_token: TokenDescriptor,
}

#[derive(Debug, Serialize)]
pub struct TokenDescriptor {
    pub symbol: String,
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct Statistics {
    pub total_transactions: u64,
    pub abnormal_transactions: u64,
    pub abnormal_percentage: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub total_transactions: u64,
    pub abnormal_transactions: u64,
    pub cursor_hash: Option<String>,
}

/// Human-readable elapsed time, largest unit first.
pub fn format_duration(duration: chrono::Duration) -> String {
    let total_secs = duration.num_seconds().max(0);
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{}s", seconds));
    }
    parts.join(" ")
}
