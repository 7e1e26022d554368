use axum::extract::State;
use axum::Json;
use chrono::Utc;
use std::sync::Arc;

use super::types::*;
use super::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let snapshot = state.store.snapshot().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        total_transactions: snapshot.total_transactions,
        abnormal_transactions: snapshot.abnormal_transactions,
        cursor_hash: snapshot.cursor.map(|c| format!("{:#x}", c.hash)),
    })
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let snapshot = state.store.snapshot().await;
    let now = Utc::now();

    Json(StatsResponse {
        monitor_info: MonitorInfo {
            start_time: snapshot.start_time,
            current_time: now,
            monitoring_duration: format_duration(now - snapshot.start_time),
            monitored_address: state.config.monitored_address.to_string(),
        },
        token_info: TokenInfoResponse {
            base_token: TokenDescriptor {
                symbol: state.config.base_token.symbol.clone(),
                address: state.config.base_token.address.to_string(),
            },
            quote_token: TokenDescriptor {
                symbol: state.config.quote_token.symbol.clone(),
                address: state.config.quote_token.address.to_string(),
            },
        },
        dex_contracts: state
            .config
            .dex_routers
            .iter()
            .map(|r| (r.name.clone(), r.address.to_string()))
            .collect(),
        statistics: Statistics {
            total_transactions: snapshot.total_transactions,
            abnormal_transactions: snapshot.abnormal_transactions,
            abnormal_percentage: snapshot.abnormal_percentage,
        },
        recent_abnormal_transactions: snapshot.recent_abnormal,
    })
}
