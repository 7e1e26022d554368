pub mod handlers;
pub mod types;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::MonitorConfig;
use crate::stats::store::StatsStore;

#[derive(Clone)]
pub struct AppState {
    pub store: StatsStore,
    pub config: Arc<MonitorConfig>,
}

pub fn router(store: StatsStore, config: Arc<MonitorConfig>) -> Router {
    let state = Arc::new(AppState { store, config });

    Router::new()
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/stats", get(handlers::stats))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve(store: StatsStore, config: Arc<MonitorConfig>) -> eyre::Result<()> {
    let addr = format!("{}:{}", config.api.host, config.api.port);
    let app = router(store, config);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Query API listening");
    axum::serve(listener, app).await?;
    Ok(())
}
