use axum::{extract::State, Json};
use serde::Serialize;

use super::AppState;
use crate::chain::{check_network, NetworkCheck};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub chain_id: u64,
    pub explorer: String,
    pub store: String,
    pub network: NetworkCheck,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_status = match state.store.get("rps_health").await {
        Ok(_) => "connected".to_string(),
        Err(err) => {
            tracing::warn!("Health check store read failed: {}", err);
            "disconnected".to_string()
        }
    };

    let network = check_network(state.chain.as_ref(), state.config.chain_id).await;
    let status = if network.node_chain_id.is_some() && !network.matches {
        "degraded"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        chain_id: state.config.chain_id,
        explorer: state.config.explorer_web_url().to_string(),
        store: store_status,
        network,
    })
}
