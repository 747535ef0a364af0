use axum::{
    extract::{Path, State},
    Json,
};
use ethers::types::U256;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::Result;
use crate::models::{ApiResponse, GameStatus, HistoryEntry};
use crate::utils::{format_eth, format_relative_time, now_millis, parse_address, short_address};

#[derive(Debug, Serialize)]
pub struct HistoryItem {
    #[serde(flatten)]
    pub entry: HistoryEntry,
    pub opponent_short: String,
    pub stake_eth: String,
    pub updated: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: GameStatus,
}

fn to_item(entry: HistoryEntry, now_ms: i64) -> HistoryItem {
    let stake_eth = U256::from_dec_str(&entry.stake)
        .map(format_eth)
        .unwrap_or_else(|_| entry.stake.clone());
    HistoryItem {
        opponent_short: short_address(&entry.opponent),
        stake_eth,
        updated: format_relative_time(entry.timestamp, now_ms),
        entry,
    }
}

/// GET /api/v1/history/{player}
pub async fn get_history(
    State(state): State<AppState>,
    Path(player): Path<String>,
) -> Result<Json<ApiResponse<Vec<HistoryItem>>>> {
    let player = parse_address(&player)?;
    let now_ms = now_millis();
    let items = state
        .games
        .history(player)
        .await
        .into_iter()
        .map(|entry| to_item(entry, now_ms))
        .collect();
    Ok(Json(ApiResponse::success(items)))
}

/// PUT /api/v1/history/{player}/{address}/status
pub async fn update_status(
    State(state): State<AppState>,
    Path((player, address)): Path<(String, String)>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<bool>>> {
    let player = parse_address(&player)?;
    let contract = parse_address(&address)?;
    state
        .games
        .update_history_status(player, contract, req.status)
        .await?;
    Ok(Json(ApiResponse::success(true)))
}

/// DELETE /api/v1/history/{player}
pub async fn clear_history(
    State(state): State<AppState>,
    Path(player): Path<String>,
) -> Result<Json<ApiResponse<bool>>> {
    let player = parse_address(&player)?;
    state.games.clear_history(player).await?;
    Ok(Json(ApiResponse::success(true)))
}
