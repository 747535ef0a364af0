use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use super::AppState;
use crate::error::{AppError, Result};
use crate::models::ApiResponse;
use crate::services::watcher::WatchStatus;
use crate::utils::parse_address;

#[derive(Debug, Deserialize)]
pub struct WatchRequest {
    pub viewer: String,
}

/// POST /api/v1/games/{address}/watch
pub async fn start_watch(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(req): Json<WatchRequest>,
) -> Result<Json<ApiResponse<WatchStatus>>> {
    let contract = parse_address(&address)?;
    let viewer = parse_address(&req.viewer)?;
    let status = state.watcher.watch(viewer, contract).await;
    Ok(Json(ApiResponse::success(status)))
}

/// GET /api/v1/watch/{viewer}
pub async fn get_watch(
    State(state): State<AppState>,
    Path(viewer): Path<String>,
) -> Result<Json<ApiResponse<WatchStatus>>> {
    let viewer = parse_address(&viewer)?;
    let status = state.watcher.status(viewer).await?;
    Ok(Json(ApiResponse::success(status)))
}

/// DELETE /api/v1/watch/{viewer}
pub async fn stop_watch(
    State(state): State<AppState>,
    Path(viewer): Path<String>,
) -> Result<Json<ApiResponse<bool>>> {
    let viewer = parse_address(&viewer)?;
    if !state.watcher.unwatch(viewer).await {
        return Err(AppError::NotFound(format!(
            "{:#x} is not watching a game",
            viewer
        )));
    }
    Ok(Json(ApiResponse::success(true)))
}

/// POST /api/v1/watch/{viewer}/pause
pub async fn pause_watch(
    State(state): State<AppState>,
    Path(viewer): Path<String>,
) -> Result<Json<ApiResponse<WatchStatus>>> {
    let viewer = parse_address(&viewer)?;
    let status = state.watcher.set_paused(viewer, true).await?;
    Ok(Json(ApiResponse::success(status)))
}

/// POST /api/v1/watch/{viewer}/resume
pub async fn resume_watch(
    State(state): State<AppState>,
    Path(viewer): Path<String>,
) -> Result<Json<ApiResponse<WatchStatus>>> {
    let viewer = parse_address(&viewer)?;
    let status = state.watcher.set_paused(viewer, false).await?;
    Ok(Json(ApiResponse::success(status)))
}
