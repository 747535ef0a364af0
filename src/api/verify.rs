use axum::{
    extract::{Path, State},
    Json,
};

use super::AppState;
use crate::error::{AppError, Result};
use crate::models::ApiResponse;
use crate::services::VerificationReport;
use crate::utils::parse_address;

/// POST /api/v1/games/{address}/verify
pub async fn start_verification(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ApiResponse<VerificationReport>>> {
    let contract = parse_address(&address)?;
    let report = state.verification.start(contract).await;
    Ok(Json(ApiResponse::success(report)))
}

/// GET /api/v1/games/{address}/verify
pub async fn get_verification(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ApiResponse<VerificationReport>>> {
    let contract = parse_address(&address)?;
    let report = state
        .verification
        .status(contract)
        .await
        .ok_or_else(|| AppError::NotFound("No verification started for this game".to_string()))?;
    Ok(Json(ApiResponse::success(report)))
}
