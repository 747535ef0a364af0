use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use super::AppState;
use crate::error::Result;
use crate::explorer::ExplorerActivity;
use crate::models::ApiResponse;
use crate::utils::parse_address;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsQuery {
    pub contract_address: String,
}

/// GET /api/v1/explorer/transactions?contractAddress=0x…
pub async fn get_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<ApiResponse<ExplorerActivity>>> {
    let contract = parse_address(&query.contract_address)?;
    let activity = state.games.explorer_activity(contract).await?;
    Ok(Json(ApiResponse::success(activity)))
}
