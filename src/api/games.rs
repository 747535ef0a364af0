use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::{AppState, ViewerQuery};
use crate::error::Result;
use crate::models::{ApiResponse, Move, WalletCall};
use crate::services::game::{CreateGamePlan, GameView, OutcomeView};
use crate::utils::{parse_address, parse_eth};

#[derive(Debug, Deserialize)]
pub struct CreateGameRequest {
    pub player1: String,
    pub player2: String,
    /// ETH, decimal ("0.01").
    pub stake: String,
    #[serde(rename = "move")]
    pub game_move: Move,
}

#[derive(Debug, Deserialize)]
pub struct RegisterGameRequest {
    pub player1: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinGameRequest {
    pub contract_address: String,
    pub player: String,
    #[serde(rename = "move")]
    pub game_move: Move,
}

#[derive(Debug, Deserialize)]
pub struct PlayerActionRequest {
    pub contract_address: String,
    pub player: String,
}

/// POST /api/v1/games/create
pub async fn create_game(
    State(state): State<AppState>,
    Json(req): Json<CreateGameRequest>,
) -> Result<Json<ApiResponse<CreateGamePlan>>> {
    let player1 = parse_address(&req.player1)?;
    let player2 = parse_address(&req.player2)?;
    let stake = parse_eth(&req.stake)?;
    let plan = state
        .games
        .create_game(player1, player2, stake, req.game_move)
        .await?;
    Ok(Json(ApiResponse::success(plan)))
}

/// POST /api/v1/games/{address}/register
pub async fn register_game(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(req): Json<RegisterGameRequest>,
) -> Result<Json<ApiResponse<GameView>>> {
    let contract = parse_address(&address)?;
    let player1 = parse_address(&req.player1)?;
    let view = state.games.register_game(contract, player1).await?;
    state.verification.start(contract).await;
    Ok(Json(ApiResponse::success(view)))
}

/// POST /api/v1/games/join
pub async fn join_game(
    State(state): State<AppState>,
    Json(req): Json<JoinGameRequest>,
) -> Result<Json<ApiResponse<WalletCall>>> {
    let contract = parse_address(&req.contract_address)?;
    let player = parse_address(&req.player)?;
    let call = state.games.join_game(contract, player, req.game_move).await?;
    Ok(Json(ApiResponse::success(call)))
}

/// POST /api/v1/games/reveal
pub async fn reveal(
    State(state): State<AppState>,
    Json(req): Json<PlayerActionRequest>,
) -> Result<Json<ApiResponse<WalletCall>>> {
    let contract = parse_address(&req.contract_address)?;
    let player = parse_address(&req.player)?;
    let call = state.games.reveal(contract, player).await?;
    Ok(Json(ApiResponse::success(call)))
}

/// POST /api/v1/games/claim-timeout
pub async fn claim_timeout(
    State(state): State<AppState>,
    Json(req): Json<PlayerActionRequest>,
) -> Result<Json<ApiResponse<WalletCall>>> {
    let contract = parse_address(&req.contract_address)?;
    let player = parse_address(&req.player)?;
    let call = state.games.claim_timeout(contract, player).await?;
    Ok(Json(ApiResponse::success(call)))
}

/// GET /api/v1/games/{address}/state
pub async fn get_state(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<ViewerQuery>,
) -> Result<Json<ApiResponse<GameView>>> {
    let contract = parse_address(&address)?;
    let view = state.games.game_state(contract, query.viewer()?).await?;
    Ok(Json(ApiResponse::success(view)))
}

/// GET /api/v1/games/{address}/outcome
pub async fn get_outcome(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<ViewerQuery>,
) -> Result<Json<ApiResponse<OutcomeView>>> {
    let contract = parse_address(&address)?;
    let view = state.games.outcome(contract, query.viewer()?).await?;
    Ok(Json(ApiResponse::success(view)))
}

/// POST /api/v1/games/{address}/refresh
pub async fn refresh_outcome(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<ViewerQuery>,
) -> Result<Json<ApiResponse<OutcomeView>>> {
    let contract = parse_address(&address)?;
    let view = state.games.refresh_outcome(contract, query.viewer()?).await?;
    Ok(Json(ApiResponse::success(view)))
}
