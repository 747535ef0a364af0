use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Storage(#[from] redis::RedisError),

    #[error("Blockchain RPC error: {0}")]
    BlockchainRPC(String),

    #[error("Explorer API error: {0}")]
    ExplorerAPI(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid move: {0}")]
    InvalidMove(String),

    #[error("Stake must be greater than 0")]
    InvalidStake,

    #[error("You can't play against yourself")]
    SelfPlay,

    #[error("Commitment for {contract} not found for {player}")]
    CommitmentMissing { contract: String, player: String },

    #[error("Contract rejected the call: {0}")]
    ContractRejected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Errors worth retrying: the indexer or node may simply be behind.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::BlockchainRPC(_) | AppError::ExplorerAPI(_))
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut details = None;
        let (status, code, message) = match self {
            AppError::InvalidAddress(_) => {
                (StatusCode::BAD_REQUEST, "INVALID_ADDRESS", self.to_string())
            }
            AppError::InvalidMove(_) => (StatusCode::BAD_REQUEST, "INVALID_MOVE", self.to_string()),
            AppError::InvalidStake => (StatusCode::BAD_REQUEST, "INVALID_STAKE", self.to_string()),
            AppError::SelfPlay => (StatusCode::BAD_REQUEST, "SELF_PLAY", self.to_string()),
            AppError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::CommitmentMissing { .. } => {
                details = Some(serde_json::json!({
                    "recovery": "claim_timeout",
                    "hint": "The move and secret are not cached on this device. Wait for the timeout window and let your opponent claim, or claim the timeout yourself if eligible.",
                }));
                (StatusCode::CONFLICT, "COMMITMENT_MISSING", self.to_string())
            }
            AppError::ContractRejected(ref reason) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "CONTRACT_REJECTED",
                reason.clone(),
            ),
            AppError::BlockchainRPC(ref msg) => {
                (StatusCode::BAD_GATEWAY, "BLOCKCHAIN_RPC_ERROR", msg.clone())
            }
            AppError::ExplorerAPI(ref msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "EXPLORER_ERROR", msg.clone())
            }
            AppError::Storage(ref e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                e.to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                self.to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
