use ethers::types::{H256, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::hash::keccak256;
use crate::error::{AppError, Result};
use crate::models::Move;

/// 256-bit salt bound to a move in a commitment. Revealed as `uint256`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Secret([u8; 32]);

impl Secret {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Big-endian `uint256` view, as passed to `solve`.
    pub fn to_u256(&self) -> U256 {
        U256::from_big_endian(&self.0)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

// Keep secrets out of logs.
impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

impl FromStr for Secret {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() || digits.len() > 64 {
            return Err(AppError::BadRequest("Secret must be 1-64 hex digits".to_string()));
        }
        let padded = format!("{digits:0>64}");
        let decoded = hex::decode(padded)
            .map_err(|e| AppError::BadRequest(format!("Invalid secret hex: {e}")))?;
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Fresh secret from the thread-local CSPRNG. Never reuse one across moves.
pub fn generate_secret() -> Secret {
    Secret(rand::random::<[u8; 32]>())
}

/// `keccak256(abi.encodePacked(uint8 move, uint256 secret))`, the hash the
/// contract recomputes in `solve`.
pub fn compute_commitment(game_move: Move, secret: &Secret) -> H256 {
    let mut packed = [0u8; 33];
    packed[0] = u8::from(game_move);
    packed[1..].copy_from_slice(secret.as_bytes());
    H256::from(keccak256(&packed))
}

pub fn verify_commitment(game_move: Move, secret: &Secret, expected: H256) -> bool {
    compute_commitment(game_move, secret) == expected
}
