use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};

use super::SharedStore;
use crate::constants::{KEY_PREFIX_PENDING, KEY_PREFIX_SALT};
use crate::crypto::commitment::Secret;
use crate::error::Result;
use crate::models::Move;
use crate::utils::{address_key, now_millis};

/// Player 1's hidden move and secret, kept until the reveal lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentEntry {
    #[serde(rename = "move")]
    pub game_move: Move,
    pub secret: Secret,
    pub created_at: i64,
}

#[derive(Clone)]
pub struct CommitmentStore {
    store: SharedStore,
}

fn commitment_key(contract: &Address, player: &Address) -> String {
    format!(
        "{}_{}_{}",
        KEY_PREFIX_SALT,
        address_key(contract),
        address_key(player)
    )
}

/// Before deployment the contract address is unknown; the entry is parked
/// under its commitment hash until the game is registered.
fn pending_key(commitment: &H256, player: &Address) -> String {
    format!(
        "{}_{:#x}_{}",
        KEY_PREFIX_PENDING,
        commitment,
        address_key(player)
    )
}

impl CommitmentStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn persist(
        &self,
        contract: Address,
        player: Address,
        game_move: Move,
        secret: Secret,
    ) -> Result<()> {
        self.write(&commitment_key(&contract, &player), game_move, secret)
            .await?;
        tracing::debug!("Commitment cached contract={:#x} player={:#x}", contract, player);
        Ok(())
    }

    /// Cache misses, unreadable entries and store failures all come back as `None`.
    pub async fn retrieve(&self, contract: Address, player: Address) -> Option<CommitmentEntry> {
        self.read(&commitment_key(&contract, &player)).await
    }

    pub async fn clear(&self, contract: Address, player: Address) -> Result<()> {
        self.store.remove(&commitment_key(&contract, &player)).await
    }

    async fn write(&self, key: &str, game_move: Move, secret: Secret) -> Result<()> {
        let entry = CommitmentEntry {
            game_move,
            secret,
            created_at: now_millis(),
        };
        let raw = serde_json::to_string(&entry)
            .map_err(|e| crate::error::AppError::Internal(e.to_string()))?;
        self.store.set(key, &raw).await
    }

    async fn read(&self, key: &str) -> Option<CommitmentEntry> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!("Commitment read failed key={} err={}", key, err);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!("Commitment entry unreadable key={} err={}", key, err);
                None
            }
        }
    }

    pub async fn persist_pending(
        &self,
        commitment: H256,
        player: Address,
        game_move: Move,
        secret: Secret,
    ) -> Result<()> {
        self.write(&pending_key(&commitment, &player), game_move, secret)
            .await
    }

    /// Moves a parked entry under its deployed contract. Returns `None` when
    /// nothing was parked for this commitment and player.
    pub async fn adopt_pending(
        &self,
        commitment: H256,
        contract: Address,
        player: Address,
    ) -> Result<Option<CommitmentEntry>> {
        let key = pending_key(&commitment, &player);
        let Some(entry) = self.read(&key).await else {
            return Ok(None);
        };
        self.persist(contract, player, entry.game_move, entry.secret)
            .await?;
        if let Err(err) = self.store.remove(&key).await {
            tracing::warn!("Pending commitment cleanup failed key={} err={}", key, err);
        }
        Ok(Some(entry))
    }
}
