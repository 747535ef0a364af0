use ethers::types::{Address, U256};

use super::SharedStore;
use crate::constants::{KEY_PREFIX_HISTORY, MAX_HISTORY};
use crate::error::{AppError, Result};
use crate::models::{GameStatus, HistoryEntry, Role};
use crate::utils::{address_key, now_millis};

/// Per-player index of games, most recent first. Not authoritative.
#[derive(Clone)]
pub struct HistoryStore {
    store: SharedStore,
}

fn history_key(player: &Address) -> String {
    format!("{}_{}", KEY_PREFIX_HISTORY, address_key(player))
}

impl HistoryStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn list(&self, player: Address) -> Vec<HistoryEntry> {
        let key = history_key(&player);
        match self.store.get(&key).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                tracing::warn!("History unreadable key={} err={}", key, err);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(err) => {
                tracing::warn!("History read failed key={} err={}", key, err);
                Vec::new()
            }
        }
    }

    async fn write(&self, player: &Address, entries: &[HistoryEntry]) -> Result<()> {
        let raw = serde_json::to_string(entries).map_err(|e| AppError::Internal(e.to_string()))?;
        self.store.set(&history_key(player), &raw).await
    }

    /// Upsert by contract: the entry moves to the front with a fresh timestamp.
    pub async fn record(
        &self,
        player: Address,
        contract: Address,
        role: Role,
        opponent: Address,
        stake: U256,
        status: Option<GameStatus>,
    ) -> Result<HistoryEntry> {
        let entry = HistoryEntry {
            contract_address: contract,
            role,
            opponent,
            stake: stake.to_string(),
            timestamp: now_millis(),
            status,
        };

        let mut entries = self.list(player).await;
        entries.retain(|existing| existing.contract_address != contract);
        entries.insert(0, entry.clone());
        entries.truncate(MAX_HISTORY);

        self.write(&player, &entries).await?;
        Ok(entry)
    }

    /// Returns `false` when the contract is not in the player's history.
    pub async fn update_status(
        &self,
        player: Address,
        contract: Address,
        status: GameStatus,
    ) -> Result<bool> {
        let mut entries = self.list(player).await;
        let Some(index) = entries
            .iter()
            .position(|existing| existing.contract_address == contract)
        else {
            return Ok(false);
        };

        let mut entry = entries.remove(index);
        if entry.status == Some(status) {
            entries.insert(index, entry);
            return Ok(true);
        }
        entry.status = Some(status);
        entry.timestamp = now_millis();
        entries.insert(0, entry);

        self.write(&player, &entries).await?;
        Ok(true)
    }

    pub async fn clear(&self, player: Address) -> Result<()> {
        self.store.remove(&history_key(&player)).await
    }
}
