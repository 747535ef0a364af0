use ethers::types::Address;

use super::SharedStore;
use crate::constants::KEY_PREFIX_RESULT;
use crate::error::{AppError, Result};
use crate::models::OutcomeRecord;
use crate::utils::address_key;

/// Resolved outcomes, one per contract.
#[derive(Clone)]
pub struct ResultStore {
    store: SharedStore,
}

fn result_key(contract: &Address) -> String {
    format!("{}_{}", KEY_PREFIX_RESULT, address_key(contract))
}

impl ResultStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, contract: Address) -> Option<OutcomeRecord> {
        let key = result_key(&contract);
        match self.store.get(&key).await {
            Ok(Some(raw)) => serde_json::from_str(&raw)
                .map_err(|err| tracing::warn!("Outcome record unreadable key={} err={}", key, err))
                .ok(),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!("Outcome read failed key={} err={}", key, err);
                None
            }
        }
    }

    /// Writes `record` unless a cached record from a higher-ranked source exists.
    /// Returns the record that ends up cached.
    pub async fn save(&self, record: OutcomeRecord) -> Result<OutcomeRecord> {
        if let Some(existing) = self.get(record.contract_address).await {
            if existing.provenance.rank() < record.provenance.rank() {
                tracing::debug!(
                    "Keeping {:?} outcome for {:#x} over {:?}",
                    existing.provenance,
                    record.contract_address,
                    record.provenance
                );
                return Ok(existing);
            }
        }
        let raw = serde_json::to_string(&record).map_err(|e| AppError::Internal(e.to_string()))?;
        self.store
            .set(&result_key(&record.contract_address), &raw)
            .await?;
        Ok(record)
    }
}
