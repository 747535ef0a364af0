//! Contract access: state reads and wallet-call preflight.

pub mod abi;
pub mod reader;

use ethers::types::{Address, H256};
use serde::Serialize;

use crate::error::Result;
use crate::models::{GameSnapshot, WalletCall};

pub use abi::RpsAbi;
pub use reader::EthersChain;

#[async_trait::async_trait]
pub trait ChainReader: Send + Sync {
    async fn read_game(&self, contract: Address) -> Result<GameSnapshot>;

    async fn commitment_hash(&self, contract: Address) -> Result<H256>;

    /// Chain id reported by the node.
    async fn chain_id(&self) -> Result<u64>;

    /// Simulates `call` from `from`. A revert becomes `ContractRejected`.
    async fn preflight(&self, call: &WalletCall, from: Address) -> Result<()>;
}

/// Result of comparing the node's chain with the configured one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkCheck {
    pub expected_chain_id: u64,
    /// `None` when the node could not be reached.
    pub node_chain_id: Option<u64>,
    pub matches: bool,
}

pub async fn check_network(chain: &dyn ChainReader, expected_chain_id: u64) -> NetworkCheck {
    let node_chain_id = match chain.chain_id().await {
        Ok(id) => Some(id),
        Err(err) => {
            tracing::warn!("Chain id lookup failed: {}", err);
            None
        }
    };
    NetworkCheck {
        expected_chain_id,
        node_chain_id,
        matches: node_chain_id == Some(expected_chain_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeChain;

    #[tokio::test]
    async fn network_check_flags_wrong_chain() {
        let chain = FakeChain::default();
        let check = check_network(&chain, crate::constants::DEFAULT_CHAIN_ID).await;
        assert!(check.matches);

        *chain.node_chain_id.lock().unwrap() = Some(1);
        let check = check_network(&chain, crate::constants::DEFAULT_CHAIN_ID).await;
        assert!(!check.matches);
        assert_eq!(check.node_chain_id, Some(1));
    }
}
