//! Block-explorer access: transaction history for a game contract.

pub mod decode;
pub mod etherscan;
pub mod verify;

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

pub use decode::{find_reveal, find_timeout_claim, interpret_payouts, PayoutVerdict, TimeoutClaim};
pub use etherscan::EtherscanClient;
pub use verify::{CheckOutcome, SourceVerifier, Submission, VerificationRequest};

/// Regular transaction as returned by `module=account&action=txlist`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerTransaction {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub block_number: String,
    #[serde(default)]
    pub time_stamp: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub method_id: String,
    #[serde(default)]
    pub function_name: String,
    #[serde(default)]
    pub is_error: String,
}

/// Value transfer made by a contract, from `action=txlistinternal`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalTransfer {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, rename = "type")]
    pub tx_type: String,
    #[serde(default)]
    pub is_error: String,
}

pub const TXLIST: &str = "txlist";
pub const TXLIST_INTERNAL: &str = "txlistinternal";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExplorerActivity {
    pub transactions: Vec<ExplorerTransaction>,
    pub internal_transfers: Vec<InternalTransfer>,
    /// Lists that failed and stand in as empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<String>,
}

impl ExplorerActivity {
    pub fn transactions_missing(&self) -> bool {
        self.degraded.iter().any(|list| list == TXLIST)
    }
}

/// Joins the two list lookups. One failing list degrades to empty and is
/// named in `degraded`; both failing is an error.
pub fn combine(
    contract: Address,
    transactions: Result<Vec<ExplorerTransaction>>,
    internal: Result<Vec<InternalTransfer>>,
) -> Result<ExplorerActivity> {
    match (transactions, internal) {
        (Err(tx_err), Err(internal_err)) => Err(AppError::ExplorerAPI(format!(
            "{TXLIST}: {tx_err}; {TXLIST_INTERNAL}: {internal_err}"
        ))),
        (transactions, internal) => {
            let mut degraded = Vec::new();
            let transactions = transactions.unwrap_or_else(|err| {
                tracing::warn!("Explorer {} failed contract={:#x} err={}", TXLIST, contract, err);
                degraded.push(TXLIST.to_string());
                Vec::new()
            });
            let internal_transfers = internal.unwrap_or_else(|err| {
                tracing::warn!(
                    "Explorer {} failed contract={:#x} err={}",
                    TXLIST_INTERNAL,
                    contract,
                    err
                );
                degraded.push(TXLIST_INTERNAL.to_string());
                Vec::new()
            });
            Ok(ExplorerActivity {
                transactions,
                internal_transfers,
                degraded,
            })
        }
    }
}

#[async_trait::async_trait]
pub trait BlockExplorer: Send + Sync {
    /// Regular transactions sent to the contract, newest first.
    async fn transactions(&self, contract: Address) -> Result<Vec<ExplorerTransaction>>;

    /// Internal transfers made by the contract, newest first.
    async fn internal_transfers(&self, contract: Address) -> Result<Vec<InternalTransfer>>;

    /// Both lists, see [`combine`].
    async fn activity(&self, contract: Address) -> Result<ExplorerActivity> {
        let transactions = self.transactions(contract).await;
        let internal = self.internal_transfers(contract).await;
        combine(contract, transactions, internal)
    }
}
