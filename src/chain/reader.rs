use ethers::abi::{decode, ParamType, Token};
use ethers::providers::{Http, Middleware, Provider, ProviderError, RpcError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, H256, U256};
use serde_json::Value;

use super::{ChainReader, RpsAbi};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{GameSnapshot, Move, WalletCall};

/// `Error(string)` selector used by Solidity `require` messages.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// JSON-RPC reader over `ethers` HTTP provider.
#[derive(Debug, Clone)]
pub struct EthersChain {
    provider: Provider<Http>,
    abi: RpsAbi,
}

impl EthersChain {
    pub fn new(config: &Config, abi: RpsAbi) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| AppError::Internal(format!("Invalid RPC URL: {}", e)))?;
        Ok(Self { provider, abi })
    }

    async fn view(&self, contract: Address, function: &str) -> Result<Bytes> {
        let tx: TypedTransaction = TransactionRequest::new()
            .to(contract)
            .data(self.abi.encode(function, ())?)
            .into();
        self.provider
            .call(&tx, None)
            .await
            .map_err(|e| AppError::BlockchainRPC(format!("{} read failed: {}", function, e)))
    }

    async fn read<D: ethers::abi::Detokenize>(&self, contract: Address, function: &str) -> Result<D> {
        let raw = self.view(contract, function).await?;
        self.abi.decode_output(function, &raw)
    }
}

fn saturating_u64(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.as_u64()
    }
}

/// Solidity revert payload `Error(string)` to its message.
fn decode_revert_data(data: &[u8]) -> Option<String> {
    if data.len() < 4 || data[..4] != ERROR_STRING_SELECTOR {
        return None;
    }
    match decode(&[ParamType::String], &data[4..]).ok()?.into_iter().next()? {
        Token::String(reason) => Some(reason),
        _ => None,
    }
}

/// Maps a JSON-RPC error body to a contract rejection or a transport failure.
fn classify_call_error(code: i64, message: &str, data: Option<&Value>) -> AppError {
    let reason = data
        .and_then(Value::as_str)
        .and_then(|raw| hex::decode(raw.trim_start_matches("0x")).ok())
        .and_then(|bytes| decode_revert_data(&bytes));

    let is_revert = code == 3 || message.to_ascii_lowercase().contains("revert");
    if !is_revert {
        return AppError::BlockchainRPC(message.to_string());
    }
    let reason = reason.unwrap_or_else(|| {
        message
            .trim_start_matches("execution reverted")
            .trim_start_matches(':')
            .trim()
            .to_string()
    });
    if reason.is_empty() {
        AppError::ContractRejected("execution reverted".to_string())
    } else {
        AppError::ContractRejected(reason)
    }
}

fn map_preflight_error(err: ProviderError) -> AppError {
    match err.as_error_response() {
        Some(rpc) => classify_call_error(rpc.code, &rpc.message, rpc.data.as_ref()),
        None => AppError::BlockchainRPC(err.to_string()),
    }
}

#[async_trait::async_trait]
impl ChainReader for EthersChain {
    async fn read_game(&self, contract: Address) -> Result<GameSnapshot> {
        let (j1, j2, c2, stake, timeout, last_action) = tokio::try_join!(
            self.read::<Address>(contract, "j1"),
            self.read::<Address>(contract, "j2"),
            self.read::<u8>(contract, "c2"),
            self.read::<U256>(contract, "stake"),
            self.read::<U256>(contract, "TIMEOUT"),
            self.read::<U256>(contract, "lastAction"),
        )?;

        let c2 = Move::try_from(c2).map_err(|e| {
            AppError::BlockchainRPC(format!("Contract {:#x} holds invalid c2: {}", contract, e))
        })?;

        Ok(GameSnapshot {
            contract_address: contract,
            j1,
            j2,
            c2,
            stake,
            last_action: saturating_u64(last_action),
            timeout: saturating_u64(timeout),
        })
    }

    async fn commitment_hash(&self, contract: Address) -> Result<H256> {
        self.read::<H256>(contract, "c1Hash").await
    }

    async fn chain_id(&self) -> Result<u64> {
        let id = self
            .provider
            .get_chainid()
            .await
            .map_err(|e| AppError::BlockchainRPC(format!("eth_chainId failed: {}", e)))?;
        Ok(saturating_u64(id))
    }

    async fn preflight(&self, call: &WalletCall, from: Address) -> Result<()> {
        let mut request = TransactionRequest::new()
            .from(from)
            .data(call.data.clone())
            .value(call.value);
        if let Some(to) = call.to {
            request = request.to(to);
        }
        let tx: TypedTransaction = request.into();

        match self.provider.call(&tx, None).await {
            Ok(_) => Ok(()),
            Err(err) => {
                let mapped = map_preflight_error(err);
                tracing::warn!(
                    "Preflight failed call='{}' from={:#x} err={}",
                    call.description,
                    from,
                    mapped
                );
                Err(mapped)
            }
        }
    }
}
