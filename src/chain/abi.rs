use ethers::abi::{parse_abi, Detokenize, Token, Tokenize};
use ethers::contract::BaseContract;
use ethers::types::{Address, Bytes, H256, U256};

use crate::constants::RPS_ABI;
use crate::crypto::commitment::Secret;
use crate::error::{AppError, Result};
use crate::models::{Move, WalletCall};

/// `abi.encode(bytes32 c1Hash, address j2)`, appended to the creation code.
pub fn constructor_args(commitment: H256, j2: Address) -> Vec<u8> {
    ethers::abi::encode(&[
        Token::FixedBytes(commitment.as_bytes().to_vec()),
        Token::Address(j2),
    ])
}

/// RPS contract interface: read encoding and wallet-call builders.
#[derive(Debug, Clone)]
pub struct RpsAbi {
    contract: BaseContract,
}

impl RpsAbi {
    pub fn load() -> Result<Self> {
        let abi = parse_abi(RPS_ABI)
            .map_err(|e| AppError::Internal(format!("RPS ABI parse failed: {}", e)))?;
        Ok(Self {
            contract: BaseContract::from(abi),
        })
    }

    pub fn encode<T: Tokenize>(&self, function: &str, args: T) -> Result<Bytes> {
        self.contract
            .encode(function, args)
            .map_err(|e| AppError::Internal(format!("Encode {} failed: {}", function, e)))
    }

    pub fn decode_output<D: Detokenize>(&self, function: &str, data: &Bytes) -> Result<D> {
        self.contract
            .decode_output(function, data)
            .map_err(|e| AppError::BlockchainRPC(format!("Decode {} output failed: {}", function, e)))
    }

    /// Creation code followed by `abi.encode(bytes32 c1Hash, address j2)`.
    pub fn deploy(
        &self,
        bytecode_hex: &str,
        commitment: H256,
        j2: Address,
        stake: U256,
    ) -> Result<WalletCall> {
        let trimmed = bytecode_hex.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let mut data = hex::decode(digits)
            .map_err(|e| AppError::Internal(format!("RPS_BYTECODE is not hex: {}", e)))?;
        if data.is_empty() {
            return Err(AppError::Internal("RPS_BYTECODE is empty".to_string()));
        }
        data.extend(constructor_args(commitment, j2));

        Ok(WalletCall {
            to: None,
            data: Bytes::from(data),
            value: stake,
            description: "Deploy RPS game".to_string(),
        })
    }

    pub fn play(&self, contract: Address, game_move: Move, stake: U256) -> Result<WalletCall> {
        let game_move = game_move.ensure_playable()?;
        Ok(WalletCall {
            to: Some(contract),
            data: self.encode("play", u8::from(game_move))?,
            value: stake,
            description: format!("Play {}", game_move),
        })
    }

    pub fn solve(&self, contract: Address, game_move: Move, secret: &Secret) -> Result<WalletCall> {
        let game_move = game_move.ensure_playable()?;
        Ok(WalletCall {
            to: Some(contract),
            data: self.encode("solve", (u8::from(game_move), secret.to_u256()))?,
            value: U256::zero(),
            description: "Reveal move".to_string(),
        })
    }

    pub fn j1_timeout(&self, contract: Address) -> Result<WalletCall> {
        Ok(WalletCall {
            to: Some(contract),
            data: self.encode("j1Timeout", ())?,
            value: U256::zero(),
            description: "Claim pot: player 1 did not reveal".to_string(),
        })
    }

    pub fn j2_timeout(&self, contract: Address) -> Result<WalletCall> {
        Ok(WalletCall {
            to: Some(contract),
            data: self.encode("j2Timeout", ())?,
            value: U256::zero(),
            description: "Reclaim stake: player 2 did not play".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::selector;
    use crate::constants::{SIG_J1_TIMEOUT, SIG_J2_TIMEOUT, SIG_PLAY, SIG_SOLVE};

    fn abi() -> RpsAbi {
        RpsAbi::load().unwrap()
    }

    #[test]
    fn solve_calldata_is_selector_move_and_salt() {
        let secret: Secret = "0x2a".parse().unwrap();
        let call = abi()
            .solve(Address::from_low_u64_be(9), Move::Rock, &secret)
            .unwrap();
        let data = call.data.to_vec();
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[..4], &selector(SIG_SOLVE));
        assert_eq!(data[35], 1);
        assert_eq!(data[67], 42);
        assert!(call.value.is_zero());
    }

    #[test]
    fn play_carries_stake_and_rejects_null() {
        let call = abi()
            .play(Address::from_low_u64_be(9), Move::Paper, U256::from(100))
            .unwrap();
        assert_eq!(&call.data[..4], &selector(SIG_PLAY));
        assert_eq!(call.data[35], 2);
        assert_eq!(call.value, U256::from(100));

        assert!(abi()
            .play(Address::from_low_u64_be(9), Move::Null, U256::from(100))
            .is_err());
    }

    #[test]
    fn timeout_calls_use_signature_selectors() {
        let contract = Address::from_low_u64_be(9);
        assert_eq!(
            abi().j1_timeout(contract).unwrap().data.to_vec(),
            selector(SIG_J1_TIMEOUT).to_vec()
        );
        assert_eq!(
            abi().j2_timeout(contract).unwrap().data.to_vec(),
            selector(SIG_J2_TIMEOUT).to_vec()
        );
    }

    #[test]
    fn deploy_appends_constructor_args() {
        let commitment = H256::repeat_byte(0xab);
        let j2 = Address::from_low_u64_be(2);
        let call = abi()
            .deploy("0x6080", commitment, j2, U256::from(5))
            .unwrap();
        let data = call.data.to_vec();
        assert_eq!(call.to, None);
        assert_eq!(&data[..2], &[0x60, 0x80]);
        assert_eq!(data.len(), 2 + 64);
        assert_eq!(&data[2..34], commitment.as_bytes());
        assert_eq!(data[65], 2);
    }

    #[test]
    fn deploy_requires_bytecode() {
        assert!(abi()
            .deploy("", H256::zero(), Address::zero(), U256::one())
            .is_err());
        assert!(abi()
            .deploy("0xzz", H256::zero(), Address::zero(), U256::one())
            .is_err());
    }

    #[test]
    fn decode_address_output() {
        let encoded = Bytes::from(ethers::abi::encode(&[Token::Address(
            Address::from_low_u64_be(7),
        )]));
        let decoded: Address = abi().decode_output("j1", &encoded).unwrap();
        assert_eq!(decoded, Address::from_low_u64_be(7));
    }
}
