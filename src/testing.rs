//! In-memory chain, explorer and verifier doubles shared by service-level tests.

use ethers::types::{Address, H256, U256};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::chain::ChainReader;
use crate::constants::DEFAULT_CHAIN_ID;
use crate::error::{AppError, Result};
use crate::explorer::{
    combine, BlockExplorer, CheckOutcome, ExplorerActivity, ExplorerTransaction,
    InternalTransfer, SourceVerifier, Submission, VerificationRequest,
};
use crate::models::{GameSnapshot, Move, WalletCall};

pub fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

pub fn snapshot(c2: Move, stake: u64) -> GameSnapshot {
    GameSnapshot {
        contract_address: addr(9),
        j1: addr(1),
        j2: addr(2),
        c2,
        stake: U256::from(stake),
        last_action: 1_000,
        timeout: 300,
    }
}

#[derive(Default)]
pub struct FakeChain {
    pub game: Mutex<Option<GameSnapshot>>,
    pub c1_hash: Mutex<H256>,
    pub reject_with: Mutex<Option<String>>,
    pub preflights: Mutex<Vec<(WalletCall, Address)>>,
    pub reads: AtomicUsize,
    /// 1-based `read_game` calls that fail with a transient RPC error.
    pub failing_reads: Mutex<Vec<usize>>,
    /// Chain id the node reports; `None` means the configured default.
    pub node_chain_id: Mutex<Option<u64>>,
}

impl FakeChain {
    pub fn with_game(game: GameSnapshot) -> Self {
        let chain = Self::default();
        *chain.game.lock().unwrap() = Some(game);
        chain
    }

    pub fn set_game(&self, game: GameSnapshot) {
        *self.game.lock().unwrap() = Some(game);
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, reads: &[usize]) {
        *self.failing_reads.lock().unwrap() = reads.to_vec();
    }
}

#[async_trait::async_trait]
impl ChainReader for FakeChain {
    async fn read_game(&self, contract: Address) -> Result<GameSnapshot> {
        let read = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_reads.lock().unwrap().contains(&read) {
            return Err(AppError::BlockchainRPC("node timeout".to_string()));
        }
        match self.game.lock().unwrap().clone() {
            Some(game) if game.contract_address == contract => Ok(game),
            _ => Ok(GameSnapshot {
                contract_address: contract,
                j1: Address::zero(),
                j2: Address::zero(),
                c2: Move::Null,
                stake: U256::zero(),
                last_action: 0,
                timeout: 0,
            }),
        }
    }

    async fn commitment_hash(&self, _contract: Address) -> Result<H256> {
        Ok(*self.c1_hash.lock().unwrap())
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.node_chain_id.lock().unwrap().unwrap_or(DEFAULT_CHAIN_ID))
    }

    async fn preflight(&self, call: &WalletCall, from: Address) -> Result<()> {
        self.preflights.lock().unwrap().push((call.clone(), from));
        match self.reject_with.lock().unwrap().clone() {
            Some(reason) => Err(AppError::ContractRejected(reason)),
            None => Ok(()),
        }
    }
}

/// Explorer returning canned lists. `failures` leading lookups error out
/// entirely; `txlist_failures` leading lookups lose only the regular list.
#[derive(Default)]
pub struct FakeExplorer {
    pub transactions: Mutex<Vec<ExplorerTransaction>>,
    pub internal: Mutex<Vec<InternalTransfer>>,
    pub failures: AtomicUsize,
    pub txlist_failures: AtomicUsize,
    pub calls: AtomicUsize,
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl FakeExplorer {
    pub fn with(transactions: Vec<ExplorerTransaction>, internal: Vec<InternalTransfer>) -> Self {
        Self {
            transactions: Mutex::new(transactions),
            internal: Mutex::new(internal),
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn push_transaction(&self, tx: ExplorerTransaction) {
        self.transactions.lock().unwrap().push(tx);
    }
}

#[async_trait::async_trait]
impl BlockExplorer for FakeExplorer {
    async fn transactions(&self, _contract: Address) -> Result<Vec<ExplorerTransaction>> {
        if take_one(&self.txlist_failures) {
            return Err(AppError::ExplorerAPI("txlist timed out".to_string()));
        }
        Ok(self.transactions.lock().unwrap().clone())
    }

    async fn internal_transfers(&self, _contract: Address) -> Result<Vec<InternalTransfer>> {
        Ok(self.internal.lock().unwrap().clone())
    }

    async fn activity(&self, contract: Address) -> Result<ExplorerActivity> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.failures) {
            return Err(AppError::ExplorerAPI("Max rate limit reached".to_string()));
        }
        let transactions = self.transactions(contract).await;
        let internal = self.internal_transfers(contract).await;
        combine(contract, transactions, internal)
    }
}

/// Verifier replaying scripted submission replies in order. Once the script
/// runs out every submission reports the contract as not indexed.
pub struct FakeVerifier {
    pub api_key: bool,
    pub submissions: Mutex<Vec<Submission>>,
    pub check: Mutex<CheckOutcome>,
    pub last_request: Mutex<Option<VerificationRequest>>,
    pub submits: AtomicUsize,
}

impl FakeVerifier {
    pub fn scripted(submissions: Vec<Submission>) -> Self {
        Self {
            api_key: true,
            submissions: Mutex::new(submissions),
            check: Mutex::new(CheckOutcome::Pending),
            last_request: Mutex::new(None),
            submits: AtomicUsize::new(0),
        }
    }

    pub fn without_key() -> Self {
        Self {
            api_key: false,
            ..Self::scripted(Vec::new())
        }
    }

    pub fn submit_count(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SourceVerifier for FakeVerifier {
    fn has_api_key(&self) -> bool {
        self.api_key
    }

    async fn submit(&self, request: &VerificationRequest) -> Result<Submission> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        let mut script = self.submissions.lock().unwrap();
        if script.is_empty() {
            return Ok(Submission::NotIndexed);
        }
        Ok(script.remove(0))
    }

    async fn check_status(&self, _guid: &str) -> Result<CheckOutcome> {
        Ok(self.check.lock().unwrap().clone())
    }
}
