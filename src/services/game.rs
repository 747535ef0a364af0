use ethers::types::{Address, H256, U256};
use serde::Serialize;
use std::sync::Arc;

use crate::chain::{ChainReader, RpsAbi};
use crate::crypto::commitment::{compute_commitment, generate_secret, verify_commitment, Secret};
use crate::error::{AppError, Result};
use crate::explorer::{BlockExplorer, ExplorerActivity};
use crate::game::phase::report;
use crate::game::{available_actions, GameAction, PhaseReport, ResolutionState};
use crate::models::{
    GamePhase, GameSnapshot, GameStatus, HistoryEntry, Move, OutcomeRecord, Role, WalletCall,
};
use crate::resolver::OutcomeResolver;
use crate::store::{CommitmentStore, HistoryStore};
use crate::utils::now_secs;

#[derive(Debug, Clone, Serialize)]
pub struct CreateGamePlan {
    pub call: WalletCall,
    pub commitment: H256,
    /// Returned so the player can keep an off-device backup.
    pub secret: Secret,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameView {
    pub game: GameSnapshot,
    #[serde(flatten)]
    pub phase: PhaseReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<OutcomeRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutcomeView {
    pub resolution: ResolutionState,
    /// 0 tie, 1 player 1, 2 player 2.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_code: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Game lifecycle: prepares wallet calls, keeps the commitment cache and
/// history in step, and hands completed games to the resolver.
pub struct GameService {
    chain: Arc<dyn ChainReader>,
    explorer: Arc<dyn BlockExplorer>,
    abi: RpsAbi,
    bytecode: Option<String>,
    commitments: CommitmentStore,
    history: HistoryStore,
    resolver: Arc<OutcomeResolver>,
}

impl GameService {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        explorer: Arc<dyn BlockExplorer>,
        abi: RpsAbi,
        bytecode: Option<String>,
        commitments: CommitmentStore,
        history: HistoryStore,
        resolver: Arc<OutcomeResolver>,
    ) -> Self {
        Self {
            chain,
            explorer,
            abi,
            bytecode,
            commitments,
            history,
            resolver,
        }
    }

    pub fn resolver(&self) -> &Arc<OutcomeResolver> {
        &self.resolver
    }

    async fn read_live_game(&self, contract: Address) -> Result<GameSnapshot> {
        let game = self.chain.read_game(contract).await?;
        if game.j1.is_zero() {
            return Err(AppError::NotFound(format!(
                "No RPS game at {:#x}",
                contract
            )));
        }
        Ok(game)
    }

    /// Generates the secret, parks the commitment and builds the deploy call.
    pub async fn create_game(
        &self,
        player1: Address,
        player2: Address,
        stake: U256,
        game_move: Move,
    ) -> Result<CreateGamePlan> {
        if player2.is_zero() {
            return Err(AppError::InvalidAddress(
                "Opponent address is the zero address".to_string(),
            ));
        }
        if player1 == player2 {
            return Err(AppError::SelfPlay);
        }
        if stake.is_zero() {
            return Err(AppError::InvalidStake);
        }
        let game_move = game_move.ensure_playable()?;
        let bytecode = self
            .bytecode
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("RPS_BYTECODE is not configured".to_string()))?;

        let secret = generate_secret();
        let commitment = compute_commitment(game_move, &secret);
        let call = self.abi.deploy(bytecode, commitment, player2, stake)?;
        self.chain.preflight(&call, player1).await?;

        self.commitments
            .persist_pending(commitment, player1, game_move, secret)
            .await?;

        tracing::info!(
            "Prepared game deploy player1={:#x} player2={:#x} stake={}",
            player1,
            player2,
            stake
        );
        Ok(CreateGamePlan {
            call,
            commitment,
            secret,
        })
    }

    /// Called once the deploy transaction is mined: binds the parked commitment
    /// to the contract and records the game in player 1's history.
    pub async fn register_game(&self, contract: Address, player1: Address) -> Result<GameView> {
        let game = self.read_live_game(contract).await?;
        if game.j1 != player1 {
            return Err(AppError::BadRequest(format!(
                "{:#x} is not player 1 of {:#x}",
                player1, contract
            )));
        }

        let c1_hash = self.chain.commitment_hash(contract).await?;
        match self
            .commitments
            .adopt_pending(c1_hash, contract, player1)
            .await?
        {
            Some(_) => tracing::info!("Game registered contract={:#x}", contract),
            None => tracing::warn!(
                "Game registered without a cached commitment contract={:#x}",
                contract
            ),
        }

        self.history
            .record(
                player1,
                contract,
                Role::Player1,
                game.j2,
                game.stake,
                Some(GameStatus::Created),
            )
            .await?;

        self.view(game, Some(player1)).await
    }

    pub async fn join_game(
        &self,
        contract: Address,
        player: Address,
        game_move: Move,
    ) -> Result<WalletCall> {
        let game = self.read_live_game(contract).await?;
        if game.j2 != player {
            return Err(AppError::BadRequest(
                "Only the invited opponent can join this game".to_string(),
            ));
        }
        if !available_actions(&game, Some(player), now_secs()).contains(&GameAction::Join) {
            return Err(AppError::BadRequest(
                "This game is no longer waiting for player 2".to_string(),
            ));
        }

        let call = self.abi.play(contract, game_move, game.stake)?;
        self.chain.preflight(&call, player).await?;

        self.history
            .record(
                player,
                contract,
                Role::Player2,
                game.j1,
                game.stake,
                Some(GameStatus::Joined),
            )
            .await?;
        Ok(call)
    }

    /// Builds `solve` from the cached commitment. A missing or mismatching
    /// entry is reported as cache loss with the timeout path as recovery.
    pub async fn reveal(&self, contract: Address, player: Address) -> Result<WalletCall> {
        let game = self.read_live_game(contract).await?;
        if game.j1 != player {
            return Err(AppError::BadRequest(
                "Only player 1 can reveal".to_string(),
            ));
        }
        if !available_actions(&game, Some(player), now_secs()).contains(&GameAction::Reveal) {
            return Err(AppError::BadRequest(
                "Nothing to reveal: player 2 has not played or the game is over".to_string(),
            ));
        }

        let missing = || AppError::CommitmentMissing {
            contract: format!("{:#x}", contract),
            player: format!("{:#x}", player),
        };
        let entry = self
            .commitments
            .retrieve(contract, player)
            .await
            .ok_or_else(missing)?;

        let c1_hash = self.chain.commitment_hash(contract).await?;
        if !verify_commitment(entry.game_move, &entry.secret, c1_hash) {
            tracing::warn!(
                "Cached commitment does not match c1Hash contract={:#x}",
                contract
            );
            return Err(missing());
        }

        let call = self.abi.solve(contract, entry.game_move, &entry.secret)?;
        self.chain.preflight(&call, player).await?;

        if let Err(err) = self
            .history
            .update_status(player, contract, GameStatus::Revealed)
            .await
        {
            tracing::warn!("History update failed contract={:#x} err={}", contract, err);
        }
        Ok(call)
    }

    pub async fn claim_timeout(&self, contract: Address, player: Address) -> Result<WalletCall> {
        let game = self.read_live_game(contract).await?;
        let now = now_secs();
        let actions = available_actions(&game, Some(player), now);

        let call = if actions.contains(&GameAction::ClaimJ2Timeout) {
            self.abi.j2_timeout(contract)?
        } else if actions.contains(&GameAction::ClaimJ1Timeout) {
            self.abi.j1_timeout(contract)?
        } else if game.stake.is_zero() {
            return Err(AppError::BadRequest("Game already completed".to_string()));
        } else if !crate::game::timeout_elapsed(&game, now) {
            return Err(AppError::ContractRejected(
                "Timeout time has not passed".to_string(),
            ));
        } else {
            return Err(AppError::BadRequest(
                "No timeout claim is available to this player".to_string(),
            ));
        };

        self.chain.preflight(&call, player).await?;

        if let Err(err) = self
            .history
            .update_status(player, contract, GameStatus::Timeout)
            .await
        {
            tracing::warn!("History update failed contract={:#x} err={}", contract, err);
        }
        Ok(call)
    }

    async fn view(&self, game: GameSnapshot, viewer: Option<Address>) -> Result<GameView> {
        let phase = report(&game, viewer, now_secs());
        let outcome = if phase.phase == GamePhase::Completed {
            self.resolver.cached_outcome(game.contract_address).await
        } else {
            None
        };
        Ok(GameView {
            game,
            phase,
            outcome,
        })
    }

    pub async fn game_state(&self, contract: Address, viewer: Option<Address>) -> Result<GameView> {
        let game = self.chain.read_game(contract).await?;
        self.view(game, viewer).await
    }

    pub async fn outcome(&self, contract: Address, viewer: Option<Address>) -> Result<OutcomeView> {
        let resolution = self.resolver.resolve(contract).await?;
        self.outcome_view(contract, viewer, resolution).await
    }

    pub async fn refresh_outcome(
        &self,
        contract: Address,
        viewer: Option<Address>,
    ) -> Result<OutcomeView> {
        let resolution = self.resolver.refresh(contract).await?;
        self.outcome_view(contract, viewer, resolution).await
    }

    async fn outcome_view(
        &self,
        contract: Address,
        viewer: Option<Address>,
        resolution: ResolutionState,
    ) -> Result<OutcomeView> {
        let Some(outcome) = resolution.outcome.clone() else {
            return Ok(OutcomeView {
                resolution,
                winner_code: None,
                summary: None,
            });
        };

        let summary = viewer.map(|v| outcome.summary(outcome.is_player1(v)));
        if let Some(viewer) = viewer {
            let status = if outcome.provenance == crate::models::Provenance::Timeout {
                GameStatus::Timeout
            } else {
                GameStatus::Completed
            };
            if let Err(err) = self.history.update_status(viewer, contract, status).await {
                tracing::warn!("History update failed contract={:#x} err={}", contract, err);
            }
        }
        Ok(OutcomeView {
            resolution,
            winner_code: Some(outcome.winner.code()),
            summary,
        })
    }

    pub async fn history(&self, player: Address) -> Vec<HistoryEntry> {
        self.history.list(player).await
    }

    pub async fn update_history_status(
        &self,
        player: Address,
        contract: Address,
        status: GameStatus,
    ) -> Result<()> {
        if !self.history.update_status(player, contract, status).await? {
            return Err(AppError::NotFound(format!(
                "{:#x} is not in the history of {:#x}",
                contract, player
            )));
        }
        Ok(())
    }

    pub async fn clear_history(&self, player: Address) -> Result<()> {
        self.history.clear(player).await
    }

    pub async fn explorer_activity(&self, contract: Address) -> Result<ExplorerActivity> {
        self.explorer.activity(contract).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, ResultStore};
    use crate::testing::{addr, snapshot, FakeChain, FakeExplorer};
    use crate::models::Provenance;

    struct Harness {
        service: GameService,
        chain: Arc<FakeChain>,
        commitments: CommitmentStore,
    }

    fn harness(game: GameSnapshot) -> Harness {
        let memory = Arc::new(MemoryStore::new());
        let commitments = CommitmentStore::new(memory.clone());
        let history = HistoryStore::new(memory.clone());
        let results = ResultStore::new(memory);
        let chain = Arc::new(FakeChain::with_game(game));
        let explorer = Arc::new(FakeExplorer::default());
        let resolver = Arc::new(OutcomeResolver::new(
            chain.clone(),
            explorer.clone(),
            commitments.clone(),
            results,
        ));
        let service = GameService::new(
            chain.clone(),
            explorer,
            RpsAbi::load().unwrap(),
            Some("0x6080".to_string()),
            commitments.clone(),
            history,
            resolver,
        );
        Harness {
            service,
            chain,
            commitments,
        }
    }

    #[tokio::test]
    async fn create_validates_inputs() {
        let h = harness(snapshot(Move::Null, 10));
        let stake = U256::from(10);

        assert!(matches!(
            h.service.create_game(addr(1), addr(1), stake, Move::Rock).await,
            Err(AppError::SelfPlay)
        ));
        assert!(matches!(
            h.service.create_game(addr(1), addr(2), U256::zero(), Move::Rock).await,
            Err(AppError::InvalidStake)
        ));
        assert!(matches!(
            h.service.create_game(addr(1), addr(2), stake, Move::Null).await,
            Err(AppError::InvalidMove(_))
        ));
        assert!(matches!(
            h.service
                .create_game(addr(1), Address::zero(), stake, Move::Rock)
                .await,
            Err(AppError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn create_then_register_then_reveal() {
        let h = harness(snapshot(Move::Null, 10));
        let plan = h
            .service
            .create_game(addr(1), addr(2), U256::from(10), Move::Lizard)
            .await
            .unwrap();
        assert_eq!(plan.commitment, compute_commitment(Move::Lizard, &plan.secret));
        assert_eq!(plan.call.value, U256::from(10));
        assert_eq!(h.chain.preflights.lock().unwrap().len(), 1);

        // Deployed: the contract reports the commitment as c1Hash.
        *h.chain.c1_hash.lock().unwrap() = plan.commitment;
        let view = h.service.register_game(addr(9), addr(1)).await.unwrap();
        assert_eq!(view.phase.phase, GamePhase::AwaitingPlayer2);
        assert_eq!(
            h.commitments.retrieve(addr(9), addr(1)).await.unwrap().game_move,
            Move::Lizard
        );
        let history = h.service.history(addr(1)).await;
        assert_eq!(history[0].status, Some(GameStatus::Created));

        // Player 2 plays.
        h.chain.set_game(snapshot(Move::Spock, 10));
        let call = h.service.reveal(addr(9), addr(1)).await.unwrap();
        assert_eq!(&call.data[..4], &crate::crypto::hash::selector("solve(uint8,uint256)"));
        assert_eq!(
            h.service.history(addr(1)).await[0].status,
            Some(GameStatus::Revealed)
        );
    }

    #[tokio::test]
    async fn reveal_without_cache_points_to_timeout_recovery() {
        let h = harness(snapshot(Move::Rock, 10));
        let err = h.service.reveal(addr(9), addr(1)).await.unwrap_err();
        assert!(matches!(err, AppError::CommitmentMissing { .. }));
    }

    #[tokio::test]
    async fn reveal_with_mismatching_cache_is_cache_loss() {
        let h = harness(snapshot(Move::Rock, 10));
        h.commitments
            .persist(addr(9), addr(1), Move::Paper, generate_secret())
            .await
            .unwrap();
        *h.chain.c1_hash.lock().unwrap() = H256::repeat_byte(1);
        let err = h.service.reveal(addr(9), addr(1)).await.unwrap_err();
        assert!(matches!(err, AppError::CommitmentMissing { .. }));
    }

    #[tokio::test]
    async fn only_invited_player_joins() {
        let h = harness(snapshot(Move::Null, 10));
        assert!(h.service.join_game(addr(9), addr(3), Move::Rock).await.is_err());
        let call = h.service.join_game(addr(9), addr(2), Move::Rock).await.unwrap();
        assert_eq!(call.value, U256::from(10));
        assert_eq!(
            h.service.history(addr(2)).await[0].role,
            Role::Player2
        );
    }

    #[tokio::test]
    async fn early_timeout_claim_is_rejected() {
        let mut game = snapshot(Move::Rock, 10);
        game.last_action = now_secs();
        let h = harness(game);
        let err = h.service.claim_timeout(addr(9), addr(2)).await.unwrap_err();
        assert!(matches!(err, AppError::ContractRejected(ref r) if r == "Timeout time has not passed"));
    }

    #[tokio::test]
    async fn elapsed_timeout_claim_picks_the_right_function() {
        // last_action 1000 + 300 is long past.
        let h = harness(snapshot(Move::Rock, 10));
        let call = h.service.claim_timeout(addr(9), addr(2)).await.unwrap();
        assert_eq!(&call.data[..], &crate::crypto::hash::selector("j1Timeout()"));

        let h = harness(snapshot(Move::Null, 10));
        let call = h.service.claim_timeout(addr(9), addr(1)).await.unwrap();
        assert_eq!(&call.data[..], &crate::crypto::hash::selector("j2Timeout()"));
    }

    #[tokio::test]
    async fn preflight_rejection_surfaces() {
        let h = harness(snapshot(Move::Null, 10));
        *h.chain.reject_with.lock().unwrap() = Some("bad stake".to_string());
        let err = h.service.join_game(addr(9), addr(2), Move::Rock).await.unwrap_err();
        assert!(matches!(err, AppError::ContractRejected(_)));
        assert!(h.service.history(addr(2)).await.is_empty());
    }

    #[tokio::test]
    async fn outcome_marks_history_and_summarises() {
        let h = harness(snapshot(Move::Scissors, 0));
        h.commitments
            .persist(addr(9), addr(1), Move::Rock, generate_secret())
            .await
            .unwrap();
        h.service
            .history
            .record(addr(1), addr(9), Role::Player1, addr(2), U256::one(), Some(GameStatus::Revealed))
            .await
            .unwrap();

        let view = h.service.outcome(addr(9), Some(addr(1))).await.unwrap();
        assert_eq!(view.summary.as_deref(), Some("You won! Rock beats Scissors"));
        assert_eq!(view.winner_code, Some(1));
        assert_eq!(
            view.resolution.outcome.unwrap().provenance,
            Provenance::Local
        );
        assert_eq!(
            h.service.history(addr(1)).await[0].status,
            Some(GameStatus::Completed)
        );
    }

    #[tokio::test]
    async fn unknown_history_entry_is_not_found() {
        let h = harness(snapshot(Move::Null, 10));
        let err = h
            .service
            .update_history_status(addr(1), addr(77), GameStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
