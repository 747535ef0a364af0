//! Reconstructs the result of a completed game.
//!
//! Sources are tried in rank order on every attempt: local cache, explorer
//! transaction trace, timeout claim. Inconclusive attempts are retried on the
//! backoff schedule in [`crate::constants::RESOLVER_RETRY_DELAYS_MS`]; the
//! bookkeeping lives in [`ResolutionState`].

pub mod sources;

use ethers::types::Address;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::chain::ChainReader;
use crate::error::{AppError, Result};
use crate::explorer::{BlockExplorer, TXLIST};
use crate::game::{classify_phase, ResolutionEvent, ResolutionState, ResolutionStatus};
use crate::models::{GamePhase, GameSnapshot, OutcomeRecord, Provenance};
use crate::store::{CommitmentStore, ResultStore};

pub struct OutcomeResolver {
    chain: Arc<dyn ChainReader>,
    explorer: Arc<dyn BlockExplorer>,
    commitments: CommitmentStore,
    results: ResultStore,
    states: RwLock<HashMap<Address, ResolutionState>>,
    locks: RwLock<HashMap<Address, Arc<Mutex<()>>>>,
}

impl OutcomeResolver {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        explorer: Arc<dyn BlockExplorer>,
        commitments: CommitmentStore,
        results: ResultStore,
    ) -> Self {
        Self {
            chain,
            explorer,
            commitments,
            results,
            states: RwLock::new(HashMap::new()),
            locks: RwLock::new(HashMap::new()),
        }
    }

    pub async fn cached_outcome(&self, contract: Address) -> Option<OutcomeRecord> {
        self.results.get(contract).await
    }

    async fn lock_for(&self, contract: Address) -> Arc<Mutex<()>> {
        {
            let guard = self.locks.read().await;
            if let Some(lock) = guard.get(&contract) {
                return lock.clone();
            }
        }
        let mut guard = self.locks.write().await;
        guard
            .entry(contract)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn transition(&self, contract: Address, event: ResolutionEvent) -> ResolutionState {
        let mut states = self.states.write().await;
        let current = states
            .remove(&contract)
            .unwrap_or_else(|| ResolutionState::new(contract));
        let next = current.update(event);
        states.insert(contract, next.clone());
        next
    }

    /// Resolves a completed game, retrying while inconclusive. A game given
    /// up on is returned as is.
    pub async fn resolve(&self, contract: Address) -> Result<ResolutionState> {
        self.run(contract, ResolutionEvent::Start).await
    }

    /// User-requested retry: starts over at the local cache.
    pub async fn refresh(&self, contract: Address) -> Result<ResolutionState> {
        self.run(contract, ResolutionEvent::ManualRefresh).await
    }

    /// Stops pending retries. Later events for the run are ignored.
    pub async fn cancel(&self, contract: Address) {
        let mut states = self.states.write().await;
        let Some(current) = states.remove(&contract) else {
            return;
        };
        let next = current.update(ResolutionEvent::Cancel);
        if next.status == ResolutionStatus::Cancelled {
            tracing::debug!("Outcome resolution cancelled contract={:#x}", contract);
        }
        states.insert(contract, next);
    }

    async fn run(&self, contract: Address, trigger: ResolutionEvent) -> Result<ResolutionState> {
        let lock = self.lock_for(contract).await;
        let result = {
            let _guard = lock.lock().await;
            self.run_locked(contract, trigger).await
        };
        self.evict(contract, lock).await;
        result
    }

    /// Reads the game and requires it to be completed.
    async fn load(&self, contract: Address) -> Result<GameSnapshot> {
        let snapshot = self.chain.read_game(contract).await?;
        if classify_phase(&snapshot, None) != GamePhase::Completed {
            return Err(AppError::BadRequest(format!(
                "Game {:#x} is not completed",
                contract
            )));
        }
        Ok(snapshot)
    }

    async fn run_locked(
        &self,
        contract: Address,
        trigger: ResolutionEvent,
    ) -> Result<ResolutionState> {
        // A game with a cached result and no run in flight is answered from the
        // cache; only a manual refresh goes back to the sources.
        if matches!(trigger, ResolutionEvent::Start)
            && !self.states.read().await.contains_key(&contract)
        {
            if let Some(cached) = self.results.get(contract).await {
                self.transition(contract, ResolutionEvent::Start).await;
                return Ok(self
                    .transition(
                        contract,
                        ResolutionEvent::AttemptFinished {
                            outcome: Some(cached),
                            error: None,
                        },
                    )
                    .await);
            }
        }

        // A transient read failure is an inconclusive attempt, not a hard error.
        let mut read_error = None;
        let mut snapshot = match self.load(contract).await {
            Ok(snapshot) => Some(snapshot),
            Err(err) if err.is_transient() => {
                tracing::warn!("Game read failed contract={:#x} err={}", contract, err);
                read_error = Some(err.to_string());
                None
            }
            Err(err) => return Err(err),
        };

        {
            // A run dropped mid-flight or cancelled leaves no lock holder; start clean.
            let mut states = self.states.write().await;
            let stale = states.get(&contract).is_some_and(|state| {
                state.status == ResolutionStatus::Cancelled
                    || (!state.is_terminal() && state.status != ResolutionStatus::Idle)
            });
            if stale {
                states.insert(contract, ResolutionState::new(contract));
            }
        }

        let mut state = self.transition(contract, trigger).await;
        while state.is_resolving() {
            if snapshot.is_none() && read_error.is_none() {
                match self.load(contract).await {
                    Ok(found) => snapshot = Some(found),
                    Err(err) if err.is_transient() => {
                        tracing::warn!("Game read failed contract={:#x} err={}", contract, err);
                        read_error = Some(err.to_string());
                    }
                    Err(err) => {
                        self.states.write().await.remove(&contract);
                        return Err(err);
                    }
                }
            }

            let (outcome, error) = match &snapshot {
                Some(game) => self.attempt(game).await,
                None => (None, read_error.take()),
            };
            state = self
                .transition(contract, ResolutionEvent::AttemptFinished { outcome, error })
                .await;

            if let Some(delay) = state.retry_delay() {
                tracing::debug!(
                    "Outcome inconclusive contract={:#x} attempt={} retry_in={:?}",
                    contract,
                    state.attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
                state = self.transition(contract, ResolutionEvent::RetryElapsed).await;
                continue;
            }

            match state.status {
                ResolutionStatus::Resolved => {
                    if let Some(outcome) = &state.outcome {
                        tracing::info!(
                            "Outcome resolved contract={:#x} winner={:?} source={:?} attempts={}",
                            contract,
                            outcome.winner,
                            outcome.provenance,
                            state.attempts
                        );
                    }
                }
                ResolutionStatus::Unresolved => {
                    tracing::warn!(
                        "Outcome unresolved after {} attempts contract={:#x} last_error={:?}",
                        state.attempts,
                        contract,
                        state.last_error
                    );
                }
                _ => {}
            }
        }

        Ok(state)
    }

    /// Drops the lock and a resolved or cancelled state once no other run
    /// holds the lock. Unresolved states stay: only a manual refresh may
    /// restart them.
    async fn evict(&self, contract: Address, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.write().await;
        // The map's reference plus `lock`.
        if Arc::strong_count(&lock) > 2 {
            return;
        }
        locks.remove(&contract);

        let mut states = self.states.write().await;
        let finished = states.get(&contract).is_some_and(|state| {
            matches!(
                state.status,
                ResolutionStatus::Resolved | ResolutionStatus::Cancelled
            )
        });
        if finished {
            states.remove(&contract);
        }
    }

    /// One pass over every source. Explorer failures make the pass inconclusive
    /// unless a lower-ranked outcome is already cached.
    async fn attempt(&self, snapshot: &GameSnapshot) -> (Option<OutcomeRecord>, Option<String>) {
        if let Some(record) = sources::never_joined(snapshot) {
            return (Some(self.persist(record).await), None);
        }
        if let Some(record) = sources::local(snapshot, &self.results, &self.commitments).await {
            let local = record.provenance == Provenance::Local;
            let kept = self.persist(record).await;
            if local && self.results.get(snapshot.contract_address).await.is_some() {
                // The cached result now stands in for the secret.
                if let Err(err) = self
                    .commitments
                    .clear(snapshot.contract_address, snapshot.j1)
                    .await
                {
                    tracing::warn!(
                        "Commitment cleanup failed contract={:#x} err={}",
                        snapshot.contract_address,
                        err
                    );
                }
            }
            return (Some(kept), None);
        }

        let activity = match self.explorer.activity(snapshot.contract_address).await {
            Ok(activity) => activity,
            Err(err) => {
                tracing::warn!(
                    "Explorer lookup failed contract={:#x} err={}",
                    snapshot.contract_address,
                    err
                );
                return self.fallback(snapshot, Some(err.to_string())).await;
            }
        };
        // Payouts alone cannot tell a reveal from a timeout claim.
        if activity.transactions_missing() {
            return self
                .fallback(snapshot, Some(format!("Explorer {} unavailable", TXLIST)))
                .await;
        }

        let found = sources::transaction_trace(snapshot, &activity)
            .or_else(|| sources::timeout_claim(snapshot, &activity));
        match found {
            Some(record) => (Some(self.persist(record).await), None),
            None => self.fallback(snapshot, None).await,
        }
    }

    async fn fallback(
        &self,
        snapshot: &GameSnapshot,
        error: Option<String>,
    ) -> (Option<OutcomeRecord>, Option<String>) {
        (self.results.get(snapshot.contract_address).await, error)
    }

    /// Caches `record`; keeps a higher-ranked cached record if there is one.
    async fn persist(&self, record: OutcomeRecord) -> OutcomeRecord {
        match self.results.save(record.clone()).await {
            Ok(kept) => kept,
            Err(err) => {
                tracing::warn!(
                    "Outcome cache write failed contract={:#x} err={}",
                    record.contract_address,
                    err
                );
                record
            }
        }
    }
}
