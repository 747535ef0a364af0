use ethers::types::Address;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::game::{GameService, GameView, OutcomeView};
use crate::error::{AppError, Result};
use crate::models::GamePhase;

#[derive(Debug, Clone, Default, Serialize)]
pub struct WatchReport {
    pub polls: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_view: Option<GameView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<OutcomeView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub finished: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WatchStatus {
    pub viewer: Address,
    pub contract_address: Address,
    pub paused: bool,
    #[serde(flatten)]
    pub report: WatchReport,
}

struct Watch {
    contract: Address,
    paused: Arc<AtomicBool>,
    report: Arc<RwLock<WatchReport>>,
    handle: JoinHandle<()>,
}

/// Polls one game per viewer until it completes, then resolves the outcome.
///
/// Watching another game, or stopping, aborts the previous poll task and any
/// resolution retries it had pending.
pub struct GameWatcher {
    service: Arc<GameService>,
    period: Duration,
    watches: Mutex<HashMap<Address, Watch>>,
}

impl GameWatcher {
    pub fn new(service: Arc<GameService>, period: Duration) -> Self {
        Self {
            service,
            period,
            watches: Mutex::new(HashMap::new()),
        }
    }

    pub async fn watch(&self, viewer: Address, contract: Address) -> WatchStatus {
        let mut watches = self.watches.lock().await;
        if let Some(previous) = watches.remove(&viewer) {
            self.stop(previous, &watches).await;
        }

        let paused = Arc::new(AtomicBool::new(false));
        let report = Arc::new(RwLock::new(WatchReport::default()));
        let handle = tokio::spawn(poll_game(
            self.service.clone(),
            self.period,
            viewer,
            contract,
            paused.clone(),
            report.clone(),
        ));
        tracing::info!("Watching contract={:#x} viewer={:#x}", contract, viewer);

        watches.insert(
            viewer,
            Watch {
                contract,
                paused,
                report,
                handle,
            },
        );
        WatchStatus {
            viewer,
            contract_address: contract,
            paused: false,
            report: WatchReport::default(),
        }
    }

    /// Returns `false` when the viewer had nothing watched.
    pub async fn unwatch(&self, viewer: Address) -> bool {
        let mut watches = self.watches.lock().await;
        match watches.remove(&viewer) {
            Some(watch) => {
                self.stop(watch, &watches).await;
                true
            }
            None => false,
        }
    }

    async fn stop(&self, watch: Watch, remaining: &HashMap<Address, Watch>) {
        watch.handle.abort();
        let shared = remaining.values().any(|other| other.contract == watch.contract);
        if !shared {
            self.service.resolver().cancel(watch.contract).await;
        }
        tracing::debug!("Stopped watching contract={:#x}", watch.contract);
    }

    pub async fn set_paused(&self, viewer: Address, paused: bool) -> Result<WatchStatus> {
        {
            let watches = self.watches.lock().await;
            let watch = watches
                .get(&viewer)
                .ok_or_else(|| AppError::NotFound(format!("{:#x} is not watching a game", viewer)))?;
            watch.paused.store(paused, Ordering::SeqCst);
        }
        self.status(viewer).await
    }

    pub async fn status(&self, viewer: Address) -> Result<WatchStatus> {
        let watches = self.watches.lock().await;
        let watch = watches
            .get(&viewer)
            .ok_or_else(|| AppError::NotFound(format!("{:#x} is not watching a game", viewer)))?;
        let report = watch.report.read().await.clone();
        Ok(WatchStatus {
            viewer,
            contract_address: watch.contract,
            paused: watch.paused.load(Ordering::SeqCst),
            report,
        })
    }
}

async fn poll_game(
    service: Arc<GameService>,
    period: Duration,
    viewer: Address,
    contract: Address,
    paused: Arc<AtomicBool>,
    report: Arc<RwLock<WatchReport>>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if paused.load(Ordering::SeqCst) {
            continue;
        }

        let view = match service.game_state(contract, Some(viewer)).await {
            Ok(view) => view,
            Err(err) => {
                if err.is_transient() {
                    tracing::warn!("Game poll failed contract={:#x} err={}", contract, err);
                } else {
                    tracing::error!("Game poll failed contract={:#x} err={}", contract, err);
                }
                let mut guard = report.write().await;
                guard.polls += 1;
                guard.last_error = Some(err.to_string());
                continue;
            }
        };

        let completed = view.phase.phase == GamePhase::Completed;
        {
            let mut guard = report.write().await;
            guard.polls += 1;
            guard.last_view = Some(view);
            guard.last_error = None;
        }
        if !completed {
            continue;
        }

        let outcome = service.outcome(contract, Some(viewer)).await;
        let mut guard = report.write().await;
        match outcome {
            Ok(outcome) => {
                let done = outcome.resolution.is_terminal();
                guard.outcome = Some(outcome);
                if !done {
                    continue;
                }
            }
            Err(err) if err.is_transient() => {
                tracing::warn!("Outcome lookup failed contract={:#x} err={}", contract, err);
                guard.last_error = Some(err.to_string());
                continue;
            }
            Err(err) => {
                tracing::error!("Outcome lookup failed contract={:#x} err={}", contract, err);
                guard.last_error = Some(err.to_string());
            }
        }
        guard.finished = true;
        break;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::RpsAbi;
    use crate::crypto::commitment::generate_secret;
    use crate::models::{Move, Winner};
    use crate::resolver::OutcomeResolver;
    use crate::store::{CommitmentStore, HistoryStore, MemoryStore, ResultStore};
    use crate::testing::{addr, snapshot, FakeChain, FakeExplorer};

    fn watcher(chain: Arc<FakeChain>) -> (GameWatcher, CommitmentStore) {
        let memory = Arc::new(MemoryStore::new());
        let commitments = CommitmentStore::new(memory.clone());
        let explorer = Arc::new(FakeExplorer::default());
        let resolver = Arc::new(OutcomeResolver::new(
            chain.clone(),
            explorer.clone(),
            commitments.clone(),
            ResultStore::new(memory.clone()),
        ));
        let service = Arc::new(GameService::new(
            chain,
            explorer,
            RpsAbi::load().unwrap(),
            None,
            commitments.clone(),
            HistoryStore::new(memory),
            resolver,
        ));
        (GameWatcher::new(service, Duration::from_secs(5)), commitments)
    }

    async fn settle(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_completed_then_resolves() {
        let chain = Arc::new(FakeChain::with_game(snapshot(Move::Paper, 10)));
        let (watcher, commitments) = watcher(chain.clone());
        commitments
            .persist(addr(9), addr(1), Move::Scissors, generate_secret())
            .await
            .unwrap();

        watcher.watch(addr(1), addr(9)).await;
        settle(11).await;
        let status = watcher.status(addr(1)).await.unwrap();
        assert!(status.report.polls >= 2);
        assert!(!status.report.finished);

        chain.set_game(snapshot(Move::Paper, 0));
        settle(6).await;
        let status = watcher.status(addr(1)).await.unwrap();
        assert!(status.report.finished);
        let outcome = status.report.outcome.unwrap();
        assert_eq!(outcome.resolution.outcome.unwrap().winner, Winner::Player1);
        assert_eq!(outcome.summary.as_deref(), Some("You won! Scissors beats Paper"));
    }

    #[tokio::test(start_paused = true)]
    async fn node_hiccup_during_resolution_does_not_end_watch() {
        let chain = Arc::new(FakeChain::with_game(snapshot(Move::Null, 0)));
        chain.fail_reads(&[2]);
        let (watcher, _) = watcher(chain.clone());

        watcher.watch(addr(2), addr(9)).await;
        settle(12).await;
        let status = watcher.status(addr(2)).await.unwrap();
        assert!(status.report.finished);
        let outcome = status.report.outcome.unwrap();
        let record = outcome.resolution.outcome.unwrap();
        assert_eq!(record.winner, Winner::Player1);
        assert_eq!(record.provenance, crate::models::Provenance::Timeout);
        assert_eq!(outcome.summary.as_deref(), Some(
            "Opponent did not join within the timeout period. Stake returned to player 1."
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn paused_watch_does_not_poll() {
        let chain = Arc::new(FakeChain::with_game(snapshot(Move::Null, 10)));
        let (watcher, _) = watcher(chain.clone());

        watcher.watch(addr(1), addr(9)).await;
        settle(1).await;
        watcher.set_paused(addr(1), true).await.unwrap();
        let reads = chain.read_count();
        settle(30).await;
        assert_eq!(chain.read_count(), reads);

        let status = watcher.set_paused(addr(1), false).await.unwrap();
        assert!(!status.paused);
        settle(6).await;
        assert!(chain.read_count() > reads);
    }

    #[tokio::test(start_paused = true)]
    async fn watching_another_game_stops_the_previous_one() {
        let chain = Arc::new(FakeChain::with_game(snapshot(Move::Null, 10)));
        let (watcher, _) = watcher(chain.clone());

        watcher.watch(addr(1), addr(9)).await;
        settle(1).await;
        watcher.watch(addr(1), addr(10)).await;
        let status = watcher.status(addr(1)).await.unwrap();
        assert_eq!(status.contract_address, addr(10));

        assert!(watcher.unwatch(addr(1)).await);
        assert!(!watcher.unwatch(addr(1)).await);
        let reads = chain.read_count();
        settle(30).await;
        assert_eq!(chain.read_count(), reads);
        assert!(watcher.status(addr(1)).await.is_err());
    }
}
