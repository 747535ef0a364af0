use ethers::types::Address;
use serde::Serialize;
use std::time::Duration;

use crate::constants::RESOLVER_RETRY_DELAYS_MS;
use crate::models::OutcomeRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ResolutionStatus {
    Idle,
    Resolving,
    WaitingRetry { delay_ms: u64 },
    Resolved,
    /// Retries exhausted; only a manual refresh starts over.
    Unresolved,
    Cancelled,
}

#[derive(Debug, Clone)]
pub enum ResolutionEvent {
    /// First resolution for a completed game.
    Start,
    /// User-triggered refresh; starts over from the local cache.
    ManualRefresh,
    AttemptFinished {
        outcome: Option<OutcomeRecord>,
        error: Option<String>,
    },
    RetryElapsed,
    Cancel,
}

/// Outcome-resolution bookkeeping for one contract.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionState {
    pub contract_address: Address,
    pub status: ResolutionStatus,
    pub attempts: u32,
    pub outcome: Option<OutcomeRecord>,
    pub last_error: Option<String>,
}

impl ResolutionState {
    pub fn new(contract_address: Address) -> Self {
        Self {
            contract_address,
            status: ResolutionStatus::Idle,
            attempts: 0,
            outcome: None,
            last_error: None,
        }
    }

    pub fn is_resolving(&self) -> bool {
        self.status == ResolutionStatus::Resolving
    }

    pub fn retry_delay(&self) -> Option<Duration> {
        match self.status {
            ResolutionStatus::WaitingRetry { delay_ms } => Some(Duration::from_millis(delay_ms)),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            ResolutionStatus::Resolved | ResolutionStatus::Unresolved | ResolutionStatus::Cancelled
        )
    }

    /// Advance the state machine. Pure: no I/O, no clocks.
    pub fn update(mut self, event: ResolutionEvent) -> Self {
        if self.status == ResolutionStatus::Cancelled {
            return self;
        }

        match event {
            ResolutionEvent::Start => {
                if self.status == ResolutionStatus::Idle {
                    self.status = ResolutionStatus::Resolving;
                }
            }
            ResolutionEvent::ManualRefresh => {
                self.attempts = 0;
                self.last_error = None;
                self.status = ResolutionStatus::Resolving;
            }
            ResolutionEvent::AttemptFinished { outcome, error } => {
                if self.status != ResolutionStatus::Resolving {
                    return self;
                }
                self.attempts += 1;
                self.last_error = error;
                match outcome {
                    Some(candidate) => {
                        self.outcome = Some(match self.outcome.take() {
                            Some(existing)
                                if existing.provenance.rank() < candidate.provenance.rank() =>
                            {
                                existing
                            }
                            _ => candidate,
                        });
                        self.status = ResolutionStatus::Resolved;
                    }
                    None if self.outcome.is_some() => {
                        self.status = ResolutionStatus::Resolved;
                    }
                    None => {
                        let retry_index = (self.attempts - 1) as usize;
                        self.status = match RESOLVER_RETRY_DELAYS_MS.get(retry_index) {
                            Some(delay_ms) => ResolutionStatus::WaitingRetry {
                                delay_ms: *delay_ms,
                            },
                            None => ResolutionStatus::Unresolved,
                        };
                    }
                }
            }
            ResolutionEvent::RetryElapsed => {
                if matches!(self.status, ResolutionStatus::WaitingRetry { .. }) {
                    self.status = ResolutionStatus::Resolving;
                }
            }
            ResolutionEvent::Cancel => {
                if !self.is_terminal() {
                    self.status = ResolutionStatus::Cancelled;
                }
            }
        }

        self
    }
}
