use ethers::types::Address;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{sleep, Duration};

use crate::chain::abi::constructor_args;
use crate::chain::ChainReader;
use crate::constants::{VERIFY_MAX_ATTEMPTS, VERIFY_RETRY_SECS, VERIFY_STATUS_DELAY_SECS};
use crate::error::Result;
use crate::explorer::{CheckOutcome, SourceVerifier, Submission, VerificationRequest};
use crate::utils::now_millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    InProgress,
    /// Not indexed yet; waiting before the next attempt.
    RetryNeeded,
    /// Accepted by the explorer, result still pending.
    Submitted,
    Verified,
    SkippedNoApiKey,
    SkippedNoSource,
    Failed,
}

impl VerificationStatus {
    pub fn is_running(self) -> bool {
        matches!(
            self,
            VerificationStatus::InProgress | VerificationStatus::RetryNeeded
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub contract_address: Address,
    pub status: VerificationStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub updated_at: i64,
}

impl VerificationReport {
    fn new(contract_address: Address, status: VerificationStatus, attempts: u32) -> Self {
        Self {
            contract_address,
            status,
            attempts,
            guid: None,
            message: None,
            updated_at: now_millis(),
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Submits a deployed game's source to the block explorer, retrying while
/// the explorer has not indexed the contract yet. Best-effort: failures never
/// affect gameplay.
pub struct VerificationService {
    verifier: Arc<dyn SourceVerifier>,
    chain: Arc<dyn ChainReader>,
    source: Option<String>,
    reports: RwLock<HashMap<Address, VerificationReport>>,
}

impl VerificationService {
    pub fn new(
        verifier: Arc<dyn SourceVerifier>,
        chain: Arc<dyn ChainReader>,
        source: Option<String>,
    ) -> Self {
        Self {
            verifier,
            chain,
            source,
            reports: RwLock::new(HashMap::new()),
        }
    }

    pub async fn status(&self, contract: Address) -> Option<VerificationReport> {
        self.reports.read().await.get(&contract).cloned()
    }

    /// Runs verification in the background. A running, submitted or verified
    /// contract is not submitted again.
    pub async fn start(self: &Arc<Self>, contract: Address) -> VerificationReport {
        let report = {
            let mut reports = self.reports.write().await;
            if let Some(current) = reports.get(&contract) {
                if current.status.is_running()
                    || matches!(
                        current.status,
                        VerificationStatus::Submitted | VerificationStatus::Verified
                    )
                {
                    return current.clone();
                }
            }
            let report = VerificationReport::new(contract, VerificationStatus::InProgress, 0);
            reports.insert(contract, report.clone());
            report
        };

        let service = self.clone();
        tokio::spawn(async move {
            service.verify(contract).await;
        });
        report
    }

    pub async fn verify(&self, contract: Address) -> VerificationReport {
        if !self.verifier.has_api_key() {
            return self
                .record(
                    VerificationReport::new(contract, VerificationStatus::SkippedNoApiKey, 0)
                        .with_message("No explorer API key configured"),
                )
                .await;
        }
        let Some(source) = self.source.as_deref() else {
            return self
                .record(
                    VerificationReport::new(contract, VerificationStatus::SkippedNoSource, 0)
                        .with_message("No contract source configured"),
                )
                .await;
        };

        let mut last_message = String::new();
        for attempt in 1..=VERIFY_MAX_ATTEMPTS {
            self.record(VerificationReport::new(
                contract,
                VerificationStatus::InProgress,
                attempt,
            ))
            .await;

            match self.submit(contract, source).await {
                Ok(Submission::Submitted { guid }) => {
                    return self.follow_up(contract, attempt, guid).await;
                }
                Ok(Submission::AlreadyVerified) => {
                    return self
                        .record(
                            VerificationReport::new(contract, VerificationStatus::Verified, attempt)
                                .with_message("Already verified"),
                        )
                        .await;
                }
                Ok(Submission::Rejected(reason)) => {
                    tracing::warn!(
                        "Verification rejected contract={:#x} reason={}",
                        contract,
                        reason
                    );
                    return self
                        .record(
                            VerificationReport::new(contract, VerificationStatus::Failed, attempt)
                                .with_message(reason),
                        )
                        .await;
                }
                Ok(Submission::NotIndexed) => {
                    last_message = "Contract not yet indexed".to_string();
                }
                Err(err) => {
                    tracing::warn!(
                        "Verification attempt {} failed contract={:#x} err={}",
                        attempt,
                        contract,
                        err
                    );
                    last_message = err.to_string();
                }
            }

            if attempt < VERIFY_MAX_ATTEMPTS {
                self.record(
                    VerificationReport::new(contract, VerificationStatus::RetryNeeded, attempt)
                        .with_message(last_message.clone()),
                )
                .await;
                sleep(Duration::from_secs(VERIFY_RETRY_SECS)).await;
            }
        }

        self.record(
            VerificationReport::new(contract, VerificationStatus::Failed, VERIFY_MAX_ATTEMPTS)
                .with_message(format!(
                    "Verification failed after {} attempts: {}",
                    VERIFY_MAX_ATTEMPTS, last_message
                )),
        )
        .await
    }

    async fn submit(&self, contract: Address, source: &str) -> Result<Submission> {
        let c1_hash = self.chain.commitment_hash(contract).await?;
        let game = self.chain.read_game(contract).await?;
        let request = VerificationRequest {
            contract,
            source_code: source.to_string(),
            constructor_args: hex::encode(constructor_args(c1_hash, game.j2)),
        };
        self.verifier.submit(&request).await
    }

    async fn follow_up(&self, contract: Address, attempt: u32, guid: String) -> VerificationReport {
        sleep(Duration::from_secs(VERIFY_STATUS_DELAY_SECS)).await;
        let (status, message) = match self.verifier.check_status(&guid).await {
            Ok(CheckOutcome::Verified(result)) => (VerificationStatus::Verified, result),
            Ok(CheckOutcome::Pending) => (
                VerificationStatus::Submitted,
                "Verification submitted".to_string(),
            ),
            Ok(CheckOutcome::Failed(result)) => (VerificationStatus::Failed, result),
            Err(err) => (
                VerificationStatus::Submitted,
                format!("Status check failed: {}", err),
            ),
        };
        tracing::info!(
            "Verification {:?} contract={:#x} guid={}",
            status,
            contract,
            guid
        );
        let mut report = VerificationReport::new(contract, status, attempt).with_message(message);
        report.guid = Some(guid);
        self.record(report).await
    }

    async fn record(&self, report: VerificationReport) -> VerificationReport {
        self.reports
            .write()
            .await
            .insert(report.contract_address, report.clone());
        report
    }
}
