use ethers::types::Address;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use super::verify::{parse_check, parse_submission};
use super::{
    BlockExplorer, CheckOutcome, ExplorerTransaction, InternalTransfer, SourceVerifier,
    Submission, VerificationRequest, TXLIST, TXLIST_INTERNAL,
};
use crate::config::Config;
use crate::constants::{
    EXPLORER_TIMEOUT_SECS, VERIFY_COMPILER_VERSION, VERIFY_CONTRACT_NAME, VERIFY_EVM_VERSION,
    VERIFY_OPTIMIZER_RUNS,
};
use crate::error::{AppError, Result};
use crate::utils::address_key;

/// Etherscan v2 multichain account API.
#[derive(Debug, Clone)]
pub struct EtherscanClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    chain_id: u64,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Value,
}

impl EtherscanClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(EXPLORER_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Internal(format!("Explorer HTTP client init failed: {}", e)))?;
        Ok(Self {
            client,
            api_url: config.explorer_api_url.clone(),
            api_key: config.explorer_api_key.clone(),
            chain_id: config.chain_id,
        })
    }

    fn account_url(&self, action: &str, contract: &Address) -> Result<Url> {
        let mut url = self.chain_url()?;
        url.query_pairs_mut()
            .append_pair("module", "account")
            .append_pair("action", action)
            .append_pair("address", &address_key(contract))
            .append_pair("startblock", "0")
            .append_pair("endblock", "99999999")
            .append_pair("sort", "desc");
        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("apikey", key);
        }
        Ok(url)
    }

    fn chain_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.api_url)
            .map_err(|e| AppError::Internal(format!("Invalid explorer URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("chainid", &self.chain_id.to_string());
        Ok(url)
    }

    fn require_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("EXPLORER_API_KEY is not configured".to_string()))
    }

    async fn account_list<T: DeserializeOwned>(&self, action: &str, contract: Address) -> Result<Vec<T>> {
        let url = self.account_url(action, &contract)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::ExplorerAPI(format!("{} request failed: {}", action, e)))?;
        let envelope = read_envelope(action, response).await?;
        parse_envelope(action, envelope)
    }
}

async fn read_envelope(action: &str, response: reqwest::Response) -> Result<Envelope> {
    if !response.status().is_success() {
        return Err(AppError::ExplorerAPI(format!(
            "{} returned HTTP {}",
            action,
            response.status()
        )));
    }
    response
        .json()
        .await
        .map_err(|e| AppError::ExplorerAPI(format!("{} parse failed: {}", action, e)))
}

/// `result` as text; falls back to `message` for non-string results.
fn result_text(envelope: &Envelope) -> String {
    match &envelope.result {
        Value::String(text) => text.clone(),
        _ => envelope.message.clone(),
    }
}

/// Form body for `module=contract&action=verifysourcecode`.
fn verification_form(request: &VerificationRequest, api_key: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("module", "contract")
        .append_pair("action", "verifysourcecode")
        .append_pair("contractaddress", &address_key(&request.contract))
        .append_pair("sourceCode", &request.source_code)
        .append_pair("codeformat", "solidity-single-file")
        .append_pair("contractname", VERIFY_CONTRACT_NAME)
        .append_pair("compilerversion", VERIFY_COMPILER_VERSION)
        .append_pair("optimizationUsed", "1")
        .append_pair("runs", &VERIFY_OPTIMIZER_RUNS.to_string())
        // Misspelt in the explorer API.
        .append_pair("constructorArguements", &request.constructor_args)
        .append_pair("evmversion", VERIFY_EVM_VERSION)
        .append_pair("licenseType", "1")
        .append_pair("apikey", api_key)
        .finish()
}

/// `status == "0"` carries either "No transactions found" (an empty list, not
/// an error) or a string `result` describing the failure.
fn parse_envelope<T: DeserializeOwned>(action: &str, envelope: Envelope) -> Result<Vec<T>> {
    match envelope.result {
        Value::Array(_) => serde_json::from_value(envelope.result)
            .map_err(|e| AppError::ExplorerAPI(format!("{} items unreadable: {}", action, e))),
        _ if envelope.message.starts_with("No transactions found") => Ok(Vec::new()),
        Value::String(reason) => Err(AppError::ExplorerAPI(format!(
            "{} rejected (status {}): {}",
            action, envelope.status, reason
        ))),
        _ => Err(AppError::ExplorerAPI(format!(
            "{} rejected (status {}): {}",
            action, envelope.status, envelope.message
        ))),
    }
}

#[async_trait::async_trait]
impl SourceVerifier for EtherscanClient {
    fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn submit(&self, request: &VerificationRequest) -> Result<Submission> {
        let api_key = self.require_key()?;
        let response = self
            .client
            .post(self.chain_url()?)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(verification_form(request, api_key))
            .send()
            .await
            .map_err(|e| AppError::ExplorerAPI(format!("verifysourcecode request failed: {}", e)))?;
        let envelope = read_envelope("verifysourcecode", response).await?;
        Ok(parse_submission(&envelope.status, &result_text(&envelope)))
    }

    async fn check_status(&self, guid: &str) -> Result<CheckOutcome> {
        let api_key = self.require_key()?;
        let mut url = self.chain_url()?;
        url.query_pairs_mut()
            .append_pair("module", "contract")
            .append_pair("action", "checkverifystatus")
            .append_pair("guid", guid)
            .append_pair("apikey", api_key);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::ExplorerAPI(format!("checkverifystatus request failed: {}", e)))?;
        let envelope = read_envelope("checkverifystatus", response).await?;
        Ok(parse_check(&envelope.status, &result_text(&envelope)))
    }
}

#[async_trait::async_trait]
impl BlockExplorer for EtherscanClient {
    async fn transactions(&self, contract: Address) -> Result<Vec<ExplorerTransaction>> {
        self.account_list(TXLIST, contract).await
    }

    async fn internal_transfers(&self, contract: Address) -> Result<Vec<InternalTransfer>> {
        self.account_list(TXLIST_INTERNAL, contract).await
    }
}
