use serde::Deserialize;
use std::env;

use crate::constants::{
    DEFAULT_CHAIN_ID, DEFAULT_EXPLORER_API_URL, DEFAULT_RPC_URL, POLL_INTERVAL_SECS,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Blockchain
    pub rpc_url: String,
    pub chain_id: u64,

    // Block explorer
    pub explorer_api_url: String,
    pub explorer_api_key: Option<String>,

    // Local store (in-memory when unset)
    pub redis_url: Option<String>,

    // Deployment bytecode of the RPS contract, hex
    pub rps_bytecode: Option<String>,
    // Solidity source submitted for explorer verification
    pub rps_source_path: Option<String>,

    // Watcher
    pub poll_interval_secs: u64,

    // CORS
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            rpc_url: env::var("RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string()),
            chain_id: env::var("CHAIN_ID")
                .unwrap_or_else(|_| DEFAULT_CHAIN_ID.to_string())
                .parse()?,

            explorer_api_url: env::var("EXPLORER_API_URL")
                .unwrap_or_else(|_| DEFAULT_EXPLORER_API_URL.to_string()),
            explorer_api_key: non_empty(env::var("EXPLORER_API_KEY").ok()),

            redis_url: non_empty(env::var("REDIS_URL").ok()),
            rps_bytecode: non_empty(env::var("RPS_BYTECODE").ok()),
            rps_source_path: non_empty(env::var("RPS_SOURCE_PATH").ok()),

            poll_interval_secs: env::var("POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| POLL_INTERVAL_SECS.to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rpc_url.trim().is_empty() {
            anyhow::bail!("RPC_URL is empty");
        }
        url::Url::parse(&self.rpc_url)
            .map_err(|e| anyhow::anyhow!("RPC_URL is not a valid URL: {e}"))?;
        url::Url::parse(&self.explorer_api_url)
            .map_err(|e| anyhow::anyhow!("EXPLORER_API_URL is not a valid URL: {e}"))?;
        if self.chain_id == 0 {
            anyhow::bail!("CHAIN_ID must be > 0");
        }
        if self.poll_interval_secs == 0 {
            anyhow::bail!("POLL_INTERVAL_SECS must be > 0");
        }

        if self.explorer_api_key.is_none() {
            tracing::warn!(
                "EXPLORER_API_KEY not set; outcome reconstruction falls back to local cache only"
            );
        }
        if self.redis_url.is_none() {
            tracing::warn!("REDIS_URL not set; commitments and history are kept in memory");
        }
        if self.rps_bytecode.is_none() {
            tracing::warn!("RPS_BYTECODE not set; create-game calls cannot be prepared");
        }
        if self.rps_source_path.is_none() {
            tracing::warn!("RPS_SOURCE_PATH not set; contract verification is disabled");
        }
        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    pub fn is_testnet(&self) -> bool {
        if self.environment == "development" || self.environment == "testnet" {
            return true;
        }
        // Sepolia, Amoy
        matches!(self.chain_id, 11155111 | 80002)
    }

    /// Block explorer web UI for the configured chain, used in responses.
    pub fn explorer_web_url(&self) -> &'static str {
        match self.chain_id {
            11155111 => "https://sepolia.etherscan.io",
            1 => "https://etherscan.io",
            137 => "https://polygonscan.com",
            _ => "https://amoy.polygonscan.com",
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 3000,
        environment: "development".to_string(),
        rpc_url: "http://localhost:8545".to_string(),
        chain_id: DEFAULT_CHAIN_ID,
        explorer_api_url: DEFAULT_EXPLORER_API_URL.to_string(),
        explorer_api_key: Some("test_key".to_string()),
        redis_url: None,
        rps_bytecode: Some("0x6080".to_string()),
        rps_source_path: None,
        poll_interval_secs: POLL_INTERVAL_SECS,
        cors_allowed_origins: "*".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_test_config() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_rpc_url() {
        let mut config = test_config();
        config.rpc_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_poll_interval() {
        let mut config = test_config();
        config.poll_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn explorer_web_url_follows_chain() {
        let mut config = test_config();
        config.chain_id = 11155111;
        assert_eq!(config.explorer_web_url(), "https://sepolia.etherscan.io");
        config.chain_id = 80002;
        assert_eq!(config.explorer_web_url(), "https://amoy.polygonscan.com");
    }

    #[test]
    fn non_empty_drops_blank_values() {
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(Some(" key ".to_string())), Some("key".to_string()));
    }
}
