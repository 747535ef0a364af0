/// Application constants

// Contract ABI (human readable, as deployed)
pub const RPS_ABI: &[&str] = &[
    "function play(uint8 _c2) external payable",
    "function solve(uint8 _c1, uint256 _salt) external",
    "function j1Timeout() external",
    "function j2Timeout() external",
    "function c1Hash() external view returns (bytes32)",
    "function c2() external view returns (uint8)",
    "function j1() external view returns (address)",
    "function j2() external view returns (address)",
    "function stake() external view returns (uint256)",
    "function TIMEOUT() external view returns (uint256)",
    "function lastAction() external view returns (uint256)",
];

// Function signatures used to recognise calls in explorer history
pub const SIG_SOLVE: &str = "solve(uint8,uint256)";
#[cfg(test)]
pub const SIG_PLAY: &str = "play(uint8)";
pub const SIG_J1_TIMEOUT: &str = "j1Timeout()";
pub const SIG_J2_TIMEOUT: &str = "j2Timeout()";

// Outcome resolution
pub const RESOLVER_RETRY_DELAYS_MS: [u64; 4] = [1_000, 2_000, 3_000, 5_000];

// Local store
pub const MAX_HISTORY: usize = 50;
pub const KEY_PREFIX_SALT: &str = "rps_salt";
pub const KEY_PREFIX_PENDING: &str = "rps_pending";
pub const KEY_PREFIX_RESULT: &str = "rps_result";
pub const KEY_PREFIX_HISTORY: &str = "rps_game_history";

// Explorer
pub const DEFAULT_EXPLORER_API_URL: &str = "https://api.etherscan.io/v2/api";
pub const EXPLORER_TIMEOUT_SECS: u64 = 10;

// Chain defaults (Polygon Amoy)
pub const DEFAULT_CHAIN_ID: u64 = 80002;
pub const DEFAULT_RPC_URL: &str = "https://rpc-amoy.polygon.technology/";

// API version
pub const API_VERSION: &str = "v1";

// Background service intervals
pub const POLL_INTERVAL_SECS: u64 = 5;

// Contract source verification
pub const VERIFY_CONTRACT_NAME: &str = "RPS";
pub const VERIFY_COMPILER_VERSION: &str = "v0.4.26+commit.4563c3fc";
pub const VERIFY_OPTIMIZER_RUNS: u32 = 200;
pub const VERIFY_EVM_VERSION: &str = "byzantium";
pub const VERIFY_MAX_ATTEMPTS: u32 = 3;
pub const VERIFY_RETRY_SECS: u64 = 30;
pub const VERIFY_STATUS_DELAY_SECS: u64 = 3;
