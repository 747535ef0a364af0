use ethers::types::{Address, U256};

use crate::error::{AppError, Result};

/// Parse a `0x`-prefixed 20-byte hex address.
pub fn parse_address(raw: &str) -> Result<Address> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| AppError::InvalidAddress(format!("'{trimmed}' must start with 0x")))?;
    if digits.len() != 40 {
        return Err(AppError::InvalidAddress(format!(
            "'{trimmed}' must be 40 hex digits"
        )));
    }
    let bytes = hex::decode(digits)
        .map_err(|e| AppError::InvalidAddress(format!("'{trimmed}': {e}")))?;
    Ok(Address::from_slice(&bytes))
}

/// Lowercase full-length hex, used in store keys and comparisons.
pub fn address_key(address: &Address) -> String {
    format!("{address:#x}")
}

pub fn short_address(address: &Address) -> String {
    let full = address_key(address);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

pub fn format_eth(wei: U256) -> String {
    ethers::utils::format_ether(wei)
}

/// Parse a decimal ETH amount ("0.01") into wei.
pub fn parse_eth(raw: &str) -> Result<U256> {
    ethers::utils::parse_ether(raw.trim())
        .map_err(|e| AppError::BadRequest(format!("Invalid ETH amount '{raw}': {e}")))
}

pub fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// "Just now", "5m ago", "3h ago", "2d ago", else the calendar date.
pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    match diff {
        d if d < 60_000 => "Just now".to_string(),
        d if d < 3_600_000 => format!("{}m ago", d / 60_000),
        d if d < 86_400_000 => format!("{}h ago", d / 3_600_000),
        d if d < 604_800_000 => format!("{}d ago", d / 86_400_000),
        _ => chrono::DateTime::from_timestamp_millis(timestamp_ms)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
    }
}
