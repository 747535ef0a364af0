use ethers::types::Address;
use serde::Serialize;

use crate::error::Result;

/// Single-file source submission for one deployed game.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub contract: Address,
    pub source_code: String,
    /// ABI-encoded constructor arguments, hex without `0x`.
    pub constructor_args: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Submitted { guid: String },
    AlreadyVerified,
    /// The explorer has not indexed the contract bytecode yet.
    NotIndexed,
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "message")]
pub enum CheckOutcome {
    Verified(String),
    Pending,
    Failed(String),
}

#[async_trait::async_trait]
pub trait SourceVerifier: Send + Sync {
    fn has_api_key(&self) -> bool;

    async fn submit(&self, request: &VerificationRequest) -> Result<Submission>;

    async fn check_status(&self, guid: &str) -> Result<CheckOutcome>;
}

/// Maps a `verifysourcecode` reply. Only `status == "1"` carries a guid.
pub fn parse_submission(status: &str, result: &str) -> Submission {
    if status == "1" {
        return Submission::Submitted {
            guid: result.to_string(),
        };
    }
    if result.contains("Unable to locate ContractCode") {
        return Submission::NotIndexed;
    }
    if result.to_ascii_lowercase().contains("already verified") {
        return Submission::AlreadyVerified;
    }
    Submission::Rejected(result.to_string())
}

/// Maps a `checkverifystatus` reply.
pub fn parse_check(status: &str, result: &str) -> CheckOutcome {
    if status == "1" {
        return CheckOutcome::Verified(result.to_string());
    }
    if result.to_ascii_lowercase().contains("already verified") {
        return CheckOutcome::Verified(result.to_string());
    }
    if result.starts_with("Fail") {
        return CheckOutcome::Failed(result.to_string());
    }
    CheckOutcome::Pending
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_replies() {
        assert_eq!(
            parse_submission("1", "abc123"),
            Submission::Submitted {
                guid: "abc123".to_string()
            }
        );
        assert_eq!(
            parse_submission("0", "Unable to locate ContractCode at 0x01"),
            Submission::NotIndexed
        );
        assert_eq!(
            parse_submission("0", "Contract source code already verified"),
            Submission::AlreadyVerified
        );
        assert_eq!(
            parse_submission("0", "Invalid constructor arguments"),
            Submission::Rejected("Invalid constructor arguments".to_string())
        );
    }

    #[test]
    fn status_replies() {
        assert_eq!(
            parse_check("1", "Pass - Verified"),
            CheckOutcome::Verified("Pass - Verified".to_string())
        );
        assert_eq!(parse_check("0", "Pending in queue"), CheckOutcome::Pending);
        assert_eq!(
            parse_check("0", "Fail - Unable to verify"),
            CheckOutcome::Failed("Fail - Unable to verify".to_string())
        );
    }
}
