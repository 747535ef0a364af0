use ethers::types::{Address, U256};

use super::{ExplorerTransaction, InternalTransfer};
use crate::constants::{SIG_J1_TIMEOUT, SIG_J2_TIMEOUT, SIG_SOLVE};
use crate::crypto::hash::selector_hex;
use crate::models::{Move, Winner};
use crate::utils::address_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClaim {
    /// Player 2 claimed because player 1 never revealed.
    J1Timeout,
    /// Player 1 reclaimed because player 2 never played.
    J2Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutVerdict {
    Tie,
    Winner(Winner),
}

fn reverted(is_error: &str) -> bool {
    is_error == "1"
}

fn function_label(signature: &str) -> &str {
    signature.split('(').next().unwrap_or(signature)
}

/// Matches by explorer method id, then calldata prefix, then decoded function name.
fn calls(tx: &ExplorerTransaction, signature: &str) -> bool {
    if reverted(&tx.is_error) {
        return false;
    }
    let selector = selector_hex(signature);
    if tx.method_id.eq_ignore_ascii_case(&selector) {
        return true;
    }
    if tx
        .input
        .get(..10)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(&selector))
    {
        return true;
    }
    !tx.function_name.is_empty() && tx.function_name.contains(function_label(signature))
}

fn decode_first_word(input: &str) -> Option<U256> {
    let body = input.strip_prefix("0x").unwrap_or(input);
    let word = body.get(8..72)?;
    U256::from_str_radix(word, 16).ok()
}

/// Player 1's revealed move, decoded from the first argument of `solve`.
pub fn find_reveal(transactions: &[ExplorerTransaction]) -> Option<Move> {
    transactions
        .iter()
        .filter(|tx| calls(tx, SIG_SOLVE))
        .find_map(|tx| {
            let word = decode_first_word(&tx.input)?;
            match Move::try_from(word) {
                Ok(m) if !m.is_null() => Some(m),
                _ => {
                    tracing::warn!("solve calldata carries no playable move tx={}", tx.hash);
                    None
                }
            }
        })
}

/// `j2Timeout` wins over `j1Timeout` if both somehow appear.
pub fn find_timeout_claim(transactions: &[ExplorerTransaction]) -> Option<TimeoutClaim> {
    if transactions.iter().any(|tx| calls(tx, SIG_J2_TIMEOUT)) {
        return Some(TimeoutClaim::J2Timeout);
    }
    if transactions.iter().any(|tx| calls(tx, SIG_J1_TIMEOUT)) {
        return Some(TimeoutClaim::J1Timeout);
    }
    None
}

/// Infers the result from what the contract paid out.
///
/// Equal non-zero totals to both players is a tie; otherwise the larger
/// recipient wins. `None` when the contract paid neither player.
pub fn interpret_payouts(
    transfers: &[InternalTransfer],
    contract: Address,
    j1: Address,
    j2: Address,
) -> Option<PayoutVerdict> {
    let contract = address_key(&contract);
    let j1 = address_key(&j1);
    let j2 = address_key(&j2);

    let mut to_j1 = U256::zero();
    let mut to_j2 = U256::zero();
    for transfer in transfers {
        if reverted(&transfer.is_error)
            || transfer.tx_type == "create"
            || !transfer.from.eq_ignore_ascii_case(&contract)
        {
            continue;
        }
        let Ok(value) = U256::from_dec_str(&transfer.value) else {
            continue;
        };
        if value.is_zero() {
            continue;
        }
        if transfer.to.eq_ignore_ascii_case(&j1) {
            to_j1 = to_j1.saturating_add(value);
        } else if transfer.to.eq_ignore_ascii_case(&j2) {
            to_j2 = to_j2.saturating_add(value);
        }
    }

    if to_j1.is_zero() && to_j2.is_zero() {
        return None;
    }
    Some(match to_j1.cmp(&to_j2) {
        std::cmp::Ordering::Equal => PayoutVerdict::Tie,
        std::cmp::Ordering::Greater => PayoutVerdict::Winner(Winner::Player1),
        std::cmp::Ordering::Less => PayoutVerdict::Winner(Winner::Player2),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn tx(method_id: &str, input: &str, function_name: &str) -> ExplorerTransaction {
        ExplorerTransaction {
            hash: "0xfeed".to_string(),
            method_id: method_id.to_string(),
            input: input.to_string(),
            function_name: function_name.to_string(),
            is_error: "0".to_string(),
            ..Default::default()
        }
    }

    pub(crate) fn solve_input(game_move: u8, salt: u64) -> String {
        format!("0xa5ddec7c{:064x}{:064x}", game_move, salt)
    }

    pub(crate) fn payout(from: Address, to: Address, wei: u64) -> InternalTransfer {
        InternalTransfer {
            from: address_key(&from),
            to: address_key(&to),
            value: wei.to_string(),
            tx_type: "call".to_string(),
            is_error: "0".to_string(),
            ..Default::default()
        }
    }

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[test]
    fn reveal_is_decoded_from_first_calldata_word() {
        let txs = vec![
            tx("0x53a04b05", "0x53a04b05", "play(uint8 _c2)"),
            tx("0xa5ddec7c", &solve_input(4, 42), "solve(uint8 _c1, uint256 _salt)"),
        ];
        assert_eq!(find_reveal(&txs), Some(Move::Spock));
    }

    #[test]
    fn reveal_matches_on_function_name_without_method_id() {
        let txs = vec![tx("", &solve_input(2, 1), "solve(uint8 _c1, uint256 _salt)")];
        assert_eq!(find_reveal(&txs), Some(Move::Paper));
    }

    #[test]
    fn reverted_reveal_is_ignored() {
        let mut failed = tx("0xa5ddec7c", &solve_input(1, 7), "");
        failed.is_error = "1".to_string();
        assert_eq!(find_reveal(&[failed]), None);
    }

    #[test]
    fn truncated_calldata_is_not_a_reveal() {
        assert_eq!(find_reveal(&[tx("0xa5ddec7c", "0xa5ddec7c0000", "")]), None);
    }

    #[test]
    fn timeout_claims_use_derived_selectors() {
        assert_eq!(
            find_timeout_claim(&[tx("0xc8391142", "0xc8391142", "")]),
            Some(TimeoutClaim::J1Timeout)
        );
        assert_eq!(
            find_timeout_claim(&[tx("0x294914a4", "0x294914a4", "")]),
            Some(TimeoutClaim::J2Timeout)
        );
        assert_eq!(
            find_timeout_claim(&[tx("", "", "j1Timeout()")]),
            Some(TimeoutClaim::J1Timeout)
        );
        assert_eq!(find_timeout_claim(&[tx("0x53a04b05", "", "play(uint8)")]), None);
    }

    #[test]
    fn equal_payouts_are_a_tie() {
        let (c, j1, j2) = (addr(9), addr(1), addr(2));
        let transfers = vec![payout(c, j1, 100), payout(c, j2, 100)];
        assert_eq!(
            interpret_payouts(&transfers, c, j1, j2),
            Some(PayoutVerdict::Tie)
        );
    }

    #[test]
    fn single_payout_names_the_winner() {
        let (c, j1, j2) = (addr(9), addr(1), addr(2));
        assert_eq!(
            interpret_payouts(&[payout(c, j2, 200)], c, j1, j2),
            Some(PayoutVerdict::Winner(Winner::Player2))
        );
    }

    #[test]
    fn transfers_not_from_contract_or_zero_are_ignored() {
        let (c, j1, j2) = (addr(9), addr(1), addr(2));
        let mut create = payout(c, j1, 100);
        create.tx_type = "create".to_string();
        let transfers = vec![payout(addr(8), j1, 100), payout(c, j2, 0), create];
        assert_eq!(interpret_payouts(&transfers, c, j1, j2), None);
    }
}
