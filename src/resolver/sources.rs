//! Outcome sources, most authoritative first.

use crate::explorer::{
    find_reveal, find_timeout_claim, interpret_payouts, ExplorerActivity, PayoutVerdict,
    TimeoutClaim,
};
use crate::game::determine_winner;
use crate::models::{GameSnapshot, Move, OutcomeRecord, Provenance, Winner};
use crate::store::{CommitmentStore, ResultStore};

fn finish(snapshot: &GameSnapshot, record: OutcomeRecord) -> OutcomeRecord {
    record.with_players(snapshot.j1, snapshot.j2)
}

/// Player 2 never played and the stake is gone: player 1 reclaimed it.
pub fn never_joined(snapshot: &GameSnapshot) -> Option<OutcomeRecord> {
    if !(snapshot.c2.is_null() && snapshot.stake.is_zero()) {
        return None;
    }
    Some(finish(
        snapshot,
        OutcomeRecord::new(
            snapshot.contract_address,
            None,
            Move::Null,
            Winner::Player1,
            Provenance::Timeout,
        ),
    ))
}

/// Cached local outcome, else player 1's cached commitment against on-chain
/// `c2`. Lower-ranked cached outcomes are left to the explorer sources so a
/// lagging index can still be corrected.
pub async fn local(
    snapshot: &GameSnapshot,
    results: &ResultStore,
    commitments: &CommitmentStore,
) -> Option<OutcomeRecord> {
    if let Some(record) = results.get(snapshot.contract_address).await {
        if record.provenance == Provenance::Local {
            return Some(record);
        }
    }

    if let Some(entry) = commitments
        .retrieve(snapshot.contract_address, snapshot.j1)
        .await
    {
        match determine_winner(entry.game_move, snapshot.c2) {
            Ok(winner) => {
                return Some(finish(
                    snapshot,
                    OutcomeRecord::new(
                        snapshot.contract_address,
                        Some(entry.game_move),
                        snapshot.c2,
                        winner,
                        Provenance::Local,
                    ),
                ));
            }
            Err(err) => tracing::warn!(
                "Cached commitment unusable contract={:#x} err={}",
                snapshot.contract_address,
                err
            ),
        }
    }

    None
}

/// Reveal calldata, else the contract's payouts.
pub fn transaction_trace(
    snapshot: &GameSnapshot,
    activity: &ExplorerActivity,
) -> Option<OutcomeRecord> {
    if let Some(p1_move) = find_reveal(&activity.transactions) {
        let winner = determine_winner(p1_move, snapshot.c2).ok()?;
        return Some(finish(
            snapshot,
            OutcomeRecord::new(
                snapshot.contract_address,
                Some(p1_move),
                snapshot.c2,
                winner,
                Provenance::Blockchain,
            ),
        ));
    }

    // Payouts after a timeout claim are the claim itself, not a game result.
    if find_timeout_claim(&activity.transactions).is_some() {
        return None;
    }

    let verdict = interpret_payouts(
        &activity.internal_transfers,
        snapshot.contract_address,
        snapshot.j1,
        snapshot.j2,
    )?;
    let (winner, p1_move) = match verdict {
        PayoutVerdict::Tie => (Winner::Tie, Some(snapshot.c2)),
        PayoutVerdict::Winner(winner) => (winner, None),
    };
    Some(finish(
        snapshot,
        OutcomeRecord::new(
            snapshot.contract_address,
            p1_move,
            snapshot.c2,
            winner,
            Provenance::Blockchain,
        ),
    ))
}

pub fn timeout_claim(snapshot: &GameSnapshot, activity: &ExplorerActivity) -> Option<OutcomeRecord> {
    let (winner, p2_move) = match find_timeout_claim(&activity.transactions)? {
        TimeoutClaim::J2Timeout => (Winner::Player1, Move::Null),
        TimeoutClaim::J1Timeout => (Winner::Player2, snapshot.c2),
    };
    Some(finish(
        snapshot,
        OutcomeRecord::new(
            snapshot.contract_address,
            None,
            p2_move,
            winner,
            Provenance::Timeout,
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::commitment::generate_secret;
    use crate::explorer::decode::tests::{payout, solve_input, tx};
    use crate::store::MemoryStore;
    use ethers::types::{Address, U256};
    use std::sync::Arc;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn completed(c2: Move) -> GameSnapshot {
        GameSnapshot {
            contract_address: addr(9),
            j1: addr(1),
            j2: addr(2),
            c2,
            stake: U256::zero(),
            last_action: 1_000,
            timeout: 300,
        }
    }

    #[test]
    fn never_joined_only_for_null_move_and_zero_stake() {
        let record = never_joined(&completed(Move::Null)).unwrap();
        assert_eq!(record.winner, Winner::Player1);
        assert_eq!(record.player2_move, Move::Null);
        assert_eq!(record.provenance, Provenance::Timeout);
        assert_eq!(record.winner_address, Some(addr(1)));

        assert!(never_joined(&completed(Move::Rock)).is_none());
        let mut live = completed(Move::Null);
        live.stake = U256::from(10);
        assert!(never_joined(&live).is_none());
    }

    #[tokio::test]
    async fn local_ignores_lower_ranked_cache() {
        let memory = Arc::new(MemoryStore::new());
        let results = ResultStore::new(memory.clone());
        let commitments = CommitmentStore::new(memory);
        let snapshot = completed(Move::Scissors);

        assert!(local(&snapshot, &results, &commitments).await.is_none());

        results
            .save(OutcomeRecord::new(
                snapshot.contract_address,
                None,
                Move::Scissors,
                Winner::Player2,
                Provenance::Timeout,
            ))
            .await
            .unwrap();
        assert!(local(&snapshot, &results, &commitments).await.is_none());

        commitments
            .persist(snapshot.contract_address, snapshot.j1, Move::Rock, generate_secret())
            .await
            .unwrap();
        let record = local(&snapshot, &results, &commitments).await.unwrap();
        assert_eq!(record.provenance, Provenance::Local);
        assert_eq!(record.winner, Winner::Player1);
        assert_eq!(record.player1_move, Some(Move::Rock));
    }

    #[test]
    fn trace_decodes_reveal() {
        let activity = ExplorerActivity {
            transactions: vec![tx("0xa5ddec7c", &solve_input(2, 99), "")],
            internal_transfers: vec![],
            ..Default::default()
        };
        let record = transaction_trace(&completed(Move::Rock), &activity).unwrap();
        assert_eq!(record.player1_move, Some(Move::Paper));
        assert_eq!(record.winner, Winner::Player1);
        assert_eq!(record.provenance, Provenance::Blockchain);
    }

    #[test]
    fn trace_reads_equal_payouts_as_tie_with_inferred_move() {
        let snapshot = completed(Move::Spock);
        let activity = ExplorerActivity {
            transactions: vec![],
            internal_transfers: vec![
                payout(snapshot.contract_address, snapshot.j1, 50),
                payout(snapshot.contract_address, snapshot.j2, 50),
            ],
            ..Default::default()
        };
        let record = transaction_trace(&snapshot, &activity).unwrap();
        assert_eq!(record.winner, Winner::Tie);
        assert_eq!(record.player1_move, Some(Move::Spock));
        assert_eq!(record.winner_address, None);
    }

    #[test]
    fn trace_skips_payouts_of_timeout_claims() {
        let snapshot = completed(Move::Scissors);
        let activity = ExplorerActivity {
            transactions: vec![tx("0xc8391142", "0xc8391142", "j1Timeout()")],
            internal_transfers: vec![payout(snapshot.contract_address, snapshot.j2, 200)],
            ..Default::default()
        };
        assert!(transaction_trace(&snapshot, &activity).is_none());

        let record = timeout_claim(&snapshot, &activity).unwrap();
        assert_eq!(record.winner, Winner::Player2);
        assert_eq!(record.player1_move, None);
        assert_eq!(record.player2_move, Move::Scissors);
        assert_eq!(record.provenance, Provenance::Timeout);
    }

    #[test]
    fn j2_timeout_claim_means_player2_never_played() {
        let activity = ExplorerActivity {
            transactions: vec![tx("0x294914a4", "0x294914a4", "")],
            internal_transfers: vec![],
            ..Default::default()
        };
        let record = timeout_claim(&completed(Move::Null), &activity).unwrap();
        assert_eq!(record.winner, Winner::Player1);
        assert_eq!(record.player2_move, Move::Null);
    }
}
