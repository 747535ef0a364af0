use crate::error::{AppError, Result};
use crate::models::{Move, Winner};

/// The two moves each move defeats.
fn beats(game_move: Move) -> [Move; 2] {
    match game_move {
        Move::Rock => [Move::Scissors, Move::Lizard],
        Move::Paper => [Move::Rock, Move::Spock],
        Move::Scissors => [Move::Paper, Move::Lizard],
        Move::Spock => [Move::Scissors, Move::Rock],
        Move::Lizard => [Move::Spock, Move::Paper],
        Move::Null => [Move::Null, Move::Null],
    }
}

/// Winner of `player1` against `player2`. Both moves must have been played.
pub fn determine_winner(player1: Move, player2: Move) -> Result<Winner> {
    if player1.is_null() || player2.is_null() {
        return Err(AppError::InvalidMove(
            "cannot score a game with an unplayed move".to_string(),
        ));
    }
    if player1 == player2 {
        return Ok(Winner::Tie);
    }
    if beats(player1).contains(&player2) {
        return Ok(Winner::Player1);
    }
    Ok(Winner::Player2)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Scoring as the deployed contract's `win(c1, c2)` does it.
    fn contract_rule(c1: Move, c2: Move) -> Winner {
        let (a, b) = (u8::from(c1), u8::from(c2));
        let c1_wins = |a: u8, b: u8| {
            if a == b {
                false
            } else if a % 2 == b % 2 {
                a < b
            } else {
                a > b
            }
        };
        if c1_wins(a, b) {
            Winner::Player1
        } else if c1_wins(b, a) {
            Winner::Player2
        } else {
            Winner::Tie
        }
    }

    #[test]
    fn same_move_ties() {
        for m in Move::PLAYABLE {
            assert_eq!(determine_winner(m, m).unwrap(), Winner::Tie);
        }
    }

    #[test]
    fn distinct_moves_are_decisive_and_antisymmetric() {
        for a in Move::PLAYABLE {
            for b in Move::PLAYABLE {
                if a == b {
                    continue;
                }
                let forward = determine_winner(a, b).unwrap();
                let backward = determine_winner(b, a).unwrap();
                assert_ne!(forward, Winner::Tie, "{a} vs {b}");
                assert_ne!(backward, Winner::Tie, "{a} vs {b}");
                assert_ne!(forward, backward, "{a} vs {b}");
            }
        }
    }

    #[test]
    fn each_move_beats_exactly_two() {
        for a in Move::PLAYABLE {
            let wins = Move::PLAYABLE
                .iter()
                .filter(|b| determine_winner(a, **b).unwrap() == Winner::Player1)
                .count();
            assert_eq!(wins, 2, "{a}");
        }
    }

    #[test]
    fn table_agrees_with_contract_parity_rule() {
        for a in Move::PLAYABLE {
            for b in Move::PLAYABLE {
                assert_eq!(determine_winner(a, b).unwrap(), contract_rule(a, b), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn known_matchups() {
        assert_eq!(determine_winner(Move::Rock, Move::Scissors).unwrap(), Winner::Player1);
        assert_eq!(determine_winner(Move::Spock, Move::Lizard).unwrap(), Winner::Player2);
        assert_eq!(determine_winner(Move::Paper, Move::Spock).unwrap(), Winner::Player1);
    }

    #[test]
    fn null_move_is_rejected() {
        assert!(determine_winner(Move::Null, Move::Rock).is_err());
        assert!(determine_winner(Move::Rock, Move::Null).is_err());
    }
}
