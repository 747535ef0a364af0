use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, Result};

// ==================== MOVE ====================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Move {
    Null = 0,
    Rock = 1,
    Paper = 2,
    Scissors = 3,
    Spock = 4,
    Lizard = 5,
}

impl Move {
    /// Every legal play, in contract order.
    pub const PLAYABLE: [Move; 5] = [
        Move::Rock,
        Move::Paper,
        Move::Scissors,
        Move::Spock,
        Move::Lizard,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Move::Null => "Null",
            Move::Rock => "Rock",
            Move::Paper => "Paper",
            Move::Scissors => "Scissors",
            Move::Spock => "Spock",
            Move::Lizard => "Lizard",
        }
    }

    pub fn is_null(self) -> bool {
        self == Move::Null
    }

    /// Rejects NULL; used wherever a move is about to be played or revealed.
    pub fn ensure_playable(self) -> Result<Self> {
        if self.is_null() {
            return Err(AppError::InvalidMove(
                "Null is not a playable move".to_string(),
            ));
        }
        Ok(self)
    }
}

impl From<Move> for u8 {
    fn from(value: Move) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for Move {
    type Error = AppError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Move::Null),
            1 => Ok(Move::Rock),
            2 => Ok(Move::Paper),
            3 => Ok(Move::Scissors),
            4 => Ok(Move::Spock),
            5 => Ok(Move::Lizard),
            other => Err(AppError::InvalidMove(format!("{other} is out of range 0-5"))),
        }
    }
}

impl TryFrom<U256> for Move {
    type Error = AppError;

    fn try_from(value: U256) -> Result<Self> {
        if value > U256::from(u8::MAX) {
            return Err(AppError::InvalidMove(format!("{value} is out of range 0-5")));
        }
        Move::try_from(value.as_u32() as u8)
    }
}

impl FromStr for Move {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if let Ok(value) = trimmed.parse::<u8>() {
            return Move::try_from(value);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "null" => Ok(Move::Null),
            "rock" => Ok(Move::Rock),
            "paper" => Ok(Move::Paper),
            "scissors" => Ok(Move::Scissors),
            "spock" => Ok(Move::Spock),
            "lizard" => Ok(Move::Lizard),
            _ => Err(AppError::InvalidMove(format!("unknown move '{trimmed}'"))),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ==================== OUTCOME ====================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Tie,
    Player1,
    Player2,
}

impl Winner {
    /// Numeric form used by the contract tooling: 0 tie, 1 player 1, 2 player 2.
    pub fn code(self) -> u8 {
        match self {
            Winner::Tie => 0,
            Winner::Player1 => 1,
            Winner::Player2 => 2,
        }
    }
}

/// Which data source produced an outcome, ranked from most to least authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Local,
    Blockchain,
    Timeout,
}

impl Provenance {
    pub fn rank(self) -> u8 {
        match self {
            Provenance::Local => 0,
            Provenance::Blockchain => 1,
            Provenance::Timeout => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub contract_address: Address,
    /// `None` when the commitment cache is gone and no reveal was found.
    pub player1_move: Option<Move>,
    /// `Null` under timeout provenance means player 2 never played.
    pub player2_move: Move,
    pub winner: Winner,
    pub winner_address: Option<Address>,
    #[serde(default)]
    pub player1: Option<Address>,
    #[serde(default)]
    pub player2: Option<Address>,
    pub provenance: Provenance,
    pub resolved_at: i64,
}

impl OutcomeRecord {
    pub fn new(
        contract_address: Address,
        player1_move: Option<Move>,
        player2_move: Move,
        winner: Winner,
        provenance: Provenance,
    ) -> Self {
        Self {
            contract_address,
            player1_move,
            player2_move,
            winner,
            winner_address: None,
            player1: None,
            player2: None,
            provenance,
            resolved_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Records both players and resolves the winner's address.
    pub fn with_players(mut self, j1: Address, j2: Address) -> Self {
        self.player1 = Some(j1);
        self.player2 = Some(j2);
        self.winner_address = match self.winner {
            Winner::Player1 => Some(j1),
            Winner::Player2 => Some(j2),
            Winner::Tie => None,
        };
        self
    }

    pub fn is_player1(&self, viewer: Address) -> bool {
        self.player1 == Some(viewer)
    }

    /// Result line from the point of view of `viewer_is_player1`.
    pub fn summary(&self, viewer_is_player1: bool) -> String {
        if self.provenance == Provenance::Timeout {
            return match self.winner {
                Winner::Player1 => {
                    "Opponent did not join within the timeout period. Stake returned to player 1."
                        .to_string()
                }
                _ => "Player 1 did not reveal within the timeout period. Player 2 received the full pot."
                    .to_string(),
            };
        }

        let (Some(p1), p2) = (self.player1_move, self.player2_move) else {
            return match self.winner {
                Winner::Tie => "It's a tie! The stake has been split.".to_string(),
                Winner::Player1 => "Player 1 wins!".to_string(),
                Winner::Player2 => "Player 2 wins!".to_string(),
            };
        };

        if self.winner == Winner::Tie {
            return format!("It's a tie! Both played {}", p1);
        }

        let you_won = (viewer_is_player1 && self.winner == Winner::Player1)
            || (!viewer_is_player1 && self.winner == Winner::Player2);
        let (winning, losing) = match self.winner {
            Winner::Player1 => (p1, p2),
            _ => (p2, p1),
        };
        if you_won {
            format!("You won! {} beats {}", winning, losing)
        } else {
            format!("You lost! {} beats {}", winning, losing)
        }
    }
}

// ==================== GAME STATE ====================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    NoGame,
    AwaitingPlayer2,
    AwaitingReveal,
    RevealWindowOpen,
    Completed,
}

/// On-chain view of one deployed game contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub contract_address: Address,
    pub j1: Address,
    pub j2: Address,
    pub c2: Move,
    pub stake: U256,
    pub last_action: u64,
    pub timeout: u64,
}

impl GameSnapshot {
    pub fn deadline(&self) -> u64 {
        self.last_action.saturating_add(self.timeout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player1,
    Player2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Created,
    Joined,
    Revealed,
    Completed,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub contract_address: Address,
    pub role: Role,
    pub opponent: Address,
    /// Wei, decimal string.
    pub stake: String,
    /// Unix millis of the last update.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<GameStatus>,
}

// ==================== WALLET CALLS ====================
/// Unsigned transaction the player's wallet signs and submits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletCall {
    /// `None` for contract deployment.
    pub to: Option<Address>,
    pub data: Bytes,
    pub value: U256,
    pub description: String,
}
