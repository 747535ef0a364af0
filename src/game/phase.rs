use ethers::types::Address;
use serde::Serialize;

use crate::models::{GamePhase, GameSnapshot, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameAction {
    Join,
    Reveal,
    /// Player 2 claims the pot because player 1 never revealed.
    ClaimJ1Timeout,
    /// Player 1 reclaims the stake because player 2 never played.
    ClaimJ2Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub phase: GamePhase,
    pub viewer_role: Option<Role>,
    pub timeout_elapsed: bool,
    pub seconds_until_timeout: u64,
    pub actions: Vec<GameAction>,
}

fn role_of(snapshot: &GameSnapshot, viewer: Option<Address>) -> Option<Role> {
    let viewer = viewer?;
    if viewer == snapshot.j1 {
        Some(Role::Player1)
    } else if viewer == snapshot.j2 {
        Some(Role::Player2)
    } else {
        None
    }
}

/// Phase of the game as seen by `viewer`.
///
/// A settled game keeps its `c2` on-chain, so the zero-stake check runs before
/// any move-based check.
pub fn classify_phase(snapshot: &GameSnapshot, viewer: Option<Address>) -> GamePhase {
    if snapshot.j1.is_zero() {
        return GamePhase::NoGame;
    }
    if snapshot.stake.is_zero() {
        return GamePhase::Completed;
    }
    if snapshot.c2.is_null() {
        return GamePhase::AwaitingPlayer2;
    }
    if role_of(snapshot, viewer) == Some(Role::Player1) {
        return GamePhase::RevealWindowOpen;
    }
    GamePhase::AwaitingReveal
}

pub fn timeout_elapsed(snapshot: &GameSnapshot, now: u64) -> bool {
    now > snapshot.deadline()
}

pub fn available_actions(snapshot: &GameSnapshot, viewer: Option<Address>, now: u64) -> Vec<GameAction> {
    let role = role_of(snapshot, viewer);
    let elapsed = timeout_elapsed(snapshot, now);
    let mut actions = Vec::new();

    match classify_phase(snapshot, viewer) {
        GamePhase::NoGame | GamePhase::Completed => {}
        GamePhase::AwaitingPlayer2 => match role {
            Some(Role::Player2) => actions.push(GameAction::Join),
            Some(Role::Player1) if elapsed => actions.push(GameAction::ClaimJ2Timeout),
            _ => {}
        },
        GamePhase::RevealWindowOpen => actions.push(GameAction::Reveal),
        GamePhase::AwaitingReveal => {
            if role == Some(Role::Player2) && elapsed {
                actions.push(GameAction::ClaimJ1Timeout);
            }
        }
    }

    actions
}

pub fn report(snapshot: &GameSnapshot, viewer: Option<Address>, now: u64) -> PhaseReport {
    PhaseReport {
        phase: classify_phase(snapshot, viewer),
        viewer_role: role_of(snapshot, viewer),
        timeout_elapsed: timeout_elapsed(snapshot, now),
        seconds_until_timeout: snapshot.deadline().saturating_sub(now),
        actions: available_actions(snapshot, viewer, now),
    }
}
