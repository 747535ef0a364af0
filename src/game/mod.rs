pub mod phase;
pub mod reducer;
pub mod rules;

pub use phase::{available_actions, classify_phase, timeout_elapsed, GameAction, PhaseReport};
pub use reducer::{ResolutionEvent, ResolutionState, ResolutionStatus};
pub use rules::determine_winner;
