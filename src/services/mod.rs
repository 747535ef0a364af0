pub mod game;
pub mod verification;
pub mod watcher;

pub use game::GameService;
pub use verification::{VerificationReport, VerificationService, VerificationStatus};
pub use watcher::GameWatcher;
