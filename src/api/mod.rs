pub mod explorer;
pub mod games;
pub mod health;
pub mod history;
pub mod verify;
pub mod watch;

use ethers::types::Address;
use serde::Deserialize;
use std::sync::Arc;

use crate::chain::ChainReader;
use crate::config::Config;
use crate::error::Result;
use crate::services::{GameService, GameWatcher, VerificationService};
use crate::store::SharedStore;
use crate::utils::parse_address;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: SharedStore,
    pub chain: Arc<dyn ChainReader>,
    pub games: Arc<GameService>,
    pub watcher: Arc<GameWatcher>,
    pub verification: Arc<VerificationService>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewerQuery {
    pub viewer: Option<String>,
}

impl ViewerQuery {
    pub fn viewer(&self) -> Result<Option<Address>> {
        self.viewer
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(parse_address)
            .transpose()
    }
}
