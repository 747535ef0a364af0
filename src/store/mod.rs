//! Local key-value store for commitments, outcome records and history.
//!
//! Every read treats "not found" as routine; callers degrade store failures to
//! absence where the data is only a cache.

pub mod commitments;
pub mod history;
pub mod memory;
pub mod redis_store;
pub mod results;

use std::sync::Arc;

use crate::error::Result;

pub use commitments::CommitmentStore;
pub use history::HistoryStore;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use results::ResultStore;

#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}

pub type SharedStore = Arc<dyn KeyValueStore>;

/// Connects to Redis when a URL is configured, otherwise falls back to memory.
pub async fn open(redis_url: Option<&str>) -> anyhow::Result<SharedStore> {
    match redis_url {
        Some(url) => {
            let store = RedisStore::connect(url).await?;
            tracing::info!("Local store: redis");
            Ok(Arc::new(store))
        }
        None => {
            tracing::info!("Local store: in-memory");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
