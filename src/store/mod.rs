//! Key-value stores holding the shared state label of each named breaker.

mod memory;
mod redis;
mod sqlite;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use self::memory::MemoryStateStore;
pub use self::redis::RedisStateStore;
pub use self::sqlite::SqliteStateStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("invalid stored value: {0}")]
    Parse(String),
}

/// Opaque get/set service shared by every instance guarding one dependency.
///
/// Writes are last-write-wins. A `ttl` of zero means the key never expires.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;
}
