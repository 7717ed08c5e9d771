use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{StateStore, StoreError};

/// Process-local store. Breakers sharing one `Arc<MemoryStateStore>` behave
/// like instances sharing a remote store.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: Mutex<HashMap<String, Entry>>,
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = match entries.get(key) {
            Some(entry) => entry.expires_at.is_some_and(|at| at <= Instant::now()),
            None => return Ok(None),
        };
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at,
                },
            );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ttl_expires_and_zero_ttl_persists() {
        let store = MemoryStateStore::new();
        store
            .set("short", "OPEN", Duration::from_secs(5))
            .await
            .expect("set short");
        store
            .set("forever", "CLOSED", Duration::ZERO)
            .await
            .expect("set forever");

        assert_eq!(store.get("short").await.expect("get").as_deref(), Some("OPEN"));

        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(store.get("short").await.expect("get"), None);
        assert_eq!(
            store.get("forever").await.expect("get").as_deref(),
            Some("CLOSED")
        );
        assert_eq!(store.get("missing").await.expect("get"), None);
    }
}
