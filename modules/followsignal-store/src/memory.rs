use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use followsignal_common::TrackedAccount;

use crate::SnapshotStore;

/// In-memory [`SnapshotStore`]. State lives for the lifetime of the process,
/// so every account looks brand new after a restart. Used when no
/// `DATABASE_URL` is configured and by tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, TrackedAccount>,
    state: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn get(&self, handle: &str) -> Result<Option<TrackedAccount>> {
        let inner = self.inner.lock().await;
        Ok(inner.accounts.get(handle).cloned())
    }

    async fn put(&self, account: &TrackedAccount) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .accounts
            .insert(account.handle.clone(), account.clone());
        Ok(())
    }

    async fn delete(&self, handles: &[String]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        for handle in handles {
            inner.accounts.remove(handle);
        }
        Ok(())
    }

    async fn list_handles(&self) -> Result<Vec<String>> {
        let inner = self.inner.lock().await;
        let mut handles: Vec<String> = inner.accounts.keys().cloned().collect();
        handles.sort();
        Ok(handles)
    }

    async fn get_state(&self, key: &str) -> Result<Option<String>> {
        let inner = self.inner.lock().await;
        Ok(inner.state.get(key).cloned())
    }

    async fn set_state(&self, key: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.state.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
