//! Persistence layer
//!
//! The host supplies an opaque key-value store; the core owns the keys and
//! the write cadence. The main state tree is written through a 500 ms
//! coalescing debounce so bursts of reducer transitions collapse into one
//! write; the notification index is written synchronously by the scheduler
//! to avoid losing identifiers on a crash.

use crate::model::AppState;
use crate::CoreResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Key for the main state tree.
pub const STATE_KEY: &str = "@propertysnap_state";
/// Key for the scheduler's preferences blob.
pub const NOTIFICATION_PREFERENCES_KEY: &str = "@notification_preferences";
/// Key for the scheduled-notification index.
pub const SCHEDULED_NOTIFICATIONS_KEY: &str = "@scheduled_notifications";

/// Coalescing window for state writes.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Opaque persistent key-value store supplied by the host.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> CoreResult<Option<Vec<u8>>>;
    async fn put(&self, key: &str, value: Vec<u8>) -> CoreResult<()>;
}

/// In-memory store for tests and hosts without a persistence backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> CoreResult<Option<Vec<u8>>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> CoreResult<()> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// Load the persisted state tree, if any.
pub async fn load_state(kv: &dyn KeyValueStore) -> CoreResult<Option<AppState>> {
    match kv.get(STATE_KEY).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Write the state tree immediately, bypassing the debounce.
pub async fn save_state(kv: &dyn KeyValueStore, state: &AppState) -> CoreResult<()> {
    let bytes = serde_json::to_vec(state)?;
    kv.put(STATE_KEY, bytes).await
}

/// Debounced snapshot writer for the main state tree.
///
/// Snapshots submitted within the window collapse to a single write of the
/// latest one. A failed write is retried on the next tick with the newest
/// snapshot available.
pub struct Persister {
    tx: mpsc::UnboundedSender<AppState>,
}

impl Persister {
    /// Spawn the writer task on the current runtime.
    pub fn spawn(kv: Arc<dyn KeyValueStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(kv, rx));
        Self { tx }
    }

    /// Queue a snapshot for the next debounce tick.
    pub fn schedule_write(&self, snapshot: AppState) {
        if self.tx.send(snapshot).is_err() {
            warn!("persister task has stopped; snapshot dropped");
        }
    }
}

async fn run_writer(kv: Arc<dyn KeyValueStore>, mut rx: mpsc::UnboundedReceiver<AppState>) {
    // Carries an unwritten snapshot across a failed write so the next tick
    // retries it.
    let mut carry: Option<AppState> = None;

    loop {
        let mut latest = match carry.take() {
            Some(snapshot) => snapshot,
            None => match rx.recv().await {
                Some(snapshot) => snapshot,
                None => return,
            },
        };

        // Coalesce everything that arrives within the window.
        loop {
            match tokio::time::timeout(DEBOUNCE_WINDOW, rx.recv()).await {
                Ok(Some(next)) => latest = next,
                Ok(None) => {
                    // Channel closed; flush what we have and stop.
                    if let Err(error) = save_state(&*kv, &latest).await {
                        warn!(%error, "final state write failed");
                    }
                    return;
                }
                Err(_elapsed) => break,
            }
        }

        match save_state(&*kv, &latest).await {
            Ok(()) => debug!("state snapshot persisted"),
            Err(error) => {
                warn!(%error, "state write failed; retrying next tick");
                carry = Some(latest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::User;

    fn state_with_user(name: &str) -> AppState {
        AppState {
            is_onboarded: true,
            is_authenticated: true,
            user: Some(User {
                id: "u1".to_string(),
                name: name.to_string(),
                email: "u@example.com".to_string(),
                role: None,
            }),
            properties: Vec::new(),
            team: None,
        }
    }

    #[tokio::test]
    async fn test_state_roundtrip() {
        let kv = MemoryStore::new();
        let state = state_with_user("Roundtrip");

        save_state(&kv, &state).await.unwrap();
        let loaded = load_state(&kv).await.unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_load_missing_state_is_none() {
        let kv = MemoryStore::new();
        assert!(load_state(&kv).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_coalesces_writes() {
        #[derive(Default)]
        struct CountingStore {
            inner: MemoryStore,
            writes: std::sync::atomic::AtomicUsize,
        }

        #[async_trait]
        impl KeyValueStore for CountingStore {
            async fn get(&self, key: &str) -> CoreResult<Option<Vec<u8>>> {
                self.inner.get(key).await
            }
            async fn put(&self, key: &str, value: Vec<u8>) -> CoreResult<()> {
                self.writes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                self.inner.put(key, value).await
            }
        }

        let kv = Arc::new(CountingStore::default());
        let persister = Persister::spawn(kv.clone());

        persister.schedule_write(state_with_user("first"));
        persister.schedule_write(state_with_user("second"));
        persister.schedule_write(state_with_user("third"));

        tokio::time::sleep(Duration::from_millis(700)).await;

        // One write, carrying the latest snapshot.
        assert_eq!(kv.writes.load(std::sync::atomic::Ordering::SeqCst), 1);
        let loaded = load_state(&*kv).await.unwrap().unwrap();
        assert_eq!(loaded.user.unwrap().name, "third");
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_outside_window_are_separate() {
        let kv = Arc::new(MemoryStore::new());
        let persister = Persister::spawn(kv.clone());

        persister.schedule_write(state_with_user("first"));
        tokio::time::sleep(Duration::from_millis(700)).await;

        let loaded = load_state(&*kv).await.unwrap().unwrap();
        assert_eq!(loaded.user.unwrap().name, "first");

        persister.schedule_write(state_with_user("second"));
        tokio::time::sleep(Duration::from_millis(700)).await;

        let loaded = load_state(&*kv).await.unwrap().unwrap();
        assert_eq!(loaded.user.unwrap().name, "second");
    }
}
