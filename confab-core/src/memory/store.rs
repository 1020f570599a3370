use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use confab_llm::Message;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use super::error::MemoryError;
use super::window::MemoryWindow;

pub type MemoryHandle = Arc<Mutex<MemoryWindow>>;

/// Backing storage for conversations. Windows write through to it on every
/// mutation and load from it when an id is first touched.
#[async_trait]
pub trait ChatMemoryStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Vec<Message>, MemoryError>;

    async fn save(&self, id: &str, messages: Vec<Message>) -> Result<(), MemoryError>;

    async fn delete(&self, id: &str) -> Result<(), MemoryError>;
}

#[derive(Debug, Default)]
pub struct InMemoryChatMemoryStore {
    conversations: RwLock<HashMap<String, Vec<Message>>>,
}

impl InMemoryChatMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatMemoryStore for InMemoryChatMemoryStore {
    async fn load(&self, id: &str) -> Result<Vec<Message>, MemoryError> {
        Ok(self.conversations.read().await.get(id).cloned().unwrap_or_default())
    }

    async fn save(&self, id: &str, messages: Vec<Message>) -> Result<(), MemoryError> {
        self.conversations.write().await.insert(id.to_string(), messages);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), MemoryError> {
        self.conversations.write().await.remove(id);
        Ok(())
    }
}

/// Conversations keyed by id. The map lock is only held for lookups, each
/// window has its own lock so different ids never wait on each other.
/// Turn locks live here too, so every service sharing a store serializes
/// turns on the same id.
pub struct MemoryStore {
    windows: RwLock<HashMap<String, MemoryHandle>>,
    turn_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    store: Arc<dyn ChatMemoryStore>,
    max_messages: usize,
}

impl MemoryStore {
    pub fn new(max_messages: usize) -> Self {
        Self::with_store(max_messages, Arc::new(InMemoryChatMemoryStore::new()))
    }

    pub fn with_store(max_messages: usize, store: Arc<dyn ChatMemoryStore>) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            turn_locks: Mutex::new(HashMap::new()),
            store,
            max_messages: max_messages.max(1),
        }
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    /// Window of `id`, created (from the backing store) on first access
    pub async fn get_or_create(&self, id: &str) -> Result<MemoryHandle, MemoryError> {
        if let Some(window) = self.windows.read().await.get(id) {
            return Ok(window.clone());
        }

        let persisted = self.store.load(id).await?;
        let mut windows = self.windows.write().await;
        let window = windows
            .entry(id.to_string())
            .or_insert_with(|| {
                debug!(target: "memory", id, restored = persisted.len(), "new conversation window");
                Arc::new(Mutex::new(MemoryWindow::restore(id, self.max_messages, persisted)))
            })
            .clone();
        Ok(window)
    }

    pub async fn append(&self, id: &str, message: Message) -> Result<(), MemoryError> {
        self.append_all(id, vec![message]).await
    }

    /// Several messages under one lock acquisition, nobody sees half of them
    pub async fn append_all(&self, id: &str, messages: Vec<Message>) -> Result<(), MemoryError> {
        let handle = self.get_or_create(id).await?;
        let mut window = handle.lock().await;
        let added = messages.len();
        window.append_all(messages);
        self.store.save(id, window.messages()).await?;
        debug!(target: "memory", id, added, len = window.len());
        Ok(())
    }

    /// Replace the pinned system message
    pub async fn set_system(&self, id: &str, text: impl Into<String>) -> Result<(), MemoryError> {
        self.append(id, Message::system(text)).await
    }

    pub async fn history(&self, id: &str) -> Result<Vec<Message>, MemoryError> {
        let handle = self.get_or_create(id).await?;
        let window = handle.lock().await;
        Ok(window.messages())
    }

    /// Exclusive right to run a turn on `id`, held until the guard drops
    pub async fn lock_turn(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .turn_locks
            .lock()
            .await
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Ids with a turn lock entry, held or not
    pub async fn turn_lock_count(&self) -> usize {
        self.turn_locks.lock().await.len()
    }

    /// Drop the window and its persisted messages, the next access starts fresh
    pub async fn clear(&self, id: &str) -> Result<(), MemoryError> {
        {
            let mut locks = self.turn_locks.lock().await;
            // a lock someone holds or waits on stays until its turn is over
            if locks.get(id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                locks.remove(id);
            }
        }
        let removed = self.windows.write().await.remove(id);
        if let Some(handle) = removed {
            handle.lock().await.clear();
        }
        self.store.delete(id).await?;
        debug!(target: "memory", id, "conversation cleared");
        Ok(())
    }

    /// Ids with a live window, sorted
    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.windows.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of messages held for `id`, an unknown id is not created
    pub async fn len(&self, id: &str) -> usize {
        let handle = self.windows.read().await.get(id).cloned();
        match handle {
            Some(handle) => handle.lock().await.len(),
            None => 0,
        }
    }
}
