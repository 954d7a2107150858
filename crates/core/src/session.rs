//! Per-session memoization of store and inventory resolutions.
//!
//! Entries are created lazily on first write, emptied on session (re)start and
//! removed on disconnect. Sessions are isolated by key only.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::domain::inventory::InventoryItem;
use crate::domain::store::{Coordinates, ResolvedStore, StoreCategory};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionEntry {
    pub store: Option<ResolvedStore>,
    /// `Some(None)` records that the position lookup ran and found nothing.
    pub coordinates: Option<Option<Coordinates>>,
    pub snapshots: HashMap<StoreCategory, Vec<InventoryItem>>,
    pub matching_items: HashMap<StoreCategory, Vec<InventoryItem>>,
}

impl SessionEntry {
    pub fn matching_items(&self, category: &StoreCategory) -> Option<&[InventoryItem]> {
        self.matching_items.get(category).map(Vec::as_slice)
    }

    pub fn snapshot(&self, category: &StoreCategory) -> Option<&[InventoryItem]> {
        self.snapshots.get(category).map(Vec::as_slice)
    }

    fn apply(&mut self, update: SessionUpdate) {
        match update {
            SessionUpdate::Store(store) => self.store = Some(store),
            SessionUpdate::Coordinates(coordinates) => self.coordinates = Some(coordinates),
            SessionUpdate::Snapshot { category, items } => {
                self.snapshots.insert(category, items);
            }
            SessionUpdate::MatchingItems { category, items } => {
                self.matching_items.insert(category, items);
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionUpdate {
    Store(ResolvedStore),
    Coordinates(Option<Coordinates>),
    Snapshot { category: StoreCategory, items: Vec<InventoryItem> },
    MatchingItems { category: StoreCategory, items: Vec<InventoryItem> },
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current entry, or `None` when the session has not cached anything yet.
    async fn get(&self, session_id: &SessionId) -> Option<SessionEntry>;
    async fn set(&self, session_id: &SessionId, update: SessionUpdate);
    /// Empties the entry (session start/restart).
    async fn clear(&self, session_id: &SessionId);
    /// Drops the entry entirely (disconnect).
    async fn remove(&self, session_id: &SessionId);
}

#[derive(Default)]
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<SessionId, SessionEntry>>,
}

impl InMemorySessionStore {
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &SessionId) -> Option<SessionEntry> {
        let entries = self.entries.read().await;
        entries.get(session_id).cloned()
    }

    async fn set(&self, session_id: &SessionId, update: SessionUpdate) {
        let mut entries = self.entries.write().await;
        entries.entry(session_id.clone()).or_default().apply(update);
    }

    async fn clear(&self, session_id: &SessionId) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(session_id) {
            *entry = SessionEntry::default();
        }
    }

    async fn remove(&self, session_id: &SessionId) {
        let mut entries = self.entries.write().await;
        entries.remove(session_id);
    }
}
