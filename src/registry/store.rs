//! Session registry implementation
//!
//! The single source of truth for which ports have a live session.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use super::entry::SessionEntry;

/// Point-in-time view of one registered session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    /// Session port
    pub port: u16,
    /// Upstream source as given by the caller
    pub source_uri: String,
    /// Whether the session is currently streaming
    pub active: bool,
}

/// Registry of all sessions, keyed by port
///
/// Thread-safe via `RwLock`; insert and remove take the write lock so two
/// concurrent inserts for one port cannot both succeed.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<u16, Arc<SessionEntry>>>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry unless its port is taken
    ///
    /// Returns `false` without mutating anything if the port is present.
    pub async fn try_insert(&self, entry: Arc<SessionEntry>) -> bool {
        let mut sessions = self.sessions.write().await;

        if sessions.contains_key(&entry.port) {
            tracing::debug!(port = entry.port, "Session insert rejected, port taken");
            return false;
        }

        tracing::debug!(port = entry.port, session_id = entry.id, "Session registered");
        sessions.insert(entry.port, entry);
        true
    }

    /// Remove whatever session is registered on `port`
    pub async fn remove(&self, port: u16) -> Option<Arc<SessionEntry>> {
        let removed = self.sessions.write().await.remove(&port);

        if let Some(ref entry) = removed {
            tracing::debug!(port, session_id = entry.id, "Session removed");
        }

        removed
    }

    /// Remove the session on `port` only if it is session `id`
    ///
    /// Lets a late teardown run without evicting a newer session that has
    /// since claimed the same port.
    pub async fn remove_session(&self, port: u16, id: u64) -> Option<Arc<SessionEntry>> {
        let mut sessions = self.sessions.write().await;

        match sessions.get(&port) {
            Some(entry) if entry.id == id => {
                tracing::debug!(port, session_id = id, "Session removed");
                sessions.remove(&port)
            }
            _ => None,
        }
    }

    /// Look up the session on `port`
    pub async fn get(&self, port: u16) -> Option<Arc<SessionEntry>> {
        self.sessions.read().await.get(&port).cloned()
    }

    /// Snapshot of all registered sessions
    pub async fn list(&self) -> Vec<SessionSummary> {
        let entries = self.entries().await;
        let mut summaries = Vec::with_capacity(entries.len());

        for entry in entries {
            summaries.push(SessionSummary {
                port: entry.port,
                source_uri: entry.source_uri.clone(),
                active: entry.state().await.is_active(),
            });
        }

        summaries
    }

    /// All registered entries
    pub async fn entries(&self) -> Vec<Arc<SessionEntry>> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Number of registered sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is registered
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
