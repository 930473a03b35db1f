//! Session entry
//!
//! Per-session state stored in the registry. State and owned resources sit
//! behind one lock so a stop racing a start (or a failure) resolves to a
//! single owner of the teardown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex};

use crate::relay::BroadcastRelay;
use crate::session::pump::StopRequest;
use crate::session::SessionState;

/// Resources owned by a running session
pub(crate) struct SessionResources {
    /// Fan-out server bound to the session port
    pub relay: Arc<BroadcastRelay>,
    /// Channel to the pump task, which owns the transcoder process
    pub control: mpsc::Sender<StopRequest>,
}

/// Outcome of claiming an entry for explicit stop
pub(crate) enum StopClaim {
    /// The caller owns the teardown; resources are absent while starting
    Claimed(Option<SessionResources>),
    /// Another path is already tearing the session down
    AlreadyClosing,
}

struct SessionInner {
    state: SessionState,
    resources: Option<SessionResources>,
}

/// Entry for a single session in the registry
pub struct SessionEntry {
    /// Process-unique session ID
    pub id: u64,

    /// Port the relay listens on (the registry key)
    pub port: u16,

    /// Upstream source, possibly carrying credentials
    pub source_uri: String,

    /// When the session was registered
    pub created_at: Instant,

    bytes_relayed: AtomicU64,
    chunks_relayed: AtomicU64,
    inner: Mutex<SessionInner>,
}

impl SessionEntry {
    /// Create a new entry in the `Starting` state
    pub fn new(id: u64, port: u16, source_uri: impl Into<String>) -> Self {
        Self {
            id,
            port,
            source_uri: source_uri.into(),
            created_at: Instant::now(),
            bytes_relayed: AtomicU64::new(0),
            chunks_relayed: AtomicU64::new(0),
            inner: Mutex::new(SessionInner {
                state: SessionState::Starting,
                resources: None,
            }),
        }
    }

    /// Current lifecycle state
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// Total bytes handed to the relay
    pub fn bytes_relayed(&self) -> u64 {
        self.bytes_relayed.load(Ordering::Relaxed)
    }

    /// Total chunks handed to the relay
    pub fn chunks_relayed(&self) -> u64 {
        self.chunks_relayed.load(Ordering::Relaxed)
    }

    /// Time since the session was registered
    pub fn uptime(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Relay of a running session
    pub async fn relay(&self) -> Option<Arc<BroadcastRelay>> {
        self.inner
            .lock()
            .await
            .resources
            .as_ref()
            .map(|r| Arc::clone(&r.relay))
    }

    /// Count a chunk; returns the new byte total
    pub(crate) fn record_chunk(&self, len: usize) -> u64 {
        self.chunks_relayed.fetch_add(1, Ordering::Relaxed);
        self.bytes_relayed.fetch_add(len as u64, Ordering::Relaxed) + len as u64
    }

    /// Hand over resources and move to `Streaming`
    ///
    /// Gives the resources back if the session left `Starting` meanwhile.
    pub(crate) async fn attach(
        &self,
        resources: SessionResources,
    ) -> Result<(), SessionResources> {
        let mut inner = self.inner.lock().await;
        if inner.state != SessionState::Starting {
            return Err(resources);
        }
        inner.state = SessionState::Streaming;
        inner.resources = Some(resources);
        Ok(())
    }

    /// Move to `Stopping` and take the resources
    pub(crate) async fn begin_stop(&self) -> StopClaim {
        let mut inner = self.inner.lock().await;
        if inner.state.is_closing() {
            return StopClaim::AlreadyClosing;
        }
        inner.state = SessionState::Stopping;
        StopClaim::Claimed(inner.resources.take())
    }

    /// Move to `Failed` and take the resources
    ///
    /// Returns `None` when the session is already closing.
    pub(crate) async fn fail(&self) -> Option<Option<SessionResources>> {
        let mut inner = self.inner.lock().await;
        if !inner.state.can_transition_to(SessionState::Failed) {
            return None;
        }
        inner.state = SessionState::Failed;
        Some(inner.resources.take())
    }

    /// Mark teardown complete
    pub(crate) async fn finish(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state.can_transition_to(SessionState::Stopped) {
            inner.state = SessionState::Stopped;
        }
    }
}

impl std::fmt::Debug for SessionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEntry")
            .field("id", &self.id)
            .field("port", &self.port)
            .field("bytes_relayed", &self.bytes_relayed())
            .finish_non_exhaustive()
    }
}
