//! Broadcast relay
//!
//! Owns one listening socket and fans every published chunk out to all
//! connected viewers. Publishing never waits on a viewer: each chunk is
//! `try_send`-ed into the viewer's queue and a full queue gets that viewer
//! disconnected.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};

use super::binder::SocketBinder;
use super::config::RelayConfig;
use super::viewer::{run_writer, Viewer, ViewerExit};

/// Relay counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Viewers currently connected
    pub viewers: usize,
    /// Viewers accepted since the relay started
    pub viewers_accepted: u64,
    /// Viewers dropped because their queue overflowed
    pub viewers_dropped: u64,
    /// Viewers that disconnected or failed a write
    pub viewers_disconnected: u64,
}

struct RelayShared {
    port: u16,
    config: RelayConfig,
    viewers: Mutex<HashMap<u64, Viewer>>,
    next_viewer_id: AtomicU64,
    viewer_limit: Option<Arc<Semaphore>>,
    closed: AtomicBool,
    accepted: AtomicU64,
    dropped: AtomicU64,
    disconnected: AtomicU64,
}

impl RelayShared {
    async fn add_viewer(self: &Arc<Self>, socket: TcpStream, peer: SocketAddr) {
        let permit = match self.viewer_limit {
            Some(ref sem) => match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(port = self.port, peer = %peer, "Viewer rejected: limit reached");
                    return;
                }
            },
            None => None,
        };

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(port = self.port, error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let id = self.next_viewer_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.config.viewer_queue_capacity);

        // Insert under the lock so the writer cannot try to remove itself
        // before it is registered
        let mut viewers = self.viewers.lock().await;
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        let shared = Arc::clone(self);
        let task = tokio::spawn(async move {
            let exit = run_writer(socket, rx).await;
            shared.on_writer_exit(id, exit).await;
        });

        viewers.insert(id, Viewer::new(peer, tx, task, permit));
        self.accepted.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            port = self.port,
            viewer = id,
            peer = %peer,
            viewers = viewers.len(),
            "Viewer connected"
        );
    }

    async fn on_writer_exit(&self, id: u64, exit: ViewerExit) {
        let mut viewers = self.viewers.lock().await;
        let Some(mut viewer) = viewers.remove(&id) else {
            return;
        };
        let remaining = viewers.len();
        drop(viewers);

        if exit != ViewerExit::Dropped {
            self.disconnected.fetch_add(1, Ordering::Relaxed);
        }

        tracing::info!(
            port = self.port,
            viewer = id,
            peer = %viewer.peer,
            reason = ?exit,
            viewers = remaining,
            "Viewer disconnected"
        );

        // Running inside the writer task; let it finish instead of aborting
        viewer.detach();
    }
}

/// Per-session fan-out server
pub struct BroadcastRelay {
    shared: Arc<RelayShared>,
    local_addr: SocketAddr,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl BroadcastRelay {
    /// Bind `port` and start accepting viewers
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(port: u16, config: RelayConfig, binder: &dyn SocketBinder) -> Result<Self> {
        let addr = SocketAddr::new(config.bind_host, port);

        let listener = binder
            .bind(addr, config.backlog)
            .and_then(TcpListener::from_std)
            .map_err(|source| Error::AddressInUse { port, source })?;
        let local_addr = listener.local_addr()?;

        let viewer_limit = if config.max_viewers > 0 {
            Some(Arc::new(Semaphore::new(config.max_viewers)))
        } else {
            None
        };

        let shared = Arc::new(RelayShared {
            port: local_addr.port(),
            config,
            viewers: Mutex::new(HashMap::new()),
            next_viewer_id: AtomicU64::new(1),
            viewer_limit,
            closed: AtomicBool::new(false),
            accepted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            disconnected: AtomicU64::new(0),
        });

        tracing::info!(addr = %local_addr, "Relay listening");

        let accept_task = tokio::spawn(accept_loop(listener, Arc::clone(&shared)));

        Ok(Self {
            shared,
            local_addr,
            accept_task: Mutex::new(Some(accept_task)),
        })
    }

    /// Address the relay listens on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Queue `chunk` for every connected viewer
    ///
    /// Returns the number of viewers the chunk was queued for. Viewers whose
    /// queue is full are disconnected.
    pub async fn publish(&self, chunk: Bytes) -> usize {
        let mut viewers = self.shared.viewers.lock().await;
        let mut queued = 0;

        viewers.retain(|id, viewer| match viewer.tx.try_send(chunk.clone()) {
            Ok(()) => {
                queued += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    port = self.shared.port,
                    viewer = *id,
                    peer = %viewer.peer,
                    "Viewer too slow, dropping"
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        });

        queued
    }

    /// Number of connected viewers
    pub async fn viewer_count(&self) -> usize {
        self.shared.viewers.lock().await.len()
    }

    /// Snapshot of relay counters
    pub async fn stats(&self) -> RelayStats {
        RelayStats {
            viewers: self.viewer_count().await,
            viewers_accepted: self.shared.accepted.load(Ordering::Relaxed),
            viewers_dropped: self.shared.dropped.load(Ordering::Relaxed),
            viewers_disconnected: self.shared.disconnected.load(Ordering::Relaxed),
        }
    }

    /// Whether `shutdown` has been called
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Close the listener and every viewer connection
    ///
    /// The port is released by the time this returns. Idempotent.
    pub async fn shutdown(&self) {
        self.shared.closed.store(true, Ordering::Release);

        if let Some(task) = self.accept_task.lock().await.take() {
            task.abort();
            let _ = task.await;
        }

        let viewers: Vec<Viewer> = {
            let mut map = self.shared.viewers.lock().await;
            map.drain().map(|(_, v)| v).collect()
        };

        let closed = viewers.len();
        for viewer in viewers {
            viewer.close().await;
        }

        tracing::info!(port = self.shared.port, viewers = closed, "Relay shut down");
    }
}

impl Drop for BroadcastRelay {
    fn drop(&mut self) {
        if let Ok(mut task) = self.accept_task.try_lock() {
            if let Some(task) = task.take() {
                task.abort();
            }
        }
    }
}

async fn accept_loop(listener: TcpListener, shared: Arc<RelayShared>) {
    loop {
        match listener.accept().await {
            Ok((socket, peer)) => shared.add_viewer(socket, peer).await,
            Err(e) => {
                tracing::error!(port = shared.port, error = %e, "Failed to accept viewer");
                // Back off on persistent errors such as fd exhaustion
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}
