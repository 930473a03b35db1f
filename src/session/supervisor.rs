//! Session supervisor
//!
//! Binds the registry, transcoder and relay together: `start` registers a
//! session and brings up its transcoder and relay, `stop` tears it down, and
//! the per-session pump handles transcoder failure on its own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::registry::entry::{SessionResources, StopClaim};
use crate::registry::{SessionEntry, SessionRegistry, SessionSummary};
use crate::relay::{BroadcastRelay, PlatformBinder, RelayStats, SocketBinder};
use crate::transcoder::{
    check_available, ExecutableResolver, PlatformLauncher, ProcessLauncher, TranscoderHandle,
};

use super::config::SupervisorConfig;
use super::pump::{Pump, StopRequest};
use super::source::{redact_source_uri, scrub_line};
use super::stats::SessionStats;

/// A successfully started session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedStream {
    /// Session port
    pub port: u16,
    /// URL viewers connect to
    pub stream_url: String,
    /// Process-unique session ID
    pub session_id: u64,
}

/// Orchestrates all relay sessions
pub struct SessionSupervisor {
    registry: Arc<SessionRegistry>,
    resolver: Arc<dyn ExecutableResolver>,
    launcher: Arc<dyn ProcessLauncher>,
    binder: Arc<dyn SocketBinder>,
    config: SupervisorConfig,
    next_session_id: AtomicU64,
}

impl SessionSupervisor {
    /// Create a supervisor using the platform launcher and binder
    pub fn new(resolver: Arc<dyn ExecutableResolver>, config: SupervisorConfig) -> Self {
        Self::with_platform(
            resolver,
            config,
            Arc::new(PlatformLauncher::default()),
            Arc::new(PlatformBinder::default()),
        )
    }

    /// Create a supervisor with explicit platform capabilities
    pub fn with_platform(
        resolver: Arc<dyn ExecutableResolver>,
        config: SupervisorConfig,
        launcher: Arc<dyn ProcessLauncher>,
        binder: Arc<dyn SocketBinder>,
    ) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new()),
            resolver,
            launcher,
            binder,
            config,
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Get a reference to the session registry
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Get the supervisor configuration
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Start relaying `source_uri` on `port`
    pub async fn start(&self, source_uri: &str, port: u16) -> Result<StartedStream> {
        if port == 0 {
            return Err(Error::InvalidPort);
        }

        if self.registry.get(port).await.is_some() {
            tracing::warn!(port, "Start rejected, port already active");
            return Err(Error::AlreadyActive(port));
        }

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(SessionEntry::new(session_id, port, source_uri));

        // Registering first reserves the port before anything binds it
        if !self.registry.try_insert(Arc::clone(&entry)).await {
            tracing::warn!(port, "Start rejected, port already active");
            return Err(Error::AlreadyActive(port));
        }

        tracing::info!(
            port,
            session_id,
            source = %redact_source_uri(source_uri),
            "Starting stream"
        );

        match self.bring_up(&entry).await {
            Ok(()) => Ok(StartedStream {
                port,
                stream_url: self.config.stream_url(port),
                session_id,
            }),
            Err(e) => {
                tracing::error!(port, session_id, error = %e, "Failed to start stream");
                self.registry.remove_session(port, session_id).await;
                entry.fail().await;
                entry.finish().await;
                Err(e)
            }
        }
    }

    async fn bring_up(&self, entry: &Arc<SessionEntry>) -> Result<()> {
        let port = entry.port;
        let transcoder = &self.config.transcoder;

        let executable = self.resolver.resolve()?;
        let mut handle = TranscoderHandle::launch(
            &executable,
            &entry.source_uri,
            &transcoder.profile,
            transcoder.chunk_size,
            Arc::clone(&self.launcher),
        )?;

        let relay = match BroadcastRelay::bind(port, self.config.relay.clone(), self.binder.as_ref())
        {
            Ok(relay) => Arc::new(relay),
            Err(e) => {
                discard(&mut handle).await;
                return Err(e);
            }
        };

        let (control_tx, control_rx) = mpsc::channel(1);
        let resources = SessionResources {
            relay: Arc::clone(&relay),
            control: control_tx,
        };

        if entry.attach(resources).await.is_err() {
            // Stopped while we were starting up
            relay.shutdown().await;
            discard(&mut handle).await;
            return Err(Error::Cancelled(port));
        }

        if let Some(mut diagnostics) = handle.diagnostics() {
            let uri = entry.source_uri.clone();
            let redacted = redact_source_uri(&uri);
            tokio::spawn(async move {
                while let Some(line) = diagnostics.next_line().await {
                    log_diagnostic(port, &scrub_line(&line, &uri, &redacted));
                }
            });
        }

        let pump = Pump {
            entry: Arc::clone(entry),
            registry: Arc::clone(&self.registry),
            relay,
            handle,
            control: control_rx,
            terminate_grace: transcoder.terminate_grace,
        };
        tokio::spawn(pump.run());

        tracing::info!(port, session_id = entry.id, "Stream started");
        Ok(())
    }

    /// Stop the session on `port`
    ///
    /// Returns once the transcoder has been signalled and the relay is shut
    /// down; the process may still be exiting.
    pub async fn stop(&self, port: u16) -> Result<u16> {
        let Some(entry) = self.registry.get(port).await else {
            return Err(Error::NotFound(port));
        };

        let resources = match entry.begin_stop().await {
            StopClaim::Claimed(resources) => resources,
            StopClaim::AlreadyClosing => return Err(Error::NotFound(port)),
        };

        tracing::info!(port, session_id = entry.id, "Stopping stream");

        if let Some(resources) = resources {
            let (ack_tx, ack_rx) = oneshot::channel();
            if resources
                .control
                .send(StopRequest { ack: ack_tx })
                .await
                .is_ok()
            {
                // Errors only if the pump already exited
                let _ = ack_rx.await;
            }
            resources.relay.shutdown().await;
        }

        self.registry.remove_session(port, entry.id).await;
        entry.finish().await;

        tracing::info!(
            port,
            session_id = entry.id,
            bytes = entry.bytes_relayed(),
            "Stream stopped"
        );
        Ok(port)
    }

    /// Snapshot of registered sessions
    pub async fn list(&self) -> Vec<SessionSummary> {
        self.registry.list().await
    }

    /// Statistics for the session on `port`
    pub async fn stats(&self, port: u16) -> Option<SessionStats> {
        let entry = self.registry.get(port).await?;

        let relay = match entry.relay().await {
            Some(relay) => relay.stats().await,
            None => RelayStats::default(),
        };

        Some(SessionStats::new(
            port,
            entry.state().await,
            entry.bytes_relayed(),
            entry.chunks_relayed(),
            relay,
            entry.uptime(),
        ))
    }

    /// Whether the transcoder can be resolved and runs
    pub async fn check_transcoder_available(&self) -> bool {
        match self.resolver.resolve() {
            Ok(path) => check_available(&path, self.launcher.as_ref()).await,
            Err(e) => {
                tracing::warn!(error = %e, "Transcoder unavailable");
                false
            }
        }
    }

    /// Stop every session
    pub async fn shutdown_all(&self) {
        for entry in self.registry.entries().await {
            if let Err(e) = self.stop(entry.port).await {
                tracing::debug!(port = entry.port, error = %e, "Session already gone");
            }
        }
    }
}

/// Kill a transcoder that never made it into a session
async fn discard(handle: &mut TranscoderHandle) {
    let _ = handle.kill();
    let _ = handle.wait_exit().await;
}

fn log_diagnostic(port: u16, line: &str) {
    let lower = line.to_ascii_lowercase();
    if lower.contains("error") || lower.contains("failed") || lower.contains("invalid") {
        tracing::warn!(port, "transcoder: {}", line);
    } else {
        tracing::debug!(port, "transcoder: {}", line);
    }
}
