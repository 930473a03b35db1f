//! Chunk pump
//!
//! One task per session. It owns the transcoder handle, forwards every
//! stdout chunk to the relay, and performs the teardown when the transcoder
//! fails or exits on its own. An explicit stop reaches it through the
//! control channel.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::error::Error;
use crate::registry::{SessionEntry, SessionRegistry};
use crate::relay::BroadcastRelay;
use crate::transcoder::TranscoderHandle;

/// Log relay progress every this many bytes
const PROGRESS_LOG_BYTES: u64 = 1024 * 1024;

/// Explicit stop sent by the supervisor
pub(crate) struct StopRequest {
    /// Fired once the transcoder has been signalled
    pub ack: oneshot::Sender<()>,
}

#[derive(Debug)]
enum PumpExit {
    Stopped,
    EndOfStream,
    ReadFailed(io::Error),
}

pub(crate) struct Pump {
    pub entry: Arc<SessionEntry>,
    pub registry: Arc<SessionRegistry>,
    pub relay: Arc<BroadcastRelay>,
    pub handle: TranscoderHandle,
    pub control: mpsc::Receiver<StopRequest>,
    pub terminate_grace: Duration,
}

impl Pump {
    pub async fn run(mut self) {
        let port = self.entry.port;
        let session_id = self.entry.id;

        tracing::debug!(port, session_id, pid = ?self.handle.id(), "Pump started");

        let exit = loop {
            tokio::select! {
                biased;

                request = self.control.recv() => {
                    if let Err(e) = self.handle.terminate() {
                        tracing::warn!(port, error = %e, "Terminate failed, killing transcoder");
                        let _ = self.handle.kill();
                    }
                    if let Some(request) = request {
                        let _ = request.ack.send(());
                    }
                    break PumpExit::Stopped;
                }

                chunk = self.handle.next_chunk() => match chunk {
                    Ok(Some(chunk)) => {
                        let len = chunk.len() as u64;
                        let total = self.entry.record_chunk(chunk.len());
                        let viewers = self.relay.publish(chunk).await;

                        if total / PROGRESS_LOG_BYTES != (total - len) / PROGRESS_LOG_BYTES {
                            tracing::debug!(port, bytes = total, viewers, "Relay progress");
                        }
                    }
                    Ok(None) => break PumpExit::EndOfStream,
                    Err(e) => break PumpExit::ReadFailed(e),
                },
            }
        };

        match exit {
            PumpExit::Stopped => {
                tracing::debug!(port, session_id, "Pump stopped on request");
            }
            PumpExit::EndOfStream => {
                tracing::warn!(
                    port,
                    session_id,
                    bytes = self.entry.bytes_relayed(),
                    "Transcoder output ended"
                );
                self.fail().await;
            }
            PumpExit::ReadFailed(e) => {
                let e = Error::Read(e);
                tracing::error!(port, session_id, error = %e, "Transcoder output lost");
                self.fail().await;
            }
        }

        // A stop that raced the exit must not wait out the grace period
        self.control.close();
        while let Ok(request) = self.control.try_recv() {
            let _ = request.ack.send(());
        }

        match self.handle.shutdown(self.terminate_grace).await {
            Ok(status) => tracing::info!(port, session_id, status = %status, "Transcoder exited"),
            Err(e) => tracing::error!(port, session_id, error = %e, "Failed to reap transcoder"),
        }
    }

    /// Tear the session down after a mid-stream failure
    ///
    /// Does nothing if an explicit stop already claimed the session.
    async fn fail(&mut self) {
        // The resources hold the same relay this pump publishes to
        let Some(_resources) = self.entry.fail().await else {
            return;
        };

        if matches!(self.handle.try_exit(), Ok(None)) {
            let _ = self.handle.terminate();
        }

        self.relay.shutdown().await;

        self.registry
            .remove_session(self.entry.port, self.entry.id)
            .await;
        self.entry.finish().await;

        tracing::info!(port = self.entry.port, session_id = self.entry.id, "Session torn down");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    use std::path::Path;

    use tokio::time::{sleep, timeout};

    use crate::registry::entry::{SessionResources, StopClaim};
    use crate::relay::{PlatformBinder, RelayConfig};
    use crate::transcoder::PlatformLauncher;

    #[tokio::test]
    async fn test_stop_after_exit_is_acked_promptly() {
        let registry = Arc::new(SessionRegistry::new());
        let entry = Arc::new(SessionEntry::new(1, 9900, "src://cam1"));
        assert!(registry.try_insert(Arc::clone(&entry)).await);

        // Closes stdout right away but ignores SIGTERM, so reaping takes the full grace
        let handle = TranscoderHandle::spawn(
            Path::new("sh"),
            vec!["-c".into(), "trap '' TERM; exec 1>&-; sleep 5".into()],
            1024,
            Arc::new(PlatformLauncher::default()),
        )
        .unwrap();
        let relay = Arc::new(
            BroadcastRelay::bind(0, RelayConfig::default(), &PlatformBinder::default()).unwrap(),
        );

        let (control_tx, control_rx) = mpsc::channel(1);
        let attached = entry
            .attach(SessionResources {
                relay: Arc::clone(&relay),
                control: control_tx.clone(),
            })
            .await;
        assert!(attached.is_ok());

        // The stop claims the session before the pump notices the exit
        assert!(matches!(entry.begin_stop().await, StopClaim::Claimed(Some(_))));

        let pump = Pump {
            entry: Arc::clone(&entry),
            registry: Arc::clone(&registry),
            relay,
            handle,
            control: control_rx,
            terminate_grace: Duration::from_secs(5),
        };
        tokio::spawn(pump.run());

        // Let the pump reach end of stream and start reaping
        sleep(Duration::from_millis(300)).await;

        let (ack_tx, ack_rx) = oneshot::channel();
        if control_tx.send(StopRequest { ack: ack_tx }).await.is_ok() {
            let acked = timeout(Duration::from_secs(1), ack_rx).await;
            assert!(acked.is_ok(), "stop waited for the grace period");
        }
    }
}
