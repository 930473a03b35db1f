//! Viewer connections
//!
//! Each viewer owns a bounded chunk queue drained by its own writer task,
//! so a stalled socket only ever blocks that viewer's writer.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, OwnedSemaphorePermit};
use tokio::task::JoinHandle;

/// Why a viewer's writer stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ViewerExit {
    /// Peer closed the connection or the read side failed
    Disconnected,
    /// Writing a chunk failed
    WriteFailed,
    /// The relay dropped the viewer's queue
    Dropped,
}

/// Relay-side record of a connected viewer
pub(crate) struct Viewer {
    pub peer: SocketAddr,
    pub tx: mpsc::Sender<Bytes>,
    task: Option<JoinHandle<()>>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl Viewer {
    pub fn new(
        peer: SocketAddr,
        tx: mpsc::Sender<Bytes>,
        task: JoinHandle<()>,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Self {
        Self {
            peer,
            tx,
            task: Some(task),
            _permit: permit,
        }
    }

    /// Forget the writer task without aborting it
    pub fn detach(&mut self) {
        self.task.take();
    }

    /// Stop the writer and wait until its socket is closed
    pub async fn close(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        if let Some(ref task) = self.task {
            task.abort();
        }
    }
}

/// Forward queued chunks to the socket until the viewer goes away
///
/// Anything the viewer sends is discarded; the read side only serves to
/// notice a closed connection while no chunks are flowing.
pub(crate) async fn run_writer(stream: TcpStream, mut rx: mpsc::Receiver<Bytes>) -> ViewerExit {
    let (mut reader, mut writer) = stream.into_split();
    let mut scratch = [0u8; 512];

    let exit = loop {
        tokio::select! {
            chunk = rx.recv() => match chunk {
                Some(chunk) => {
                    if writer.write_all(&chunk).await.is_err() {
                        break ViewerExit::WriteFailed;
                    }
                }
                None => break ViewerExit::Dropped,
            },
            read = reader.read(&mut scratch) => match read {
                Ok(0) | Err(_) => break ViewerExit::Disconnected,
                Ok(_) => {}
            },
        }
    };

    let _ = writer.shutdown().await;
    exit
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::net::TcpListener;

    async fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn test_writer_forwards_in_order() {
        let (server, mut client) = pair().await;
        let (tx, rx) = mpsc::channel(8);
        let writer = tokio::spawn(run_writer(server, rx));

        for chunk in [&b"one"[..], b"two", b"three"] {
            tx.send(Bytes::from_static(chunk)).await.unwrap();
        }
        drop(tx);

        assert_eq!(writer.await.unwrap(), ViewerExit::Dropped);

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"onetwothree");
    }

    #[tokio::test]
    async fn test_writer_notices_disconnect() {
        let (server, client) = pair().await;
        let (_tx, rx) = mpsc::channel(8);
        let writer = tokio::spawn(run_writer(server, rx));

        drop(client);

        assert_eq!(writer.await.unwrap(), ViewerExit::Disconnected);
    }
}
