//! Control server listener
//!
//! Handles the TCP accept loop and one task per control client.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::{TcpListener, TcpStream};

use crate::api::StreamResponse;
use crate::error::Result;
use crate::session::SessionSupervisor;

use super::protocol::dispatch;

/// Longest accepted request line
const MAX_REQUEST_BYTES: u64 = 64 * 1024;

/// Pause after a failed accept
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// JSON-lines control server
pub struct ControlServer {
    listener: TcpListener,
    supervisor: Arc<SessionSupervisor>,
    next_client_id: AtomicU64,
}

impl ControlServer {
    /// Bind the control listener
    pub async fn bind(addr: SocketAddr, supervisor: Arc<SessionSupervisor>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "Control server listening");

        Ok(Self {
            listener,
            supervisor,
            next_client_id: AtomicU64::new(1),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve clients until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: std::future::Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
            }
            _ = self.accept_loop() => {}
        }
    }

    async fn accept_loop(&self) {
        loop {
            match self.listener.accept().await {
                Ok((socket, peer)) => {
                    let client_id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(client_id, peer = %peer, "Control client connected");

                    let supervisor = Arc::clone(&self.supervisor);
                    tokio::spawn(async move {
                        if let Err(e) = serve_client(socket, &supervisor).await {
                            tracing::debug!(client_id, error = %e, "Control client error");
                        }
                        tracing::debug!(client_id, "Control client closed");
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept control connection");
                    // Back off on persistent errors such as fd exhaustion
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}

async fn serve_client(socket: TcpStream, supervisor: &SessionSupervisor) -> std::io::Result<()> {
    let (reader, mut writer) = socket.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        let n = (&mut reader)
            .take(MAX_REQUEST_BYTES)
            .read_until(b'\n', &mut line)
            .await?;

        if n == 0 {
            return Ok(());
        }

        if !line.ends_with(b"\n") && n as u64 == MAX_REQUEST_BYTES {
            let reply = serde_json::to_value(StreamResponse::failure("Request too large"))
                .unwrap_or_default();
            write_reply(&mut writer, &reply).await?;

            if !skip_line(&mut reader).await? {
                return Ok(());
            }
            continue;
        }

        let text = String::from_utf8_lossy(&line);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        let reply = dispatch(supervisor, text).await;
        write_reply(&mut writer, &reply).await?;
    }
}

/// Discard input up to the next newline; `false` on end of stream
async fn skip_line<R>(reader: &mut R) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(false);
        }
        match buf.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                reader.consume(pos + 1);
                return Ok(true);
            }
            None => {
                let len = buf.len();
                reader.consume(len);
            }
        }
    }
}

async fn write_reply<W>(writer: &mut W, reply: &serde_json::Value) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut out = serde_json::to_vec(reply)?;
    out.push(b'\n');
    writer.write_all(&out).await?;
    writer.flush().await
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    use std::path::PathBuf;

    use serde_json::{json, Value};
    use tokio::sync::oneshot;

    use crate::session::SupervisorConfig;
    use crate::transcoder::{StaticResolver, TranscoderConfig, TranscoderProfile};

    async fn spawn_server() -> (SocketAddr, Arc<SessionSupervisor>, oneshot::Sender<()>) {
        let config = SupervisorConfig::default().transcoder(TranscoderConfig::default().profile(
            TranscoderProfile::custom(["-c", "while true; do printf 'ts'; sleep 0.05; done"]),
        ));
        let supervisor = Arc::new(SessionSupervisor::new(
            Arc::new(StaticResolver(PathBuf::from("sh"))),
            config,
        ));

        let server = ControlServer::bind("127.0.0.1:0".parse().unwrap(), Arc::clone(&supervisor))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();

        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            server
                .run_until(async {
                    let _ = rx.await;
                })
                .await;
        });

        (addr, supervisor, tx)
    }

    async fn roundtrip(
        reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
        writer: &mut tokio::net::tcp::OwnedWriteHalf,
        request: &str,
    ) -> Value {
        writer.write_all(request.as_bytes()).await.unwrap();
        writer.write_all(b"\n").await.unwrap();

        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        serde_json::from_str(&line).unwrap()
    }

    #[tokio::test]
    async fn test_control_session() {
        let (addr, supervisor, _shutdown) = spawn_server().await;
        let port = {
            let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            probe.local_addr().unwrap().port()
        };

        let (reader, mut writer) = TcpStream::connect(addr).await.unwrap().into_split();
        let mut reader = BufReader::new(reader);

        let reply = roundtrip(
            &mut reader,
            &mut writer,
            &format!(r#"{{"op":"start_stream","source_uri":"src://cam1","port":{}}}"#, port),
        )
        .await;
        assert_eq!(reply["success"], json!(true));
        assert_eq!(reply["port"], json!(port));

        let reply = roundtrip(&mut reader, &mut writer, r#"{"op":"list_streams"}"#).await;
        assert_eq!(reply.as_array().map(Vec::len), Some(1));
        assert_eq!(reply[0]["source_uri"], json!("src://cam1"));

        let reply = roundtrip(&mut reader, &mut writer, "garbage").await;
        assert_eq!(reply["success"], json!(false));

        let reply = roundtrip(
            &mut reader,
            &mut writer,
            &format!(r#"{{"op":"stop_stream","port":{}}}"#, port),
        )
        .await;
        assert_eq!(reply["success"], json!(true));

        assert!(supervisor.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_request_rejected() {
        let (addr, _supervisor, _shutdown) = spawn_server().await;

        let (reader, mut writer) = TcpStream::connect(addr).await.unwrap().into_split();
        let mut reader = BufReader::new(reader);

        let huge = vec![b'x'; MAX_REQUEST_BYTES as usize + 16];
        writer.write_all(&huge).await.unwrap();
        writer.write_all(b"\n").await.unwrap();

        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let reply: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(reply["message"], json!("Request too large"));

        // The connection stays usable after the oversized line
        let reply = roundtrip(&mut reader, &mut writer, r#"{"op":"list_streams"}"#).await;
        assert_eq!(reply, json!([]));
    }
}
