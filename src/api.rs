//! Control-plane operations
//!
//! Thin request/response layer over [`SessionSupervisor`]. Every failure is
//! turned into a `{success: false, message}` response rather than an error.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::session::{SessionStats, SessionSupervisor};

/// Request to start relaying a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartStreamRequest {
    /// Upstream source handed to the transcoder
    pub source_uri: String,
    /// Port viewers will connect to
    pub port: i64,
}

/// Request to stop the session on a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopStreamRequest {
    /// Port of the session to stop
    pub port: i64,
}

/// Request for the statistics of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStatsRequest {
    /// Port of the session to inspect
    pub port: i64,
}

/// Outcome of `start_stream` and `stop_stream`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamResponse {
    /// Whether the operation succeeded
    pub success: bool,
    /// Human-readable outcome
    pub message: String,
    /// URL viewers connect to, set by a successful start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
    /// Session port, set on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl StreamResponse {
    /// A failed response carrying only a message
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            stream_url: None,
            port: None,
        }
    }
}

impl From<Error> for StreamResponse {
    fn from(e: Error) -> Self {
        Self::failure(e.to_string())
    }
}

/// One entry of `list_streams`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStatus {
    /// Session port
    pub port: u16,
    /// Upstream source as given by the caller
    pub source_uri: String,
    /// URL viewers connect to
    pub stream_url: String,
    /// Whether the session is currently streaming
    pub active: bool,
}

fn session_port(port: i64) -> Result<u16, Error> {
    match u16::try_from(port) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(Error::InvalidPort),
    }
}

/// Start a session
pub async fn start_stream(
    supervisor: &SessionSupervisor,
    request: StartStreamRequest,
) -> StreamResponse {
    let port = match session_port(request.port) {
        Ok(port) => port,
        Err(e) => return e.into(),
    };

    match supervisor.start(&request.source_uri, port).await {
        Ok(started) => StreamResponse {
            success: true,
            message: format!("Stream started on port {}", started.port),
            stream_url: Some(started.stream_url),
            port: Some(started.port),
        },
        Err(e) => e.into(),
    }
}

/// Stop a session
pub async fn stop_stream(
    supervisor: &SessionSupervisor,
    request: StopStreamRequest,
) -> StreamResponse {
    let port = match session_port(request.port) {
        Ok(port) => port,
        Err(e) => return e.into(),
    };

    match supervisor.stop(port).await {
        Ok(port) => StreamResponse {
            success: true,
            message: format!("Stream on port {} stopped", port),
            stream_url: None,
            port: Some(port),
        },
        Err(e) => e.into(),
    }
}

/// List registered sessions, ordered by port
pub async fn list_streams(supervisor: &SessionSupervisor) -> Vec<StreamStatus> {
    let config = supervisor.config();
    let mut streams: Vec<StreamStatus> = supervisor
        .list()
        .await
        .into_iter()
        .map(|summary| StreamStatus {
            stream_url: config.stream_url(summary.port),
            port: summary.port,
            source_uri: summary.source_uri,
            active: summary.active,
        })
        .collect();

    streams.sort_by_key(|s| s.port);
    streams
}

/// Whether the transcoder executable is usable
pub async fn check_transcoder_available(supervisor: &SessionSupervisor) -> bool {
    supervisor.check_transcoder_available().await
}

/// Statistics for one session, `None` if nothing runs on the port
pub async fn stream_stats(
    supervisor: &SessionSupervisor,
    request: StreamStatsRequest,
) -> Option<SessionStats> {
    let port = session_port(request.port).ok()?;
    supervisor.stats(port).await
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    use std::path::PathBuf;
    use std::sync::Arc;

    use crate::session::SupervisorConfig;
    use crate::transcoder::{StaticResolver, TranscoderConfig, TranscoderProfile};

    fn supervisor() -> SessionSupervisor {
        let config = SupervisorConfig::default().transcoder(TranscoderConfig::default().profile(
            TranscoderProfile::custom(["-c", "while true; do printf 'ts'; sleep 0.05; done"]),
        ));
        SessionSupervisor::new(Arc::new(StaticResolver(PathBuf::from("sh"))), config)
    }

    fn start(uri: &str, port: i64) -> StartStreamRequest {
        StartStreamRequest {
            source_uri: uri.to_string(),
            port,
        }
    }

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    #[tokio::test]
    async fn test_start_conflict_stop_list() {
        let supervisor = supervisor();
        let port = free_port();

        let first = start_stream(&supervisor, start("src://cam1", port.into())).await;
        assert!(first.success, "{}", first.message);
        assert_eq!(first.port, Some(port));
        assert_eq!(
            first.stream_url,
            Some(format!("tcp://127.0.0.1:{}", port))
        );

        let second = start_stream(&supervisor, start("src://cam2", port.into())).await;
        assert!(!second.success);
        assert_eq!(second.message, format!("Port {} is already in use", port));
        assert_eq!(second.port, None);

        let listed = list_streams(&supervisor).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].source_uri, "src://cam1");
        assert_eq!(listed[0].stream_url, format!("tcp://127.0.0.1:{}", port));

        let stopped = stop_stream(&supervisor, StopStreamRequest { port: port.into() }).await;
        assert!(stopped.success);
        assert_eq!(stopped.port, Some(port));

        assert!(list_streams(&supervisor).await.is_empty());
    }

    #[tokio::test]
    async fn test_stop_unknown() {
        let supervisor = supervisor();
        let port = free_port();
        let response = stop_stream(&supervisor, StopStreamRequest { port: port.into() }).await;

        assert!(!response.success);
        assert_eq!(response.message, format!("No stream found on port {}", port));
    }

    #[tokio::test]
    async fn test_out_of_range_ports() {
        let supervisor = supervisor();

        for port in [0, -1, 70_000] {
            let response = start_stream(&supervisor, start("src://cam1", port)).await;
            assert!(!response.success);
        }
        assert!(list_streams(&supervisor).await.is_empty());
        assert!(stream_stats(&supervisor, StreamStatsRequest { port: -5 }).await.is_none());
    }

    #[test]
    fn test_failure_serialization_omits_fields() {
        let json = serde_json::to_value(StreamResponse::failure("nope")).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "message": "nope"}));
    }
}
