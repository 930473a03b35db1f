//! Control request decoding and dispatch

use serde::Deserialize;
use serde_json::Value;

use crate::api::{
    self, StartStreamRequest, StopStreamRequest, StreamResponse, StreamStatsRequest,
};
use crate::session::SessionSupervisor;

/// A decoded control request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// `start_stream`
    StartStream(StartStreamRequest),
    /// `stop_stream`
    StopStream(StopStreamRequest),
    /// `list_streams`
    ListStreams,
    /// `check_transcoder_available`
    CheckTranscoderAvailable,
    /// `stream_stats`
    StreamStats(StreamStatsRequest),
}

impl Request {
    /// Decode one request line
    pub fn parse(line: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(line)?)
    }
}

/// Run one request line against the supervisor and produce the reply
pub async fn dispatch(supervisor: &SessionSupervisor, line: &str) -> Value {
    let request = match Request::parse(line) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "Malformed control request");
            return to_value(StreamResponse::failure(e.to_string()));
        }
    };

    match request {
        Request::StartStream(req) => to_value(api::start_stream(supervisor, req).await),
        Request::StopStream(req) => to_value(api::stop_stream(supervisor, req).await),
        Request::ListStreams => to_value(api::list_streams(supervisor).await),
        Request::CheckTranscoderAvailable => {
            Value::Bool(api::check_transcoder_available(supervisor).await)
        }
        Request::StreamStats(req) => to_value(api::stream_stats(supervisor, req).await),
    }
}

fn to_value<T: serde::Serialize>(reply: T) -> Value {
    serde_json::to_value(reply).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to encode control reply");
        serde_json::json!({ "success": false, "message": "internal error" })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;
    use std::sync::Arc;

    use serde_json::json;

    use crate::session::SupervisorConfig;
    use crate::transcoder::StaticResolver;

    #[test]
    fn test_parse_requests() {
        assert_eq!(
            Request::parse(r#"{"op":"start_stream","source_uri":"src://cam1","port":9900}"#)
                .unwrap(),
            Request::StartStream(StartStreamRequest {
                source_uri: "src://cam1".into(),
                port: 9900,
            })
        );
        assert_eq!(
            Request::parse(r#"{"op":"stop_stream","port":9900}"#).unwrap(),
            Request::StopStream(StopStreamRequest { port: 9900 })
        );
        assert_eq!(
            Request::parse(r#"{"op":"list_streams"}"#).unwrap(),
            Request::ListStreams
        );
        assert_eq!(
            Request::parse(r#"{"op":"check_transcoder_available"}"#).unwrap(),
            Request::CheckTranscoderAvailable
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Request::parse("not json").is_err());
        assert!(Request::parse(r#"{"op":"reboot"}"#).is_err());
        assert!(Request::parse(r#"{"op":"stop_stream"}"#).is_err());
    }

    #[tokio::test]
    async fn test_dispatch_malformed() {
        let supervisor = SessionSupervisor::new(
            Arc::new(StaticResolver(PathBuf::from("/nonexistent/ffmpeg_xyz_12345"))),
            SupervisorConfig::default(),
        );

        let reply = dispatch(&supervisor, "{").await;
        assert_eq!(reply["success"], json!(false));
        assert!(reply["message"].is_string());
    }

    #[tokio::test]
    async fn test_dispatch_queries() {
        let supervisor = SessionSupervisor::new(
            Arc::new(StaticResolver(PathBuf::from("/nonexistent/ffmpeg_xyz_12345"))),
            SupervisorConfig::default(),
        );

        assert_eq!(dispatch(&supervisor, r#"{"op":"list_streams"}"#).await, json!([]));
        assert_eq!(
            dispatch(&supervisor, r#"{"op":"check_transcoder_available"}"#).await,
            json!(false)
        );
        assert_eq!(
            dispatch(&supervisor, r#"{"op":"stream_stats","port":9900}"#).await,
            Value::Null
        );

        let reply = dispatch(
            &supervisor,
            r#"{"op":"start_stream","source_uri":"src://cam1","port":9900}"#,
        )
        .await;
        assert_eq!(reply["success"], json!(false));
        assert!(reply.get("port").is_none());
    }
}
