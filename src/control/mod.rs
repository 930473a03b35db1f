//! Control server
//!
//! Exposes the control-plane operations over TCP as newline-delimited JSON.
//! Each request line names its operation in an `op` field and gets exactly
//! one response line:
//!
//! ```text
//! -> {"op":"start_stream","source_uri":"rtsp://cam/live","port":9900}
//! <- {"success":true,"message":"Stream started on port 9900","stream_url":"tcp://127.0.0.1:9900","port":9900}
//! -> {"op":"list_streams"}
//! <- [{"port":9900,"source_uri":"rtsp://cam/live","stream_url":"tcp://127.0.0.1:9900","active":true}]
//! ```

pub mod protocol;
pub mod server;

pub use protocol::{dispatch, Request};
pub use server::ControlServer;
