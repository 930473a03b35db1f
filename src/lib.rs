//! stream-relay: supervised transcoder sessions relayed to live TCP viewers
//!
//! Each session runs one transcoder subprocess that pulls an upstream source
//! (typically an RTSP camera) and writes a low-latency stream to stdout. The
//! bytes are fanned out, unchanged, to every TCP viewer connected to the
//! session's port.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use stream_relay::session::{SessionSupervisor, SupervisorConfig};
//! use stream_relay::transcoder::FfmpegResolver;
//!
//! #[tokio::main]
//! async fn main() -> stream_relay::Result<()> {
//!     let supervisor = SessionSupervisor::new(
//!         Arc::new(FfmpegResolver::new()),
//!         SupervisorConfig::default(),
//!     );
//!
//!     let started = supervisor.start("rtsp://cam.local/live", 9900).await?;
//!     println!("viewers connect to {}", started.stream_url);
//!
//!     supervisor.stop(9900).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod control;
pub mod error;
pub mod registry;
pub mod relay;
pub mod session;
pub mod transcoder;

pub use error::{Error, LaunchError, Result};
pub use session::{SessionSupervisor, StartedStream, SupervisorConfig};
