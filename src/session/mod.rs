//! Relay sessions
//!
//! A session is one transcoder process feeding one relay on one port.
//!
//! ```text
//!   start(uri, port)
//!        │
//!        ▼
//!   Starting ──► Streaming ──► Stopping ──► Stopped
//!        │            │
//!        └─────┬──────┘
//!              ▼
//!           Failed ──► Stopped
//! ```
//!
//! The supervisor drives the explicit transitions; the pump task drives
//! `Failed` when the transcoder exits or its output cannot be read.

pub mod config;
pub(crate) mod pump;
pub mod source;
pub mod state;
pub mod stats;
pub mod supervisor;

pub use config::SupervisorConfig;
pub use source::redact_source_uri;
pub use state::SessionState;
pub use stats::SessionStats;
pub use supervisor::{SessionSupervisor, StartedStream};
