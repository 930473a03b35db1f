//! Broadcast relay
//!
//! One relay per session: a TCP listener on the session port plus the live
//! set of viewers. Viewers receive the transcoder's bytes verbatim, with no
//! framing added and no replay of chunks published before they connected.
//!
//! ```text
//!  pump task                 BroadcastRelay
//!  next_chunk() ──► publish() ──┬──► [queue] ──► writer ──► viewer 1
//!                               ├──► [queue] ──► writer ──► viewer 2
//!                               └──► [queue] ──► writer ──► viewer N
//! ```
//!
//! `bytes::Bytes` is reference counted, so every queue shares the same
//! allocation for a chunk.

pub mod binder;
pub mod broadcast;
pub mod config;
mod viewer;

pub use binder::{PlatformBinder, SocketBinder};
pub use broadcast::{BroadcastRelay, RelayStats};
pub use config::RelayConfig;
