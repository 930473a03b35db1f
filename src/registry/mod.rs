//! Session registry
//!
//! Maps a port to the session streaming on it. The registry is owned by the
//! supervisor and shared by `Arc`; it is the only place that decides whether
//! a port is taken.
//!
//! ```text
//!                     Arc<SessionRegistry>
//!                ┌──────────────────────────┐
//!                │ sessions: HashMap<u16,   │
//!                │   Arc<SessionEntry> {    │
//!                │     state, resources,    │
//!                │     bytes_relayed,       │
//!                │   }                      │
//!                │ >                        │
//!                └────────────┬─────────────┘
//!                             │
//!        ┌────────────────────┼────────────────────┐
//!        ▼                    ▼                    ▼
//!   start(port)          stop(port)         pump teardown
//!   try_insert()         remove_session()   remove_session()
//! ```

pub mod entry;
pub mod store;

pub use entry::SessionEntry;
pub use store::{SessionRegistry, SessionSummary};
