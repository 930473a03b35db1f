//! Session state machine
//!
//! ```text
//! Starting ──► Streaming ──► Stopping ──► Stopped
//!    │             │
//!    └──► Failed ◄─┘ ──────────────────► Stopped
//! ```

use serde::Serialize;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Registered; transcoder and relay are being set up
    Starting,
    /// Chunks are being pumped to viewers
    Streaming,
    /// Explicit stop in progress
    Stopping,
    /// Transcoder failed or exited on its own
    Failed,
    /// All resources released
    Stopped,
}

impl SessionState {
    /// Whether the session is relaying data
    pub fn is_active(&self) -> bool {
        *self == SessionState::Streaming
    }

    /// Whether teardown has started or finished
    pub fn is_closing(&self) -> bool {
        matches!(
            self,
            SessionState::Stopping | SessionState::Failed | SessionState::Stopped
        )
    }

    /// Check whether moving to `next` is a legal transition
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;

        matches!(
            (self, next),
            (Starting, Streaming)
                | (Starting, Stopping)
                | (Starting, Failed)
                | (Streaming, Stopping)
                | (Streaming, Failed)
                | (Stopping, Stopped)
                | (Failed, Stopped)
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Starting => "starting",
            SessionState::Streaming => "streaming",
            SessionState::Stopping => "stopping",
            SessionState::Failed => "failed",
            SessionState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let state = SessionState::Starting;
        assert!(!state.is_active());
        assert!(state.can_transition_to(SessionState::Streaming));

        let state = SessionState::Streaming;
        assert!(state.is_active());
        assert!(state.can_transition_to(SessionState::Stopping));
        assert!(state.can_transition_to(SessionState::Failed));

        assert!(SessionState::Stopping.can_transition_to(SessionState::Stopped));
        assert!(SessionState::Failed.can_transition_to(SessionState::Stopped));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!SessionState::Stopped.can_transition_to(SessionState::Streaming));
        assert!(!SessionState::Failed.can_transition_to(SessionState::Streaming));
        assert!(!SessionState::Stopping.can_transition_to(SessionState::Failed));
        assert!(!SessionState::Streaming.can_transition_to(SessionState::Starting));
    }

    #[test]
    fn test_closing() {
        assert!(!SessionState::Starting.is_closing());
        assert!(!SessionState::Streaming.is_closing());
        assert!(SessionState::Stopping.is_closing());
        assert!(SessionState::Failed.is_closing());
        assert!(SessionState::Stopped.is_closing());
    }
}
