//! Error types
//!
//! Control-plane failures are surfaced as [`Error`]; transcoder launch
//! problems carry a [`LaunchError`] with the details.

use std::io;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// A session is already registered for this port
    AlreadyActive(u16),
    /// No session is registered for this port
    NotFound(u16),
    /// Port 0 cannot identify a session
    InvalidPort,
    /// The transcoder could not be started
    Launch(LaunchError),
    /// The relay listener could not be bound
    AddressInUse {
        /// Port that failed to bind
        port: u16,
        /// Underlying OS error
        source: io::Error,
    },
    /// Reading transcoder output failed
    Read(io::Error),
    /// The session was stopped before it finished starting
    Cancelled(u16),
    /// Generic I/O error
    Io(io::Error),
    /// Malformed control request or response
    Json(serde_json::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::AlreadyActive(port) => write!(f, "Port {} is already in use", port),
            Error::NotFound(port) => write!(f, "No stream found on port {}", port),
            Error::InvalidPort => write!(f, "Port must be between 1 and 65535"),
            Error::Launch(e) => write!(f, "Failed to start transcoder: {}", e),
            Error::AddressInUse { port, source } => {
                write!(f, "Failed to bind port {}: {}", port, source)
            }
            Error::Read(e) => write!(f, "Transcoder read error: {}", e),
            Error::Cancelled(port) => {
                write!(f, "Stream on port {} was stopped while starting", port)
            }
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Json(e) => write!(f, "Invalid JSON: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Launch(e) => Some(e),
            Error::AddressInUse { source, .. } => Some(source),
            Error::Read(e) | Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LaunchError> for Error {
    fn from(e: LaunchError) -> Self {
        Error::Launch(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

/// Transcoder launch failures
#[derive(Debug)]
pub enum LaunchError {
    /// No usable executable could be located
    ExecutableNotFound(String),
    /// The OS refused to start the process
    Spawn {
        /// Program that was executed
        program: String,
        /// Underlying OS error
        source: io::Error,
    },
    /// The process started without the expected stdio pipe
    MissingPipe(&'static str),
}

impl std::fmt::Display for LaunchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchError::ExecutableNotFound(name) => write!(f, "executable not found: {}", name),
            LaunchError::Spawn { program, source } => {
                write!(f, "failed to spawn {}: {}", program, source)
            }
            LaunchError::MissingPipe(which) => write!(f, "transcoder {} was not captured", which),
        }
    }
}

impl std::error::Error for LaunchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaunchError::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            Error::AlreadyActive(9900).to_string(),
            "Port 9900 is already in use"
        );
        assert_eq!(
            Error::NotFound(9900).to_string(),
            "No stream found on port 9900"
        );

        let err: Error = LaunchError::ExecutableNotFound("ffmpeg".into()).into();
        assert_eq!(
            err.to_string(),
            "Failed to start transcoder: executable not found: ffmpeg"
        );
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error as _;

        let err = Error::AddressInUse {
            port: 80,
            source: io::Error::new(io::ErrorKind::AddrInUse, "busy"),
        };
        assert!(err.source().is_some());
        assert!(Error::InvalidPort.source().is_none());
    }
}
