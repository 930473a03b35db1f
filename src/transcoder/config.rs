//! Transcoder configuration

use std::time::Duration;

use super::handle::DEFAULT_CHUNK_SIZE;
use super::profile::TranscoderProfile;

/// Transcoder configuration options
#[derive(Debug, Clone)]
pub struct TranscoderConfig {
    /// Argument profile
    pub profile: TranscoderProfile,

    /// Maximum bytes per stdout read
    pub chunk_size: usize,

    /// How long a terminated process may take to exit before it is killed
    pub terminate_grace: Duration,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            profile: TranscoderProfile::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            terminate_grace: Duration::from_secs(3),
        }
    }
}

impl TranscoderConfig {
    /// Set the argument profile
    pub fn profile(mut self, profile: TranscoderProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Set the read chunk size
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Set the terminate grace period
    pub fn terminate_grace(mut self, grace: Duration) -> Self {
        self.terminate_grace = grace;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TranscoderConfig::default();

        assert_eq!(config.chunk_size, 32 * 1024);
        assert_eq!(config.terminate_grace, Duration::from_secs(3));
        assert_eq!(config.profile, TranscoderProfile::default());
    }

    #[test]
    fn test_chunk_size_floor() {
        let config = TranscoderConfig::default().chunk_size(0);
        assert_eq!(config.chunk_size, 1);
    }
}
