//! Supervisor configuration

use crate::relay::RelayConfig;
use crate::transcoder::TranscoderConfig;

/// Supervisor configuration options
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Settings applied to every session's relay
    pub relay: RelayConfig,

    /// Settings applied to every session's transcoder
    pub transcoder: TranscoderConfig,

    /// Host advertised in stream URLs
    pub public_host: String,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            relay: RelayConfig::default(),
            transcoder: TranscoderConfig::default(),
            public_host: "127.0.0.1".to_string(),
        }
    }
}

impl SupervisorConfig {
    /// Set the relay configuration
    pub fn relay(mut self, relay: RelayConfig) -> Self {
        self.relay = relay;
        self
    }

    /// Set the transcoder configuration
    pub fn transcoder(mut self, transcoder: TranscoderConfig) -> Self {
        self.transcoder = transcoder;
        self
    }

    /// Set the host advertised in stream URLs
    pub fn public_host(mut self, host: impl Into<String>) -> Self {
        self.public_host = host.into();
        self
    }

    /// URL viewers connect to for the session on `port`
    pub fn stream_url(&self, port: u16) -> String {
        if self.public_host.contains(':') {
            format!("tcp://[{}]:{}", self.public_host, port)
        } else {
            format!("tcp://{}:{}", self.public_host, port)
        }
    }
}
