//! stream-relay daemon
//!
//! Runs the JSON-lines control server until Ctrl-C, then stops every session.
//!
//! ```text
//! stream-relay --control-addr 127.0.0.1:9800 --public-host 192.168.1.20
//! echo '{"op":"start_stream","source_uri":"rtsp://cam/live","port":9900}' | nc 127.0.0.1 9800
//! ffplay tcp://192.168.1.20:9900
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use stream_relay::control::ControlServer;
use stream_relay::relay::RelayConfig;
use stream_relay::session::{SessionSupervisor, SupervisorConfig};
use stream_relay::transcoder::{FfmpegResolver, TranscoderConfig};

#[derive(Parser, Debug)]
#[command(name = "stream-relay")]
#[command(about = "Relay camera feeds to TCP viewers through ffmpeg", long_about = None)]
struct Args {
    /// Control server listen address
    #[arg(long, env = "CONTROL_ADDR", default_value = "127.0.0.1:9800")]
    control_addr: SocketAddr,

    /// Path to the ffmpeg executable (searched for when omitted)
    #[arg(long, env = "FFMPEG_PATH")]
    ffmpeg: Option<PathBuf>,

    /// Address session relays bind to
    #[arg(long, env = "BIND_HOST", default_value = "127.0.0.1")]
    bind_host: IpAddr,

    /// Host advertised in stream URLs
    #[arg(long, env = "PUBLIC_HOST", default_value = "127.0.0.1")]
    public_host: String,

    /// Chunks buffered per viewer before it is dropped
    #[arg(long, env = "QUEUE_CAPACITY", default_value = "64")]
    queue_capacity: usize,

    /// Viewers allowed per session (0 = unlimited)
    #[arg(long, env = "MAX_VIEWERS", default_value = "0")]
    max_viewers: usize,

    /// Grace period before a stopping transcoder is killed, in milliseconds
    #[arg(long, env = "GRACE_MS", default_value = "3000")]
    grace_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let resolver = match args.ffmpeg {
        Some(path) => FfmpegResolver::with_path(path),
        None => FfmpegResolver::new(),
    };

    let config = SupervisorConfig::default()
        .relay(
            RelayConfig::default()
                .bind_host(args.bind_host)
                .viewer_queue_capacity(args.queue_capacity)
                .max_viewers(args.max_viewers),
        )
        .transcoder(
            TranscoderConfig::default().terminate_grace(Duration::from_millis(args.grace_ms)),
        )
        .public_host(args.public_host);

    let supervisor = Arc::new(SessionSupervisor::new(Arc::new(resolver), config));

    if !supervisor.check_transcoder_available().await {
        tracing::warn!("ffmpeg is not available, stream starts will fail until it is installed");
    }

    let server = ControlServer::bind(args.control_addr, Arc::clone(&supervisor)).await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
        })
        .await;

    tracing::info!("Stopping all streams");
    supervisor.shutdown_all().await;

    Ok(())
}
