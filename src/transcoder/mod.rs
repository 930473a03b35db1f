//! Transcoder subprocess handling
//!
//! This module provides:
//! - Argument profiles for the transcoding process
//! - Platform launchers (console window, graceful terminate)
//! - The process handle that yields stdout chunks
//! - Filtered stderr diagnostics
//! - Executable discovery

pub mod config;
pub mod diagnostics;
pub mod discovery;
pub mod handle;
pub mod launcher;
pub mod profile;

pub use config::TranscoderConfig;
pub use diagnostics::Diagnostics;
pub use discovery::{check_available, ExecutableResolver, FfmpegResolver, StaticResolver};
pub use handle::TranscoderHandle;
pub use launcher::{PlatformLauncher, ProcessLauncher};
pub use profile::{FfmpegProfile, TranscoderProfile};
