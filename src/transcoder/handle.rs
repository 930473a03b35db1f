//! Transcoder process handle
//!
//! Owns one transcoding subprocess: its stdout is the relayed byte stream,
//! its stderr the diagnostic side channel.

use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use crate::error::LaunchError;

use super::diagnostics::Diagnostics;
use super::launcher::ProcessLauncher;
use super::profile::TranscoderProfile;

/// Default stdout read size
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// A running transcoder subprocess
pub struct TranscoderHandle {
    child: Child,
    stdout: ChildStdout,
    stderr: Option<ChildStderr>,
    buf: BytesMut,
    chunk_size: usize,
    launcher: Arc<dyn ProcessLauncher>,
    program: String,
}

impl TranscoderHandle {
    /// Launch `executable` with `profile` for `source_uri`
    pub fn launch(
        executable: &Path,
        source_uri: &str,
        profile: &TranscoderProfile,
        chunk_size: usize,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Result<Self, LaunchError> {
        Self::spawn(executable, profile.args(source_uri), chunk_size, launcher)
    }

    /// Spawn `executable` with a ready-made argument list
    pub fn spawn(
        executable: &Path,
        args: Vec<String>,
        chunk_size: usize,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Result<Self, LaunchError> {
        let program = executable.display().to_string();

        let mut cmd = Command::new(executable);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        launcher.configure(&mut cmd);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                LaunchError::ExecutableNotFound(program.clone())
            } else {
                LaunchError::Spawn {
                    program: program.clone(),
                    source: e,
                }
            }
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or(LaunchError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take();

        tracing::info!(pid = ?child.id(), program = %program, "Transcoder started");

        let chunk_size = chunk_size.max(1);
        Ok(Self {
            child,
            stdout,
            stderr,
            buf: BytesMut::with_capacity(chunk_size),
            chunk_size,
            launcher,
            program,
        })
    }

    /// OS process id, `None` once the process has been reaped
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Program path the process was started from
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Read the next chunk of output
    ///
    /// Returns `Ok(None)` once the process closes stdout. Chunk boundaries
    /// are whatever the pipe delivers. Cancel safe.
    pub async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        self.buf.reserve(self.chunk_size);
        let n = self.stdout.read_buf(&mut self.buf).await?;

        if n == 0 {
            return Ok(None);
        }

        Ok(Some(self.buf.split().freeze()))
    }

    /// Take the filtered stderr stream; yields `Some` once
    pub fn diagnostics(&mut self) -> Option<Diagnostics> {
        self.stderr.take().map(Diagnostics::new)
    }

    /// Request graceful termination
    pub fn terminate(&mut self) -> io::Result<()> {
        self.launcher.terminate(&mut self.child)
    }

    /// Kill the process outright
    pub fn kill(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    /// Exit status if the process has already exited
    pub fn try_exit(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Wait for the process to exit
    pub async fn wait_exit(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Terminate, then kill if the process outlives `grace`
    pub async fn shutdown(&mut self, grace: Duration) -> io::Result<ExitStatus> {
        if let Some(status) = self.try_exit()? {
            return Ok(status);
        }

        if let Err(e) = self.terminate() {
            tracing::debug!(error = %e, "Graceful terminate failed, killing");
            self.kill()?;
        }

        match tokio::time::timeout(grace, self.wait_exit()).await {
            Ok(status) => status,
            Err(_) => {
                tracing::warn!(
                    pid = ?self.id(),
                    grace_ms = grace.as_millis() as u64,
                    "Transcoder ignored terminate, killing"
                );
                self.kill()?;
                self.wait_exit().await
            }
        }
    }
}

impl std::fmt::Debug for TranscoderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscoderHandle")
            .field("pid", &self.id())
            .field("program", &self.program)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}
