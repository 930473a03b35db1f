//! Platform process launchers
//!
//! Console-window suppression and graceful termination differ per OS. Each
//! target gets its own [`ProcessLauncher`], and [`PlatformLauncher`] names
//! the one compiled for the current target.

use std::io;

use tokio::process::{Child, Command};

/// OS-specific process spawn and termination behavior
pub trait ProcessLauncher: Send + Sync + 'static {
    /// Apply platform flags to a command before it is spawned
    fn configure(&self, cmd: &mut Command);

    /// Ask a running child to exit
    fn terminate(&self, child: &mut Child) -> io::Result<()>;
}

/// Unix launcher
///
/// Children get their own process group so a terminal Ctrl-C reaches the
/// supervisor only. Termination sends `SIGTERM`.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixLauncher;

#[cfg(unix)]
impl ProcessLauncher for UnixLauncher {
    fn configure(&self, cmd: &mut Command) {
        cmd.process_group(0);
    }

    fn terminate(&self, child: &mut Child) -> io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        // Already reaped
        let Some(pid) = child.id() else {
            return Ok(());
        };

        match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(e) => Err(io::Error::from(e)),
        }
    }
}

/// Windows launcher
///
/// Suppresses the console window. Windows has no graceful signal for
/// console-less children, so termination is a hard kill.
#[cfg(windows)]
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsLauncher;

#[cfg(windows)]
impl ProcessLauncher for WindowsLauncher {
    fn configure(&self, cmd: &mut Command) {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    fn terminate(&self, child: &mut Child) -> io::Result<()> {
        child.start_kill()
    }
}

/// Launcher for the compilation target
#[cfg(unix)]
pub type PlatformLauncher = UnixLauncher;

/// Launcher for the compilation target
#[cfg(windows)]
pub type PlatformLauncher = WindowsLauncher;

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    use std::os::unix::process::ExitStatusExt;
    use std::process::Stdio;

    #[tokio::test]
    async fn test_terminate_sends_sigterm() {
        let launcher = PlatformLauncher::default();

        let mut cmd = Command::new("sleep");
        cmd.arg("30").stdout(Stdio::null()).kill_on_drop(true);
        launcher.configure(&mut cmd);

        let mut child = cmd.spawn().unwrap();
        launcher.terminate(&mut child).unwrap();

        let status = child.wait().await.unwrap();
        assert_eq!(status.signal(), Some(libc_sigterm()));
    }

    #[tokio::test]
    async fn test_terminate_after_exit_is_ok() {
        let launcher = PlatformLauncher::default();

        let mut child = Command::new("true").spawn().unwrap();
        child.wait().await.unwrap();

        assert!(launcher.terminate(&mut child).is_ok());
    }

    fn libc_sigterm() -> i32 {
        nix::sys::signal::Signal::SIGTERM as i32
    }
}
