//! Transcoder executable discovery
//!
//! The supervisor never searches the filesystem itself; it is handed an
//! [`ExecutableResolver`] and asks it for a path on every start.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;

use tokio::process::Command;

use crate::error::LaunchError;

use super::launcher::ProcessLauncher;

/// Environment variable naming an explicit ffmpeg binary
pub const FFMPEG_PATH_ENV: &str = "FFMPEG_PATH";

/// Resolves the transcoder executable
pub trait ExecutableResolver: Send + Sync {
    /// Path of the executable to launch
    fn resolve(&self) -> Result<PathBuf, LaunchError>;
}

impl<F> ExecutableResolver for F
where
    F: Fn() -> Result<PathBuf, LaunchError> + Send + Sync,
{
    fn resolve(&self) -> Result<PathBuf, LaunchError> {
        self()
    }
}

/// Always resolves to the same path
#[derive(Debug, Clone)]
pub struct StaticResolver(pub PathBuf);

impl ExecutableResolver for StaticResolver {
    fn resolve(&self) -> Result<PathBuf, LaunchError> {
        Ok(self.0.clone())
    }
}

/// Locates ffmpeg
///
/// Search order: explicit path, `FFMPEG_PATH`, `PATH`, then well-known
/// install locations. The first hit is cached.
#[derive(Debug, Default)]
pub struct FfmpegResolver {
    explicit: Option<PathBuf>,
    cached: OnceLock<PathBuf>,
}

impl FfmpegResolver {
    /// Create a resolver that searches the default locations
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefer `path` when it exists
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            explicit: Some(path.into()),
            cached: OnceLock::new(),
        }
    }

    fn search(&self) -> Option<PathBuf> {
        if let Some(ref path) = self.explicit {
            if path.exists() {
                tracing::info!(path = %path.display(), "Using configured ffmpeg");
                return Some(path.clone());
            }
            tracing::warn!(path = %path.display(), "Configured ffmpeg does not exist");
        }

        if let Some(path) = std::env::var_os(FFMPEG_PATH_ENV).map(PathBuf::from) {
            if path.exists() {
                tracing::info!(path = %path.display(), "Using ffmpeg from {}", FFMPEG_PATH_ENV);
                return Some(path);
            }
        }

        if let Ok(path) = which::which("ffmpeg") {
            tracing::info!(path = %path.display(), "Using ffmpeg from PATH");
            return Some(path);
        }

        let found = well_known_locations().into_iter().find(|p| p.is_file());
        if let Some(ref path) = found {
            tracing::info!(path = %path.display(), "Found ffmpeg");
        }
        found
    }
}

impl ExecutableResolver for FfmpegResolver {
    fn resolve(&self) -> Result<PathBuf, LaunchError> {
        if let Some(path) = self.cached.get() {
            return Ok(path.clone());
        }

        match self.search() {
            Some(path) => Ok(self.cached.get_or_init(|| path).clone()),
            None => {
                tracing::warn!("ffmpeg not found");
                Err(LaunchError::ExecutableNotFound("ffmpeg".into()))
            }
        }
    }
}

#[cfg(windows)]
fn well_known_locations() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from(r"C:\ffmpeg\bin\ffmpeg.exe"),
        PathBuf::from(r"C:\Program Files\ffmpeg\bin\ffmpeg.exe"),
    ];
    if let Some(profile) = std::env::var_os("USERPROFILE").map(PathBuf::from) {
        paths.push(profile.join(r"AppData\Local\Microsoft\WinGet\Links\ffmpeg.exe"));
        paths.push(profile.join(r"scoop\apps\ffmpeg\current\bin\ffmpeg.exe"));
    }
    paths
}

#[cfg(not(windows))]
fn well_known_locations() -> Vec<PathBuf> {
    ["/usr/local/bin/ffmpeg", "/opt/homebrew/bin/ffmpeg", "/usr/bin/ffmpeg", "/snap/bin/ffmpeg"]
        .into_iter()
        .map(PathBuf::from)
        .collect()
}

/// Check that `executable` runs and reports a version
pub async fn check_available(executable: &Path, launcher: &dyn ProcessLauncher) -> bool {
    let mut cmd = Command::new(executable);
    cmd.arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    launcher.configure(&mut cmd);

    match cmd.status().await {
        Ok(status) => {
            tracing::info!(path = %executable.display(), ok = status.success(), "Transcoder check");
            status.success()
        }
        Err(e) => {
            tracing::warn!(path = %executable.display(), error = %e, "Transcoder check failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transcoder::launcher::PlatformLauncher;

    #[test]
    fn test_static_resolver() {
        let resolver = StaticResolver(PathBuf::from("/opt/ffmpeg"));
        assert_eq!(resolver.resolve().unwrap(), PathBuf::from("/opt/ffmpeg"));
    }

    #[test]
    fn test_closure_resolver() {
        let resolver =
            || -> Result<PathBuf, LaunchError> { Err(LaunchError::ExecutableNotFound("ffmpeg".into())) };
        assert!(matches!(
            resolver.resolve(),
            Err(LaunchError::ExecutableNotFound(_))
        ));
    }

    #[test]
    fn test_explicit_path_wins() {
        let exe = std::env::current_exe().unwrap();
        let resolver = FfmpegResolver::with_path(&exe);

        assert_eq!(resolver.resolve().unwrap(), exe);
        // Second call is served from the cache
        assert_eq!(resolver.resolve().unwrap(), exe);
    }

    #[tokio::test]
    async fn test_check_missing_executable() {
        let ok = check_available(
            Path::new("/nonexistent/transcoder_xyz_12345"),
            &PlatformLauncher::default(),
        )
        .await;
        assert!(!ok);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_check_failing_executable() {
        // `false -version` exits non-zero
        let ok = check_available(Path::new("false"), &PlatformLauncher::default()).await;
        assert!(!ok);
    }
}
