//! External tool locations
//!
//! The probe, the transcoder and the installer all receive a [`ToolPaths`]
//! value instead of looking up binaries on their own. Binaries inside the
//! driver directory win over whatever is on `PATH`.

use crate::app_error::{AppError, Result};
use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Default working directory holding downloaded tools.
pub const DEFAULT_DRIVER_DIR: &str = "driver";

/// Environment variable overriding [`DEFAULT_DRIVER_DIR`].
pub const DRIVER_DIR_ENV: &str = "GIF_FRAMES_DRIVER_DIR";

pub fn exe_name(stem: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", stem)
    } else {
        stem.to_string()
    }
}

/// Expected on-disk layout of the driver directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverLayout {
    pub root: PathBuf,
}

impl DriverLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Driver dir from `GIF_FRAMES_DRIVER_DIR`, falling back to `./driver`.
    pub fn from_env() -> Self {
        match std::env::var_os(DRIVER_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Self::new(dir),
            _ => Self::new(Path::new(".").join(DEFAULT_DRIVER_DIR)),
        }
    }

    pub fn seven_zip_dir(&self) -> PathBuf {
        self.root.join("7z")
    }

    pub fn seven_zip(&self) -> PathBuf {
        self.seven_zip_dir().join(exe_name("7za"))
    }

    pub fn ffmpeg_dir(&self) -> PathBuf {
        self.root.join("ffmpeg")
    }

    pub fn ffmpeg(&self) -> PathBuf {
        self.ffmpeg_dir().join("bin").join(exe_name("ffmpeg"))
    }

    pub fn ffprobe(&self) -> PathBuf {
        self.ffmpeg_dir().join("bin").join(exe_name("ffprobe"))
    }
}

/// Resolved paths of the transcoder pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl ToolPaths {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Driver directory first, then `PATH`.
    pub fn resolve(layout: &DriverLayout) -> Result<Self> {
        let ffmpeg = locate(&layout.ffmpeg(), "ffmpeg", "re-encoding the animation")?;
        let ffprobe = locate(&layout.ffprobe(), "ffprobe", "reading animation metadata")?;
        tracing::debug!(ffmpeg = ?ffmpeg, ffprobe = ?ffprobe, "Resolved transcoder paths");
        Ok(Self { ffmpeg, ffprobe })
    }
}

fn locate(bundled: &Path, name: &str, operation: &str) -> Result<PathBuf> {
    if bundled.is_file() {
        return Ok(bundled.to_path_buf());
    }
    which::which(name).map_err(|_| AppError::tool_not_found(name, operation))
}

/// Resolve 7za the same way as the transcoder pair.
pub fn resolve_seven_zip(layout: &DriverLayout) -> Option<PathBuf> {
    seven_zip_in(layout, std::env::var_os("PATH"))
}

fn seven_zip_in<P: AsRef<OsStr>>(layout: &DriverLayout, search_path: Option<P>) -> Option<PathBuf> {
    let bundled = layout.seven_zip();
    if bundled.is_file() {
        return Some(bundled);
    }
    let cwd = std::env::current_dir().unwrap_or_default();
    which::which_in(exe_name("7za"), search_path, cwd).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let layout = DriverLayout::new("drv");
        assert_eq!(layout.seven_zip(), Path::new("drv").join("7z").join(exe_name("7za")));
        assert_eq!(
            layout.ffprobe(),
            Path::new("drv").join("ffmpeg").join("bin").join(exe_name("ffprobe"))
        );
    }

    #[test]
    fn test_resolve_prefers_driver_dir() {
        let temp = TempDir::new().unwrap();
        let layout = DriverLayout::new(temp.path());
        fs::create_dir_all(layout.ffmpeg().parent().unwrap()).unwrap();
        fs::write(layout.ffmpeg(), b"").unwrap();
        fs::write(layout.ffprobe(), b"").unwrap();

        let tools = ToolPaths::resolve(&layout).unwrap();
        assert_eq!(tools.ffmpeg, layout.ffmpeg());
        assert_eq!(tools.ffprobe, layout.ffprobe());
    }

    #[test]
    fn test_seven_zip_prefers_driver_dir() {
        let temp = TempDir::new().unwrap();
        let layout = DriverLayout::new(temp.path());
        assert_eq!(seven_zip_in(&layout, Some(temp.path().join("empty"))), None);

        fs::create_dir_all(layout.seven_zip_dir()).unwrap();
        fs::write(layout.seven_zip(), b"").unwrap();
        assert_eq!(seven_zip_in(&layout, None::<&str>), Some(layout.seven_zip()));
    }

    #[cfg(unix)]
    #[test]
    fn test_seven_zip_found_on_search_path() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        let tool = bin.join("7za");
        fs::write(&tool, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

        let layout = DriverLayout::new(temp.path().join("driver"));
        let found = seven_zip_in(&layout, Some(&bin)).unwrap();
        assert_eq!(fs::canonicalize(found).unwrap(), fs::canonicalize(&tool).unwrap());
    }

    #[test]
    fn test_exe_name() {
        if cfg!(windows) {
            assert_eq!(exe_name("ffmpeg"), "ffmpeg.exe");
        } else {
            assert_eq!(exe_name("ffmpeg"), "ffmpeg");
        }
    }
}
