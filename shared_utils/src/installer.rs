//! Tool installer
//!
//! Fetches the transcoder pair and the 7-Zip command line extractor into the
//! driver directory when they are missing:
//!
//! 1. `7za920.zip` is downloaded into `driver/7z/`, unpacked with the `zip`
//!    crate and `7za.exe` is moved to `driver/7z/7za.exe`.
//! 2. `ffmpeg-release-full.7z` is downloaded to `driver/ffmpeg.7z`, unpacked
//!    by `7za`, and the versioned `ffmpeg-*` folder it produces is renamed to
//!    `driver/ffmpeg`.
//!
//! Downloaded archives are removed afterwards whether or not the step worked.
//! The published builds are Windows binaries, so installing anything is only
//! attempted on Windows; elsewhere the existing-tools checks still apply.

use crate::app_error::{AppError, Result};
use crate::error_handler::{handle_error, ErrorCategory};
use crate::logging::{format_command, log_external_tool};
use crate::progress::{create_download_bar, format_bytes};
use crate::tools::{resolve_seven_zip, DriverLayout, ToolPaths};
use console::style;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// What a downloadable archive is and what it unpacks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveSpec {
    pub label: &'static str,
    pub url: &'static str,
    /// File name the archive is saved under.
    pub archive_name: &'static str,
    /// Prefix of the top-level folder the archive unpacks to, if any.
    pub folder_prefix: Option<&'static str>,
    /// Binary to pick out of the unpacked tree, if any.
    pub binary: Option<&'static str>,
}

pub const SEVEN_ZIP_ARCHIVE: ArchiveSpec = ArchiveSpec {
    label: "7-Zip (7za)",
    url: "https://www.7-zip.org/a/7za920.zip",
    archive_name: "7za920.zip",
    folder_prefix: None,
    binary: Some("7za.exe"),
};

pub const FFMPEG_ARCHIVE: ArchiveSpec = ArchiveSpec {
    label: "FFmpeg",
    url: "https://www.gyan.dev/ffmpeg/builds/ffmpeg-release-full.7z",
    archive_name: "ffmpeg.7z",
    folder_prefix: Some("ffmpeg-"),
    binary: None,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Hide download bars and status lines.
    pub quiet: bool,
}

fn say(options: &InstallOptions, msg: impl AsRef<str>) {
    info!("{}", msg.as_ref());
    if !options.quiet {
        eprintln!("{}", msg.as_ref());
    }
}

// ═══════════════════════════════════════════════════════════════
// Archive lifetime
// ═══════════════════════════════════════════════════════════════

/// Deletes the downloaded archive when dropped.
struct ArchiveGuard {
    path: PathBuf,
}

impl Drop for ArchiveGuard {
    fn drop(&mut self) {
        if !self.path.exists() {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed downloaded archive"),
            Err(e) => {
                handle_error(
                    ErrorCategory::Optional,
                    &format!("Removing {}", self.path.display()),
                    &e,
                    Some("Delete the file by hand"),
                );
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Building blocks
// ═══════════════════════════════════════════════════════════════

/// Stream `url` into `dest`. Returns the number of bytes written.
///
/// A partial file is removed on failure.
pub fn download_file(url: &str, dest: &Path, options: &InstallOptions) -> Result<u64> {
    let download_err = |message: String| AppError::Download {
        url: url.to_string(),
        message,
    };

    info!(url, dest = %dest.display(), "Starting download");
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| download_err(e.to_string()))?;

    let total = response.content_length();
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let label = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| url.to_string());
    let pb = create_download_bar(total, &label, options.quiet);

    let result = (|| -> Result<u64> {
        let mut file = fs::File::create(dest)?;
        let mut buf = vec![0u8; 256 * 1024];
        let mut downloaded: u64 = 0;
        loop {
            let read = response
                .read(&mut buf)
                .map_err(|e| download_err(e.to_string()))?;
            if read == 0 {
                break;
            }
            file.write_all(&buf[..read])?;
            downloaded += read as u64;
            pb.inc(read as u64);
        }
        file.flush()?;
        Ok(downloaded)
    })();

    match result {
        Ok(bytes) => {
            pb.finish_and_clear();
            info!(url, bytes, "Download complete");
            Ok(bytes)
        }
        Err(e) => {
            pb.abandon();
            let _ = fs::remove_file(dest);
            Err(e)
        }
    }
}

/// Unpack a zip archive under `dest_dir`. Entries that would escape
/// `dest_dir` are skipped. Returns the number of files written.
pub fn extract_zip(archive: &Path, dest_dir: &Path) -> Result<usize> {
    let extraction_err = |message: String| AppError::Extraction {
        archive: archive.to_path_buf(),
        message,
    };

    let file = fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| extraction_err(e.to_string()))?;
    let mut written = 0;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| extraction_err(e.to_string()))?;
        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "Skipping zip entry with unsafe path");
            continue;
        };
        let out_path = dest_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out)?;
        written += 1;
    }

    debug!(archive = %archive.display(), files = written, "Zip extracted");
    Ok(written)
}

/// `7za x <archive> -o<dest_dir> -y`
pub fn extract_7z(seven_zip: &Path, archive: &Path, dest_dir: &Path) -> Result<()> {
    let args: Vec<std::ffi::OsString> = vec![
        "x".into(),
        archive.as_os_str().to_owned(),
        {
            let mut out = std::ffi::OsString::from("-o");
            out.push(dest_dir.as_os_str());
            out
        },
        "-y".into(),
    ];
    let command = format_command(seven_zip, &args);

    let start = Instant::now();
    let output = Command::new(seven_zip).args(&args).output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::tool_not_found("7za", "extracting the FFmpeg archive")
        } else {
            AppError::Io(e)
        }
    })?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    log_external_tool("7za", &command, &stderr, output.status.code(), start.elapsed());

    if output.status.success() {
        Ok(())
    } else {
        let detail = if stderr.trim().is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        Err(AppError::Extraction {
            archive: archive.to_path_buf(),
            message: format!("7za exited with {:?}: {}", output.status.code(), detail),
        })
    }
}

/// The single directory in `parent` whose name starts with `prefix`.
///
/// None or several candidates are both errors.
pub fn select_extracted_dir(parent: &Path, archive: &Path, prefix: &str) -> Result<PathBuf> {
    let mut matches: Vec<PathBuf> = fs::read_dir(parent)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().starts_with(prefix))
                .unwrap_or(false)
        })
        .collect();
    matches.sort();

    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => Err(AppError::Extraction {
            archive: archive.to_path_buf(),
            message: format!(
                "no extracted folder starting with '{}' in {}",
                prefix,
                parent.display()
            ),
        }),
        _ => Err(AppError::Extraction {
            archive: archive.to_path_buf(),
            message: format!(
                "several extracted folders start with '{}': {}",
                prefix,
                matches
                    .iter()
                    .filter_map(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }),
    }
}

/// First file named `name` (case-insensitive) anywhere under `root`.
pub fn find_file(root: &Path, name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .find(|e| e.file_name().to_string_lossy().eq_ignore_ascii_case(name))
        .map(|e| e.into_path())
}

/// Replace `target` with `source`, removing an old `target` first.
pub fn replace_dir(source: &Path, target: &Path) -> Result<()> {
    if target.exists() {
        info!(path = %target.display(), "Removing previous installation");
        fs::remove_dir_all(target)?;
    }
    fs::rename(source, target)?;
    Ok(())
}

fn ensure_installable(def: &ArchiveSpec) -> Result<()> {
    if cfg!(windows) {
        Ok(())
    } else {
        Err(AppError::Precondition(format!(
            "automatic installation of {} only supports Windows; install it with your package manager",
            def.label
        )))
    }
}

// ═══════════════════════════════════════════════════════════════
// Public steps
// ═══════════════════════════════════════════════════════════════

/// Path of a usable 7za: the driver directory's, then one on `PATH`, else a
/// fresh install into the driver directory.
pub fn ensure_seven_zip(layout: &DriverLayout, options: &InstallOptions) -> Result<PathBuf> {
    if let Some(found) = resolve_seven_zip(layout) {
        debug!(path = %found.display(), "7za already present");
        return Ok(found);
    }
    let target = layout.seven_zip();

    let def = SEVEN_ZIP_ARCHIVE;
    ensure_installable(&def)?;
    say(options, format!("📦 {} not found, installing...", def.label));

    let dir = layout.seven_zip_dir();
    fs::create_dir_all(&dir)?;
    let archive = dir.join(def.archive_name);
    let guard = ArchiveGuard {
        path: archive.clone(),
    };

    let bytes = download_file(def.url, &archive, options)?;
    say(options, format!("   Downloaded {}", format_bytes(bytes)));
    extract_zip(&archive, &dir)?;
    drop(guard);

    let binary = def.binary.unwrap_or("7za.exe");
    let found = find_file(&dir, binary).ok_or_else(|| AppError::Extraction {
        archive: archive.clone(),
        message: format!("{} not found after extraction", binary),
    })?;
    if found != target {
        fs::rename(&found, &target)?;
        debug!(from = %found.display(), to = %target.display(), "Moved 7za into place");
    }

    say(
        options,
        format!("{} {} installed", style("✅").green(), def.label),
    );
    Ok(target)
}

/// ffmpeg and ffprobe inside the driver directory, installing them with
/// `seven_zip` if either is missing.
pub fn ensure_ffmpeg(
    layout: &DriverLayout,
    seven_zip: &Path,
    options: &InstallOptions,
) -> Result<ToolPaths> {
    if layout.ffmpeg().is_file() && layout.ffprobe().is_file() {
        debug!(dir = %layout.ffmpeg_dir().display(), "FFmpeg already present");
        return Ok(ToolPaths::new(layout.ffmpeg(), layout.ffprobe()));
    }

    let def = FFMPEG_ARCHIVE;
    ensure_installable(&def)?;
    say(options, format!("📦 {} not found, installing...", def.label));

    fs::create_dir_all(&layout.root)?;
    let archive = layout.root.join(def.archive_name);
    let guard = ArchiveGuard {
        path: archive.clone(),
    };

    let bytes = download_file(def.url, &archive, options)?;
    say(
        options,
        format!("   Downloaded {}, extracting...", format_bytes(bytes)),
    );
    extract_7z(seven_zip, &archive, &layout.root)?;
    drop(guard);

    let prefix = def.folder_prefix.unwrap_or("ffmpeg-");
    let extracted = select_extracted_dir(&layout.root, &archive, prefix)?;
    replace_dir(&extracted, &layout.ffmpeg_dir())?;

    verify_ffmpeg_layout(layout, &archive)?;
    say(
        options,
        format!("{} {} installed", style("✅").green(), def.label),
    );
    Ok(ToolPaths::new(layout.ffmpeg(), layout.ffprobe()))
}

fn verify_ffmpeg_layout(layout: &DriverLayout, archive: &Path) -> Result<()> {
    for binary in [layout.ffmpeg(), layout.ffprobe()] {
        if !binary.is_file() {
            return Err(AppError::Extraction {
                archive: archive.to_path_buf(),
                message: format!("{} missing after installation", binary.display()),
            });
        }
    }
    Ok(())
}

/// 7za first, then the transcoder pair.
pub fn ensure_all(layout: &DriverLayout, options: &InstallOptions) -> Result<ToolPaths> {
    if layout.ffmpeg().is_file() && layout.ffprobe().is_file() {
        return Ok(ToolPaths::new(layout.ffmpeg(), layout.ffprobe()));
    }
    let seven_zip = ensure_seven_zip(layout, options)?;
    ensure_ffmpeg(layout, &seven_zip, options)
}
