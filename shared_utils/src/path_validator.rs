//! Path Validation Module
//!
//! Checks run on a request's paths before any external process is spawned.
//! Paths are passed to ffmpeg as discrete arguments, never through a shell,
//! so only existence, emptiness and input/output aliasing are checked here.

use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathValidationError {
    EmptyPath,
    NotFound(PathBuf),
    NotAFile(PathBuf),
    /// Output name cannot be used as a file name.
    InvalidOutputName(String),
    /// Input and output paths refer to the same file
    InputOutputConflict { path: PathBuf },
}

impl fmt::Display for PathValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathValidationError::EmptyPath => write!(f, "empty path provided"),
            PathValidationError::NotFound(p) => {
                write!(f, "input file not found: {}", p.display())
            }
            PathValidationError::NotAFile(p) => {
                write!(f, "input is not a regular file: {}", p.display())
            }
            PathValidationError::InvalidOutputName(name) => {
                write!(f, "invalid output file name: {:?}", name)
            }
            PathValidationError::InputOutputConflict { path } => write!(
                f,
                "input and output paths are identical: {}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for PathValidationError {}

/// Input must be an existing regular file.
pub fn validate_input_file(path: &Path) -> Result<(), PathValidationError> {
    if path.as_os_str().is_empty() {
        return Err(PathValidationError::EmptyPath);
    }
    if !path.exists() {
        return Err(PathValidationError::NotFound(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(PathValidationError::NotAFile(path.to_path_buf()));
    }
    Ok(())
}

/// Output names must be non-blank and must not end in a separator or `..`.
pub fn validate_output_name(name: &str) -> Result<(), PathValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(PathValidationError::EmptyPath);
    }
    if trimmed.contains('\0') {
        return Err(PathValidationError::InvalidOutputName(name.to_string()));
    }
    match Path::new(trimmed).file_name() {
        Some(_) => Ok(()),
        None => Err(PathValidationError::InvalidOutputName(name.to_string())),
    }
}

/// Best-effort absolute form of a path that may not exist yet.
fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    // Canonicalize the parent so `./a.gif` and `a.gif` compare equal.
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        if let Ok(canonical_parent) = parent.canonicalize() {
            return canonical_parent.join(name);
        }
    }
    if path.is_relative() {
        std::env::current_dir().unwrap_or_default().join(path)
    } else {
        path.to_path_buf()
    }
}

/// Input and output must not be the same file.
pub fn check_input_output_conflict(input: &Path, output: &Path) -> Result<(), PathValidationError> {
    if normalize(input) == normalize(output) {
        return Err(PathValidationError::InputOutputConflict {
            path: input.to_path_buf(),
        });
    }
    Ok(())
}
