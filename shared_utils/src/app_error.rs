//! AppError - unified error type for probing, transcoding and tool installation
//!
//! Every fault the pipeline can raise falls in one of these buckets:
//! - environment: an external binary is missing
//! - external process: ffprobe / ffmpeg / 7za exited non-zero
//! - parsing: ffprobe printed something we could not read
//! - input: bad path, bad target count, bad output name
//! - precondition: the source has zero duration or zero frames

use crate::error_handler::ErrorCategory;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Tool not found: {tool_name}{}", needed_for(.operation))]
    ToolNotFound {
        tool_name: String,
        operation: Option<String>,
    },

    #[error("ffprobe error for '{}': {message}", .file_path.display())]
    FfprobeFailed { file_path: PathBuf, message: String },

    #[error("ffmpeg failed{}: {message}", exit_suffix(.exit_code))]
    FfmpegFailed {
        message: String,
        exit_code: Option<i32>,
    },

    /// Unreadable tool output; the payload names the field and the raw text.
    #[error("could not parse {0}")]
    ParseError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cannot process source: {0}")]
    Precondition(String),

    #[error("Download failed ({url}): {message}")]
    Download { url: String, message: String },

    #[error("Extraction failed ({}): {message}", .archive.display())]
    Extraction { archive: PathBuf, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn needed_for(operation: &Option<String>) -> String {
    operation
        .as_ref()
        .map(|op| format!(" (needed for: {})", op))
        .unwrap_or_default()
}

fn exit_suffix(exit_code: &Option<i32>) -> String {
    exit_code
        .map(|c| format!(" (exit code: {})", c))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn tool_not_found(tool_name: impl Into<String>, operation: impl Into<String>) -> Self {
        AppError::ToolNotFound {
            tool_name: tool_name.into(),
            operation: Some(operation.into()),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        AppError::InvalidInput(message.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::ToolNotFound { .. }
            | AppError::FfprobeFailed { .. }
            | AppError::FfmpegFailed { .. }
            | AppError::Download { .. }
            | AppError::Extraction { .. }
            | AppError::Io(_) => ErrorCategory::Fatal,

            // The user can fix these, or simply run again.
            AppError::InvalidInput(_)
            | AppError::Precondition(_)
            | AppError::ParseError(_)
            | AppError::Cancelled => ErrorCategory::Recoverable,
        }
    }

    /// True for faults that are caught before any external process is spawned.
    pub fn is_input_fault(&self) -> bool {
        matches!(self, AppError::InvalidInput(_) | AppError::Precondition(_))
    }

    /// Next step to show under the error, when there is an obvious one.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            AppError::ToolNotFound { .. } => {
                Some("Run `gif-frames install` or put ffmpeg and ffprobe on PATH")
            }
            AppError::FfprobeFailed { .. } | AppError::ParseError(_) => {
                Some("Check that the input is a readable animated GIF")
            }
            AppError::InvalidInput(_) => Some("Fix the value and run again"),
            AppError::Precondition(_) => {
                Some("The source needs a non-zero duration and frame count")
            }
            AppError::Download { .. } => Some("Check the network connection and try again"),
            AppError::Extraction { .. } => Some("Delete the driver directory and install again"),
            AppError::FfmpegFailed { .. } | AppError::Cancelled | AppError::Io(_) => None,
        }
    }
}
