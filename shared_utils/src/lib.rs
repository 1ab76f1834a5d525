//! Shared Utilities for gif-frames
//!
//! Building blocks the `gif-frames` binary is assembled from:
//! - External tool locations (driver directory, PATH fallback)
//! - FFprobe wrapper for animation metadata
//! - FFmpeg process supervision with streamed, cancellable stderr
//! - Background task runner with a log stream
//! - Tool installer (7za, ffmpeg)
//! - Logging, progress display and error reporting

pub mod app_error;
pub mod error_handler;
pub mod ffmpeg_process;
pub mod ffprobe;
pub mod installer;
pub mod logging;
pub mod path_validator;
pub mod progress;
pub mod tools;
pub mod types;
pub mod worker;

pub use app_error::{AppError, Result};
pub use error_handler::{
    handle_error, install_panic_handler, report_error, ErrorAction, ErrorCategory, EXIT_FAILURE,
};
pub use ffmpeg_process::{format_ffmpeg_error, get_error_suggestion, tail_lines, FfmpegProcess, LineRead, FAILURE_TAIL_LINES};
pub use ffprobe::{estimate_frame_count, parse_frame_rate, probe_media, MediaInfo};
pub use installer::{ensure_all, ensure_ffmpeg, ensure_seven_zip, ArchiveSpec, InstallOptions};
pub use logging::{init_logging, LogConfig};
pub use path_validator::{check_input_output_conflict, validate_input_file, validate_output_name, PathValidationError};
pub use progress::{create_download_bar, create_spinner, format_bytes};
pub use tools::{DriverLayout, ToolPaths};
pub use types::{FileSize, FrameCount, FrameCountError};
pub use worker::{spawn_task, spawn_task_with_token, CancellationToken, TaskEvent, TaskHandle};
