//! ffmpeg invocation
//!
//! One pass: resample to the computed rate, then regenerate and apply a
//! palette from the resampled frames.

use crate::rate::format_rate;
use serde::Serialize;
use shared_utils::ffmpeg_process::{
    format_ffmpeg_error, get_error_suggestion, tail_lines, FfmpegProcess, LineRead,
    FAILURE_TAIL_LINES,
};
use shared_utils::logging::{format_command, log_external_tool};
use shared_utils::{AppError, CancellationToken, ToolPaths};
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Palette pipeline appended after the `fps` filter.
pub const PALETTE_FILTER: &str = "split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse";

/// How long a single stderr poll waits before cancellation is re-checked.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn build_filter_graph(rate: f64) -> String {
    format!("fps={},{}", format_rate(rate), PALETTE_FILTER)
}

/// `-y -i <input> -vf <graph> <output>`
pub fn build_ffmpeg_args(input: &Path, output: &Path, rate: f64) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-i".into(),
        input.as_os_str().to_owned(),
        "-vf".into(),
        build_filter_graph(rate).into(),
        output.as_os_str().to_owned(),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscodeResult {
    pub succeeded: bool,
    /// -1 when the process produced no exit code (never started, killed).
    pub exit_code: i32,
    pub log_lines: Vec<String>,
    pub message: String,
}

impl TranscodeResult {
    fn failed(message: impl Into<String>, exit_code: i32, log_lines: Vec<String>) -> Self {
        Self {
            succeeded: false,
            exit_code,
            log_lines,
            message: message.into(),
        }
    }

    pub fn was_cancelled(&self) -> bool {
        !self.succeeded && self.message.starts_with(CANCELLED_MESSAGE)
    }
}

const CANCELLED_MESSAGE: &str = "Transcode cancelled";

/// Run ffmpeg, forwarding each log line to `observer` as it arrives.
///
/// Never returns an error: every failure is described by the result.
pub fn transcode(
    tools: &ToolPaths,
    input: &Path,
    output: &Path,
    rate: f64,
    observer: &dyn Fn(&str),
    cancel: &CancellationToken,
) -> TranscodeResult {
    if !(rate.is_finite() && rate > 0.0) {
        return TranscodeResult::failed(format!("invalid target frame rate: {}", rate), -1, Vec::new());
    }

    let args = build_ffmpeg_args(input, output, rate);
    let command = format_command(&tools.ffmpeg, &args);
    info!(command = %command, rate = %format_rate(rate), "Starting transcode");
    observer(&format!("Running: {}", command));

    let mut cmd = Command::new(&tools.ffmpeg);
    cmd.args(&args);

    let started = Instant::now();
    let mut process = match FfmpegProcess::spawn(&mut cmd, "ffmpeg") {
        Ok(p) => p,
        Err(AppError::ToolNotFound { .. }) => {
            return TranscodeResult::failed(
                format!(
                    "ffmpeg not found at '{}'. Run `gif-frames install` or install FFmpeg.",
                    tools.ffmpeg.display()
                ),
                -1,
                Vec::new(),
            );
        }
        Err(e) => {
            return TranscodeResult::failed(format!("failed to run ffmpeg: {}", e), -1, Vec::new());
        }
    };

    let mut log_lines = Vec::new();
    let mut cancelled = false;
    loop {
        if cancel.is_cancelled() {
            cancelled = true;
            if let Err(e) = process.kill() {
                warn!(error = %e, "Failed to kill ffmpeg");
            }
            break;
        }
        match process.next_line(POLL_INTERVAL) {
            LineRead::Line(line) => {
                observer(&line);
                log_lines.push(line);
            }
            LineRead::Pending => {}
            LineRead::Closed => break,
        }
    }

    let status = match process.wait() {
        Ok(status) => status,
        Err(e) => {
            return TranscodeResult::failed(
                format!("failed to run ffmpeg: {}", e),
                -1,
                log_lines,
            );
        }
    };
    let exit_code = status.code().unwrap_or(-1);
    let full_log = log_lines.join("\n");
    log_external_tool("ffmpeg", &command, &full_log, status.code(), started.elapsed());

    if cancelled {
        return TranscodeResult::failed(
            format!("{}; partial output may remain at {}", CANCELLED_MESSAGE, output.display()),
            exit_code,
            log_lines,
        );
    }

    if status.success() {
        return TranscodeResult {
            succeeded: true,
            exit_code,
            message: format!("Transcode finished: {}", output.display()),
            log_lines,
        };
    }

    let mut message = AppError::FfmpegFailed {
        message: format!(
            "{}\n{}",
            format_ffmpeg_error(&full_log),
            tail_lines(&log_lines, FAILURE_TAIL_LINES)
        ),
        exit_code: status.code(),
    }
    .to_string();
    if let Some(hint) = get_error_suggestion(&full_log) {
        message.push_str(&format!("\n💡 {}", hint));
    }
    TranscodeResult::failed(message, exit_code, log_lines)
}
