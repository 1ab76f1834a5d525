//! FFmpeg process management
//!
//! ffmpeg reports everything on stderr, so the wrapper here owns stderr:
//! a reader thread splits it into log lines (on `\n` and on the `\r` that
//! ffmpeg uses for status updates) and hands them over a channel. The caller
//! polls that channel with a timeout, which keeps a cancellation check
//! reachable even while ffmpeg is silent. stdout and stdin are not used and
//! are set to null so the child can never block on them.
//!
//! ```ignore
//! use shared_utils::ffmpeg_process::{FfmpegProcess, LineRead};
//! use std::process::Command;
//! use std::time::Duration;
//!
//! let mut cmd = Command::new("ffmpeg");
//! cmd.args(["-y", "-i", "in.gif", "out.gif"]);
//! let mut process = FfmpegProcess::spawn(&mut cmd, "ffmpeg")?;
//! loop {
//!     match process.next_line(Duration::from_millis(100)) {
//!         LineRead::Line(line) => println!("{line}"),
//!         LineRead::Pending => continue,
//!         LineRead::Closed => break,
//!     }
//! }
//! let status = process.wait()?;
//! ```

use crate::app_error::{AppError, Result};
use std::io::{self, BufRead, BufReader};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Number of trailing log lines used as the failure explanation.
pub const FAILURE_TAIL_LINES: usize = 10;

// ═══════════════════════════════════════════════════════════════
// FfmpegProcess
// ═══════════════════════════════════════════════════════════════

/// Result of one poll of the stderr line channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRead {
    Line(String),
    /// Nothing arrived within the poll interval; the process is still running.
    Pending,
    /// stderr reached end-of-stream.
    Closed,
}

pub struct FfmpegProcess {
    child: Child,
    lines: Receiver<String>,
    reader: Option<JoinHandle<()>>,
    command: String,
    started: Instant,
}

impl FfmpegProcess {
    /// Spawn `cmd` with stderr captured line by line.
    ///
    /// A missing binary maps to [`AppError::ToolNotFound`] so it can be told
    /// apart from every other spawn failure.
    pub fn spawn(cmd: &mut Command, tool_name: &str) -> Result<Self> {
        let command = format!("{:?}", cmd);
        info!(command = %command, "Executing {} command", tool_name);

        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                AppError::tool_not_found(tool_name, "re-encoding the animation")
            } else {
                AppError::Io(e)
            }
        })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::Io(io::Error::other("failed to capture stderr")))?;

        let (tx, rx) = mpsc::channel();
        let reader = thread::spawn(move || {
            let mut reader = BufReader::new(stderr);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match read_segment(&mut reader, &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf).trim().to_string();
                        if line.is_empty() {
                            continue;
                        }
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed reading process stderr");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            child,
            lines: rx,
            reader: Some(reader),
            command,
            started: Instant::now(),
        })
    }

    /// Wait up to `poll` for the next stderr line.
    pub fn next_line(&mut self, poll: Duration) -> LineRead {
        match self.lines.recv_timeout(poll) {
            Ok(line) => LineRead::Line(line),
            Err(RecvTimeoutError::Timeout) => LineRead::Pending,
            Err(RecvTimeoutError::Disconnected) => LineRead::Closed,
        }
    }

    pub fn kill(&mut self) -> Result<()> {
        info!(command = %self.command, "Killing process");
        match self.child.kill() {
            Ok(()) => Ok(()),
            // Already exited.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Reap the child and the reader thread.
    pub fn wait(mut self) -> Result<ExitStatus> {
        let status = self.child.wait()?;
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }

        let elapsed = self.started.elapsed();
        if status.success() {
            info!(
                exit_code = status.code(),
                duration_secs = elapsed.as_secs_f64(),
                "Process completed successfully"
            );
        } else {
            // The caller owns the user-facing failure report.
            info!(
                exit_code = status.code(),
                duration_secs = elapsed.as_secs_f64(),
                "Process failed"
            );
        }
        debug!(command = %self.command, "Process reaped");

        Ok(status)
    }
}

/// Read up to and excluding the next `\n` or `\r`. Returns bytes consumed,
/// 0 at end-of-stream.
fn read_segment<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<usize> {
    let mut consumed_total = 0;
    loop {
        let available = match reader.fill_buf() {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if available.is_empty() {
            return Ok(consumed_total);
        }

        match available.iter().position(|&b| b == b'\n' || b == b'\r') {
            Some(pos) => {
                buf.extend_from_slice(&available[..pos]);
                reader.consume(pos + 1);
                return Ok(consumed_total + pos + 1);
            }
            None => {
                let len = available.len();
                buf.extend_from_slice(available);
                reader.consume(len);
                consumed_total += len;
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Error formatting
// ═══════════════════════════════════════════════════════════════

/// Last `n` lines joined by newlines.
pub fn tail_lines(lines: &[String], n: usize) -> String {
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// Most meaningful single line of an ffmpeg log: the last line mentioning an
/// error, else the last non-status line.
pub fn format_ffmpeg_error(stderr: &str) -> String {
    if let Some(error_line) = stderr
        .lines()
        .rev()
        .find(|line| line.contains("Error") || line.contains("error"))
    {
        return error_line.trim().to_string();
    }

    stderr
        .lines()
        .rev()
        .find(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty()
                && !trimmed.starts_with("frame=")
                && !trimmed.starts_with("fps=")
                && !trimmed.starts_with("size=")
        })
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "Unknown FFmpeg error".to_string())
}

/// Hint for common ffmpeg failure patterns.
pub fn get_error_suggestion(stderr: &str) -> Option<&'static str> {
    let patterns = [
        ("No such file or directory", "Check that the input path is correct"),
        ("Invalid data found", "The input file may be damaged or not an animation"),
        ("Permission denied", "Check read/write permissions on input and output"),
        ("Error opening output", "Check that the output directory exists and is writable"),
        ("Unable to find a suitable output format", "Give the output a .gif extension"),
        ("Invalid argument", "The filter graph was rejected; check the computed frame rate"),
    ];

    patterns
        .iter()
        .find(|(pattern, _)| stderr.contains(pattern))
        .map(|(_, suggestion)| *suggestion)
}
