//! FFprobe wrapper module
//!
//! Reads the first video stream's average frame rate and duration and derives
//! the estimated frame count. Probing never fails outright: every problem is
//! written into [`MediaInfo::error`] so callers can show it next to progress
//! output and decide for themselves whether the data is usable.

use crate::app_error::AppError;
use crate::logging::{format_command, log_external_tool};
use crate::tools::ToolPaths;
use crate::types::FileSize;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub average_frame_rate: Option<f64>,
    pub duration_seconds: Option<f64>,
    /// `round(average_frame_rate * duration_seconds)`, only when both are known.
    pub total_frames: Option<u64>,
    pub file_size_bytes: Option<u64>,
    pub error: Option<String>,
}

impl MediaInfo {
    pub fn file_size_mib(&self) -> Option<f64> {
        self.file_size_bytes.map(|b| FileSize::new(b).mib())
    }

    fn push_error(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        self.error = Some(match self.error.take() {
            Some(prev) => format!("{}\n{}", prev, msg),
            None => msg,
        });
    }

    fn push_fault(&mut self, fault: AppError) {
        self.push_error(fault.to_string());
    }

    fn derive_total_frames(&mut self) {
        self.total_frames = match (self.average_frame_rate, self.duration_seconds) {
            (Some(rate), Some(duration)) => Some(estimate_frame_count(rate, duration)),
            _ => None,
        };
    }
}

pub fn estimate_frame_count(frame_rate: f64, duration_seconds: f64) -> u64 {
    let frames = (frame_rate * duration_seconds).round();
    if frames.is_finite() && frames > 0.0 {
        frames as u64
    } else {
        0
    }
}

/// Arguments asking for `avg_frame_rate` and `duration` of `v:0`, bare values
/// one per line.
pub fn probe_args(path: &Path) -> Vec<std::ffi::OsString> {
    let mut args: Vec<std::ffi::OsString> = [
        "-v",
        "error",
        "-select_streams",
        "v:0",
        "-show_entries",
        "stream=avg_frame_rate,duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
        "--",
    ]
    .iter()
    .map(Into::into)
    .collect();
    args.push(path.as_os_str().to_owned());
    args
}

pub fn probe_media(tools: &ToolPaths, path: &Path) -> MediaInfo {
    let mut info = MediaInfo::default();

    let args = probe_args(path);
    let command = format_command(&tools.ffprobe, &args);
    let start = Instant::now();
    let result = Command::new(&tools.ffprobe).args(&args).output();

    match result {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            log_external_tool(
                "ffprobe",
                &command,
                &stderr,
                output.status.code(),
                start.elapsed(),
            );

            if output.status.success() {
                apply_probe_output(&mut info, &stdout);
            } else {
                let message = if stderr.trim().is_empty() {
                    format!("failed to analyze (exit code: {:?})", output.status.code())
                } else {
                    stderr.trim().to_string()
                };
                info.push_fault(AppError::FfprobeFailed {
                    file_path: path.to_path_buf(),
                    message,
                });
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info.push_error(format!(
                "ffprobe not found at '{}'. Run `gif-frames install` or install FFmpeg.",
                tools.ffprobe.display()
            ));
        }
        Err(e) => {
            info.push_error(format!("failed to run ffprobe: {}", e));
        }
    }

    match std::fs::metadata(path) {
        Ok(meta) => info.file_size_bytes = Some(meta.len()),
        Err(e) => info.push_error(format!("could not read file size: {}", e)),
    }

    info.derive_total_frames();

    if let Some(ref err) = info.error {
        tracing::info!(path = %path.display(), error = %err, "Probe finished with diagnostics");
    } else {
        tracing::debug!(path = %path.display(), info = ?info, "Probe finished");
    }

    info
}

/// Fill the stream fields of `info` from ffprobe's stdout.
fn apply_probe_output(info: &mut MediaInfo, stdout: &str) {
    let lines: Vec<&str> = stdout
        .trim()
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if lines.len() < 2 {
        info.push_fault(AppError::ParseError(format!(
            "ffprobe output:\n{}",
            stdout.trim()
        )));
        return;
    }

    match parse_frame_rate(lines[0]) {
        Some(rate) => info.average_frame_rate = Some(rate),
        None => info.push_fault(AppError::ParseError(format!("average frame rate: {}", lines[0]))),
    }

    match lines[1].parse::<f64>() {
        Ok(d) if d.is_finite() && d >= 0.0 => info.duration_seconds = Some(d),
        _ => info.push_fault(AppError::ParseError(format!("duration: {}", lines[1]))),
    }
}

/// Parse a `numerator/denominator` rate. A zero denominator yields `0.0`.
///
/// Only the leading `digits/digits` part is looked at, anything after it is
/// ignored.
pub fn parse_frame_rate(s: &str) -> Option<f64> {
    let s = s.trim();
    let (num_str, rest) = split_leading_digits(s);
    let rest = rest.strip_prefix('/')?;
    let (den_str, _) = split_leading_digits(rest);
    if num_str.is_empty() || den_str.is_empty() {
        return None;
    }

    let num: f64 = num_str.parse().ok()?;
    let den: f64 = den_str.parse().ok()?;
    if den == 0.0 {
        return Some(0.0);
    }
    Some(num / den)
}

fn split_leading_digits(s: &str) -> (&str, &str) {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s.split_at(end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        let cases: &[(&str, f64, f64)] = &[
            ("30/1", 30.0, 0.001),
            ("25/1", 25.0, 0.001),
            ("50/1", 50.0, 0.001),
            ("100/3", 100.0 / 3.0, 0.0001),
            ("30000/1001", 30000.0 / 1001.0, 0.0001),
            ("  10/1 ", 10.0, 0.001),
        ];

        for (input, expected, tolerance) in cases {
            let result = parse_frame_rate(input).unwrap();
            assert!(
                (result - expected).abs() < *tolerance,
                "parse_frame_rate({:?}): expected {}, got {}",
                input,
                expected,
                result
            );
        }
    }

    #[test]
    fn test_parse_frame_rate_zero_denominator() {
        assert_eq!(parse_frame_rate("0/0"), Some(0.0));
        assert_eq!(parse_frame_rate("30/0"), Some(0.0));
    }

    #[test]
    fn test_parse_frame_rate_rejects_non_ratio() {
        assert_eq!(parse_frame_rate("29.97"), None);
        assert_eq!(parse_frame_rate("N/A"), None);
        assert_eq!(parse_frame_rate(""), None);
        assert_eq!(parse_frame_rate("/1"), None);
        assert_eq!(parse_frame_rate("30/"), None);
    }

    #[test]
    fn test_apply_probe_output_ok() {
        let mut info = MediaInfo::default();
        apply_probe_output(&mut info, "25/1\n10.000000\n");
        info.derive_total_frames();
        assert_eq!(info.average_frame_rate, Some(25.0));
        assert_eq!(info.duration_seconds, Some(10.0));
        assert_eq!(info.total_frames, Some(250));
        assert!(info.error.is_none());
    }

    #[test]
    fn test_apply_probe_output_short() {
        let mut info = MediaInfo::default();
        apply_probe_output(&mut info, "25/1\n");
        info.derive_total_frames();
        assert!(info.average_frame_rate.is_none());
        assert!(info.total_frames.is_none());
        assert!(info.error.unwrap().starts_with("could not parse ffprobe output"));
    }

    #[test]
    fn test_apply_probe_output_bad_duration() {
        let mut info = MediaInfo::default();
        apply_probe_output(&mut info, "25/1\nN/A\n");
        info.derive_total_frames();
        assert_eq!(info.average_frame_rate, Some(25.0));
        assert!(info.duration_seconds.is_none());
        assert!(info.total_frames.is_none());
        assert!(info.error.unwrap().contains("duration"));
    }

    #[test]
    fn test_apply_probe_output_bad_rate_keeps_duration() {
        let mut info = MediaInfo::default();
        apply_probe_output(&mut info, "abc\n8.0\n");
        assert!(info.average_frame_rate.is_none());
        assert_eq!(info.duration_seconds, Some(8.0));
        assert!(info.error.unwrap().contains("frame rate"));
    }

    #[test]
    fn test_estimate_frame_count_rounds() {
        assert_eq!(estimate_frame_count(30.0, 8.0), 240);
        assert_eq!(estimate_frame_count(12.5, 7.98), 100);
        assert_eq!(estimate_frame_count(0.0, 8.0), 0);
    }

    #[test]
    fn test_push_error_appends() {
        let mut info = MediaInfo::default();
        info.push_error("first");
        info.push_error("second");
        assert_eq!(info.error.as_deref(), Some("first\nsecond"));
    }

    #[test]
    fn test_media_info_json_shape() {
        let mut info = MediaInfo::default();
        apply_probe_output(&mut info, "30/1\n8.0\n");
        info.derive_total_frames();
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["total_frames"], 240);
        assert_eq!(value["average_frame_rate"], 30.0);
        assert!(value["error"].is_null());

        let back: MediaInfo = serde_json::from_value(value).unwrap();
        assert_eq!(back, info);
    }

    #[test]
    fn test_missing_ffprobe_is_reported() {
        let tools = ToolPaths::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe-xyz");
        let info = probe_media(&tools, Path::new("/nonexistent/input.gif"));
        let err = info.error.unwrap();
        assert!(err.contains("ffprobe not found"));
        assert!(err.contains("file size"));
        assert!(info.total_frames.is_none());
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        fn stub_ffprobe(dir: &Path, body: &str) -> ToolPaths {
            let path = dir.join("ffprobe");
            fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            ToolPaths::new(dir.join("ffmpeg"), path)
        }

        #[test]
        fn test_nonzero_exit_captures_stderr() {
            let temp = TempDir::new().unwrap();
            let tools = stub_ffprobe(
                temp.path(),
                "echo 'Invalid data found when processing input' 1>&2\nexit 1\n",
            );
            let input = temp.path().join("a.gif");
            fs::write(&input, b"x").unwrap();

            let info = probe_media(&tools, &input);
            let err = info.error.unwrap();
            assert!(err.starts_with("ffprobe error for '"), "{}", err);
            assert!(err.ends_with("Invalid data found when processing input"), "{}", err);
            assert!(info.average_frame_rate.is_none());
            assert!(info.total_frames.is_none());
            assert_eq!(info.file_size_bytes, Some(1));
        }

        #[test]
        fn test_nonzero_exit_without_stderr() {
            let temp = TempDir::new().unwrap();
            let tools = stub_ffprobe(temp.path(), "exit 3\n");
            let input = temp.path().join("a.gif");
            fs::write(&input, b"GIF89a").unwrap();

            let info = probe_media(&tools, &input);
            assert!(info.error.unwrap().contains("exit code: Some(3)"));
            assert_eq!(info.file_size_bytes, Some(6));
        }

        #[test]
        fn test_size_failure_keeps_stream_fields() {
            let temp = TempDir::new().unwrap();
            let tools = stub_ffprobe(temp.path(), "printf '30/1\\n8.000000\\n'\n");

            let info = probe_media(&tools, &temp.path().join("vanished.gif"));
            assert_eq!(info.average_frame_rate, Some(30.0));
            assert_eq!(info.duration_seconds, Some(8.0));
            assert_eq!(info.total_frames, Some(240));
            assert!(info.file_size_bytes.is_none());
            assert!(info.error.unwrap().starts_with("could not read file size"));
        }
    }
}
