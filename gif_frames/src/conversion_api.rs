//! Retarget pipeline
//!
//! probe input → compute rate → transcode on a worker → re-probe output.
//! Everything that can be rejected up front (paths, target, unusable source)
//! is rejected before ffmpeg is spawned.

use crate::rate::{advise, compute_target_rate, Advice, Formulation, RateBasis};
use crate::transcode::{transcode, TranscodeResult};
use crate::verify::{verify_report, VerificationReport};
use serde::Serialize;
use shared_utils::worker::spawn_task_with_token;
use shared_utils::{
    check_input_output_conflict, probe_media, validate_input_file, validate_output_name,
    AppError, CancellationToken, FrameCount, MediaInfo, Result, ToolPaths,
};
use std::path::{Path, PathBuf};
use tracing::info;

/// Upper bound of the suggested default target.
pub const DEFAULT_TARGET_CAP: u64 = 250;

/// Original frame count when below the cap, the cap otherwise.
pub fn default_target(original_frames: Option<u64>) -> u64 {
    match original_frames {
        Some(n) if n > 0 && n < DEFAULT_TARGET_CAP => n,
        _ => DEFAULT_TARGET_CAP,
    }
}

/// `<stem>_<target>.gif`
pub fn default_output_name(input: &Path, target: u64) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    format!("{}_{}.gif", stem, target)
}

/// Turn a user-supplied output name into a path.
///
/// `.gif` is appended unless already present (any case). A bare file name is
/// placed next to the input; anything with a directory part is used as given.
pub fn resolve_output_path(input: &Path, name: &str) -> PathBuf {
    let mut name = name.trim().to_string();
    if !name.to_ascii_lowercase().ends_with(".gif") {
        name.push_str(".gif");
    }

    let candidate = PathBuf::from(&name);
    let is_bare = candidate
        .parent()
        .map(|p| p.as_os_str().is_empty())
        .unwrap_or(true);

    if is_bare {
        match input.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(candidate),
            _ => candidate,
        }
    } else {
        candidate
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetargetRequest {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub target_frame_count: u64,
}

impl RetargetRequest {
    /// Validated request. `output_name` goes through [`resolve_output_path`].
    pub fn new(input: impl Into<PathBuf>, output_name: &str, target: u64) -> Result<Self> {
        let input_path = input.into();
        validate_input_file(&input_path).map_err(|e| AppError::invalid_input(e.to_string()))?;
        validate_output_name(output_name).map_err(|e| AppError::invalid_input(e.to_string()))?;
        let target = FrameCount::new(target).map_err(|e| AppError::invalid_input(e.to_string()))?;

        let output_path = resolve_output_path(&input_path, output_name);
        check_input_output_conflict(&input_path, &output_path)
            .map_err(|e| AppError::invalid_input(e.to_string()))?;

        Ok(Self {
            input_path,
            output_path,
            target_frame_count: target.get(),
        })
    }
}

/// Everything known before ffmpeg runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetargetPlan {
    pub source: MediaInfo,
    pub formulation: Formulation,
    pub rate: f64,
    pub advice: Advice,
}

pub fn plan_retarget(
    tools: &ToolPaths,
    request: &RetargetRequest,
    formulation: Formulation,
) -> Result<RetargetPlan> {
    let source = probe_media(tools, &request.input_path);
    plan_from_media(source, request, formulation)
}

/// Plan from an already probed source.
pub fn plan_from_media(
    source: MediaInfo,
    request: &RetargetRequest,
    formulation: Formulation,
) -> Result<RetargetPlan> {
    let basis = RateBasis::from_media(&source, formulation)?;
    let rate = compute_target_rate(basis, request.target_frame_count)?;
    let advice = advise(source.total_frames.unwrap_or(0), request.target_frame_count);

    info!(
        input = %request.input_path.display(),
        target = request.target_frame_count,
        rate,
        ?formulation,
        ?advice,
        "Retarget planned"
    );
    Ok(RetargetPlan {
        source,
        formulation,
        rate,
        advice,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetargetOutcome {
    pub plan: RetargetPlan,
    pub transcode: TranscodeResult,
    /// Present only when the transcode succeeded.
    pub verification: Option<VerificationReport>,
}

/// Run a planned request on a worker thread and wait for it.
///
/// `on_log` receives ffmpeg's log lines in order while the worker runs.
pub fn execute_plan(
    tools: &ToolPaths,
    request: &RetargetRequest,
    plan: RetargetPlan,
    cancel: CancellationToken,
    on_log: impl FnMut(&str),
) -> Result<RetargetOutcome> {
    let worker_tools = tools.clone();
    let input = request.input_path.clone();
    let output = request.output_path.clone();
    let target = request.target_frame_count;
    let rate = plan.rate;

    let handle = spawn_task_with_token(cancel, move |emit, cancel| {
        let result = transcode(
            &worker_tools,
            &input,
            &output,
            rate,
            &|line| emit(line.to_string()),
            cancel,
        );
        let verification = if result.succeeded {
            Some(verify_report(&worker_tools, &output, target))
        } else {
            None
        };
        (result, verification)
    });

    let (transcode, verification) = handle.wait_with(on_log).ok_or_else(|| {
        AppError::Io(std::io::Error::other("transcode worker stopped unexpectedly"))
    })?;

    if transcode.was_cancelled() {
        info!(output = %request.output_path.display(), "Retarget cancelled");
    }

    Ok(RetargetOutcome {
        plan,
        transcode,
        verification,
    })
}

/// Plan and execute in one call.
pub fn run_retarget(
    tools: &ToolPaths,
    request: &RetargetRequest,
    formulation: Formulation,
    cancel: CancellationToken,
    on_log: impl FnMut(&str),
) -> Result<RetargetOutcome> {
    let plan = plan_retarget(tools, request, formulation)?;
    execute_plan(tools, request, plan, cancel, on_log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_target() {
        assert_eq!(default_target(Some(120)), 120);
        assert_eq!(default_target(Some(249)), 249);
        assert_eq!(default_target(Some(250)), 250);
        assert_eq!(default_target(Some(900)), 250);
        assert_eq!(default_target(Some(0)), 250);
        assert_eq!(default_target(None), 250);
    }

    #[test]
    fn test_default_output_name() {
        assert_eq!(default_output_name(Path::new("/a/cat.gif"), 100), "cat_100.gif");
        assert_eq!(default_output_name(Path::new("dance"), 50), "dance_50.gif");
    }

    #[test]
    fn test_resolve_output_path() {
        let input = Path::new("/data/anim/cat.gif");
        assert_eq!(
            resolve_output_path(input, "small"),
            PathBuf::from("/data/anim/small.gif")
        );
        assert_eq!(
            resolve_output_path(input, "small.GIF"),
            PathBuf::from("/data/anim/small.GIF")
        );
        assert_eq!(
            resolve_output_path(input, "/tmp/out/small.gif"),
            PathBuf::from("/tmp/out/small.gif")
        );
        assert_eq!(
            resolve_output_path(Path::new("cat.gif"), "x"),
            PathBuf::from("x.gif")
        );
    }

    #[test]
    fn test_request_validation_happens_first() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("cat.gif");
        fs::write(&input, b"GIF89a").unwrap();

        let err = RetargetRequest::new(temp.path().join("missing.gif"), "out", 10).unwrap_err();
        assert!(err.is_input_fault());

        let err = RetargetRequest::new(&input, "  ", 10).unwrap_err();
        assert!(err.is_input_fault());

        let err = RetargetRequest::new(&input, "out", 0).unwrap_err();
        assert!(err.is_input_fault());

        let err = RetargetRequest::new(&input, "cat", 10).unwrap_err();
        assert!(err.to_string().contains("identical"));

        let ok = RetargetRequest::new(&input, "cat_10", 10).unwrap();
        assert_eq!(ok.output_path, temp.path().join("cat_10.gif"));
        assert_eq!(ok.target_frame_count, 10);
    }

    #[cfg(unix)]
    mod pipeline {
        use super::*;
        use crate::verify::Verification;
        use std::os::unix::fs::PermissionsExt;

        /// ffprobe stub: the input reports 30 fps over 8 s, anything else
        /// 12.5 fps over 8 s.
        const FFPROBE_STUB: &str = r#"#!/bin/sh
for last; do :; done
case "$last" in
  *zero.gif) printf '10/1\n0.000000\n' ;;
  *in.gif) printf '30/1\n8.000000\n' ;;
  *) printf '25/2\n8.000000\n' ;;
esac
"#;

        /// ffmpeg stub: logs its arguments and writes the last one.
        const FFMPEG_STUB: &str = r#"#!/bin/sh
for last; do :; done
echo "ffmpeg stub" 1>&2
echo "args: $*" 1>&2
printf 'GIF89a' > "$last"
"#;

        fn install_stub(dir: &Path, name: &str, body: &str) -> PathBuf {
            let path = dir.join(name);
            fs::write(&path, body).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn stub_tools(dir: &Path) -> ToolPaths {
            let bin = dir.join("bin");
            fs::create_dir_all(&bin).unwrap();
            ToolPaths::new(
                install_stub(&bin, "ffmpeg", FFMPEG_STUB),
                install_stub(&bin, "ffprobe", FFPROBE_STUB),
            )
        }

        #[test]
        fn test_end_to_end_retarget() {
            let temp = TempDir::new().unwrap();
            let tools = stub_tools(temp.path());
            let input = temp.path().join("in.gif");
            fs::write(&input, b"GIF89a").unwrap();

            let request = RetargetRequest::new(&input, "out", 100).unwrap();
            let mut lines = Vec::new();
            let outcome = run_retarget(
                &tools,
                &request,
                Formulation::Duration,
                CancellationToken::new(),
                |l| lines.push(l.to_string()),
            )
            .unwrap();

            assert_eq!(outcome.plan.source.total_frames, Some(240));
            assert_eq!(outcome.plan.rate, 12.5);
            assert_eq!(outcome.plan.advice, Advice::WillReduce);

            assert!(outcome.transcode.succeeded, "{}", outcome.transcode.message);
            assert_eq!(outcome.transcode.exit_code, 0);
            assert!(lines.iter().any(|l| l.contains("fps=12.500000000000000")));

            let report = outcome.verification.unwrap();
            assert_eq!(report.output.total_frames, Some(100));
            assert!(report.outcome.is_success_equivalent());
            assert_eq!(report.outcome, Verification::ExactMatch);
        }

        #[test]
        fn test_frame_count_formulation_matches() {
            let temp = TempDir::new().unwrap();
            let tools = stub_tools(temp.path());
            let input = temp.path().join("in.gif");
            fs::write(&input, b"GIF89a").unwrap();

            let request = RetargetRequest::new(&input, "out", 100).unwrap();
            let plan = plan_retarget(&tools, &request, Formulation::FrameCount).unwrap();
            assert!((plan.rate - 12.5).abs() < 1e-12);
        }

        #[test]
        fn test_zero_duration_stops_before_transcode() {
            let temp = TempDir::new().unwrap();
            let tools = stub_tools(temp.path());
            let input = temp.path().join("zero.gif");
            fs::write(&input, b"GIF89a").unwrap();

            let request = RetargetRequest::new(&input, "out", 10).unwrap();
            let err = run_retarget(
                &tools,
                &request,
                Formulation::Duration,
                CancellationToken::new(),
                |_| {},
            )
            .unwrap_err();
            assert!(matches!(err, AppError::Precondition(_)));
            assert!(!request.output_path.exists());
        }

        #[test]
        fn test_probe_is_idempotent() {
            let temp = TempDir::new().unwrap();
            let tools = stub_tools(temp.path());
            let input = temp.path().join("in.gif");
            fs::write(&input, b"GIF89a").unwrap();

            let first = probe_media(&tools, &input);
            let second = probe_media(&tools, &input);
            assert_eq!(first, second);
            assert_eq!(first.file_size_bytes, Some(6));
        }

        #[test]
        fn test_cancelled_before_start() {
            let temp = TempDir::new().unwrap();
            let tools = stub_tools(temp.path());
            let input = temp.path().join("in.gif");
            fs::write(&input, b"GIF89a").unwrap();

            let request = RetargetRequest::new(&input, "out", 100).unwrap();
            let cancel = CancellationToken::new();
            cancel.cancel();
            let outcome =
                run_retarget(&tools, &request, Formulation::Duration, cancel, |_| {}).unwrap();
            assert!(outcome.transcode.was_cancelled());
            assert!(outcome.verification.is_none());
        }
    }
}
