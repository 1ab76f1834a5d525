//! gif-frames - Frame Count Retargeting for Animated GIFs
//!
//! Changes how many frames an animation has by computing a new `fps` value
//! from the requested count and re-encoding through ffmpeg with a freshly
//! generated palette. The output is then probed again and compared against
//! the request.
//!
//! ```rust,ignore
//! use gif_frames::{run_retarget, Formulation, RetargetRequest};
//! use shared_utils::{CancellationToken, DriverLayout, ToolPaths};
//!
//! let tools = ToolPaths::resolve(&DriverLayout::from_env())?;
//! let request = RetargetRequest::new("cat.gif", "cat_100", 100)?;
//! let outcome = run_retarget(&tools, &request, Formulation::Duration, CancellationToken::new(), |line| {
//!     println!("{line}");
//! })?;
//! println!("{}", outcome.transcode.message);
//! ```

pub mod conversion_api;
pub mod rate;
pub mod transcode;
pub mod verify;

pub use conversion_api::{
    default_output_name, default_target, execute_plan, plan_from_media, plan_retarget, resolve_output_path,
    run_retarget, RetargetOutcome, RetargetPlan, RetargetRequest, DEFAULT_TARGET_CAP,
};
pub use rate::{advise, compute_target_rate, format_rate, Advice, Formulation, RateBasis, RateError};
pub use transcode::{build_ffmpeg_args, build_filter_graph, transcode, TranscodeResult};
pub use verify::{classify, verify, verify_report, Verification, VerificationReport};
