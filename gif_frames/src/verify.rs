//! Output verification
//!
//! The produced file is probed again and its estimated frame count compared
//! against the request. The estimate is `round(rate * duration)` on both
//! sides, so an off-by-one is expected now and then and is reported as a
//! near match rather than a failure.

use serde::Serialize;
use shared_utils::{probe_media, MediaInfo, ToolPaths};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Verification {
    ExactMatch,
    /// Signed `actual - requested`, magnitude 1.
    NearMatch(i64),
    /// Signed `actual - requested`, magnitude above 1.
    Mismatch(i64),
    /// The output could not be probed; carries the diagnostic.
    Unverifiable(String),
}

impl Verification {
    /// Exact and near matches both count as the request being met.
    pub fn is_success_equivalent(&self) -> bool {
        matches!(self, Verification::ExactMatch | Verification::NearMatch(_))
    }

    pub fn delta(&self) -> Option<i64> {
        match self {
            Verification::ExactMatch => Some(0),
            Verification::NearMatch(d) | Verification::Mismatch(d) => Some(*d),
            Verification::Unverifiable(_) => None,
        }
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verification::ExactMatch => write!(f, "exact match"),
            Verification::NearMatch(d) => write!(f, "near match ({:+} frame)", d),
            Verification::Mismatch(d) => write!(f, "mismatch ({:+} frames)", d),
            Verification::Unverifiable(diag) => write!(f, "unable to read output info: {}", diag),
        }
    }
}

pub fn classify(actual: u64, requested: u64) -> Verification {
    let delta = actual as i64 - requested as i64;
    match delta.abs() {
        0 => Verification::ExactMatch,
        1 => Verification::NearMatch(delta),
        _ => Verification::Mismatch(delta),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub output: MediaInfo,
    pub requested: u64,
    pub outcome: Verification,
}

/// Probe `output` and classify it against `requested`.
pub fn verify_report(tools: &ToolPaths, output: &Path, requested: u64) -> VerificationReport {
    let info = probe_media(tools, output);
    let outcome = match info.total_frames {
        Some(actual) => classify(actual, requested),
        None => Verification::Unverifiable(
            info.error
                .clone()
                .unwrap_or_else(|| "no frame count reported".to_string()),
        ),
    };

    match &outcome {
        Verification::ExactMatch | Verification::NearMatch(_) => {
            tracing::info!(output = %output.display(), requested, outcome = %outcome, "Output verified")
        }
        _ => tracing::info!(output = %output.display(), requested, outcome = %outcome, "Output differs from request"),
    }

    VerificationReport {
        output: info,
        requested,
        outcome,
    }
}

pub fn verify(tools: &ToolPaths, output: &Path, requested: u64) -> Verification {
    verify_report(tools, output, requested).outcome
}
