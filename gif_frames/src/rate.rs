//! Frame-rate retargeting
//!
//! Converts a desired output frame count into the rate handed to ffmpeg's
//! `fps` filter. Two equivalent formulations are supported:
//!
//! - duration based: `target / duration`
//! - frame-count relative: `(target / total_frames) * frame_rate`
//!
//! They agree whenever `total_frames == frame_rate * duration` exactly; the
//! relative form reproduces the source rate exactly when target equals the
//! estimated frame count.

use serde::Serialize;
use shared_utils::{AppError, MediaInfo};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Formulation {
    /// target / duration
    #[default]
    Duration,
    /// (target / original frames) * original rate
    FrameCount,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateBasis {
    Duration { seconds: f64 },
    FrameCount { total_frames: u64, frame_rate: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RateError {
    #[error("source has zero duration or zero frames")]
    ZeroDivisor,
    #[error("target frame count must be positive")]
    ZeroTarget,
    #[error("source frame rate is zero or invalid")]
    InvalidSourceRate,
}

impl From<RateError> for AppError {
    fn from(e: RateError) -> Self {
        match e {
            RateError::ZeroTarget => AppError::InvalidInput(e.to_string()),
            RateError::ZeroDivisor | RateError::InvalidSourceRate => {
                AppError::Precondition(e.to_string())
            }
        }
    }
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

impl RateBasis {
    /// Build a basis from probe results.
    pub fn from_media(info: &MediaInfo, formulation: Formulation) -> Result<Self, AppError> {
        let missing = |what: &str| {
            let mut msg = format!("could not read the source {}", what);
            if let Some(ref diag) = info.error {
                msg.push_str(&format!(": {}", diag));
            }
            AppError::Precondition(msg)
        };

        let duration = info.duration_seconds.ok_or_else(|| missing("duration"))?;
        let rate = info.average_frame_rate.ok_or_else(|| missing("frame rate"))?;
        let total = info.total_frames.unwrap_or(0);

        // Both formulations need a usable source, whichever divisor they use.
        if !positive(duration) || total == 0 {
            return Err(RateError::ZeroDivisor.into());
        }

        match formulation {
            Formulation::Duration => Ok(RateBasis::Duration { seconds: duration }),
            Formulation::FrameCount => {
                if !positive(rate) {
                    return Err(RateError::InvalidSourceRate.into());
                }
                Ok(RateBasis::FrameCount {
                    total_frames: total,
                    frame_rate: rate,
                })
            }
        }
    }
}

pub fn compute_target_rate(basis: RateBasis, target_frame_count: u64) -> Result<f64, RateError> {
    if target_frame_count == 0 {
        return Err(RateError::ZeroTarget);
    }
    let target = target_frame_count as f64;

    match basis {
        RateBasis::Duration { seconds } => {
            if !positive(seconds) {
                return Err(RateError::ZeroDivisor);
            }
            Ok(target / seconds)
        }
        RateBasis::FrameCount {
            total_frames,
            frame_rate,
        } => {
            if total_frames == 0 {
                return Err(RateError::ZeroDivisor);
            }
            if !positive(frame_rate) {
                return Err(RateError::InvalidSourceRate);
            }
            Ok(target / total_frames as f64 * frame_rate)
        }
    }
}

/// Fixed 15 fractional digits, as passed to `fps=`.
pub fn format_rate(rate: f64) -> String {
    format!("{:.15}", rate)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Advice {
    /// More frames than the source; the file will not shrink.
    WillIncrease,
    /// Same count; only the palette is regenerated.
    Unchanged,
    WillReduce,
}

pub fn advise(original_frames: u64, target_frames: u64) -> Advice {
    match target_frames.cmp(&original_frames) {
        std::cmp::Ordering::Greater => Advice::WillIncrease,
        std::cmp::Ordering::Equal => Advice::Unchanged,
        std::cmp::Ordering::Less => Advice::WillReduce,
    }
}

impl fmt::Display for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advice::WillIncrease => write!(
                f,
                "target is larger than the original frame count; frames will be added and the file will likely not shrink"
            ),
            Advice::Unchanged => write!(
                f,
                "target equals the original frame count; only the palette will be optimised"
            ),
            Advice::WillReduce => write!(f, "frames will be dropped to reach the target"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(rate: f64, duration: f64) -> MediaInfo {
        MediaInfo {
            average_frame_rate: Some(rate),
            duration_seconds: Some(duration),
            total_frames: Some(shared_utils::estimate_frame_count(rate, duration)),
            file_size_bytes: Some(1024),
            error: None,
        }
    }

    #[test]
    fn test_duration_formulation() {
        let rate = compute_target_rate(RateBasis::Duration { seconds: 8.0 }, 100).unwrap();
        assert_eq!(rate, 12.5);
    }

    #[test]
    fn test_round_trip_both_formulations() {
        let info = media(25.0, 10.0);
        assert_eq!(info.total_frames, Some(250));

        let a = compute_target_rate(RateBasis::from_media(&info, Formulation::Duration).unwrap(), 250)
            .unwrap();
        assert!((a - 25.0).abs() < 1e-9);

        let b = compute_target_rate(
            RateBasis::from_media(&info, Formulation::FrameCount).unwrap(),
            250,
        )
        .unwrap();
        assert_eq!(b, 25.0);
    }

    #[test]
    fn test_zero_divisors() {
        assert_eq!(
            compute_target_rate(RateBasis::Duration { seconds: 0.0 }, 10),
            Err(RateError::ZeroDivisor)
        );
        assert_eq!(
            compute_target_rate(RateBasis::Duration { seconds: f64::NAN }, 10),
            Err(RateError::ZeroDivisor)
        );
        assert_eq!(
            compute_target_rate(
                RateBasis::FrameCount {
                    total_frames: 0,
                    frame_rate: 25.0
                },
                10
            ),
            Err(RateError::ZeroDivisor)
        );
    }

    #[test]
    fn test_zero_target() {
        assert_eq!(
            compute_target_rate(RateBasis::Duration { seconds: 5.0 }, 0),
            Err(RateError::ZeroTarget)
        );
        let err: AppError = RateError::ZeroTarget.into();
        assert!(err.is_input_fault());
    }

    #[test]
    fn test_from_media_rejects_empty_source() {
        let err = RateBasis::from_media(&media(10.0, 0.0), Formulation::Duration).unwrap_err();
        assert!(matches!(err, AppError::Precondition(_)));

        let err = RateBasis::from_media(&media(0.0, 5.0), Formulation::FrameCount).unwrap_err();
        assert!(matches!(err, AppError::Precondition(_)));
    }

    #[test]
    fn test_from_media_missing_fields_carries_diagnostic() {
        let info = MediaInfo {
            error: Some("could not parse duration: N/A".to_string()),
            average_frame_rate: Some(10.0),
            ..MediaInfo::default()
        };
        let err = RateBasis::from_media(&info, Formulation::Duration).unwrap_err();
        assert!(err.to_string().contains("N/A"));
    }

    #[test]
    fn test_format_rate_precision() {
        assert_eq!(format_rate(12.5), "12.500000000000000");
        let s = format_rate(100.0 / 3.0);
        let frac = s.split('.').nth(1).unwrap();
        assert_eq!(frac.len(), 15);
        assert!(s.starts_with("33.333333333333"));
    }

    #[test]
    fn test_advise() {
        assert_eq!(advise(240, 300), Advice::WillIncrease);
        assert_eq!(advise(240, 240), Advice::Unchanged);
        assert_eq!(advise(240, 100), Advice::WillReduce);
        assert!(Advice::WillIncrease.to_string().contains("not shrink"));
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_rate_is_linear_in_target(
            seconds in 0.01f64..1000.0,
            target in 1u64..100_000,
        ) {
            let basis = RateBasis::Duration { seconds };
            let single = compute_target_rate(basis, target).unwrap();
            let double = compute_target_rate(basis, target * 2).unwrap();
            prop_assert!((double - 2.0 * single).abs() <= 1e-9 * double.abs().max(1.0));
        }

        #[test]
        fn prop_formulations_agree_on_consistent_sources(
            total in 1u64..10_000,
            rate in 1u32..120,
            target in 1u64..10_000,
        ) {
            let frame_rate = rate as f64;
            let seconds = total as f64 / frame_rate;
            let a = compute_target_rate(RateBasis::Duration { seconds }, target).unwrap();
            let b = compute_target_rate(
                RateBasis::FrameCount { total_frames: total, frame_rate },
                target,
            ).unwrap();
            prop_assert!((a - b).abs() <= 1e-9 * a.max(1.0));
        }

        #[test]
        fn prop_rate_positive(seconds in 0.001f64..1e6, target in 1u64..1_000_000) {
            let r = compute_target_rate(RateBasis::Duration { seconds }, target).unwrap();
            prop_assert!(r.is_finite() && r > 0.0);
        }
    }
}
