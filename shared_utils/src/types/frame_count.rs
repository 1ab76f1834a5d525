//! Positive frame count entered by the user.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameCountError {
    NotANumber(String),
    NotPositive,
}

impl fmt::Display for FrameCountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameCountError::NotANumber(s) => {
                write!(f, "'{}' is not a whole number of frames", s)
            }
            FrameCountError::NotPositive => {
                write!(f, "target frame count must be a positive integer")
            }
        }
    }
}

impl std::error::Error for FrameCountError {}

/// Frame count that is always `> 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameCount(u64);

impl FrameCount {
    pub fn new(frames: u64) -> Result<Self, FrameCountError> {
        if frames == 0 {
            Err(FrameCountError::NotPositive)
        } else {
            Ok(Self(frames))
        }
    }

    #[inline]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl FromStr for FrameCount {
    type Err = FrameCountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // "-5" parses as i64 so negative input gets the "positive" message.
        match trimmed.parse::<i64>() {
            Ok(n) if n <= 0 => Err(FrameCountError::NotPositive),
            Ok(n) => Self::new(n as u64),
            Err(_) => Err(FrameCountError::NotANumber(trimmed.to_string())),
        }
    }
}

impl fmt::Display for FrameCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
