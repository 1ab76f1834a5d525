//! Type-Safe Wrappers Module
//!
//! ## Modules
//! - `file_size`: byte counts with MiB display
//! - `frame_count`: validated positive frame targets

pub mod file_size;
pub mod frame_count;

pub use file_size::FileSize;
pub use frame_count::{FrameCount, FrameCountError};
