//! FileSize Type-Safe Wrapper

use std::fmt;

// ============================================================================
// FileSize Newtype
// ============================================================================

/// File size in bytes.
///
/// # Examples
/// ```
/// use shared_utils::types::file_size::FileSize;
///
/// let size = FileSize::new(3 * 1024 * 1024 / 2);
/// assert_eq!(size.display_mib(), "1.50 MiB");
///
/// let smaller = FileSize::new(512 * 1024);
/// assert_eq!(smaller.size_change_percent(size).map(|p| p.round()), Some(-67.0));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileSize(u64);

impl FileSize {
    pub const ZERO: FileSize = FileSize(0);

    pub const KIB: u64 = 1024;
    pub const MIB: u64 = 1024 * 1024;

    #[inline]
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    #[inline]
    pub const fn bytes(&self) -> u64 {
        self.0
    }

    #[inline]
    pub fn mib(&self) -> f64 {
        self.0 as f64 / Self::MIB as f64
    }

    /// Two decimals in MiB, the unit the tool reports sizes in.
    pub fn display_mib(&self) -> String {
        format!("{:.2} MiB", self.mib())
    }

    /// `(self - original) / original * 100`; negative means smaller.
    pub fn size_change_percent(&self, original: FileSize) -> Option<f64> {
        if original.0 == 0 {
            None
        } else {
            Some((self.0 as f64 - original.0 as f64) / original.0 as f64 * 100.0)
        }
    }
}

impl fmt::Debug for FileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileSize({} = {})", self.0, self.display_mib())
    }
}

impl fmt::Display for FileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_mib())
    }
}

impl Default for FileSize {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<u64> for FileSize {
    fn from(bytes: u64) -> Self {
        Self::new(bytes)
    }
}
