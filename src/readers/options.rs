//! Reader configuration

// external crates
use serde::Serialize;

/// Options controlling how a [GmvReader](crate::GmvReader) treats a file
///
/// ```rust
/// use gmvread::ReaderOptions;
///
/// let options = ReaderOptions::new()
///     .require_endgmv(false)
///     .swap_probe_threshold(1 << 20);
/// assert!(!options.requires_endgmv());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReaderOptions {
    require_endgmv: bool,
    swap_probe_threshold: i64,
    show_progress: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            require_endgmv: true,
            swap_probe_threshold: 1 << 24,
            show_progress: false,
        }
    }
}

impl ReaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail to open files without `endgmv` in their last 20 bytes
    ///
    /// When disabled, a missing trailer is only logged as a warning.
    pub fn require_endgmv(mut self, require: bool) -> Self {
        self.require_endgmv = require;
        self
    }

    /// Node counts at or above `threshold` trigger the byte-swap probe
    pub fn swap_probe_threshold(mut self, threshold: i64) -> Self {
        self.swap_probe_threshold = threshold.max(0);
        self
    }

    /// Show a progress bar while reading a whole file
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn requires_endgmv(&self) -> bool {
        self.require_endgmv
    }

    pub fn probe_threshold(&self) -> i64 {
        self.swap_probe_threshold
    }

    pub fn shows_progress(&self) -> bool {
        self.show_progress
    }
}
