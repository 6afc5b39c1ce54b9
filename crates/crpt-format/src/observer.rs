use std::fmt;
use std::path::{Path, PathBuf};

/// Hooks an encrypt or decrypt call invokes while it runs.
///
/// Every method has a no-op default, so callers implement only what they
/// need. The codec calls these synchronously from the thread doing the work.
pub trait Observer {
    /// Fraction of the input processed so far, in `0.0..=1.0`. Calls are
    /// non-decreasing and the last call on success is exactly `1.0`.
    fn report(&mut self, _fraction: f64) {}

    /// Polled before every chunk read; returning true aborts the operation
    /// with [`FormatError::Cancelled`](crate::FormatError::Cancelled).
    ///
    /// The read that finds end of input is polled too, so a cancel raised
    /// after the last chunk still aborts before the final block is written.
    fn is_cancelled(&self) -> bool {
        false
    }

    /// The requested output path was taken and another one is used instead.
    fn renamed(&mut self, _notice: &RenameNotice) {}

    /// The destination file has been created. On failure or cancellation the
    /// caller owns deleting it.
    fn output_opened(&mut self, _path: &Path) {}
}

/// Observer that ignores every hook.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Observer for Silent {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameNotice {
    pub requested: PathBuf,
    pub resolved: PathBuf,
}

impl fmt::Display for RenameNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "File \"{}\" already exists.\nUsing \"{}\" instead.",
            self.requested.display(),
            self.resolved.display()
        )
    }
}
