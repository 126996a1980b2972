//! Error types for the GMV reader
//!
//! Every failure is terminal for the file being read. The reader closes its
//! streams and the caller should discard anything partially built.

use thiserror::Error;

/// Errors that can occur while reading a GMV file
#[derive(Debug, Error)]
pub enum GmvError {
    /// File missing, truncated, or some other stream fault
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The content does not follow the GMV format
    #[error("GMV format error: {0}")]
    Format(String),

    /// An array sized from the file could not be allocated
    #[error("unable to allocate {0}")]
    Memory(String),

    /// No file is open, or the last error closed it
    #[error("no GMV file is open")]
    NotOpen,
}

impl GmvError {
    /// Shorthand for a [GmvError::Format] from anything printable
    pub fn format<S: Into<String>>(message: S) -> Self {
        GmvError::Format(message.into())
    }
}

/// Convenience alias using [GmvError]
pub type Result<T> = std::result::Result<T, GmvError>;

/// Allocate a zero-filled vector, reporting allocation failure as an error
///
/// Counts come straight from the file, so garbage input must not abort the
/// process.
pub(crate) fn zeroed<T: Default + Clone>(n: usize, what: &str) -> Result<Vec<T>> {
    let mut v: Vec<T> = Vec::new();
    v.try_reserve_exact(n)
        .map_err(|_| GmvError::Memory(format!("{n} values for {what}")))?;
    v.resize(n, T::default());
    Ok(v)
}
