//! Error types for the polling watcher

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the watcher
///
/// Only root-level scan failures travel on the error stream. Failures below a
/// root are absorbed by omitting the entry from the snapshot.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Stat or listing of a watched root failed
    #[error("failed to scan {}: {source}", .path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The blocking scan task for a root panicked or was cancelled
    #[error("scan of {} aborted: {reason}", .path.display())]
    ScanAborted { path: PathBuf, reason: String },

    /// `start()` was called on a running watcher
    #[error("watcher is already running")]
    AlreadyRunning,

    /// The watcher has been stopped and cannot be used again
    #[error("watcher has been stopped")]
    Stopped,

    /// `start()` was called outside a tokio runtime
    #[error("no tokio runtime available to drive the polling loop")]
    NoRuntime,

    /// Invalid ignore pattern or unreadable .gitignore
    #[error("invalid ignore rules: {0}")]
    IgnoreRules(#[from] ::ignore::Error),
}

impl WatchError {
    /// Build a scan error from a walkdir failure
    pub(crate) fn scan(path: impl Into<PathBuf>, err: walkdir::Error) -> Self {
        let path = path.into();
        let source = match err.into_io_error() {
            Some(io_err) => io_err,
            None => io::Error::new(io::ErrorKind::Other, "file system loop detected"),
        };
        Self::Scan { path, source }
    }

    /// Whether this error refers to a specific watched root
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Scan { path, .. } | Self::ScanAborted { path, .. } => Some(path),
            _ => None,
        }
    }
}
