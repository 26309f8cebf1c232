//! Unified error types for the cgthrottle workspace.
//!
//! Every failure is an ordinary returned value. Kernel pseudo-file access
//! yields raw [`std::io::Error`]s at the filesystem seam; call sites classify
//! them into [`CgroupError`] kinds so that callers and tests can distinguish
//! a missing cgroup from a permission problem or a plain I/O failure.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum CgroupError {
    /// The target pseudo-file or directory does not exist.
    #[error("file not found: {path}")]
    NotFound {
        /// Path that was not present.
        path: PathBuf,
    },

    /// The kernel denied access to a pseudo-file.
    #[error("permission denied: {path}")]
    PermissionDenied {
        /// Path the open was denied on.
        path: PathBuf,
    },

    /// A read or write on an existing, accessible file failed.
    #[error("input/output error on {path}: {source}")]
    Io {
        /// Path the operation failed on.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// File content did not match the expected grammar.
    #[error("{path}: {message}")]
    Parse {
        /// File the offending content came from.
        path: PathBuf,
        /// Description naming the offending raw content.
        message: String,
    },

    /// A raw path could not be interpreted as a cgroup directory.
    #[error("not a cgroup path: {path}")]
    InvalidGroupPath {
        /// The rejected path.
        path: PathBuf,
    },

    /// Zero or more failures collected by an operation that attempts every
    /// file before reporting.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

impl CgroupError {
    /// Classifies a raw I/O error by its kind.
    #[must_use]
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound { path },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Ordered collection of failures from a multi-file operation.
///
/// The blkio engine attempts all of its pseudo-files regardless of earlier
/// failures and folds every distinct error into one of these. The display
/// form enumerates each contained error so a caller can locate every origin
/// file and offending content.
#[derive(Debug, Default)]
pub struct AggregateError {
    errors: Vec<CgroupError>,
}

impl AggregateError {
    /// Empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records another failure, preserving insertion order.
    pub fn push(&mut self, error: CgroupError) {
        self.errors.push(error);
    }

    /// Number of collected failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether no failure has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// The collected failures, in the order they occurred.
    #[must_use]
    pub fn errors(&self) -> &[CgroupError] {
        &self.errors
    }

    /// Collapses into `Ok(())` when empty, `Err` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`CgroupError::Aggregate`] wrapping `self` when at least one
    /// failure was recorded.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CgroupError::Aggregate(self))
        }
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [] => f.write_str("no errors"),
            [single] => write!(f, "{single}"),
            multiple => {
                write!(f, "{} errors occurred:", multiple.len())?;
                for error in multiple {
                    write!(f, " [{error}]")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for AggregateError {}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CgroupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_io_classifies_missing_files() {
        let err = CgroupError::from_io("/sys/fs/cgroup/blkio/gone", io::ErrorKind::NotFound.into());
        assert!(err.to_string().contains("file not found"));
        assert!(err.to_string().contains("/sys/fs/cgroup/blkio/gone"));
    }

    #[test]
    fn from_io_classifies_access_denials() {
        let err = CgroupError::from_io("/sys/fs/cgroup/cpu", io::ErrorKind::PermissionDenied.into());
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn from_io_falls_back_to_io_kind() {
        let err = CgroupError::from_io("/sys/fs/cgroup/cpuset", io::Error::from_raw_os_error(5));
        assert!(err.to_string().contains("input/output error"));
    }

    #[test]
    fn aggregate_display_enumerates_every_failure() {
        let mut aggregate = AggregateError::new();
        aggregate.push(CgroupError::NotFound {
            path: "/a/tasks".into(),
        });
        aggregate.push(CgroupError::Parse {
            path: "/a/blkio.bfq.weight".into(),
            message: "parsing weight: invalid integer \"xyz\"".into(),
        });
        assert_eq!(aggregate.len(), 2);
        let text = aggregate.to_string();
        assert!(text.contains("2 errors occurred"));
        assert!(text.contains("/a/tasks"));
        assert!(text.contains("xyz"));
    }

    #[test]
    fn aggregate_into_result_is_ok_when_empty() {
        assert!(AggregateError::new().into_result().is_ok());
        let mut aggregate = AggregateError::new();
        aggregate.push(CgroupError::NotFound { path: "/x".into() });
        assert!(aggregate.into_result().is_err());
    }
}
