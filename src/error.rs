//! Error taxonomy for the project model.
//!
//! Every failure is surfaced as a typed [`ProjectError`]; nothing here retries
//! automatically or turns a failed write into a partial one.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by project operations.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// The manifest is missing, unreadable or malformed. No handle is returned.
    #[error("Failed to parse manifest {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// The identifier resolved to nothing under any addressing scheme.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A mutation was attempted while another process owns the package.
    #[error("Project is locked by another application ({})", .marker.display())]
    Locked { marker: PathBuf },

    /// The pre-write backup failed, so the write was not attempted.
    #[error("Snapshot of {} failed: {source}", .path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The atomic write failed. The original file is untouched.
    #[error("Write to {} failed: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The codec rejected the input or output, or a sidecar is not valid UTF-8.
    #[error("Conversion of {} failed: {message}", .path.display())]
    Conversion { path: PathBuf, message: String },

    /// Reading a sidecar failed for a reason other than it being absent.
    #[error("Read of {} failed: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The manifest on disk no longer matches what this handle parsed.
    #[error("Manifest {} changed on disk since it was opened; reload the project", .path.display())]
    ManifestChanged { path: PathBuf },
}

impl ProjectError {
    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProjectError>;
