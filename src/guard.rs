//! Detection of an external owner of the package.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::ProjectConfig;
use crate::error::{ProjectError, Result};

/// Checks for the lock marker the owning application leaves in the package root.
///
/// The check is a point-in-time probe. Callers run it immediately before
/// each mutating disk step rather than once per session.
#[derive(Debug, Clone)]
pub struct LockGuard {
    marker: PathBuf,
}

impl LockGuard {
    pub fn new(root: &Path, config: &ProjectConfig) -> Self {
        Self {
            marker: root.join(&config.lock_marker),
        }
    }

    pub fn marker(&self) -> &Path {
        &self.marker
    }

    /// True while the marker exists. A dangling symlink still counts, and so
    /// does a marker that cannot be probed.
    pub fn is_locked(&self) -> bool {
        match fs::symlink_metadata(&self.marker) {
            Ok(_) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!("Cannot probe lock marker {}: {}", self.marker.display(), e);
                true
            }
        }
    }

    pub fn ensure_unlocked(&self) -> Result<()> {
        if self.is_locked() {
            tracing::warn!(
                "Refusing to modify project: lock marker {} present",
                self.marker.display()
            );
            return Err(ProjectError::Locked {
                marker: self.marker.clone(),
            });
        }
        Ok(())
    }
}
