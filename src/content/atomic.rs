use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{ProjectError, Result};

/// Replace `path` with `bytes` so that readers see the old file or the new one, never a mix.
///
/// The data goes to a temporary file in the same directory, is synced, and is
/// renamed over the target. `precommit` runs right before the rename; if it
/// fails the temporary file is discarded and the target is left alone.
pub(crate) fn write_atomic(
    path: &Path,
    bytes: &[u8],
    precommit: impl FnOnce() -> Result<()>,
) -> Result<()> {
    let dir = path.parent().ok_or_else(|| {
        ProjectError::write(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "target has no parent directory"),
        )
    })?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ProjectError::write(path, e))?;
    tmp.write_all(bytes)
        .map_err(|e| ProjectError::write(path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| ProjectError::write(path, e))?;

    precommit()?;

    tmp.persist(path)
        .map_err(|e| ProjectError::write(path, e.error))?;

    // Make the rename itself durable. Not every platform can open a directory.
    if let Err(e) = fs::File::open(dir).and_then(|d| d.sync_all()) {
        tracing::debug!("Directory sync of {} skipped: {}", dir.display(), e);
    }

    Ok(())
}
