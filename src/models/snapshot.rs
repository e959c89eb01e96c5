use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An immutable backup copy of a sidecar (or the manifest) taken before a write.
///
/// Snapshots are append-only: they are never overwritten, and this crate never
/// prunes them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotEntry {
    /// The node id the snapshot belongs to, or the manifest owner key.
    pub owner: String,
    /// Name of the file that was copied, e.g. `body.rtf`.
    pub source: String,
    pub path: PathBuf,
    pub taken_at: DateTime<Utc>,
}
