//! Per-node sidecar files: the rich-text body and the plain-text metadata.
//!
//! Reads are lock-free with respect to writers: every write lands through an
//! atomic rename, so a reader sees the old file or the new one. Writes are
//! expected to be serialized by the caller (the project handle's write gate).

pub mod atomic;
pub mod codec;

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

pub use codec::{CodecError, RichTextCodec, RtfCodec};

use crate::error::{ProjectError, Result};
use crate::guard::LockGuard;
use crate::models::{MetadataKind, NodeId, Sidecar, SnapshotEntry};
use crate::snapshot::SnapshotManager;
use atomic::write_atomic;

pub struct ContentStore {
    data_dir: PathBuf,
    codec: Arc<dyn RichTextCodec>,
    guard: LockGuard,
    snapshots: SnapshotManager,
    bodies: RwLock<HashMap<NodeId, String>>,
}

impl std::fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStore")
            .field("data_dir", &self.data_dir)
            .field("guard", &self.guard)
            .field("snapshots", &self.snapshots)
            .finish_non_exhaustive()
    }
}

impl ContentStore {
    pub fn new(
        data_dir: PathBuf,
        codec: Arc<dyn RichTextCodec>,
        guard: LockGuard,
        snapshots: SnapshotManager,
    ) -> Self {
        Self {
            data_dir,
            codec,
            guard,
            snapshots,
            bodies: RwLock::new(HashMap::new()),
        }
    }

    pub fn node_dir(&self, id: &NodeId) -> PathBuf {
        self.data_dir.join(id.as_str())
    }

    pub fn sidecar_path(&self, id: &NodeId, sidecar: Sidecar) -> PathBuf {
        self.node_dir(id).join(sidecar.file_name())
    }

    /// Plain text of a body. Missing or blank files read as empty.
    ///
    /// Decoded bodies are cached until the next write or [`clear_cache`](Self::clear_cache).
    pub fn read_body(&self, id: &NodeId) -> Result<String> {
        if let Some(text) = self
            .bodies
            .read()
            .expect("body cache lock poisoned")
            .get(id)
        {
            tracing::debug!("Body cache hit for {}", id);
            return Ok(text.clone());
        }

        let path = self.sidecar_path(id, Sidecar::Body);
        let raw = read_optional(&path)?;
        let text = if raw.iter().all(u8::is_ascii_whitespace) {
            String::new()
        } else {
            self.codec
                .decode(&raw)
                .map_err(|e| conversion_error(&path, e))?
        };

        // A write that finished while we were decoding has already cached the
        // newer text; keep it.
        let mut bodies = self.bodies.write().expect("body cache lock poisoned");
        Ok(bodies.entry(id.clone()).or_insert(text).clone())
    }

    /// Snapshot, encode and atomically replace a body.
    pub fn write_body(&self, id: &NodeId, text: &str) -> Result<SnapshotEntry> {
        let path = self.sidecar_path(id, Sidecar::Body);

        self.guard.ensure_unlocked()?;
        let snapshot = self.snapshots.snapshot(id.as_str(), &path)?;

        let bytes = self
            .codec
            .encode(text)
            .map_err(|e| conversion_error(&path, e))?;

        self.replace(&path, &bytes)?;

        let mut bodies = self.bodies.write().expect("body cache lock poisoned");
        match self.codec.decode(&bytes) {
            Ok(stored) => {
                bodies.insert(id.clone(), stored);
            }
            Err(e) => {
                tracing::warn!("Codec cannot read back {}: {}", path.display(), e);
                bodies.remove(id);
            }
        }

        tracing::info!("Wrote body of {} ({} bytes)", id, bytes.len());
        Ok(snapshot)
    }

    /// Text of a synopsis or notes sidecar. Missing files read as empty.
    pub fn read_metadata_text(&self, id: &NodeId, kind: MetadataKind) -> Result<String> {
        let path = self.sidecar_path(id, kind.into());
        let raw = read_optional(&path)?;
        String::from_utf8(raw).map_err(|e| ProjectError::Conversion {
            path,
            message: format!("not valid UTF-8: {}", e.utf8_error()),
        })
    }

    /// Snapshot and atomically replace a synopsis or notes sidecar.
    pub fn write_metadata_text(
        &self,
        id: &NodeId,
        kind: MetadataKind,
        text: &str,
    ) -> Result<SnapshotEntry> {
        let path = self.sidecar_path(id, kind.into());

        self.guard.ensure_unlocked()?;
        let snapshot = self.snapshots.snapshot(id.as_str(), &path)?;
        self.replace(&path, text.as_bytes())?;

        tracing::info!("Wrote {} of {} ({} bytes)", kind.as_str(), id, text.len());
        Ok(snapshot)
    }

    /// Create the sidecar directory of a new node with empty files.
    ///
    /// On failure whatever was created is removed again.
    pub fn create_sidecars(&self, id: &NodeId) -> Result<()> {
        let dir = self.node_dir(id);
        let result = fs::create_dir_all(&dir)
            .map_err(|e| ProjectError::write(&dir, e))
            .and_then(|_| {
                Sidecar::ALL.iter().try_for_each(|sidecar| {
                    let path = dir.join(sidecar.file_name());
                    OpenOptions::new()
                        .write(true)
                        .create_new(true)
                        .open(&path)
                        .map(drop)
                        .map_err(|e| ProjectError::write(&path, e))
                })
            });
        if result.is_err() {
            self.remove_sidecars(id);
        }
        result
    }

    /// Best-effort removal of a node's sidecar directory.
    pub fn remove_sidecars(&self, id: &NodeId) {
        let dir = self.node_dir(id);
        if let Err(e) = fs::remove_dir_all(&dir) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove {}: {}", dir.display(), e);
            }
        }
    }

    /// Forget every cached body.
    pub fn clear_cache(&self) {
        self.bodies
            .write()
            .expect("body cache lock poisoned")
            .clear();
    }

    /// Atomic replace with the lock re-checked before each disk mutation.
    fn replace(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.guard.ensure_unlocked()?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| ProjectError::write(path, e))?;
        }
        write_atomic(path, bytes, || self.guard.ensure_unlocked())
    }
}

fn read_optional(path: &Path) -> Result<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(ProjectError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn conversion_error(path: &Path, e: CodecError) -> ProjectError {
    tracing::warn!("Conversion of {} failed: {}", path.display(), e);
    ProjectError::Conversion {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}
