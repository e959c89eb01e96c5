//! Append-only backups taken before every write.
//!
//! Layout: `Snapshots/{owner}/{timestamp}-{file}`, where the timestamp is UTC
//! with nanoseconds (`20250101T120000.000000000Z`) and sorts lexicographically.
//! Two snapshots landing on the same timestamp get a `-N` sequence number
//! between timestamp and file name. Nothing here ever deletes or overwrites a
//! snapshot.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, TimeZone, Utc};

use crate::error::{ProjectError, Result};
use crate::models::SnapshotEntry;

/// Owner key used for manifest snapshots.
pub const MANIFEST_OWNER: &str = "_manifest";

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.9fZ";
const TIMESTAMP_PARSE_FORMAT: &str = "%Y%m%dT%H%M%S%.fZ";

#[derive(Debug, Clone)]
pub struct SnapshotManager {
    root: PathBuf,
}

impl SnapshotManager {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy the current contents of `source` into a new snapshot for `owner`.
    ///
    /// A missing source produces an empty snapshot. On any failure the partial
    /// snapshot file is removed and the caller must not proceed with its write.
    pub fn snapshot(&self, owner: &str, source: &Path) -> Result<SnapshotEntry> {
        let dir = self.root.join(owner);
        fs::create_dir_all(&dir).map_err(|e| snapshot_error(&dir, e))?;

        let bytes = match fs::read(source) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(snapshot_error(source, e)),
        };
        let file_name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let taken_at = Utc::now();
        let stamp = taken_at.format(TIMESTAMP_FORMAT).to_string();

        let mut sequence = 0u32;
        let (path, mut file) = loop {
            let name = if sequence == 0 {
                format!("{}-{}", stamp, file_name)
            } else {
                format!("{}-{}-{}", stamp, sequence, file_name)
            };
            let path = dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => sequence += 1,
                Err(e) => return Err(snapshot_error(&path, e)),
            }
        };

        if let Err(e) = file.write_all(&bytes).and_then(|_| file.sync_all()) {
            drop(file);
            if let Err(cleanup) = fs::remove_file(&path) {
                tracing::warn!(
                    "Failed to remove partial snapshot {}: {}",
                    path.display(),
                    cleanup
                );
            }
            return Err(snapshot_error(&path, e));
        }

        tracing::info!("Snapshot {} -> {}", source.display(), path.display());
        Ok(SnapshotEntry {
            owner: owner.to_string(),
            source: file_name,
            path,
            taken_at,
        })
    }

    /// Snapshots of `owner`, oldest first. Unrecognized files are ignored.
    pub fn list(&self, owner: &str) -> Result<Vec<SnapshotEntry>> {
        let dir = self.root.join(owner);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(ProjectError::Read { path: dir, source }),
        };

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ProjectError::Read {
                path: dir.clone(),
                source,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some((taken_at, sequence, source)) = parse_name(&name) {
                found.push((
                    sequence,
                    SnapshotEntry {
                        owner: owner.to_string(),
                        source,
                        path: entry.path(),
                        taken_at,
                    },
                ));
            }
        }

        found.sort_by(|(seq_a, a), (seq_b, b)| {
            a.taken_at
                .cmp(&b.taken_at)
                .then(seq_a.cmp(seq_b))
                .then_with(|| a.source.cmp(&b.source))
        });
        Ok(found.into_iter().map(|(_, entry)| entry).collect())
    }
}

fn snapshot_error(path: &Path, source: io::Error) -> ProjectError {
    tracing::error!("Snapshot failed at {}: {}", path.display(), source);
    ProjectError::Snapshot {
        path: path.to_path_buf(),
        source,
    }
}

/// Split `{stamp}-{file}` or `{stamp}-{N}-{file}`.
fn parse_name(name: &str) -> Option<(chrono::DateTime<Utc>, u32, String)> {
    let (stamp, rest) = name.split_once('-')?;
    let naive = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_PARSE_FORMAT).ok()?;
    let taken_at = Utc.from_utc_datetime(&naive);

    let (sequence, source) = match rest.split_once('-') {
        Some((digits, file))
            if !digits.is_empty() && !file.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) =>
        {
            (digits.parse().ok()?, file)
        }
        _ => (0, rest),
    };
    Some((taken_at, sequence, source.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_copies_current_bytes() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("body.rtf");
        fs::write(&source, b"{\\rtf1 before}").unwrap();

        let manager = SnapshotManager::new(dir.path().join("Snapshots"));
        let entry = manager.snapshot("DOC", &source).unwrap();

        assert_eq!(entry.owner, "DOC");
        assert_eq!(entry.source, "body.rtf");
        assert!(entry.path.starts_with(dir.path().join("Snapshots").join("DOC")));
        assert_eq!(fs::read(&entry.path).unwrap(), b"{\\rtf1 before}");
    }

    #[test]
    fn test_missing_source_gives_empty_snapshot() {
        let dir = tempdir().unwrap();
        let manager = SnapshotManager::new(dir.path().join("Snapshots"));
        let entry = manager
            .snapshot("DOC", &dir.path().join("notes.txt"))
            .unwrap();
        assert_eq!(fs::read(&entry.path).unwrap(), b"");
    }

    #[test]
    fn test_never_overwrites_and_lists_oldest_first() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("body.rtf");
        let manager = SnapshotManager::new(dir.path().join("Snapshots"));

        for version in ["one", "two", "three"] {
            fs::write(&source, version).unwrap();
            manager.snapshot("DOC", &source).unwrap();
        }

        let listed = manager.list("DOC").unwrap();
        let contents: Vec<String> = listed
            .iter()
            .map(|e| fs::read_to_string(&e.path).unwrap())
            .collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_parses_sequence_suffix() {
        let (at, sequence, source) = parse_name("20250102T030405.000000006Z-2-body.rtf").unwrap();
        assert_eq!(at.format(TIMESTAMP_FORMAT).to_string(), "20250102T030405.000000006Z");
        assert_eq!(sequence, 2);
        assert_eq!(source, "body.rtf");

        let (_, sequence, source) = parse_name("20250102T030405.000000006Z-notes.txt").unwrap();
        assert_eq!(sequence, 0);
        assert_eq!(source, "notes.txt");

        assert!(parse_name("README").is_none());
    }

    #[test]
    fn test_list_of_unknown_owner_is_empty() {
        let dir = tempdir().unwrap();
        let manager = SnapshotManager::new(dir.path().join("Snapshots"));
        assert!(manager.list("NOPE").unwrap().is_empty());
    }
}
