//! Package layout configuration.

use std::path::PathBuf;

/// Environment variable overriding [`ProjectConfig::manifest_file`].
pub const ENV_MANIFEST: &str = "MANUSCRIPT_MANIFEST";
/// Environment variable overriding [`ProjectConfig::lock_marker`].
pub const ENV_LOCK_MARKER: &str = "MANUSCRIPT_LOCK_MARKER";
/// Environment variable overriding [`ProjectConfig::snapshot_dir`].
pub const ENV_SNAPSHOT_DIR: &str = "MANUSCRIPT_SNAPSHOT_DIR";
/// Environment variable overriding [`ProjectConfig::search_context_chars`].
pub const ENV_SEARCH_CONTEXT: &str = "MANUSCRIPT_SEARCH_CONTEXT";

/// Names and locations inside a package, relative to its root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Manifest file name. When absent, the first `*.scrivx` file is used instead.
    pub manifest_file: String,
    /// File whose presence means another application owns the package.
    pub lock_marker: String,
    /// Directory holding append-only backups.
    pub snapshot_dir: String,
    /// Directory holding one sub-directory of sidecars per node.
    pub data_dir: PathBuf,
    /// Characters of context kept on each side of a search match.
    pub search_context_chars: usize,
}

impl ProjectConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let manifest_file = std::env::var(ENV_MANIFEST)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.manifest_file);

        let lock_marker = std::env::var(ENV_LOCK_MARKER)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.lock_marker);

        let snapshot_dir = std::env::var(ENV_SNAPSHOT_DIR)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.snapshot_dir);

        let search_context_chars = std::env::var(ENV_SEARCH_CONTEXT)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.search_context_chars);

        Self {
            manifest_file,
            lock_marker,
            snapshot_dir,
            data_dir: defaults.data_dir,
            search_context_chars,
        }
    }

    /// Use a different lock marker file name.
    pub fn with_lock_marker(mut self, name: impl Into<String>) -> Self {
        self.lock_marker = name.into();
        self
    }

    /// Use a different manifest file name.
    pub fn with_manifest_file(mut self, name: impl Into<String>) -> Self {
        self.manifest_file = name.into();
        self
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            manifest_file: "manifest.xml".to_string(),
            lock_marker: "user.lock".to_string(),
            snapshot_dir: "Snapshots".to_string(),
            data_dir: PathBuf::from("Files").join("Data"),
            search_context_chars: 40,
        }
    }
}
