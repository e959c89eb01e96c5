//! Finding packages on disk.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::config::ProjectConfig;
use crate::manifest::NATIVE_EXTENSION;

/// Depth used when searching the default locations.
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// Directories under `search_path` that contain a manifest, at most `max_depth`
/// levels down (`0` checks only `search_path` itself).
///
/// Hidden and unreadable directories are skipped, and a package's own
/// contents are never searched. Results are sorted by lower-cased file name.
pub fn discover(search_path: &Path, max_depth: usize, config: &ProjectConfig) -> Vec<PathBuf> {
    let mut found = Vec::new();
    // Files sort ahead of subdirectories, so a package is recognized before
    // the walk would descend into it.
    let mut walker = WalkDir::new(search_path)
        .max_depth(max_depth + 1)
        .sort_by(files_first)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden_dir(entry));

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("Skipping during discovery: {}", e);
                continue;
            }
        };
        if entry.depth() == 0 || !entry.file_type().is_file() || !is_manifest(&entry, config) {
            continue;
        }
        if let Some(package) = entry.path().parent() {
            found.push(package.to_path_buf());
        }
        walker.skip_current_dir();
    }

    sort_by_name(&mut found);
    found
}

/// Packages in every existing [`default_search_paths`] entry.
pub fn discover_default(config: &ProjectConfig) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = default_search_paths()
        .iter()
        .flat_map(|location| discover(location, DEFAULT_MAX_DEPTH, config))
        .collect();
    sort_by_name(&mut found);
    found.dedup();
    found
}

/// Common places writers keep their projects, limited to those that exist.
pub fn default_search_paths() -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Some(documents) = dirs::document_dir() {
        locations.push(documents);
    }
    if let Some(home) = dirs::home_dir() {
        locations.extend(home_locations(&home));
    }

    let mut seen = Vec::new();
    locations.retain(|path| {
        if !path.is_dir() || seen.contains(path) {
            return false;
        }
        seen.push(path.clone());
        true
    });
    locations
}

fn home_locations(home: &Path) -> Vec<PathBuf> {
    let cloud = home.join("Library").join("Mobile Documents").join("com~apple~CloudDocs");
    vec![
        home.join("Documents"),
        home.join("Scrivener"),
        home.join("Writing"),
        home.join("Dropbox"),
        home.join("Desktop"),
        cloud.join("Documents"),
        cloud.join("Scrivener"),
        cloud,
        home.join("OneDrive").join("Documents"),
        home.join("OneDrive"),
    ]
}

fn files_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name().to_string_lossy().starts_with('.')
}

fn is_manifest(entry: &DirEntry, config: &ProjectConfig) -> bool {
    entry.file_name().to_string_lossy() == config.manifest_file.as_str()
        || entry.path().extension().and_then(|ext| ext.to_str()) == Some(NATIVE_EXTENSION)
}

fn sort_by_name(paths: &mut [PathBuf]) {
    paths.sort_by_key(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    });
}
