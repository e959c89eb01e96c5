//! Manifest loading and byte-preserving edits.
//!
//! The manifest is parsed once per open into an ordered node arena. Alongside
//! the nodes the parser records, for every item, the byte position where a new
//! child would go (its [`ChildrenSlot`]). Creating a node splices new text into
//! that position and leaves every other byte of the file alone; the owning
//! application treats unexpected manifest diffs as corruption.

mod edit;
mod parse;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ProjectConfig;
use crate::error::{ProjectError, Result};
use crate::models::{Node, NodeId};

pub(crate) use parse::{parse_timestamp, MANIFEST_TIME_FORMAT};

/// Extension of the owning application's native manifest file.
pub const NATIVE_EXTENSION: &str = "scrivx";

/// Where a new child of an item gets spliced into the manifest text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChildrenSlot {
    /// Just before the item's `</Children>` closing tag.
    Open { at: usize },
    /// An empty `<Children/>` element, replaced wholesale.
    Empty { start: usize, end: usize },
    /// No `Children` element: just before the item's own `</BinderItem>`.
    Missing { at: usize },
    /// A self-closing `<BinderItem .../>` ending at `end`; its `/>` is rewritten.
    SelfClosing { end: usize },
}

/// The manifest text exactly as it is on disk, plus the splice positions.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    source: String,
    slots: HashMap<NodeId, ChildrenSlot>,
}

/// The result of parsing a manifest.
#[derive(Debug)]
pub struct ParsedManifest {
    pub manifest: Manifest,
    pub nodes: HashMap<NodeId, Node>,
    /// Top-level binder items in manifest order.
    pub roots: Vec<NodeId>,
}

impl Manifest {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Fail with `ManifestChanged` if the file on disk differs from what was parsed.
    pub fn ensure_current(&self) -> Result<()> {
        let on_disk = fs::read_to_string(&self.path).map_err(|source| ProjectError::Read {
            path: self.path.clone(),
            source,
        })?;
        if on_disk != self.source {
            tracing::warn!("Manifest {} changed on disk", self.path.display());
            return Err(ProjectError::ManifestChanged {
                path: self.path.clone(),
            });
        }
        Ok(())
    }
}

/// Find the manifest inside a package root.
///
/// The configured file name wins; otherwise the first `*.scrivx` file in
/// sorted order is used.
pub fn locate(root: &Path, config: &ProjectConfig) -> Result<PathBuf> {
    let preferred = root.join(&config.manifest_file);
    if preferred.is_file() {
        return Ok(preferred);
    }

    let entries = fs::read_dir(root)
        .map_err(|e| ProjectError::parse(root, format!("cannot read package directory: {}", e)))?;
    let mut native: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path.extension().and_then(|ext| ext.to_str()) == Some(NATIVE_EXTENSION)
        })
        .collect();
    native.sort();

    native
        .into_iter()
        .next()
        .ok_or_else(|| ProjectError::parse(preferred, "manifest not found"))
}

/// Locate, read and parse the manifest of the package at `root`.
pub fn load(root: &Path, config: &ProjectConfig) -> Result<ParsedManifest> {
    let path = locate(root, config)?;
    let source = fs::read_to_string(&path)
        .map_err(|e| ProjectError::parse(&path, format!("cannot read manifest: {}", e)))?;
    parse(path, source)
}

/// Parse manifest text that was read from `path`.
pub fn parse(path: PathBuf, source: String) -> Result<ParsedManifest> {
    let output = match parse::Parser::new(&source).run() {
        Ok(output) => output,
        Err(message) => return Err(ProjectError::parse(path, message)),
    };

    Ok(ParsedManifest {
        manifest: Manifest {
            path,
            source,
            slots: output.slots,
        },
        nodes: output.nodes,
        roots: output.roots,
    })
}
