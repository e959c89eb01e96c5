use std::borrow::Borrow;
use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Opaque identifier of a binder item.
///
/// Identifiers come straight from the manifest's `UUID` attribute and are
/// unique across the whole tree. They are also used as directory names under
/// `Files/Data`, so the parser refuses tokens that could escape that directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `raw` is usable as an identifier (non-empty, no path components).
    pub fn is_valid(raw: &str) -> bool {
        !raw.is_empty()
            && raw != "."
            && raw != ".."
            && !raw.contains(['/', '\\', '\0'])
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// What a binder item is.
///
/// - `RootDraftFolder`: the manuscript folder whose documents make up the compiled output
/// - `Folder`: any other container (including research and trash folders)
/// - `Document`: a text item with a body
/// - `Other`: an item type this crate does not interpret, kept verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    RootDraftFolder,
    Folder,
    Document,
    Other(String),
}

impl NodeKind {
    /// Map a manifest `Type` attribute to a kind. Unknown types are preserved.
    pub fn from_manifest_type(raw: &str) -> Self {
        match raw {
            "DraftFolder" => Self::RootDraftFolder,
            "Folder" | "ResearchFolder" | "TrashFolder" => Self::Folder,
            "Text" => Self::Document,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::RootDraftFolder => "root_draft_folder",
            Self::Folder => "folder",
            Self::Document => "document",
            Self::Other(raw) => raw,
        }
    }

    /// The `Type` attribute written to the manifest for this kind.
    pub fn manifest_type(&self) -> &str {
        match self {
            Self::RootDraftFolder => "DraftFolder",
            Self::Folder => "Folder",
            Self::Document => "Text",
            Self::Other(raw) => raw,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Self::RootDraftFolder | Self::Folder)
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Self::Document)
    }
}

/// One folder or document in the binder.
///
/// Nodes live in an arena keyed by [`NodeId`]; `parent` and `children` are
/// lookups into that arena rather than owning references. `children` keeps the
/// manifest order, which is the order the user sees and is never re-sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub title: String,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Whether the item takes part in the compiled manuscript. Defaults to `true`.
    pub include_in_compile: bool,
    pub created: Option<DateTime<FixedOffset>>,
    pub modified: Option<DateTime<FixedOffset>>,
}

/// A plain-text metadata sidecar of a node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MetadataKind {
    Synopsis,
    Notes,
}

impl MetadataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synopsis => "synopsis",
            Self::Notes => "notes",
        }
    }
}

/// Any of the per-node files under `Files/Data/{id}/`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Sidecar {
    Body,
    Synopsis,
    Notes,
}

impl Sidecar {
    pub const ALL: [Sidecar; 3] = [Sidecar::Body, Sidecar::Synopsis, Sidecar::Notes];

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Body => "body.rtf",
            Self::Synopsis => "synopsis.txt",
            Self::Notes => "notes.txt",
        }
    }
}

impl From<MetadataKind> for Sidecar {
    fn from(kind: MetadataKind) -> Self {
        match kind {
            MetadataKind::Synopsis => Self::Synopsis,
            MetadataKind::Notes => Self::Notes,
        }
    }
}

/// A node with its nested children, used for binder tree views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinderTreeNode {
    pub id: NodeId,
    pub title: String,
    pub kind: NodeKind,
    pub include_in_compile: bool,
    /// Slash-joined titles from the top of the binder.
    pub path: String,
    pub children: Vec<BinderTreeNode>,
}
