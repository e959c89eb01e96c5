use serde::{Deserialize, Serialize};

use super::node::Node;

/// Which addressing scheme produced a resolution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedBy {
    Id,
    Path,
    PathCaseInsensitive,
    Title,
}

/// The outcome of resolving an identifier.
///
/// Titles (and, with duplicate sibling titles, paths) are not unique, so
/// resolution never silently picks a winner: an `Ambiguous` result carries every
/// candidate in pre-order, with `first` being the pre-order first match. The
/// caller decides whether that is good enough.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Unique {
        node: Node,
        by: ResolvedBy,
    },
    Ambiguous {
        first: Node,
        /// All matches in pre-order, `first` included.
        candidates: Vec<Node>,
        by: ResolvedBy,
    },
}

impl Resolution {
    /// The unique match, or the pre-order first candidate.
    pub fn node(&self) -> &Node {
        match self {
            Self::Unique { node, .. } => node,
            Self::Ambiguous { first, .. } => first,
        }
    }

    pub fn into_node(self) -> Node {
        match self {
            Self::Unique { node, .. } => node,
            Self::Ambiguous { first, .. } => first,
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous { .. })
    }

    pub fn resolved_by(&self) -> ResolvedBy {
        match self {
            Self::Unique { by, .. } | Self::Ambiguous { by, .. } => *by,
        }
    }

    pub fn candidates(&self) -> &[Node] {
        match self {
            Self::Unique { node, .. } => std::slice::from_ref(node),
            Self::Ambiguous { candidates, .. } => candidates,
        }
    }
}

/// How [`find_by_title`](crate::index::ProjectIndex::find_by_title) compares titles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TitleMatch {
    /// Byte-for-byte equality.
    Exact,
    /// Case-insensitive substring.
    Contains,
}
