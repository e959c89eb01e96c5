use serde::{Deserialize, Serialize};

use super::node::{MetadataKind, Node};

/// The text of a node a search match was found in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    Body,
    Synopsis,
    Notes,
}

impl SearchField {
    pub const ALL: [SearchField; 3] = [SearchField::Body, SearchField::Synopsis, SearchField::Notes];

    pub fn metadata_kind(&self) -> Option<MetadataKind> {
        match self {
            Self::Body => None,
            Self::Synopsis => Some(MetadataKind::Synopsis),
            Self::Notes => Some(MetadataKind::Notes),
        }
    }
}

/// A single occurrence of the query inside one field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchMatch {
    pub field: SearchField,
    /// Byte offset of the match in the field's plain text (always a char boundary).
    pub offset: usize,
    /// Text around the match with whitespace runs collapsed.
    pub context: String,
}

/// A document that matched, with every match in field order then text order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub node: Node,
    pub matches: Vec<SearchMatch>,
}

/// Tuning for a search run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchOptions {
    #[serde(default)]
    pub case_sensitive: bool,
    /// Characters of context kept on each side of a match.
    pub context_chars: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            context_chars: 40,
        }
    }
}
