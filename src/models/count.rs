use serde::{Deserialize, Serialize};

use super::node::NodeId;

/// One row of a word count breakdown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WordCountEntry {
    pub id: NodeId,
    pub title: String,
    /// Depth below the node the breakdown was requested for (that node is 0).
    pub depth: usize,
    pub is_folder: bool,
    /// Own words for documents, aggregated words for everything else.
    pub words: usize,
}
