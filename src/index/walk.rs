use super::ProjectIndex;
use crate::models::{Node, NodeId};

/// Depth-first, manifest-order iterator over an index.
#[derive(Debug, Clone)]
pub struct PreOrder<'a> {
    index: &'a ProjectIndex,
    stack: Vec<&'a NodeId>,
}

impl<'a> PreOrder<'a> {
    /// `start` must yield the starting ids in reverse order (top of stack last).
    pub(super) fn new(index: &'a ProjectIndex, start: impl Iterator<Item = &'a NodeId>) -> Self {
        Self {
            index,
            stack: start.collect(),
        }
    }
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            if let Some(node) = self.index.get(id.as_str()) {
                self.stack.extend(node.children.iter().rev());
                return Some(node);
            }
        }
        None
    }
}
