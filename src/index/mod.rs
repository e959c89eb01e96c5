//! Lookup structures and derived views over the binder tree.
//!
//! A [`ProjectIndex`] is immutable once built. Structural changes produce a
//! new index (see [`ProjectIndex::with_child`]), so readers holding an
//! `Arc<ProjectIndex>` always walk a consistent tree.

mod compile;
mod walk;

use std::collections::HashMap;

pub use compile::{CompileIter, CompileOrder};
pub use walk::PreOrder;

use crate::error::{ProjectError, Result};
use crate::models::{BinderTreeNode, Node, NodeId, NodeKind, Resolution, ResolvedBy, TitleMatch};

/// The node arena plus path and title lookups.
#[derive(Debug, Clone, Default)]
pub struct ProjectIndex {
    nodes: HashMap<NodeId, Node>,
    roots: Vec<NodeId>,
    paths: HashMap<NodeId, String>,
    by_path: HashMap<String, Vec<NodeId>>,
    by_folded_path: HashMap<String, Vec<NodeId>>,
    by_title: HashMap<String, Vec<NodeId>>,
}

impl ProjectIndex {
    /// Build the lookups over an arena. Multi-valued lookups are filled in pre-order.
    pub fn build(nodes: HashMap<NodeId, Node>, roots: Vec<NodeId>) -> Self {
        let mut index = Self {
            nodes,
            roots,
            ..Default::default()
        };

        let mut paths = HashMap::with_capacity(index.nodes.len());
        let mut by_path: HashMap<String, Vec<NodeId>> = HashMap::new();
        let mut by_folded_path: HashMap<String, Vec<NodeId>> = HashMap::new();
        let mut by_title: HashMap<String, Vec<NodeId>> = HashMap::new();

        // Parents come before children in pre-order, so their path is ready.
        for node in index.walk() {
            let path = match node.parent.as_ref().and_then(|p| paths.get(p)) {
                Some(parent_path) => format!("{}/{}", parent_path, node.title),
                None => node.title.clone(),
            };
            by_path.entry(path.clone()).or_default().push(node.id.clone());
            by_folded_path
                .entry(path.to_lowercase())
                .or_default()
                .push(node.id.clone());
            by_title
                .entry(node.title.clone())
                .or_default()
                .push(node.id.clone());
            paths.insert(node.id.clone(), path);
        }

        index.paths = paths;
        index.by_path = by_path;
        index.by_folded_path = by_folded_path;
        index.by_title = by_title;
        index
    }

    /// A new index with `child` appended as the last child of `parent`.
    pub fn with_child(&self, parent: &NodeId, child: Node) -> Result<Self> {
        let mut nodes = self.nodes.clone();
        let parent_node = nodes
            .get_mut(parent)
            .ok_or_else(|| ProjectError::NotFound(parent.to_string()))?;
        parent_node.children.push(child.id.clone());
        nodes.insert(child.id.clone(), child);
        Ok(Self::build(nodes, self.roots.clone()))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Look a node up by exact id.
    pub fn node(&self, id: &str) -> Result<&Node> {
        self.get(id)
            .ok_or_else(|| ProjectError::NotFound(id.to_string()))
    }

    /// Top-level binder items in manifest order.
    pub fn roots(&self) -> impl Iterator<Item = &Node> {
        self.roots.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Every node, depth-first in manifest order.
    pub fn walk(&self) -> PreOrder<'_> {
        PreOrder::new(self, self.roots.iter().rev())
    }

    /// `id` and all its descendants, depth-first in manifest order.
    pub fn walk_from(&self, id: &str) -> PreOrder<'_> {
        match self.nodes.get_key_value(id) {
            Some((key, _)) => PreOrder::new(self, std::iter::once(key)),
            None => PreOrder::new(self, std::iter::empty()),
        }
    }

    /// Materialized path: slash-joined titles from the top of the binder.
    pub fn path(&self, id: &str) -> Option<&str> {
        self.paths.get(id).map(String::as_str)
    }

    /// Number of ancestors; top-level items have depth 0.
    pub fn depth(&self, id: &str) -> usize {
        self.ancestors(id).count()
    }

    /// Parent, grandparent and so on up to the top of the binder.
    pub fn ancestors<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a Node> + 'a {
        let mut current = self.nodes.get(id).and_then(|n| n.parent.as_ref());
        std::iter::from_fn(move || {
            let node = self.nodes.get(current?)?;
            current = node.parent.as_ref();
            Some(node)
        })
    }

    /// The first draft folder in pre-order.
    pub fn draft_folder(&self) -> Option<&Node> {
        self.walk().find(|n| n.kind == NodeKind::RootDraftFolder)
    }

    /// Resolve an identifier by exact id, exact path, case-insensitive path, then title.
    ///
    /// The first scheme with any match wins. When that scheme matches several
    /// nodes the result is [`Resolution::Ambiguous`], candidates in pre-order.
    pub fn resolve(&self, identifier: &str) -> Result<Resolution> {
        if let Some(node) = self.nodes.get(identifier) {
            return Ok(Resolution::Unique {
                node: node.clone(),
                by: ResolvedBy::Id,
            });
        }

        let schemes = [
            (self.by_path.get(identifier), ResolvedBy::Path),
            (
                self.by_folded_path.get(&identifier.to_lowercase()),
                ResolvedBy::PathCaseInsensitive,
            ),
            (self.by_title.get(identifier), ResolvedBy::Title),
        ];
        for (ids, by) in schemes {
            if let Some(resolution) = ids.and_then(|ids| self.resolution(ids, by)) {
                return Ok(resolution);
            }
        }

        Err(ProjectError::NotFound(identifier.to_string()))
    }

    fn resolution(&self, ids: &[NodeId], by: ResolvedBy) -> Option<Resolution> {
        let mut candidates: Vec<Node> = ids
            .iter()
            .filter_map(|id| self.nodes.get(id).cloned())
            .collect();
        match candidates.len() {
            0 => None,
            1 => candidates.pop().map(|node| Resolution::Unique { node, by }),
            _ => Some(Resolution::Ambiguous {
                first: candidates[0].clone(),
                candidates,
                by,
            }),
        }
    }

    /// Every node whose title matches, in pre-order.
    pub fn find_by_title(&self, query: &str, mode: TitleMatch) -> Vec<&Node> {
        match mode {
            TitleMatch::Exact => self
                .by_title
                .get(query)
                .map(|ids| ids.iter().filter_map(|id| self.nodes.get(id)).collect())
                .unwrap_or_default(),
            TitleMatch::Contains => {
                let needle = query.to_lowercase();
                self.walk()
                    .filter(|n| n.title.to_lowercase().contains(&needle))
                    .collect()
            }
        }
    }

    /// Nested view of the whole binder.
    pub fn binder_tree(&self) -> Vec<BinderTreeNode> {
        self.roots
            .iter()
            .filter_map(|id| self.subtree(id.as_str()))
            .collect()
    }

    /// Nested view rooted at `id`.
    pub fn subtree(&self, id: &str) -> Option<BinderTreeNode> {
        let node = self.nodes.get(id)?;
        Some(BinderTreeNode {
            id: node.id.clone(),
            title: node.title.clone(),
            kind: node.kind.clone(),
            include_in_compile: node.include_in_compile,
            path: self.path(id).unwrap_or_default().to_string(),
            children: node
                .children
                .iter()
                .filter_map(|child| self.subtree(child.as_str()))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, kind: NodeKind, parent: Option<&str>, children: &[&str]) -> Node {
        Node {
            id: NodeId::from(id),
            title: id.to_string(),
            kind,
            parent: parent.map(NodeId::from),
            children: children.iter().map(|c| NodeId::from(*c)).collect(),
            include_in_compile: true,
            created: None,
            modified: None,
        }
    }

    #[test]
    fn test_binder_tree_keeps_root_order() {
        let nodes: HashMap<_, _> = vec![
            node("B", NodeKind::Folder, None, &["B1"]),
            node("B1", NodeKind::Document, Some("B"), &[]),
            node("A", NodeKind::RootDraftFolder, None, &[]),
        ]
        .into_iter()
        .map(|n| (n.id.clone(), n))
        .collect();
        let index = ProjectIndex::build(nodes, vec![NodeId::from("B"), NodeId::from("A")]);

        let tree = index.binder_tree();
        let roots: Vec<&str> = tree.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(roots, vec!["B", "A"]);
        assert_eq!(tree[0].children[0].path, "B/B1");
        assert!(index.subtree("missing").is_none());
    }
}
