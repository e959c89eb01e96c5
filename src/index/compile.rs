use std::sync::Arc;

use super::{PreOrder, ProjectIndex};
use crate::models::Node;

/// The documents of the compiled manuscript, in order.
///
/// This is a pre-order walk of the first draft folder, keeping documents that
/// are flagged for inclusion. The sequence is lazy and restartable: every call
/// to [`iter`](Self::iter) starts a fresh walk over the same tree snapshot.
#[derive(Debug, Clone)]
pub struct CompileOrder {
    index: Arc<ProjectIndex>,
}

impl CompileOrder {
    pub fn new(index: Arc<ProjectIndex>) -> Self {
        Self { index }
    }

    pub fn iter(&self) -> CompileIter<'_> {
        let walk = self
            .index
            .draft_folder()
            .map(|draft| self.index.walk_from(draft.id.as_str()));
        CompileIter { walk }
    }

    /// Titles in compile order, mostly useful for display.
    pub fn titles(&self) -> Vec<String> {
        self.iter().map(|n| n.title.clone()).collect()
    }
}

impl<'a> IntoIterator for &'a CompileOrder {
    type Item = &'a Node;
    type IntoIter = CompileIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One pass over a [`CompileOrder`].
#[derive(Debug, Clone)]
pub struct CompileIter<'a> {
    walk: Option<PreOrder<'a>>,
}

impl<'a> Iterator for CompileIter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        self.walk
            .as_mut()?
            .find(|n| n.kind.is_document() && n.include_in_compile)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::models::{NodeId, NodeKind};

    fn node(id: &str, kind: NodeKind, include: bool, parent: Option<&str>, children: &[&str]) -> Node {
        Node {
            id: NodeId::from(id),
            title: id.to_string(),
            kind,
            parent: parent.map(NodeId::from),
            children: children.iter().map(|c| NodeId::from(*c)).collect(),
            include_in_compile: include,
            created: None,
            modified: None,
        }
    }

    fn index(nodes: Vec<Node>, roots: &[&str]) -> Arc<ProjectIndex> {
        let nodes: HashMap<_, _> = nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        Arc::new(ProjectIndex::build(
            nodes,
            roots.iter().map(|r| NodeId::from(*r)).collect(),
        ))
    }

    #[test]
    fn test_only_included_documents_under_draft() {
        let index = index(
            vec![
                node("Draft", NodeKind::RootDraftFolder, true, None, &["Ch1", "Ch2", "Part"]),
                node("Ch1", NodeKind::Document, true, Some("Draft"), &[]),
                node("Ch2", NodeKind::Document, false, Some("Draft"), &[]),
                node("Part", NodeKind::Folder, true, Some("Draft"), &["Ch3"]),
                node("Ch3", NodeKind::Document, true, Some("Part"), &[]),
                node("Research", NodeKind::Folder, true, None, &["Notes"]),
                node("Notes", NodeKind::Document, true, Some("Research"), &[]),
            ],
            &["Draft", "Research"],
        );
        let order = CompileOrder::new(index);
        assert_eq!(order.titles(), vec!["Ch1", "Ch3"]);
        // Restartable: a second pass yields the same sequence.
        assert_eq!(order.iter().count(), 2);
    }

    #[test]
    fn test_empty_without_draft_folder() {
        let index = index(
            vec![node("Notes", NodeKind::Document, true, None, &[])],
            &["Notes"],
        );
        assert_eq!(CompileOrder::new(index).iter().count(), 0);
    }
}
