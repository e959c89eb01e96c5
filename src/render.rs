//! ASCII tree rendering for the binder.

use crate::models::{BinderTreeNode, NodeKind};

const FOLDER: char = '▸';
const DOCUMENT: char = '•';
const OTHER: char = '·';
const COMPILED: &str = " ✓";

/// Get the marker for a node kind.
fn kind_symbol(kind: &NodeKind) -> char {
    match kind {
        NodeKind::RootDraftFolder | NodeKind::Folder => FOLDER,
        NodeKind::Document => DOCUMENT,
        NodeKind::Other(_) => OTHER,
    }
}

/// Render a binder tree as ASCII art.
///
/// Documents included in the compiled manuscript carry a trailing check mark.
///
/// Example output:
/// ```text
/// ▸ Draft
/// ├── • Chapter One ✓
/// ├── • Cut Scene
/// └── ▸ Part Two
///     └── • Chapter Two ✓
/// ▸ Research
/// ```
pub fn render_binder(nodes: &[BinderTreeNode]) -> String {
    let mut output = String::new();
    for (i, node) in nodes.iter().enumerate() {
        let is_last = i == nodes.len() - 1;
        render_node(&mut output, node, "", is_last, true);
    }
    output
}

/// Recursively render a node and its children.
fn render_node(
    output: &mut String,
    node: &BinderTreeNode,
    prefix: &str,
    is_last: bool,
    is_root: bool,
) {
    if !is_root {
        let branch = if is_last { "└── " } else { "├── " };
        output.push_str(prefix);
        output.push_str(branch);
    }
    output.push(kind_symbol(&node.kind));
    output.push(' ');
    output.push_str(&node.title);
    if node.kind.is_document() && node.include_in_compile {
        output.push_str(COMPILED);
    }
    output.push('\n');

    // Top-level items start their children at the left margin.
    let child_prefix = if is_root {
        String::new()
    } else {
        let continuation = if is_last { "    " } else { "│   " };
        format!("{}{}", prefix, continuation)
    };

    for (i, child) in node.children.iter().enumerate() {
        let child_is_last = i == node.children.len() - 1;
        render_node(output, child, &child_prefix, child_is_last, false);
    }
}
