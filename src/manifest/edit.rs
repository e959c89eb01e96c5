use std::collections::HashMap;
use std::ops::Range;

use quick_xml::escape::escape;

use super::{ChildrenSlot, Manifest, MANIFEST_TIME_FORMAT};
use crate::models::{Node, NodeId};

const CLOSE_ITEM: &str = "</BinderItem>";

/// Whitespace conventions of an existing manifest, reused for inserted text.
struct Layout {
    newline: &'static str,
    unit: String,
}

impl Layout {
    fn detect(source: &str) -> Self {
        if !source.trim_end().contains('\n') {
            // Single-line manifest: keep it single-line.
            return Self {
                newline: "",
                unit: String::new(),
            };
        }

        let newline = if source.contains("\r\n") { "\r\n" } else { "\n" };
        let unit = source
            .lines()
            .filter(|line| !line.trim().is_empty())
            .find_map(|line| {
                let indent = leading_whitespace(line);
                if indent.is_empty() {
                    None
                } else if indent.starts_with('\t') {
                    Some("\t".to_string())
                } else {
                    Some(indent.to_string())
                }
            })
            .unwrap_or_else(|| "    ".to_string());

        Self { newline, unit }
    }
}

impl ChildrenSlot {
    fn shifted(self, shift: impl Fn(usize) -> usize) -> Self {
        match self {
            Self::Open { at } => Self::Open { at: shift(at) },
            Self::Empty { start, end } => Self::Empty {
                start: shift(start),
                end: shift(end),
            },
            Self::Missing { at } => Self::Missing { at: shift(at) },
            Self::SelfClosing { end } => Self::SelfClosing { end: shift(end) },
        }
    }
}

impl Manifest {
    /// A copy of this manifest with `child` appended as the last child of `parent`.
    ///
    /// Only the parent's children slot is touched; every byte before and after
    /// the spliced region is carried over unchanged. Returns `None` when no slot
    /// is recorded for `parent`.
    pub(crate) fn with_child(&self, parent: &NodeId, child: &Node) -> Option<Manifest> {
        let slot = *self.slots.get(parent)?;
        let layout = Layout::detect(&self.source);
        let nl = layout.newline;
        let unit = layout.unit.as_str();

        let mut text = String::new();
        let item_at;
        let open_at;
        let item;

        let range: Range<usize> = match slot {
            ChildrenSlot::Open { at } => {
                let closing = line_indent(&self.source, at);
                let item_indent = format!("{closing}{unit}");
                item = render_item(child, &item_indent, &layout);

                text.push_str(unit);
                item_at = text.len();
                text.push_str(&item);
                text.push_str(nl);
                text.push_str(closing);
                open_at = text.len();
                at..at
            }
            ChildrenSlot::Missing { at } => {
                let closing = line_indent(&self.source, at);
                let inner = format!("{closing}{unit}");
                let item_indent = format!("{inner}{unit}");
                item = render_item(child, &item_indent, &layout);

                text.push_str(unit);
                text.push_str("<Children>");
                text.push_str(nl);
                text.push_str(&item_indent);
                item_at = text.len();
                text.push_str(&item);
                text.push_str(nl);
                text.push_str(&inner);
                open_at = text.len();
                text.push_str("</Children>");
                text.push_str(nl);
                text.push_str(closing);
                at..at
            }
            ChildrenSlot::Empty { start, end } => {
                let indent = line_indent(&self.source, start);
                let item_indent = format!("{indent}{unit}");
                item = render_item(child, &item_indent, &layout);

                text.push_str("<Children>");
                text.push_str(nl);
                text.push_str(&item_indent);
                item_at = text.len();
                text.push_str(&item);
                text.push_str(nl);
                text.push_str(indent);
                open_at = text.len();
                text.push_str("</Children>");
                start..end
            }
            ChildrenSlot::SelfClosing { end } => {
                let tag_end = end.checked_sub(2)?;
                if self.source.get(tag_end..end) != Some("/>") {
                    return None;
                }
                let line_start = self.source[..tag_end].rfind('\n').map_or(0, |i| i + 1);
                let indent = leading_whitespace(&self.source[line_start..]);
                let inner = format!("{indent}{unit}");
                let item_indent = format!("{inner}{unit}");
                item = render_item(child, &item_indent, &layout);

                text.push('>');
                text.push_str(nl);
                text.push_str(&inner);
                text.push_str("<Children>");
                text.push_str(nl);
                text.push_str(&item_indent);
                item_at = text.len();
                text.push_str(&item);
                text.push_str(nl);
                text.push_str(&inner);
                open_at = text.len();
                text.push_str("</Children>");
                text.push_str(nl);
                text.push_str(indent);
                text.push_str(CLOSE_ITEM);
                tag_end..end
            }
        };

        let mut source = String::with_capacity(self.source.len() + text.len());
        source.push_str(&self.source[..range.start]);
        source.push_str(&text);
        source.push_str(&self.source[range.end..]);

        let base = range.start;
        let inserted = text.len();
        let shift = |offset: usize| {
            if offset >= range.end {
                offset - range.end + base + inserted
            } else {
                offset
            }
        };

        let mut slots: HashMap<NodeId, ChildrenSlot> = self
            .slots
            .iter()
            .filter(|(id, _)| *id != parent)
            .map(|(id, slot)| (id.clone(), slot.shifted(shift)))
            .collect();
        slots.insert(parent.clone(), ChildrenSlot::Open { at: base + open_at });
        let child_close = item.rfind(CLOSE_ITEM)?;
        slots.insert(
            child.id.clone(),
            ChildrenSlot::Missing {
                at: base + item_at + child_close,
            },
        );

        Some(Manifest {
            path: self.path.clone(),
            source,
            slots,
        })
    }
}

/// Serialize a freshly created item. The first line carries no indentation;
/// the caller has already placed it.
fn render_item(child: &Node, indent: &str, layout: &Layout) -> String {
    let nl = layout.newline;
    let unit = layout.unit.as_str();

    let mut out = format!(
        "<BinderItem UUID=\"{}\" Type=\"{}\"",
        escape(child.id.as_str()),
        escape(child.kind.manifest_type())
    );
    if let Some(created) = child.created {
        out.push_str(&format!(
            " Created=\"{}\"",
            created.format(MANIFEST_TIME_FORMAT)
        ));
    }
    if let Some(modified) = child.modified {
        out.push_str(&format!(
            " Modified=\"{}\"",
            modified.format(MANIFEST_TIME_FORMAT)
        ));
    }
    out.push('>');

    let include = if child.include_in_compile { "Yes" } else { "No" };
    for (depth, line) in [
        (1, format!("<Title>{}</Title>", escape(child.title.as_str()))),
        (1, "<MetaData>".to_string()),
        (2, format!("<IncludeInCompile>{include}</IncludeInCompile>")),
        (1, "</MetaData>".to_string()),
        (0, CLOSE_ITEM.to_string()),
    ] {
        out.push_str(nl);
        out.push_str(indent);
        for _ in 0..depth {
            out.push_str(unit);
        }
        out.push_str(&line);
    }
    out
}

/// Indentation preceding `at` on its line, or `""` when other text precedes it.
fn line_indent(source: &str, at: usize) -> &str {
    let line_start = source[..at].rfind('\n').map_or(0, |i| i + 1);
    let prefix = &source[line_start..at];
    if prefix.chars().all(|c| c == ' ' || c == '\t') {
        prefix
    } else {
        ""
    }
}

fn leading_whitespace(line: &str) -> &str {
    let end = line
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(line.len());
    &line[..end]
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::manifest::{parse, parse_timestamp};
    use crate::models::NodeKind;

    fn new_doc(id: &str, title: &str, parent: &str) -> Node {
        Node {
            id: NodeId::from(id),
            title: title.to_string(),
            kind: NodeKind::Document,
            parent: Some(NodeId::from(parent)),
            children: Vec::new(),
            include_in_compile: true,
            created: parse_timestamp("2025-01-01 12:00:00 +0000"),
            modified: parse_timestamp("2025-01-01 12:00:00 +0000"),
        }
    }

    fn manifest(source: &str) -> Manifest {
        parse(PathBuf::from("manifest.xml"), source.to_string())
            .unwrap()
            .manifest
    }

    const INDENTED: &str = "<P>\n    <Binder>\n        <BinderItem UUID=\"D\" Type=\"DraftFolder\">\n            <Title>Draft</Title>\n            <Children>\n                <BinderItem UUID=\"A\" Type=\"Text\">\n                    <Title>A</Title>\n                </BinderItem>\n            </Children>\n        </BinderItem>\n    </Binder>\n</P>\n";

    #[test]
    fn test_appends_into_open_children() {
        let before = manifest(INDENTED);
        let after = before
            .with_child(&NodeId::from("D"), &new_doc("N", "New & <odd>", "D"))
            .unwrap();

        let expected = INDENTED.replace(
            "                </BinderItem>\n            </Children>",
            "                </BinderItem>\n                <BinderItem UUID=\"N\" Type=\"Text\" Created=\"2025-01-01 12:00:00 +0000\" Modified=\"2025-01-01 12:00:00 +0000\">\n                    <Title>New &amp; &lt;odd&gt;</Title>\n                    <MetaData>\n                        <IncludeInCompile>Yes</IncludeInCompile>\n                    </MetaData>\n                </BinderItem>\n            </Children>",
        );
        assert_eq!(after.source(), expected);

        let reparsed = parse(PathBuf::from("manifest.xml"), after.source().to_string()).unwrap();
        assert_eq!(reparsed.manifest.slots, after.slots);
        assert_eq!(reparsed.nodes[&NodeId::from("N")].title, "New & <odd>");
    }

    #[test]
    fn test_creates_children_element_when_missing() {
        let before = manifest(INDENTED);
        let after = before
            .with_child(&NodeId::from("A"), &new_doc("N", "Sub", "A"))
            .unwrap();

        let reparsed = parse(PathBuf::from("manifest.xml"), after.source().to_string()).unwrap();
        assert_eq!(reparsed.nodes[&NodeId::from("A")].children, vec![NodeId::from("N")]);
        assert_eq!(reparsed.manifest.slots, after.slots);
        assert!(after.source().starts_with(&INDENTED[..INDENTED.find("</BinderItem>").unwrap()]));
    }

    #[test]
    fn test_handles_empty_and_self_closing_items() {
        let source = r#"<P><Binder><BinderItem UUID="D" Type="DraftFolder"><Children/></BinderItem><BinderItem UUID="E" Type="Folder"/></Binder></P>"#;
        let before = manifest(source);

        let once = before
            .with_child(&NodeId::from("D"), &new_doc("N1", "One", "D"))
            .unwrap();
        let twice = once
            .with_child(&NodeId::from("E"), &new_doc("N2", "Two", "E"))
            .unwrap();
        let thrice = twice
            .with_child(&NodeId::from("D"), &new_doc("N3", "Three", "D"))
            .unwrap();

        let reparsed = parse(PathBuf::from("manifest.xml"), thrice.source().to_string()).unwrap();
        assert_eq!(
            reparsed.nodes[&NodeId::from("D")].children,
            vec![NodeId::from("N1"), NodeId::from("N3")]
        );
        assert_eq!(reparsed.nodes[&NodeId::from("E")].children, vec![NodeId::from("N2")]);
        assert_eq!(reparsed.manifest.slots, thrice.slots);
        assert!(!thrice.source().contains('\n'));
    }

    #[test]
    fn test_keeps_crlf_line_endings() {
        let source = INDENTED.replace('\n', "\r\n");
        let after = manifest(&source)
            .with_child(&NodeId::from("D"), &new_doc("N", "New", "D"))
            .unwrap();
        assert_eq!(after.source().matches('\n').count(), after.source().matches("\r\n").count());
    }
}
