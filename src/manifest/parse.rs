use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::ChildrenSlot;
use crate::models::{Node, NodeId, NodeKind};

/// Timestamp format used by the manifest's `Created`/`Modified` attributes.
pub(crate) const MANIFEST_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

const UNTITLED: &str = "Untitled";

pub(crate) struct ParseOutput {
    pub nodes: HashMap<NodeId, Node>,
    pub roots: Vec<NodeId>,
    pub slots: HashMap<NodeId, ChildrenSlot>,
}

/// Pull parser over `Root/Binder/BinderItem` trees.
///
/// Offsets recorded in [`ChildrenSlot`] are byte offsets into `source`.
pub(crate) struct Parser<'a> {
    source: &'a str,
    reader: Reader<&'a [u8]>,
    nodes: HashMap<NodeId, Node>,
    slots: HashMap<NodeId, ChildrenSlot>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            reader: Reader::from_str(source),
            nodes: HashMap::new(),
            slots: HashMap::new(),
        }
    }

    pub fn run(mut self) -> Result<ParseOutput, String> {
        let roots = self.document()?;
        Ok(ParseOutput {
            nodes: self.nodes,
            roots,
            slots: self.slots,
        })
    }

    fn next(&mut self) -> Result<Event<'a>, String> {
        self.reader
            .read_event()
            .map_err(|e| format!("{} (near byte {})", e, self.reader.buffer_position()))
    }

    /// Byte offset just past the last event read.
    fn position(&self) -> usize {
        self.reader.buffer_position()
    }

    /// Byte offset of the `<` that opened the tag the last event ended with.
    fn tag_start(&self) -> usize {
        let end = self.position();
        self.source[..end].rfind('<').unwrap_or(0)
    }

    fn document(&mut self) -> Result<Vec<NodeId>, String> {
        let roots = loop {
            match self.next()? {
                Event::Start(_) => break self.root_element()?,
                Event::Empty(_) => return Err("root element has no Binder".to_string()),
                Event::Eof => return Err("missing root element".to_string()),
                _ => {}
            }
        };

        loop {
            match self.next()? {
                Event::Start(_) | Event::Empty(_) => {
                    return Err("content after the root element".to_string())
                }
                Event::Eof => return Ok(roots),
                _ => {}
            }
        }
    }

    fn root_element(&mut self) -> Result<Vec<NodeId>, String> {
        let mut roots = None;
        loop {
            match self.next()? {
                Event::Start(e) if e.name().as_ref() == b"Binder" && roots.is_none() => {
                    roots = Some(self.binder()?);
                }
                Event::Empty(e) if e.name().as_ref() == b"Binder" && roots.is_none() => {
                    roots = Some(Vec::new());
                }
                Event::Start(_) => self.skip()?,
                Event::End(_) => break,
                Event::Eof => return Err("unexpected end of file in root element".to_string()),
                _ => {}
            }
        }
        roots.ok_or_else(|| "root element has no Binder".to_string())
    }

    fn binder(&mut self) -> Result<Vec<NodeId>, String> {
        self.items(None)
    }

    /// Read `BinderItem` siblings until the enclosing element closes.
    fn items(&mut self, parent: Option<&NodeId>) -> Result<Vec<NodeId>, String> {
        let mut ids = Vec::new();
        loop {
            match self.next()? {
                Event::Start(e) if e.name().as_ref() == b"BinderItem" => {
                    ids.push(self.item(&e, parent, false)?);
                }
                Event::Empty(e) if e.name().as_ref() == b"BinderItem" => {
                    ids.push(self.item(&e, parent, true)?);
                }
                Event::Start(_) => self.skip()?,
                Event::End(_) => return Ok(ids),
                Event::Eof => return Err("unexpected end of file in item list".to_string()),
                _ => {}
            }
        }
    }

    fn item(
        &mut self,
        start: &BytesStart<'_>,
        parent: Option<&NodeId>,
        self_closing: bool,
    ) -> Result<NodeId, String> {
        let raw_id = attribute(start, b"UUID")?
            .filter(|id| !id.is_empty())
            .ok_or_else(|| format!("BinderItem without UUID near byte {}", self.position()))?;
        if !NodeId::is_valid(&raw_id) {
            return Err(format!("BinderItem has an unusable UUID {:?}", raw_id));
        }
        let id = NodeId::new(raw_id);

        let kind = attribute(start, b"Type")?
            .map(|t| NodeKind::from_manifest_type(&t))
            .unwrap_or(NodeKind::Document);
        let created = attribute(start, b"Created")?.and_then(|s| parse_timestamp(&s));
        let modified = attribute(start, b"Modified")?.and_then(|s| parse_timestamp(&s));

        let mut node = Node {
            id: id.clone(),
            title: UNTITLED.to_string(),
            kind,
            parent: parent.cloned(),
            children: Vec::new(),
            include_in_compile: true,
            created,
            modified,
        };

        let slot = if self_closing {
            ChildrenSlot::SelfClosing {
                end: self.position(),
            }
        } else {
            self.item_body(&mut node)?
        };

        if self.nodes.contains_key(&id) {
            return Err(format!("duplicate UUID {}", id));
        }
        self.slots.insert(id.clone(), slot);
        self.nodes.insert(id.clone(), node);
        Ok(id)
    }

    fn item_body(&mut self, node: &mut Node) -> Result<ChildrenSlot, String> {
        let mut slot = None;
        loop {
            match self.next()? {
                Event::Start(e) => match e.name().as_ref() {
                    b"Title" => {
                        let title = self.text_content()?;
                        if !title.is_empty() {
                            node.title = title;
                        }
                    }
                    b"MetaData" => {
                        if let Some(include) = self.metadata()? {
                            node.include_in_compile = include;
                        }
                    }
                    b"Children" if slot.is_none() => {
                        node.children = self.items(Some(&node.id))?;
                        slot = Some(ChildrenSlot::Open {
                            at: self.tag_start(),
                        });
                    }
                    _ => self.skip()?,
                },
                Event::Empty(e) if e.name().as_ref() == b"Children" && slot.is_none() => {
                    slot = Some(ChildrenSlot::Empty {
                        start: self.tag_start(),
                        end: self.position(),
                    });
                }
                Event::End(_) => {
                    let at = self.tag_start();
                    return Ok(slot.unwrap_or(ChildrenSlot::Missing { at }));
                }
                Event::Eof => return Err(format!("unexpected end of file in item {}", node.id)),
                _ => {}
            }
        }
    }

    fn metadata(&mut self) -> Result<Option<bool>, String> {
        let mut include = None;
        loop {
            match self.next()? {
                Event::Start(e) if e.name().as_ref() == b"IncludeInCompile" => {
                    include = Some(parse_include_flag(&self.text_content()?));
                }
                Event::Start(_) => self.skip()?,
                Event::End(_) => return Ok(include),
                Event::Eof => return Err("unexpected end of file in MetaData".to_string()),
                _ => {}
            }
        }
    }

    /// Concatenated text of the current element; nested elements are skipped.
    fn text_content(&mut self) -> Result<String, String> {
        let mut text = String::new();
        loop {
            match self.next()? {
                Event::Text(t) => text.push_str(&t.unescape().map_err(|e| e.to_string())?),
                Event::CData(c) => {
                    text.push_str(std::str::from_utf8(&c).map_err(|e| e.to_string())?)
                }
                Event::Start(_) => self.skip()?,
                Event::End(_) => return Ok(text),
                Event::Eof => return Err("unexpected end of file in text element".to_string()),
                _ => {}
            }
        }
    }

    /// Skip the element whose start tag was just read.
    fn skip(&mut self) -> Result<(), String> {
        let mut depth = 1usize;
        while depth > 0 {
            match self.next()? {
                Event::Start(_) => depth += 1,
                Event::End(_) => depth -= 1,
                Event::Eof => return Err("unexpected end of file".to_string()),
                _ => {}
            }
        }
        Ok(())
    }
}

fn attribute(start: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, String> {
    match start.try_get_attribute(key) {
        Ok(Some(attr)) => attr
            .unescape_value()
            .map(|value| Some(value.into_owned()))
            .map_err(|e| e.to_string()),
        Ok(None) => Ok(None),
        Err(e) => Err(e.to_string()),
    }
}

/// `IncludeInCompile` is on unless explicitly switched off.
pub(crate) fn parse_include_flag(raw: &str) -> bool {
    !matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "no" | "false" | "0"
    )
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    DateTime::parse_from_str(raw, MANIFEST_TIME_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map_err(|e| tracing::debug!("Ignoring unparsable timestamp {:?}: {}", raw, e))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<ParseOutput, String> {
        Parser::new(source).run()
    }

    #[test]
    fn test_preserves_child_order() {
        let out = parse(
            r#"<P><Binder><BinderItem UUID="D" Type="DraftFolder"><Title>Draft</Title><Children>
                <BinderItem UUID="Z" Type="Text"><Title>Zulu</Title></BinderItem>
                <BinderItem UUID="A" Type="Text"><Title>Alpha</Title></BinderItem>
                <BinderItem UUID="M" Type="Text"><Title>Mike</Title></BinderItem>
            </Children></BinderItem></Binder></P>"#,
        )
        .unwrap();
        let draft = &out.nodes[&NodeId::from("D")];
        let titles: Vec<_> = draft
            .children
            .iter()
            .map(|id| out.nodes[id].title.as_str())
            .collect();
        assert_eq!(titles, vec!["Zulu", "Alpha", "Mike"]);
        assert_eq!(out.nodes[&NodeId::from("A")].parent, Some(NodeId::from("D")));
    }

    #[test]
    fn test_unknown_type_is_kept_as_other() {
        let out = parse(r#"<P><Binder><BinderItem UUID="I" Type="Image"/></Binder></P>"#).unwrap();
        assert_eq!(
            out.nodes[&NodeId::from("I")].kind,
            NodeKind::Other("Image".to_string())
        );
        assert_eq!(out.nodes[&NodeId::from("I")].title, "Untitled");
    }

    #[test]
    fn test_include_flag_defaults_to_true() {
        let out = parse(
            r#"<P><Binder>
                <BinderItem UUID="A" Type="Text"><Title>A</Title></BinderItem>
                <BinderItem UUID="B" Type="Text"><MetaData><IncludeInCompile>No</IncludeInCompile></MetaData></BinderItem>
                <BinderItem UUID="C" Type="Text"><MetaData><IncludeInCompile>Yes</IncludeInCompile></MetaData></BinderItem>
            </Binder></P>"#,
        )
        .unwrap();
        assert!(out.nodes[&NodeId::from("A")].include_in_compile);
        assert!(!out.nodes[&NodeId::from("B")].include_in_compile);
        assert!(out.nodes[&NodeId::from("C")].include_in_compile);
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let err = parse(
            r#"<P><Binder><BinderItem UUID="A"/><BinderItem UUID="A"/></Binder></P>"#,
        )
        .err()
        .unwrap();
        assert!(err.contains("duplicate UUID"));
    }

    #[test]
    fn test_rejects_missing_binder_and_root() {
        assert!(parse(r#"<?xml version="1.0"?>"#).is_err());
        assert!(parse(r#"<P><Other/></P>"#).is_err());
        assert!(parse(r#"<P><Binder><BinderItem UUID="A"></Binder></P>"#).is_err());
    }

    #[test]
    fn test_rejects_path_like_ids() {
        assert!(parse(r#"<P><Binder><BinderItem UUID="../x"/></Binder></P>"#).is_err());
        assert!(parse(r#"<P><Binder><BinderItem Type="Text"/></Binder></P>"#).is_err());
    }

    #[test]
    fn test_records_children_slots() {
        let source = r#"<P><Binder><BinderItem UUID="A"><Children><BinderItem UUID="B"><Title>b</Title></BinderItem></Children></BinderItem></Binder></P>"#;
        let out = parse(source).unwrap();

        let ChildrenSlot::Open { at } = out.slots[&NodeId::from("A")] else {
            panic!("expected open slot");
        };
        assert!(source[at..].starts_with("</Children>"));

        let ChildrenSlot::Missing { at } = out.slots[&NodeId::from("B")] else {
            panic!("expected missing slot");
        };
        assert!(source[at..].starts_with("</BinderItem></Children>"));
    }

    #[test]
    fn test_parses_manifest_timestamps() {
        let out = parse(
            r#"<P><Binder><BinderItem UUID="A" Created="2024-03-01 09:30:00 -0500" Modified="garbage"/></Binder></P>"#,
        )
        .unwrap();
        let node = &out.nodes[&NodeId::from("A")];
        assert_eq!(
            node.created.unwrap().to_rfc3339(),
            "2024-03-01T09:30:00-05:00"
        );
        assert!(node.modified.is_none());
    }
}
