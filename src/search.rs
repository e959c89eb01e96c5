//! Full-text search over document bodies and metadata.

use std::sync::Arc;

use crate::content::ContentStore;
use crate::error::Result;
use crate::index::{PreOrder, ProjectIndex};
use crate::models::{Node, NodeId, SearchField, SearchHit, SearchMatch, SearchOptions};

/// A search over one tree snapshot.
///
/// Nothing is read until the search is iterated. Each call to
/// [`iter`](Self::iter) walks the documents again from the start, so the same
/// `Search` can be consumed several times.
pub struct Search<'a> {
    index: Arc<ProjectIndex>,
    content: &'a ContentStore,
    query: String,
    options: SearchOptions,
    scope: Option<NodeId>,
}

impl<'a> Search<'a> {
    pub fn new(
        index: Arc<ProjectIndex>,
        content: &'a ContentStore,
        query: impl Into<String>,
        options: SearchOptions,
    ) -> Self {
        Self {
            index,
            content,
            query: query.into(),
            options,
            scope: None,
        }
    }

    /// Restrict the walk to `id` and its descendants.
    pub fn within(mut self, id: NodeId) -> Self {
        self.scope = Some(id);
        self
    }

    pub fn iter(&self) -> SearchIter<'_> {
        let walk = if self.query.is_empty() {
            None
        } else {
            Some(match &self.scope {
                Some(id) => self.index.walk_from(id.as_str()),
                None => self.index.walk(),
            })
        };
        SearchIter { search: self, walk }
    }

    fn matches_in(&self, node: &Node) -> Result<Vec<SearchMatch>> {
        let mut matches = Vec::new();
        for field in SearchField::ALL {
            let text = match field.metadata_kind() {
                None => self.content.read_body(&node.id)?,
                Some(kind) => self.content.read_metadata_text(&node.id, kind)?,
            };
            matches.extend(
                find_matches(&text, &self.query, &self.options)
                    .into_iter()
                    .map(|(offset, context)| SearchMatch {
                        field,
                        offset,
                        context,
                    }),
            );
        }
        Ok(matches)
    }
}

impl<'s, 'a> IntoIterator for &'s Search<'a> {
    type Item = Result<SearchHit>;
    type IntoIter = SearchIter<'s>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One pass over a [`Search`]. A document that cannot be read yields an
/// `Err` item; iteration continues with the next document.
pub struct SearchIter<'s> {
    search: &'s Search<'s>,
    walk: Option<PreOrder<'s>>,
}

impl<'s> Iterator for SearchIter<'s> {
    type Item = Result<SearchHit>;

    fn next(&mut self) -> Option<Self::Item> {
        let walk = self.walk.as_mut()?;
        for node in walk.by_ref() {
            if !node.kind.is_document() {
                continue;
            }
            match self.search.matches_in(node) {
                Ok(matches) if matches.is_empty() => continue,
                Ok(matches) => {
                    return Some(Ok(SearchHit {
                        node: node.clone(),
                        matches,
                    }))
                }
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

/// Non-overlapping occurrences of `query` in `text` as `(byte offset, context)`.
///
/// Offsets always point into `text` itself, also when case folding changes the
/// byte length of a character.
pub fn find_matches(text: &str, query: &str, options: &SearchOptions) -> Vec<(usize, String)> {
    if query.is_empty() || text.is_empty() {
        return Vec::new();
    }

    let spans: Vec<(usize, usize)> = if options.case_sensitive {
        text.match_indices(query)
            .map(|(start, m)| (start, start + m.len()))
            .collect()
    } else {
        folded_matches(text, query)
    };

    spans
        .into_iter()
        .map(|(start, end)| (start, context(text, start, end, options.context_chars)))
        .collect()
}

fn folded_matches(text: &str, query: &str) -> Vec<(usize, usize)> {
    let needle: String = query.chars().flat_map(char::to_lowercase).collect();

    // For every byte of the folded text, the span of the original char it came from.
    let mut folded = String::with_capacity(text.len());
    let mut origin: Vec<(usize, usize)> = Vec::with_capacity(text.len());
    for (start, c) in text.char_indices() {
        let end = start + c.len_utf8();
        for lower in c.to_lowercase() {
            folded.push(lower);
            origin.extend(std::iter::repeat((start, end)).take(lower.len_utf8()));
        }
    }

    let mut spans = Vec::new();
    let mut last_end = 0;
    for (at, m) in folded.match_indices(needle.as_str()) {
        let start = origin[at].0;
        let end = origin[at + m.len() - 1].1;
        if start < last_end {
            continue;
        }
        spans.push((start, end));
        last_end = end;
    }
    spans
}

/// Up to `radius` chars on each side of the match, whitespace runs collapsed.
fn context(text: &str, start: usize, end: usize, radius: usize) -> String {
    let lo = text[..start]
        .char_indices()
        .rev()
        .take(radius)
        .last()
        .map_or(start, |(i, _)| i);
    let hi = text[end..]
        .char_indices()
        .nth(radius)
        .map_or(text.len(), |(i, _)| end + i);
    text[lo..hi].split_whitespace().collect::<Vec<_>>().join(" ")
}
