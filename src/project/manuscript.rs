use serde::{Deserialize, Serialize};

use super::ProjectHandle;
use crate::error::Result;
use crate::models::NodeId;

/// How [`ProjectHandle::manuscript_text`] assembles the text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManuscriptOptions {
    /// Emit Markdown headings for folders and documents.
    pub include_titles: bool,
    /// Assemble only this subtree (a chapter) instead of the whole draft.
    #[serde(default)]
    pub scope: Option<NodeId>,
}

impl Default for ManuscriptOptions {
    fn default() -> Self {
        Self {
            include_titles: true,
            scope: None,
        }
    }
}

const MAX_HEADING: usize = 4;

impl ProjectHandle {
    /// Bodies of the included documents in compile order, separated by blank lines.
    ///
    /// With titles, each document gets a `###` heading and each folder a heading
    /// as deep as it sits below the draft (at most four `#`). A scoped chapter
    /// gets a `#` heading of its own and its folders start one level lower.
    /// Documents with an empty body are left out.
    pub fn manuscript_text(&self, options: &ManuscriptOptions) -> Result<String> {
        let index = self.index();
        let base = match &options.scope {
            Some(id) => index.node(id.as_str())?,
            None => match index.draft_folder() {
                Some(draft) => draft,
                None => return Ok(String::new()),
            },
        };
        let base_depth = index.depth(base.id.as_str());
        let offset = usize::from(options.scope.is_some());

        let mut parts = Vec::new();
        if options.include_titles && options.scope.is_some() {
            parts.push(format!("# {}", base.title));
        }

        for node in index.walk_from(base.id.as_str()).skip(1) {
            if node.kind.is_folder() {
                if options.include_titles {
                    let level = (index.depth(node.id.as_str()) - base_depth + offset).min(MAX_HEADING);
                    parts.push(format!("{} {}", "#".repeat(level), node.title));
                }
                continue;
            }
            if !(node.kind.is_document() && node.include_in_compile) {
                continue;
            }

            let body = self.content.read_body(&node.id)?;
            if body.trim().is_empty() {
                continue;
            }
            if options.include_titles {
                parts.push(format!("### {}", node.title));
            }
            parts.push(body.trim_end().to_string());
        }

        Ok(parts.join("\n\n"))
    }
}
