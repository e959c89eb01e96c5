//! Word counts with a bottom-up memo.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::content::ContentStore;
use crate::error::Result;
use crate::index::ProjectIndex;
use crate::models::{NodeId, WordCountEntry};

/// Number of whitespace-separated tokens.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

#[derive(Debug, Default)]
struct Memo {
    /// Bumped on every invalidation; results computed under an older
    /// generation are discarded instead of stored.
    generation: u64,
    totals: HashMap<NodeId, usize>,
}

/// Memoized aggregated word counts.
///
/// A node's aggregated count is its own body count (documents only) plus the
/// aggregated counts of its children. Bodies are read without holding the memo
/// lock, so counting never blocks writers.
#[derive(Debug, Default)]
pub struct WordCounter {
    memo: Mutex<Memo>,
}

impl WordCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Words in the node's own body. Non-documents have none.
    pub fn own(&self, index: &ProjectIndex, content: &ContentStore, id: &NodeId) -> Result<usize> {
        let node = index.node(id.as_str())?;
        if !node.kind.is_document() {
            return Ok(0);
        }
        Ok(count_words(&content.read_body(id)?))
    }

    /// Own words for documents, aggregated words for folders and other items.
    pub fn count(&self, index: &ProjectIndex, content: &ContentStore, id: &NodeId) -> Result<usize> {
        if index.node(id.as_str())?.kind.is_document() {
            self.own(index, content, id)
        } else {
            self.aggregated(index, content, id)
        }
    }

    pub fn aggregated(
        &self,
        index: &ProjectIndex,
        content: &ContentStore,
        id: &NodeId,
    ) -> Result<usize> {
        let generation = {
            let memo = self.memo.lock().expect("word count lock poisoned");
            if let Some(total) = memo.totals.get(id) {
                return Ok(*total);
            }
            memo.generation
        };

        let mut fresh = HashMap::new();
        let total = self.compute(index, content, id, &mut fresh)?;

        let mut memo = self.memo.lock().expect("word count lock poisoned");
        if memo.generation == generation {
            memo.totals.extend(fresh);
        }
        Ok(total)
    }

    fn compute(
        &self,
        index: &ProjectIndex,
        content: &ContentStore,
        id: &NodeId,
        fresh: &mut HashMap<NodeId, usize>,
    ) -> Result<usize> {
        if let Some(total) = self
            .memo
            .lock()
            .expect("word count lock poisoned")
            .totals
            .get(id)
        {
            return Ok(*total);
        }

        let node = index.node(id.as_str())?;
        let mut total = if node.kind.is_document() {
            count_words(&content.read_body(id)?)
        } else {
            0
        };
        for child in &node.children {
            total += self.compute(index, content, child, fresh)?;
        }
        fresh.insert(id.clone(), total);
        Ok(total)
    }

    /// Drop the memo for `id` and every ancestor.
    pub fn invalidate(&self, index: &ProjectIndex, id: &NodeId) {
        let mut memo = self.memo.lock().expect("word count lock poisoned");
        memo.generation += 1;
        memo.totals.remove(id);
        for ancestor in index.ancestors(id.as_str()) {
            memo.totals.remove(&ancestor.id);
        }
    }

    pub fn clear(&self) {
        let mut memo = self.memo.lock().expect("word count lock poisoned");
        memo.generation += 1;
        memo.totals.clear();
    }

    /// Pre-order rows for `id` and everything below it.
    pub fn breakdown(
        &self,
        index: &ProjectIndex,
        content: &ContentStore,
        id: &NodeId,
    ) -> Result<Vec<WordCountEntry>> {
        let base = index.node(id.as_str())?;
        let base_depth = index.depth(base.id.as_str());

        index
            .walk_from(id.as_str())
            .map(|node| {
                Ok(WordCountEntry {
                    id: node.id.clone(),
                    title: node.title.clone(),
                    depth: index.depth(node.id.as_str()) - base_depth,
                    is_folder: node.kind.is_folder(),
                    words: self.count(index, content, &node.id)?,
                })
            })
            .collect()
    }
}
