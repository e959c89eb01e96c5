//! The open project: the handle a caller owns for one package.

mod manuscript;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use uuid::Uuid;

pub use manuscript::ManuscriptOptions;

use crate::config::ProjectConfig;
use crate::content::atomic::write_atomic;
use crate::content::{ContentStore, RichTextCodec, RtfCodec};
use crate::error::{ProjectError, Result};
use crate::guard::LockGuard;
use crate::index::{CompileOrder, ProjectIndex};
use crate::manifest::{self, parse_timestamp, Manifest, MANIFEST_TIME_FORMAT};
use crate::models::{
    BinderTreeNode, MetadataKind, Node, NodeId, NodeKind, Resolution, SearchOptions,
    SnapshotEntry, TitleMatch, WordCountEntry,
};
use crate::search::Search;
use crate::snapshot::{SnapshotManager, MANIFEST_OWNER};
use crate::wordcount::WordCounter;

const DEFAULT_TITLE: &str = "Untitled";

/// An open package.
///
/// Reads run concurrently against an immutable tree snapshot. Mutations are
/// serialized by a write gate (the mutex around the parsed manifest) that
/// spans the lock check, the snapshot, the write and any manifest update.
/// The handle is `Send + Sync`; share it behind an `Arc`.
#[derive(Debug)]
pub struct ProjectHandle {
    root: PathBuf,
    config: ProjectConfig,
    index: RwLock<Arc<ProjectIndex>>,
    manifest: Mutex<Manifest>,
    content: ContentStore,
    guard: LockGuard,
    snapshots: SnapshotManager,
    counter: WordCounter,
}

impl ProjectHandle {
    /// Open the package at `root` with configuration from the environment.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(root, ProjectConfig::from_env())
    }

    pub fn open_with(root: impl AsRef<Path>, config: ProjectConfig) -> Result<Self> {
        Self::with_codec(root, config, Arc::new(RtfCodec))
    }

    /// Open with a custom body codec.
    pub fn with_codec(
        root: impl AsRef<Path>,
        config: ProjectConfig,
        codec: Arc<dyn RichTextCodec>,
    ) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let parsed = manifest::load(&root, &config)?;
        let index = ProjectIndex::build(parsed.nodes, parsed.roots);

        let guard = LockGuard::new(&root, &config);
        let snapshots = SnapshotManager::new(root.join(&config.snapshot_dir));
        let content = ContentStore::new(
            root.join(&config.data_dir),
            codec,
            guard.clone(),
            snapshots.clone(),
        );

        let documents = index.walk().filter(|n| n.kind.is_document()).count();
        tracing::info!(
            "Opened project {} ({} items, {} documents)",
            parsed.manifest.path().display(),
            index.len(),
            documents
        );
        if guard.is_locked() {
            tracing::warn!(
                "Project {} is locked by another application; writes will be refused",
                root.display()
            );
        }

        Ok(Self {
            root,
            config,
            index: RwLock::new(Arc::new(index)),
            manifest: Mutex::new(parsed.manifest),
            content,
            guard,
            snapshots,
            counter: WordCounter::new(),
        })
    }

    /// Re-read the manifest from disk and drop every cache.
    pub fn reload(&self) -> Result<()> {
        let mut manifest = self.manifest.lock().expect("write gate lock poisoned");
        let parsed = manifest::load(&self.root, &self.config)?;
        let index = ProjectIndex::build(parsed.nodes, parsed.roots);

        *manifest = parsed.manifest;
        *self.index.write().expect("index lock poisoned") = Arc::new(index);
        self.content.clear_cache();
        self.counter.clear();

        tracing::info!("Reloaded project {}", self.root.display());
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// The current tree snapshot.
    pub fn index(&self) -> Arc<ProjectIndex> {
        self.index.read().expect("index lock poisoned").clone()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.manifest
            .lock()
            .expect("write gate lock poisoned")
            .path()
            .to_path_buf()
    }

    pub fn resolve(&self, identifier: &str) -> Result<Resolution> {
        self.index().resolve(identifier)
    }

    pub fn find_by_title(&self, query: &str, mode: TitleMatch) -> Vec<Node> {
        self.index()
            .find_by_title(query, mode)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn node(&self, id: &str) -> Result<Node> {
        self.index().node(id).cloned()
    }

    /// Materialized path of a node.
    pub fn path_of(&self, id: &str) -> Result<String> {
        let index = self.index();
        index
            .path(id)
            .map(str::to_string)
            .ok_or_else(|| ProjectError::NotFound(id.to_string()))
    }

    pub fn compile_order(&self) -> CompileOrder {
        CompileOrder::new(self.index())
    }

    pub fn binder_tree(&self) -> Vec<BinderTreeNode> {
        self.index().binder_tree()
    }

    pub fn read_body(&self, id: &str) -> Result<String> {
        let index = self.index();
        let node = index.node(id)?;
        self.content.read_body(&node.id)
    }

    /// Replace a document body. Refused while the package is locked.
    pub fn write_body(&self, id: &str, text: &str) -> Result<()> {
        let _gate = self.manifest.lock().expect("write gate lock poisoned");
        let index = self.index();
        let node = index.node(id)?;

        self.content.write_body(&node.id, text)?;
        self.counter.invalidate(&index, &node.id);
        Ok(())
    }

    pub fn read_metadata_text(&self, id: &str, kind: MetadataKind) -> Result<String> {
        let index = self.index();
        let node = index.node(id)?;
        self.content.read_metadata_text(&node.id, kind)
    }

    /// Replace a synopsis or notes file. Refused while the package is locked.
    pub fn write_metadata_text(&self, id: &str, kind: MetadataKind, text: &str) -> Result<()> {
        let _gate = self.manifest.lock().expect("write gate lock poisoned");
        let index = self.index();
        let node = index.node(id)?;

        self.content.write_metadata_text(&node.id, kind, text)?;
        Ok(())
    }

    /// Append a new, empty document as the last child of `parent_id`.
    ///
    /// The manifest is rewritten by splicing the new item into the parent's
    /// children; every other byte of the file stays as it was.
    pub fn create_node(&self, parent_id: &str, title: &str) -> Result<Node> {
        let mut manifest = self.manifest.lock().expect("write gate lock poisoned");
        self.guard.ensure_unlocked()?;

        let index = self.index();
        let parent = index.node(parent_id)?.id.clone();
        manifest.ensure_current()?;

        let title = match title.trim() {
            "" => DEFAULT_TITLE,
            trimmed => trimmed,
        };
        // Whole seconds, exactly as the manifest will store them.
        let now = parse_timestamp(&Utc::now().format(MANIFEST_TIME_FORMAT).to_string());
        let node = Node {
            id: self.allocate_id(&index),
            title: title.to_string(),
            kind: NodeKind::Document,
            parent: Some(parent.clone()),
            children: Vec::new(),
            include_in_compile: true,
            created: now,
            modified: now,
        };

        let updated = manifest.with_child(&parent, &node).ok_or_else(|| {
            ProjectError::parse(
                manifest.path(),
                format!("no insertion point recorded for {}", parent),
            )
        })?;
        let next = Arc::new(index.with_child(&parent, node.clone())?);

        self.guard.ensure_unlocked()?;
        self.snapshots.snapshot(MANIFEST_OWNER, manifest.path())?;

        self.guard.ensure_unlocked()?;
        self.content.create_sidecars(&node.id)?;

        let written = write_atomic(manifest.path(), updated.source().as_bytes(), || {
            self.guard.ensure_unlocked()
        });
        if let Err(e) = written {
            self.content.remove_sidecars(&node.id);
            return Err(e);
        }

        *manifest = updated;
        *self.index.write().expect("index lock poisoned") = next.clone();
        self.counter.invalidate(&next, &parent);

        tracing::info!("Created {} \"{}\" under {}", node.id, node.title, parent);
        Ok(node)
    }

    /// A fresh upper-case UUID not used by any node or sidecar directory.
    fn allocate_id(&self, index: &ProjectIndex) -> NodeId {
        loop {
            let id = NodeId::new(Uuid::new_v4().to_string().to_uppercase());
            if !index.contains(id.as_str()) && !self.content.node_dir(&id).exists() {
                return id;
            }
        }
    }

    /// Case-insensitive search with the configured context radius.
    pub fn search(&self, query: &str) -> Search<'_> {
        self.search_with(
            query,
            SearchOptions {
                case_sensitive: false,
                context_chars: self.config.search_context_chars,
            },
        )
    }

    pub fn search_with(&self, query: &str, options: SearchOptions) -> Search<'_> {
        Search::new(self.index(), &self.content, query, options)
    }

    /// Search only `scope_id` and its descendants.
    pub fn search_in(&self, scope_id: &str, query: &str) -> Result<Search<'_>> {
        let index = self.index();
        let scope = index.node(scope_id)?.id.clone();
        Ok(self.search(query).within(scope))
    }

    /// Own words for a document, aggregated words for anything else.
    pub fn word_count(&self, id: &str) -> Result<usize> {
        let index = self.index();
        let node = index.node(id)?;
        self.counter.count(&index, &self.content, &node.id)
    }

    /// Own body words plus everything below the node.
    pub fn aggregated_word_count(&self, id: &str) -> Result<usize> {
        let index = self.index();
        let node = index.node(id)?;
        self.counter.aggregated(&index, &self.content, &node.id)
    }

    pub fn word_count_breakdown(&self, id: &str) -> Result<Vec<WordCountEntry>> {
        let index = self.index();
        let node = index.node(id)?;
        self.counter.breakdown(&index, &self.content, &node.id)
    }

    pub fn is_locked(&self) -> bool {
        self.guard.is_locked()
    }

    /// Snapshots taken for a node id, or for [`MANIFEST_OWNER`], oldest first.
    pub fn snapshots(&self, owner: &str) -> Result<Vec<SnapshotEntry>> {
        self.snapshots.list(owner)
    }
}
