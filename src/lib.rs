//! Corruption-safe project model for directory-based manuscript packages.
//!
//! A package is a directory with an XML manifest describing a binder tree of
//! folders and documents, plus per-document sidecar files:
//!
//! ```text
//! <root>/
//!   manifest.xml            (or <Name>.scrivx)
//!   Files/Data/{id}/body.rtf, synopsis.txt, notes.txt
//!   Snapshots/{id}/...      append-only backups
//!   user.lock               present while another application owns the package
//! ```
//!
//! [`ProjectHandle`] is the entry point. It parses the manifest once, answers
//! lookups from an immutable index, and funnels every write through a lock
//! check, a snapshot and an atomic rename.

pub mod config;
pub mod content;
pub mod discover;
pub mod error;
pub mod guard;
pub mod index;
pub mod manifest;
pub mod models;
pub mod project;
pub mod render;
pub mod search;
pub mod snapshot;
pub mod wordcount;

pub use config::ProjectConfig;
pub use content::{CodecError, RichTextCodec, RtfCodec};
pub use discover::{discover, discover_default};
pub use error::{ProjectError, Result};
pub use index::{CompileOrder, ProjectIndex};
pub use project::{ManuscriptOptions, ProjectHandle};
pub use render::render_binder;
pub use search::Search;
