//! Domain models for manuscript packages.
//!
//! # Core Concepts
//!
//! - [`Node`]: one folder or document in the binder, addressed by a [`NodeId`].
//!   Nodes form an ordered tree; child order is the user-visible order.
//! - [`Resolution`]: the tagged result of looking a node up by id, path or title.
//! - [`SearchHit`]: a document that matched a full-text query.
//! - [`SnapshotEntry`]: an append-only backup taken before a write.
//!
//! Everything here derives `serde` so a transport layer can hand it out as JSON.

mod count;
mod node;
mod resolution;
mod search;
mod snapshot;

pub use count::*;
pub use node::*;
pub use resolution::*;
pub use search::*;
pub use snapshot::*;
