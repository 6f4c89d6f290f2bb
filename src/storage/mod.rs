//! Storage port and its backends.
//!
//! Rows are plain data ([`NodeRecord`], [`HierarchyRelation`], [`RestrictionEdge`],
//! [`ReferenceRelation`]). Backends implement [`GraphStore`], handing out
//! [`GraphRead`] snapshots and all-or-nothing [`GraphTx`] transactions.

/// Queries composed from the read primitives.
pub mod lookup;

mod memory;
mod options;
mod records;
mod sqlite;
mod store;

pub use memory::MemoryStore;
pub use options::{StoreBackend, StoreOptions};
pub use records::{HierarchyKey, HierarchyRelation, NodeRecord, ReferenceRelation, RestrictionEdge};
pub use sqlite::SqliteStore;
pub use store::{GraphRead, GraphStore, GraphTx, HierarchyFilter, RestrictionFilter};
