//! Event-driven projection of a branchable, multi-dimensional content tree.
//!
//! [`projection::GraphProjector`] applies [`projection::ContentGraphEvent`]s to a
//! [`storage::GraphStore`] one transaction at a time. [`graph::ContentGraph`]
//! answers queries over the result and [`admin`] checks its integrity.

#![warn(missing_docs)]

pub mod admin;
pub mod config;
pub mod graph;
pub mod model;
pub mod projection;
pub mod schema;
pub mod storage;
pub mod types;

pub use graph::{ContentGraph, NodeAggregate, NodeView, ReferenceView, Visibility};
pub use projection::{
    ApplyOutcome, ApplySummary, ContentGraphEvent, EventEnvelope, EventKind, GraphProjector,
    ProjectorOptions,
};
pub use storage::{GraphStore, MemoryStore, SqliteStore, StoreBackend, StoreOptions};
pub use types::{ProjectionError, Result};
