#![forbid(unsafe_code)]

//! Administration utilities for a projected graph.
//!
//! Everything here works against any [`GraphStore`](crate::storage::GraphStore)
//! and only reads; use the projector to change state.

mod stats;
mod verify;

/// Row counts per table and per content stream.
pub use stats::{stats, ContentStreamStats, StatsReport};

/// Structural integrity checks.
///
/// Reports dangling edges, multi-parent children, cycles, duplicate sibling
/// positions, uncovered restriction edges and orphaned rows.
pub use verify::{verify, VerifyCounts, VerifyFinding, VerifyLevel, VerifyReport, VerifySeverity};
