//! Shared error and result types.

use std::io;

use thiserror::Error;

use crate::projection::{ApplySummary, EventKind};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ProjectionError>;

/// Error type for projection and storage operations.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// A referenced node, edge or stream does not exist where it was mandatorily expected.
    #[error("{0} not found")]
    NotFound(String),
    /// An invariant the projector relies on does not hold.
    #[error("consistency violation: {0}")]
    ConsistencyViolation(String),
    /// Rows of one node aggregate disagree on a value that must be unique.
    #[error("node aggregate {aggregate} is ambiguous: {detail}")]
    AmbiguousAggregate {
        /// The aggregate whose rows disagree.
        aggregate: String,
        /// What the rows disagree on.
        detail: String,
    },
    /// A stored row is missing a required field or carries an undecodable value.
    #[error("malformed {table} row: {detail}")]
    MalformedRow {
        /// Logical table the row was read from.
        table: &'static str,
        /// Description of the defect.
        detail: String,
    },
    /// Caller supplied an argument the operation cannot work with.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Failure reported by the SQLite backend.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    /// JSON encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Applying an event failed; the event's effects were rolled back.
    #[error("event {event_id} ({kind}) failed: {source}")]
    Event {
        /// Identifier of the failed event.
        event_id: String,
        /// Kind of the failed event.
        kind: EventKind,
        /// Underlying failure.
        #[source]
        source: Box<ProjectionError>,
    },
    /// A batch stopped at a failing event; `summary` counts the events
    /// committed or skipped before it.
    #[error("batch stopped after {} applied events: {source}", .summary.applied)]
    Batch {
        /// Totals up to the failing event.
        summary: ApplySummary,
        /// The failing event's error.
        #[source]
        source: Box<ProjectionError>,
    },
}

impl ProjectionError {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        ProjectionError::NotFound(what.into())
    }

    pub(crate) fn violation(detail: impl Into<String>) -> Self {
        ProjectionError::ConsistencyViolation(detail.into())
    }

    pub(crate) fn malformed(table: &'static str, detail: impl Into<String>) -> Self {
        ProjectionError::MalformedRow {
            table,
            detail: detail.into(),
        }
    }

    /// Returns the innermost error, unwrapping batch and event context.
    pub fn root_cause(&self) -> &ProjectionError {
        match self {
            ProjectionError::Event { source, .. } | ProjectionError::Batch { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}
