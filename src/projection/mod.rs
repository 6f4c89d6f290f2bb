//! Event application.
//!
//! [`GraphProjector`] applies one [`EventEnvelope`] at a time. Each event runs
//! inside a single store transaction together with its processed marker, so a
//! failed event leaves no trace and a committed one is never applied twice.

mod events;
mod hierarchy;
mod metrics;
mod moves;
mod nodes;
mod removal;
mod restriction;
mod streams;
mod variants;
mod writer;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::graph::ContentGraph;
use crate::storage::GraphStore;
use crate::types::{ProjectionError, Result};

pub use events::{
    idempotency_key, ContentGraphEvent, ContentStreamWasForked, ContentStreamWasRemoved,
    EventEnvelope, EventKind, NodeAggregateNameWasChanged, NodeAggregateWasRemoved,
    NodeAggregateWithNodeWasCreated, NodeGeneralizationVariantWasCreated, NodeMoveMapping,
    NodePeerVariantWasCreated, NodePropertiesWereSet, NodeReferencesWereSet,
    NodeSpecializationVariantWasCreated, NodeWasHidden, NodeWasShown, NodesWereMoved,
    NodesWereRemovedFromAggregate, RootNodeAggregateWithNodeWasCreated,
};
pub use hierarchy::RELATION_DEFAULT_OFFSET;
pub use metrics::{default_metrics, CounterMetrics, NoopMetrics, ProjectionMetrics};

use writer::GraphWriter;

/// Receives the "projection updated" signal after each committed event.
pub trait ProjectionListener: Send + Sync {
    /// Called once the event's transaction has committed.
    fn projection_updated(&self, event_id: &str, kind: EventKind);
}

/// Result of applying one event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The event's effects were committed.
    Applied,
    /// The event had been applied before; nothing changed.
    AlreadyProcessed,
}

/// Totals of a batch replay.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    /// Events committed.
    pub applied: usize,
    /// Events skipped as already processed.
    pub already_processed: usize,
}

/// Configuration options for a [`GraphProjector`].
#[derive(Clone)]
pub struct ProjectorOptions {
    /// Metrics sink.
    pub metrics: Arc<dyn ProjectionMetrics>,
}

impl Default for ProjectorOptions {
    fn default() -> Self {
        Self {
            metrics: default_metrics(),
        }
    }
}

impl ProjectorOptions {
    /// Sets the metrics sink.
    pub fn metrics(mut self, metrics: Arc<dyn ProjectionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }
}

/// Applies domain events to a graph held in `S`.
pub struct GraphProjector<S: GraphStore> {
    store: S,
    metrics: Arc<dyn ProjectionMetrics>,
    listeners: Vec<Arc<dyn ProjectionListener>>,
}

impl<S: GraphStore> GraphProjector<S> {
    /// Creates a projector with default options.
    pub fn new(store: S) -> Self {
        Self::with_options(store, ProjectorOptions::default())
    }

    /// Creates a projector with the given options.
    pub fn with_options(store: S, options: ProjectorOptions) -> Self {
        Self {
            store,
            metrics: options.metrics,
            listeners: Vec::new(),
        }
    }

    /// Registers a listener for committed events.
    pub fn subscribe(&mut self, listener: Arc<dyn ProjectionListener>) {
        self.listeners.push(listener);
    }

    /// Applies one event.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Event`] carrying the event id and kind when the
    /// event fails; its effects are rolled back and it is not marked processed.
    pub fn apply(&mut self, envelope: &EventEnvelope) -> Result<ApplyOutcome> {
        let kind = envelope.event.kind();
        let span = info_span!("projection.apply", event_id = %envelope.event_id, kind = %kind);
        let _entered = span.enter();

        let key = envelope.idempotency_key();
        let metrics: &dyn ProjectionMetrics = &*self.metrics;
        let result = self.store.write(|tx| {
            if tx.is_processed(&key)? {
                return Ok(ApplyOutcome::AlreadyProcessed);
            }
            GraphWriter::new(&mut *tx, metrics).apply(&envelope.event)?;
            tx.mark_processed(&key)?;
            Ok(ApplyOutcome::Applied)
        });

        match result {
            Ok(ApplyOutcome::Applied) => {
                metrics.event_applied(kind);
                debug!("projection.apply.committed");
                for listener in &self.listeners {
                    listener.projection_updated(&envelope.event_id, kind);
                }
                Ok(ApplyOutcome::Applied)
            }
            Ok(ApplyOutcome::AlreadyProcessed) => {
                metrics.event_skipped(kind);
                debug!("projection.apply.already_processed");
                Ok(ApplyOutcome::AlreadyProcessed)
            }
            Err(err) => {
                metrics.event_failed(kind);
                warn!(error = %err, "projection.apply.failed");
                Err(ProjectionError::Event {
                    event_id: envelope.event_id.clone(),
                    kind,
                    source: Box::new(err),
                })
            }
        }
    }

    /// Applies events in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Batch`] carrying the totals reached before the
    /// failing event. Events committed before it stay committed.
    pub fn apply_all<'e>(
        &mut self,
        envelopes: impl IntoIterator<Item = &'e EventEnvelope>,
    ) -> Result<ApplySummary> {
        let mut summary = ApplySummary::default();
        for envelope in envelopes {
            match self.apply(envelope) {
                Ok(ApplyOutcome::Applied) => summary.applied += 1,
                Ok(ApplyOutcome::AlreadyProcessed) => summary.already_processed += 1,
                Err(err) => {
                    return Err(ProjectionError::Batch {
                        summary,
                        source: Box::new(err),
                    })
                }
            }
        }
        Ok(summary)
    }

    /// Whether every event in `envelopes` was already applied; true for none.
    pub fn has_processed(&self, envelopes: &[EventEnvelope]) -> Result<bool> {
        self.store.read(|read| {
            for envelope in envelopes {
                if !read.is_processed(&envelope.idempotency_key())? {
                    return Ok(false);
                }
            }
            Ok(true)
        })
    }

    /// Clears all projected rows and processed markers.
    pub fn reset(&mut self) -> Result<()> {
        self.store.write(|tx| tx.truncate())?;
        info!("projection.reset");
        Ok(())
    }

    /// Whether no node rows exist.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.store.read(|read| read.count_nodes())? == 0)
    }

    /// Read-side view over the projected graph.
    pub fn graph(&self) -> ContentGraph<'_, S> {
        ContentGraph::new(&self.store)
    }

    /// Underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consumes the projector, returning its store.
    pub fn into_store(self) -> S {
        self.store
    }
}
