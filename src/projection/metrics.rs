use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::EventKind;

/// Trait for tracking projector activity.
///
/// Implementations collect statistics about applied events and the store
/// mutations they cause. All hooks are called from inside the event's
/// transaction except the per-event outcome hooks, which run after commit or
/// rollback.
pub trait ProjectionMetrics: Send + Sync {
    /// Records a committed event.
    fn event_applied(&self, kind: EventKind);

    /// Records an event skipped because it was already processed.
    fn event_skipped(&self, kind: EventKind);

    /// Records an event whose transaction was rolled back.
    fn event_failed(&self, kind: EventKind);

    /// Records a node mutation.
    ///
    /// # Parameters
    /// * `copied` - Whether the row was shared and had to be copied (`true`) or was
    ///   updated in place (`false`).
    fn node_written(&self, copied: bool);

    /// Records a full rebalance of one sibling list.
    fn siblings_rebalanced(&self);

    /// Records restriction edges inserted.
    fn restriction_edges_added(&self, count: usize);

    /// Records restriction edges deleted.
    fn restriction_edges_removed(&self, count: usize);

    /// Records a node row deleted because no edge referenced it any more.
    fn node_deleted(&self);
}

/// A no-op implementation of [`ProjectionMetrics`] that discards all recorded metrics.
#[derive(Default)]
pub struct NoopMetrics;

impl ProjectionMetrics for NoopMetrics {
    fn event_applied(&self, _kind: EventKind) {}
    fn event_skipped(&self, _kind: EventKind) {}
    fn event_failed(&self, _kind: EventKind) {}
    fn node_written(&self, _copied: bool) {}
    fn siblings_rebalanced(&self) {}
    fn restriction_edges_added(&self, _count: usize) {}
    fn restriction_edges_removed(&self, _count: usize) {}
    fn node_deleted(&self) {}
}

/// A thread-safe counter-based implementation of [`ProjectionMetrics`].
#[derive(Default)]
pub struct CounterMetrics {
    /// Number of committed events.
    pub events_applied: AtomicU64,

    /// Number of events skipped as already processed.
    pub events_skipped: AtomicU64,

    /// Number of events rolled back.
    pub events_failed: AtomicU64,

    /// Number of node rows updated in place.
    pub nodes_updated_in_place: AtomicU64,

    /// Number of node rows copied for copy-on-write isolation.
    pub nodes_copied: AtomicU64,

    /// Number of sibling list rebalances.
    pub rebalances: AtomicU64,

    /// Number of restriction edges inserted.
    pub restriction_edges_added: AtomicU64,

    /// Number of restriction edges deleted.
    pub restriction_edges_removed: AtomicU64,

    /// Number of orphaned node rows deleted.
    pub nodes_deleted: AtomicU64,
}

impl ProjectionMetrics for CounterMetrics {
    fn event_applied(&self, _kind: EventKind) {
        self.events_applied.fetch_add(1, Ordering::Relaxed);
    }

    fn event_skipped(&self, _kind: EventKind) {
        self.events_skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn event_failed(&self, _kind: EventKind) {
        self.events_failed.fetch_add(1, Ordering::Relaxed);
    }

    fn node_written(&self, copied: bool) {
        if copied {
            self.nodes_copied.fetch_add(1, Ordering::Relaxed);
        } else {
            self.nodes_updated_in_place.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn siblings_rebalanced(&self) {
        self.rebalances.fetch_add(1, Ordering::Relaxed);
    }

    fn restriction_edges_added(&self, count: usize) {
        self.restriction_edges_added
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    fn restriction_edges_removed(&self, count: usize) {
        self.restriction_edges_removed
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    fn node_deleted(&self) {
        self.nodes_deleted.fetch_add(1, Ordering::Relaxed);
    }
}

/// Returns the default metrics implementation wrapped in an [`Arc`].
pub fn default_metrics() -> Arc<dyn ProjectionMetrics> {
    Arc::new(NoopMetrics)
}
