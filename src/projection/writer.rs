use tracing::trace;

use crate::storage::GraphTx;
use crate::types::Result;

use super::events::ContentGraphEvent;
use super::metrics::ProjectionMetrics;

/// Applies events to one open transaction.
///
/// The handlers live in sibling modules as further `impl` blocks; every one of
/// them reads and writes only through `tx`, so a failing handler leaves
/// nothing behind once the store rolls the transaction back.
pub(crate) struct GraphWriter<'t> {
    pub(super) tx: &'t mut dyn GraphTx,
    pub(super) metrics: &'t dyn ProjectionMetrics,
}

impl<'t> GraphWriter<'t> {
    pub(crate) fn new(tx: &'t mut dyn GraphTx, metrics: &'t dyn ProjectionMetrics) -> Self {
        Self { tx, metrics }
    }

    pub(crate) fn apply(&mut self, event: &ContentGraphEvent) -> Result<()> {
        trace!(kind = %event.kind(), "projection.writer.dispatch");
        match event {
            ContentGraphEvent::RootNodeAggregateWithNodeWasCreated(e) => self.create_root_node(e),
            ContentGraphEvent::NodeAggregateWithNodeWasCreated(e) => self.create_node(e),
            ContentGraphEvent::NodeAggregateNameWasChanged(e) => self.change_node_name(e),
            ContentGraphEvent::NodePropertiesWereSet(e) => self.set_properties(e),
            ContentGraphEvent::NodeReferencesWereSet(e) => self.set_references(e),
            ContentGraphEvent::NodeWasHidden(e) => self.hide_node(e),
            ContentGraphEvent::NodeWasShown(e) => self.show_node(e),
            ContentGraphEvent::NodeSpecializationVariantWasCreated(e) => self.create_variant(
                &e.content_stream_id,
                &e.node_aggregate_id,
                &e.source_origin,
                &e.specialization_origin,
                &e.specialization_coverage,
            ),
            ContentGraphEvent::NodeGeneralizationVariantWasCreated(e) => self.create_variant(
                &e.content_stream_id,
                &e.node_aggregate_id,
                &e.source_origin,
                &e.generalization_origin,
                &e.generalization_coverage,
            ),
            ContentGraphEvent::NodePeerVariantWasCreated(e) => self.create_variant(
                &e.content_stream_id,
                &e.node_aggregate_id,
                &e.source_origin,
                &e.peer_origin,
                &e.peer_coverage,
            ),
            ContentGraphEvent::NodesWereMoved(e) => self.move_nodes(e),
            ContentGraphEvent::NodesWereRemovedFromAggregate(e) => self.remove_nodes_from_aggregate(e),
            ContentGraphEvent::NodeAggregateWasRemoved(e) => self.remove_node_aggregate(e),
            ContentGraphEvent::ContentStreamWasForked(e) => self.fork_content_stream(e),
            ContentGraphEvent::ContentStreamWasRemoved(e) => self.remove_content_stream(e),
        }
    }
}
