use crate::model::NodeRelationAnchorPoint;
use crate::storage::lookup::inbound_edges_of_aggregate;
use crate::storage::{HierarchyFilter, HierarchyRelation};
use crate::types::Result;

use super::events::{NodeAggregateWasRemoved, NodesWereRemovedFromAggregate};
use super::writer::GraphWriter;

impl GraphWriter<'_> {
    pub(super) fn remove_nodes_from_aggregate(&mut self, event: &NodesWereRemovedFromAggregate) -> Result<()> {
        let cs = &event.content_stream_id;
        let dimensions = &event.dimension_space_points;
        self.purge_subtree_restrictions(cs, &event.node_aggregate_id, Some(dimensions))?;
        for edge in inbound_edges_of_aggregate(&*self.tx, cs, &event.node_aggregate_id, Some(dimensions))? {
            self.remove_relation_recursively(edge)?;
        }
        Ok(())
    }

    pub(super) fn remove_node_aggregate(&mut self, event: &NodeAggregateWasRemoved) -> Result<()> {
        let cs = &event.content_stream_id;
        self.purge_subtree_restrictions(cs, &event.node_aggregate_id, None)?;
        for edge in inbound_edges_of_aggregate(&*self.tx, cs, &event.node_aggregate_id, None)? {
            self.remove_relation_recursively(edge)?;
        }
        Ok(())
    }

    /// Deletes `edge` and every edge below its child in the same stream and
    /// dimension point, then deletes the rows left without a parent edge.
    fn remove_relation_recursively(&mut self, edge: HierarchyRelation) -> Result<()> {
        let mut pending = vec![edge];
        let mut touched = Vec::new();
        while let Some(edge) = pending.pop() {
            self.tx.delete_hierarchy(&edge.key())?;
            pending.extend(self.tx.hierarchy(
                &HierarchyFilter::new()
                    .parent(edge.child)
                    .content_stream(&edge.content_stream_id)
                    .dimension_hashes([edge.dimension_space_point_hash()]),
            )?);
            touched.push(edge.child);
        }
        for anchor in touched {
            self.delete_if_orphaned(anchor)?;
        }
        Ok(())
    }

    /// Deletes the row at `anchor` and its references when no edge in any
    /// stream still has it as child.
    pub(super) fn delete_if_orphaned(&mut self, anchor: NodeRelationAnchorPoint) -> Result<bool> {
        let referenced = !self
            .tx
            .hierarchy(&HierarchyFilter::new().child(anchor))?
            .is_empty();
        if referenced {
            return Ok(false);
        }
        self.tx.delete_references(anchor, None)?;
        let deleted = self.tx.delete_node(anchor)?;
        if deleted {
            self.metrics.node_deleted();
        }
        Ok(deleted)
    }
}
