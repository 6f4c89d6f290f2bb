use tracing::debug;

use crate::model::{
    ContentStreamId, DimensionSpacePoint, DimensionSpacePointSet, NodeAggregateId,
    NodeRelationAnchorPoint,
};
use crate::storage::lookup::{inbound_edges_of_aggregate, node_by_origin, node_covering, outbound_edges_of_aggregate};
use crate::storage::{HierarchyFilter, NodeRecord};
use crate::types::{ProjectionError, Result};

use super::writer::GraphWriter;

impl GraphWriter<'_> {
    /// Copies the node at `source_origin` to `origin` and makes the copy the
    /// visible node of the aggregate throughout `coverage`.
    ///
    /// Specialization, generalization and peer variants share this path; the
    /// relationship between the two origins is the event producer's concern.
    pub(super) fn create_variant(
        &mut self,
        cs: &ContentStreamId,
        aggregate: &NodeAggregateId,
        source_origin: &DimensionSpacePoint,
        origin: &DimensionSpacePoint,
        coverage: &DimensionSpacePointSet,
    ) -> Result<()> {
        let source = node_by_origin(&*self.tx, cs, aggregate, source_origin)?.ok_or_else(|| {
            ProjectionError::violation(format!(
                "no node of aggregate {aggregate} originating in {source_origin} in stream {cs}"
            ))
        })?;
        let source_inbound = self
            .tx
            .hierarchy(
                &HierarchyFilter::new()
                    .child(source.anchor)
                    .content_stream(cs)
                    .dimension_hashes([source_origin.hash()]),
            )?
            .into_iter()
            .next();

        let anchor = self.tx.allocate_anchor()?;
        self.tx.insert_node(&NodeRecord {
            anchor,
            origin: origin.clone(),
            ..source.clone()
        })?;

        let mut unassigned = coverage.clone();
        for existing in inbound_edges_of_aggregate(&*self.tx, cs, aggregate, Some(coverage))? {
            let mut updated = existing.clone();
            updated.child = anchor;
            self.rewire(&existing, &updated)?;
            unassigned.remove_hash(existing.dimension_space_point_hash());
        }
        for existing in outbound_edges_of_aggregate(&*self.tx, cs, aggregate, Some(coverage))? {
            let mut updated = existing.clone();
            updated.parent = anchor;
            self.rewire(&existing, &updated)?;
        }

        if unassigned.is_empty() {
            return Ok(());
        }
        let source_inbound = source_inbound.ok_or_else(|| {
            ProjectionError::violation(format!(
                "node {} of aggregate {aggregate} has no parent edge at {source_origin}",
                source.anchor
            ))
        })?;
        let parent_aggregate = if source_inbound.parent.is_root_edge() {
            None
        } else {
            let parent = self.tx.node(source_inbound.parent)?.ok_or_else(|| {
                ProjectionError::violation(format!(
                    "parent row {} of aggregate {aggregate} is missing",
                    source_inbound.parent
                ))
            })?;
            Some(parent.node_aggregate_id)
        };

        for dsp in unassigned.iter() {
            // The parent may itself be varied; resolve it per dimension point.
            let parent_anchor = match &parent_aggregate {
                None => NodeRelationAnchorPoint::ROOT_EDGE,
                Some(parent) => {
                    node_covering(&*self.tx, cs, parent, dsp)?
                        .ok_or_else(|| {
                            ProjectionError::violation(format!(
                                "parent aggregate {parent} does not cover {dsp} in stream {cs}"
                            ))
                        })?
                        .anchor
                }
            };
            self.connect_hierarchy(cs, parent_anchor, anchor, [dsp], None, source_inbound.name.as_ref())?;
        }
        if let Some(parent) = &parent_aggregate {
            self.inherit_restrictions(cs, parent, aggregate, &unassigned)?;
        }
        debug!(
            aggregate = %aggregate,
            origin = %origin,
            new_edges = unassigned.len(),
            "projection.variant.created"
        );
        Ok(())
    }
}
