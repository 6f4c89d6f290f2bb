use tracing::debug;

use crate::model::{ContentStreamId, DimensionSpacePoint, DimensionSpacePointSet, NodeAggregateId, NodeRelationAnchorPoint};
use crate::storage::lookup::{node_by_origin, node_covering};
use crate::storage::{HierarchyFilter, NodeRecord};
use crate::types::{ProjectionError, Result};

use super::events::NodesWereMoved;
use super::writer::GraphWriter;

impl GraphWriter<'_> {
    /// Row of `aggregate` by its origin when one is given, else the row covering `dsp`.
    fn resolve_node(
        &self,
        cs: &ContentStreamId,
        aggregate: &NodeAggregateId,
        origin: Option<&DimensionSpacePoint>,
        dsp: &DimensionSpacePoint,
    ) -> Result<Option<NodeRecord>> {
        match origin {
            Some(origin) => node_by_origin(&*self.tx, cs, aggregate, origin),
            None => node_covering(&*self.tx, cs, aggregate, dsp),
        }
    }

    pub(super) fn move_nodes(&mut self, event: &NodesWereMoved) -> Result<()> {
        let cs = &event.content_stream_id;
        let aggregate = &event.node_aggregate_id;
        for mapping in &event.node_move_mappings {
            let moved = node_by_origin(&*self.tx, cs, aggregate, &mapping.moved_node_origin)?
                .ok_or_else(|| {
                    ProjectionError::violation(format!(
                        "no node of aggregate {aggregate} originating in {} in stream {cs}",
                        mapping.moved_node_origin
                    ))
                })?;
            let inbound: Vec<_> = self
                .tx
                .hierarchy(&HierarchyFilter::new().child(moved.anchor).content_stream(cs))?
                .into_iter()
                .filter(|edge| {
                    mapping.relation_dimension_space_points.is_empty()
                        || mapping
                            .relation_dimension_space_points
                            .contains_hash(edge.dimension_space_point_hash())
                })
                .collect();

            let mut moved_dimensions = DimensionSpacePointSet::default();
            for edge in inbound {
                let dsp = edge.dimension_space_point.clone();
                let succeeding = match &event.new_succeeding_sibling_node_aggregate_id {
                    Some(sibling) => self
                        .resolve_node(cs, sibling, mapping.new_succeeding_sibling_origin.as_ref(), &dsp)?
                        .map(|node| node.anchor),
                    None => None,
                };
                let parent: NodeRelationAnchorPoint = match &event.new_parent_node_aggregate_id {
                    Some(parent) => {
                        self.resolve_node(cs, parent, mapping.new_parent_node_origin.as_ref(), &dsp)?
                            .ok_or_else(|| {
                                ProjectionError::violation(format!(
                                    "new parent {parent} of {aggregate} not found at {dsp} in stream {cs}"
                                ))
                            })?
                            .anchor
                    }
                    None => edge.parent,
                };
                let position = self.relation_position(parent, cs, &dsp, succeeding, Some(moved.anchor))?;
                let mut updated = edge.clone();
                updated.parent = parent;
                updated.position = position;
                self.rewire(&edge, &updated)?;
                moved_dimensions.insert(dsp);
            }

            if mapping.relation_dimension_space_points.len() > moved_dimensions.len() {
                let missing = mapping.relation_dimension_space_points.difference(&moved_dimensions);
                return Err(ProjectionError::violation(format!(
                    "node {} of aggregate {aggregate} has no parent edge at {} dimension point(s) to move",
                    moved.anchor,
                    missing.len()
                )));
            }

            if let Some(parent) = &event.new_parent_node_aggregate_id {
                self.rederive_moved_restrictions(cs, aggregate, parent, &moved_dimensions)?;
            }
            debug!(
                aggregate = %aggregate,
                origin = %mapping.moved_node_origin,
                edges = moved_dimensions.len(),
                reparented = event.new_parent_node_aggregate_id.is_some(),
                "projection.move.applied"
            );
        }
        Ok(())
    }
}
