use tracing::debug;

use crate::model::{
    ContentStreamId, DimensionSpacePoint, NodeAggregateId, NodeRelationAnchorPoint,
};
use crate::storage::lookup::{
    content_streams_containing, inbound_edges_of_aggregate, node_by_origin, node_covering,
    outbound_edges_of_aggregate,
};
use crate::storage::{HierarchyFilter, NodeRecord, ReferenceRelation};
use crate::types::{ProjectionError, Result};

use super::events::{
    NodeAggregateNameWasChanged, NodeAggregateWithNodeWasCreated, NodePropertiesWereSet,
    NodeReferencesWereSet, RootNodeAggregateWithNodeWasCreated,
};
use super::writer::GraphWriter;

impl GraphWriter<'_> {
    pub(super) fn create_root_node(&mut self, event: &RootNodeAggregateWithNodeWasCreated) -> Result<()> {
        let anchor = self.tx.allocate_anchor()?;
        self.tx.insert_node(&NodeRecord {
            anchor,
            node_aggregate_id: event.node_aggregate_id.clone(),
            origin: DimensionSpacePoint::empty(),
            properties: Default::default(),
            node_type_name: event.node_type_name.clone(),
            classification: event.node_aggregate_classification,
            node_name: None,
        })?;
        self.connect_hierarchy(
            &event.content_stream_id,
            NodeRelationAnchorPoint::ROOT_EDGE,
            anchor,
            event.visible_in_dimension_space_points.iter(),
            None,
            None,
        )
    }

    pub(super) fn create_node(&mut self, event: &NodeAggregateWithNodeWasCreated) -> Result<()> {
        let cs = &event.content_stream_id;
        let visible = &event.visible_in_dimension_space_points;
        let anchor = self.tx.allocate_anchor()?;

        // Earlier origins of this aggregate may already cover some of the points.
        let mut missing = visible.clone();
        for existing in inbound_edges_of_aggregate(&*self.tx, cs, &event.node_aggregate_id, Some(visible))? {
            let mut updated = existing.clone();
            updated.child = anchor;
            self.rewire(&existing, &updated)?;
            missing.remove_hash(existing.dimension_space_point_hash());
        }

        for dsp in missing.iter() {
            let Some(parent) = node_covering(&*self.tx, cs, &event.parent_node_aggregate_id, dsp)? else {
                debug!(
                    parent = %event.parent_node_aggregate_id,
                    dimension = %dsp,
                    "projection.create.parent_not_covered"
                );
                continue;
            };
            let succeeding = match &event.succeeding_sibling_node_aggregate_id {
                Some(sibling) => node_covering(&*self.tx, cs, sibling, dsp)?.map(|n| n.anchor),
                None => None,
            };
            self.connect_hierarchy(
                cs,
                parent.anchor,
                anchor,
                [dsp],
                succeeding,
                event.node_name.as_ref(),
            )?;
        }

        for existing in outbound_edges_of_aggregate(&*self.tx, cs, &event.node_aggregate_id, Some(visible))? {
            let mut updated = existing.clone();
            updated.parent = anchor;
            self.rewire(&existing, &updated)?;
        }

        self.tx.insert_node(&NodeRecord {
            anchor,
            node_aggregate_id: event.node_aggregate_id.clone(),
            origin: event.origin_dimension_space_point.clone(),
            properties: event.initial_property_values.clone(),
            node_type_name: event.node_type_name.clone(),
            classification: event.node_aggregate_classification,
            node_name: event.node_name.clone(),
        })?;

        self.inherit_restrictions(cs, &event.parent_node_aggregate_id, &event.node_aggregate_id, visible)
    }

    pub(super) fn change_node_name(&mut self, event: &NodeAggregateNameWasChanged) -> Result<()> {
        for existing in inbound_edges_of_aggregate(&*self.tx, &event.content_stream_id, &event.node_aggregate_id, None)? {
            let mut updated = existing.clone();
            updated.name = Some(event.new_node_name.clone());
            self.rewire(&existing, &updated)?;
        }
        Ok(())
    }

    pub(super) fn set_properties(&mut self, event: &NodePropertiesWereSet) -> Result<()> {
        self.update_node_with_copy_on_write(
            &event.content_stream_id,
            &event.node_aggregate_id,
            &event.origin_dimension_space_point,
            |node| {
                for (name, value) in &event.property_values {
                    node.properties.insert(name.clone(), value.clone());
                }
            },
        )?;
        Ok(())
    }

    pub(super) fn set_references(&mut self, event: &NodeReferencesWereSet) -> Result<()> {
        // The touch gives this stream its own row before its references change.
        let anchor = self.update_node_with_copy_on_write(
            &event.content_stream_id,
            &event.source_node_aggregate_id,
            &event.source_origin_dimension_space_point,
            |_| {},
        )?;
        self.tx.delete_references(anchor, Some(&event.reference_name))?;
        for (position, destination) in event.destination_node_aggregate_ids.iter().enumerate() {
            self.tx.insert_reference(&ReferenceRelation {
                anchor,
                name: event.reference_name.clone(),
                position: position as i64,
                destination: destination.clone(),
            })?;
        }
        Ok(())
    }

    /// Mutates the row of `aggregate` at `origin` as seen from `cs`.
    ///
    /// A row shared with other streams is copied to a fresh anchor first and
    /// every edge of `cs` touching the old anchor is repointed to the copy,
    /// together with the row's references. Returns the anchor that now holds
    /// the mutated row.
    pub(super) fn update_node_with_copy_on_write(
        &mut self,
        cs: &ContentStreamId,
        aggregate: &NodeAggregateId,
        origin: &DimensionSpacePoint,
        mutate: impl FnOnce(&mut NodeRecord),
    ) -> Result<NodeRelationAnchorPoint> {
        let mut node = node_by_origin(&*self.tx, cs, aggregate, origin)?.ok_or_else(|| {
            ProjectionError::violation(format!(
                "no node of aggregate {aggregate} originating in {origin} in stream {cs}"
            ))
        })?;
        let streams = content_streams_containing(&*self.tx, node.anchor)?;
        if streams.len() <= 1 {
            mutate(&mut node);
            self.tx.update_node(&node)?;
            self.metrics.node_written(false);
            return Ok(node.anchor);
        }

        let original = node.anchor;
        let copy_anchor = self.tx.allocate_anchor()?;
        node.anchor = copy_anchor;
        mutate(&mut node);
        self.tx.insert_node(&node)?;

        for edge in self
            .tx
            .hierarchy(&HierarchyFilter::new().touching(original).content_stream(cs))?
        {
            let mut updated = edge.clone();
            if updated.parent == original {
                updated.parent = copy_anchor;
            }
            if updated.child == original {
                updated.child = copy_anchor;
            }
            self.rewire(&edge, &updated)?;
        }
        for reference in self.tx.references(original)? {
            self.tx.insert_reference(&ReferenceRelation {
                anchor: copy_anchor,
                ..reference
            })?;
        }

        self.metrics.node_written(true);
        debug!(
            aggregate = %aggregate,
            stream = %cs,
            from = %original,
            to = %copy_anchor,
            shared_with = streams.len() - 1,
            "projection.copy_on_write"
        );
        Ok(copy_anchor)
    }
}
