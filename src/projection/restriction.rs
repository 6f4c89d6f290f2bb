use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::model::{ContentStreamId, DimensionSpacePointSet, NodeAggregateId};
use crate::storage::lookup::{subtree, SubtreeMember};
use crate::storage::{RestrictionEdge, RestrictionFilter};
use crate::types::Result;

use super::events::{NodeWasHidden, NodeWasShown};
use super::writer::GraphWriter;

fn by_dimension(members: Vec<SubtreeMember>) -> BTreeMap<String, BTreeSet<NodeAggregateId>> {
    let mut grouped: BTreeMap<String, BTreeSet<NodeAggregateId>> = BTreeMap::new();
    for member in members {
        grouped
            .entry(member.dimension_space_point_hash)
            .or_default()
            .insert(member.node_aggregate_id);
    }
    grouped
}

impl GraphWriter<'_> {
    pub(super) fn hide_node(&mut self, event: &NodeWasHidden) -> Result<()> {
        let cs = &event.content_stream_id;
        let members = subtree(
            &*self.tx,
            cs,
            &event.node_aggregate_id,
            Some(&event.affected_dimension_space_points),
        )?;
        let mut added = 0;
        for member in members {
            let inserted = self.tx.insert_restriction(&RestrictionEdge {
                content_stream_id: cs.clone(),
                dimension_space_point_hash: member.dimension_space_point_hash,
                origin: event.node_aggregate_id.clone(),
                affected: member.node_aggregate_id,
            })?;
            if inserted {
                added += 1;
            }
        }
        self.metrics.restriction_edges_added(added);
        debug!(aggregate = %event.node_aggregate_id, added, "projection.restriction.hidden");
        Ok(())
    }

    pub(super) fn show_node(&mut self, event: &NodeWasShown) -> Result<()> {
        let removed = self.tx.delete_restrictions(
            &RestrictionFilter::new()
                .content_stream(&event.content_stream_id)
                .dimension_hashes(event.affected_dimension_space_points.hashes())
                .origin(&event.node_aggregate_id),
        )?;
        self.metrics.restriction_edges_removed(removed);
        debug!(aggregate = %event.node_aggregate_id, removed, "projection.restriction.shown");
        Ok(())
    }

    /// Copies every restriction hiding `parent` onto the subtree of `child`
    /// at each of `dimensions`.
    pub(super) fn inherit_restrictions(
        &mut self,
        cs: &ContentStreamId,
        parent: &NodeAggregateId,
        child: &NodeAggregateId,
        dimensions: &DimensionSpacePointSet,
    ) -> Result<()> {
        let inherited = self.tx.restrictions(
            &RestrictionFilter::new()
                .content_stream(cs)
                .dimension_hashes(dimensions.hashes())
                .affected(parent),
        )?;
        if inherited.is_empty() {
            return Ok(());
        }
        let members = by_dimension(subtree(&*self.tx, cs, child, Some(dimensions))?);
        let mut added = 0;
        for edge in inherited {
            let Some(affected) = members.get(&edge.dimension_space_point_hash) else {
                continue;
            };
            for aggregate in affected {
                let inserted = self.tx.insert_restriction(&RestrictionEdge {
                    affected: aggregate.clone(),
                    ..edge.clone()
                })?;
                if inserted {
                    added += 1;
                }
            }
        }
        self.metrics.restriction_edges_added(added);
        Ok(())
    }

    /// Deletes every restriction edge affecting the subtree of `aggregate`,
    /// limited to `dimensions` when given.
    pub(super) fn purge_subtree_restrictions(
        &mut self,
        cs: &ContentStreamId,
        aggregate: &NodeAggregateId,
        dimensions: Option<&DimensionSpacePointSet>,
    ) -> Result<()> {
        let members = subtree(&*self.tx, cs, aggregate, dimensions)?;
        let mut removed = 0;
        for member in members {
            removed += self.tx.delete_restrictions(
                &RestrictionFilter::new()
                    .content_stream(cs)
                    .dimension_hashes([member.dimension_space_point_hash])
                    .affected(&member.node_aggregate_id),
            )?;
        }
        self.metrics.restriction_edges_removed(removed);
        Ok(())
    }

    /// Re-derives inherited hidden state of a moved subtree.
    ///
    /// Edges whose origin lies outside the subtree are dropped, edges whose
    /// origin lies inside it are kept, and the origins hiding the new parent
    /// are spread over every subtree member.
    pub(super) fn rederive_moved_restrictions(
        &mut self,
        cs: &ContentStreamId,
        moved: &NodeAggregateId,
        new_parent: &NodeAggregateId,
        dimensions: &DimensionSpacePointSet,
    ) -> Result<()> {
        let members = by_dimension(subtree(&*self.tx, cs, moved, Some(dimensions))?);
        let mut removed = 0;
        for (hash, aggregates) in &members {
            for aggregate in aggregates {
                let stale: Vec<RestrictionEdge> = self
                    .tx
                    .restrictions(
                        &RestrictionFilter::new()
                            .content_stream(cs)
                            .dimension_hashes([hash.as_str()])
                            .affected(aggregate),
                    )?
                    .into_iter()
                    .filter(|edge| !aggregates.contains(&edge.origin))
                    .collect();
                for edge in stale {
                    removed += self.tx.delete_restrictions(
                        &RestrictionFilter::new()
                            .content_stream(cs)
                            .dimension_hashes([edge.dimension_space_point_hash])
                            .origin(&edge.origin)
                            .affected(&edge.affected),
                    )?;
                }
            }
        }
        self.metrics.restriction_edges_removed(removed);
        self.inherit_restrictions(cs, new_parent, moved, dimensions)
    }
}
