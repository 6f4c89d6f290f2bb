use tracing::debug;

use crate::model::{ContentStreamId, DimensionSpacePoint, NodeName, NodeRelationAnchorPoint};
use crate::storage::{HierarchyFilter, HierarchyRelation};
use crate::types::Result;

use super::writer::GraphWriter;

/// Gap left between consecutive siblings.
pub const RELATION_DEFAULT_OFFSET: i64 = 128;

impl GraphWriter<'_> {
    /// Edges below `parent` in one stream and dimension point, ordered by position.
    pub(super) fn siblings(
        &self,
        parent: NodeRelationAnchorPoint,
        cs: &ContentStreamId,
        dsp: &DimensionSpacePoint,
    ) -> Result<Vec<HierarchyRelation>> {
        self.tx.hierarchy(
            &HierarchyFilter::new()
                .parent(parent)
                .content_stream(cs)
                .dimension_hashes([dsp.hash()]),
        )
    }

    /// Position for an edge below `parent`, placed before `succeeding` or appended.
    ///
    /// `moving` names a child already below some parent that must not count as
    /// its own sibling. Rewrites sibling positions when the gap is exhausted.
    pub(super) fn relation_position(
        &mut self,
        parent: NodeRelationAnchorPoint,
        cs: &ContentStreamId,
        dsp: &DimensionSpacePoint,
        succeeding: Option<NodeRelationAnchorPoint>,
        moving: Option<NodeRelationAnchorPoint>,
    ) -> Result<i64> {
        let siblings: Vec<HierarchyRelation> = self
            .siblings(parent, cs, dsp)?
            .into_iter()
            .filter(|edge| Some(edge.child) != moving)
            .collect();

        let succeeding_index = succeeding
            .and_then(|anchor| siblings.iter().position(|edge| edge.child == anchor));
        if succeeding.is_some() && succeeding_index.is_none() {
            debug!(
                parent = %parent,
                dimension = %dsp,
                "projection.position.sibling_missing"
            );
        }

        let candidate = match succeeding_index {
            Some(0) => siblings[0].position - RELATION_DEFAULT_OFFSET,
            Some(index) => {
                let preceding = siblings[index - 1].position;
                preceding + (siblings[index].position - preceding) / 2
            }
            None => siblings
                .last()
                .map_or(0, |last| last.position + RELATION_DEFAULT_OFFSET),
        };

        let collides = siblings.iter().any(|edge| edge.position == candidate);
        if candidate % 2 == 0 && !collides {
            return Ok(candidate);
        }
        let placed_before = succeeding_index.map(|index| siblings[index].child);
        self.rebalance(siblings, placed_before)
    }

    /// Rewrites `siblings` to 0, 128, 256, … and returns the slot reserved
    /// before `placed_before`, or the slot after the last sibling.
    fn rebalance(
        &mut self,
        siblings: Vec<HierarchyRelation>,
        placed_before: Option<NodeRelationAnchorPoint>,
    ) -> Result<i64> {
        let mut offset = 0;
        let mut reserved = None;
        let count = siblings.len();
        for edge in siblings {
            if Some(edge.child) == placed_before {
                reserved = Some(offset);
                offset += RELATION_DEFAULT_OFFSET;
            }
            if edge.position != offset {
                let key = edge.key();
                let mut updated = edge;
                updated.position = offset;
                self.tx.update_hierarchy(&key, &updated)?;
            }
            offset += RELATION_DEFAULT_OFFSET;
        }
        self.metrics.siblings_rebalanced();
        debug!(siblings = count, "projection.position.rebalanced");
        Ok(reserved.unwrap_or(offset))
    }

    /// Inserts one edge per dimension point from `parent` to `child`.
    pub(super) fn connect_hierarchy<'d>(
        &mut self,
        cs: &ContentStreamId,
        parent: NodeRelationAnchorPoint,
        child: NodeRelationAnchorPoint,
        dimension_space_points: impl IntoIterator<Item = &'d DimensionSpacePoint>,
        succeeding: Option<NodeRelationAnchorPoint>,
        name: Option<&NodeName>,
    ) -> Result<()> {
        for dsp in dimension_space_points {
            let position = self.relation_position(parent, cs, dsp, succeeding, None)?;
            self.tx.insert_hierarchy(&HierarchyRelation {
                parent,
                child,
                name: name.cloned(),
                content_stream_id: cs.clone(),
                dimension_space_point: dsp.clone(),
                position,
            })?;
        }
        Ok(())
    }

    /// Replaces the edge stored under its current key with `updated`.
    pub(super) fn rewire(&mut self, original: &HierarchyRelation, updated: &HierarchyRelation) -> Result<()> {
        self.tx.update_hierarchy(&original.key(), updated)
    }
}
