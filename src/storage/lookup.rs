//! Queries composed from the [`GraphRead`] primitives.
//!
//! These are the lookups the projector needs to decide on its writes and the
//! read side needs to answer questions: node rows by origin or coverage, the
//! inbound/outbound edges of a whole aggregate, and the descendant closure
//! used by restriction maintenance.

use std::collections::{BTreeSet, VecDeque};

use crate::model::{
    ContentStreamId, DimensionSpacePoint, DimensionSpacePointSet, NodeAggregateId,
    NodeRelationAnchorPoint,
};
use crate::types::{ProjectionError, Result};

use super::records::{HierarchyRelation, NodeRecord};
use super::store::{GraphRead, HierarchyFilter};

/// Edges in `cs` pointing at any row of `aggregate`, optionally limited to `dimensions`.
pub fn inbound_edges_of_aggregate<R: GraphRead + ?Sized>(
    read: &R,
    cs: &ContentStreamId,
    aggregate: &NodeAggregateId,
    dimensions: Option<&DimensionSpacePointSet>,
) -> Result<Vec<HierarchyRelation>> {
    let mut out = Vec::new();
    for node in read.nodes_by_aggregate(aggregate)? {
        out.extend(read.hierarchy(
            &HierarchyFilter::new()
                .child(node.anchor)
                .content_stream(cs)
                .maybe_dimensions(dimensions),
        )?);
    }
    Ok(out)
}

/// Edges in `cs` leaving any row of `aggregate`, optionally limited to `dimensions`.
pub fn outbound_edges_of_aggregate<R: GraphRead + ?Sized>(
    read: &R,
    cs: &ContentStreamId,
    aggregate: &NodeAggregateId,
    dimensions: Option<&DimensionSpacePointSet>,
) -> Result<Vec<HierarchyRelation>> {
    let mut out = Vec::new();
    for node in read.nodes_by_aggregate(aggregate)? {
        out.extend(read.hierarchy(
            &HierarchyFilter::new()
                .parent(node.anchor)
                .content_stream(cs)
                .maybe_dimensions(dimensions),
        )?);
    }
    Ok(out)
}

/// The row of `aggregate` originating in `origin` that is wired into `cs`.
pub fn node_by_origin<R: GraphRead + ?Sized>(
    read: &R,
    cs: &ContentStreamId,
    aggregate: &NodeAggregateId,
    origin: &DimensionSpacePoint,
) -> Result<Option<NodeRecord>> {
    let mut found: Option<NodeRecord> = None;
    for node in read.nodes_by_aggregate(aggregate)? {
        if node.origin.hash() != origin.hash() {
            continue;
        }
        let edges = read.hierarchy(&HierarchyFilter::new().child(node.anchor).content_stream(cs))?;
        if edges.is_empty() {
            continue;
        }
        if let Some(existing) = &found {
            return Err(ProjectionError::violation(format!(
                "aggregate {aggregate} has rows {} and {} originating in {origin} in stream {cs}",
                existing.anchor, node.anchor
            )));
        }
        found = Some(node);
    }
    Ok(found)
}

/// The row of `aggregate` visible at `dsp` in `cs`.
pub fn node_covering<R: GraphRead + ?Sized>(
    read: &R,
    cs: &ContentStreamId,
    aggregate: &NodeAggregateId,
    dsp: &DimensionSpacePoint,
) -> Result<Option<NodeRecord>> {
    let mut found: Option<NodeRecord> = None;
    for node in read.nodes_by_aggregate(aggregate)? {
        let edges = read.hierarchy(
            &HierarchyFilter::new()
                .child(node.anchor)
                .content_stream(cs)
                .dimension_hashes([dsp.hash()]),
        )?;
        if edges.is_empty() {
            continue;
        }
        if let Some(existing) = &found {
            return Err(ProjectionError::violation(format!(
                "aggregate {aggregate} has rows {} and {} covering {dsp} in stream {cs}",
                existing.anchor, node.anchor
            )));
        }
        found = Some(node);
    }
    Ok(found)
}

/// Distinct streams holding an edge with `anchor` as child.
pub fn content_streams_containing<R: GraphRead + ?Sized>(
    read: &R,
    anchor: NodeRelationAnchorPoint,
) -> Result<BTreeSet<ContentStreamId>> {
    Ok(read
        .hierarchy(&HierarchyFilter::new().child(anchor))?
        .into_iter()
        .map(|edge| edge.content_stream_id)
        .collect())
}

/// One member of a descendant closure.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubtreeMember {
    /// Anchor of the visited row.
    pub anchor: NodeRelationAnchorPoint,
    /// Aggregate of the visited row.
    pub node_aggregate_id: NodeAggregateId,
    /// Dimension point hash the row was reached in.
    pub dimension_space_point_hash: String,
}

/// Descendant closure of `aggregate` in `cs`, the aggregate itself included.
///
/// Starts at every inbound edge of the aggregate (limited to `dimensions` if
/// given) and follows parent-to-child edges that stay in the same stream and
/// dimension point hash until nothing new is reached.
pub fn subtree<R: GraphRead + ?Sized>(
    read: &R,
    cs: &ContentStreamId,
    aggregate: &NodeAggregateId,
    dimensions: Option<&DimensionSpacePointSet>,
) -> Result<Vec<SubtreeMember>> {
    let mut seen: BTreeSet<(NodeRelationAnchorPoint, String)> = BTreeSet::new();
    let mut queue: VecDeque<(NodeRelationAnchorPoint, NodeAggregateId, String)> = VecDeque::new();
    for edge in inbound_edges_of_aggregate(read, cs, aggregate, dimensions)? {
        let hash = edge.dimension_space_point_hash().to_owned();
        if seen.insert((edge.child, hash.clone())) {
            queue.push_back((edge.child, aggregate.clone(), hash));
        }
    }

    let mut members = Vec::new();
    while let Some((anchor, node_aggregate_id, hash)) = queue.pop_front() {
        let children = read.hierarchy(
            &HierarchyFilter::new()
                .parent(anchor)
                .content_stream(cs)
                .dimension_hashes([hash.as_str()]),
        )?;
        for edge in children {
            if !seen.insert((edge.child, hash.clone())) {
                continue;
            }
            let child = read.node(edge.child)?.ok_or_else(|| {
                ProjectionError::violation(format!(
                    "hierarchy edge {} -> {} in stream {cs} has no child row",
                    edge.parent, edge.child
                ))
            })?;
            queue.push_back((edge.child, child.node_aggregate_id, hash.clone()));
        }
        members.push(SubtreeMember {
            anchor,
            node_aggregate_id,
            dimension_space_point_hash: hash,
        });
    }
    Ok(members)
}
