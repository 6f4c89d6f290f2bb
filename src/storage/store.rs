use crate::model::{
    ContentStreamId, DimensionSpacePointSet, NodeAggregateId, NodeRelationAnchorPoint,
    ReferenceName,
};
use crate::types::Result;

use super::records::{HierarchyKey, HierarchyRelation, NodeRecord, ReferenceRelation, RestrictionEdge};

/// Selection over hierarchy edges. Unset fields match everything.
#[derive(Clone, Debug, Default)]
pub struct HierarchyFilter {
    /// Parent anchor.
    pub parent: Option<NodeRelationAnchorPoint>,
    /// Child anchor.
    pub child: Option<NodeRelationAnchorPoint>,
    /// Anchor on either end of the edge.
    pub touching: Option<NodeRelationAnchorPoint>,
    /// Stream.
    pub content_stream_id: Option<ContentStreamId>,
    /// Accepted dimension point hashes; an empty list matches nothing.
    pub dimension_space_point_hashes: Option<Vec<String>>,
}

impl HierarchyFilter {
    /// Filter matching every edge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to edges below `anchor`.
    pub fn parent(mut self, anchor: NodeRelationAnchorPoint) -> Self {
        self.parent = Some(anchor);
        self
    }

    /// Restricts to edges into `anchor`.
    pub fn child(mut self, anchor: NodeRelationAnchorPoint) -> Self {
        self.child = Some(anchor);
        self
    }

    /// Restricts to edges with `anchor` as parent or child.
    pub fn touching(mut self, anchor: NodeRelationAnchorPoint) -> Self {
        self.touching = Some(anchor);
        self
    }

    /// Restricts to one stream.
    pub fn content_stream(mut self, id: &ContentStreamId) -> Self {
        self.content_stream_id = Some(id.clone());
        self
    }

    /// Restricts to the given dimension point hashes.
    pub fn dimension_hashes<I, S>(mut self, hashes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dimension_space_point_hashes = Some(hashes.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts to the members of `set`.
    pub fn dimensions(self, set: &DimensionSpacePointSet) -> Self {
        self.dimension_hashes(set.hashes())
    }

    /// Restricts to `set` when one is given.
    pub fn maybe_dimensions(self, set: Option<&DimensionSpacePointSet>) -> Self {
        match set {
            Some(set) => self.dimensions(set),
            None => self,
        }
    }

    /// Whether `relation` is selected.
    pub fn matches(&self, relation: &HierarchyRelation) -> bool {
        if self.parent.is_some_and(|p| p != relation.parent) {
            return false;
        }
        if self.child.is_some_and(|c| c != relation.child) {
            return false;
        }
        if self
            .touching
            .is_some_and(|a| a != relation.parent && a != relation.child)
        {
            return false;
        }
        if self
            .content_stream_id
            .as_ref()
            .is_some_and(|cs| cs != &relation.content_stream_id)
        {
            return false;
        }
        match &self.dimension_space_point_hashes {
            Some(hashes) => hashes
                .iter()
                .any(|h| h == relation.dimension_space_point_hash()),
            None => true,
        }
    }
}

/// Canonical result order for hierarchy queries.
pub(crate) fn sort_hierarchy(rows: &mut [HierarchyRelation]) {
    rows.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then(a.parent.cmp(&b.parent))
            .then(a.child.cmp(&b.child))
            .then(a.content_stream_id.cmp(&b.content_stream_id))
            .then(a.dimension_space_point_hash().cmp(b.dimension_space_point_hash()))
    });
}

/// Selection over restriction edges. Unset fields match everything.
#[derive(Clone, Debug, Default)]
pub struct RestrictionFilter {
    /// Stream.
    pub content_stream_id: Option<ContentStreamId>,
    /// Accepted dimension point hashes.
    pub dimension_space_point_hashes: Option<Vec<String>>,
    /// Origin aggregate.
    pub origin: Option<NodeAggregateId>,
    /// Affected aggregate.
    pub affected: Option<NodeAggregateId>,
}

impl RestrictionFilter {
    /// Filter matching every edge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one stream.
    pub fn content_stream(mut self, id: &ContentStreamId) -> Self {
        self.content_stream_id = Some(id.clone());
        self
    }

    /// Restricts to the given dimension point hashes.
    pub fn dimension_hashes<I, S>(mut self, hashes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dimension_space_point_hashes = Some(hashes.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts to edges hidden by `origin`.
    pub fn origin(mut self, origin: &NodeAggregateId) -> Self {
        self.origin = Some(origin.clone());
        self
    }

    /// Restricts to edges hiding `affected`.
    pub fn affected(mut self, affected: &NodeAggregateId) -> Self {
        self.affected = Some(affected.clone());
        self
    }

    /// Whether `edge` is selected.
    pub fn matches(&self, edge: &RestrictionEdge) -> bool {
        self.content_stream_id
            .as_ref()
            .map_or(true, |cs| cs == &edge.content_stream_id)
            && self
                .dimension_space_point_hashes
                .as_ref()
                .map_or(true, |hs| hs.iter().any(|h| h == &edge.dimension_space_point_hash))
            && self.origin.as_ref().map_or(true, |o| o == &edge.origin)
            && self.affected.as_ref().map_or(true, |a| a == &edge.affected)
    }
}

/// Read capabilities shared by snapshots and write transactions.
pub trait GraphRead {
    /// Node row by anchor.
    fn node(&self, anchor: NodeRelationAnchorPoint) -> Result<Option<NodeRecord>>;

    /// Every node row of an aggregate, in anchor order.
    fn nodes_by_aggregate(&self, id: &NodeAggregateId) -> Result<Vec<NodeRecord>>;

    /// Every node row, in anchor order.
    fn all_nodes(&self) -> Result<Vec<NodeRecord>>;

    /// Number of node rows.
    fn count_nodes(&self) -> Result<u64>;

    /// Hierarchy edges selected by `filter`, ordered by position.
    fn hierarchy(&self, filter: &HierarchyFilter) -> Result<Vec<HierarchyRelation>>;

    /// Restriction edges selected by `filter`, in key order.
    fn restrictions(&self, filter: &RestrictionFilter) -> Result<Vec<RestrictionEdge>>;

    /// References of a node row ordered by name then position.
    fn references(&self, anchor: NodeRelationAnchorPoint) -> Result<Vec<ReferenceRelation>>;

    /// Every reference row.
    fn all_references(&self) -> Result<Vec<ReferenceRelation>>;

    /// Whether the event with this idempotency key was already applied.
    fn is_processed(&self, key: &str) -> Result<bool>;

    /// Number of processed event markers.
    fn processed_count(&self) -> Result<u64>;

    /// Streams that own at least one hierarchy edge, sorted.
    fn content_streams(&self) -> Result<Vec<ContentStreamId>>;
}

/// Mutations available inside one all-or-nothing write.
pub trait GraphTx: GraphRead {
    /// Allocates a fresh anchor from the store's sequence.
    fn allocate_anchor(&mut self) -> Result<NodeRelationAnchorPoint>;

    /// Inserts a node row; the anchor must be unused.
    fn insert_node(&mut self, node: &NodeRecord) -> Result<()>;

    /// Replaces the node row with the same anchor.
    fn update_node(&mut self, node: &NodeRecord) -> Result<()>;

    /// Deletes a node row; returns whether it existed.
    fn delete_node(&mut self, anchor: NodeRelationAnchorPoint) -> Result<bool>;

    /// Inserts a hierarchy edge; its key must be unused.
    fn insert_hierarchy(&mut self, relation: &HierarchyRelation) -> Result<()>;

    /// Replaces the edge stored under `key` with `relation`, whose key may differ.
    fn update_hierarchy(&mut self, key: &HierarchyKey, relation: &HierarchyRelation) -> Result<()>;

    /// Deletes a hierarchy edge; returns whether it existed.
    fn delete_hierarchy(&mut self, key: &HierarchyKey) -> Result<bool>;

    /// Inserts a restriction edge; returns false when it already existed.
    fn insert_restriction(&mut self, edge: &RestrictionEdge) -> Result<bool>;

    /// Deletes every restriction edge selected by `filter`.
    fn delete_restrictions(&mut self, filter: &RestrictionFilter) -> Result<usize>;

    /// Inserts a reference row.
    fn insert_reference(&mut self, reference: &ReferenceRelation) -> Result<()>;

    /// Deletes references of a node row, optionally only those with `name`.
    fn delete_references(
        &mut self,
        anchor: NodeRelationAnchorPoint,
        name: Option<&ReferenceName>,
    ) -> Result<usize>;

    /// Records an event as processed.
    fn mark_processed(&mut self, key: &str) -> Result<()>;

    /// Clears every table including the processed markers.
    fn truncate(&mut self) -> Result<()>;

    /// Duplicates every hierarchy and restriction row of `source` under `target`.
    fn copy_content_stream(
        &mut self,
        source: &ContentStreamId,
        target: &ContentStreamId,
    ) -> Result<()> {
        for mut relation in self.hierarchy(&HierarchyFilter::new().content_stream(source))? {
            relation.content_stream_id = target.clone();
            self.insert_hierarchy(&relation)?;
        }
        for mut edge in self.restrictions(&RestrictionFilter::new().content_stream(source))? {
            edge.content_stream_id = target.clone();
            self.insert_restriction(&edge)?;
        }
        Ok(())
    }
}

/// A backend holding one projected graph.
pub trait GraphStore {
    /// Runs `f` against a consistent snapshot.
    fn read<R>(&self, f: impl FnOnce(&dyn GraphRead) -> Result<R>) -> Result<R>;

    /// Runs `f` in a transaction committed on `Ok` and rolled back on `Err`.
    fn write<R>(&mut self, f: impl FnOnce(&mut dyn GraphTx) -> Result<R>) -> Result<R>;
}
