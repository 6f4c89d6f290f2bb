use crate::model::{
    ContentStreamId, DimensionSpacePoint, NodeAggregateClassification, NodeAggregateId, NodeName,
    NodeRelationAnchorPoint, NodeTypeName, PropertyValues, ReferenceName,
};

/// One physical node row, keyed by its anchor.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeRecord {
    /// Surrogate key of this row.
    pub anchor: NodeRelationAnchorPoint,
    /// Logical node identity.
    pub node_aggregate_id: NodeAggregateId,
    /// Dimension point this variant originates in.
    pub origin: DimensionSpacePoint,
    /// Property values.
    pub properties: PropertyValues,
    /// Node type.
    pub node_type_name: NodeTypeName,
    /// Role of the aggregate.
    pub classification: NodeAggregateClassification,
    /// Name at creation time.
    pub node_name: Option<NodeName>,
}

/// Identity of a hierarchy edge row.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HierarchyKey {
    /// Parent anchor.
    pub parent: NodeRelationAnchorPoint,
    /// Child anchor.
    pub child: NodeRelationAnchorPoint,
    /// Stream the edge belongs to.
    pub content_stream_id: ContentStreamId,
    /// Hash of the covered dimension point.
    pub dimension_space_point_hash: String,
}

/// "child is a child of parent, visible in this stream at this dimension point".
#[derive(Clone, Debug, PartialEq)]
pub struct HierarchyRelation {
    /// Parent anchor; the root sentinel for root nodes.
    pub parent: NodeRelationAnchorPoint,
    /// Child anchor.
    pub child: NodeRelationAnchorPoint,
    /// Name of the child below the parent.
    pub name: Option<NodeName>,
    /// Stream the edge belongs to.
    pub content_stream_id: ContentStreamId,
    /// Covered dimension point.
    pub dimension_space_point: DimensionSpacePoint,
    /// Sort key among siblings; larger is later.
    pub position: i64,
}

impl HierarchyRelation {
    /// Primary key of this row.
    pub fn key(&self) -> HierarchyKey {
        HierarchyKey {
            parent: self.parent,
            child: self.child,
            content_stream_id: self.content_stream_id.clone(),
            dimension_space_point_hash: self.dimension_space_point.hash().to_owned(),
        }
    }

    /// Hash of the covered dimension point.
    pub fn dimension_space_point_hash(&self) -> &str {
        self.dimension_space_point.hash()
    }
}

/// "affected is hidden because origin was hidden" in one stream and dimension point.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RestrictionEdge {
    /// Stream the edge belongs to.
    pub content_stream_id: ContentStreamId,
    /// Hash of the dimension point.
    pub dimension_space_point_hash: String,
    /// The aggregate that was hidden.
    pub origin: NodeAggregateId,
    /// The aggregate hidden as a consequence (origin itself or a descendant).
    pub affected: NodeAggregateId,
}

/// Ordered, named reference from a node row to another aggregate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceRelation {
    /// Source node row.
    pub anchor: NodeRelationAnchorPoint,
    /// Reference name.
    pub name: ReferenceName,
    /// Position among references of the same name.
    pub position: i64,
    /// Target aggregate.
    pub destination: NodeAggregateId,
}
