use std::fmt;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_128;

use crate::model::{
    ContentStreamId, DimensionSpacePoint, DimensionSpacePointSet, NodeAggregateClassification,
    NodeAggregateId, NodeName, NodeTypeName, PropertyValues, ReferenceName,
};

fn root_classification() -> NodeAggregateClassification {
    NodeAggregateClassification::Root
}

fn regular_classification() -> NodeAggregateClassification {
    NodeAggregateClassification::Regular
}

/// A root node aggregate was created with its single node at the empty dimension point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RootNodeAggregateWithNodeWasCreated {
    /// Stream the root lives in.
    pub content_stream_id: ContentStreamId,
    /// Root aggregate.
    pub node_aggregate_id: NodeAggregateId,
    /// Node type of the root.
    pub node_type_name: NodeTypeName,
    /// Dimension points the root is visible in.
    pub visible_in_dimension_space_points: DimensionSpacePointSet,
    /// Classification, `root` unless stated.
    #[serde(default = "root_classification")]
    pub node_aggregate_classification: NodeAggregateClassification,
}

/// A node aggregate was created, or gained a node at a further origin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeAggregateWithNodeWasCreated {
    /// Stream.
    pub content_stream_id: ContentStreamId,
    /// The created aggregate.
    pub node_aggregate_id: NodeAggregateId,
    /// Node type.
    pub node_type_name: NodeTypeName,
    /// Origin of the new node.
    pub origin_dimension_space_point: DimensionSpacePoint,
    /// Dimension points the node is visible in.
    pub visible_in_dimension_space_points: DimensionSpacePointSet,
    /// Parent aggregate.
    pub parent_node_aggregate_id: NodeAggregateId,
    /// Sibling the node is inserted before, if any.
    #[serde(default)]
    pub succeeding_sibling_node_aggregate_id: Option<NodeAggregateId>,
    /// Name below the parent.
    #[serde(default)]
    pub node_name: Option<NodeName>,
    /// Initial property values.
    #[serde(default)]
    pub initial_property_values: PropertyValues,
    /// Classification, `regular` unless stated.
    #[serde(default = "regular_classification")]
    pub node_aggregate_classification: NodeAggregateClassification,
}

/// An aggregate was renamed below its parent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeAggregateNameWasChanged {
    /// Stream.
    pub content_stream_id: ContentStreamId,
    /// Renamed aggregate.
    pub node_aggregate_id: NodeAggregateId,
    /// New name.
    pub new_node_name: NodeName,
}

/// Property values were set on one node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodePropertiesWereSet {
    /// Stream.
    pub content_stream_id: ContentStreamId,
    /// Aggregate of the node.
    pub node_aggregate_id: NodeAggregateId,
    /// Origin of the node.
    pub origin_dimension_space_point: DimensionSpacePoint,
    /// Values merged into the node's properties.
    pub property_values: PropertyValues,
}

/// The named references of one node were replaced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeReferencesWereSet {
    /// Stream.
    pub content_stream_id: ContentStreamId,
    /// Aggregate of the referencing node.
    pub source_node_aggregate_id: NodeAggregateId,
    /// Origin of the referencing node.
    pub source_origin_dimension_space_point: DimensionSpacePoint,
    /// Reference name being replaced.
    pub reference_name: ReferenceName,
    /// New targets, in order.
    pub destination_node_aggregate_ids: Vec<NodeAggregateId>,
}

/// An aggregate was hidden in some dimension points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeWasHidden {
    /// Stream.
    pub content_stream_id: ContentStreamId,
    /// Hidden aggregate.
    pub node_aggregate_id: NodeAggregateId,
    /// Dimension points the hide applies to.
    pub affected_dimension_space_points: DimensionSpacePointSet,
}

/// An aggregate was shown again in some dimension points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeWasShown {
    /// Stream.
    pub content_stream_id: ContentStreamId,
    /// Shown aggregate.
    pub node_aggregate_id: NodeAggregateId,
    /// Dimension points the show applies to.
    pub affected_dimension_space_points: DimensionSpacePointSet,
}

/// A variant of a node was created at a more specific dimension point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeSpecializationVariantWasCreated {
    /// Stream.
    pub content_stream_id: ContentStreamId,
    /// Varied aggregate.
    pub node_aggregate_id: NodeAggregateId,
    /// Origin of the node copied.
    pub source_origin: DimensionSpacePoint,
    /// Origin of the new node.
    pub specialization_origin: DimensionSpacePoint,
    /// Dimension points the new node covers.
    pub specialization_coverage: DimensionSpacePointSet,
}

/// A variant of a node was created at a more general dimension point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeGeneralizationVariantWasCreated {
    /// Stream.
    pub content_stream_id: ContentStreamId,
    /// Varied aggregate.
    pub node_aggregate_id: NodeAggregateId,
    /// Origin of the node copied.
    pub source_origin: DimensionSpacePoint,
    /// Origin of the new node.
    pub generalization_origin: DimensionSpacePoint,
    /// Dimension points the new node covers.
    pub generalization_coverage: DimensionSpacePointSet,
}

/// A variant of a node was created at an unrelated dimension point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodePeerVariantWasCreated {
    /// Stream.
    pub content_stream_id: ContentStreamId,
    /// Varied aggregate.
    pub node_aggregate_id: NodeAggregateId,
    /// Origin of the node copied.
    pub source_origin: DimensionSpacePoint,
    /// Origin of the new node.
    pub peer_origin: DimensionSpacePoint,
    /// Dimension points the new node covers.
    pub peer_coverage: DimensionSpacePointSet,
}

/// Where one node of a moved aggregate ends up.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeMoveMapping {
    /// Origin of the moved node.
    pub moved_node_origin: DimensionSpacePoint,
    /// Origin of the new parent node; resolved per dimension point when absent.
    #[serde(default)]
    pub new_parent_node_origin: Option<DimensionSpacePoint>,
    /// Origin of the new succeeding sibling; resolved per dimension point when absent.
    #[serde(default)]
    pub new_succeeding_sibling_origin: Option<DimensionSpacePoint>,
    /// Dimension points whose edges are moved. Empty means every edge of the node.
    #[serde(default)]
    pub relation_dimension_space_points: DimensionSpacePointSet,
}

/// Nodes of an aggregate were moved to a new parent or reordered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodesWereMoved {
    /// Stream.
    pub content_stream_id: ContentStreamId,
    /// Moved aggregate.
    pub node_aggregate_id: NodeAggregateId,
    /// New parent aggregate; `None` reorders below the current parent.
    #[serde(default)]
    pub new_parent_node_aggregate_id: Option<NodeAggregateId>,
    /// Sibling the nodes are placed before; `None` appends.
    #[serde(default)]
    pub new_succeeding_sibling_node_aggregate_id: Option<NodeAggregateId>,
    /// One entry per moved node.
    pub node_move_mappings: Vec<NodeMoveMapping>,
}

/// Nodes of an aggregate were removed from some dimension points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodesWereRemovedFromAggregate {
    /// Stream.
    pub content_stream_id: ContentStreamId,
    /// Affected aggregate.
    pub node_aggregate_id: NodeAggregateId,
    /// Dimension points the aggregate no longer covers.
    pub dimension_space_points: DimensionSpacePointSet,
}

/// An aggregate was removed entirely.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeAggregateWasRemoved {
    /// Stream.
    pub content_stream_id: ContentStreamId,
    /// Removed aggregate.
    pub node_aggregate_id: NodeAggregateId,
}

/// A stream was created as a copy of another.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentStreamWasForked {
    /// The new stream.
    pub content_stream_id: ContentStreamId,
    /// The stream copied.
    pub source_content_stream_id: ContentStreamId,
}

/// A stream was discarded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentStreamWasRemoved {
    /// The discarded stream.
    pub content_stream_id: ContentStreamId,
}

/// Every event the projector understands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[allow(missing_docs)]
pub enum ContentGraphEvent {
    RootNodeAggregateWithNodeWasCreated(RootNodeAggregateWithNodeWasCreated),
    NodeAggregateWithNodeWasCreated(NodeAggregateWithNodeWasCreated),
    NodeAggregateNameWasChanged(NodeAggregateNameWasChanged),
    NodePropertiesWereSet(NodePropertiesWereSet),
    NodeReferencesWereSet(NodeReferencesWereSet),
    NodeWasHidden(NodeWasHidden),
    NodeWasShown(NodeWasShown),
    NodeSpecializationVariantWasCreated(NodeSpecializationVariantWasCreated),
    NodeGeneralizationVariantWasCreated(NodeGeneralizationVariantWasCreated),
    NodePeerVariantWasCreated(NodePeerVariantWasCreated),
    NodesWereMoved(NodesWereMoved),
    NodesWereRemovedFromAggregate(NodesWereRemovedFromAggregate),
    NodeAggregateWasRemoved(NodeAggregateWasRemoved),
    ContentStreamWasForked(ContentStreamWasForked),
    ContentStreamWasRemoved(ContentStreamWasRemoved),
}

/// Discriminant of [`ContentGraphEvent`], used in logs and error context.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[allow(missing_docs)]
pub enum EventKind {
    RootNodeAggregateWithNodeWasCreated,
    NodeAggregateWithNodeWasCreated,
    NodeAggregateNameWasChanged,
    NodePropertiesWereSet,
    NodeReferencesWereSet,
    NodeWasHidden,
    NodeWasShown,
    NodeSpecializationVariantWasCreated,
    NodeGeneralizationVariantWasCreated,
    NodePeerVariantWasCreated,
    NodesWereMoved,
    NodesWereRemovedFromAggregate,
    NodeAggregateWasRemoved,
    ContentStreamWasForked,
    ContentStreamWasRemoved,
}

impl EventKind {
    /// Event type name as it appears in the `type` tag.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::RootNodeAggregateWithNodeWasCreated => "RootNodeAggregateWithNodeWasCreated",
            EventKind::NodeAggregateWithNodeWasCreated => "NodeAggregateWithNodeWasCreated",
            EventKind::NodeAggregateNameWasChanged => "NodeAggregateNameWasChanged",
            EventKind::NodePropertiesWereSet => "NodePropertiesWereSet",
            EventKind::NodeReferencesWereSet => "NodeReferencesWereSet",
            EventKind::NodeWasHidden => "NodeWasHidden",
            EventKind::NodeWasShown => "NodeWasShown",
            EventKind::NodeSpecializationVariantWasCreated => "NodeSpecializationVariantWasCreated",
            EventKind::NodeGeneralizationVariantWasCreated => "NodeGeneralizationVariantWasCreated",
            EventKind::NodePeerVariantWasCreated => "NodePeerVariantWasCreated",
            EventKind::NodesWereMoved => "NodesWereMoved",
            EventKind::NodesWereRemovedFromAggregate => "NodesWereRemovedFromAggregate",
            EventKind::NodeAggregateWasRemoved => "NodeAggregateWasRemoved",
            EventKind::ContentStreamWasForked => "ContentStreamWasForked",
            EventKind::ContentStreamWasRemoved => "ContentStreamWasRemoved",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ContentGraphEvent {
    /// Discriminant of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            ContentGraphEvent::RootNodeAggregateWithNodeWasCreated(_) => {
                EventKind::RootNodeAggregateWithNodeWasCreated
            }
            ContentGraphEvent::NodeAggregateWithNodeWasCreated(_) => {
                EventKind::NodeAggregateWithNodeWasCreated
            }
            ContentGraphEvent::NodeAggregateNameWasChanged(_) => EventKind::NodeAggregateNameWasChanged,
            ContentGraphEvent::NodePropertiesWereSet(_) => EventKind::NodePropertiesWereSet,
            ContentGraphEvent::NodeReferencesWereSet(_) => EventKind::NodeReferencesWereSet,
            ContentGraphEvent::NodeWasHidden(_) => EventKind::NodeWasHidden,
            ContentGraphEvent::NodeWasShown(_) => EventKind::NodeWasShown,
            ContentGraphEvent::NodeSpecializationVariantWasCreated(_) => {
                EventKind::NodeSpecializationVariantWasCreated
            }
            ContentGraphEvent::NodeGeneralizationVariantWasCreated(_) => {
                EventKind::NodeGeneralizationVariantWasCreated
            }
            ContentGraphEvent::NodePeerVariantWasCreated(_) => EventKind::NodePeerVariantWasCreated,
            ContentGraphEvent::NodesWereMoved(_) => EventKind::NodesWereMoved,
            ContentGraphEvent::NodesWereRemovedFromAggregate(_) => {
                EventKind::NodesWereRemovedFromAggregate
            }
            ContentGraphEvent::NodeAggregateWasRemoved(_) => EventKind::NodeAggregateWasRemoved,
            ContentGraphEvent::ContentStreamWasForked(_) => EventKind::ContentStreamWasForked,
            ContentGraphEvent::ContentStreamWasRemoved(_) => EventKind::ContentStreamWasRemoved,
        }
    }

    /// Stream the event applies to.
    pub fn content_stream_id(&self) -> &ContentStreamId {
        match self {
            ContentGraphEvent::RootNodeAggregateWithNodeWasCreated(e) => &e.content_stream_id,
            ContentGraphEvent::NodeAggregateWithNodeWasCreated(e) => &e.content_stream_id,
            ContentGraphEvent::NodeAggregateNameWasChanged(e) => &e.content_stream_id,
            ContentGraphEvent::NodePropertiesWereSet(e) => &e.content_stream_id,
            ContentGraphEvent::NodeReferencesWereSet(e) => &e.content_stream_id,
            ContentGraphEvent::NodeWasHidden(e) => &e.content_stream_id,
            ContentGraphEvent::NodeWasShown(e) => &e.content_stream_id,
            ContentGraphEvent::NodeSpecializationVariantWasCreated(e) => &e.content_stream_id,
            ContentGraphEvent::NodeGeneralizationVariantWasCreated(e) => &e.content_stream_id,
            ContentGraphEvent::NodePeerVariantWasCreated(e) => &e.content_stream_id,
            ContentGraphEvent::NodesWereMoved(e) => &e.content_stream_id,
            ContentGraphEvent::NodesWereRemovedFromAggregate(e) => &e.content_stream_id,
            ContentGraphEvent::NodeAggregateWasRemoved(e) => &e.content_stream_id,
            ContentGraphEvent::ContentStreamWasForked(e) => &e.content_stream_id,
            ContentGraphEvent::ContentStreamWasRemoved(e) => &e.content_stream_id,
        }
    }
}

/// An event with its upstream identifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Stable identifier assigned by the event store.
    pub event_id: String,
    /// The event.
    pub event: ContentGraphEvent,
}

impl EventEnvelope {
    /// Wraps `event` under `event_id`.
    pub fn new(event_id: impl Into<String>, event: ContentGraphEvent) -> Self {
        Self {
            event_id: event_id.into(),
            event,
        }
    }

    /// Content-addressed key recorded once the event is applied.
    pub fn idempotency_key(&self) -> String {
        idempotency_key(&self.event_id)
    }
}

/// Content-addressed key for an event identifier.
pub fn idempotency_key(event_id: &str) -> String {
    hex::encode(xxh3_128(event_id.as_bytes()).to_be_bytes())
}
