//! Read side over a projected graph.

use std::sync::Arc;

use serde::Serialize;

use crate::model::{
    ContentStreamId, DimensionSpacePoint, DimensionSpacePointSet, NodeAggregateClassification,
    NodeAggregateId, NodeName, NodeRelationAnchorPoint, NodeTypeName, PropertyValues,
    ReferenceName,
};
use crate::schema::{NodeTypeSchema, OpenSchema};
use crate::storage::lookup::{inbound_edges_of_aggregate, node_by_origin, node_covering};
use crate::storage::{GraphRead, GraphStore, HierarchyFilter, NodeRecord, RestrictionFilter};
use crate::types::{ProjectionError, Result};

/// Whether hidden nodes are returned.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Visibility {
    /// Skip nodes with a restriction edge at the queried point.
    #[default]
    VisibleOnly,
    /// Return hidden nodes too.
    IncludeHidden,
}

/// One node as seen at one dimension point.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeView {
    /// Physical row.
    pub anchor: NodeRelationAnchorPoint,
    /// Logical identity.
    pub node_aggregate_id: NodeAggregateId,
    /// Node type.
    pub node_type_name: NodeTypeName,
    /// Role of the aggregate.
    pub classification: NodeAggregateClassification,
    /// Name below the parent at this point.
    pub node_name: Option<NodeName>,
    /// Origin of the row.
    pub origin: DimensionSpacePoint,
    /// Point the node was looked up at.
    pub covered: DimensionSpacePoint,
    /// Value properties; reference-typed ones are left out.
    pub properties: PropertyValues,
}

/// All rows of one aggregate in one stream.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeAggregate {
    /// Logical identity.
    pub node_aggregate_id: NodeAggregateId,
    /// Node type shared by all rows.
    pub node_type_name: NodeTypeName,
    /// Name shared by all rows.
    pub node_name: Option<NodeName>,
    /// Role of the aggregate.
    pub classification: NodeAggregateClassification,
    /// Origins of the rows.
    pub occupied_dimension_space_points: DimensionSpacePointSet,
    /// Points some row is visible at.
    pub covered_dimension_space_points: DimensionSpacePointSet,
    /// One view per row, at its origin.
    pub nodes: Vec<NodeView>,
}

/// One named reference of a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReferenceView {
    /// Reference name.
    pub name: ReferenceName,
    /// Position among references of the same name.
    pub position: i64,
    /// Target aggregate.
    pub destination: NodeAggregateId,
}

/// Queries over the projected graph held by a store.
pub struct ContentGraph<'s, S: GraphStore> {
    store: &'s S,
    schema: Arc<dyn NodeTypeSchema>,
}

impl<'s, S: GraphStore> ContentGraph<'s, S> {
    /// Read side with an [`OpenSchema`].
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            schema: Arc::new(OpenSchema),
        }
    }

    /// Uses `schema` to drop reference-typed properties from node views.
    pub fn with_schema(mut self, schema: Arc<dyn NodeTypeSchema>) -> Self {
        self.schema = schema;
        self
    }

    fn view(
        &self,
        read: &dyn GraphRead,
        node: NodeRecord,
        cs: &ContentStreamId,
        covered: &DimensionSpacePoint,
    ) -> Result<NodeView> {
        let edge_name = read
            .hierarchy(
                &HierarchyFilter::new()
                    .child(node.anchor)
                    .content_stream(cs)
                    .dimension_hashes([covered.hash()]),
            )?
            .into_iter()
            .next()
            .and_then(|edge| edge.name);
        let schema = &self.schema;
        let node_type_name = node.node_type_name;
        let properties = node
            .properties
            .into_iter()
            .filter(|(name, _)| !schema.property_kind(&node_type_name, name).is_reference())
            .collect();
        Ok(NodeView {
            anchor: node.anchor,
            node_aggregate_id: node.node_aggregate_id,
            node_type_name,
            classification: node.classification,
            node_name: edge_name.or(node.node_name),
            origin: node.origin,
            covered: covered.clone(),
            properties,
        })
    }

    /// Node of `aggregate` originating in `origin`.
    pub fn find_node(
        &self,
        cs: &ContentStreamId,
        aggregate: &NodeAggregateId,
        origin: &DimensionSpacePoint,
    ) -> Result<Option<NodeView>> {
        self.store.read(|read| {
            node_by_origin(read, cs, aggregate, origin)?
                .map(|node| self.view(read, node, cs, origin))
                .transpose()
        })
    }

    /// One view per point the aggregate covers, limited to `dimensions` if given,
    /// ordered by point hash.
    pub fn find_nodes_by_aggregate(
        &self,
        cs: &ContentStreamId,
        aggregate: &NodeAggregateId,
        dimensions: Option<&DimensionSpacePointSet>,
    ) -> Result<Vec<NodeView>> {
        self.store.read(|read| {
            let mut edges = inbound_edges_of_aggregate(read, cs, aggregate, dimensions)?;
            edges.sort_by(|a, b| a.dimension_space_point_hash().cmp(b.dimension_space_point_hash()));
            let mut out = Vec::with_capacity(edges.len());
            for edge in edges {
                let node = read.node(edge.child)?.ok_or_else(|| {
                    ProjectionError::violation(format!("edge into missing node {}", edge.child))
                })?;
                out.push(self.view(read, node, cs, &edge.dimension_space_point)?);
            }
            Ok(out)
        })
    }

    /// Groups the rows of `aggregate` wired into `cs`.
    ///
    /// # Errors
    ///
    /// [`ProjectionError::AmbiguousAggregate`] when the edges disagree on the
    /// node name or the rows disagree on node type or classification.
    pub fn find_node_aggregate(
        &self,
        cs: &ContentStreamId,
        aggregate: &NodeAggregateId,
    ) -> Result<Option<NodeAggregate>> {
        self.store.read(|read| {
            let mut occupied = DimensionSpacePointSet::default();
            let mut covered = DimensionSpacePointSet::default();
            let mut rows = Vec::new();
            let mut edge_names: Vec<Option<NodeName>> = Vec::new();
            for node in read.nodes_by_aggregate(aggregate)? {
                let edges = read.hierarchy(&HierarchyFilter::new().child(node.anchor).content_stream(cs))?;
                if edges.is_empty() {
                    continue;
                }
                for edge in edges {
                    if !edge_names.contains(&edge.name) {
                        edge_names.push(edge.name);
                    }
                    covered.insert(edge.dimension_space_point);
                }
                occupied.insert(node.origin.clone());
                rows.push(node);
            }
            let Some(first) = rows.first() else {
                return Ok(None);
            };
            // Names live on the edges; a rename never touches the rows.
            if let [first_name, other_name, ..] = edge_names.as_slice() {
                return Err(ProjectionError::AmbiguousAggregate {
                    aggregate: aggregate.to_string(),
                    detail: format!(
                        "node names {} and {}",
                        first_name.as_ref().map_or("<none>", NodeName::as_str),
                        other_name.as_ref().map_or("<none>", NodeName::as_str)
                    ),
                });
            }
            let node_name = edge_names.pop().flatten();
            let node_type_name = first.node_type_name.clone();
            let classification = first.classification;
            for row in &rows[1..] {
                let detail = if row.node_type_name != node_type_name {
                    Some(format!("node types {node_type_name} and {}", row.node_type_name))
                } else if row.classification != classification {
                    Some(format!("classifications {classification} and {}", row.classification))
                } else {
                    None
                };
                if let Some(detail) = detail {
                    return Err(ProjectionError::AmbiguousAggregate {
                        aggregate: aggregate.to_string(),
                        detail,
                    });
                }
            }
            let mut nodes = Vec::with_capacity(rows.len());
            for row in rows {
                let origin = row.origin.clone();
                nodes.push(self.view(read, row, cs, &origin)?);
            }
            Ok(Some(NodeAggregate {
                node_aggregate_id: aggregate.clone(),
                node_type_name,
                node_name,
                classification,
                occupied_dimension_space_points: occupied,
                covered_dimension_space_points: covered,
                nodes,
            }))
        })
    }

    /// Children of `parent` at `dsp`, ordered by position.
    pub fn find_child_nodes(
        &self,
        cs: &ContentStreamId,
        parent: &NodeAggregateId,
        dsp: &DimensionSpacePoint,
        visibility: Visibility,
    ) -> Result<Vec<NodeView>> {
        self.store.read(|read| {
            let Some(parent) = node_covering(read, cs, parent, dsp)? else {
                return Ok(Vec::new());
            };
            let edges = read.hierarchy(
                &HierarchyFilter::new()
                    .parent(parent.anchor)
                    .content_stream(cs)
                    .dimension_hashes([dsp.hash()]),
            )?;
            let mut out = Vec::with_capacity(edges.len());
            for edge in edges {
                let child = read.node(edge.child)?.ok_or_else(|| {
                    ProjectionError::violation(format!("edge into missing node {}", edge.child))
                })?;
                if visibility == Visibility::VisibleOnly
                    && hidden(read, cs, &child.node_aggregate_id, dsp)?
                {
                    continue;
                }
                out.push(self.view(read, child, cs, dsp)?);
            }
            Ok(out)
        })
    }

    /// Parent of `aggregate` at `dsp`; `None` for roots and uncovered points.
    pub fn find_parent_node(
        &self,
        cs: &ContentStreamId,
        aggregate: &NodeAggregateId,
        dsp: &DimensionSpacePoint,
    ) -> Result<Option<NodeView>> {
        self.store.read(|read| {
            let Some(child) = node_covering(read, cs, aggregate, dsp)? else {
                return Ok(None);
            };
            let Some(edge) = read
                .hierarchy(
                    &HierarchyFilter::new()
                        .child(child.anchor)
                        .content_stream(cs)
                        .dimension_hashes([dsp.hash()]),
                )?
                .into_iter()
                .next()
            else {
                return Ok(None);
            };
            if edge.parent.is_root_edge() {
                return Ok(None);
            }
            let parent = read.node(edge.parent)?.ok_or_else(|| {
                ProjectionError::violation(format!("edge from missing node {}", edge.parent))
            })?;
            self.view(read, parent, cs, dsp).map(Some)
        })
    }

    /// Whether `aggregate` is hidden at `dsp`.
    pub fn is_hidden(
        &self,
        cs: &ContentStreamId,
        aggregate: &NodeAggregateId,
        dsp: &DimensionSpacePoint,
    ) -> Result<bool> {
        self.store.read(|read| hidden(read, cs, aggregate, dsp))
    }

    /// Points at which some row of `aggregate` is visible.
    pub fn covered_dimension_space_points(
        &self,
        cs: &ContentStreamId,
        aggregate: &NodeAggregateId,
    ) -> Result<DimensionSpacePointSet> {
        self.store.read(|read| {
            Ok(inbound_edges_of_aggregate(read, cs, aggregate, None)?
                .into_iter()
                .map(|edge| edge.dimension_space_point)
                .collect())
        })
    }

    /// Points among `candidates` at which the node of `parent` originating in
    /// `parent_origin` already has a child called `name`.
    pub fn dimension_space_points_occupied_by_child_node_name(
        &self,
        cs: &ContentStreamId,
        name: &NodeName,
        parent: &NodeAggregateId,
        parent_origin: &DimensionSpacePoint,
        candidates: &DimensionSpacePointSet,
    ) -> Result<DimensionSpacePointSet> {
        self.store.read(|read| {
            let Some(parent) = node_by_origin(read, cs, parent, parent_origin)? else {
                return Ok(DimensionSpacePointSet::default());
            };
            Ok(read
                .hierarchy(
                    &HierarchyFilter::new()
                        .parent(parent.anchor)
                        .content_stream(cs)
                        .dimensions(candidates),
                )?
                .into_iter()
                .filter(|edge| edge.name.as_ref() == Some(name))
                .map(|edge| edge.dimension_space_point)
                .collect())
        })
    }

    /// References of the node of `aggregate` originating in `origin`, ordered by
    /// name then position.
    pub fn find_references(
        &self,
        cs: &ContentStreamId,
        aggregate: &NodeAggregateId,
        origin: &DimensionSpacePoint,
    ) -> Result<Vec<ReferenceView>> {
        self.store.read(|read| {
            let Some(node) = node_by_origin(read, cs, aggregate, origin)? else {
                return Ok(Vec::new());
            };
            Ok(read
                .references(node.anchor)?
                .into_iter()
                .map(|reference| ReferenceView {
                    name: reference.name,
                    position: reference.position,
                    destination: reference.destination,
                })
                .collect())
        })
    }
}

fn hidden(
    read: &dyn GraphRead,
    cs: &ContentStreamId,
    aggregate: &NodeAggregateId,
    dsp: &DimensionSpacePoint,
) -> Result<bool> {
    Ok(!read
        .restrictions(
            &RestrictionFilter::new()
                .content_stream(cs)
                .dimension_hashes([dsp.hash()])
                .affected(aggregate),
        )?
        .is_empty())
}
