use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::model::{
    ContentStreamId, NodeAggregateId, NodeRelationAnchorPoint, ReferenceName,
};
use crate::types::{ProjectionError, Result};

use super::records::{HierarchyKey, HierarchyRelation, NodeRecord, ReferenceRelation, RestrictionEdge};
use super::store::{
    sort_hierarchy, GraphRead, GraphStore, GraphTx, HierarchyFilter, RestrictionFilter,
};

type ReferenceKey = (NodeRelationAnchorPoint, ReferenceName, i64);

#[derive(Clone, Debug, Default)]
struct Tables {
    next_anchor: u64,
    nodes: BTreeMap<NodeRelationAnchorPoint, NodeRecord>,
    anchors_by_aggregate: FxHashMap<NodeAggregateId, BTreeSet<NodeRelationAnchorPoint>>,
    hierarchy: BTreeMap<HierarchyKey, HierarchyRelation>,
    edges_by_child: FxHashMap<NodeRelationAnchorPoint, BTreeSet<HierarchyKey>>,
    restrictions: BTreeSet<RestrictionEdge>,
    references: BTreeMap<ReferenceKey, ReferenceRelation>,
    processed: BTreeSet<String>,
}

impl Tables {
    fn put_node(&mut self, node: NodeRecord) -> Option<NodeRecord> {
        let previous = self.take_node(node.anchor);
        self.anchors_by_aggregate
            .entry(node.node_aggregate_id.clone())
            .or_default()
            .insert(node.anchor);
        self.nodes.insert(node.anchor, node);
        previous
    }

    fn take_node(&mut self, anchor: NodeRelationAnchorPoint) -> Option<NodeRecord> {
        let node = self.nodes.remove(&anchor)?;
        if let Some(anchors) = self.anchors_by_aggregate.get_mut(&node.node_aggregate_id) {
            anchors.remove(&anchor);
            if anchors.is_empty() {
                self.anchors_by_aggregate.remove(&node.node_aggregate_id);
            }
        }
        Some(node)
    }

    fn put_hierarchy(&mut self, relation: HierarchyRelation) -> Option<HierarchyRelation> {
        let key = relation.key();
        self.edges_by_child
            .entry(key.child)
            .or_default()
            .insert(key.clone());
        self.hierarchy.insert(key, relation)
    }

    fn take_hierarchy(&mut self, key: &HierarchyKey) -> Option<HierarchyRelation> {
        let relation = self.hierarchy.remove(key)?;
        if let Some(keys) = self.edges_by_child.get_mut(&key.child) {
            keys.remove(key);
            if keys.is_empty() {
                self.edges_by_child.remove(&key.child);
            }
        }
        Some(relation)
    }

    fn edges_below(&self, parent: NodeRelationAnchorPoint) -> impl Iterator<Item = &HierarchyRelation> {
        self.hierarchy
            .range((
                Bound::Included(HierarchyKey {
                    parent,
                    child: NodeRelationAnchorPoint(0),
                    content_stream_id: ContentStreamId::new(""),
                    dimension_space_point_hash: String::new(),
                }),
                Bound::Unbounded,
            ))
            .take_while(move |(key, _)| key.parent == parent)
            .map(|(_, relation)| relation)
    }

    fn edges_into(&self, child: NodeRelationAnchorPoint) -> impl Iterator<Item = &HierarchyRelation> {
        self.edges_by_child
            .get(&child)
            .into_iter()
            .flatten()
            .filter_map(move |key| self.hierarchy.get(key))
    }

    fn references_of(
        &self,
        anchor: NodeRelationAnchorPoint,
    ) -> impl Iterator<Item = (&ReferenceKey, &ReferenceRelation)> {
        self.references
            .range((anchor, ReferenceName::new(""), i64::MIN)..)
            .take_while(move |((owner, _, _), _)| *owner == anchor)
    }
}

impl GraphRead for Tables {
    fn node(&self, anchor: NodeRelationAnchorPoint) -> Result<Option<NodeRecord>> {
        Ok(self.nodes.get(&anchor).cloned())
    }

    fn nodes_by_aggregate(&self, id: &NodeAggregateId) -> Result<Vec<NodeRecord>> {
        Ok(self
            .anchors_by_aggregate
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|anchor| self.nodes.get(anchor))
            .cloned()
            .collect())
    }

    fn all_nodes(&self) -> Result<Vec<NodeRecord>> {
        Ok(self.nodes.values().cloned().collect())
    }

    fn count_nodes(&self) -> Result<u64> {
        Ok(self.nodes.len() as u64)
    }

    fn hierarchy(&self, filter: &HierarchyFilter) -> Result<Vec<HierarchyRelation>> {
        let candidates: Box<dyn Iterator<Item = &HierarchyRelation>> =
            match (filter.parent, filter.child) {
                (Some(parent), _) => Box::new(self.edges_below(parent)),
                (None, Some(child)) => Box::new(self.edges_into(child)),
                (None, None) => match filter.touching {
                    Some(anchor) => {
                        Box::new(self.edges_below(anchor).chain(
                            self.edges_into(anchor).filter(move |r| r.parent != anchor),
                        ))
                    }
                    None => Box::new(self.hierarchy.values()),
                },
            };
        let mut rows: Vec<HierarchyRelation> = candidates
            .filter(|relation| filter.matches(relation))
            .cloned()
            .collect();
        sort_hierarchy(&mut rows);
        Ok(rows)
    }

    fn restrictions(&self, filter: &RestrictionFilter) -> Result<Vec<RestrictionEdge>> {
        Ok(self
            .restrictions
            .iter()
            .filter(|edge| filter.matches(edge))
            .cloned()
            .collect())
    }

    fn references(&self, anchor: NodeRelationAnchorPoint) -> Result<Vec<ReferenceRelation>> {
        Ok(self
            .references_of(anchor)
            .map(|(_, reference)| reference.clone())
            .collect())
    }

    fn all_references(&self) -> Result<Vec<ReferenceRelation>> {
        Ok(self.references.values().cloned().collect())
    }

    fn is_processed(&self, key: &str) -> Result<bool> {
        Ok(self.processed.contains(key))
    }

    fn processed_count(&self) -> Result<u64> {
        Ok(self.processed.len() as u64)
    }

    fn content_streams(&self) -> Result<Vec<ContentStreamId>> {
        let streams: BTreeSet<ContentStreamId> = self
            .hierarchy
            .keys()
            .map(|key| key.content_stream_id.clone())
            .collect();
        Ok(streams.into_iter().collect())
    }
}

/// Inverse of one applied change.
#[derive(Debug)]
enum Undo {
    Anchor(u64),
    Node(NodeRelationAnchorPoint, Option<NodeRecord>),
    Hierarchy(HierarchyKey, Option<HierarchyRelation>),
    RestrictionAdded(RestrictionEdge),
    RestrictionsRemoved(Vec<RestrictionEdge>),
    ReferenceAdded(ReferenceKey),
    ReferencesRemoved(Vec<ReferenceRelation>),
    Processed(String),
    Truncated(Box<Tables>),
}

/// Write transaction over the live tables that journals every change.
struct Journal<'a> {
    tables: &'a mut Tables,
    undo: Vec<Undo>,
}

impl Journal<'_> {
    fn rollback(&mut self) {
        while let Some(step) = self.undo.pop() {
            let tables = &mut *self.tables;
            match step {
                Undo::Anchor(previous) => tables.next_anchor = previous,
                Undo::Node(anchor, previous) => {
                    tables.take_node(anchor);
                    if let Some(previous) = previous {
                        tables.put_node(previous);
                    }
                }
                Undo::Hierarchy(key, previous) => {
                    tables.take_hierarchy(&key);
                    if let Some(previous) = previous {
                        tables.put_hierarchy(previous);
                    }
                }
                Undo::RestrictionAdded(edge) => {
                    tables.restrictions.remove(&edge);
                }
                Undo::RestrictionsRemoved(edges) => tables.restrictions.extend(edges),
                Undo::ReferenceAdded(key) => {
                    tables.references.remove(&key);
                }
                Undo::ReferencesRemoved(references) => {
                    for reference in references {
                        let key = (reference.anchor, reference.name.clone(), reference.position);
                        tables.references.insert(key, reference);
                    }
                }
                Undo::Processed(key) => {
                    tables.processed.remove(&key);
                }
                Undo::Truncated(previous) => *tables = *previous,
            }
        }
    }
}

impl GraphRead for Journal<'_> {
    fn node(&self, anchor: NodeRelationAnchorPoint) -> Result<Option<NodeRecord>> {
        self.tables.node(anchor)
    }

    fn nodes_by_aggregate(&self, id: &NodeAggregateId) -> Result<Vec<NodeRecord>> {
        self.tables.nodes_by_aggregate(id)
    }

    fn all_nodes(&self) -> Result<Vec<NodeRecord>> {
        self.tables.all_nodes()
    }

    fn count_nodes(&self) -> Result<u64> {
        self.tables.count_nodes()
    }

    fn hierarchy(&self, filter: &HierarchyFilter) -> Result<Vec<HierarchyRelation>> {
        self.tables.hierarchy(filter)
    }

    fn restrictions(&self, filter: &RestrictionFilter) -> Result<Vec<RestrictionEdge>> {
        self.tables.restrictions(filter)
    }

    fn references(&self, anchor: NodeRelationAnchorPoint) -> Result<Vec<ReferenceRelation>> {
        self.tables.references(anchor)
    }

    fn all_references(&self) -> Result<Vec<ReferenceRelation>> {
        self.tables.all_references()
    }

    fn is_processed(&self, key: &str) -> Result<bool> {
        self.tables.is_processed(key)
    }

    fn processed_count(&self) -> Result<u64> {
        self.tables.processed_count()
    }

    fn content_streams(&self) -> Result<Vec<ContentStreamId>> {
        self.tables.content_streams()
    }
}

impl GraphTx for Journal<'_> {
    fn allocate_anchor(&mut self) -> Result<NodeRelationAnchorPoint> {
        self.undo.push(Undo::Anchor(self.tables.next_anchor));
        self.tables.next_anchor += 1;
        Ok(NodeRelationAnchorPoint(self.tables.next_anchor))
    }

    fn insert_node(&mut self, node: &NodeRecord) -> Result<()> {
        if node.anchor.is_root_edge() {
            return Err(ProjectionError::InvalidArgument(
                "the root sentinel anchor cannot hold a node row".into(),
            ));
        }
        if self.tables.nodes.contains_key(&node.anchor) {
            return Err(ProjectionError::violation(format!(
                "node anchor {} already in use",
                node.anchor
            )));
        }
        self.tables.put_node(node.clone());
        self.undo.push(Undo::Node(node.anchor, None));
        Ok(())
    }

    fn update_node(&mut self, node: &NodeRecord) -> Result<()> {
        if !self.tables.nodes.contains_key(&node.anchor) {
            return Err(ProjectionError::not_found(format!("node {}", node.anchor)));
        }
        let previous = self.tables.put_node(node.clone());
        self.undo.push(Undo::Node(node.anchor, previous));
        Ok(())
    }

    fn delete_node(&mut self, anchor: NodeRelationAnchorPoint) -> Result<bool> {
        let previous = self.tables.take_node(anchor);
        let existed = previous.is_some();
        if existed {
            self.undo.push(Undo::Node(anchor, previous));
        }
        Ok(existed)
    }

    fn insert_hierarchy(&mut self, relation: &HierarchyRelation) -> Result<()> {
        let key = relation.key();
        if self.tables.hierarchy.contains_key(&key) {
            return Err(ProjectionError::violation(format!(
                "hierarchy edge {} -> {} already exists in stream {} at {}",
                key.parent, key.child, key.content_stream_id, relation.dimension_space_point
            )));
        }
        self.tables.put_hierarchy(relation.clone());
        self.undo.push(Undo::Hierarchy(key, None));
        Ok(())
    }

    fn update_hierarchy(&mut self, key: &HierarchyKey, relation: &HierarchyRelation) -> Result<()> {
        if !self.tables.hierarchy.contains_key(key) {
            return Err(ProjectionError::not_found(format!(
                "hierarchy edge {} -> {} in stream {}",
                key.parent, key.child, key.content_stream_id
            )));
        }
        let new_key = relation.key();
        if &new_key != key && self.tables.hierarchy.contains_key(&new_key) {
            return Err(ProjectionError::violation(format!(
                "hierarchy edge {} -> {} already exists in stream {}",
                new_key.parent, new_key.child, new_key.content_stream_id
            )));
        }
        let previous = self.tables.take_hierarchy(key);
        self.undo.push(Undo::Hierarchy(key.clone(), previous));
        self.tables.put_hierarchy(relation.clone());
        self.undo.push(Undo::Hierarchy(new_key, None));
        Ok(())
    }

    fn delete_hierarchy(&mut self, key: &HierarchyKey) -> Result<bool> {
        let previous = self.tables.take_hierarchy(key);
        let existed = previous.is_some();
        if existed {
            self.undo.push(Undo::Hierarchy(key.clone(), previous));
        }
        Ok(existed)
    }

    fn insert_restriction(&mut self, edge: &RestrictionEdge) -> Result<bool> {
        let inserted = self.tables.restrictions.insert(edge.clone());
        if inserted {
            self.undo.push(Undo::RestrictionAdded(edge.clone()));
        }
        Ok(inserted)
    }

    fn delete_restrictions(&mut self, filter: &RestrictionFilter) -> Result<usize> {
        let removed: Vec<RestrictionEdge> = self
            .tables
            .restrictions
            .iter()
            .filter(|edge| filter.matches(edge))
            .cloned()
            .collect();
        for edge in &removed {
            self.tables.restrictions.remove(edge);
        }
        let count = removed.len();
        if count > 0 {
            self.undo.push(Undo::RestrictionsRemoved(removed));
        }
        Ok(count)
    }

    fn insert_reference(&mut self, reference: &ReferenceRelation) -> Result<()> {
        let key = (reference.anchor, reference.name.clone(), reference.position);
        if self.tables.references.contains_key(&key) {
            return Err(ProjectionError::violation(format!(
                "reference {}#{} of node {} already exists",
                reference.name, reference.position, reference.anchor
            )));
        }
        self.tables.references.insert(key.clone(), reference.clone());
        self.undo.push(Undo::ReferenceAdded(key));
        Ok(())
    }

    fn delete_references(
        &mut self,
        anchor: NodeRelationAnchorPoint,
        name: Option<&ReferenceName>,
    ) -> Result<usize> {
        let keys: Vec<ReferenceKey> = self
            .tables
            .references_of(anchor)
            .filter(|((_, n, _), _)| name.map_or(true, |name| name == n))
            .map(|(key, _)| key.clone())
            .collect();
        let removed: Vec<ReferenceRelation> = keys
            .iter()
            .filter_map(|key| self.tables.references.remove(key))
            .collect();
        let count = removed.len();
        if count > 0 {
            self.undo.push(Undo::ReferencesRemoved(removed));
        }
        Ok(count)
    }

    fn mark_processed(&mut self, key: &str) -> Result<()> {
        if self.tables.processed.insert(key.to_owned()) {
            self.undo.push(Undo::Processed(key.to_owned()));
        }
        Ok(())
    }

    fn truncate(&mut self) -> Result<()> {
        // The anchor sequence survives so anchors are never reused.
        let next_anchor = self.tables.next_anchor;
        let previous = std::mem::replace(
            &mut *self.tables,
            Tables {
                next_anchor,
                ..Tables::default()
            },
        );
        self.undo.push(Undo::Truncated(Box::new(previous)));
        Ok(())
    }
}

/// In-process store used by tests, short-lived replays and the CLI's
/// `memory` backend.
///
/// Cloned handles share the same tables. A writer holds the table lock for
/// the whole closure and journals each change; when the closure fails the
/// journal is replayed backwards, so readers see either the pre-event or the
/// post-event state. Nothing is persisted.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl GraphStore for MemoryStore {
    fn read<R>(&self, f: impl FnOnce(&dyn GraphRead) -> Result<R>) -> Result<R> {
        let tables = self.tables.read();
        f(&*tables)
    }

    fn write<R>(&mut self, f: impl FnOnce(&mut dyn GraphTx) -> Result<R>) -> Result<R> {
        let mut tables = self.tables.write();
        let mut journal = Journal {
            tables: &mut *tables,
            undo: Vec::new(),
        };
        match f(&mut journal) {
            Ok(value) => Ok(value),
            Err(err) => {
                let steps = journal.undo.len();
                journal.rollback();
                trace!(error = %err, steps, "storage.memory.rollback");
                Err(err)
            }
        }
    }
}
