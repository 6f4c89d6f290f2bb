use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use tracing::{debug, info};

use crate::model::{
    ContentStreamId, DimensionSpacePoint, NodeAggregateClassification, NodeAggregateId, NodeName,
    NodeRelationAnchorPoint, NodeTypeName, PropertyValues, ReferenceName,
};
use crate::types::{ProjectionError, Result};

use super::options::{StoreBackend, StoreOptions};
use super::records::{HierarchyKey, HierarchyRelation, NodeRecord, ReferenceRelation, RestrictionEdge};
use super::store::{GraphRead, GraphStore, GraphTx, HierarchyFilter, RestrictionFilter};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS node (
    anchor INTEGER PRIMARY KEY,
    node_aggregate_id TEXT NOT NULL,
    origin_dimension_space_point TEXT NOT NULL,
    origin_dimension_space_point_hash TEXT NOT NULL,
    properties TEXT NOT NULL,
    node_type_name TEXT NOT NULL,
    classification TEXT NOT NULL,
    node_name TEXT
);
CREATE INDEX IF NOT EXISTS idx_node_aggregate
    ON node(node_aggregate_id, origin_dimension_space_point_hash);

CREATE TABLE IF NOT EXISTS hierarchy_relation (
    parent_anchor INTEGER NOT NULL,
    child_anchor INTEGER NOT NULL,
    name TEXT,
    content_stream_id TEXT NOT NULL,
    dimension_space_point TEXT NOT NULL,
    dimension_space_point_hash TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (parent_anchor, child_anchor, content_stream_id, dimension_space_point_hash)
);
CREATE INDEX IF NOT EXISTS idx_hierarchy_child
    ON hierarchy_relation(child_anchor, content_stream_id);
CREATE INDEX IF NOT EXISTS idx_hierarchy_stream_dimension
    ON hierarchy_relation(content_stream_id, dimension_space_point_hash);

CREATE TABLE IF NOT EXISTS restriction_edge (
    content_stream_id TEXT NOT NULL,
    dimension_space_point_hash TEXT NOT NULL,
    origin_node_aggregate_id TEXT NOT NULL,
    affected_node_aggregate_id TEXT NOT NULL,
    PRIMARY KEY (content_stream_id, dimension_space_point_hash,
                 origin_node_aggregate_id, affected_node_aggregate_id)
);
CREATE INDEX IF NOT EXISTS idx_restriction_affected
    ON restriction_edge(content_stream_id, affected_node_aggregate_id);

CREATE TABLE IF NOT EXISTS reference_relation (
    anchor INTEGER NOT NULL,
    name TEXT NOT NULL,
    position INTEGER NOT NULL,
    destination_node_aggregate_id TEXT NOT NULL,
    PRIMARY KEY (anchor, name, position)
);

CREATE TABLE IF NOT EXISTS processed_event (
    event_key TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);
INSERT OR IGNORE INTO meta(key, value) VALUES ('anchor_sequence', 0);
";

const NODE_COLUMNS: &str = "anchor, node_aggregate_id, origin_dimension_space_point, \
     origin_dimension_space_point_hash, properties, node_type_name, classification, node_name";

const HIERARCHY_COLUMNS: &str = "parent_anchor, child_anchor, name, content_stream_id, \
     dimension_space_point, dimension_space_point_hash, position";

/// Persistent store backed by a SQLite database.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(&StoreOptions::sqlite(path))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, &StoreOptions::memory())
    }

    /// Opens the database named by `options`, which must select the SQLite backend.
    pub fn open_with(options: &StoreOptions) -> Result<Self> {
        let path = match &options.backend {
            StoreBackend::Sqlite(path) => path,
            StoreBackend::Memory => {
                return Err(ProjectionError::InvalidArgument(
                    "store options select the in-memory backend".into(),
                ))
            }
        };
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "storage.sqlite.open");
        Self::init(conn, options)
    }

    fn init(conn: Connection, options: &StoreOptions) -> Result<Self> {
        conn.pragma_update(None, "synchronous", options.synchronous.as_str())?;
        let journal_mode: String = conn.pragma_update_and_check(
            None,
            "journal_mode",
            options.journal_mode.as_str(),
            |row| row.get(0),
        )?;
        debug!(journal_mode = %journal_mode, "storage.sqlite.pragmas");
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl GraphStore for SqliteStore {
    fn read<R>(&self, f: impl FnOnce(&dyn GraphRead) -> Result<R>) -> Result<R> {
        // Dropping the transaction rolls it back; it only pins a snapshot.
        let view = SqliteTx {
            tx: self.conn.unchecked_transaction()?,
        };
        f(&view)
    }

    fn write<R>(&mut self, f: impl FnOnce(&mut dyn GraphTx) -> Result<R>) -> Result<R> {
        let mut view = SqliteTx {
            tx: self.conn.transaction()?,
        };
        match f(&mut view) {
            Ok(value) => {
                view.tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = view.tx.rollback() {
                    debug!(error = %rollback, "storage.sqlite.rollback_failed");
                }
                Err(err)
            }
        }
    }
}

struct SqliteTx<'c> {
    tx: Transaction<'c>,
}

fn anchor_to_sql(anchor: NodeRelationAnchorPoint) -> Result<i64> {
    i64::try_from(anchor.0).map_err(|_| {
        ProjectionError::InvalidArgument(format!("anchor {anchor} exceeds the SQLite integer range"))
    })
}

fn anchor_from_sql(table: &'static str, raw: i64) -> Result<NodeRelationAnchorPoint> {
    u64::try_from(raw)
        .map(NodeRelationAnchorPoint)
        .map_err(|_| ProjectionError::malformed(table, format!("negative anchor {raw}")))
}

fn push_in(clauses: &mut Vec<String>, params: &mut Vec<Value>, column: &str, values: &[String]) {
    if values.is_empty() {
        clauses.push("1 = 0".to_owned());
        return;
    }
    let marks = vec!["?"; values.len()].join(", ");
    clauses.push(format!("{column} IN ({marks})"));
    params.extend(values.iter().cloned().map(Value::Text));
}

fn where_sql(clauses: &[String]) -> String {
    if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    }
}

fn hierarchy_where(filter: &HierarchyFilter) -> Result<(String, Vec<Value>)> {
    let mut clauses = Vec::new();
    let mut params = Vec::new();
    if let Some(parent) = filter.parent {
        clauses.push("parent_anchor = ?".to_owned());
        params.push(Value::Integer(anchor_to_sql(parent)?));
    }
    if let Some(child) = filter.child {
        clauses.push("child_anchor = ?".to_owned());
        params.push(Value::Integer(anchor_to_sql(child)?));
    }
    if let Some(anchor) = filter.touching {
        let raw = anchor_to_sql(anchor)?;
        clauses.push("(parent_anchor = ? OR child_anchor = ?)".to_owned());
        params.push(Value::Integer(raw));
        params.push(Value::Integer(raw));
    }
    if let Some(cs) = &filter.content_stream_id {
        clauses.push("content_stream_id = ?".to_owned());
        params.push(Value::Text(cs.as_str().to_owned()));
    }
    if let Some(hashes) = &filter.dimension_space_point_hashes {
        push_in(&mut clauses, &mut params, "dimension_space_point_hash", hashes);
    }
    Ok((where_sql(&clauses), params))
}

fn restriction_where(filter: &RestrictionFilter) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut params = Vec::new();
    if let Some(cs) = &filter.content_stream_id {
        clauses.push("content_stream_id = ?".to_owned());
        params.push(Value::Text(cs.as_str().to_owned()));
    }
    if let Some(hashes) = &filter.dimension_space_point_hashes {
        push_in(&mut clauses, &mut params, "dimension_space_point_hash", hashes);
    }
    if let Some(origin) = &filter.origin {
        clauses.push("origin_node_aggregate_id = ?".to_owned());
        params.push(Value::Text(origin.as_str().to_owned()));
    }
    if let Some(affected) = &filter.affected {
        clauses.push("affected_node_aggregate_id = ?".to_owned());
        params.push(Value::Text(affected.as_str().to_owned()));
    }
    (where_sql(&clauses), params)
}

struct RawNode {
    anchor: i64,
    node_aggregate_id: String,
    origin: String,
    origin_hash: String,
    properties: String,
    node_type_name: String,
    classification: String,
    node_name: Option<String>,
}

fn raw_node(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawNode> {
    Ok(RawNode {
        anchor: row.get(0)?,
        node_aggregate_id: row.get(1)?,
        origin: row.get(2)?,
        origin_hash: row.get(3)?,
        properties: row.get(4)?,
        node_type_name: row.get(5)?,
        classification: row.get(6)?,
        node_name: row.get(7)?,
    })
}

fn decode_node(raw: RawNode) -> Result<NodeRecord> {
    const TABLE: &str = "node";
    let anchor = anchor_from_sql(TABLE, raw.anchor)?;
    let origin = DimensionSpacePoint::from_json(&raw.origin).map_err(|err| {
        ProjectionError::malformed(TABLE, format!("anchor {anchor}: origin: {err}"))
    })?;
    if origin.hash() != raw.origin_hash {
        return Err(ProjectionError::malformed(
            TABLE,
            format!("anchor {anchor}: origin hash {} does not match {origin}", raw.origin_hash),
        ));
    }
    let properties: PropertyValues = serde_json::from_str(&raw.properties).map_err(|err| {
        ProjectionError::malformed(TABLE, format!("anchor {anchor}: properties: {err}"))
    })?;
    let classification = NodeAggregateClassification::parse(&raw.classification).ok_or_else(|| {
        ProjectionError::malformed(
            TABLE,
            format!("anchor {anchor}: unknown classification {:?}", raw.classification),
        )
    })?;
    if raw.node_aggregate_id.is_empty() {
        return Err(ProjectionError::malformed(
            TABLE,
            format!("anchor {anchor}: empty node aggregate id"),
        ));
    }
    Ok(NodeRecord {
        anchor,
        node_aggregate_id: NodeAggregateId::new(raw.node_aggregate_id),
        origin,
        properties,
        node_type_name: NodeTypeName::new(raw.node_type_name),
        classification,
        node_name: raw.node_name.map(NodeName::new),
    })
}

struct RawHierarchy {
    parent: i64,
    child: i64,
    name: Option<String>,
    content_stream_id: String,
    dimension_space_point: String,
    dimension_space_point_hash: String,
    position: i64,
}

fn raw_hierarchy(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawHierarchy> {
    Ok(RawHierarchy {
        parent: row.get(0)?,
        child: row.get(1)?,
        name: row.get(2)?,
        content_stream_id: row.get(3)?,
        dimension_space_point: row.get(4)?,
        dimension_space_point_hash: row.get(5)?,
        position: row.get(6)?,
    })
}

fn decode_hierarchy(raw: RawHierarchy) -> Result<HierarchyRelation> {
    const TABLE: &str = "hierarchy_relation";
    let parent = anchor_from_sql(TABLE, raw.parent)?;
    let child = anchor_from_sql(TABLE, raw.child)?;
    let dimension_space_point =
        DimensionSpacePoint::from_json(&raw.dimension_space_point).map_err(|err| {
            ProjectionError::malformed(TABLE, format!("edge {parent} -> {child}: {err}"))
        })?;
    if dimension_space_point.hash() != raw.dimension_space_point_hash {
        return Err(ProjectionError::malformed(
            TABLE,
            format!(
                "edge {parent} -> {child}: hash {} does not match {dimension_space_point}",
                raw.dimension_space_point_hash
            ),
        ));
    }
    Ok(HierarchyRelation {
        parent,
        child,
        name: raw.name.map(NodeName::new),
        content_stream_id: ContentStreamId::new(raw.content_stream_id),
        dimension_space_point,
        position: raw.position,
    })
}

fn decode_reference(raw: (i64, String, i64, String)) -> Result<ReferenceRelation> {
    Ok(ReferenceRelation {
        anchor: anchor_from_sql("reference_relation", raw.0)?,
        name: ReferenceName::new(raw.1),
        position: raw.2,
        destination: NodeAggregateId::new(raw.3),
    })
}

impl SqliteTx<'_> {
    fn conn(&self) -> &Connection {
        &self.tx
    }

    fn query_nodes(&self, tail: &str, params: &[Value]) -> Result<Vec<NodeRecord>> {
        let sql = format!("SELECT {NODE_COLUMNS} FROM node{tail} ORDER BY anchor");
        let mut stmt = self.conn().prepare_cached(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), raw_node)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(decode_node(row?)?);
        }
        Ok(out)
    }

    fn hierarchy_row_params(relation: &HierarchyRelation) -> Result<[Value; 7]> {
        Ok([
            Value::Integer(anchor_to_sql(relation.parent)?),
            Value::Integer(anchor_to_sql(relation.child)?),
            relation
                .name
                .as_ref()
                .map_or(Value::Null, |name| Value::Text(name.as_str().to_owned())),
            Value::Text(relation.content_stream_id.as_str().to_owned()),
            Value::Text(relation.dimension_space_point.to_json()),
            Value::Text(relation.dimension_space_point_hash().to_owned()),
            Value::Integer(relation.position),
        ])
    }

    fn hierarchy_exists(&self, key: &HierarchyKey) -> Result<bool> {
        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM hierarchy_relation WHERE parent_anchor = ?1 AND child_anchor = ?2 \
                 AND content_stream_id = ?3 AND dimension_space_point_hash = ?4",
                params![
                    anchor_to_sql(key.parent)?,
                    anchor_to_sql(key.child)?,
                    key.content_stream_id.as_str(),
                    key.dimension_space_point_hash
                ],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

impl GraphRead for SqliteTx<'_> {
    fn node(&self, anchor: NodeRelationAnchorPoint) -> Result<Option<NodeRecord>> {
        let raw = self
            .conn()
            .query_row(
                &format!("SELECT {NODE_COLUMNS} FROM node WHERE anchor = ?1"),
                [anchor_to_sql(anchor)?],
                raw_node,
            )
            .optional()?;
        raw.map(decode_node).transpose()
    }

    fn nodes_by_aggregate(&self, id: &NodeAggregateId) -> Result<Vec<NodeRecord>> {
        self.query_nodes(
            " WHERE node_aggregate_id = ?",
            &[Value::Text(id.as_str().to_owned())],
        )
    }

    fn all_nodes(&self) -> Result<Vec<NodeRecord>> {
        self.query_nodes("", &[])
    }

    fn count_nodes(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM node", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn hierarchy(&self, filter: &HierarchyFilter) -> Result<Vec<HierarchyRelation>> {
        let (tail, params) = hierarchy_where(filter)?;
        let sql = format!(
            "SELECT {HIERARCHY_COLUMNS} FROM hierarchy_relation{tail} ORDER BY position, \
             parent_anchor, child_anchor, content_stream_id, dimension_space_point_hash"
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), raw_hierarchy)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(decode_hierarchy(row?)?);
        }
        Ok(out)
    }

    fn restrictions(&self, filter: &RestrictionFilter) -> Result<Vec<RestrictionEdge>> {
        let (tail, params) = restriction_where(filter);
        let sql = format!(
            "SELECT content_stream_id, dimension_space_point_hash, origin_node_aggregate_id, \
             affected_node_aggregate_id FROM restriction_edge{tail} ORDER BY content_stream_id, \
             dimension_space_point_hash, origin_node_aggregate_id, affected_node_aggregate_id"
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            Ok(RestrictionEdge {
                content_stream_id: ContentStreamId::new(row.get::<_, String>(0)?),
                dimension_space_point_hash: row.get(1)?,
                origin: NodeAggregateId::new(row.get::<_, String>(2)?),
                affected: NodeAggregateId::new(row.get::<_, String>(3)?),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn references(&self, anchor: NodeRelationAnchorPoint) -> Result<Vec<ReferenceRelation>> {
        let mut stmt = self.conn().prepare_cached(
            "SELECT anchor, name, position, destination_node_aggregate_id FROM reference_relation \
             WHERE anchor = ?1 ORDER BY name, position",
        )?;
        let rows = stmt.query_map([anchor_to_sql(anchor)?], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(decode_reference(row?)?);
        }
        Ok(out)
    }

    fn all_references(&self) -> Result<Vec<ReferenceRelation>> {
        let mut stmt = self.conn().prepare_cached(
            "SELECT anchor, name, position, destination_node_aggregate_id FROM reference_relation \
             ORDER BY anchor, name, position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(decode_reference(row?)?);
        }
        Ok(out)
    }

    fn is_processed(&self, key: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM processed_event WHERE event_key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn processed_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM processed_event", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn content_streams(&self) -> Result<Vec<ContentStreamId>> {
        let mut stmt = self.conn().prepare_cached(
            "SELECT DISTINCT content_stream_id FROM hierarchy_relation ORDER BY content_stream_id",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(ContentStreamId::new(row?));
        }
        Ok(out)
    }
}

impl GraphTx for SqliteTx<'_> {
    fn allocate_anchor(&mut self) -> Result<NodeRelationAnchorPoint> {
        let next: i64 = self.conn().query_row(
            "UPDATE meta SET value = value + 1 WHERE key = 'anchor_sequence' RETURNING value",
            [],
            |row| row.get(0),
        )?;
        anchor_from_sql("meta", next)
    }

    fn insert_node(&mut self, node: &NodeRecord) -> Result<()> {
        if node.anchor.is_root_edge() {
            return Err(ProjectionError::InvalidArgument(
                "the root sentinel anchor cannot hold a node row".into(),
            ));
        }
        if self.node(node.anchor)?.is_some() {
            return Err(ProjectionError::violation(format!(
                "node anchor {} already in use",
                node.anchor
            )));
        }
        self.conn().execute(
            &format!("INSERT INTO node ({NODE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            params![
                anchor_to_sql(node.anchor)?,
                node.node_aggregate_id.as_str(),
                node.origin.to_json(),
                node.origin.hash(),
                serde_json::to_string(&node.properties)?,
                node.node_type_name.as_str(),
                node.classification.as_str(),
                node.node_name.as_ref().map(NodeName::as_str),
            ],
        )?;
        Ok(())
    }

    fn update_node(&mut self, node: &NodeRecord) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE node SET node_aggregate_id = ?2, origin_dimension_space_point = ?3, \
             origin_dimension_space_point_hash = ?4, properties = ?5, node_type_name = ?6, \
             classification = ?7, node_name = ?8 WHERE anchor = ?1",
            params![
                anchor_to_sql(node.anchor)?,
                node.node_aggregate_id.as_str(),
                node.origin.to_json(),
                node.origin.hash(),
                serde_json::to_string(&node.properties)?,
                node.node_type_name.as_str(),
                node.classification.as_str(),
                node.node_name.as_ref().map(NodeName::as_str),
            ],
        )?;
        if changed == 0 {
            return Err(ProjectionError::not_found(format!("node {}", node.anchor)));
        }
        Ok(())
    }

    fn delete_node(&mut self, anchor: NodeRelationAnchorPoint) -> Result<bool> {
        let changed = self
            .conn()
            .execute("DELETE FROM node WHERE anchor = ?1", [anchor_to_sql(anchor)?])?;
        Ok(changed > 0)
    }

    fn insert_hierarchy(&mut self, relation: &HierarchyRelation) -> Result<()> {
        let key = relation.key();
        if self.hierarchy_exists(&key)? {
            return Err(ProjectionError::violation(format!(
                "hierarchy edge {} -> {} already exists in stream {} at {}",
                key.parent, key.child, key.content_stream_id, relation.dimension_space_point
            )));
        }
        let row = Self::hierarchy_row_params(relation)?;
        self.conn().execute(
            &format!(
                "INSERT INTO hierarchy_relation ({HIERARCHY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            ),
            params_from_iter(row.iter()),
        )?;
        Ok(())
    }

    fn update_hierarchy(&mut self, key: &HierarchyKey, relation: &HierarchyRelation) -> Result<()> {
        let new_key = relation.key();
        if &new_key != key && self.hierarchy_exists(&new_key)? {
            return Err(ProjectionError::violation(format!(
                "hierarchy edge {} -> {} already exists in stream {}",
                new_key.parent, new_key.child, new_key.content_stream_id
            )));
        }
        let row = Self::hierarchy_row_params(relation)?;
        let mut values: Vec<Value> = row.into_iter().collect();
        values.push(Value::Integer(anchor_to_sql(key.parent)?));
        values.push(Value::Integer(anchor_to_sql(key.child)?));
        values.push(Value::Text(key.content_stream_id.as_str().to_owned()));
        values.push(Value::Text(key.dimension_space_point_hash.clone()));
        let changed = self.conn().execute(
            "UPDATE hierarchy_relation SET parent_anchor = ?1, child_anchor = ?2, name = ?3, \
             content_stream_id = ?4, dimension_space_point = ?5, dimension_space_point_hash = ?6, \
             position = ?7 WHERE parent_anchor = ?8 AND child_anchor = ?9 \
             AND content_stream_id = ?10 AND dimension_space_point_hash = ?11",
            params_from_iter(values.iter()),
        )?;
        if changed == 0 {
            return Err(ProjectionError::not_found(format!(
                "hierarchy edge {} -> {} in stream {}",
                key.parent, key.child, key.content_stream_id
            )));
        }
        Ok(())
    }

    fn delete_hierarchy(&mut self, key: &HierarchyKey) -> Result<bool> {
        let changed = self.conn().execute(
            "DELETE FROM hierarchy_relation WHERE parent_anchor = ?1 AND child_anchor = ?2 \
             AND content_stream_id = ?3 AND dimension_space_point_hash = ?4",
            params![
                anchor_to_sql(key.parent)?,
                anchor_to_sql(key.child)?,
                key.content_stream_id.as_str(),
                key.dimension_space_point_hash
            ],
        )?;
        Ok(changed > 0)
    }

    fn insert_restriction(&mut self, edge: &RestrictionEdge) -> Result<bool> {
        let changed = self.conn().execute(
            "INSERT OR IGNORE INTO restriction_edge (content_stream_id, dimension_space_point_hash, \
             origin_node_aggregate_id, affected_node_aggregate_id) VALUES (?1, ?2, ?3, ?4)",
            params![
                edge.content_stream_id.as_str(),
                edge.dimension_space_point_hash,
                edge.origin.as_str(),
                edge.affected.as_str()
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete_restrictions(&mut self, filter: &RestrictionFilter) -> Result<usize> {
        let (tail, params) = restriction_where(filter);
        let changed = self.conn().execute(
            &format!("DELETE FROM restriction_edge{tail}"),
            params_from_iter(params.iter()),
        )?;
        Ok(changed)
    }

    fn insert_reference(&mut self, reference: &ReferenceRelation) -> Result<()> {
        self.conn().execute(
            "INSERT INTO reference_relation (anchor, name, position, destination_node_aggregate_id) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                anchor_to_sql(reference.anchor)?,
                reference.name.as_str(),
                reference.position,
                reference.destination.as_str()
            ],
        )?;
        Ok(())
    }

    fn delete_references(
        &mut self,
        anchor: NodeRelationAnchorPoint,
        name: Option<&ReferenceName>,
    ) -> Result<usize> {
        let raw = anchor_to_sql(anchor)?;
        let changed = match name {
            Some(name) => self.conn().execute(
                "DELETE FROM reference_relation WHERE anchor = ?1 AND name = ?2",
                params![raw, name.as_str()],
            )?,
            None => self
                .conn()
                .execute("DELETE FROM reference_relation WHERE anchor = ?1", [raw])?,
        };
        Ok(changed)
    }

    fn mark_processed(&mut self, key: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO processed_event (event_key) VALUES (?1)",
            [key],
        )?;
        Ok(())
    }

    fn truncate(&mut self) -> Result<()> {
        self.conn().execute_batch(
            "DELETE FROM node;
             DELETE FROM hierarchy_relation;
             DELETE FROM restriction_edge;
             DELETE FROM reference_relation;
             DELETE FROM processed_event;",
        )?;
        Ok(())
    }

    fn copy_content_stream(
        &mut self,
        source: &ContentStreamId,
        target: &ContentStreamId,
    ) -> Result<()> {
        let edges = self.conn().execute(
            &format!(
                "INSERT INTO hierarchy_relation ({HIERARCHY_COLUMNS}) \
                 SELECT parent_anchor, child_anchor, name, ?2, dimension_space_point, \
                 dimension_space_point_hash, position FROM hierarchy_relation \
                 WHERE content_stream_id = ?1"
            ),
            params![source.as_str(), target.as_str()],
        )?;
        let restrictions = self.conn().execute(
            "INSERT OR IGNORE INTO restriction_edge (content_stream_id, dimension_space_point_hash, \
             origin_node_aggregate_id, affected_node_aggregate_id) \
             SELECT ?2, dimension_space_point_hash, origin_node_aggregate_id, \
             affected_node_aggregate_id FROM restriction_edge WHERE content_stream_id = ?1",
            params![source.as_str(), target.as_str()],
        )?;
        debug!(
            source = %source,
            target = %target,
            edges,
            restrictions,
            "storage.sqlite.copy_content_stream"
        );
        Ok(())
    }
}
