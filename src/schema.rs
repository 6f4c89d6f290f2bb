//! Node type lookups used to tell value properties from reference properties.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::NodeTypeName;

/// How a declared property of a node type is stored.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    /// A plain value kept in the node's property map.
    #[default]
    Value,
    /// A single reference kept in the reference table.
    Reference,
    /// A list of references kept in the reference table.
    References,
}

impl PropertyKind {
    /// Whether values of this kind live in the reference table.
    pub fn is_reference(self) -> bool {
        matches!(self, PropertyKind::Reference | PropertyKind::References)
    }
}

/// Node type information consumed by the read side.
pub trait NodeTypeSchema: Send + Sync {
    /// Kind of `property` on `node_type`; unknown properties are values.
    fn property_kind(&self, node_type: &NodeTypeName, property: &str) -> PropertyKind;
}

/// Schema that treats every property as a value.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenSchema;

impl NodeTypeSchema for OpenSchema {
    fn property_kind(&self, _node_type: &NodeTypeName, _property: &str) -> PropertyKind {
        PropertyKind::Value
    }
}

/// Map-backed schema, typically loaded from TOML or JSON:
///
/// ```toml
/// [node_types."Acme:Page".properties]
/// title = "value"
/// related = "references"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticSchema {
    /// Declared node types.
    #[serde(default)]
    pub node_types: BTreeMap<String, NodeTypeDefinition>,
}

/// Declared properties of one node type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeTypeDefinition {
    /// Property name to kind.
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyKind>,
}

impl StaticSchema {
    /// Declares `property` of `node_type` with `kind`.
    pub fn with_property(
        mut self,
        node_type: impl Into<String>,
        property: impl Into<String>,
        kind: PropertyKind,
    ) -> Self {
        self.node_types
            .entry(node_type.into())
            .or_default()
            .properties
            .insert(property.into(), kind);
        self
    }
}

impl NodeTypeSchema for StaticSchema {
    fn property_kind(&self, node_type: &NodeTypeName, property: &str) -> PropertyKind {
        self.node_types
            .get(node_type.as_str())
            .and_then(|definition| definition.properties.get(property))
            .copied()
            .unwrap_or_default()
    }
}
