use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps the given string.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the underlying string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of an independent, forkable graph timeline.
    ContentStreamId
);

string_id!(
    /// Logical identity shared by all dimensional variants of one node.
    NodeAggregateId
);

string_id!(
    /// Name of a node type as known to the schema collaborator.
    NodeTypeName
);

string_id!(
    /// Name of a node below its parent; carried on hierarchy edges.
    NodeName
);

string_id!(
    /// Name of a reference property.
    ReferenceName
);

/// Opaque surrogate key of one physical node row.
///
/// Allocated by the store from a monotonic sequence and never reused. Value `0`
/// is the sentinel parent of root nodes and never identifies a node row.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeRelationAnchorPoint(pub u64);

impl NodeRelationAnchorPoint {
    /// Sentinel anchor used as the parent of root nodes.
    pub const ROOT_EDGE: NodeRelationAnchorPoint = NodeRelationAnchorPoint(0);

    /// Whether this is the root sentinel.
    pub fn is_root_edge(self) -> bool {
        self == Self::ROOT_EDGE
    }
}

impl fmt::Display for NodeRelationAnchorPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a node aggregate in the tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeAggregateClassification {
    /// Root of a tree; parented by the sentinel anchor.
    Root,
    /// Ordinary node.
    Regular,
    /// Node created together with, and bound to, its parent.
    Tethered,
}

impl NodeAggregateClassification {
    /// Stable string form used in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeAggregateClassification::Root => "root",
            NodeAggregateClassification::Regular => "regular",
            NodeAggregateClassification::Tethered => "tethered",
        }
    }

    /// Parses the storage form.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "root" => Some(NodeAggregateClassification::Root),
            "regular" => Some(NodeAggregateClassification::Regular),
            "tethered" => Some(NodeAggregateClassification::Tethered),
            _ => None,
        }
    }
}

impl fmt::Display for NodeAggregateClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
