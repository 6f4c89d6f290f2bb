//! Coordinate and identity types shared by the stores, the projector and the read side.

mod dimension;
mod ids;
mod values;

pub use dimension::{DimensionSpacePoint, DimensionSpacePointSet};
pub use ids::{
    ContentStreamId, NodeAggregateClassification, NodeAggregateId, NodeName,
    NodeRelationAnchorPoint, NodeTypeName, ReferenceName,
};
pub use values::{PropertyValue, PropertyValues};
