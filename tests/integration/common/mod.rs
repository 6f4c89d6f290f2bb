#![allow(dead_code)]

use contentgraph::model::{
    DimensionSpacePoint, DimensionSpacePointSet, NodeAggregateClassification, NodeName,
    NodeTypeName, PropertyValue, PropertyValues,
};
use contentgraph::projection::{
    ApplyOutcome, ContentGraphEvent, ContentStreamWasForked, EventEnvelope, GraphProjector,
    NodeAggregateWithNodeWasCreated, NodePropertiesWereSet, NodeWasHidden, NodeWasShown,
    RootNodeAggregateWithNodeWasCreated,
};
use contentgraph::storage::{GraphStore, MemoryStore};

pub const LIVE: &str = "live";

pub fn lang(value: &str) -> DimensionSpacePoint {
    DimensionSpacePoint::new([("language", value)])
}

pub fn langs(values: &[&str]) -> DimensionSpacePointSet {
    DimensionSpacePointSet::new(values.iter().map(|value| lang(value)))
}

pub fn root(cs: &str, id: &str, visible: &[&str]) -> ContentGraphEvent {
    ContentGraphEvent::RootNodeAggregateWithNodeWasCreated(RootNodeAggregateWithNodeWasCreated {
        content_stream_id: cs.into(),
        node_aggregate_id: id.into(),
        node_type_name: NodeTypeName::new("Acme:Sites"),
        visible_in_dimension_space_points: langs(visible),
        node_aggregate_classification: NodeAggregateClassification::Root,
    })
}

pub struct ChildSpec<'a> {
    pub cs: &'a str,
    pub id: &'a str,
    pub parent: &'a str,
    pub origin: &'a str,
    pub visible: &'a [&'a str],
    pub succeeding: Option<&'a str>,
    pub name: Option<&'a str>,
}

impl<'a> ChildSpec<'a> {
    pub fn new(id: &'a str, parent: &'a str, origin: &'a str, visible: &'a [&'a str]) -> Self {
        Self {
            cs: LIVE,
            id,
            parent,
            origin,
            visible,
            succeeding: None,
            name: None,
        }
    }

    pub fn before(mut self, sibling: &'a str) -> Self {
        self.succeeding = Some(sibling);
        self
    }

    pub fn named(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn event(self) -> ContentGraphEvent {
        let mut properties = PropertyValues::new();
        properties.insert("title".into(), PropertyValue::Str(self.id.to_owned()));
        ContentGraphEvent::NodeAggregateWithNodeWasCreated(NodeAggregateWithNodeWasCreated {
            content_stream_id: self.cs.into(),
            node_aggregate_id: self.id.into(),
            node_type_name: NodeTypeName::new("Acme:Page"),
            origin_dimension_space_point: lang(self.origin),
            visible_in_dimension_space_points: langs(self.visible),
            parent_node_aggregate_id: self.parent.into(),
            succeeding_sibling_node_aggregate_id: self.succeeding.map(Into::into),
            node_name: self.name.map(NodeName::new),
            initial_property_values: properties,
            node_aggregate_classification: NodeAggregateClassification::Regular,
        })
    }
}

pub fn set_title(cs: &str, id: &str, origin: &str, title: &str) -> ContentGraphEvent {
    let mut properties = PropertyValues::new();
    properties.insert("title".into(), PropertyValue::Str(title.to_owned()));
    ContentGraphEvent::NodePropertiesWereSet(NodePropertiesWereSet {
        content_stream_id: cs.into(),
        node_aggregate_id: id.into(),
        origin_dimension_space_point: lang(origin),
        property_values: properties,
    })
}

pub fn hide(cs: &str, id: &str, points: &[&str]) -> ContentGraphEvent {
    ContentGraphEvent::NodeWasHidden(NodeWasHidden {
        content_stream_id: cs.into(),
        node_aggregate_id: id.into(),
        affected_dimension_space_points: langs(points),
    })
}

pub fn show(cs: &str, id: &str, points: &[&str]) -> ContentGraphEvent {
    ContentGraphEvent::NodeWasShown(NodeWasShown {
        content_stream_id: cs.into(),
        node_aggregate_id: id.into(),
        affected_dimension_space_points: langs(points),
    })
}

pub fn fork(target: &str, source: &str) -> ContentGraphEvent {
    ContentGraphEvent::ContentStreamWasForked(ContentStreamWasForked {
        content_stream_id: target.into(),
        source_content_stream_id: source.into(),
    })
}

/// Projector plus an event id counter.
pub struct Scenario<S: GraphStore = MemoryStore> {
    pub projector: GraphProjector<S>,
    next_event: usize,
}

impl Scenario<MemoryStore> {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    /// Root `sites` visible in `points` with one child `home` originating in the first point.
    pub fn site(points: &[&str]) -> Self {
        Self::site_in(MemoryStore::new(), points)
    }
}

impl<S: GraphStore> Scenario<S> {
    pub fn with_store(store: S) -> Self {
        Self {
            projector: GraphProjector::new(store),
            next_event: 0,
        }
    }

    pub fn envelope(&mut self, event: ContentGraphEvent) -> EventEnvelope {
        self.next_event += 1;
        EventEnvelope::new(format!("event-{}", self.next_event), event)
    }

    pub fn apply(&mut self, event: ContentGraphEvent) -> EventEnvelope {
        let envelope = self.envelope(event);
        let outcome = self
            .projector
            .apply(&envelope)
            .unwrap_or_else(|err| panic!("{} failed: {err}", envelope.event_id));
        assert_eq!(outcome, ApplyOutcome::Applied);
        envelope
    }

    pub fn try_apply(&mut self, event: ContentGraphEvent) -> contentgraph::Result<ApplyOutcome> {
        let envelope = self.envelope(event);
        self.projector.apply(&envelope)
    }

    pub fn site_in(store: S, points: &[&str]) -> Self {
        let mut scenario = Self::with_store(store);
        scenario.apply(root(LIVE, "sites", points));
        scenario.apply(ChildSpec::new("home", "sites", points[0], points).named("home").event());
        scenario
    }
}

pub fn title(view: &contentgraph::NodeView) -> Option<String> {
    match view.properties.get("title") {
        Some(PropertyValue::Str(value)) => Some(value.clone()),
        _ => None,
    }
}
