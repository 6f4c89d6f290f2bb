#![allow(missing_docs)]

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{hide, lang, langs, root, set_title, show, title, ChildSpec, Scenario, LIVE};
use contentgraph::graph::Visibility;
use contentgraph::model::{
    ContentStreamId, DimensionSpacePoint, NodeAggregateClassification, NodeAggregateId, NodeName,
    NodeTypeName, ReferenceName,
};
use contentgraph::projection::{
    ApplyOutcome, ContentGraphEvent, CounterMetrics, EventEnvelope, GraphProjector, NodeAggregateNameWasChanged,
    NodeReferencesWereSet, ProjectorOptions,
};
use contentgraph::schema::{PropertyKind, StaticSchema};
use contentgraph::storage::MemoryStore;
use contentgraph::ProjectionError;

#[test]
fn hidden_in_one_language_stays_visible_in_the_other() {
    let mut scenario = Scenario::new();
    scenario.apply(root(LIVE, "sites", &["en", "de"]));
    scenario.apply(ChildSpec::new("c", "sites", "en", &["en", "de"]).event());
    let cs: ContentStreamId = LIVE.into();
    let c: NodeAggregateId = "c".into();

    scenario.apply(hide(LIVE, "c", &["de"]));
    let graph = scenario.projector.graph();
    assert!(!graph.is_hidden(&cs, &c, &lang("en")).unwrap());
    assert!(graph.is_hidden(&cs, &c, &lang("de")).unwrap());

    scenario.apply(show(LIVE, "c", &["de"]));
    let graph = scenario.projector.graph();
    assert!(!graph.is_hidden(&cs, &c, &lang("en")).unwrap());
    assert!(!graph.is_hidden(&cs, &c, &lang("de")).unwrap());
}

#[test]
fn replaying_an_event_is_a_no_op() {
    let mut scenario = Scenario::site(&["en"]);
    let envelope = scenario.apply(set_title(LIVE, "home", "en", "Welcome"));
    let before = contentgraph::admin::stats(scenario.projector.store()).unwrap();

    assert_eq!(
        scenario.projector.apply(&envelope).unwrap(),
        ApplyOutcome::AlreadyProcessed
    );
    assert!(scenario.projector.has_processed(&[envelope]).unwrap());

    let after = contentgraph::admin::stats(scenario.projector.store()).unwrap();
    assert_eq!(before.nodes, after.nodes);
    assert_eq!(before.hierarchy_edges, after.hierarchy_edges);
    assert_eq!(before.processed_events, after.processed_events);
}

#[test]
fn batch_replay_reports_already_processed_events() {
    let mut scenario = Scenario::new();
    let events = vec![
        scenario.envelope(root(LIVE, "sites", &["en"])),
        scenario.envelope(ChildSpec::new("home", "sites", "en", &["en"]).event()),
    ];
    let first = scenario.projector.apply_all(&events).unwrap();
    assert_eq!((first.applied, first.already_processed), (2, 0));
    let second = scenario.projector.apply_all(&events).unwrap();
    assert_eq!((second.applied, second.already_processed), (0, 2));
}

#[test]
fn children_come_back_in_sibling_order_with_names() {
    let mut scenario = Scenario::site(&["en"]);
    scenario.apply(ChildSpec::new("about", "home", "en", &["en"]).named("about").event());
    scenario.apply(ChildSpec::new("contact", "home", "en", &["en"]).named("contact").event());
    scenario.apply(
        ChildSpec::new("news", "home", "en", &["en"])
            .named("news")
            .before("contact")
            .event(),
    );

    let graph = scenario.projector.graph();
    let children = graph
        .find_child_nodes(&LIVE.into(), &"home".into(), &lang("en"), Visibility::VisibleOnly)
        .unwrap();
    let ids: Vec<_> = children.iter().map(|c| c.node_aggregate_id.as_str()).collect();
    assert_eq!(ids, ["about", "news", "contact"]);
    assert_eq!(children[1].node_name, Some(NodeName::new("news")));

    let parent = graph
        .find_parent_node(&LIVE.into(), &"news".into(), &lang("en"))
        .unwrap()
        .unwrap();
    assert_eq!(parent.node_aggregate_id.as_str(), "home");
    assert!(graph
        .find_parent_node(&LIVE.into(), &"sites".into(), &lang("en"))
        .unwrap()
        .is_none());
}

#[test]
fn hidden_children_are_filtered_unless_requested() {
    let mut scenario = Scenario::site(&["en"]);
    scenario.apply(ChildSpec::new("a", "home", "en", &["en"]).event());
    scenario.apply(ChildSpec::new("b", "home", "en", &["en"]).event());
    scenario.apply(hide(LIVE, "a", &["en"]));

    let graph = scenario.projector.graph();
    let visible = graph
        .find_child_nodes(&LIVE.into(), &"home".into(), &lang("en"), Visibility::VisibleOnly)
        .unwrap();
    assert_eq!(visible.len(), 1);
    let all = graph
        .find_child_nodes(&LIVE.into(), &"home".into(), &lang("en"), Visibility::IncludeHidden)
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn renaming_updates_every_edge_of_the_stream() {
    let mut scenario = Scenario::site(&["en", "de"]);
    scenario.apply(ContentGraphEvent::NodeAggregateNameWasChanged(
        NodeAggregateNameWasChanged {
            content_stream_id: LIVE.into(),
            node_aggregate_id: "home".into(),
            new_node_name: NodeName::new("start"),
        },
    ));
    let graph = scenario.projector.graph();
    for point in ["en", "de"] {
        let view = graph
            .find_nodes_by_aggregate(&LIVE.into(), &"home".into(), Some(&langs(&[point])))
            .unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].node_name, Some(NodeName::new("start")));
    }
    let occupied = graph
        .dimension_space_points_occupied_by_child_node_name(
            &LIVE.into(),
            &NodeName::new("start"),
            &"sites".into(),
            &DimensionSpacePoint::empty(),
            &langs(&["en", "de", "fr"]),
        )
        .unwrap();
    assert_eq!(occupied, langs(&["en", "de"]));
    let aggregate = graph
        .find_node_aggregate(&LIVE.into(), &"home".into())
        .unwrap()
        .unwrap();
    assert_eq!(aggregate.node_name, Some(NodeName::new("start")));
}

#[test]
fn references_are_replaced_by_name() {
    let mut scenario = Scenario::site(&["en"]);
    scenario.apply(ChildSpec::new("a", "home", "en", &["en"]).event());
    scenario.apply(ChildSpec::new("b", "home", "en", &["en"]).event());
    let set = |destinations: &[&str]| {
        ContentGraphEvent::NodeReferencesWereSet(NodeReferencesWereSet {
            content_stream_id: LIVE.into(),
            source_node_aggregate_id: "home".into(),
            source_origin_dimension_space_point: lang("en"),
            reference_name: ReferenceName::new("related"),
            destination_node_aggregate_ids: destinations.iter().map(|d| (*d).into()).collect(),
        })
    };
    scenario.apply(set(&["a", "b"]));
    scenario.apply(set(&["b"]));

    let references = scenario
        .projector
        .graph()
        .find_references(&LIVE.into(), &"home".into(), &lang("en"))
        .unwrap();
    assert_eq!(references.len(), 1);
    assert_eq!(references[0].destination.as_str(), "b");
    assert_eq!(references[0].position, 0);
}

#[test]
fn reference_properties_are_hidden_from_views() {
    let mut scenario = Scenario::site(&["en"]);
    scenario.apply(set_title(LIVE, "home", "en", "Welcome"));
    let schema = StaticSchema::default().with_property("Acme:Page", "title", PropertyKind::Reference);

    let plain = scenario
        .projector
        .graph()
        .find_node(&LIVE.into(), &"home".into(), &lang("en"))
        .unwrap()
        .unwrap();
    assert_eq!(title(&plain).as_deref(), Some("Welcome"));

    let filtered = scenario
        .projector
        .graph()
        .with_schema(Arc::new(schema))
        .find_node(&LIVE.into(), &"home".into(), &lang("en"))
        .unwrap()
        .unwrap();
    assert!(title(&filtered).is_none());
}

#[test]
fn disagreeing_rows_make_the_aggregate_ambiguous() {
    let mut scenario = Scenario::site(&["en", "de"]);
    scenario.apply(ChildSpec::new("twin", "home", "en", &["en"]).event());
    let mut other = match ChildSpec::new("twin", "home", "de", &["de"]).event() {
        ContentGraphEvent::NodeAggregateWithNodeWasCreated(event) => event,
        _ => unreachable!(),
    };
    other.node_type_name = NodeTypeName::new("Acme:Other");
    scenario.apply(ContentGraphEvent::NodeAggregateWithNodeWasCreated(other));

    let err = scenario
        .projector
        .graph()
        .find_node_aggregate(&LIVE.into(), &"twin".into())
        .unwrap_err();
    assert!(matches!(err, ProjectionError::AmbiguousAggregate { .. }));
}

#[test]
fn edges_with_different_names_make_the_aggregate_ambiguous() {
    let mut scenario = Scenario::site(&["en", "de"]);
    scenario.apply(ChildSpec::new("twin", "home", "en", &["en"]).named("left").event());
    scenario.apply(ChildSpec::new("twin", "home", "de", &["de"]).named("right").event());

    let err = scenario
        .projector
        .graph()
        .find_node_aggregate(&LIVE.into(), &"twin".into())
        .unwrap_err();
    match err {
        ProjectionError::AmbiguousAggregate { detail, .. } => assert!(detail.contains("node names")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn aggregate_reports_occupied_and_covered_points() {
    let scenario = Scenario::site(&["en", "de"]);
    let aggregate = scenario
        .projector
        .graph()
        .find_node_aggregate(&LIVE.into(), &"home".into())
        .unwrap()
        .unwrap();
    assert_eq!(aggregate.occupied_dimension_space_points, langs(&["en"]));
    assert_eq!(aggregate.covered_dimension_space_points, langs(&["en", "de"]));
    assert_eq!(aggregate.classification, NodeAggregateClassification::Regular);
    assert_eq!(aggregate.nodes.len(), 1);
}

#[test]
fn missing_mandatory_node_rolls_back_the_event() {
    let metrics = Arc::new(CounterMetrics::default());
    let mut projector = GraphProjector::with_options(
        MemoryStore::new(),
        ProjectorOptions::default().metrics(metrics.clone()),
    );
    let bad = EventEnvelope::new("bad", set_title(LIVE, "nobody", "en", "x"));

    let err = projector.apply(&bad).unwrap_err();
    match &err {
        ProjectionError::Event { event_id, .. } => assert_eq!(event_id, &bad.event_id),
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(err.root_cause(), ProjectionError::ConsistencyViolation(_)));
    assert!(projector.is_empty().unwrap());
    assert!(!projector.has_processed(&[bad]).unwrap());
    assert_eq!(metrics.events_failed.load(Ordering::Relaxed), 1);
}

#[test]
fn reset_empties_the_projection() {
    let mut scenario = Scenario::site(&["en"]);
    assert!(!scenario.projector.is_empty().unwrap());
    scenario.projector.reset().unwrap();
    assert!(scenario.projector.is_empty().unwrap());
    let stats = contentgraph::admin::stats(scenario.projector.store()).unwrap();
    assert_eq!(stats.processed_events, 0);
    assert_eq!(stats.hierarchy_edges, 0);
}
