#![allow(missing_docs)]

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{fork, lang, set_title, title, ChildSpec, Scenario, LIVE};
use contentgraph::graph::Visibility;
use contentgraph::model::ReferenceName;
use contentgraph::projection::{
    ContentGraphEvent, CounterMetrics, EventEnvelope, GraphProjector, NodeReferencesWereSet,
    ProjectorOptions,
};
use contentgraph::storage::MemoryStore;

const USER: &str = "user-workspace";

#[test]
fn mutation_in_a_fork_leaves_the_source_untouched() {
    let mut scenario = Scenario::site(&["en"]);
    scenario.apply(ChildSpec::new("about", "home", "en", &["en"]).event());
    scenario.apply(fork(USER, LIVE));

    let live_before = scenario
        .projector
        .graph()
        .find_node(&LIVE.into(), &"home".into(), &lang("en"))
        .unwrap()
        .unwrap();
    let shared = scenario
        .projector
        .graph()
        .find_node(&USER.into(), &"home".into(), &lang("en"))
        .unwrap()
        .unwrap();
    assert_eq!(live_before.anchor, shared.anchor);

    scenario.apply(set_title(USER, "home", "en", "Draft"));

    let graph = scenario.projector.graph();
    let live_after = graph
        .find_node(&LIVE.into(), &"home".into(), &lang("en"))
        .unwrap()
        .unwrap();
    let user = graph
        .find_node(&USER.into(), &"home".into(), &lang("en"))
        .unwrap()
        .unwrap();

    assert_eq!(live_after.anchor, live_before.anchor);
    assert_eq!(title(&live_after).as_deref(), Some("home"));
    assert_ne!(user.anchor, live_before.anchor);
    assert_eq!(title(&user).as_deref(), Some("Draft"));

    // Children of the copy are reached through the repointed edges.
    let children = graph
        .find_child_nodes(&USER.into(), &"home".into(), &lang("en"), Visibility::VisibleOnly)
        .unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].node_aggregate_id.as_str(), "about");
    let parent = graph
        .find_parent_node(&USER.into(), &"about".into(), &lang("en"))
        .unwrap()
        .unwrap();
    assert_eq!(parent.anchor, user.anchor);
}

#[test]
fn second_mutation_in_the_same_stream_updates_in_place() {
    let metrics = Arc::new(CounterMetrics::default());
    let mut projector = GraphProjector::with_options(
        MemoryStore::new(),
        ProjectorOptions::default().metrics(metrics.clone()),
    );
    let setup: Vec<EventEnvelope> = vec![
        EventEnvelope::new("root", common::root(LIVE, "sites", &["en"])),
        EventEnvelope::new("home", ChildSpec::new("home", "sites", "en", &["en"]).event()),
        EventEnvelope::new("fork", fork(USER, LIVE)),
        EventEnvelope::new("draft-1", set_title(USER, "home", "en", "Draft 1")),
        EventEnvelope::new("draft-2", set_title(USER, "home", "en", "Draft 2")),
    ];
    projector.apply_all(&setup).unwrap();
    assert_eq!(metrics.nodes_copied.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.nodes_updated_in_place.load(Ordering::Relaxed), 1);

    // A node owned by one stream is never copied.
    let mut scenario = Scenario::site(&["en"]);
    scenario.apply(set_title(LIVE, "home", "en", "Live"));
    let stats = contentgraph::admin::stats(scenario.projector.store()).unwrap();
    assert_eq!(stats.nodes, 2);
}

#[test]
fn references_follow_the_copy() {
    let mut scenario = Scenario::site(&["en"]);
    scenario.apply(ChildSpec::new("target", "home", "en", &["en"]).event());
    let references = |cs: &str, destinations: &[&str], name: &str| {
        ContentGraphEvent::NodeReferencesWereSet(NodeReferencesWereSet {
            content_stream_id: cs.into(),
            source_node_aggregate_id: "home".into(),
            source_origin_dimension_space_point: lang("en"),
            reference_name: ReferenceName::new(name),
            destination_node_aggregate_ids: destinations.iter().map(|d| (*d).into()).collect(),
        })
    };
    scenario.apply(references(LIVE, &["target"], "related"));
    scenario.apply(fork(USER, LIVE));
    scenario.apply(references(USER, &["home"], "self"));

    let graph = scenario.projector.graph();
    let live = graph
        .find_references(&LIVE.into(), &"home".into(), &lang("en"))
        .unwrap();
    let user = graph
        .find_references(&USER.into(), &"home".into(), &lang("en"))
        .unwrap();
    let names = |refs: &[contentgraph::ReferenceView]| {
        refs.iter()
            .map(|r| format!("{}->{}", r.name, r.destination))
            .collect::<Vec<_>>()
    };
    assert_eq!(names(&live[..]), ["related->target"]);
    assert_eq!(names(&user[..]), ["related->target", "self->home"]);
}
