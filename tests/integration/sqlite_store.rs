#![allow(missing_docs)]

mod common;

use common::{fork, hide, lang, set_title, title, ChildSpec, Scenario, LIVE};
use contentgraph::admin::{stats, verify, VerifyLevel};
use contentgraph::projection::GraphProjector;
use contentgraph::storage::{GraphStore, SqliteStore, StoreOptions};
use contentgraph::ProjectionError;
use rusqlite::params;
use tempfile::tempdir;

const USER: &str = "user-workspace";

#[test]
fn projection_survives_reopening_the_database() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("graph.sqlite3");

    let mut scenario = Scenario::site_in(SqliteStore::open(&path).unwrap(), &["en", "de"]);
    scenario.apply(ChildSpec::new("about", "home", "en", &["en", "de"]).event());
    let hidden = scenario.apply(hide(LIVE, "about", &["de"]));
    drop(scenario);

    let projector = GraphProjector::new(SqliteStore::open(&path).unwrap());
    assert!(projector.has_processed(&[hidden]).unwrap());
    let graph = projector.graph();
    let about = graph
        .find_node(&LIVE.into(), &"about".into(), &lang("en"))
        .unwrap()
        .unwrap();
    assert_eq!(title(&about).as_deref(), Some("about"));
    assert!(graph.is_hidden(&LIVE.into(), &"about".into(), &lang("de")).unwrap());
    assert!(verify(projector.store(), VerifyLevel::Full).unwrap().success);
}

#[test]
fn failed_event_leaves_no_trace() {
    let mut scenario = Scenario::site_in(SqliteStore::open_in_memory().unwrap(), &["en"]);
    let before = stats(scenario.projector.store()).unwrap();

    let err = scenario
        .try_apply(set_title(LIVE, "nobody", "en", "lost"))
        .unwrap_err();
    assert!(matches!(err.root_cause(), ProjectionError::ConsistencyViolation(_)));

    let after = stats(scenario.projector.store()).unwrap();
    assert_eq!(before.nodes, after.nodes);
    assert_eq!(before.hierarchy_edges, after.hierarchy_edges);
    assert_eq!(before.processed_events, after.processed_events);
}

#[test]
fn copy_on_write_behaves_like_the_memory_store() {
    let mut scenario = Scenario::site_in(SqliteStore::open_in_memory().unwrap(), &["en"]);
    scenario.apply(ChildSpec::new("about", "home", "en", &["en"]).event());
    scenario.apply(fork(USER, LIVE));
    scenario.apply(set_title(USER, "home", "en", "Draft"));

    let graph = scenario.projector.graph();
    let live = graph
        .find_node(&LIVE.into(), &"home".into(), &lang("en"))
        .unwrap()
        .unwrap();
    let user = graph
        .find_node(&USER.into(), &"home".into(), &lang("en"))
        .unwrap()
        .unwrap();
    assert_ne!(live.anchor, user.anchor);
    assert_eq!(title(&live).as_deref(), Some("home"));
    assert_eq!(title(&user).as_deref(), Some("Draft"));
    let about_parent = graph
        .find_parent_node(&USER.into(), &"about".into(), &lang("en"))
        .unwrap()
        .unwrap();
    assert_eq!(about_parent.anchor, user.anchor);
    assert_eq!(stats(scenario.projector.store()).unwrap().nodes, 4);
}

#[test]
fn undecodable_rows_are_reported_as_malformed() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
        .connection()
        .execute(
            "INSERT INTO node (anchor, node_aggregate_id, origin_dimension_space_point, \
             origin_dimension_space_point_hash, properties, node_type_name, classification, node_name) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL)",
            params![99_i64, "broken", "not json", "x", "{}", "Acme:Page", "regular"],
        )
        .unwrap();

    let err = store.read(|read| read.all_nodes()).unwrap_err();
    match err {
        ProjectionError::MalformedRow { table, .. } => assert_eq!(table, "node"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn anchors_are_not_reused_after_reset() {
    let mut scenario = Scenario::site_in(SqliteStore::open_in_memory().unwrap(), &["en"]);
    scenario.projector.reset().unwrap();
    assert!(scenario.projector.is_empty().unwrap());

    let mut store = scenario.projector.into_store();
    let next = store.write(|tx| tx.allocate_anchor()).unwrap();
    // The site allocated two anchors before the reset.
    assert!(next.0 > 2);
}

#[test]
fn memory_options_cannot_open_a_database() {
    let err = SqliteStore::open_with(&StoreOptions::memory()).err().unwrap();
    assert!(matches!(err, ProjectionError::InvalidArgument(_)));
}
