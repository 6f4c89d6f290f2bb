#![allow(missing_docs)]

mod common;

use common::{hide, lang, langs, show, ChildSpec, Scenario, LIVE};
use contentgraph::projection::{ContentGraphEvent, NodeMoveMapping, NodesWereMoved};
use contentgraph::storage::MemoryStore;
use proptest::prelude::*;

fn hidden(scenario: &Scenario, id: &str, point: &str) -> bool {
    scenario
        .projector
        .graph()
        .is_hidden(&LIVE.into(), &id.into(), &lang(point))
        .unwrap()
}

fn move_under(id: &str, parent: &str) -> ContentGraphEvent {
    ContentGraphEvent::NodesWereMoved(NodesWereMoved {
        content_stream_id: LIVE.into(),
        node_aggregate_id: id.into(),
        new_parent_node_aggregate_id: Some(parent.into()),
        new_succeeding_sibling_node_aggregate_id: None,
        node_move_mappings: vec![NodeMoveMapping {
            moved_node_origin: lang("en"),
            new_parent_node_origin: None,
            new_succeeding_sibling_origin: None,
            relation_dimension_space_points: langs(&["en"]),
        }],
    })
}

/// home -> a -> a1 -> a2, home -> b
fn nested() -> Scenario {
    let mut scenario = Scenario::site(&["en", "de"]);
    scenario.apply(ChildSpec::new("a", "home", "en", &["en", "de"]).event());
    scenario.apply(ChildSpec::new("a1", "a", "en", &["en", "de"]).event());
    scenario.apply(ChildSpec::new("a2", "a1", "en", &["en", "de"]).event());
    scenario.apply(ChildSpec::new("b", "home", "en", &["en", "de"]).event());
    scenario
}

#[test]
fn hiding_covers_descendants_at_any_depth() {
    let mut scenario = nested();
    scenario.apply(hide(LIVE, "a", &["en"]));
    for id in ["a", "a1", "a2"] {
        assert!(hidden(&scenario, id, "en"), "{id} should be hidden");
        assert!(!hidden(&scenario, id, "de"), "{id} should stay visible in de");
    }
    assert!(!hidden(&scenario, "b", "en"));
    assert!(!hidden(&scenario, "home", "en"));
}

#[test]
fn showing_removes_only_the_edges_it_introduced() {
    let mut scenario = nested();
    scenario.apply(hide(LIVE, "a1", &["en"]));
    scenario.apply(hide(LIVE, "a", &["en"]));
    scenario.apply(show(LIVE, "a", &["en"]));

    assert!(!hidden(&scenario, "a", "en"));
    assert!(hidden(&scenario, "a1", "en"));
    assert!(hidden(&scenario, "a2", "en"));

    scenario.apply(show(LIVE, "a1", &["en"]));
    assert!(!hidden(&scenario, "a2", "en"));
}

#[test]
fn new_children_of_hidden_nodes_are_hidden() {
    let mut scenario = nested();
    scenario.apply(hide(LIVE, "a", &["de"]));
    scenario.apply(ChildSpec::new("late", "a2", "en", &["en", "de"]).event());
    assert!(hidden(&scenario, "late", "de"));
    assert!(!hidden(&scenario, "late", "en"));
}

#[test]
fn moving_rederives_inherited_state_and_keeps_own_hides() {
    let mut scenario = nested();
    scenario.apply(hide(LIVE, "a", &["en"]));
    scenario.apply(ChildSpec::new("b1", "b", "en", &["en", "de"]).event());

    scenario.apply(move_under("b", "a"));
    assert!(hidden(&scenario, "b", "en"));
    assert!(hidden(&scenario, "b1", "en"));

    scenario.apply(hide(LIVE, "b1", &["en"]));
    scenario.apply(move_under("b", "home"));
    assert!(!hidden(&scenario, "b", "en"));
    assert!(hidden(&scenario, "b1", "en"));
}

#[test]
fn moving_a_hidden_node_keeps_it_hidden() {
    let mut scenario = nested();
    scenario.apply(hide(LIVE, "a1", &["en"]));
    scenario.apply(move_under("a1", "b"));
    assert!(hidden(&scenario, "a1", "en"));
    assert!(hidden(&scenario, "a2", "en"));
    let parent = scenario
        .projector
        .graph()
        .find_parent_node(&LIVE.into(), &"a1".into(), &lang("en"))
        .unwrap()
        .unwrap();
    assert_eq!(parent.node_aggregate_id.as_str(), "b");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_hide_marks_exactly_the_subtree(
        parents in prop::collection::vec(any::<prop::sample::Index>(), 1..24),
        target in any::<prop::sample::Index>(),
    ) {
        let mut scenario = Scenario::<MemoryStore>::site(&["en"]);
        // ids[0] is home; ids[i] hangs below ids[parent_of[i]].
        let mut ids = vec!["home".to_owned()];
        let mut parent_of = vec![None];
        for (i, parent) in parents.iter().enumerate() {
            let parent = parent.index(ids.len());
            let id = format!("n{i}");
            scenario.apply(ChildSpec::new(&id, &ids[parent], "en", &["en"]).event());
            ids.push(id);
            parent_of.push(Some(parent));
        }

        let target = target.index(ids.len());
        scenario.apply(hide(LIVE, &ids[target], &["en"]));
        for (i, id) in ids.iter().enumerate() {
            let mut cursor = Some(i);
            let mut below_target = false;
            while let Some(current) = cursor {
                if current == target {
                    below_target = true;
                    break;
                }
                cursor = parent_of[current];
            }
            prop_assert_eq!(hidden(&scenario, id, "en"), below_target, "node {}", id);
        }

        scenario.apply(show(LIVE, &ids[target], &["en"]));
        for id in &ids {
            prop_assert!(!hidden(&scenario, id, "en"));
        }
    }
}
