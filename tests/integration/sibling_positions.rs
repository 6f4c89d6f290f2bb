#![allow(missing_docs)]

mod common;

use common::{lang, ChildSpec, Scenario, LIVE};
use contentgraph::admin::{verify, VerifyLevel};
use contentgraph::graph::Visibility;
use contentgraph::projection::RELATION_DEFAULT_OFFSET;
use contentgraph::storage::{GraphStore, HierarchyFilter, MemoryStore};
use proptest::prelude::*;

fn child_ids(scenario: &Scenario) -> Vec<String> {
    scenario
        .projector
        .graph()
        .find_child_nodes(&LIVE.into(), &"home".into(), &lang("en"), Visibility::IncludeHidden)
        .unwrap()
        .into_iter()
        .map(|view| view.node_aggregate_id.as_str().to_owned())
        .collect()
}

fn child_positions(scenario: &Scenario) -> Vec<i64> {
    let home = scenario
        .projector
        .graph()
        .find_node(&LIVE.into(), &"home".into(), &lang("en"))
        .unwrap()
        .unwrap();
    scenario
        .projector
        .store()
        .read(|read| read.hierarchy(&HierarchyFilter::new().parent(home.anchor)))
        .unwrap()
        .into_iter()
        .map(|edge| edge.position)
        .collect()
}

#[test]
fn exhausted_gap_rebalances_to_uniform_offsets() {
    let mut scenario = Scenario::site(&["en"]);
    scenario.apply(ChildSpec::new("first", "home", "en", &["en"]).event());
    scenario.apply(ChildSpec::new("last", "home", "en", &["en"]).event());

    let inserted: Vec<String> = (0..7).map(|i| format!("n{i}")).collect();
    for id in &inserted {
        scenario.apply(ChildSpec::new(id, "home", "en", &["en"]).before("last").event());
    }

    let mut expected = vec!["first".to_owned()];
    expected.extend(inserted.iter().cloned());
    expected.push("last".to_owned());
    assert_eq!(child_ids(&scenario), expected);

    // 64, 96, 112, 120, 124, 126 fit; the seventh insert rebalances.
    let positions = child_positions(&scenario);
    let uniform: Vec<i64> = (0..positions.len() as i64)
        .map(|i| i * RELATION_DEFAULT_OFFSET)
        .collect();
    assert_eq!(positions, uniform);
}

#[test]
fn insert_before_first_sibling_goes_below_zero() {
    let mut scenario = Scenario::site(&["en"]);
    scenario.apply(ChildSpec::new("b", "home", "en", &["en"]).event());
    scenario.apply(ChildSpec::new("a", "home", "en", &["en"]).before("b").event());
    assert_eq!(child_ids(&scenario), ["a", "b"]);
    assert_eq!(child_positions(&scenario), [-RELATION_DEFAULT_OFFSET, 0]);
}

#[test]
fn unknown_succeeding_sibling_appends() {
    let mut scenario = Scenario::site(&["en"]);
    scenario.apply(ChildSpec::new("a", "home", "en", &["en"]).event());
    scenario.apply(ChildSpec::new("b", "home", "en", &["en"]).before("nowhere").event());
    assert_eq!(child_ids(&scenario), ["a", "b"]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_order_follows_declared_succeeding_siblings(
        choices in prop::collection::vec(any::<Option<prop::sample::Index>>(), 1..40)
    ) {
        let mut scenario = Scenario::<MemoryStore>::site(&["en"]);
        let mut model: Vec<String> = Vec::new();
        for (i, choice) in choices.iter().enumerate() {
            let id = format!("c{i}");
            let before = match choice {
                Some(index) if !model.is_empty() => Some(index.index(model.len())),
                _ => None,
            };
            let spec = ChildSpec::new(&id, "home", "en", &["en"]);
            let event = match before {
                Some(at) => spec.before(&model[at]).event(),
                None => spec.event(),
            };
            scenario.apply(event);
            match before {
                Some(at) => model.insert(at, id),
                None => model.push(id),
            }
        }

        prop_assert_eq!(child_ids(&scenario), model);
        let positions = child_positions(&scenario);
        prop_assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        prop_assert!(verify(scenario.projector.store(), VerifyLevel::Full).unwrap().success);
    }
}
