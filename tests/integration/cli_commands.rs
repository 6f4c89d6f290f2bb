#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use rusqlite::Connection;
use serde_json::{json, Value};
use tempfile::TempDir;

fn site_events() -> Vec<Value> {
    vec![
        json!({
            "event_id": "e1",
            "event": {
                "type": "RootNodeAggregateWithNodeWasCreated",
                "content_stream_id": "live",
                "node_aggregate_id": "sites",
                "node_type_name": "Acme:Sites",
                "visible_in_dimension_space_points": [{"language": "en"}]
            }
        }),
        json!({
            "event_id": "e2",
            "event": {
                "type": "NodeAggregateWithNodeWasCreated",
                "content_stream_id": "live",
                "node_aggregate_id": "home",
                "node_type_name": "Acme:Page",
                "origin_dimension_space_point": {"language": "en"},
                "visible_in_dimension_space_points": [{"language": "en"}],
                "parent_node_aggregate_id": "sites",
                "node_name": "home",
                "initial_property_values": {"title": "Home"}
            }
        }),
        json!({
            "event_id": "e3",
            "event": {
                "type": "NodeWasHidden",
                "content_stream_id": "live",
                "node_aggregate_id": "home",
                "affected_dimension_space_points": [{"language": "en"}]
            }
        }),
    ]
}

fn write_events(dir: &Path, name: &str, events: &[Value]) -> PathBuf {
    let path = dir.join(name);
    let mut body = String::new();
    for event in events {
        body.push_str(&event.to_string());
        body.push('\n');
    }
    fs::write(&path, body).expect("write events");
    path
}

fn setup() -> (TempDir, PathBuf, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let db = dir.path().join("graph.sqlite3");
    let events = write_events(dir.path(), "events.jsonl", &site_events());
    (dir, db, events)
}

fn run_json(db: &Path, args: &[&str]) -> Value {
    let output = cargo_bin_cmd!("contentgraph")
        .arg("--db")
        .arg(db)
        .args(["--format", "json"])
        .args(args)
        .output()
        .expect("run contentgraph");
    assert!(output.status.success(), "{args:?} failed: {output:?}");
    serde_json::from_slice(&output.stdout).expect("json output")
}

#[test]
fn apply_reports_replayed_events_as_already_processed() {
    let (_dir, db, events) = setup();

    let first = cargo_bin_cmd!("contentgraph")
        .arg("--db")
        .arg(&db)
        .arg("apply")
        .arg(&events)
        .output()
        .expect("run apply");
    assert!(first.status.success());
    let stdout = String::from_utf8_lossy(&first.stdout);
    assert!(stdout.contains("Applied 3 events (0 already processed)"), "{stdout}");

    let second = run_json(&db, &["apply", events.to_str().unwrap()]);
    assert_eq!(second["applied"], 0);
    assert_eq!(second["already_processed"], 3);
}

#[test]
fn stats_and_is_empty_follow_reset() {
    let (_dir, db, events) = setup();
    run_json(&db, &["apply", events.to_str().unwrap()]);

    let stats = run_json(&db, &["stats"]);
    assert_eq!(stats["nodes"], 2);
    assert_eq!(stats["hierarchy_edges"], 2);
    assert_eq!(stats["restriction_edges"], 1);
    assert_eq!(stats["processed_events"], 3);
    assert_eq!(stats["content_streams"][0]["content_stream_id"], "live");

    let empty = cargo_bin_cmd!("contentgraph")
        .arg("--db")
        .arg(&db)
        .arg("is-empty")
        .output()
        .expect("run is-empty");
    assert_eq!(String::from_utf8_lossy(&empty.stdout).trim(), "false");

    let reset = run_json(&db, &["reset"]);
    assert_eq!(reset["reset"], true);
    assert_eq!(run_json(&db, &["is-empty"])["empty"], true);
    assert_eq!(run_json(&db, &["stats"])["processed_events"], 0);
}

#[test]
fn verify_exits_with_two_when_the_graph_is_broken() {
    let (_dir, db, events) = setup();
    run_json(&db, &["apply", events.to_str().unwrap()]);

    let healthy = cargo_bin_cmd!("contentgraph")
        .arg("--db")
        .arg(&db)
        .arg("verify")
        .output()
        .expect("run verify");
    assert_eq!(healthy.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&healthy.stdout).contains("success=true"));

    let conn = Connection::open(&db).expect("open db");
    conn.execute("DELETE FROM node WHERE node_aggregate_id = 'home'", [])
        .expect("delete row");
    drop(conn);

    let broken = cargo_bin_cmd!("contentgraph")
        .arg("--db")
        .arg(&db)
        .args(["--format", "json", "verify", "--level", "fast"])
        .output()
        .expect("run verify");
    assert_eq!(broken.status.code(), Some(2));
    let report: Value = serde_json::from_slice(&broken.stdout).expect("json report");
    assert_eq!(report["success"], false);
    assert!(!report["findings"].as_array().unwrap().is_empty());
}

#[test]
fn malformed_event_line_names_the_line() {
    let (dir, db, _events) = setup();
    let path = dir.path().join("broken.jsonl");
    fs::write(&path, format!("{}\n{{not json\n", site_events()[0])).expect("write");

    let output = cargo_bin_cmd!("contentgraph")
        .arg("--db")
        .arg(&db)
        .arg("apply")
        .arg(&path)
        .output()
        .expect("run apply");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("broken.jsonl:2:"), "{stderr}");
    assert_eq!(run_json(&db, &["is-empty"])["empty"], true);
}

#[test]
fn failing_event_stops_the_batch_after_committed_ones() {
    let (dir, db, _events) = setup();
    let mut events = site_events();
    events.insert(
        1,
        json!({
            "event_id": "bad",
            "event": {
                "type": "NodePropertiesWereSet",
                "content_stream_id": "live",
                "node_aggregate_id": "nobody",
                "origin_dimension_space_point": {"language": "en"},
                "property_values": {"title": "x"}
            }
        }),
    );
    let path = write_events(dir.path(), "failing.jsonl", &events);

    let output = cargo_bin_cmd!("contentgraph")
        .arg("--db")
        .arg(&db)
        .args(["--format", "json", "apply"])
        .arg(&path)
        .output()
        .expect("run apply");
    assert_eq!(output.status.code(), Some(1));
    let summary: Value = serde_json::from_slice(&output.stdout).expect("summary");
    assert_eq!(summary["applied"], 1);
    assert!(String::from_utf8_lossy(&output.stderr).contains("bad"));
}

#[test]
fn config_file_selects_the_database() {
    let (dir, db, events) = setup();
    let config = dir.path().join("config.toml");
    fs::write(
        &config,
        format!(
            "[store]\nbackend = \"sqlite\"\npath = {:?}\n\n[log]\nfilter = \"contentgraph=debug\"\n",
            db.to_str().unwrap()
        ),
    )
    .expect("write config");

    cargo_bin_cmd!("contentgraph")
        .arg("--config")
        .arg(&config)
        .arg("apply")
        .arg(&events)
        .assert()
        .success();

    assert_eq!(run_json(&db, &["stats"])["nodes"], 2);
}
