//! CLI integration tests for echelon
//!
//! These tests drive the binary end to end: registering units, recording
//! edges, and querying the hierarchy at different dates.

use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get a command instance for the echelon binary
fn echelon_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("echelon"));
    // Keep the user's global config out of the tests
    cmd.current_dir(dir).env("XDG_CONFIG_HOME", dir.join(".xdg"));
    cmd
}

/// Create a temporary directory and initialize an echelon project
fn setup_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    echelon_cmd(dir.path()).arg("init").arg(dir.path()).assert().success();
    dir
}

/// Project with units root-corps, b, c, d and a
fn setup_units() -> TempDir {
    let dir = setup_project();
    for (id, name) in [
        ("root-corps", "RootCorps"),
        ("a", "A"),
        ("b", "B"),
        ("c", "C"),
        ("d", "D"),
    ] {
        echelon_cmd(dir.path())
            .args(["unit", "add", id, name])
            .assert()
            .success();
    }
    dir
}

fn add_edge(dir: &Path, child: &str, parent: &str, from: &str, until: Option<&str>) -> assert_cmd::assert::Assert {
    let mut cmd = echelon_cmd(dir);
    cmd.args(["edge", "add", child, parent, "--from", from]);
    if let Some(until) = until {
        cmd.args(["--until", until]);
    }
    cmd.assert()
}

fn stdout_of(assert: &assert_cmd::assert::Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stdout).to_string()
}

// =============================================================================
// Initialization Tests
// =============================================================================

#[test]
fn test_init_creates_structure() {
    let dir = TempDir::new().unwrap();

    echelon_cmd(dir.path())
        .arg("init")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized echelon project"));

    assert!(dir.path().join(".echelon").is_dir());
    assert!(dir.path().join(".echelon/config.toml").is_file());
    assert!(dir.path().join(".echelon/units.jsonl").is_file());
    assert!(dir.path().join(".echelon/edges.jsonl").is_file());
    assert!(dir.path().join(".echelon/.gitignore").is_file());
}

#[test]
fn test_init_twice_fails() {
    let dir = setup_project();

    echelon_cmd(dir.path())
        .arg("init")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn test_unit_add_and_list() {
    let dir = setup_project();

    echelon_cmd(dir.path())
        .args(["unit", "add", "1st-Corps", "I Corps", "--level", "2", "--kind", "infantry"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added unit 1st-corps"));

    echelon_cmd(dir.path())
        .args(["unit", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1st-corps"))
        .stdout(predicate::str::contains("infantry"))
        .stdout(predicate::str::contains("I Corps"));
}

#[test]
fn test_unit_add_duplicate_fails() {
    let dir = setup_units();

    echelon_cmd(dir.path())
        .args(["unit", "add", "a", "Another A"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unit already exists: a"));
}

#[test]
fn test_unit_invalid_id_fails() {
    let dir = setup_project();

    echelon_cmd(dir.path())
        .args(["unit", "add", "bad id!", "Bad"])
        .assert()
        .failure();
}

#[test]
fn test_unit_show_at_date() {
    let dir = setup_units();
    add_edge(dir.path(), "b", "root-corps", "1790-01-01", None).success();
    add_edge(dir.path(), "a", "b", "1800-01-01", Some("1805-06-01")).success();

    echelon_cmd(dir.path())
        .args(["unit", "show", "a", "--at", "1803-01-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Parent:  B (b)"))
        .stdout(predicate::str::contains("Level:   2"))
        .stdout(predicate::str::contains("RootCorps — B — A"))
        .stdout(predicate::str::contains("Parent history:"));
}

#[test]
fn test_unit_remove_detaches_edges() {
    let dir = setup_units();
    add_edge(dir.path(), "a", "b", "1800-01-01", None).success();
    add_edge(dir.path(), "b", "root-corps", "1800-01-01", None).success();

    echelon_cmd(dir.path())
        .args(["unit", "remove", "b"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 edges detached"));

    let edges = fs::read_to_string(dir.path().join(".echelon/edges.jsonl")).unwrap();
    assert!(edges.trim().is_empty());

    echelon_cmd(dir.path())
        .args(["parent", "a", "--at", "1801-01-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("a has no parent"));
}

// =============================================================================
// Scenario Tests
// =============================================================================

#[test]
fn test_parent_changes_over_time() {
    let dir = setup_units();
    add_edge(dir.path(), "a", "b", "1800-01-01", Some("1805-06-01")).success();
    add_edge(dir.path(), "a", "c", "1805-06-01", None).success();

    echelon_cmd(dir.path())
        .args(["parent", "a", "--at", "1803-01-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("B (b)"));

    echelon_cmd(dir.path())
        .args(["parent", "a", "--at", "1900-01-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("C (c)"));

    // End date is exclusive
    echelon_cmd(dir.path())
        .args(["parent", "a", "--at", "1805-06-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("C (c)"));
}

#[test]
fn test_cycle_is_rejected() {
    let dir = setup_units();
    add_edge(dir.path(), "a", "b", "1800-01-01", None).success();

    add_edge(dir.path(), "b", "a", "1810-01-01", None)
        .failure()
        .stderr(predicate::str::contains("would create a cycle"));

    let edges = fs::read_to_string(dir.path().join(".echelon/edges.jsonl")).unwrap();
    assert_eq!(edges.lines().count(), 1);
}

#[test]
fn test_cycle_inside_interval_is_rejected() {
    let dir = setup_units();
    // c sits under a only from 1805; b -> c from 1800 is fine before then
    add_edge(dir.path(), "c", "a", "1805-01-01", Some("1806-01-01")).success();
    add_edge(dir.path(), "a", "b", "1790-01-01", None).success();

    add_edge(dir.path(), "b", "c", "1800-01-01", None)
        .failure()
        .stderr(predicate::str::contains("on 1805-01-01"));
}

#[test]
fn test_overlap_is_rejected() {
    let dir = setup_units();
    add_edge(dir.path(), "a", "b", "1800-01-01", Some("1805-01-01")).success();

    add_edge(dir.path(), "a", "d", "1804-01-01", Some("1806-01-01"))
        .failure()
        .stderr(predicate::str::contains("overlaps existing edge e-1"));
}

#[test]
fn test_children_at_dates() {
    let dir = setup_units();
    add_edge(dir.path(), "a", "b", "1800-01-01", Some("1805-06-01")).success();
    add_edge(dir.path(), "a", "c", "1805-06-01", None).success();

    echelon_cmd(dir.path())
        .args(["children", "b", "--at", "1803-01-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("a "));

    echelon_cmd(dir.path())
        .args(["children", "b", "--at", "1900-01-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("b has no children on 1900-01-01"));
}

#[test]
fn test_lineage_name() {
    let dir = setup_units();
    add_edge(dir.path(), "b", "root-corps", "1790-01-01", None).success();
    add_edge(dir.path(), "a", "b", "1800-01-01", Some("1805-06-01")).success();

    echelon_cmd(dir.path())
        .args(["lineage", "a", "--at", "1803-01-01"])
        .assert()
        .success()
        .stdout("RootCorps — B — A\n");

    echelon_cmd(dir.path())
        .args(["lineage", "a", "--at", "1803-01-01", "--separator", " / "])
        .assert()
        .success()
        .stdout("RootCorps / B / A\n");

    // Without a date only the unit's own name
    echelon_cmd(dir.path())
        .args(["lineage", "a"])
        .assert()
        .success()
        .stdout("A\n");
}

#[test]
fn test_inverted_interval_is_rejected() {
    let dir = setup_units();

    add_edge(dir.path(), "a", "b", "2020-01-01", Some("2019-01-01"))
        .failure()
        .stderr(predicate::str::contains("Invalid interval"));

    let edges = fs::read_to_string(dir.path().join(".echelon/edges.jsonl")).unwrap();
    assert!(edges.trim().is_empty());
}

// =============================================================================
// Reparent Tests
// =============================================================================

#[test]
fn test_reparent_moves_unit() {
    let dir = setup_units();
    add_edge(dir.path(), "a", "b", "1800-01-01", None).success();

    echelon_cmd(dir.path())
        .args(["reparent", "a", "c", "--at", "1806-10-14"])
        .assert()
        .success()
        .stdout(predicate::str::contains("closed e-1"));

    echelon_cmd(dir.path())
        .args(["parent", "a", "--at", "1806-10-13"])
        .assert()
        .success()
        .stdout(predicate::str::contains("B (b)"));

    echelon_cmd(dir.path())
        .args(["parent", "a", "--at", "1806-10-14"])
        .assert()
        .success()
        .stdout(predicate::str::contains("C (c)"));
}

#[test]
fn test_failed_reparent_keeps_old_edge_open() {
    let dir = setup_units();
    add_edge(dir.path(), "a", "b", "1800-01-01", None).success();
    add_edge(dir.path(), "c", "a", "1800-01-01", None).success();

    echelon_cmd(dir.path())
        .args(["reparent", "a", "c", "--at", "1806-10-14"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cycle"));

    echelon_cmd(dir.path())
        .args(["parent", "a", "--at", "1900-01-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("B (b)"));
}

#[test]
fn test_reparent_inside_a_bounded_edge() {
    let dir = setup_units();
    add_edge(dir.path(), "a", "b", "1800-01-01", Some("1810-01-01")).success();

    echelon_cmd(dir.path())
        .args(["reparent", "a", "c", "--at", "1805-01-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("closed e-1"));

    echelon_cmd(dir.path())
        .args(["edge", "history", "a"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1800-01-01 1805-01-01 b"));

    echelon_cmd(dir.path())
        .args(["parent", "a", "--at", "1808-01-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("C (c)"));
}

#[test]
fn test_write_waits_for_project_lock() {
    use fs2::FileExt;

    let dir = setup_units();
    let lock = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(dir.path().join(".echelon/lock"))
        .unwrap();
    lock.lock_exclusive().unwrap();

    // Blocked behind the held lock until killed
    echelon_cmd(dir.path())
        .args(["edge", "add", "a", "b", "--from", "1800-01-01"])
        .timeout(std::time::Duration::from_millis(500))
        .assert()
        .failure();

    echelon_cmd(dir.path())
        .args(["edge", "history", "a"])
        .assert()
        .success()
        .stdout(predicate::str::contains("never had a parent"));

    lock.unlock().unwrap();
    add_edge(dir.path(), "a", "b", "1800-01-01", None)
        .success()
        .stdout(predicate::str::contains("e-1"));
}

// =============================================================================
// Edge Maintenance Tests
// =============================================================================

#[test]
fn test_edge_close_and_history() {
    let dir = setup_units();
    add_edge(dir.path(), "a", "b", "1800-01-01", None).success();

    echelon_cmd(dir.path())
        .args(["edge", "close", "e-1", "--at", "1805-01-01"])
        .assert()
        .success();

    echelon_cmd(dir.path())
        .args(["edge", "close", "e-1", "--at", "1806-01-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already closed"));

    echelon_cmd(dir.path())
        .args(["edge", "history", "a"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1805-01-01"));

    echelon_cmd(dir.path())
        .args(["edge", "history", "b", "--as-parent"])
        .assert()
        .success()
        .stdout(predicate::str::contains("a "));
}

#[test]
fn test_edge_remove() {
    let dir = setup_units();
    add_edge(dir.path(), "a", "b", "1800-01-01", None).success();

    echelon_cmd(dir.path())
        .args(["edge", "remove", "e-1"])
        .assert()
        .success();

    echelon_cmd(dir.path())
        .args(["edge", "remove", "e-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Edge not found: e-1"));
}

// =============================================================================
// Bulk Query Tests
// =============================================================================

#[test]
fn test_path_level_descendants_roots() {
    let dir = setup_units();
    add_edge(dir.path(), "b", "root-corps", "1790-01-01", None).success();
    add_edge(dir.path(), "a", "b", "1800-01-01", None).success();
    add_edge(dir.path(), "c", "b", "1800-01-01", None).success();

    let path = echelon_cmd(dir.path())
        .args(["path", "a", "--at", "1801-01-01"])
        .assert()
        .success();
    let lines: Vec<String> = stdout_of(&path).lines().map(|l| l.trim().to_string()).collect();
    assert_eq!(lines, vec!["RootCorps (root-corps)", "B (b)", "A (a)"]);

    echelon_cmd(dir.path())
        .args(["level", "a", "--at", "1801-01-01"])
        .assert()
        .success()
        .stdout("2\n");

    let descendants = echelon_cmd(dir.path())
        .args(["descendants", "root-corps", "--at", "1801-01-01"])
        .assert()
        .success();
    let lines: Vec<String> = stdout_of(&descendants).lines().map(|l| l.trim().to_string()).collect();
    assert_eq!(lines, vec!["B (b)", "A (a)", "C (c)"]);

    let roots = echelon_cmd(dir.path())
        .args(["roots", "--at", "1801-01-01"])
        .assert()
        .success();
    let ids: Vec<String> = stdout_of(&roots)
        .lines()
        .filter_map(|l| l.split_whitespace().next().map(str::to_string))
        .collect();
    assert_eq!(ids, vec!["d", "root-corps"]);
}

#[test]
fn test_json_format() {
    let dir = setup_units();
    add_edge(dir.path(), "a", "b", "1800-01-01", None).success();

    let assert = echelon_cmd(dir.path())
        .args(["--format", "json", "path", "a", "--at", "1801-01-01"])
        .assert()
        .success();

    let json: serde_json::Value = serde_json::from_str(stdout_of(&assert).trim()).unwrap();
    assert_eq!(json["path"][0]["id"], "b");
    assert_eq!(json["path"][1]["id"], "a");
    assert!(json["violation"].is_null());
}

// =============================================================================
// Corrupt Data Tests
// =============================================================================

/// Writes edges directly, as a migration from another system would
fn write_raw_edges(dir: &Path, lines: &[&str]) {
    fs::write(dir.join(".echelon/edges.jsonl"), lines.join("\n") + "\n").unwrap();
}

#[test]
fn test_loaded_overlap_is_reported_not_resolved() {
    let dir = setup_units();
    write_raw_edges(
        dir.path(),
        &[
            r#"{"id":"e-1","child_unit_id":"a","parent_unit_id":"b","start_date":"1800-01-01"}"#,
            r#"{"id":"e-2","child_unit_id":"a","parent_unit_id":"c","start_date":"1804-01-01"}"#,
        ],
    );

    echelon_cmd(dir.path())
        .args(["parent", "a", "--at", "1805-01-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("concurrently active parent edges"));

    // Before the overlap the answer is unambiguous
    echelon_cmd(dir.path())
        .args(["parent", "a", "--at", "1801-01-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("B (b)"));

    echelon_cmd(dir.path())
        .arg("audit")
        .assert()
        .failure()
        .stdout(predicate::str::contains("OVERLAP  a: e-1 and e-2 both active from 1804-01-01"));
}

#[test]
fn test_loaded_cycle_gives_partial_path() {
    let dir = setup_units();
    write_raw_edges(
        dir.path(),
        &[
            r#"{"id":"e-1","child_unit_id":"a","parent_unit_id":"b","start_date":"1800-01-01"}"#,
            r#"{"id":"e-2","child_unit_id":"b","parent_unit_id":"a","start_date":"1800-01-01"}"#,
        ],
    );

    echelon_cmd(dir.path())
        .args(["path", "a", "--at", "1801-01-01"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("B (b)"))
        .stderr(predicate::str::contains("contains a cycle"));

    echelon_cmd(dir.path())
        .arg("audit")
        .assert()
        .failure()
        .stdout(predicate::str::contains("CYCLE    1800-01-01: a -> b"));
}

#[test]
fn test_clean_audit() {
    let dir = setup_units();
    add_edge(dir.path(), "a", "b", "1800-01-01", None).success();

    echelon_cmd(dir.path())
        .arg("audit")
        .assert()
        .success()
        .stdout(predicate::str::contains("No violations found."));
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[test]
fn test_not_in_project_error() {
    let dir = TempDir::new().unwrap();

    echelon_cmd(dir.path())
        .args(["roots", "--at", "1800-01-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not in an echelon project"));
}

#[test]
fn test_unknown_unit_error() {
    let dir = setup_units();

    echelon_cmd(dir.path())
        .args(["parent", "zz", "--at", "1800-01-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unit not found: zz"));
}

#[test]
fn test_verbose_flag_logs_events() {
    let dir = setup_units();

    let output = add_edge(dir.path(), "a", "b", "1800-01-01", None).success();
    let quiet = String::from_utf8_lossy(&output.get_output().stderr).to_string();
    assert!(!quiet.contains("event=edge_added"));

    let output = echelon_cmd(dir.path())
        .args(["--verbose", "edge", "add", "c", "b", "--from", "1800-01-01"])
        .assert()
        .success();

    let stderr = String::from_utf8_lossy(&output.get_output().stderr);
    assert!(stderr.contains("event=edge_added"));
}
