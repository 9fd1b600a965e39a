//! End-to-end tests that drive the `shelf` binary against a temporary
//! storage root, using the offline `hash` embedding provider.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn shelf_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_shelf"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[storage]
root = "{}/data"

[embedding]
provider = "hash"
model = "feature-hash"
dims = 128

[search]
default_limit = 5

[clustering]
min_k = 2
max_k = 4
"#,
        root.display()
    );

    let config_path = config_dir.join("shelf.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_shelf(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = shelf_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run shelf binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn run_json(config_path: &Path, args: &[&str]) -> serde_json::Value {
    let (stdout, stderr, success) = run_shelf(config_path, args);
    assert!(success, "{:?} failed: stdout={}, stderr={}", args, stdout, stderr);
    serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("{:?} did not print JSON ({}): {}", args, e, stdout))
}

fn add(config_path: &Path, title: &str, content: &str) {
    let (stdout, stderr, success) = run_shelf(
        config_path,
        &["add", "--title", title, "--content", content],
    );
    assert!(success, "add failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Added"));
}

fn seed_topics(config_path: &Path) {
    add(config_path, "Sourdough starter", "flour water wild yeast fermentation bread");
    add(config_path, "Rye loaf", "rye flour bread crust oven yeast");
    add(config_path, "Rust ownership", "borrow checker lifetimes compiler references");
    add(config_path, "Rust traits", "trait objects generics compiler dispatch");
    add(config_path, "Tide pools", "anemone starfish barnacles ocean rocks");
    add(config_path, "Kelp forests", "ocean kelp otters urchins rocks");
}

#[test]
fn test_init_creates_registry() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_shelf(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Initialized"));
    assert!(stdout.contains("My Documents"));
    assert!(tmp.path().join("data/registry.json").exists());
    assert!(tmp.path().join("data/default/documents.sqlite").exists());
    assert!(tmp.path().join("data/default/vectors.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_shelf(&config_path, &["init"]);
    assert!(success1, "First init failed");
    add(&config_path, "Keep me", "survives a second init");

    let (_, _, success2) = run_shelf(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
    let listed = run_json(&config_path, &["list", "--json"]);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[test]
fn test_add_list_get() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_shelf(
        &config_path,
        &[
            "add", "--title", "First", "--content", "one", "--tags", "a, b", "--type", "note",
        ],
    );
    assert!(success, "add failed: {}", stderr);
    add(&config_path, "Second", "two");

    let listed = run_json(&config_path, &["list", "--json"]);
    let titles: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles.len(), 2);

    // Position 1 is the oldest document.
    let first = run_json(&config_path, &["get", "1", "--json"]);
    assert_eq!(first["title"], "First");
    assert_eq!(first["doc_type"], "note");
    assert_eq!(first["tags"], serde_json::json!(["a", "b"]));

    let id = first["id"].as_str().unwrap();
    let (stdout, _, success) = run_shelf(&config_path, &["get", id]);
    assert!(success);
    assert!(stdout.contains("--- Content ---"));
    assert!(stdout.contains("one"));
}

#[test]
fn test_add_rejects_blank_title() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_shelf(&config_path, &["add", "--title", " ", "--content", "x"]);
    assert!(!success);
    assert!(stderr.contains("invalid argument"), "stderr: {}", stderr);

    let listed = run_json(&config_path, &["list", "--json"]);
    assert!(listed.as_array().unwrap().is_empty());
}

#[test]
fn test_search_finds_relevant_document() {
    let (_tmp, config_path) = setup_test_env();
    seed_topics(&config_path);

    let hits = run_json(
        &config_path,
        &["search", "starfish anemone barnacles", "--limit", "3", "--json"],
    );
    let hits = hits.as_array().unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0]["title"], "Tide pools");
    let scores: Vec<f64> = hits.iter().map(|h| h["score"].as_f64().unwrap()).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn test_search_blank_query_returns_nothing() {
    let (_tmp, config_path) = setup_test_env();
    add(&config_path, "Anything", "at all");
    let (stdout, _, success) = run_shelf(&config_path, &["search", "   "]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_update_content_changes_search() {
    let (_tmp, config_path) = setup_test_env();
    seed_topics(&config_path);
    add(&config_path, "Moving target", "placeholder");

    let (_, stderr, success) = run_shelf(
        &config_path,
        &["update", "7", "--content", "volcano magma caldera eruption"],
    );
    assert!(success, "update failed: {}", stderr);

    let hits = run_json(
        &config_path,
        &["search", "magma eruption", "--limit", "1", "--json"],
    );
    assert_eq!(hits[0]["title"], "Moving target");
}

#[test]
fn test_rename_and_delete() {
    let (_tmp, config_path) = setup_test_env();
    add(&config_path, "Old name", "body");

    let (_, _, success) = run_shelf(&config_path, &["rename", "1", "New name"]);
    assert!(success);
    let doc = run_json(&config_path, &["get", "1", "--json"]);
    assert_eq!(doc["title"], "New name");

    let (_, _, success) = run_shelf(&config_path, &["delete", doc["id"].as_str().unwrap()]);
    assert!(success);
    let stats = run_json(&config_path, &["stats", "--json"]);
    assert_eq!(stats["document_count"], 0);
    assert_eq!(stats["vector_count"], 0);
}

#[test]
fn test_delete_unknown_fails() {
    let (_tmp, config_path) = setup_test_env();
    add(&config_path, "Stays", "here");

    let (_, stderr, success) = run_shelf(&config_path, &["delete", "no-such-id"]);
    assert!(!success);
    assert!(stderr.contains("not found"), "stderr: {}", stderr);

    let stats = run_json(&config_path, &["stats", "--json"]);
    assert_eq!(stats["document_count"], 1);
    assert_eq!(stats["vector_count"], 1);
}

#[test]
fn test_cluster_groups_documents() {
    let (_tmp, config_path) = setup_test_env();
    seed_topics(&config_path);

    let result = run_json(&config_path, &["cluster", "--json"]);
    let k = result["num_clusters"].as_u64().unwrap();
    assert!((2..=4).contains(&k), "num_clusters = {}", k);
    assert_eq!(result["total_documents"], 6);
    assert_eq!(result["validity_index"], "silhouette");

    let clusters = result["clusters"].as_array().unwrap();
    let members: usize = clusters
        .iter()
        .map(|c| c["documents"].as_array().unwrap().len())
        .sum();
    assert_eq!(members, 6);
    for c in clusters {
        assert!(!c["label"].as_str().unwrap().is_empty());
    }

    let fixed = run_json(&config_path, &["cluster", "--k", "3", "--json"]);
    assert_eq!(fixed["num_clusters"], 3);
}

#[test]
fn test_cluster_needs_enough_documents() {
    let (_tmp, config_path) = setup_test_env();
    add(&config_path, "Lonely", "only one");

    let (_, stderr, success) = run_shelf(&config_path, &["cluster"]);
    assert!(!success);
    assert!(stderr.contains("insufficient data"), "stderr: {}", stderr);
}

#[test]
fn test_reconcile_clean_store_is_noop() {
    let (_tmp, config_path) = setup_test_env();
    seed_topics(&config_path);

    let report = run_json(&config_path, &["reconcile", "--json"]);
    assert_eq!(report["orphan_vectors_removed"], 0);
    assert_eq!(report["missing_vectors_embedded"], 0);
    assert_eq!(report["stale_vectors_refreshed"], 0);
    assert!(report["unresolved"].as_array().unwrap().is_empty());

    let (stdout, _, success) = run_shelf(&config_path, &["reembed"]);
    assert!(success);
    assert!(stdout.contains("embedded: 6"));
}

#[test]
fn test_databases_are_isolated() {
    let (_tmp, config_path) = setup_test_env();
    add(&config_path, "Home note", "in the default database");

    let (stdout, stderr, success) =
        run_shelf(&config_path, &["db", "create", "Work", "--switch"]);
    assert!(success, "db create failed: {}", stderr);
    assert!(stdout.contains("Switched"));

    let listed = run_json(&config_path, &["list", "--json"]);
    assert!(listed.as_array().unwrap().is_empty());

    let dbs = run_json(&config_path, &["db", "list", "--json"]);
    let dbs = dbs.as_array().unwrap();
    assert_eq!(dbs.len(), 2);
    let work = dbs.iter().find(|d| d["name"] == "Work").unwrap();
    assert_eq!(work["active"], true);
    let home = dbs.iter().find(|d| d["id"] == "default").unwrap();
    assert_eq!(home["document_count"], 1);

    let (_, _, success) = run_shelf(&config_path, &["db", "switch", "default"]);
    assert!(success);
    let listed = run_json(&config_path, &["list", "--json"]);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[test]
fn test_move_between_databases() {
    let (_tmp, config_path) = setup_test_env();
    add(&config_path, "Travelling", "from default to archive");
    let (stdout, _, success) = run_shelf(&config_path, &["db", "create", "Archive"]);
    assert!(success);
    let archive_id = stdout
        .split(['(', ')'])
        .nth(1)
        .unwrap()
        .to_string();

    let (stdout, stderr, success) = run_shelf(&config_path, &["move", "1", "--to", &archive_id]);
    assert!(success, "move failed: {}", stderr);
    assert!(stdout.contains("Archive"));

    let listed = run_json(&config_path, &["list", "--json"]);
    assert!(listed.as_array().unwrap().is_empty());

    run_shelf(&config_path, &["db", "switch", &archive_id]);
    let moved = run_json(&config_path, &["list", "--json"]);
    assert_eq!(moved[0]["title"], "Travelling");
    assert_eq!(moved[0]["content"], "from default to archive");
}

#[test]
fn test_db_delete_rules() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_shelf(&config_path, &["db", "delete", "default"]);
    assert!(!success);
    assert!(stderr.contains("active"), "stderr: {}", stderr);

    let (_, _, success) = run_shelf(&config_path, &["db", "delete", "db_missing"]);
    assert!(!success);
}

#[test]
fn test_clear_requires_confirmation() {
    let (_tmp, config_path) = setup_test_env();
    seed_topics(&config_path);

    let (_, _, success) = run_shelf(&config_path, &["clear"]);
    assert!(!success);

    let (stdout, _, success) = run_shelf(&config_path, &["clear", "--yes"]);
    assert!(success);
    assert!(stdout.contains("Removed 6"));
    let stats = run_json(&config_path, &["stats", "--json"]);
    assert_eq!(stats["document_count"], 0);
    assert_eq!(stats["vector_count"], 0);
}

#[test]
fn test_export_writes_json_file() {
    let (tmp, config_path) = setup_test_env();
    add(&config_path, "Exported", "body text");

    let out = tmp.path().join("out/export.json");
    let (_, stderr, success) =
        run_shelf(&config_path, &["export", "--output", out.to_str().unwrap()]);
    assert!(success, "export failed: {}", stderr);

    let data: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(data["database"]["id"], "default");
    assert_eq!(data["documents"][0]["title"], "Exported");
}

#[test]
fn test_bad_config_is_rejected() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("bad.toml");
    fs::write(&bad, "[embedding]\nprovider = \"nonsense\"\n").unwrap();

    let (_, stderr, success) = run_shelf(&bad, &["list"]);
    assert!(!success);
    assert!(stderr.contains("Unknown embedding provider"), "stderr: {}", stderr);
}

#[test]
fn test_completions_need_no_config() {
    let output = Command::new(shelf_binary())
        .args(["completions", "bash"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("shelf"));
}
