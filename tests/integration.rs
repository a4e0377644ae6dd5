/// Integration test suite: runs the compiled `refhunt` binary against the sample project
/// in `tests/fixtures/sample_project`.
///
/// Every test works on a private copy of the fixture so the `.refhunt/` cache directory
/// written by a search never leaks between tests or into the source tree.
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_refhunt"))
}

fn fixture_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/sample_project")
}

fn copy_dir(from: &Path, to: &Path) {
    fs::create_dir_all(to).unwrap();
    for entry in fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), target).unwrap();
        }
    }
}

/// A fresh copy of the sample project.
fn sample_project() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    copy_dir(&fixture_root(), dir.path());
    dir
}

/// Run a refhunt command and assert it exits successfully.
/// Returns stdout as a String.
fn run_success(args: &[&str]) -> String {
    let out = Command::new(binary())
        .args(args)
        .output()
        .expect("failed to invoke refhunt binary");
    let stdout = String::from_utf8_lossy(&out.stdout).to_string();
    let stderr = String::from_utf8_lossy(&out.stderr).to_string();
    assert!(
        out.status.success(),
        "command {:?} failed with status {:?}\nstdout: {}\nstderr: {}",
        args,
        out.status,
        stdout,
        stderr
    );
    stdout
}

/// Run a refhunt command and assert it exits with a non-zero status.
/// Returns (stdout, stderr) as Strings.
fn run_failure(args: &[&str]) -> (String, String) {
    let out = Command::new(binary())
        .args(args)
        .output()
        .expect("failed to invoke refhunt binary");
    let stdout = String::from_utf8_lossy(&out.stdout).to_string();
    let stderr = String::from_utf8_lossy(&out.stderr).to_string();
    assert!(
        !out.status.success(),
        "command {:?} expected to fail but exited successfully\nstdout: {}\nstderr: {}",
        args,
        stdout,
        stderr
    );
    (stdout, stderr)
}

fn path_arg(dir: &TempDir) -> String {
    dir.path().to_string_lossy().into_owned()
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// A texture used by one material yields one path anchored at that material.
#[test]
fn test_search_texture_used_by_material() {
    let dir = sample_project();
    let stdout = run_success(&["search", &path_arg(&dir), "assets/textures/brick_albedo.json"]);
    assert!(
        stdout.contains("ref assets/materials/brick.json (Material) albedo -> assets/textures/brick_albedo.json (Texture) *"),
        "stdout: {stdout}"
    );
    assert!(stdout.ends_with("1 references found\n"), "stdout: {stdout}");
}

/// Private members are skipped unless asked for.
#[test]
fn test_non_public_members_opt_in() {
    let dir = sample_project();
    let stdout = run_success(&[
        "search",
        &path_arg(&dir),
        "assets/textures/brick_albedo.json",
        "--non-public",
    ]);
    assert!(stdout.contains("editor_only"), "stdout: {stdout}");
    assert!(stdout.contains("2 references found"), "stdout: {stdout}");
}

/// Component and prefab links are followed through the scene.
#[test]
fn test_search_material_in_scenes() {
    let dir = sample_project();
    let stdout = run_success(&[
        "search",
        &path_arg(&dir),
        "assets/materials/brick.json",
        "--scope",
        "scenes",
    ]);
    assert!(
        stdout.contains("ref scenes/main.json#player 'Player' (Entity) Renderer > material -> assets/materials/brick.json (Material) *"),
        "stdout: {stdout}"
    );
    assert!(
        stdout.contains("ref assets/prefabs/wall.json 'Wall' (Entity) Renderer > material"),
        "stdout: {stdout}"
    );
    assert!(stdout.contains("2 references found"), "stdout: {stdout}");
}

/// The tree view shows the forward graph, including the prefab source link.
#[test]
fn test_tree_view() {
    let dir = sample_project();
    let stdout = run_success(&[
        "search",
        &path_arg(&dir),
        "assets/materials/brick.json",
        "--scope",
        "scenes",
        "--view",
        "tree",
    ]);
    assert!(stdout.contains("scope Scenes"), "stdout: {stdout}");
    assert!(stdout.contains("prefab source -> assets/prefabs/wall.json"), "stdout: {stdout}");
    assert!(!stdout.contains("Camera"), "camera does not lead to brick: {stdout}");
}

/// Weak child links are dropped unless something strong lies behind them.
#[test]
fn test_weak_children_are_pruned() {
    let dir = sample_project();
    let stdout = run_success(&["search", &path_arg(&dir), "assets/textures/noise.json"]);
    assert!(stdout.contains("cookie"), "stdout: {stdout}");
    assert!(stdout.contains("cached_preview"), "stdout: {stdout}");
    assert!(!stdout.contains("'Group'"), "stdout: {stdout}");
    assert!(stdout.contains("2 references found"), "stdout: {stdout}");

    let kept = run_success(&[
        "search",
        &path_arg(&dir),
        "assets/textures/noise.json",
        "--keep-weak",
    ]);
    assert!(kept.contains("'Group'"), "stdout: {kept}");
    assert!(kept.contains("3 references found"), "stdout: {kept}");
}

/// A weak child link with a strong reference behind it survives.
#[test]
fn test_anchored_weak_child_is_kept() {
    let dir = sample_project();
    let stdout = run_success(&[
        "search",
        &path_arg(&dir),
        "assets/materials/steel.json",
        "--view",
        "tree",
        "--format",
        "table",
    ]);
    assert!(
        stdout.contains("child~ -> scenes/main.json#sword 'Sword' (Entity)"),
        "stdout: {stdout}"
    );
    assert!(stdout.contains("fallback_material"), "stdout: {stdout}");
}

/// Non-serialized fields are skipped with --serializable-only.
#[test]
fn test_serializable_only() {
    let dir = sample_project();
    let stdout = run_success(&[
        "search",
        &path_arg(&dir),
        "assets/textures/noise.json",
        "--serializable-only",
    ]);
    assert!(!stdout.contains("cached_preview"), "stdout: {stdout}");
    assert!(stdout.contains("1 references found"), "stdout: {stdout}");
}

/// Zero matches is a success with an explicit count.
#[test]
fn test_no_references_found() {
    let dir = sample_project();
    let stdout = run_success(&[
        "search",
        &path_arg(&dir),
        "assets/textures/brick_albedo.json",
        "--scope",
        "settings",
    ]);
    assert_eq!(stdout, "0 references found\n");
}

/// JSON output parses and carries identities.
#[test]
fn test_json_output() {
    let dir = sample_project();
    let stdout = run_success(&[
        "search",
        &path_arg(&dir),
        "assets/materials/steel.json",
        "--format",
        "json",
    ]);
    let doc: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    assert_eq!(doc["success"], true);
    let anchors: Vec<&str> = doc["references"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["anchor_identity"].as_str())
        .collect();
    assert!(anchors.contains(&"scenes/main.json#sword"), "anchors: {anchors:?}");
    assert!(anchors.contains(&"settings/quality.json"), "anchors: {anchors:?}");
    assert_eq!(doc["referencing"].as_array().map(Vec::len), Some(2));
}

/// The reverse view starts at the needle.
#[test]
fn test_reverse_view() {
    let dir = sample_project();
    let stdout = run_success(&[
        "search",
        &path_arg(&dir),
        "assets/shaders/lit.json",
        "--view",
        "reverse",
        "--format",
        "table",
    ]);
    let first = stdout.lines().next().unwrap_or_default();
    assert!(first.starts_with("assets/shaders/lit.json (Shader)"), "stdout: {stdout}");
    assert!(
        stdout.contains("<- settings/quality.json (QualitySettings) (shaders[0])"),
        "stdout: {stdout}"
    );
}

/// Configured exclusions keep draft resources out of the project.
#[test]
fn test_excluded_resources_are_not_searched() {
    let dir = sample_project();
    let stdout = run_success(&["search", &path_arg(&dir), "assets/textures/brick_albedo.json"]);
    assert!(!stdout.contains("old.draft"), "stdout: {stdout}");
}

// ---------------------------------------------------------------------------
// Session and cache
// ---------------------------------------------------------------------------

/// A saved session prints the same paths after the process is gone.
#[test]
fn test_session_round_trip() {
    let dir = sample_project();
    let searched = run_success(&[
        "search",
        &path_arg(&dir),
        "assets/materials/brick.json",
        "--save-session",
    ]);
    let restored = run_success(&["session", &path_arg(&dir)]);
    assert_eq!(searched, restored);
}

#[test]
fn test_session_missing_fails() {
    let dir = sample_project();
    let (_, stderr) = run_failure(&["session", &path_arg(&dir)]);
    assert!(stderr.contains("no saved session"), "stderr: {stderr}");
}

/// A search leaves a dependency cache behind; rebuild and stats report on it.
#[test]
fn test_cache_rebuild_and_stats() {
    let dir = sample_project();
    let rebuilt = run_success(&["cache", "rebuild", &path_arg(&dir)]);
    assert_eq!(rebuilt, "9 resources hashed\n");
    assert!(dir.path().join(".refhunt/dependencies.bin").exists());

    let stats = run_success(&["cache", "stats", &path_arg(&dir)]);
    assert!(stats.starts_with("resources 9 "), "stats: {stats}");
}

#[test]
fn test_search_writes_dependency_cache() {
    let dir = sample_project();
    run_success(&["search", &path_arg(&dir), "assets/shaders/lit.json"]);
    assert!(dir.path().join(".refhunt/dependencies.bin").exists());
}

/// A corrupt cache file is rebuilt, never fatal.
#[test]
fn test_corrupt_cache_is_rebuilt() {
    let dir = sample_project();
    fs::create_dir_all(dir.path().join(".refhunt")).unwrap();
    fs::write(dir.path().join(".refhunt/dependencies.bin"), b"not a cache").unwrap();
    let stdout = run_success(&["search", &path_arg(&dir), "assets/textures/brick_albedo.json"]);
    assert!(stdout.contains("1 references found"), "stdout: {stdout}");
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn test_missing_schema_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (_, stderr) = run_failure(&["search", &path_arg(&dir), "assets/x.json"]);
    assert!(stderr.contains("schema"), "stderr: {stderr}");
}

#[test]
fn test_needle_is_required() {
    let dir = sample_project();
    run_failure(&["search", &path_arg(&dir)]);
}
