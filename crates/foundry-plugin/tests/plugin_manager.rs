//! Integration coverage for discovery against a real modules directory
//! on disk. Units whose load would require `dlopen`ing a real shared
//! library are exercised at the unit-test level in `manager.rs`
//! (bypassing `UnitScope::load` with an in-process instance); this
//! suite only needs discovery, manifest parsing, and dependency
//! resolution, none of which touch a library.

use std::sync::Arc;

use foundry_budget::BudgetManager;
use foundry_config::ConfigStore;
use foundry_metrics::MetricsRegistry;
use foundry_plugin::PluginManager;
use foundry_tick::TickScheduler;

fn write_manifest(dir: &std::path::Path, file_name: &str, body: &str) {
    std::fs::write(dir.join(file_name), body).unwrap();
}

fn manager(modules_dir: &std::path::Path) -> Arc<PluginManager> {
    let metrics = MetricsRegistry::new();
    let config = Arc::new(ConfigStore::new(modules_dir.join("config")).unwrap());
    let budget = Arc::new(BudgetManager::new(metrics.clone()));
    let rt = tokio::runtime::Runtime::new().unwrap();
    let handle = rt.handle().clone();
    std::mem::forget(rt);
    let scheduler = TickScheduler::start(metrics.clone(), budget, handle).unwrap();
    PluginManager::new(modules_dir.to_path_buf(), metrics, config, scheduler)
}

#[test]
fn discovery_skips_unparseable_manifests_and_continues() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "good.unit.toml", "this is not { valid toml");
    let mgr = manager(dir.path());

    let report = mgr.discover_and_load().unwrap();
    assert_eq!(report.parse_failures.len(), 1);
    assert!(report.loaded.is_empty());
}

#[test]
fn discovery_excludes_unit_with_missing_hard_dependency() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(
        dir.path(),
        "physics.unit.toml",
        "id = \"physics\"\nversion = \"1.0.0\"\nentry_point = \"x\"\nlibrary = \"libx.so\"\nhard_dependencies = \"missing-core\"\n",
    );
    let mgr = manager(dir.path());

    let report = mgr.discover_and_load().unwrap();
    assert!(report.loaded.is_empty());
    assert_eq!(report.excluded.len(), 1);
    assert_eq!(report.excluded[0].0, "physics");
    assert!(!mgr.is_loaded("physics"));
}

#[test]
fn discovery_excludes_cycle_but_keeps_rest_out_of_resolution() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(
        dir.path(),
        "a.unit.toml",
        "id = \"a\"\nversion = \"1.0.0\"\nentry_point = \"x\"\nlibrary = \"liba.so\"\nhard_dependencies = \"b\"\n",
    );
    write_manifest(
        dir.path(),
        "b.unit.toml",
        "id = \"b\"\nversion = \"1.0.0\"\nentry_point = \"x\"\nlibrary = \"libb.so\"\nhard_dependencies = \"a\"\n",
    );
    let mgr = manager(dir.path());

    let report = mgr.discover_and_load().unwrap();
    let excluded_ids: Vec<&str> = report.excluded.iter().map(|(id, _)| id.as_str()).collect();
    assert!(excluded_ids.contains(&"a"));
    assert!(excluded_ids.contains(&"b"));
    assert!(report.loaded.is_empty());
}

#[test]
fn non_manifest_files_in_modules_dir_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("README.md"), "not a manifest").unwrap();
    let mgr = manager(dir.path());

    let report = mgr.discover_and_load().unwrap();
    assert!(report.loaded.is_empty());
    assert!(report.parse_failures.is_empty());
    assert!(report.excluded.is_empty());
}
