// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn pool_in(temp: &tempfile::TempDir, theme: &[&str]) -> NamePool {
    let rig = Rig::new(temp.path(), "demo");
    NamePool::load_with_theme(rig, theme.iter().map(|s| s.to_string()).collect()).unwrap()
}

#[test]
fn allocates_in_theme_order() {
    let temp = tempfile::tempdir().unwrap();
    let pool = pool_in(&temp, &["a", "b", "c"]);
    assert_eq!(pool.allocate().unwrap(), "a");
    assert_eq!(pool.allocate().unwrap(), "b");
    assert_eq!(pool.allocate().unwrap(), "c");
}

#[test]
fn released_name_is_reallocated() {
    let temp = tempfile::tempdir().unwrap();
    let pool = pool_in(&temp, &["a", "b", "c"]);
    for _ in 0..3 {
        pool.allocate().unwrap();
    }
    pool.release("b").unwrap();
    assert_eq!(pool.allocate().unwrap(), "b");
}

#[test]
fn exhausted_theme_mints_overflow_names() {
    let temp = tempfile::tempdir().unwrap();
    let pool = pool_in(&temp, &["a"]);
    assert_eq!(pool.allocate().unwrap(), "a");
    assert_eq!(pool.allocate().unwrap(), "demo-0");
    assert_eq!(pool.allocate().unwrap(), "demo-1");

    // Overflow names never return to the pool.
    pool.release("demo-0").unwrap();
    assert_eq!(pool.allocate().unwrap(), "demo-2");
}

#[test]
fn on_disk_directories_occupy_names() {
    let temp = tempfile::tempdir().unwrap();
    let rig = Rig::new(temp.path(), "demo");
    std::fs::create_dir_all(rig.polecat_dir("a")).unwrap();
    let pool = pool_in(&temp, &["a", "b"]);
    assert_eq!(pool.allocate().unwrap(), "b");
}

#[test]
fn reservations_survive_reload() {
    let temp = tempfile::tempdir().unwrap();
    {
        let pool = pool_in(&temp, &["a", "b"]);
        assert_eq!(pool.allocate().unwrap(), "a");
    }
    // No directory was created for "a", but the reservation persists.
    let pool = pool_in(&temp, &["a", "b"]);
    assert_eq!(pool.allocate().unwrap(), "b");
}

#[test]
fn clear_reservation_returns_unbuilt_name() {
    let temp = tempfile::tempdir().unwrap();
    let pool = pool_in(&temp, &["a", "b"]);
    assert_eq!(pool.allocate().unwrap(), "a");
    pool.clear_reservation("a").unwrap();

    // The in-use set is rebuilt from disk on allocate; with no directory and
    // no reservation, "a" is free again.
    assert_eq!(pool.allocate().unwrap(), "a");
}

#[test]
fn reconcile_drops_reservations_for_existing_dirs() {
    let temp = tempfile::tempdir().unwrap();
    let rig = Rig::new(temp.path(), "demo");
    let pool = pool_in(&temp, &["a", "b"]);
    assert_eq!(pool.allocate().unwrap(), "a");

    std::fs::create_dir_all(rig.polecat_dir("a")).unwrap();
    pool.reconcile(&["a".to_string()]).unwrap();
    assert!(pool.reserved().is_empty());
    assert_eq!(pool.allocate().unwrap(), "b");
}

#[test]
fn max_size_bounds_theme_usage() {
    let temp = tempfile::tempdir().unwrap();
    let pool = pool_in(&temp, &["a", "b", "c"]).with_max_size(2);
    assert_eq!(pool.allocate().unwrap(), "a");
    assert_eq!(pool.allocate().unwrap(), "b");
    assert_eq!(pool.allocate().unwrap(), "demo-0");
}

#[test]
fn state_file_written_atomically() {
    let temp = tempfile::tempdir().unwrap();
    let rig = Rig::new(temp.path(), "demo");
    let pool = pool_in(&temp, &["a"]);
    pool.allocate().unwrap();

    let runtime: Vec<String> = std::fs::read_dir(rig.runtime_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(runtime, vec!["namepool-state.json".to_string()]);
}

#[test]
fn corrupt_state_starts_fresh() {
    let temp = tempfile::tempdir().unwrap();
    let rig = Rig::new(temp.path(), "demo");
    std::fs::create_dir_all(rig.runtime_dir()).unwrap();
    std::fs::write(rig.namepool_state_path(), "{broken").unwrap();

    let pool = pool_in(&temp, &["a"]);
    assert_eq!(pool.allocate().unwrap(), "a");
}

#[test]
fn concurrent_allocators_never_share_a_name() {
    let temp = tempfile::tempdir().unwrap();
    let rig = Rig::new(temp.path(), "demo");
    let theme: Vec<String> = (0..8).map(|n| format!("name{n}")).collect();
    let pool = std::sync::Arc::new(NamePool::load_with_theme(rig, theme).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = std::sync::Arc::clone(&pool);
            std::thread::spawn(move || pool.allocate().unwrap())
        })
        .collect();

    let mut names: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 8);
}

#[test]
fn default_theme_contains_known_names() {
    assert!(theme_names("wasteland").unwrap().contains(&"toast"));
    assert!(theme_names("forge").unwrap().contains(&"anvil"));
    assert!(theme_names("nope").is_none());
}
