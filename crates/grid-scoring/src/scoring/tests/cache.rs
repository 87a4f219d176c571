use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::common::*;
use crate::scoring::cache::GridCache;
use crate::scoring::grid::GridDefinition;

fn compile() -> Result<GridDefinition, String> {
    GridDefinition::compile(mini_crs_document(), &schema()).map_err(|error| error.to_string())
}

#[test]
fn repeated_loads_share_one_grid() {
    let cache = GridCache::new();

    let first = cache.get_or_load(GRID_NAME, compile).expect("loads");
    let second = cache
        .get_or_load(GRID_NAME, || -> Result<GridDefinition, String> {
            panic!("loader must not run on a hit")
        })
        .expect("cached");

    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn invalidate_and_clear_force_reloads() {
    let cache = GridCache::new();
    let first = cache.get_or_load(GRID_NAME, compile).expect("loads");

    assert!(cache.invalidate(GRID_NAME));
    assert!(!cache.invalidate(GRID_NAME));
    let reloaded = cache.get_or_load(GRID_NAME, compile).expect("reloads");
    assert!(!Arc::ptr_eq(&first, &reloaded));

    cache.clear();
    assert!(cache.is_empty());
    assert!(cache.get(GRID_NAME).is_none());
}

#[test]
fn failed_loads_are_not_cached() {
    let cache = GridCache::new();

    let error = cache
        .get_or_load(GRID_NAME, || Err::<GridDefinition, _>("offline".to_string()))
        .expect_err("loader fails");
    assert_eq!(error, "offline");
    assert!(cache.is_empty());
    cache.get_or_load(GRID_NAME, compile).expect("later load succeeds");
    assert_eq!(cache.len(), 1);
}

#[test]
fn concurrent_readers_see_one_published_grid() {
    let cache = Arc::new(GridCache::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.get_or_load(GRID_NAME, compile).expect("loads"))
        })
        .collect();
    let grids: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread completes"))
        .collect();

    assert_eq!(cache.len(), 1);
    for grid in &grids {
        assert!(Arc::ptr_eq(grid, &grids[0]));
    }
}

#[test]
fn slow_miss_does_not_block_other_grids() {
    let cache = Arc::new(GridCache::new());
    cache.get_or_load("other", compile).expect("loads");

    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let loader_cache = Arc::clone(&cache);
    let slow = thread::spawn(move || {
        loader_cache.get_or_load(GRID_NAME, move || {
            started_tx.send(()).expect("signal start");
            release_rx
                .recv_timeout(Duration::from_secs(2))
                .map_err(|_| "loader was never released".to_string())?;
            compile()
        })
    });

    started_rx.recv().expect("loader started");
    assert!(cache.get("other").is_some());
    assert_eq!(cache.len(), 1);
    release_tx.send(()).expect("release loader");

    slow.join()
        .expect("thread completes")
        .expect("slow load finishes once released");
    assert_eq!(cache.len(), 2);
}

#[test]
fn first_finished_load_is_published() {
    let cache = GridCache::new();
    let mut inner = None;

    let outer = cache
        .get_or_load(GRID_NAME, || {
            inner = Some(cache.get_or_load(GRID_NAME, compile)?);
            compile()
        })
        .expect("loads");

    let inner = inner.expect("nested load ran");
    assert!(Arc::ptr_eq(&outer, &inner));
    let published = cache.get(GRID_NAME).expect("published");
    assert!(Arc::ptr_eq(&published, &inner));
    assert_eq!(cache.len(), 1);
}
