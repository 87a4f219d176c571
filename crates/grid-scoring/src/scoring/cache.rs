use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::grid::GridDefinition;

/// Read-through cache of compiled grids keyed by grid name.
///
/// Loaders run without holding the lock, so a slow miss never stalls lookups of other
/// grids. Publication goes through the write lock and the first finished load wins, so
/// readers see a grid either fully compiled or not at all. The evaluation path only reads
/// and populates; `invalidate` and `clear` are for administrative callers.
#[derive(Debug, Default)]
pub struct GridCache {
    grids: RwLock<HashMap<String, Arc<GridDefinition>>>,
}

impl GridCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<GridDefinition>> {
        self.grids.read().get(name).cloned()
    }

    /// Return the cached grid or run `loader` and publish its result. Failures are not cached.
    pub fn get_or_load<E, F>(&self, name: &str, loader: F) -> Result<Arc<GridDefinition>, E>
    where
        F: FnOnce() -> Result<GridDefinition, E>,
    {
        if let Some(grid) = self.get(name) {
            debug!(grid = name, "grid cache hit");
            return Ok(grid);
        }

        debug!(grid = name, "grid cache miss");
        let loaded = Arc::new(loader()?);

        let mut grids = self.grids.write();
        let published = grids
            .entry(name.to_string())
            .or_insert_with(|| Arc::clone(&loaded));
        if !Arc::ptr_eq(published, &loaded) {
            debug!(grid = name, "concurrent load published first; discarding ours");
        }
        Ok(Arc::clone(published))
    }

    pub fn invalidate(&self, name: &str) -> bool {
        self.grids.write().remove(name).is_some()
    }

    pub fn clear(&self) {
        self.grids.write().clear();
    }

    pub fn len(&self) -> usize {
        self.grids.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
