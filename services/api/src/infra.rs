use grid_scoring::error::AppError;
use grid_scoring::scoring::{
    ApplicantProfile, ApplicationId, AttributeRegistry, AttributeSchema, AttributeSet,
    AttributeSetProvider, EvaluationId, EvaluationResult, GridDefinitionProvider, GridDocument,
    GridImporter, ProviderError, ResultStore, StoreError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Grid documents loaded at startup, keyed by grid name.
#[derive(Default, Clone)]
pub(crate) struct InMemoryGridProvider {
    grids: Arc<Mutex<HashMap<String, GridDocument>>>,
}

impl InMemoryGridProvider {
    pub(crate) fn insert(&self, document: GridDocument) {
        let mut guard = self.grids.lock().expect("grid mutex poisoned");
        guard.insert(document.grid.name.clone(), document);
    }

    pub(crate) fn load_paths<P: AsRef<Path>>(&self, paths: &[P]) -> Result<usize, AppError> {
        for path in paths {
            let document = GridImporter::from_path(path)?;
            info!(
                grid = %document.grid.name,
                fields = document.fields.len(),
                path = %path.as_ref().display(),
                "grid loaded"
            );
            self.insert(document);
        }
        Ok(paths.len())
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let guard = self.grids.lock().expect("grid mutex poisoned");
        let mut names: Vec<String> = guard.keys().cloned().collect();
        names.sort();
        names
    }
}

impl GridDefinitionProvider for InMemoryGridProvider {
    fn get_grid(&self, grid_name: &str) -> Result<GridDocument, ProviderError> {
        let guard = self.grids.lock().expect("grid mutex poisoned");
        guard.get(grid_name).cloned().ok_or(ProviderError::NotFound)
    }
}

/// Applicant profiles snapshotted through the standard attribute registry.
#[derive(Clone)]
pub(crate) struct InMemoryProfileProvider {
    registry: Arc<AttributeRegistry>,
    profiles: Arc<Mutex<HashMap<ApplicationId, ApplicantProfile>>>,
}

impl Default for InMemoryProfileProvider {
    fn default() -> Self {
        Self {
            registry: Arc::new(AttributeRegistry::standard()),
            profiles: Arc::default(),
        }
    }
}

impl InMemoryProfileProvider {
    pub(crate) fn insert(&self, profile: ApplicantProfile) {
        let mut guard = self.profiles.lock().expect("profile mutex poisoned");
        guard.insert(profile.application_id.clone(), profile);
    }

    /// Loads a JSON array of profiles, replacing any with the same application id.
    pub(crate) fn load_reader<R: Read>(&self, reader: R) -> Result<usize, AppError> {
        let profiles: Vec<ApplicantProfile> = serde_json::from_reader(reader)?;
        let count = profiles.len();
        for profile in profiles {
            self.insert(profile);
        }
        Ok(count)
    }

    pub(crate) fn load_path(&self, path: &Path) -> Result<usize, AppError> {
        let file = File::open(path)?;
        let count = self.load_reader(BufReader::new(file))?;
        info!(profiles = count, path = %path.display(), "applicant profiles loaded");
        Ok(count)
    }
}

impl AttributeSetProvider for InMemoryProfileProvider {
    fn schema(&self) -> &AttributeSchema {
        self.registry.schema()
    }

    fn get_attributes(&self, application_id: &ApplicationId) -> Result<AttributeSet, ProviderError> {
        let guard = self.profiles.lock().expect("profile mutex poisoned");
        guard
            .get(application_id)
            .map(|profile| self.registry.snapshot(profile))
            .ok_or(ProviderError::NotFound)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryResultStore {
    results: Arc<Mutex<Vec<EvaluationResult>>>,
}

impl ResultStore for InMemoryResultStore {
    fn save(&self, result: &EvaluationResult) -> Result<EvaluationId, StoreError> {
        let mut guard = self.results.lock().expect("result mutex poisoned");
        if guard
            .iter()
            .any(|stored| stored.evaluation_id == result.evaluation_id)
        {
            return Err(StoreError::Conflict);
        }
        guard.push(result.clone());
        Ok(result.evaluation_id.clone())
    }

    fn fetch(&self, id: &EvaluationId) -> Result<Option<EvaluationResult>, StoreError> {
        let guard = self.results.lock().expect("result mutex poisoned");
        Ok(guard
            .iter()
            .find(|result| &result.evaluation_id == id)
            .cloned())
    }

    fn for_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<EvaluationResult>, StoreError> {
        let guard = self.results.lock().expect("result mutex poisoned");
        Ok(guard
            .iter()
            .rev()
            .filter(|result| &result.application_id == application_id)
            .cloned()
            .collect())
    }
}
