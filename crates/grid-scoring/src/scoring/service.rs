use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::cache::GridCache;
use super::evaluation::{EvaluationEngine, EvaluationStage};
use super::grid::{GridDefinition, GridDefinitionError};
use super::profile::ApplicationId;
use super::repository::{
    AttributeSetProvider, GridDefinitionProvider, ProviderError, ResultStore, StoreError,
};
use super::result::{EvaluationId, EvaluationResult};

/// Store attempts per evaluation: the first try plus one retry of an unavailable store.
const PERSIST_ATTEMPTS: u32 = 2;

/// Orchestrator composing the grid source, applicant source, and result store.
pub struct EvaluationOrchestrator<G, A, S> {
    grids: Arc<G>,
    attributes: Arc<A>,
    store: Arc<S>,
    cache: Option<Arc<GridCache>>,
    engine: EvaluationEngine,
}

impl<G, A, S> EvaluationOrchestrator<G, A, S>
where
    G: GridDefinitionProvider + 'static,
    A: AttributeSetProvider + 'static,
    S: ResultStore + 'static,
{
    pub fn new(grids: Arc<G>, attributes: Arc<A>, store: Arc<S>) -> Self {
        Self {
            grids,
            attributes,
            store,
            cache: None,
            engine: EvaluationEngine::new(),
        }
    }

    pub fn with_grid_cache(mut self, cache: Arc<GridCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn grid_cache(&self) -> Option<&Arc<GridCache>> {
        self.cache.as_ref()
    }

    /// Score an application against a named grid and persist the result.
    pub fn evaluate(
        &self,
        application_id: &ApplicationId,
        grid_name: &str,
    ) -> Result<EvaluationResult, EvaluationError> {
        info!(application = %application_id, grid = grid_name, "evaluation started");

        debug!(stage = %EvaluationStage::LoadGrid, grid = grid_name);
        let grid = self.load_grid(grid_name)?;

        debug!(stage = %EvaluationStage::LoadAttributes, application = %application_id);
        let attrs = self
            .attributes
            .get_attributes(application_id)
            .map_err(|error| match error {
                ProviderError::NotFound => EvaluationError::ProfileNotFound(application_id.clone()),
                ProviderError::Unavailable(message) => EvaluationError::SourceUnavailable {
                    stage: EvaluationStage::LoadAttributes,
                    message,
                },
            })?;

        let sheet = self.engine.score(&grid, &attrs);
        let result = EvaluationResult::from_sheet(
            EvaluationId::generate(),
            application_id.clone(),
            Utc::now(),
            sheet,
        );

        let result = self.persist(result)?;
        debug!(stage = %EvaluationStage::Done, evaluation = %result.evaluation_id);
        info!(
            application = %application_id,
            grid = grid_name,
            evaluation = %result.evaluation_id,
            total_score = result.total_score,
            capping_events = result.capping_events.len(),
            "evaluation completed"
        );
        Ok(result)
    }

    /// Fetch a stored evaluation by id.
    pub fn result(&self, evaluation_id: &EvaluationId) -> Result<EvaluationResult, EvaluationError> {
        self.store
            .fetch(evaluation_id)?
            .ok_or_else(|| EvaluationError::EvaluationNotFound(evaluation_id.clone()))
    }

    /// Every stored evaluation for an application, newest first.
    pub fn history(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<EvaluationResult>, EvaluationError> {
        Ok(self.store.for_application(application_id)?)
    }

    pub fn latest(
        &self,
        application_id: &ApplicationId,
    ) -> Result<EvaluationResult, EvaluationError> {
        self.store
            .latest_for_application(application_id)?
            .ok_or_else(|| EvaluationError::NoEvaluations(application_id.clone()))
    }

    fn load_grid(&self, grid_name: &str) -> Result<Arc<GridDefinition>, EvaluationError> {
        let load = || {
            let document = self
                .grids
                .get_grid(grid_name)
                .map_err(|error| match error {
                    ProviderError::NotFound => EvaluationError::GridNotFound(grid_name.to_string()),
                    ProviderError::Unavailable(message) => EvaluationError::SourceUnavailable {
                        stage: EvaluationStage::LoadGrid,
                        message,
                    },
                })?;
            GridDefinition::compile(document, self.attributes.schema()).map_err(|source| {
                EvaluationError::InvalidGridDefinition {
                    grid: grid_name.to_string(),
                    source,
                }
            })
        };

        match &self.cache {
            Some(cache) => cache.get_or_load(grid_name, load),
            None => load().map(Arc::new),
        }
    }

    fn persist(&self, mut result: EvaluationResult) -> Result<EvaluationResult, EvaluationError> {
        debug!(stage = %EvaluationStage::Persist, evaluation = %result.evaluation_id);

        let mut attempt = 1;
        loop {
            match self.store.save(&result) {
                Ok(stored_id) => {
                    result.evaluation_id = stored_id;
                    return Ok(result);
                }
                Err(source @ StoreError::Unavailable(_)) if attempt < PERSIST_ATTEMPTS => {
                    warn!(
                        evaluation = %result.evaluation_id,
                        attempt,
                        error = %source,
                        "storing evaluation failed; retrying"
                    );
                    attempt += 1;
                }
                Err(source) => {
                    error!(
                        evaluation = %result.evaluation_id,
                        attempt,
                        error = %source,
                        "storing evaluation failed"
                    );
                    return Err(EvaluationError::Persistence {
                        result: Box::new(result),
                        source,
                    });
                }
            }
        }
    }
}

/// Error raised by the evaluation orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("grid '{0}' not found")]
    GridNotFound(String),
    #[error("applicant profile '{0}' not found")]
    ProfileNotFound(ApplicationId),
    #[error("grid '{grid}' is invalid: {source}")]
    InvalidGridDefinition {
        grid: String,
        #[source]
        source: GridDefinitionError,
    },
    #[error("{stage} source unavailable: {message}")]
    SourceUnavailable {
        stage: EvaluationStage,
        message: String,
    },
    #[error("evaluation {} was computed but could not be stored: {source}", .result.evaluation_id)]
    Persistence {
        result: Box<EvaluationResult>,
        #[source]
        source: StoreError,
    },
    #[error("evaluation '{0}' not found")]
    EvaluationNotFound(EvaluationId),
    #[error("no evaluations recorded for application '{0}'")]
    NoEvaluations(ApplicationId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EvaluationError {
    /// The computed result, when the failure happened after scoring.
    pub fn computed_result(&self) -> Option<&EvaluationResult> {
        match self {
            EvaluationError::Persistence { result, .. } => Some(result.as_ref()),
            _ => None,
        }
    }
}
