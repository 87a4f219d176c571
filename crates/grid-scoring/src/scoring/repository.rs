use super::attributes::{AttributeSchema, AttributeSet};
use super::grid::GridDocument;
use super::profile::ApplicationId;
use super::result::{EvaluationId, EvaluationResult};

/// Source of raw grid documents keyed by grid name.
pub trait GridDefinitionProvider: Send + Sync {
    fn get_grid(&self, grid_name: &str) -> Result<GridDocument, ProviderError>;
}

/// Source of applicant snapshots, together with the schema grids are checked against.
pub trait AttributeSetProvider: Send + Sync {
    fn schema(&self) -> &AttributeSchema;
    fn get_attributes(&self, application_id: &ApplicationId)
        -> Result<AttributeSet, ProviderError>;
}

/// Storage abstraction for finished evaluations.
pub trait ResultStore: Send + Sync {
    fn save(&self, result: &EvaluationResult) -> Result<EvaluationId, StoreError>;
    fn fetch(&self, id: &EvaluationId) -> Result<Option<EvaluationResult>, StoreError>;
    /// Results for one application, newest first.
    fn for_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<EvaluationResult>, StoreError>;
    fn latest_for_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<EvaluationResult>, StoreError> {
        Ok(self.for_application(application_id)?.into_iter().next())
    }
}

/// Error enumeration for provider lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("record not found")]
    NotFound,
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// Error enumeration for result store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("evaluation already stored")]
    Conflict,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
