//! Points-grid scoring: attribute snapshots, grid compilation, the evaluation pipeline,
//! and the orchestrator that wires them to providers, storage, and HTTP.

pub mod attributes;
pub mod cache;
pub mod evaluation;
pub mod grid;
pub mod import;
pub mod profile;
pub mod repository;
pub mod result;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use attributes::{AttributeKind, AttributeSchema, AttributeSet, AttributeValue};
pub use cache::GridCache;
pub use evaluation::{
    evaluate_clause, evaluate_field, resolve_exclusivity, Clause, ClauseError,
    ComparisonOperator, EvaluationEngine, EvaluationStage,
};
pub use grid::{
    CategoryId, CategoryRecord, FieldId, FieldRecord, GridDefinition, GridDefinitionError,
    GridDocument, GridHeader, LogicOperator, SubcategoryId, SubcategoryRecord,
};
pub use import::{GridImportError, GridImporter};
pub use profile::{
    ApplicantProfile, ApplicationId, AttributeRegistry, JobOffer, LanguageTest, PartnerProfile,
    WorkExperience,
};
pub use repository::{
    AttributeSetProvider, GridDefinitionProvider, ProviderError, ResultStore, StoreError,
};
pub use result::{
    CapLevel, CappingEvent, CategoryResult, EvaluationId, EvaluationResult, EvaluationSummary,
    FieldResult, ScoreSheet, SubcategoryResult,
};
pub use router::evaluation_router;
pub use service::{EvaluationError, EvaluationOrchestrator};
