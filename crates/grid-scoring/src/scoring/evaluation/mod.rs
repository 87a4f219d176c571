mod aggregate;
mod exclusivity;
pub mod expression;
mod field;
mod insights;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use aggregate::{aggregate_category, aggregate_subcategory, compute_total};
pub use exclusivity::resolve_exclusivity;
pub use expression::{evaluate_clause, Clause, ClauseError, ClauseOutcome, ComparisonOperator};
pub use field::evaluate_field;
pub use insights::summary_notes;

use super::attributes::AttributeSet;
use super::grid::GridDefinition;
use super::result::{CappingEvent, CategoryResult, FieldResult, ScoreSheet, SubcategoryResult};

/// Pipeline stages in the order an evaluation run passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationStage {
    LoadGrid,
    LoadAttributes,
    EvaluateFields,
    ResolveExclusivity,
    AggregateSubcategories,
    AggregateCategories,
    ComputeTotal,
    Persist,
    Done,
}

impl EvaluationStage {
    pub const fn label(self) -> &'static str {
        match self {
            EvaluationStage::LoadGrid => "LOAD_GRID",
            EvaluationStage::LoadAttributes => "LOAD_ATTRIBUTES",
            EvaluationStage::EvaluateFields => "EVALUATE_FIELDS",
            EvaluationStage::ResolveExclusivity => "RESOLVE_EXCLUSIVITY",
            EvaluationStage::AggregateSubcategories => "AGGREGATE_SUBCATEGORIES",
            EvaluationStage::AggregateCategories => "AGGREGATE_CATEGORIES",
            EvaluationStage::ComputeTotal => "COMPUTE_TOTAL",
            EvaluationStage::Persist => "PERSIST",
            EvaluationStage::Done => "DONE",
        }
    }
}

impl fmt::Display for EvaluationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Field results grouped per subcategory, per category, in grid order.
type FieldGrid = Vec<Vec<Vec<FieldResult>>>;

/// Stateless evaluator that scores an attribute snapshot against a compiled grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluationEngine;

impl EvaluationEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, grid: &GridDefinition, attrs: &AttributeSet) -> ScoreSheet {
        let has_partner = attrs.has_partner();
        let mut events = Vec::new();

        let evaluated = evaluate_fields(grid, attrs);
        let resolved = resolve(evaluated);
        let subcategories = aggregate_subcategories(grid, resolved, has_partner, &mut events);
        let categories = aggregate_categories(grid, subcategories, has_partner, &mut events);

        debug!(stage = %EvaluationStage::ComputeTotal, grid = grid.name());
        let total_score = compute_total(grid.header(), &categories, &mut events);
        let notes = summary_notes(&categories, &events);

        ScoreSheet {
            grid_name: grid.header().name.clone(),
            grid_version: grid.header().version.clone(),
            has_partner,
            total_score,
            max_total_points: grid.header().max_total_points,
            categories,
            capping_events: events,
            notes,
        }
    }
}

fn evaluate_fields(grid: &GridDefinition, attrs: &AttributeSet) -> FieldGrid {
    debug!(
        stage = %EvaluationStage::EvaluateFields,
        fields = grid.field_count(),
        attributes = attrs.len()
    );
    grid.categories()
        .iter()
        .map(|category| {
            category
                .subcategories
                .iter()
                .map(|subcategory| {
                    subcategory
                        .fields
                        .iter()
                        .map(|field| evaluate_field(field, attrs))
                        .collect()
                })
                .collect()
        })
        .collect()
}

fn resolve(evaluated: FieldGrid) -> FieldGrid {
    debug!(stage = %EvaluationStage::ResolveExclusivity);
    evaluated
        .into_iter()
        .map(|category| category.into_iter().map(resolve_exclusivity).collect())
        .collect()
}

fn aggregate_subcategories(
    grid: &GridDefinition,
    resolved: FieldGrid,
    has_partner: bool,
    events: &mut Vec<CappingEvent>,
) -> Vec<Vec<SubcategoryResult>> {
    debug!(stage = %EvaluationStage::AggregateSubcategories);
    grid.categories()
        .iter()
        .zip(resolved)
        .map(|(category, fields)| {
            category
                .subcategories
                .iter()
                .zip(fields)
                .map(|(subcategory, fields)| {
                    aggregate_subcategory(&subcategory.record, fields, has_partner, events)
                })
                .collect()
        })
        .collect()
}

fn aggregate_categories(
    grid: &GridDefinition,
    subcategories: Vec<Vec<SubcategoryResult>>,
    has_partner: bool,
    events: &mut Vec<CappingEvent>,
) -> Vec<CategoryResult> {
    debug!(stage = %EvaluationStage::AggregateCategories);
    grid.categories()
        .iter()
        .zip(subcategories)
        .map(|(category, subcategories)| {
            aggregate_category(&category.record, subcategories, has_partner, events)
        })
        .collect()
}
