use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::grid::{CategoryId, FieldId, SubcategoryId};
use super::profile::ApplicationId;

/// Identifier assigned to a persisted evaluation run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationId(pub String);

impl EvaluationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for EvaluationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldResult {
    pub field_id: FieldId,
    pub field_name: String,
    pub sort_order: i32,
    pub logic_expression: String,
    pub mutually_exclusive: bool,
    pub qualifies: bool,
    pub points_earned: u32,
    /// Set when the field qualified but lost the exclusivity contest.
    pub suppressed: bool,
    pub actual_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubcategoryResult {
    pub subcategory_id: SubcategoryId,
    pub name: String,
    pub sort_order: i32,
    pub user_score: u32,
    pub max_possible_score: u32,
    pub field_count: usize,
    pub fields: Vec<FieldResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResult {
    pub category_id: CategoryId,
    pub name: String,
    pub sort_order: i32,
    pub user_score: u32,
    pub max_possible_score: u32,
    /// Fields across every subcategory, suppressed ones included.
    pub field_count: usize,
    pub subcategory_count: usize,
    pub subcategories: Vec<SubcategoryResult>,
}

/// Level of the tree at which a maximum reduced a raw sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapLevel {
    Subcategory,
    Category,
    Grid,
}

impl CapLevel {
    pub const fn label(self) -> &'static str {
        match self {
            CapLevel::Subcategory => "subcategory",
            CapLevel::Category => "category",
            CapLevel::Grid => "grid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CappingEvent {
    pub level: CapLevel,
    pub name: String,
    pub raw_score: u32,
    pub capped_score: u32,
    /// True when the overflow points at inconsistent grid maxima.
    pub integrity_warning: bool,
}

impl CappingEvent {
    pub fn describe(&self) -> String {
        format!(
            "{}: points reduced from {} to {}",
            self.name, self.raw_score, self.capped_score
        )
    }
}

/// Deterministic engine output for one grid and snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSheet {
    pub grid_name: String,
    pub grid_version: Option<String>,
    pub has_partner: bool,
    pub total_score: u32,
    pub max_total_points: u32,
    pub categories: Vec<CategoryResult>,
    pub capping_events: Vec<CappingEvent>,
    pub notes: String,
}

/// Persisted evaluation tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub evaluation_id: EvaluationId,
    pub application_id: ApplicationId,
    pub grid_name: String,
    pub grid_version: Option<String>,
    pub has_partner: bool,
    pub total_score: u32,
    pub max_total_points: u32,
    pub evaluation_date: DateTime<Utc>,
    pub categories: Vec<CategoryResult>,
    pub capping_events: Vec<CappingEvent>,
    pub notes: String,
}

impl EvaluationResult {
    pub fn from_sheet(
        evaluation_id: EvaluationId,
        application_id: ApplicationId,
        evaluation_date: DateTime<Utc>,
        sheet: ScoreSheet,
    ) -> Self {
        let ScoreSheet {
            grid_name,
            grid_version,
            has_partner,
            total_score,
            max_total_points,
            categories,
            capping_events,
            notes,
        } = sheet;

        Self {
            evaluation_id,
            application_id,
            grid_name,
            grid_version,
            has_partner,
            total_score,
            max_total_points,
            evaluation_date,
            categories,
            capping_events,
            notes,
        }
    }

    pub fn summary(&self) -> EvaluationSummary {
        EvaluationSummary {
            success: true,
            evaluation_id: self.evaluation_id.clone(),
            application_id: self.application_id.clone(),
            grid_name: self.grid_name.clone(),
            total_score: self.total_score,
            evaluation_date: self.evaluation_date,
        }
    }

    pub fn field(&self, field_id: &str) -> Option<&FieldResult> {
        self.categories
            .iter()
            .flat_map(|category| &category.subcategories)
            .flat_map(|subcategory| &subcategory.fields)
            .find(|field| field.field_id.as_str() == field_id)
    }
}

/// Response body for a created evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationSummary {
    pub success: bool,
    pub evaluation_id: EvaluationId,
    pub application_id: ApplicationId,
    pub grid_name: String,
    pub total_score: u32,
    pub evaluation_date: DateTime<Utc>,
}
