use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::attributes::{AttributeKind, AttributeSchema};
use super::evaluation::expression::{parse_expression, Clause, ClauseError};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

record_id!(
    /// Identifier of a category record.
    CategoryId
);
record_id!(
    /// Identifier of a subcategory record.
    SubcategoryId
);
record_id!(
    /// Identifier of a field record.
    FieldId
);

/// Grid-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridHeader {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
    pub max_total_points: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: CategoryId,
    pub name: String,
    pub sort_order: i32,
    pub max_points_with_partner: u32,
    pub max_points_no_partner: u32,
}

impl CategoryRecord {
    pub fn max_points(&self, has_partner: bool) -> u32 {
        if has_partner {
            self.max_points_with_partner
        } else {
            self.max_points_no_partner
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubcategoryRecord {
    pub id: SubcategoryId,
    pub category_id: CategoryId,
    pub name: String,
    pub sort_order: i32,
    pub max_points_with_partner: u32,
    pub max_points_no_partner: u32,
}

impl SubcategoryRecord {
    pub fn max_points(&self, has_partner: bool) -> u32 {
        if has_partner {
            self.max_points_with_partner
        } else {
            self.max_points_no_partner
        }
    }
}

/// Smallest scoring unit as authored. The operator stays raw until compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub id: FieldId,
    pub subcategory_id: SubcategoryId,
    pub name: String,
    pub sort_order: i32,
    #[serde(default)]
    pub logic_expression: String,
    pub logic_operator: String,
    pub points_with_partner: u32,
    pub points_without_partner: u32,
    #[serde(default)]
    pub mutually_exclusive: bool,
}

impl FieldRecord {
    pub fn points(&self, has_partner: bool) -> u32 {
        if has_partner {
            self.points_with_partner
        } else {
            self.points_without_partner
        }
    }
}

/// Flat grid document as supplied by a provider. Parents are referenced by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDocument {
    pub grid: GridHeader,
    #[serde(default)]
    pub categories: Vec<CategoryRecord>,
    #[serde(default)]
    pub subcategories: Vec<SubcategoryRecord>,
    #[serde(default)]
    pub fields: Vec<FieldRecord>,
}

/// How a field combines its clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicOperator {
    And,
    Or,
    None,
}

impl LogicOperator {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "AND" => Some(LogicOperator::And),
            "OR" => Some(LogicOperator::Or),
            "NONE" => Some(LogicOperator::None),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            LogicOperator::And => "AND",
            LogicOperator::Or => "OR",
            LogicOperator::None => "NONE",
        }
    }
}

impl fmt::Display for LogicOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Field with its operator resolved and clauses parsed and checked against the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledField {
    pub record: FieldRecord,
    pub operator: LogicOperator,
    pub clauses: Vec<Clause>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSubcategory {
    pub record: SubcategoryRecord,
    pub fields: Vec<CompiledField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledCategory {
    pub record: CategoryRecord,
    pub subcategories: Vec<CompiledSubcategory>,
}

/// Validated grid, ordered by `sort_order` (declaration order on ties) at every level.
#[derive(Debug, Clone, PartialEq)]
pub struct GridDefinition {
    header: GridHeader,
    categories: Vec<CompiledCategory>,
}

impl GridDefinition {
    /// Validate a document against the attribute schema and compile its clauses.
    pub fn compile(
        document: GridDocument,
        schema: &AttributeSchema,
    ) -> Result<Self, GridDefinitionError> {
        let GridDocument {
            grid,
            categories,
            subcategories,
            fields,
        } = document;

        if grid.name.trim().is_empty() {
            return Err(GridDefinitionError::EmptyName);
        }

        ensure_unique("category", categories.iter().map(|record| record.id.as_str()))?;
        ensure_unique(
            "subcategory",
            subcategories.iter().map(|record| record.id.as_str()),
        )?;
        ensure_unique("field", fields.iter().map(|record| record.id.as_str()))?;

        let category_index: HashMap<CategoryId, usize> = categories
            .iter()
            .enumerate()
            .map(|(index, record)| (record.id.clone(), index))
            .collect();

        let mut placed_subcategories = Vec::with_capacity(subcategories.len());
        for record in subcategories {
            let parent = *category_index.get(&record.category_id).ok_or_else(|| {
                GridDefinitionError::UnknownParent {
                    record: "subcategory",
                    id: record.id.to_string(),
                    parent: record.category_id.to_string(),
                }
            })?;
            placed_subcategories.push((
                parent,
                CompiledSubcategory {
                    record,
                    fields: Vec::new(),
                },
            ));
        }

        let subcategory_index: HashMap<SubcategoryId, usize> = placed_subcategories
            .iter()
            .enumerate()
            .map(|(index, (_, subcategory))| (subcategory.record.id.clone(), index))
            .collect();

        for record in fields {
            let parent = *subcategory_index
                .get(&record.subcategory_id)
                .ok_or_else(|| GridDefinitionError::UnknownParent {
                    record: "field",
                    id: record.id.to_string(),
                    parent: record.subcategory_id.to_string(),
                })?;
            let compiled = compile_field(record, schema)?;
            placed_subcategories[parent].1.fields.push(compiled);
        }

        let mut compiled: Vec<CompiledCategory> = categories
            .into_iter()
            .map(|record| CompiledCategory {
                record,
                subcategories: Vec::new(),
            })
            .collect();

        for (parent, mut subcategory) in placed_subcategories {
            subcategory
                .fields
                .sort_by_key(|field| field.record.sort_order);
            compiled[parent].subcategories.push(subcategory);
        }
        for category in &mut compiled {
            category
                .subcategories
                .sort_by_key(|subcategory| subcategory.record.sort_order);
        }
        compiled.sort_by_key(|category| category.record.sort_order);

        Ok(Self {
            header: grid,
            categories: compiled,
        })
    }

    pub fn header(&self) -> &GridHeader {
        &self.header
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn categories(&self) -> &[CompiledCategory] {
        &self.categories
    }

    pub fn field_count(&self) -> usize {
        self.categories
            .iter()
            .flat_map(|category| &category.subcategories)
            .map(|subcategory| subcategory.fields.len())
            .sum()
    }
}

fn ensure_unique<'a>(
    record: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), GridDefinitionError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(GridDefinitionError::DuplicateId {
                record,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

fn compile_field(
    record: FieldRecord,
    schema: &AttributeSchema,
) -> Result<CompiledField, GridDefinitionError> {
    let operator = LogicOperator::parse(&record.logic_operator).ok_or_else(|| {
        GridDefinitionError::UnknownOperator {
            field: record.id.clone(),
            operator: record.logic_operator.clone(),
        }
    })?;

    let clauses = parse_expression(&record.logic_expression).map_err(|source| {
        GridDefinitionError::InvalidClause {
            field: record.id.clone(),
            source,
        }
    })?;

    if clauses.is_empty() && operator != LogicOperator::None {
        return Err(GridDefinitionError::MissingExpression {
            field: record.id.clone(),
            operator,
        });
    }

    for clause in &clauses {
        let kind = schema.kind_of(clause.attribute()).ok_or_else(|| {
            GridDefinitionError::UnknownAttribute {
                field: record.id.clone(),
                attribute: clause.attribute().to_string(),
            }
        })?;
        if clause.operator().is_ordering() && !kind.supports_ordering() {
            return Err(GridDefinitionError::OrderingOnNonNumeric {
                field: record.id.clone(),
                attribute: clause.attribute().to_string(),
                kind,
            });
        }
    }

    Ok(CompiledField {
        record,
        operator,
        clauses,
    })
}

/// Load-time grid violations. Any of these rejects the whole grid.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridDefinitionError {
    #[error("grid name is empty")]
    EmptyName,
    #[error("duplicate {record} id '{id}'")]
    DuplicateId { record: &'static str, id: String },
    #[error("{record} '{id}' references unknown parent '{parent}'")]
    UnknownParent {
        record: &'static str,
        id: String,
        parent: String,
    },
    #[error("field '{field}' has unknown logic operator '{operator}'")]
    UnknownOperator { field: FieldId, operator: String },
    #[error("field '{field}' has an invalid clause: {source}")]
    InvalidClause {
        field: FieldId,
        #[source]
        source: ClauseError,
    },
    #[error("field '{field}' uses {operator} but has no logic expression")]
    MissingExpression {
        field: FieldId,
        operator: LogicOperator,
    },
    #[error("field '{field}' references unknown attribute '{attribute}'")]
    UnknownAttribute { field: FieldId, attribute: String },
    #[error("field '{field}' orders {kind} attribute '{attribute}'")]
    OrderingOnNonNumeric {
        field: FieldId,
        attribute: String,
        kind: AttributeKind,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> AttributeSchema {
        AttributeSchema::new()
            .with("applicant_age", AttributeKind::Number)
            .with("applicant_education_level", AttributeKind::Category)
    }

    fn field(id: &str, subcategory: &str, sort_order: i32, expression: &str) -> FieldRecord {
        FieldRecord {
            id: FieldId::from(id),
            subcategory_id: SubcategoryId::from(subcategory),
            name: id.to_string(),
            sort_order,
            logic_expression: expression.to_string(),
            logic_operator: "and".to_string(),
            points_with_partner: 1,
            points_without_partner: 2,
            mutually_exclusive: false,
        }
    }

    fn document(fields: Vec<FieldRecord>) -> GridDocument {
        GridDocument {
            grid: GridHeader {
                name: "crs".to_string(),
                version: Some("2024".to_string()),
                effective_date: None,
                max_total_points: 100,
            },
            categories: vec![
                CategoryRecord {
                    id: CategoryId::from("late"),
                    name: "Late".to_string(),
                    sort_order: 2,
                    max_points_with_partner: 50,
                    max_points_no_partner: 50,
                },
                CategoryRecord {
                    id: CategoryId::from("early"),
                    name: "Early".to_string(),
                    sort_order: 1,
                    max_points_with_partner: 50,
                    max_points_no_partner: 50,
                },
            ],
            subcategories: vec![
                SubcategoryRecord {
                    id: SubcategoryId::from("age"),
                    category_id: CategoryId::from("early"),
                    name: "Age".to_string(),
                    sort_order: 1,
                    max_points_with_partner: 10,
                    max_points_no_partner: 10,
                },
                SubcategoryRecord {
                    id: SubcategoryId::from("education"),
                    category_id: CategoryId::from("late"),
                    name: "Education".to_string(),
                    sort_order: 1,
                    max_points_with_partner: 10,
                    max_points_no_partner: 10,
                },
            ],
            fields,
        }
    }

    #[test]
    fn compiles_and_orders_by_sort_order_then_declaration() {
        let grid = GridDefinition::compile(
            document(vec![
                field("b", "age", 2, "applicant_age>=30"),
                field("a", "age", 1, "applicant_age>=20"),
                field("c", "age", 1, "applicant_age>=25"),
                field("d", "education", 1, "applicant_education_level==master"),
            ]),
            &schema(),
        )
        .expect("grid compiles");

        let names: Vec<_> = grid
            .categories()
            .iter()
            .map(|category| category.record.name.as_str())
            .collect();
        assert_eq!(names, ["Early", "Late"]);

        let ids: Vec<_> = grid.categories()[0].subcategories[0]
            .fields
            .iter()
            .map(|field| field.record.id.as_str())
            .collect();
        assert_eq!(ids, ["a", "c", "b"]);
        assert_eq!(grid.field_count(), 4);
        assert_eq!(grid.categories()[0].subcategories[0].fields[0].operator, LogicOperator::And);
    }

    #[test]
    fn unknown_attribute_is_rejected() {
        let error = GridDefinition::compile(
            document(vec![field("a", "age", 1, "applicant_height>=150")]),
            &schema(),
        )
        .expect_err("unknown attribute");
        assert_eq!(
            error,
            GridDefinitionError::UnknownAttribute {
                field: FieldId::from("a"),
                attribute: "applicant_height".to_string(),
            }
        );
    }

    #[test]
    fn ordering_against_category_attribute_is_rejected() {
        let error = GridDefinition::compile(
            document(vec![field("a", "education", 1, "applicant_education_level>=3")]),
            &schema(),
        )
        .expect_err("ordering on category");
        assert!(matches!(
            error,
            GridDefinitionError::OrderingOnNonNumeric {
                kind: AttributeKind::Category,
                ..
            }
        ));
    }

    #[test]
    fn ordering_with_text_literal_is_a_clause_error() {
        let error = GridDefinition::compile(
            document(vec![field("a", "age", 1, "applicant_age>=twenty")]),
            &schema(),
        )
        .expect_err("text literal");
        assert!(matches!(
            error,
            GridDefinitionError::InvalidClause {
                source: ClauseError::OrderingOnText { .. },
                ..
            }
        ));
    }

    #[test]
    fn empty_expression_requires_none_operator() {
        let mut flat = field("a", "age", 1, "");
        let error = GridDefinition::compile(document(vec![flat.clone()]), &schema())
            .expect_err("missing expression");
        assert!(matches!(error, GridDefinitionError::MissingExpression { .. }));

        flat.logic_operator = "None".to_string();
        GridDefinition::compile(document(vec![flat]), &schema()).expect("flat award compiles");
    }

    #[test]
    fn structural_problems_are_reported() {
        let error = GridDefinition::compile(
            document(vec![
                field("a", "age", 1, "applicant_age>=20"),
                field("a", "age", 2, "applicant_age>=30"),
            ]),
            &schema(),
        )
        .expect_err("duplicate");
        assert!(matches!(error, GridDefinitionError::DuplicateId { record: "field", .. }));

        let error = GridDefinition::compile(
            document(vec![field("a", "missing", 1, "applicant_age>=20")]),
            &schema(),
        )
        .expect_err("dangling parent");
        assert!(matches!(error, GridDefinitionError::UnknownParent { record: "field", .. }));

        let mut xor = field("a", "age", 1, "applicant_age>=20");
        xor.logic_operator = "XOR".to_string();
        let error = GridDefinition::compile(document(vec![xor]), &schema()).expect_err("operator");
        assert!(matches!(error, GridDefinitionError::UnknownOperator { .. }));
    }
}
