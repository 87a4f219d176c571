use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use super::grid::{
    CategoryId, CategoryRecord, FieldId, FieldRecord, GridDocument, GridHeader, SubcategoryId,
    SubcategoryRecord,
};

/// Errors raised while reading a grid document from disk or a CSV export.
#[derive(Debug)]
pub enum GridImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Json(serde_json::Error),
    UnsupportedFormat(PathBuf),
    Empty,
    MixedGrid { expected: String, found: String },
    InvalidDate { line: usize, value: String },
    Inconsistent { record: &'static str, id: String },
}

impl std::fmt::Display for GridImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GridImportError::Io(err) => write!(f, "failed to read grid file: {}", err),
            GridImportError::Csv(err) => write!(f, "invalid grid CSV data: {}", err),
            GridImportError::Json(err) => write!(f, "invalid grid JSON document: {}", err),
            GridImportError::UnsupportedFormat(path) => write!(
                f,
                "unsupported grid file '{}'; expected .json or .csv",
                path.display()
            ),
            GridImportError::Empty => write!(f, "grid CSV contains no rows"),
            GridImportError::MixedGrid { expected, found } => write!(
                f,
                "grid CSV mixes grids '{}' and '{}'",
                expected, found
            ),
            GridImportError::InvalidDate { line, value } => {
                write!(f, "invalid effective date '{}' on line {}", value, line)
            }
            GridImportError::Inconsistent { record, id } => write!(
                f,
                "rows disagree on the definition of {} '{}'",
                record, id
            ),
        }
    }
}

impl std::error::Error for GridImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GridImportError::Io(err) => Some(err),
            GridImportError::Csv(err) => Some(err),
            GridImportError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GridImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for GridImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<serde_json::Error> for GridImportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

/// Reads grid documents from JSON files or denormalized CSV exports.
pub struct GridImporter;

impl GridImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<GridDocument, GridImportError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("json") => Self::json_from_reader(std::fs::File::open(path)?),
            Some("csv") => Self::csv_from_reader(std::fs::File::open(path)?),
            _ => Err(GridImportError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub fn json_from_reader<R: Read>(reader: R) -> Result<GridDocument, GridImportError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Build a grid document from one CSV row per field. Category and subcategory columns are
    /// repeated on every row and must agree wherever an id reappears.
    pub fn csv_from_reader<R: Read>(reader: R) -> Result<GridDocument, GridImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut header: Option<GridHeader> = None;
        let mut categories: Vec<CategoryRecord> = Vec::new();
        let mut subcategories: Vec<SubcategoryRecord> = Vec::new();
        let mut fields = Vec::new();
        let mut category_index: HashMap<CategoryId, usize> = HashMap::new();
        let mut subcategory_index: HashMap<SubcategoryId, usize> = HashMap::new();

        for (offset, record) in csv_reader.deserialize::<GridRow>().enumerate() {
            let row = record?;
            // Line numbers count the header row.
            let line = offset + 2;

            let row_header = row.header(line)?;
            if let Some(existing) = &header {
                if existing.name != row_header.name {
                    return Err(GridImportError::MixedGrid {
                        expected: existing.name.clone(),
                        found: row_header.name,
                    });
                }
                if *existing != row_header {
                    return Err(GridImportError::Inconsistent {
                        record: "grid",
                        id: row_header.name,
                    });
                }
            } else {
                header = Some(row_header);
            }

            let category = row.category();
            match category_index.get(&category.id) {
                Some(&index) if categories[index] != category => {
                    return Err(GridImportError::Inconsistent {
                        record: "category",
                        id: category.id.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    category_index.insert(category.id.clone(), categories.len());
                    categories.push(category);
                }
            }

            let subcategory = row.subcategory();
            match subcategory_index.get(&subcategory.id) {
                Some(&index) if subcategories[index] != subcategory => {
                    return Err(GridImportError::Inconsistent {
                        record: "subcategory",
                        id: subcategory.id.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    subcategory_index.insert(subcategory.id.clone(), subcategories.len());
                    subcategories.push(subcategory);
                }
            }

            fields.push(row.into_field());
        }

        let grid = header.ok_or(GridImportError::Empty)?;
        Ok(GridDocument {
            grid,
            categories,
            subcategories,
            fields,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GridRow {
    grid_name: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    grid_version: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    effective_date: Option<String>,
    max_total_points: u32,
    category_id: String,
    category_name: String,
    category_sort_order: i32,
    category_max_points_with_partner: u32,
    category_max_points_no_partner: u32,
    subcategory_id: String,
    subcategory_name: String,
    subcategory_sort_order: i32,
    subcategory_max_points_with_partner: u32,
    subcategory_max_points_no_partner: u32,
    field_id: String,
    field_name: String,
    field_sort_order: i32,
    #[serde(default)]
    logic_expression: String,
    logic_operator: String,
    points_with_partner: u32,
    points_without_partner: u32,
    #[serde(default, deserialize_with = "flexible_flag")]
    mutually_exclusive: bool,
}

impl GridRow {
    fn header(&self, line: usize) -> Result<GridHeader, GridImportError> {
        let effective_date = match self.effective_date.as_deref() {
            Some(raw) => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                GridImportError::InvalidDate {
                    line,
                    value: raw.to_string(),
                }
            })?),
            None => None,
        };

        Ok(GridHeader {
            name: self.grid_name.clone(),
            version: self.grid_version.clone(),
            effective_date,
            max_total_points: self.max_total_points,
        })
    }

    fn category(&self) -> CategoryRecord {
        CategoryRecord {
            id: CategoryId(self.category_id.clone()),
            name: self.category_name.clone(),
            sort_order: self.category_sort_order,
            max_points_with_partner: self.category_max_points_with_partner,
            max_points_no_partner: self.category_max_points_no_partner,
        }
    }

    fn subcategory(&self) -> SubcategoryRecord {
        SubcategoryRecord {
            id: SubcategoryId(self.subcategory_id.clone()),
            category_id: CategoryId(self.category_id.clone()),
            name: self.subcategory_name.clone(),
            sort_order: self.subcategory_sort_order,
            max_points_with_partner: self.subcategory_max_points_with_partner,
            max_points_no_partner: self.subcategory_max_points_no_partner,
        }
    }

    fn into_field(self) -> FieldRecord {
        FieldRecord {
            id: FieldId(self.field_id),
            subcategory_id: SubcategoryId(self.subcategory_id),
            name: self.field_name,
            sort_order: self.field_sort_order,
            logic_expression: self.logic_expression,
            logic_operator: self.logic_operator,
            points_with_partner: self.points_with_partner,
            points_without_partner: self.points_without_partner,
            mutually_exclusive: self.mutually_exclusive,
        }
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn flexible_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "no" | "n" | "0" => Ok(false),
        "true" | "yes" | "y" | "1" => Ok(true),
        other => Err(serde::de::Error::custom(format!(
            "expected a yes/no flag, found '{other}'"
        ))),
    }
}
