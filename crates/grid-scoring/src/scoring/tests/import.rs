use super::common::*;
use crate::scoring::grid::GridDefinition;
use crate::scoring::import::{GridImportError, GridImporter};

const HEADER: &str = "grid_name,grid_version,effective_date,max_total_points,\
category_id,category_name,category_sort_order,category_max_points_with_partner,category_max_points_no_partner,\
subcategory_id,subcategory_name,subcategory_sort_order,subcategory_max_points_with_partner,subcategory_max_points_no_partner,\
field_id,field_name,field_sort_order,logic_expression,logic_operator,points_with_partner,points_without_partner,mutually_exclusive";

fn csv(rows: &[&str]) -> String {
    let mut text = HEADER.to_string();
    for row in rows {
        text.push('\n');
        text.push_str(row);
    }
    text
}

const AGE_ROW: &str = "mini-crs,2024.1,2024-01-01,100,core,core,1,60,80,age,age,1,20,25,\
age-20-29,age 20 29,1,applicant_age>=20;applicant_age<=29,AND,20,25,no";
const CLB_ROW: &str = "mini-crs,2024.1,2024-01-01,100,core,core,1,60,80,language,language,2,30,35,\
clb-9,clb 9,1,primary_clb_score>=9,AND,28,32,yes";
const FLAT_ROW: &str = "mini-crs,2024.1,2024-01-01,100,additional,additional,2,60,60,nomination,nomination,2,60,60,\
registration,registration,2,,NONE,0,0,";

#[test]
fn csv_rows_build_the_same_tree_as_json() {
    let document =
        GridImporter::csv_from_reader(csv(&[AGE_ROW, CLB_ROW, FLAT_ROW]).as_bytes()).expect("csv");

    let reference = mini_crs_document();
    assert_eq!(document.grid, reference.grid);
    assert_eq!(document.categories, vec![reference.categories[1].clone(), reference.categories[0].clone()]);
    assert_eq!(document.subcategories[0], reference.subcategories[0]);
    assert_eq!(document.fields[0], reference.fields[0]);
    assert_eq!(document.fields[1], reference.fields[2]);
    assert_eq!(document.fields[2], reference.fields[9]);

    let json = serde_json::to_string(&document).expect("serialize");
    let reparsed = GridImporter::json_from_reader(json.as_bytes()).expect("json");
    assert_eq!(reparsed, document);
    GridDefinition::compile(reparsed, &schema()).expect("imported grid compiles");
}

#[test]
fn csv_rows_must_agree_on_shared_records() {
    let conflicting = AGE_ROW.replace("core,core,1,60,80,age", "core,core,1,60,70,age");
    let error = GridImporter::csv_from_reader(csv(&[AGE_ROW, &conflicting]).as_bytes())
        .expect_err("conflict");
    assert!(matches!(
        error,
        GridImportError::Inconsistent { record: "category", .. }
    ));

    let other_grid = CLB_ROW.replacen("mini-crs", "other", 1);
    let error = GridImporter::csv_from_reader(csv(&[AGE_ROW, &other_grid]).as_bytes())
        .expect_err("mixed");
    assert!(matches!(error, GridImportError::MixedGrid { .. }));
}

#[test]
fn csv_errors_are_reported() {
    let error = GridImporter::csv_from_reader(csv(&[]).as_bytes()).expect_err("empty");
    assert!(matches!(error, GridImportError::Empty));

    let bad_date = AGE_ROW.replace("2024-01-01", "01/01/2024");
    let error = GridImporter::csv_from_reader(csv(&[&bad_date]).as_bytes()).expect_err("date");
    assert!(matches!(error, GridImportError::InvalidDate { line: 2, .. }));

    let bad_flag = AGE_ROW.replace(",no", ",maybe");
    let error = GridImporter::csv_from_reader(csv(&[&bad_flag]).as_bytes()).expect_err("flag");
    assert!(matches!(error, GridImportError::Csv(_)));
}

#[test]
fn unsupported_extensions_are_rejected() {
    let error = GridImporter::from_path("grids/crs.xlsx").expect_err("unsupported");
    assert!(matches!(error, GridImportError::UnsupportedFormat(_)));
    assert!(error.to_string().contains("crs.xlsx"));
}
