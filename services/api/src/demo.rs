use crate::infra::{InMemoryGridProvider, InMemoryProfileProvider, InMemoryResultStore};
use clap::Args;
use grid_scoring::error::AppError;
use grid_scoring::scoring::{
    ApplicantProfile, ApplicationId, EvaluationError, EvaluationOrchestrator, EvaluationResult,
    GridDocument, GridImporter,
};
use std::fmt::Write as _;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

const SAMPLE_GRID: &str = include_str!("../data/crs_sample.json");
const SAMPLE_PROFILES: &str = include_str!("../data/profiles.json");
const SINGLE_APPLICANT: &str = "app-1001";
const PARTNERED_APPLICANT: &str = "app-1002";

#[derive(Args, Debug)]
pub(crate) struct EvaluateArgs {
    /// Grid document to score against (.json or .csv)
    #[arg(long, value_name = "PATH")]
    pub(crate) grid: PathBuf,
    /// Applicant profile as a JSON object
    #[arg(long, value_name = "PATH")]
    pub(crate) profile: PathBuf,
    /// Print the full evaluation as JSON instead of the text breakdown
    #[arg(long, default_value_t = false)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Use the married sample applicant so the partner columns and grid caps apply
    #[arg(long, default_value_t = false)]
    pub(crate) with_partner: bool,
    /// Print the full evaluation as JSON instead of the text breakdown
    #[arg(long, default_value_t = false)]
    pub(crate) json: bool,
}

pub(crate) fn run_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let grid = GridImporter::from_path(&args.grid)?;
    let reader = BufReader::new(File::open(&args.profile)?);
    let profile: ApplicantProfile = serde_json::from_reader(reader)?;
    let result = score_once(grid, profile)?;
    print_result(&result, args.json)
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let grid = GridImporter::json_from_reader(SAMPLE_GRID.as_bytes())?;
    let wanted = if args.with_partner {
        PARTNERED_APPLICANT
    } else {
        SINGLE_APPLICANT
    };
    let profiles: Vec<ApplicantProfile> = serde_json::from_str(SAMPLE_PROFILES)?;
    let Some(profile) = profiles
        .into_iter()
        .find(|profile| profile.application_id.0 == wanted)
    else {
        return Err(EvaluationError::ProfileNotFound(ApplicationId(wanted.to_string())).into());
    };

    if !args.json {
        println!("Points grid demo");
        println!(
            "Applicant: {} ({}, age {})",
            profile.applicant_name, profile.applicant_marital_status, profile.applicant_age
        );
    }
    let result = score_once(grid, profile)?;
    print_result(&result, args.json)
}

/// Runs a single profile through the full evaluation pipeline with throwaway stores.
fn score_once(grid: GridDocument, profile: ApplicantProfile) -> Result<EvaluationResult, AppError> {
    let grid_name = grid.grid.name.clone();
    let application_id = profile.application_id.clone();

    let grids = InMemoryGridProvider::default();
    grids.insert(grid);
    let profiles = InMemoryProfileProvider::default();
    profiles.insert(profile);

    let orchestrator = EvaluationOrchestrator::new(
        Arc::new(grids),
        Arc::new(profiles),
        Arc::new(InMemoryResultStore::default()),
    );
    Ok(orchestrator.evaluate(&application_id, &grid_name)?)
}

fn print_result(result: &EvaluationResult, json: bool) -> Result<(), AppError> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        print!("{}", render_breakdown(result));
    }
    Ok(())
}

pub(crate) fn render_breakdown(result: &EvaluationResult) -> String {
    let mut out = String::new();
    let version = result.grid_version.as_deref().unwrap_or("unversioned");
    let _ = writeln!(out, "Evaluation {}", result.evaluation_id);
    let _ = writeln!(
        out,
        "Grid: {} ({})  Application: {}  Partner columns: {}",
        result.grid_name,
        version,
        result.application_id,
        if result.has_partner { "yes" } else { "no" }
    );
    let _ = writeln!(
        out,
        "Total score: {}/{}",
        result.total_score, result.max_total_points
    );

    for category in &result.categories {
        let _ = writeln!(
            out,
            "\n{}  {}/{}",
            category.name, category.user_score, category.max_possible_score
        );
        for subcategory in &category.subcategories {
            let _ = writeln!(
                out,
                "  {}  {}/{}",
                subcategory.name, subcategory.user_score, subcategory.max_possible_score
            );
            for field in &subcategory.fields {
                let marker = match (field.qualifies, field.suppressed) {
                    (true, false) => "[x]",
                    (true, true) => "[~]",
                    (false, _) => "[ ]",
                };
                let _ = writeln!(
                    out,
                    "    {} {}  +{}  {}",
                    marker, field.field_name, field.points_earned, field.actual_value
                );
            }
        }
    }

    if !result.notes.is_empty() {
        let _ = writeln!(out, "\n{}", result.notes);
    }
    out
}
