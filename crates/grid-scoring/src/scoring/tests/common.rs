use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::scoring::attributes::{AttributeSchema, AttributeSet, AttributeValue};
use crate::scoring::grid::{
    CategoryId, CategoryRecord, FieldId, FieldRecord, GridDefinition, GridDocument, GridHeader,
    SubcategoryId, SubcategoryRecord,
};
use crate::scoring::profile::{
    ApplicantProfile, ApplicationId, AttributeRegistry, JobOffer, LanguageTest, PartnerProfile,
    WorkExperience,
};
use crate::scoring::repository::{
    AttributeSetProvider, GridDefinitionProvider, ProviderError, ResultStore, StoreError,
};
use crate::scoring::result::{EvaluationId, EvaluationResult};
use crate::scoring::service::EvaluationOrchestrator;

pub(super) const GRID_NAME: &str = "mini-crs";

pub(super) fn schema() -> AttributeSchema {
    AttributeRegistry::standard().schema().clone()
}

pub(super) fn attrs(age: u32, has_partner: bool) -> AttributeSet {
    AttributeSet::new(has_partner).with("applicant_age", AttributeValue::Number(f64::from(age)))
}

pub(super) fn field(
    id: &str,
    subcategory: &str,
    sort_order: i32,
    expression: &str,
    operator: &str,
    with_partner: u32,
    without_partner: u32,
) -> FieldRecord {
    FieldRecord {
        id: FieldId::from(id),
        subcategory_id: SubcategoryId::from(subcategory),
        name: id.replace('-', " "),
        sort_order,
        logic_expression: expression.to_string(),
        logic_operator: operator.to_string(),
        points_with_partner: with_partner,
        points_without_partner: without_partner,
        mutually_exclusive: false,
    }
}

pub(super) fn exclusive(mut record: FieldRecord) -> FieldRecord {
    record.mutually_exclusive = true;
    record
}

pub(super) fn category(id: &str, sort_order: i32, with_partner: u32, without: u32) -> CategoryRecord {
    CategoryRecord {
        id: CategoryId::from(id),
        name: id.to_string(),
        sort_order,
        max_points_with_partner: with_partner,
        max_points_no_partner: without,
    }
}

pub(super) fn subcategory(
    id: &str,
    category: &str,
    sort_order: i32,
    with_partner: u32,
    without: u32,
) -> SubcategoryRecord {
    SubcategoryRecord {
        id: SubcategoryId::from(id),
        category_id: CategoryId::from(category),
        name: id.to_string(),
        sort_order,
        max_points_with_partner: with_partner,
        max_points_no_partner: without,
    }
}

/// One category, one subcategory wrapping the given fields.
pub(super) fn single_subcategory_grid(max_points: u32, fields: Vec<FieldRecord>) -> GridDefinition {
    let document = GridDocument {
        grid: GridHeader {
            name: "single".to_string(),
            version: None,
            effective_date: None,
            max_total_points: 1200,
        },
        categories: vec![category("core", 1, 500, 500)],
        subcategories: vec![subcategory("age", "core", 1, max_points, max_points)],
        fields,
    };
    GridDefinition::compile(document, &schema()).expect("test grid compiles")
}

pub(super) fn age_field(with_partner: u32, without_partner: u32) -> FieldRecord {
    field(
        "age-20-29",
        "age",
        1,
        "applicant_age>=20;applicant_age<=29",
        "AND",
        with_partner,
        without_partner,
    )
}

/// Small grid covering every operator, exclusivity, and all three capping levels.
pub(super) fn mini_crs_document() -> GridDocument {
    GridDocument {
        grid: GridHeader {
            name: GRID_NAME.to_string(),
            version: Some("2024.1".to_string()),
            effective_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1),
            max_total_points: 100,
        },
        categories: vec![
            category("additional", 2, 60, 60),
            category("core", 1, 60, 80),
        ],
        subcategories: vec![
            subcategory("age", "core", 1, 20, 25),
            subcategory("language", "core", 2, 30, 35),
            subcategory("education", "core", 3, 30, 30),
            subcategory("job-offer", "additional", 1, 50, 50),
            subcategory("nomination", "additional", 2, 60, 60),
        ],
        fields: vec![
            field(
                "age-20-29",
                "age",
                1,
                "applicant_age>=20;applicant_age<=29",
                "AND",
                20,
                25,
            ),
            field(
                "age-30-plus",
                "age",
                2,
                "applicant_age>=30",
                "AND",
                10,
                12,
            ),
            exclusive(field(
                "clb-9",
                "language",
                1,
                "primary_clb_score>=9",
                "AND",
                28,
                32,
            )),
            exclusive(field(
                "clb-7",
                "language",
                2,
                "primary_clb_score>=7",
                "AND",
                20,
                24,
            )),
            field(
                "second-language",
                "language",
                3,
                "took_secondary_language_test==true",
                "AND",
                4,
                6,
            ),
            field(
                "post-secondary",
                "education",
                1,
                "applicant_education_level==master;applicant_education_level==phd",
                "OR",
                25,
                30,
            ),
            field(
                "canadian-study",
                "education",
                2,
                "education_completed_in_canada==true",
                "AND",
                15,
                15,
            ),
            field(
                "job-offer",
                "job-offer",
                1,
                "has_job_offer==true;is_job_offer_lmia_approved==true",
                "AND",
                50,
                50,
            ),
            field("nomination", "nomination", 1, "has_provincial_nomination==true", "AND", 60, 60),
            field("registration", "nomination", 2, "", "NONE", 0, 0),
        ],
    }
}

pub(super) fn applicant(application_id: &str, marital_status: &str) -> ApplicantProfile {
    ApplicantProfile {
        application_id: ApplicationId(application_id.to_string()),
        applicant_name: "Priya Raman".to_string(),
        applicant_age: 27,
        applicant_citizenship: "India".to_string(),
        applicant_residence: "Canada".to_string(),
        applicant_marital_status: marital_status.to_string(),
        applicant_education_level: "Master".to_string(),
        education_completed_in_canada: Some(true),
        canadian_education_level: Some("master".to_string()),
        has_educational_credential_assessment: true,
        primary_language: LanguageTest {
            test_type: "IELTS".to_string(),
            speaking: 9,
            listening: 10,
            reading: 9,
            writing: 9,
        },
        secondary_language: None,
        work: WorkExperience {
            canadian_years: 2,
            foreign_years: 3,
            noc_code_canadian: Some(21231),
            canadian_teer_category: Some(1),
            working_in_canada: true,
        },
        job_offer: Some(JobOffer {
            lmia_approved: true,
            wage_cad: Some(98000),
            noc_code: Some(21231),
            teer_category: Some(1),
        }),
        has_provincial_nomination: false,
        province_of_interest: "Ontario".to_string(),
        has_canadian_relatives: false,
        received_invitation_to_apply: false,
        settlement_funds_cad: 22000,
        trades_certification: None,
        partner: Some(PartnerProfile {
            education_level: Some("bachelor".to_string()),
            language: None,
            canadian_work_experience_years: Some(1),
        }),
    }
}

#[derive(Default)]
pub(super) struct MemoryGrids {
    documents: Mutex<HashMap<String, GridDocument>>,
    lookups: AtomicUsize,
}

impl MemoryGrids {
    pub(super) fn with(document: GridDocument) -> Self {
        let grids = Self::default();
        grids
            .documents
            .lock()
            .expect("grid mutex poisoned")
            .insert(document.grid.name.clone(), document);
        grids
    }

    pub(super) fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl GridDefinitionProvider for MemoryGrids {
    fn get_grid(&self, grid_name: &str) -> Result<GridDocument, ProviderError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.documents
            .lock()
            .expect("grid mutex poisoned")
            .get(grid_name)
            .cloned()
            .ok_or(ProviderError::NotFound)
    }
}

pub(super) struct MemoryApplicants {
    registry: AttributeRegistry,
    profiles: Mutex<HashMap<ApplicationId, ApplicantProfile>>,
}

impl MemoryApplicants {
    pub(super) fn with(profiles: Vec<ApplicantProfile>) -> Self {
        let profiles = profiles
            .into_iter()
            .map(|profile| (profile.application_id.clone(), profile))
            .collect();
        Self {
            registry: AttributeRegistry::standard(),
            profiles: Mutex::new(profiles),
        }
    }
}

impl AttributeSetProvider for MemoryApplicants {
    fn schema(&self) -> &AttributeSchema {
        self.registry.schema()
    }

    fn get_attributes(&self, application_id: &ApplicationId) -> Result<AttributeSet, ProviderError> {
        self.profiles
            .lock()
            .expect("profile mutex poisoned")
            .get(application_id)
            .map(|profile| self.registry.snapshot(profile))
            .ok_or(ProviderError::NotFound)
    }
}

pub(super) struct OfflineApplicants {
    registry: AttributeRegistry,
}

impl Default for OfflineApplicants {
    fn default() -> Self {
        Self {
            registry: AttributeRegistry::standard(),
        }
    }
}

impl AttributeSetProvider for OfflineApplicants {
    fn schema(&self) -> &AttributeSchema {
        self.registry.schema()
    }

    fn get_attributes(&self, _application_id: &ApplicationId) -> Result<AttributeSet, ProviderError> {
        Err(ProviderError::Unavailable("profile service offline".to_string()))
    }
}

/// Result store that fails the first `failures` saves as unavailable and the first
/// `conflicts` saves as conflicting.
#[derive(Default)]
pub(super) struct MemoryResults {
    results: Mutex<Vec<EvaluationResult>>,
    failures: AtomicUsize,
    conflicts: AtomicUsize,
    attempts: AtomicUsize,
}

impl MemoryResults {
    pub(super) fn failing(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            ..Self::default()
        }
    }

    pub(super) fn conflicting(conflicts: usize) -> Self {
        Self {
            conflicts: AtomicUsize::new(conflicts),
            ..Self::default()
        }
    }

    pub(super) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(super) fn stored(&self) -> Vec<EvaluationResult> {
        self.results.lock().expect("result mutex poisoned").clone()
    }
}

impl ResultStore for MemoryResults {
    fn save(&self, result: &EvaluationResult) -> Result<EvaluationId, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("disk full".to_string()));
        }
        let remaining = self.conflicts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.conflicts.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Conflict);
        }

        let mut results = self.results.lock().expect("result mutex poisoned");
        if results
            .iter()
            .any(|stored| stored.evaluation_id == result.evaluation_id)
        {
            return Err(StoreError::Conflict);
        }
        results.push(result.clone());
        Ok(result.evaluation_id.clone())
    }

    fn fetch(&self, id: &EvaluationId) -> Result<Option<EvaluationResult>, StoreError> {
        Ok(self
            .results
            .lock()
            .expect("result mutex poisoned")
            .iter()
            .find(|result| &result.evaluation_id == id)
            .cloned())
    }

    fn for_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<EvaluationResult>, StoreError> {
        Ok(self
            .results
            .lock()
            .expect("result mutex poisoned")
            .iter()
            .rev()
            .filter(|result| &result.application_id == application_id)
            .cloned()
            .collect())
    }
}

pub(super) type MemoryOrchestrator = EvaluationOrchestrator<MemoryGrids, MemoryApplicants, MemoryResults>;

pub(super) fn build_orchestrator(
    results: MemoryResults,
) -> (MemoryOrchestrator, Arc<MemoryGrids>, Arc<MemoryResults>) {
    let grids = Arc::new(MemoryGrids::with(mini_crs_document()));
    let applicants = Arc::new(MemoryApplicants::with(vec![
        applicant("app-single", "single"),
        applicant("app-married", "Married"),
    ]));
    let results = Arc::new(results);
    let orchestrator =
        EvaluationOrchestrator::new(Arc::clone(&grids), applicants, Arc::clone(&results));
    (orchestrator, grids, results)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 64)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
