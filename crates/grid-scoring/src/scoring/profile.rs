use std::fmt;

use serde::{Deserialize, Serialize};

use super::attributes::{AttributeKind, AttributeSchema, AttributeSet, AttributeValue};

/// Identifier wrapper for applications under evaluation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Marital statuses that make the partner point columns apply.
const PARTNERED_STATUSES: [&str; 2] = ["married", "common_law"];

/// Applicant record as captured by the intake forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub application_id: ApplicationId,
    pub applicant_name: String,
    pub applicant_age: u32,
    pub applicant_citizenship: String,
    pub applicant_residence: String,
    pub applicant_marital_status: String,
    pub applicant_education_level: String,
    #[serde(default)]
    pub education_completed_in_canada: Option<bool>,
    #[serde(default)]
    pub canadian_education_level: Option<String>,
    #[serde(default)]
    pub has_educational_credential_assessment: bool,
    pub primary_language: LanguageTest,
    #[serde(default)]
    pub secondary_language: Option<LanguageTest>,
    pub work: WorkExperience,
    #[serde(default)]
    pub job_offer: Option<JobOffer>,
    #[serde(default)]
    pub has_provincial_nomination: bool,
    pub province_of_interest: String,
    #[serde(default)]
    pub has_canadian_relatives: bool,
    #[serde(default)]
    pub received_invitation_to_apply: bool,
    pub settlement_funds_cad: u32,
    #[serde(default)]
    pub trades_certification: Option<bool>,
    #[serde(default)]
    pub partner: Option<PartnerProfile>,
}

impl ApplicantProfile {
    /// Married and common-law applicants are scored on the partner columns.
    pub fn has_partner(&self) -> bool {
        let status = self
            .applicant_marital_status
            .trim()
            .to_ascii_lowercase()
            .replace(['-', ' '], "_");
        PARTNERED_STATUSES.contains(&status.as_str())
    }
}

/// Language test results already expressed as CLB levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageTest {
    pub test_type: String,
    pub speaking: u8,
    pub listening: u8,
    pub reading: u8,
    pub writing: u8,
}

impl LanguageTest {
    /// Weakest ability, which most grids key their language points on.
    pub fn lowest(&self) -> u8 {
        self.speaking
            .min(self.listening)
            .min(self.reading)
            .min(self.writing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkExperience {
    pub canadian_years: u32,
    pub foreign_years: u32,
    #[serde(default)]
    pub noc_code_canadian: Option<u32>,
    #[serde(default)]
    pub canadian_teer_category: Option<u8>,
    #[serde(default)]
    pub working_in_canada: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOffer {
    #[serde(default)]
    pub lmia_approved: bool,
    #[serde(default)]
    pub wage_cad: Option<u32>,
    #[serde(default)]
    pub noc_code: Option<u32>,
    #[serde(default)]
    pub teer_category: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerProfile {
    #[serde(default)]
    pub education_level: Option<String>,
    #[serde(default)]
    pub language: Option<LanguageTest>,
    #[serde(default)]
    pub canadian_work_experience_years: Option<u32>,
}

type Accessor = fn(&ApplicantProfile) -> Option<AttributeValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributeScope {
    Applicant,
    Partner,
}

/// One registered attribute: its grid-facing name, kind, and typed reader.
#[derive(Clone)]
pub struct AttributeAccessor {
    name: &'static str,
    kind: AttributeKind,
    scope: AttributeScope,
    read: Accessor,
}

impl AttributeAccessor {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> AttributeKind {
        self.kind
    }
}

impl fmt::Debug for AttributeAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeAccessor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Fixed mapping from attribute names to profile readers.
///
/// Grids are validated against [`AttributeRegistry::schema`] when they are loaded, so a clause
/// can only name attributes this registry knows how to produce.
#[derive(Debug, Clone)]
pub struct AttributeRegistry {
    accessors: Vec<AttributeAccessor>,
    schema: AttributeSchema,
}

impl AttributeRegistry {
    pub fn standard() -> Self {
        let accessors = standard_accessors();
        let schema = accessors
            .iter()
            .map(|accessor| (accessor.name, accessor.kind))
            .collect();
        Self { accessors, schema }
    }

    pub fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    pub fn accessors(&self) -> &[AttributeAccessor] {
        &self.accessors
    }

    /// Capture the attribute snapshot for a single evaluation run.
    pub fn snapshot(&self, profile: &ApplicantProfile) -> AttributeSet {
        let has_partner = profile.has_partner();
        let mut set = AttributeSet::new(has_partner);

        for accessor in &self.accessors {
            if accessor.scope == AttributeScope::Partner && !has_partner {
                continue;
            }
            if let Some(value) = (accessor.read)(profile) {
                debug_assert_eq!(value.kind(), accessor.kind, "{}", accessor.name);
                set.insert(accessor.name, value);
            }
        }

        set
    }
}

impl Default for AttributeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn applicant(name: &'static str, kind: AttributeKind, read: Accessor) -> AttributeAccessor {
    AttributeAccessor {
        name,
        kind,
        scope: AttributeScope::Applicant,
        read,
    }
}

fn partner(name: &'static str, kind: AttributeKind, read: Accessor) -> AttributeAccessor {
    AttributeAccessor {
        name,
        kind,
        scope: AttributeScope::Partner,
        read,
    }
}

fn number(value: impl Into<f64>) -> Option<AttributeValue> {
    Some(AttributeValue::Number(value.into()))
}

fn flag(value: bool) -> Option<AttributeValue> {
    Some(AttributeValue::Boolean(value))
}

fn text(value: &str) -> Option<AttributeValue> {
    Some(AttributeValue::Text(value.to_string()))
}

fn category(value: &str) -> Option<AttributeValue> {
    Some(AttributeValue::Category(value.to_string()))
}

fn standard_accessors() -> Vec<AttributeAccessor> {
    use AttributeKind::{Boolean, Category, Number, Text};

    vec![
        applicant("applicant_age", Number, |p| number(p.applicant_age)),
        applicant("applicant_citizenship", Text, |p| {
            text(&p.applicant_citizenship)
        }),
        applicant("applicant_residence", Text, |p| text(&p.applicant_residence)),
        applicant("applicant_marital_status", Category, |p| {
            category(&p.applicant_marital_status)
        }),
        applicant("applicant_education_level", Category, |p| {
            category(&p.applicant_education_level)
        }),
        applicant("education_completed_in_canada", Boolean, |p| {
            p.education_completed_in_canada.and_then(flag)
        }),
        applicant("canadian_education_level", Category, |p| {
            p.canadian_education_level.as_deref().and_then(category)
        }),
        applicant("has_educational_credential_assessment", Boolean, |p| {
            flag(p.has_educational_credential_assessment)
        }),
        applicant("primary_language_test_type", Category, |p| {
            category(&p.primary_language.test_type)
        }),
        applicant("primary_clb_speaking", Number, |p| {
            number(p.primary_language.speaking)
        }),
        applicant("primary_clb_listening", Number, |p| {
            number(p.primary_language.listening)
        }),
        applicant("primary_clb_reading", Number, |p| {
            number(p.primary_language.reading)
        }),
        applicant("primary_clb_writing", Number, |p| {
            number(p.primary_language.writing)
        }),
        applicant("primary_clb_score", Number, |p| {
            number(p.primary_language.lowest())
        }),
        applicant("took_secondary_language_test", Boolean, |p| {
            flag(p.secondary_language.is_some())
        }),
        applicant("secondary_language_test_type", Category, |p| {
            p.secondary_language
                .as_ref()
                .and_then(|test| category(&test.test_type))
        }),
        applicant("secondary_clb_speaking", Number, |p| {
            p.secondary_language
                .as_ref()
                .and_then(|test| number(test.speaking))
        }),
        applicant("secondary_clb_listening", Number, |p| {
            p.secondary_language
                .as_ref()
                .and_then(|test| number(test.listening))
        }),
        applicant("secondary_clb_reading", Number, |p| {
            p.secondary_language
                .as_ref()
                .and_then(|test| number(test.reading))
        }),
        applicant("secondary_clb_writing", Number, |p| {
            p.secondary_language
                .as_ref()
                .and_then(|test| number(test.writing))
        }),
        applicant("secondary_clb_score", Number, |p| {
            p.secondary_language
                .as_ref()
                .and_then(|test| number(test.lowest()))
        }),
        applicant("canadian_work_experience_years", Number, |p| {
            number(p.work.canadian_years)
        }),
        applicant("foreign_work_experience_years", Number, |p| {
            number(p.work.foreign_years)
        }),
        applicant("noc_code_canadian", Number, |p| {
            p.work.noc_code_canadian.and_then(number)
        }),
        applicant("canadian_occupation_teer_category", Number, |p| {
            p.work.canadian_teer_category.and_then(number)
        }),
        applicant("working_in_canada", Boolean, |p| flag(p.work.working_in_canada)),
        applicant("has_provincial_nomination", Boolean, |p| {
            flag(p.has_provincial_nomination)
        }),
        applicant("province_of_interest", Text, |p| {
            text(&p.province_of_interest)
        }),
        applicant("has_canadian_relatives", Boolean, |p| {
            flag(p.has_canadian_relatives)
        }),
        applicant("received_invitation_to_apply", Boolean, |p| {
            flag(p.received_invitation_to_apply)
        }),
        applicant("settlement_funds_cad", Number, |p| {
            number(p.settlement_funds_cad)
        }),
        applicant("has_job_offer", Boolean, |p| flag(p.job_offer.is_some())),
        applicant("is_job_offer_lmia_approved", Boolean, |p| {
            p.job_offer.as_ref().and_then(|offer| flag(offer.lmia_approved))
        }),
        applicant("job_offer_wage_cad", Number, |p| {
            p.job_offer.as_ref().and_then(|offer| offer.wage_cad.and_then(number))
        }),
        applicant("job_offer_noc_code", Number, |p| {
            p.job_offer.as_ref().and_then(|offer| offer.noc_code.and_then(number))
        }),
        applicant("job_offer_teer_category", Number, |p| {
            p.job_offer
                .as_ref()
                .and_then(|offer| offer.teer_category.and_then(number))
        }),
        applicant("trades_certification", Boolean, |p| {
            p.trades_certification.and_then(flag)
        }),
        partner("partner_education_level", Category, |p| {
            p.partner
                .as_ref()
                .and_then(|partner| partner.education_level.as_deref().and_then(category))
        }),
        partner("partner_language_test_type", Category, |p| {
            partner_language(p).and_then(|test| category(&test.test_type))
        }),
        partner("partner_clb_speaking", Number, |p| {
            partner_language(p).and_then(|test| number(test.speaking))
        }),
        partner("partner_clb_listening", Number, |p| {
            partner_language(p).and_then(|test| number(test.listening))
        }),
        partner("partner_clb_reading", Number, |p| {
            partner_language(p).and_then(|test| number(test.reading))
        }),
        partner("partner_clb_writing", Number, |p| {
            partner_language(p).and_then(|test| number(test.writing))
        }),
        partner("partner_clb_score", Number, |p| {
            partner_language(p).and_then(|test| number(test.lowest()))
        }),
        partner("partner_canadian_work_experience_years", Number, |p| {
            p.partner
                .as_ref()
                .and_then(|partner| partner.canadian_work_experience_years.and_then(number))
        }),
    ]
}

fn partner_language(profile: &ApplicantProfile) -> Option<&LanguageTest> {
    profile
        .partner
        .as_ref()
        .and_then(|partner| partner.language.as_ref())
}
