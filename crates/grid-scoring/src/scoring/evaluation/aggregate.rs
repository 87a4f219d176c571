use tracing::{debug, warn};

use super::super::grid::{CategoryRecord, GridHeader, SubcategoryRecord};
use super::super::result::{
    CapLevel, CappingEvent, CategoryResult, FieldResult, SubcategoryResult,
};

/// Sum resolved field points and cap at the subcategory maximum.
pub fn aggregate_subcategory(
    record: &SubcategoryRecord,
    fields: Vec<FieldResult>,
    has_partner: bool,
    events: &mut Vec<CappingEvent>,
) -> SubcategoryResult {
    let raw = saturating_sum(fields.iter().map(|field| field.points_earned));
    let max_possible_score = record.max_points(has_partner);
    let user_score = apply_cap(
        CapLevel::Subcategory,
        &record.name,
        raw,
        max_possible_score,
        events,
    );

    SubcategoryResult {
        subcategory_id: record.id.clone(),
        name: record.name.clone(),
        sort_order: record.sort_order,
        user_score,
        max_possible_score,
        field_count: fields.len(),
        fields,
    }
}

/// Sum subcategory scores and cap at the category maximum.
pub fn aggregate_category(
    record: &CategoryRecord,
    subcategories: Vec<SubcategoryResult>,
    has_partner: bool,
    events: &mut Vec<CappingEvent>,
) -> CategoryResult {
    let raw = saturating_sum(subcategories.iter().map(|subcategory| subcategory.user_score));
    let max_possible_score = record.max_points(has_partner);
    let field_count = subcategories
        .iter()
        .map(|subcategory| subcategory.field_count)
        .sum();
    let user_score = apply_cap(
        CapLevel::Category,
        &record.name,
        raw,
        max_possible_score,
        events,
    );

    CategoryResult {
        category_id: record.id.clone(),
        name: record.name.clone(),
        sort_order: record.sort_order,
        user_score,
        max_possible_score,
        field_count,
        subcategory_count: subcategories.len(),
        subcategories,
    }
}

/// Sum category scores and cap at the grid maximum.
pub fn compute_total(
    header: &GridHeader,
    categories: &[CategoryResult],
    events: &mut Vec<CappingEvent>,
) -> u32 {
    let raw = saturating_sum(categories.iter().map(|category| category.user_score));
    apply_cap(
        CapLevel::Grid,
        &header.name,
        raw,
        header.max_total_points,
        events,
    )
}

fn saturating_sum(points: impl Iterator<Item = u32>) -> u32 {
    points.fold(0u32, u32::saturating_add)
}

fn apply_cap(
    level: CapLevel,
    name: &str,
    raw: u32,
    maximum: u32,
    events: &mut Vec<CappingEvent>,
) -> u32 {
    if raw <= maximum {
        return raw;
    }

    // Subcategory caps are ordinary grid semantics; anything above that means the
    // authored maxima do not add up.
    let integrity_warning = level != CapLevel::Subcategory;
    if integrity_warning {
        warn!(
            level = level.label(),
            record = name,
            raw,
            maximum,
            "score exceeds stated maximum; grid maxima are inconsistent"
        );
    } else {
        debug!(level = level.label(), record = name, raw, maximum, "score capped");
    }

    events.push(CappingEvent {
        level,
        name: name.to_string(),
        raw_score: raw,
        capped_score: maximum,
        integrity_warning,
    });
    maximum
}
