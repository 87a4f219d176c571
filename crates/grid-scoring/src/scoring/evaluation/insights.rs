use super::super::result::{CappingEvent, CategoryResult};

const TOP_FACTOR_LIMIT: usize = 3;

/// Render the audit notes attached to a result: capping applied and top scoring categories.
pub fn summary_notes(categories: &[CategoryResult], events: &[CappingEvent]) -> String {
    let mut sections = Vec::new();

    if !events.is_empty() {
        let mut section = String::from("CAPPING APPLIED:");
        for event in events {
            section.push_str("\n- ");
            section.push_str(&event.describe());
            if event.integrity_warning {
                section.push_str(" (integrity warning)");
            }
        }
        sections.push(section);
    }

    let mut scoring: Vec<&CategoryResult> = categories
        .iter()
        .filter(|category| category.user_score > 0)
        .collect();
    // Stable sort keeps grid order among equal scores.
    scoring.sort_by(|a, b| b.user_score.cmp(&a.user_score));

    if !scoring.is_empty() {
        let mut section = String::from("TOP SCORING FACTORS:");
        for category in scoring.into_iter().take(TOP_FACTOR_LIMIT) {
            section.push_str(&format!(
                "\n- {}: {}/{}",
                category.name, category.user_score, category.max_possible_score
            ));
        }
        sections.push(section);
    }

    sections.join("\n\n")
}
