use std::cmp::Reverse;

use tracing::debug;

use super::super::result::FieldResult;

/// Keep only the best qualifying exclusive field of one subcategory.
///
/// The winner has the most points, then the lowest `sort_order`, then the earliest position.
/// Losing qualifiers keep `qualifies` and their trace but earn nothing and are marked
/// `suppressed`. Non-exclusive fields pass through untouched.
pub fn resolve_exclusivity(mut fields: Vec<FieldResult>) -> Vec<FieldResult> {
    let winner = fields
        .iter()
        .enumerate()
        .filter(|(_, field)| field.mutually_exclusive && field.qualifies)
        .min_by_key(|(index, field)| (Reverse(field.points_earned), field.sort_order, *index))
        .map(|(index, _)| index);

    let Some(winner) = winner else {
        return fields;
    };

    for (index, field) in fields.iter_mut().enumerate() {
        if index == winner || !field.mutually_exclusive || !field.qualifies {
            continue;
        }
        debug!(
            field = %field.field_id,
            forfeited = field.points_earned,
            "exclusive field suppressed"
        );
        field.points_earned = 0;
        field.suppressed = true;
    }

    fields
}
