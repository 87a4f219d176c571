use super::super::attributes::AttributeSet;
use super::super::grid::{CompiledField, LogicOperator};
use super::super::result::FieldResult;
use super::expression::ClauseOutcome;

const TRACE_SEPARATOR: &str = "; ";

/// Combine a field's clauses and select the spouse-aware award.
pub fn evaluate_field(field: &CompiledField, attrs: &AttributeSet) -> FieldResult {
    let outcomes: Vec<ClauseOutcome> = field
        .clauses
        .iter()
        .map(|clause| clause.evaluate(attrs))
        .collect();

    let qualifies = match field.operator {
        LogicOperator::None => true,
        LogicOperator::And => outcomes.iter().all(|outcome| outcome.holds),
        LogicOperator::Or => outcomes.iter().any(|outcome| outcome.holds),
    };

    let points_earned = if qualifies {
        field.record.points(attrs.has_partner())
    } else {
        0
    };

    let actual_value = outcomes
        .iter()
        .map(ClauseOutcome::trace)
        .collect::<Vec<_>>()
        .join(TRACE_SEPARATOR);

    FieldResult {
        field_id: field.record.id.clone(),
        field_name: field.record.name.clone(),
        sort_order: field.record.sort_order,
        logic_expression: field.record.logic_expression.clone(),
        mutually_exclusive: field.record.mutually_exclusive,
        qualifies,
        points_earned,
        suppressed: false,
        actual_value,
    }
}
