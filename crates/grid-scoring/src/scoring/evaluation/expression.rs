use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::super::attributes::{AttributeSet, AttributeValue};

/// Absolute tolerance for numeric equality.
const NUMERIC_TOLERANCE: f64 = 0.000_001;

/// Separator between clauses in a field's logic expression.
pub const CLAUSE_SEPARATOR: char = ';';

/// Comparison operators accepted in a clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    GreaterOrEqual,
    LessOrEqual,
    Equal,
    NotEqual,
    Greater,
    Less,
}

// Two-character symbols come first so `>=` is never read as `>`.
const OPERATORS: [ComparisonOperator; 6] = [
    ComparisonOperator::GreaterOrEqual,
    ComparisonOperator::LessOrEqual,
    ComparisonOperator::Equal,
    ComparisonOperator::NotEqual,
    ComparisonOperator::Greater,
    ComparisonOperator::Less,
];

impl ComparisonOperator {
    pub const fn symbol(self) -> &'static str {
        match self {
            ComparisonOperator::GreaterOrEqual => ">=",
            ComparisonOperator::LessOrEqual => "<=",
            ComparisonOperator::Equal => "==",
            ComparisonOperator::NotEqual => "!=",
            ComparisonOperator::Greater => ">",
            ComparisonOperator::Less => "<",
        }
    }

    pub const fn is_ordering(self) -> bool {
        !matches!(self, ComparisonOperator::Equal | ComparisonOperator::NotEqual)
    }

    fn compare_numbers(self, lhs: f64, rhs: f64) -> bool {
        match self {
            ComparisonOperator::GreaterOrEqual => lhs >= rhs,
            ComparisonOperator::LessOrEqual => lhs <= rhs,
            ComparisonOperator::Equal => (lhs - rhs).abs() < NUMERIC_TOLERANCE,
            ComparisonOperator::NotEqual => (lhs - rhs).abs() >= NUMERIC_TOLERANCE,
            ComparisonOperator::Greater => lhs > rhs,
            ComparisonOperator::Less => lhs < rhs,
        }
    }

    fn compare_text(self, lhs: &str, rhs: &str) -> Option<bool> {
        match self {
            ComparisonOperator::Equal => Some(lhs == rhs),
            ComparisonOperator::NotEqual => Some(lhs != rhs),
            _ => None,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Right-hand side of a clause. Numeric literals keep their source text for text fallbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    raw: String,
    number: Option<f64>,
}

impl Literal {
    fn parse(raw: &str) -> Self {
        let unquoted = raw
            .trim()
            .trim_matches(|c| c == '\'' || c == '"')
            .trim()
            .to_string();
        let number = unquoted
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite());
        Self {
            raw: unquoted,
            number,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn as_number(&self) -> Option<f64> {
        self.number
    }

    pub fn is_numeric(&self) -> bool {
        self.number.is_some()
    }

    fn normalized_text(&self) -> String {
        self.raw.to_lowercase()
    }
}

/// Grammar violations detected while parsing a clause.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClauseError {
    #[error("clause is empty")]
    Empty,
    #[error("no comparison operator in '{0}'")]
    MissingOperator(String),
    #[error("missing attribute name in '{0}'")]
    MissingAttribute(String),
    #[error("invalid attribute name '{0}'")]
    InvalidAttributeName(String),
    #[error("missing literal in '{0}'")]
    MissingLiteral(String),
    #[error("literal '{0}' contains a comparison operator")]
    MalformedLiteral(String),
    #[error("operator {operator} cannot order text literal '{literal}'")]
    OrderingOnText {
        operator: ComparisonOperator,
        literal: String,
    },
}

/// A single `<attribute><operator><literal>` test.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    attribute: String,
    operator: ComparisonOperator,
    literal: Literal,
}

impl Clause {
    pub fn parse(raw: &str) -> Result<Self, ClauseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ClauseError::Empty);
        }

        let (position, operator) = locate_operator(trimmed)
            .ok_or_else(|| ClauseError::MissingOperator(trimmed.to_string()))?;

        let attribute = trimmed[..position].trim();
        if attribute.is_empty() {
            return Err(ClauseError::MissingAttribute(trimmed.to_string()));
        }
        if !attribute
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ClauseError::InvalidAttributeName(attribute.to_string()));
        }

        let literal_source = trimmed[position + operator.symbol().len()..].trim();
        if !is_quoted(literal_source) && literal_source.contains(['<', '>', '=', '!']) {
            return Err(ClauseError::MalformedLiteral(literal_source.to_string()));
        }
        let literal = Literal::parse(literal_source);
        if literal.as_str().is_empty() {
            return Err(ClauseError::MissingLiteral(trimmed.to_string()));
        }
        if operator.is_ordering() && !literal.is_numeric() {
            return Err(ClauseError::OrderingOnText {
                operator,
                literal: literal.as_str().to_string(),
            });
        }

        Ok(Self {
            attribute: attribute.to_string(),
            operator,
            literal,
        })
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn operator(&self) -> ComparisonOperator {
        self.operator
    }

    pub fn literal(&self) -> &Literal {
        &self.literal
    }

    /// Evaluate against a snapshot. Missing attributes make the clause false.
    pub fn evaluate(&self, attrs: &AttributeSet) -> ClauseOutcome {
        let Some(observed) = attrs.get(&self.attribute) else {
            debug!(attribute = %self.attribute, clause = %self, "attribute unavailable");
            return ClauseOutcome {
                attribute: self.attribute.clone(),
                observed: None,
                holds: false,
                unordered: false,
            };
        };

        let (holds, unordered) = match self.compare(observed) {
            Some(holds) => (holds, false),
            None => (false, true),
        };

        ClauseOutcome {
            attribute: self.attribute.clone(),
            observed: Some(observed.clone()),
            holds,
            unordered,
        }
    }

    fn compare(&self, observed: &AttributeValue) -> Option<bool> {
        if let (Some(lhs), Some(rhs)) = (observed.as_number(), self.literal.as_number()) {
            return Some(self.operator.compare_numbers(lhs, rhs));
        }

        self.operator
            .compare_text(&observed.normalized_text(), &self.literal.normalized_text())
    }
}

impl FromStr for Clause {
    type Err = ClauseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Clause::parse(s)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.attribute,
            self.operator,
            self.literal.as_str()
        )
    }
}

/// Quoted literals may carry operator characters as plain text.
fn is_quoted(literal: &str) -> bool {
    ['\'', '"'].into_iter().any(|quote| {
        literal.len() >= 2 && literal.starts_with(quote) && literal.ends_with(quote)
    })
}

fn locate_operator(clause: &str) -> Option<(usize, ComparisonOperator)> {
    clause.char_indices().find_map(|(position, _)| {
        let rest = &clause[position..];
        OPERATORS
            .iter()
            .find(|operator| rest.starts_with(operator.symbol()))
            .map(|operator| (position, *operator))
    })
}

/// Result of one clause, kept for the audit trace.
#[derive(Debug, Clone, PartialEq)]
pub struct ClauseOutcome {
    pub attribute: String,
    pub observed: Option<AttributeValue>,
    pub holds: bool,
    unordered: bool,
}

impl ClauseOutcome {
    pub fn is_unavailable(&self) -> bool {
        self.observed.is_none()
    }

    pub fn trace(&self) -> String {
        match &self.observed {
            None => format!("{}=unavailable (false)", self.attribute),
            Some(value) if self.unordered => {
                format!("{}={} (false, not comparable)", self.attribute, value)
            }
            Some(value) => format!("{}={} ({})", self.attribute, value, self.holds),
        }
    }
}

/// Split a logic expression into clauses, skipping empty segments.
pub fn parse_expression(expression: &str) -> Result<Vec<Clause>, ClauseError> {
    expression
        .split(CLAUSE_SEPARATOR)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(Clause::parse)
        .collect()
}

/// Parse and evaluate a single clause, returning the truth value and its trace.
pub fn evaluate_clause(clause: &str, attrs: &AttributeSet) -> Result<(bool, String), ClauseError> {
    let outcome = Clause::parse(clause)?.evaluate(attrs);
    Ok((outcome.holds, outcome.trace()))
}
