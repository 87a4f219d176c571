use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Value kinds an applicant attribute may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Number,
    Boolean,
    Text,
    Category,
}

impl AttributeKind {
    pub const fn label(self) -> &'static str {
        match self {
            AttributeKind::Number => "number",
            AttributeKind::Boolean => "boolean",
            AttributeKind::Text => "text",
            AttributeKind::Category => "category",
        }
    }

    /// Only numeric attributes accept `<`, `<=`, `>` and `>=`.
    pub const fn supports_ordering(self) -> bool {
        matches!(self, AttributeKind::Number)
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Typed attribute value captured in an applicant snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Number(f64),
    Boolean(bool),
    Text(String),
    Category(String),
}

impl AttributeValue {
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::Number(_) => AttributeKind::Number,
            AttributeValue::Boolean(_) => AttributeKind::Boolean,
            AttributeValue::Text(_) => AttributeKind::Text,
            AttributeValue::Category(_) => AttributeKind::Category,
        }
    }

    /// Numeric view of the value. Text that parses as a finite number counts.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(value) => Some(*value),
            AttributeValue::Text(raw) | AttributeValue::Category(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite()),
            AttributeValue::Boolean(_) => None,
        }
    }

    /// Trimmed, lower-cased rendering used for text equality.
    pub fn normalized_text(&self) -> String {
        self.to_string().trim().to_lowercase()
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Number(value) => write!(f, "{value}"),
            AttributeValue::Boolean(value) => write!(f, "{value}"),
            AttributeValue::Text(value) | AttributeValue::Category(value) => f.write_str(value),
        }
    }
}

/// Names and kinds of every attribute a grid may reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSchema {
    kinds: BTreeMap<String, AttributeKind>,
}

impl AttributeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, kind: AttributeKind) -> Self {
        self.insert(name, kind);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, kind: AttributeKind) {
        self.kinds.insert(name.into(), kind);
    }

    pub fn kind_of(&self, name: &str) -> Option<AttributeKind> {
        self.kinds.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, AttributeKind)> for AttributeSchema {
    fn from_iter<I: IntoIterator<Item = (S, AttributeKind)>>(iter: I) -> Self {
        let mut schema = AttributeSchema::new();
        for (name, kind) in iter {
            schema.insert(name, kind);
        }
        schema
    }
}

/// Immutable applicant snapshot consumed by a single evaluation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeSet {
    has_partner: bool,
    values: BTreeMap<String, AttributeValue>,
}

impl AttributeSet {
    pub fn new(has_partner: bool) -> Self {
        Self {
            has_partner,
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.insert(name, value);
        self
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, value: AttributeValue) {
        self.values.insert(name.into(), value);
    }

    pub fn has_partner(&self) -> bool {
        self.has_partner
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
