//! Predicates evaluated against decoded property values.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Element, Value};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compare {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    /// Query value is a list; true if any element equals the property value.
    In,
}

impl Compare {
    pub fn evaluate(self, property: &Value, query: &Value) -> bool {
        match self {
            Compare::Equal => values_equal(property, query),
            Compare::NotEqual => !values_equal(property, query),
            Compare::GreaterThan => property.compare(query) == Some(Ordering::Greater),
            Compare::GreaterThanEqual => {
                matches!(property.compare(query), Some(Ordering::Greater | Ordering::Equal))
            }
            Compare::LessThan => property.compare(query) == Some(Ordering::Less),
            Compare::LessThanEqual => {
                matches!(property.compare(query), Some(Ordering::Less | Ordering::Equal))
            }
            Compare::In => match query {
                Value::List(items) => items.iter().any(|item| item == property),
                _ => false,
            },
        }
    }
}

/// Ordered types compare by ordering (so a `Date` equals any `DateTime` on
/// that day); everything else by structural equality.
fn values_equal(a: &Value, b: &Value) -> bool {
    match a.compare(b) {
        Some(ordering) => ordering == Ordering::Equal,
        None => a == b,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextPredicate {
    /// Case-insensitive substring.
    Contains,
}

impl TextPredicate {
    pub fn evaluate(self, property: &Value, query: &Value) -> bool {
        match (self, property.as_str(), query.as_str()) {
            (TextPredicate::Contains, Some(haystack), Some(needle)) => {
                haystack.to_lowercase().contains(&needle.to_lowercase())
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeoCompare {
    /// Point property inside a circle query value.
    Within,
}

impl GeoCompare {
    pub fn evaluate(self, property: &Value, query: &Value) -> bool {
        match (self, property, query) {
            (GeoCompare::Within, Value::GeoPoint(point), Value::GeoCircle(circle)) => circle.contains(point),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Predicate {
    Compare(Compare),
    Text(TextPredicate),
    Geo(GeoCompare),
}

impl Predicate {
    pub fn evaluate(self, property: &Value, query: &Value) -> bool {
        match self {
            Predicate::Compare(c) => c.evaluate(property, query),
            Predicate::Text(t) => t.evaluate(property, query),
            Predicate::Geo(g) => g.evaluate(property, query),
        }
    }
}

impl From<Compare> for Predicate {
    fn from(c: Compare) -> Self {
        Predicate::Compare(c)
    }
}

impl From<TextPredicate> for Predicate {
    fn from(t: TextPredicate) -> Self {
        Predicate::Text(t)
    }
}

impl From<GeoCompare> for Predicate {
    fn from(g: GeoCompare) -> Self {
        Predicate::Geo(g)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare(c) => write!(f, "{c:?}"),
            Predicate::Text(t) => write!(f, "{t:?}"),
            Predicate::Geo(g) => write!(f, "{g:?}"),
        }
    }
}

/// `name <predicate> value`.
#[derive(Debug, Clone, PartialEq)]
pub struct HasContainer {
    pub name: String,
    pub predicate: Predicate,
    pub value: Value,
}

impl HasContainer {
    pub fn new(name: impl Into<String>, predicate: impl Into<Predicate>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            predicate: predicate.into(),
            value: value.into(),
        }
    }

    /// True if any instance named `name` satisfies the predicate.
    /// An element without such a property never matches.
    pub fn is_match(&self, element: &Element) -> bool {
        element
            .property_values(&self.name)
            .any(|v| self.predicate.evaluate(v, &self.value))
    }
}

impl fmt::Display for HasContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.predicate, self.value)
    }
}
