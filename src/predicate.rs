//! Filter predicates for fetches and bulk deletes.

use crate::error::{Result, StoreError};
use crate::schema::EntityDescription;
use crate::types::{AttributeMap, Value};
use std::cmp::Ordering;

/// A filter expression evaluated against an object's attributes.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Equals(String, Value),
    NotEquals(String, Value),
    LessThan(String, Value),
    LessOrEqual(String, Value),
    GreaterThan(String, Value),
    GreaterOrEqual(String, Value),
    /// Attribute holds no value.
    IsNull(String),
    /// String attribute contains the given substring.
    Contains(String, String),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Equals(key.into(), value.into())
    }

    pub fn ne(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::NotEquals(key.into(), value.into())
    }

    pub fn lt(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::LessThan(key.into(), value.into())
    }

    pub fn le(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::LessOrEqual(key.into(), value.into())
    }

    pub fn gt(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::GreaterThan(key.into(), value.into())
    }

    pub fn ge(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::GreaterOrEqual(key.into(), value.into())
    }

    pub fn is_null(key: impl Into<String>) -> Self {
        Predicate::IsNull(key.into())
    }

    pub fn contains(key: impl Into<String>, needle: impl Into<String>) -> Self {
        Predicate::Contains(key.into(), needle.into())
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut parts) => {
                parts.push(other);
                Predicate::And(parts)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut parts) => {
                parts.push(other);
                Predicate::Or(parts)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Check that every referenced attribute is declared on `entity`.
    pub fn validate(&self, entity: &EntityDescription) -> Result<()> {
        match self {
            Predicate::Equals(key, _)
            | Predicate::NotEquals(key, _)
            | Predicate::LessThan(key, _)
            | Predicate::LessOrEqual(key, _)
            | Predicate::GreaterThan(key, _)
            | Predicate::GreaterOrEqual(key, _)
            | Predicate::IsNull(key)
            | Predicate::Contains(key, _) => {
                if entity.attribute_named(key).is_none() {
                    return Err(StoreError::InvalidPredicate {
                        entity: entity.name.clone(),
                        reason: format!("no attribute named '{}'", key),
                    });
                }
                Ok(())
            }
            Predicate::And(parts) | Predicate::Or(parts) => {
                parts.iter().try_for_each(|p| p.validate(entity))
            }
            Predicate::Not(inner) => inner.validate(entity),
        }
    }

    /// Evaluate against a set of attribute values.
    ///
    /// Ordering comparisons only hold between two numbers or two strings;
    /// anything else (including null) does not match.
    pub fn evaluate(&self, attributes: &AttributeMap) -> bool {
        let lookup = |key: &str| attributes.get(key).unwrap_or(&Value::Null);

        match self {
            Predicate::Equals(key, value) => values_equal(lookup(key), value),
            Predicate::NotEquals(key, value) => !values_equal(lookup(key), value),
            Predicate::LessThan(key, value) => {
                compare(lookup(key), value) == Some(Ordering::Less)
            }
            Predicate::LessOrEqual(key, value) => matches!(
                compare(lookup(key), value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Predicate::GreaterThan(key, value) => {
                compare(lookup(key), value) == Some(Ordering::Greater)
            }
            Predicate::GreaterOrEqual(key, value) => matches!(
                compare(lookup(key), value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Predicate::IsNull(key) => lookup(key).is_null(),
            Predicate::Contains(key, needle) => lookup(key)
                .as_str()
                .map(|s| s.contains(needle.as_str()))
                .unwrap_or(false),
            Predicate::And(parts) => parts.iter().all(|p| p.evaluate(attributes)),
            Predicate::Or(parts) => parts.iter().any(|p| p.evaluate(attributes)),
            Predicate::Not(inner) => !inner.evaluate(attributes),
        }
    }
}

/// Numbers compare by value so that `1` equals `1.0`.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if a.is_number() && b.is_number() => x == y,
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
