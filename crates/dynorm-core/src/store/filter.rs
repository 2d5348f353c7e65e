//! Field predicates for query and scan.
//!
//! A predicate is a `(field, condition)` pair; a request is the conjunction
//! of its predicates. Predicates are usually written as `field__op` strings,
//! e.g. `("city__eq", "C1")` or `("visits__between", [1, 5])`.

use std::cmp::Ordering;

use serde_json::Value;

use crate::error::QueryError;
use crate::types::Item;

/// Comparison applied to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Gt(Value),
    Ge(Value),
    Lt(Value),
    Le(Value),
    /// Inclusive on both ends.
    Between(Value, Value),
}

impl Condition {
    /// Build a condition from its operator name.
    pub fn from_op(op: &str, value: Value) -> Result<Self, QueryError> {
        Ok(match op {
            "eq" => Condition::Eq(value),
            "gt" => Condition::Gt(value),
            "gte" => Condition::Ge(value),
            "lt" => Condition::Lt(value),
            "lte" => Condition::Le(value),
            "between" => match value {
                Value::Array(mut bounds) if bounds.len() == 2 => {
                    let high = bounds.pop().unwrap_or(Value::Null);
                    let low = bounds.pop().unwrap_or(Value::Null);
                    Condition::Between(low, high)
                }
                other => {
                    return Err(QueryError::MalformedConstraint(format!(
                        "between expects [low, high], got {other}"
                    )));
                }
            },
            other => return Err(QueryError::UnsupportedOperator(other.to_string())),
        })
    }

    pub fn op_name(&self) -> &'static str {
        match self {
            Condition::Eq(_) => "eq",
            Condition::Gt(_) => "gt",
            Condition::Ge(_) => "gte",
            Condition::Lt(_) => "lt",
            Condition::Le(_) => "lte",
            Condition::Between(..) => "between",
        }
    }

    pub fn is_eq(&self) -> bool {
        matches!(self, Condition::Eq(_))
    }

    /// Evaluate against a field value.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Condition::Eq(target) => {
                value == target || compare_values(value, target) == Some(Ordering::Equal)
            }
            Condition::Gt(target) => compare_values(value, target) == Some(Ordering::Greater),
            Condition::Ge(target) => matches!(
                compare_values(value, target),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Condition::Lt(target) => compare_values(value, target) == Some(Ordering::Less),
            Condition::Le(target) => matches!(
                compare_values(value, target),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Condition::Between(low, high) => {
                let ge_low = matches!(
                    compare_values(value, low),
                    Some(Ordering::Greater | Ordering::Equal)
                );
                let le_high = matches!(
                    compare_values(value, high),
                    Some(Ordering::Less | Ordering::Equal)
                );
                ge_low && le_high
            }
        }
    }
}

/// A condition on a named field.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub condition: Condition,
}

impl Predicate {
    pub fn new(field: impl Into<String>, condition: Condition) -> Self {
        Self {
            field: field.into(),
            condition,
        }
    }

    /// Parse a `field__op` expression.
    pub fn parse(expr: &str, value: impl Into<Value>) -> Result<Self, QueryError> {
        let (field, op) = expr
            .rsplit_once("__")
            .filter(|(field, op)| !field.is_empty() && !op.is_empty())
            .ok_or_else(|| QueryError::MalformedConstraint(expr.to_string()))?;
        Ok(Self::new(field, Condition::from_op(op, value.into())?))
    }

    /// Whether `item` satisfies this predicate. A missing field never matches.
    pub fn matches(&self, item: &Item) -> bool {
        item.get(&self.field)
            .is_some_and(|value| self.condition.matches(value))
    }
}

/// Whether `item` satisfies every predicate.
pub fn matches_all(predicates: &[Predicate], item: &Item) -> bool {
    predicates.iter().all(|p| p.matches(item))
}

/// Compare two JSON values, returning an ordering if the types are comparable.
///
/// - Numbers: integers compared exactly, anything else as f64
/// - Strings: compared lexicographically
/// - Booleans: false < true
/// - Mismatched types: returns `None`
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
                return Some(x.cmp(&y));
            }
            if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
                return Some(x.cmp(&y));
            }
            let fa = a.as_f64()?;
            let fb = b.as_f64()?;
            fa.partial_cmp(&fb)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
