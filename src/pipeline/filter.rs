//! Declarative filter evaluation.
//!
//! A rule carries a list of clauses, AND-ed together; an empty list
//! always passes. Field resolution is the one place the orchestrator
//! does dynamic path access: clauses address the JSON serialization of
//! the normalized event with a dot-path (`order.total`,
//! `metadata.fulfillment_status`), so filters can also reach raw payload
//! fields that were never promoted to first-class attributes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::NormalizedEvent;

/// Comparison operator for a filter clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    NotContains,
    In,
    NotIn,
}

/// One declarative predicate against the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterClause {
    /// Dot-path into the normalized event (e.g. `order.total`).
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
}

/// Evaluate all clauses against the event. Short-circuits on the first
/// failing clause.
pub fn passes_filters(event: &NormalizedEvent, filters: &[FilterClause]) -> bool {
    if filters.is_empty() {
        return true;
    }
    // Filters address the serialized shape, same as the stored snapshot.
    let root = match serde_json::to_value(event) {
        Ok(v) => v,
        Err(_) => return false,
    };
    filters.iter().all(|clause| clause_passes(&root, clause))
}

fn clause_passes(root: &Value, clause: &FilterClause) -> bool {
    let field = resolve_path(root, &clause.field);

    match clause.operator {
        FilterOperator::Equals => match field {
            Some(actual) => loose_eq(actual, &clause.value),
            // A missing field only equals an explicitly-null expectation.
            None => clause.value.is_null(),
        },
        FilterOperator::NotEquals => match field {
            Some(actual) => !loose_eq(actual, &clause.value),
            None => !clause.value.is_null(),
        },
        FilterOperator::GreaterThan => match (field.and_then(as_decimal), as_decimal(&clause.value)) {
            (Some(actual), Some(expected)) => actual > expected,
            // Unresolvable or non-numeric never satisfies a numeric test.
            _ => false,
        },
        FilterOperator::LessThan => match (field.and_then(as_decimal), as_decimal(&clause.value)) {
            (Some(actual), Some(expected)) => actual < expected,
            _ => false,
        },
        FilterOperator::Contains => match field {
            Some(actual) => {
                coerce_string(actual).to_lowercase().contains(&coerce_string(&clause.value).to_lowercase())
            }
            None => false,
        },
        FilterOperator::NotContains => match field {
            Some(actual) => {
                !coerce_string(actual).to_lowercase().contains(&coerce_string(&clause.value).to_lowercase())
            }
            None => true,
        },
        FilterOperator::In => match &clause.value {
            Value::Array(options) => field
                .map(|actual| options.iter().any(|o| loose_eq(actual, o)))
                .unwrap_or(false),
            // Conservative: a malformed clause never matches.
            _ => false,
        },
        FilterOperator::NotIn => match &clause.value {
            Value::Array(options) => field
                .map(|actual| !options.iter().any(|o| loose_eq(actual, o)))
                .unwrap_or(true),
            _ => false,
        },
    }
}

/// Walk a dot-path through objects. Any unresolvable segment yields None.
fn resolve_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    if current.is_null() { None } else { Some(current) }
}

/// Numeric view of a JSON value: numbers and numeric strings both count,
/// so `"150.00" > 100` behaves as expected for string-typed payloads.
fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// String coercion used by the substring operators.
fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Equality across the string/number divide: numeric values compare
/// numerically, everything else compares by exact JSON equality or
/// string coercion.
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    if let (Some(da), Some(db)) = (as_decimal(a), as_decimal(b)) {
        return da == db;
    }
    match (a, b) {
        (Value::String(_), _) | (_, Value::String(_)) => coerce_string(a) == coerce_string(b),
        _ => false,
    }
}
