//! Condition evaluation against a tenant's metric row.

use super::config::{Condition, ConditionOperator};
use std::collections::HashMap;
use tracing::debug;

/// Evaluates all conditions; they are AND-ed, so every one must hold.
#[must_use]
pub fn evaluate_conditions(
    conditions: &[Condition],
    fields: &HashMap<String, serde_json::Value>,
) -> bool {
    conditions.iter().all(|c| evaluate_condition(c, fields))
}

/// Evaluates one condition.
///
/// A row missing the condition's field never triggers.
#[must_use]
pub fn evaluate_condition(
    condition: &Condition,
    fields: &HashMap<String, serde_json::Value>,
) -> bool {
    let Some(actual) = fields.get(&condition.field) else {
        debug!(field = %condition.field, "Condition field missing from row");
        return false;
    };

    match condition.operator {
        ConditionOperator::Gt => compare(actual, &condition.value, |a, b| a > b),
        ConditionOperator::Gte => compare(actual, &condition.value, |a, b| a >= b),
        ConditionOperator::Lt => compare(actual, &condition.value, |a, b| a < b),
        ConditionOperator::Lte => compare(actual, &condition.value, |a, b| a <= b),
        ConditionOperator::Eq => equals(actual, &condition.value),
        ConditionOperator::Ne => !equals(actual, &condition.value),
        ConditionOperator::Between => between(actual, &condition.value),
        ConditionOperator::Contains => contains(actual, &condition.value),
        ConditionOperator::In => {
            condition
                .value
                .as_array()
                .map(|candidates| candidates.iter().any(|v| equals(actual, v)))
                .unwrap_or(false)
        }
        ConditionOperator::PercentageOfExceeds => {
            percentage_of_exceeds(actual, &condition.value, fields)
        }
    }
}

/// Coerces a JSON value to a number; numeric strings count.
fn as_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn compare(actual: &serde_json::Value, expected: &serde_json::Value, op: fn(f64, f64) -> bool) -> bool {
    match (as_number(actual), as_number(expected)) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

fn equals(actual: &serde_json::Value, expected: &serde_json::Value) -> bool {
    if let (Some(a), Some(b)) = (as_number(actual), as_number(expected)) {
        return (a - b).abs() < f64::EPSILON;
    }
    actual == expected
}

fn between(actual: &serde_json::Value, range: &serde_json::Value) -> bool {
    let Some(bounds) = range.as_array() else {
        return false;
    };
    let (Some(lo), Some(hi)) = (
        bounds.first().and_then(as_number),
        bounds.get(1).and_then(as_number),
    ) else {
        return false;
    };
    as_number(actual).map_or(false, |a| a >= lo && a <= hi)
}

fn contains(actual: &serde_json::Value, needle: &serde_json::Value) -> bool {
    match actual {
        serde_json::Value::String(haystack) => needle
            .as_str()
            .map(|n| haystack.contains(n))
            .unwrap_or(false),
        serde_json::Value::Array(items) => items.iter().any(|item| equals(item, needle)),
        _ => false,
    }
}

fn percentage_of_exceeds(
    actual: &serde_json::Value,
    spec: &serde_json::Value,
    fields: &HashMap<String, serde_json::Value>,
) -> bool {
    let Some(obj) = spec.as_object() else {
        return false;
    };
    let (Some(base_field), Some(percentage)) = (
        obj.get("base_field").and_then(serde_json::Value::as_str),
        obj.get("percentage").and_then(as_number),
    ) else {
        return false;
    };

    let Some(base) = fields.get(base_field).and_then(as_number) else {
        debug!(field = %base_field, "Percentage base field missing from row");
        return false;
    };

    as_number(actual).map_or(false, |a| a > base * percentage / 100.0)
}
