//! Evaluation of [`ConditionModel`] against the execution context.

use serde_json::Value;

use crate::{
    Result,
    model::{ConditionModel, ConditionOperator},
    runtime::Context,
    workflow::template,
};

/// Evaluate `condition` for node `nid`.
///
/// The field is looked up in `scope` first (the output of the edge source),
/// then in the layered context. A missing field only satisfies `not_exists`.
pub fn evaluate(
    ctx: &Context,
    nid: &str,
    condition: &ConditionModel,
    scope: Option<&Value>,
) -> Result<bool> {
    let field = strip_template(&condition.field);
    let actual = scope.and_then(|s| template::traverse(s, &field.split('.').collect::<Vec<_>>()).cloned()).or_else(|| template::lookup(ctx, nid, field));
    let expected = template::resolve_json_value(ctx, nid, &condition.value)?;

    Ok(compare(condition.operator, actual.as_ref(), &expected))
}

fn strip_template(field: &str) -> &str {
    let field = field.trim();
    field.strip_prefix("${").and_then(|f| f.strip_suffix('}')).map(str::trim).unwrap_or(field)
}

/// Apply `operator` to a resolved left/right pair.
pub fn compare(
    operator: ConditionOperator,
    actual: Option<&Value>,
    expected: &Value,
) -> bool {
    let present = actual.filter(|v| !v.is_null());

    match (operator, actual) {
        (ConditionOperator::Exists, _) => present.is_some(),
        (ConditionOperator::NotExists, _) => present.is_none(),
        (_, None) => false,
        (ConditionOperator::Equals, Some(a)) => values_equal(a, expected),
        (ConditionOperator::NotEquals, Some(a)) => !values_equal(a, expected),
        (ConditionOperator::GreaterThan, Some(a)) => cmp_numbers(a, expected, |a, e| a > e),
        (ConditionOperator::LessThan, Some(a)) => cmp_numbers(a, expected, |a, e| a < e),
        (ConditionOperator::GreaterThanOrEqual, Some(a)) => cmp_numbers(a, expected, |a, e| a >= e),
        (ConditionOperator::LessThanOrEqual, Some(a)) => cmp_numbers(a, expected, |a, e| a <= e),
        (ConditionOperator::Contains, Some(a)) => contains(a, expected),
        (ConditionOperator::NotContains, Some(a)) => !contains(a, expected),
        (ConditionOperator::StartsWith, Some(a)) => matches!((a, expected), (Value::String(a), Value::String(e)) if a.starts_with(e.as_str())),
        (ConditionOperator::EndsWith, Some(a)) => matches!((a, expected), (Value::String(a), Value::String(e)) if a.ends_with(e.as_str())),
        (ConditionOperator::In, Some(a)) => contains(expected, a),
        (ConditionOperator::NotIn, Some(a)) => !contains(expected, a),
    }
}

/// Numbers and numeric strings compare as f64.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn values_equal(
    actual: &Value,
    expected: &Value,
) -> bool {
    match (actual, expected) {
        (Value::Number(_), _) | (_, Value::Number(_)) => match (as_number(actual), as_number(expected)) {
            (Some(a), Some(e)) => a == e,
            _ => false,
        },
        (Value::Bool(b), Value::String(s)) | (Value::String(s), Value::Bool(b)) => s.eq_ignore_ascii_case(&b.to_string()),
        _ => actual == expected,
    }
}

fn cmp_numbers<F>(
    actual: &Value,
    expected: &Value,
    cmp: F,
) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    match (as_number(actual), as_number(expected)) {
        (Some(a), Some(e)) => cmp(a, e),
        _ => false,
    }
}

/// Substring for strings, membership for arrays, key presence for objects.
fn contains(
    haystack: &Value,
    needle: &Value,
) -> bool {
    match (haystack, needle) {
        (Value::String(h), Value::String(n)) => h.contains(n.as_str()),
        (Value::String(h), n @ (Value::Number(_) | Value::Bool(_))) => h.contains(&n.to_string()),
        (Value::Array(items), n) => items.iter().any(|item| values_equal(item, n)),
        (Value::Object(map), Value::String(key)) => map.contains_key(key),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::{capability::CapabilityRegistry, common::Vars};

    fn cond(
        operator: ConditionOperator,
        field: &str,
        value: Value,
    ) -> ConditionModel {
        ConditionModel {
            operator,
            field: field.to_string(),
            value,
        }
    }

    fn ctx() -> Context {
        let ctx = Context::new("e1", "f1", "t1", json!({"threshold": 70, "tier": "gold"}), Arc::new(CapabilityRegistry::new()));
        ctx.add_output("A".to_string(), Vars::new().with("score", 80).with("labels", json!(["pii", "eu"])));
        ctx
    }

    #[test]
    fn test_numeric_comparisons() {
        let ctx = ctx();
        assert!(evaluate(&ctx, "B", &cond(ConditionOperator::GreaterThan, "A.output.score", json!(70)), None).unwrap());
        assert!(!evaluate(&ctx, "B", &cond(ConditionOperator::LessThan, "A.score", json!(70)), None).unwrap());
        assert!(evaluate(&ctx, "B", &cond(ConditionOperator::GreaterThanOrEqual, "A.score", json!("80")), None).unwrap());
        assert!(evaluate(&ctx, "B", &cond(ConditionOperator::GreaterThan, "A.score", json!("${trigger_data.threshold}")), None).unwrap());
    }

    #[test]
    fn test_scope_takes_precedence() {
        let ctx = ctx();
        let scope = json!({"condition_result": false});
        assert!(evaluate(&ctx, "C", &cond(ConditionOperator::Equals, "condition_result", json!(false)), Some(&scope)).unwrap());
        assert!(!evaluate(&ctx, "C", &cond(ConditionOperator::Equals, "condition_result", json!(true)), Some(&scope)).unwrap());
    }

    #[test]
    fn test_missing_field() {
        let ctx = ctx();
        assert!(!evaluate(&ctx, "B", &cond(ConditionOperator::Equals, "A.missing", json!(1)), None).unwrap());
        assert!(!evaluate(&ctx, "B", &cond(ConditionOperator::NotEquals, "A.missing", json!(1)), None).unwrap());
        assert!(evaluate(&ctx, "B", &cond(ConditionOperator::NotExists, "A.missing", Value::Null), None).unwrap());
        assert!(evaluate(&ctx, "B", &cond(ConditionOperator::Exists, "${A.score}", Value::Null), None).unwrap());
    }

    #[test]
    fn test_unresolved_value_is_error() {
        let ctx = ctx();
        assert!(evaluate(&ctx, "B", &cond(ConditionOperator::Equals, "A.score", json!("${Z.score}")), None).is_err());
    }

    #[test]
    fn test_collection_operators() {
        assert!(compare(ConditionOperator::Contains, Some(&json!(["pii", "eu"])), &json!("eu")));
        assert!(compare(ConditionOperator::NotContains, Some(&json!("hello")), &json!("bye")));
        assert!(compare(ConditionOperator::In, Some(&json!("gold")), &json!(["gold", "silver"])));
        assert!(compare(ConditionOperator::NotIn, Some(&json!(3)), &json!([1, 2])));
        assert!(compare(ConditionOperator::StartsWith, Some(&json!("vendor-1")), &json!("vendor")));
        assert!(compare(ConditionOperator::EndsWith, Some(&json!("vendor-1")), &json!("-1")));
        assert!(compare(ConditionOperator::Equals, Some(&json!(true)), &json!("true")));
        assert!(!compare(ConditionOperator::Equals, Some(&json!("abc")), &json!(1)));
    }

    #[test]
    fn test_exists_treats_null_as_missing() {
        assert!(compare(ConditionOperator::Exists, Some(&json!(0)), &Value::Null));
        assert!(!compare(ConditionOperator::Exists, Some(&Value::Null), &Value::Null));
        assert!(compare(ConditionOperator::NotExists, Some(&Value::Null), &Value::Null));
        assert!(compare(ConditionOperator::NotExists, None, &Value::Null));
        assert!(!compare(ConditionOperator::NotEquals, None, &json!(1)));
    }
}
