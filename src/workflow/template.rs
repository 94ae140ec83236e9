//! `${path}` interpolation against an execution context.
//!
//! Paths are dot separated. The first segment picks the layer:
//! - `trigger_data.*` the data the execution was triggered with
//! - `context.*` execution metadata (`execution_id`, `flow_id`, `tenant_id`, `node_id`)
//! - `env.*` deployment variables
//! - `<node_id>.*` the output of a completed node, `<node_id>.output.*` is accepted as well
//!
//! Numeric segments index into arrays. A path that does not resolve is an
//! error, never an empty string.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::{FlowError, Result, runtime::Context};

static TEMPLATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{\s*([^}]+?)\s*\}").unwrap());

const TRIGGER_LAYER: &str = "trigger_data";
const CONTEXT_LAYER: &str = "context";
const ENV_LAYER: &str = "env";
const OUTPUT_ALIAS: &str = "output";

/// Walk `segments` into `value`.
pub fn traverse<'a>(
    value: &'a Value,
    segments: &[&str],
) -> Option<&'a Value> {
    segments.iter().try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(*segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Look up a dot path in the layered context of node `nid`.
pub fn lookup(
    ctx: &Context,
    nid: &str,
    path: &str,
) -> Option<Value> {
    let segments = path.split('.').map(str::trim).collect::<Vec<_>>();
    let (head, rest) = segments.split_first()?;

    match *head {
        TRIGGER_LAYER => traverse(ctx.trigger_data(), rest).cloned(),
        CONTEXT_LAYER => traverse(&ctx.metadata(nid), rest).cloned(),
        ENV_LAYER => match rest {
            [] => Some(ctx.env_object()),
            [key] => ctx.env().get(&key.to_string()).map(Value::String),
            _ => None,
        },
        node_id => {
            let output: Value = ctx.outputs().get(&node_id.to_string())?.into();
            if let Some(value) = traverse(&output, rest) {
                return Some(value.clone());
            }
            match rest.split_first() {
                Some((&OUTPUT_ALIAS, tail)) => traverse(&output, tail).cloned(),
                _ => None,
            }
        }
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn unresolved(path: &str) -> FlowError {
    FlowError::Resolution(format!("unresolved variable '${{{}}}'", path))
}

/// Resolve every `${...}` token in `template`.
///
/// A template that is exactly one token yields the referenced value with its
/// native type. Anything else yields a string.
pub fn resolve_template(
    ctx: &Context,
    nid: &str,
    template: &str,
) -> Result<Value> {
    let captures = TEMPLATE_PATTERN.captures_iter(template).collect::<Vec<_>>();
    if captures.is_empty() {
        return Ok(Value::String(template.to_string()));
    }

    if captures.len() == 1 && captures[0][0].len() == template.len() {
        let path = &captures[0][1];
        return lookup(ctx, nid, path).ok_or_else(|| unresolved(path));
    }

    let mut result = String::with_capacity(template.len());
    let mut last = 0;
    for caps in captures.iter() {
        let (Some(whole), Some(path)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = lookup(ctx, nid, path.as_str()).ok_or_else(|| unresolved(path.as_str()))?;
        result.push_str(&template[last..whole.start()]);
        result.push_str(&stringify(&value));
        last = whole.end();
    }
    result.push_str(&template[last..]);

    Ok(Value::String(result))
}

/// Resolve templates in every string leaf of `value`.
pub fn resolve_json_value(
    ctx: &Context,
    nid: &str,
    value: &Value,
) -> Result<Value> {
    match value {
        Value::String(s) => resolve_template(ctx, nid, s),
        Value::Array(arr) => {
            let resolved: Result<Vec<Value>> = arr.iter().map(|v| resolve_json_value(ctx, nid, v)).collect();
            Ok(Value::Array(resolved?))
        }
        Value::Object(obj) => {
            let resolved: Result<serde_json::Map<String, Value>> = obj.iter().map(|(k, v)| resolve_json_value(ctx, nid, v).map(|rv| (k.clone(), rv))).collect();
            Ok(Value::Object(resolved?))
        }
        _ => Ok(value.clone()),
    }
}
