use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison applied by condition nodes and conditional edges.
///
/// The set is closed: every operator is evaluated explicitly in
/// `workflow::condition`, so adding one means adding a match arm there.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConditionOperator {
    #[serde(alias = "eq")]
    Equals,
    #[serde(alias = "ne")]
    NotEquals,
    #[serde(alias = "gt")]
    GreaterThan,
    #[serde(alias = "lt")]
    LessThan,
    #[serde(alias = "ge", alias = "gte")]
    GreaterThanOrEqual,
    #[serde(alias = "le", alias = "lte")]
    LessThanOrEqual,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    Exists,
    NotExists,
}

/// `{ "type": "greater_than", "field": "A.score", "value": 70 }`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConditionModel {
    #[serde(rename = "type")]
    pub operator: ConditionOperator,
    /// Dot path into the accumulated context.
    pub field: String,
    /// Right-hand side. String values may contain `${...}` templates.
    #[serde(default)]
    pub value: Value,
}
