mod execution;
mod flow;
mod node_execution;

use std::sync::Arc;

use sea_query::{Alias as SeaAlias, Condition, Expr as SeaExpr, Value as SeaValue};
use serde_json::Value as JsonValue;

pub use execution::ExecutionCollection;
pub use flow::FlowCollection;
pub use node_execution::NodeExecutionCollection;

use crate::store::map_db_err;
use crate::store::{db::postgres::synclient::SynClient, query::Query};

pub type DbConnection = Arc<SynClient>;

fn json_to_sea(value: &JsonValue) -> SeaValue {
    match value {
        JsonValue::Null => SeaValue::String(None),
        JsonValue::Bool(b) => (*b).into(),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => i.into(),
            None => n.as_f64().unwrap_or_default().into(),
        },
        JsonValue::String(s) => s.clone().into(),
        other => other.to_string().into(),
    }
}

/// Translate the equality filters of a [`Query`] into a sea-query condition.
fn into_query(q: &Query) -> Condition {
    let mut cond = Condition::all();
    for (key, value) in q.filters() {
        cond = if value.is_null() {
            cond.add(SeaExpr::col(SeaAlias::new(key)).is_null())
        } else {
            cond.add(SeaExpr::col(SeaAlias::new(key)).eq(json_to_sea(value)))
        };
    }
    cond
}

fn decode_err(err: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}
