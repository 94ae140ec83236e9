//! Storage-agnostic query description.

use serde_json::Value as JsonValue;

const DEFAULT_LIMIT: usize = 1000;

/// Equality filters, ordering and paging over one collection.
///
/// ```rust,ignore
/// let q = Query::new().eq("execution_id", "e1").order("started_at", false);
/// let page = store.node_executions().query(&q)?;
/// ```
#[derive(Debug, Clone)]
pub struct Query {
    filters: Vec<(String, JsonValue)>,
    order_by: Vec<(String, bool)>,
    limit: usize,
    offset: usize,
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

impl Query {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }

    /// Only match rows whose `key` equals `value`.
    pub fn eq(
        mut self,
        key: &str,
        value: impl Into<JsonValue>,
    ) -> Self {
        self.filters.push((key.to_string(), value.into()));
        self
    }

    /// Order by `key`, descending when `rev` is set.
    pub fn order(
        mut self,
        key: &str,
        rev: bool,
    ) -> Self {
        self.order_by.push((key.to_string(), rev));
        self
    }

    pub fn with_limit(
        mut self,
        limit: usize,
    ) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn with_offset(
        mut self,
        offset: usize,
    ) -> Self {
        self.offset = offset;
        self
    }

    pub fn filters(&self) -> &[(String, JsonValue)] {
        &self.filters
    }

    pub fn order_by(&self) -> &[(String, bool)] {
        &self.order_by
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}
