use std::{cmp::Ordering, collections::HashMap, sync::RwLock};

use serde_json::Value as JsonValue;

use crate::{
    FlowError, Result,
    store::{DbCollection, PageData, Query, db::mem::DbDocument},
};

/// A single in-memory collection keyed by record id.
#[derive(Debug)]
pub struct Collect<T> {
    name: String,
    items: RwLock<HashMap<String, T>>,
}

impl<T> Collect<T> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            items: RwLock::new(HashMap::new()),
        }
    }
}

fn compare_json(
    a: Option<&JsonValue>,
    b: Option<&JsonValue>,
) -> Ordering {
    match (a, b) {
        (Some(JsonValue::Number(x)), Some(JsonValue::Number(y))) => x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal),
        (Some(JsonValue::String(x)), Some(JsonValue::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl<T> DbCollection for Collect<T>
where
    T: DbDocument + Clone + Send + Sync,
{
    type Item = T;

    fn exists(
        &self,
        id: &str,
    ) -> Result<bool> {
        Ok(self.items.read().unwrap().contains_key(id))
    }

    fn find(
        &self,
        id: &str,
    ) -> Result<Self::Item> {
        self.items.read().unwrap().get(id).cloned().ok_or_else(|| FlowError::Store(format!("{} not found in {}", id, self.name)))
    }

    fn query(
        &self,
        q: &Query,
    ) -> Result<PageData<Self::Item>> {
        let items = self.items.read().unwrap();

        let mut matched = Vec::new();
        for item in items.values() {
            let doc = item.doc()?;
            if q.filters().iter().all(|(key, value)| doc.get(key) == Some(value)) {
                matched.push((doc, item.clone()));
            }
        }

        // stable sorts applied last key first give a lexicographic multi-key order
        for (key, rev) in q.order_by().iter().rev() {
            matched.sort_by(|(a, _), (b, _)| {
                let ord = compare_json(a.get(key), b.get(key));
                if *rev { ord.reverse() } else { ord }
            });
        }

        let count = matched.len();
        let rows = matched.into_iter().skip(q.offset()).take(q.limit()).map(|(_, item)| item).collect::<Vec<_>>();

        Ok(PageData {
            count,
            page_num: q.offset() / q.limit() + 1,
            page_count: count.div_ceil(q.limit()),
            page_size: q.limit(),
            rows,
        })
    }

    fn create(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        let mut items = self.items.write().unwrap();
        if items.contains_key(data.id()) {
            return Err(FlowError::Store(format!("{} already exists in {}", data.id(), self.name)));
        }
        items.insert(data.id().to_string(), data.clone());
        Ok(true)
    }

    fn update(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        let mut items = self.items.write().unwrap();
        match items.get_mut(data.id()) {
            Some(item) => {
                *item = data.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        Ok(self.items.write().unwrap().remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::data::{FlowNodeExecution, NodeRunStatus};

    fn record(
        id: &str,
        execution_id: &str,
        started_at: i64,
    ) -> FlowNodeExecution {
        FlowNodeExecution {
            id: id.to_string(),
            execution_id: execution_id.to_string(),
            node_id: id.to_string(),
            status: NodeRunStatus::Running,
            retry_attempt: 0,
            input_snapshot: json!({}),
            output_snapshot: json!({}),
            error_message: None,
            started_at,
            completed_at: None,
            timestamp: started_at,
        }
    }

    #[test]
    fn test_query_filters_and_orders() {
        let collect = Collect::new("node_executions");
        collect.create(&record("b", "e1", 20)).unwrap();
        collect.create(&record("a", "e1", 10)).unwrap();
        collect.create(&record("c", "e2", 5)).unwrap();

        let page = collect.query(&Query::new().eq("execution_id", "e1").order("started_at", false)).unwrap();
        assert_eq!(page.count, 2);
        assert_eq!(page.rows.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);

        let page = collect.query(&Query::new().order("started_at", true).with_limit(1)).unwrap();
        assert_eq!(page.rows[0].id, "b");
        assert_eq!(page.page_count, 3);
    }

    #[test]
    fn test_create_update_delete() {
        let collect = Collect::new("node_executions");
        let mut item = record("a", "e1", 1);
        assert!(collect.create(&item).unwrap());
        assert!(collect.create(&item).is_err());

        item.status = NodeRunStatus::Completed;
        assert!(collect.update(&item).unwrap());
        assert_eq!(collect.find("a").unwrap().status, NodeRunStatus::Completed);
        assert!(!collect.update(&record("missing", "e1", 1)).unwrap());

        assert!(collect.delete("a").unwrap());
        assert!(!collect.exists("a").unwrap());
    }
}
