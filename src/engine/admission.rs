//! Per flow admission control.
//!
//! `max_concurrent_executions` caps how many executions of one flow run at
//! the same time. Requests over the cap are rejected, they are never queued.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::{FlowError, Result};

#[derive(Debug, Default)]
pub struct Admission {
    running: Mutex<HashMap<String, u32>>,
}

/// A running slot of one flow, released on drop.
#[derive(Debug)]
pub struct Permit {
    admission: Arc<Admission>,
    flow_id: String,
}

impl Admission {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Take a slot for `flow_id`. A `limit` of 0 means unlimited.
    pub fn acquire(
        self: &Arc<Self>,
        flow_id: &str,
        limit: u32,
    ) -> Result<Permit> {
        let mut running = self.running.lock().unwrap();
        let count = running.entry(flow_id.to_string()).or_insert(0);
        if limit > 0 && *count >= limit {
            return Err(FlowError::Admission(format!("flow '{}' already runs {} execution(s), the limit is {}", flow_id, count, limit)));
        }
        *count += 1;

        Ok(Permit {
            admission: self.clone(),
            flow_id: flow_id.to_string(),
        })
    }

    /// Number of executions of `flow_id` currently holding a slot.
    pub fn running(
        &self,
        flow_id: &str,
    ) -> u32 {
        self.running.lock().unwrap().get(flow_id).copied().unwrap_or(0)
    }

    fn release(
        &self,
        flow_id: &str,
    ) {
        let mut running = self.running.lock().unwrap();
        if let Some(count) = running.get_mut(flow_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                running.remove(flow_id);
            }
        }
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.admission.release(&self.flow_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_rejects() {
        let admission = Admission::new();
        let first = admission.acquire("f", 2).unwrap();
        let _second = admission.acquire("f", 2).unwrap();
        assert!(matches!(admission.acquire("f", 2), Err(FlowError::Admission(_))));
        assert_eq!(admission.running("f"), 2);

        drop(first);
        assert_eq!(admission.running("f"), 1);
        assert!(admission.acquire("f", 2).is_ok());
    }

    #[test]
    fn test_zero_is_unlimited() {
        let admission = Admission::new();
        let permits = (0..50).map(|_| admission.acquire("f", 0).unwrap()).collect::<Vec<_>>();
        assert_eq!(admission.running("f"), 50);
        drop(permits);
        assert_eq!(admission.running("f"), 0);
    }

    #[test]
    fn test_flows_are_independent() {
        let admission = Admission::new();
        let _a = admission.acquire("a", 1).unwrap();
        assert!(admission.acquire("b", 1).is_ok());
        assert!(admission.acquire("a", 1).is_err());
    }
}
