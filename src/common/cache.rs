//! In-memory key-value store backed by moka.

use moka::sync::Cache;

/// Thread-safe map shared between tasks.
///
/// Built without a capacity bound: entries only leave through [`MemCache::remove`].
/// It holds:
/// - deployment variables exposed to templates as `env.*`
/// - completed node outputs of an execution (`MemCache<NodeId, Vars>`)
/// - live execution handles held by the engine
#[derive(Clone)]
pub struct MemCache<K, V> {
    variables: Cache<K, V>,
}

impl<K, V> MemCache<K, V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            variables: Cache::builder().build(),
        }
    }

    /// Insert or replace an entry.
    pub fn set(
        &self,
        key: K,
        value: V,
    ) {
        self.variables.insert(key, value);
    }

    /// Get a clone of the entry stored under `key`.
    pub fn get(
        &self,
        key: &K,
    ) -> Option<V> {
        self.variables.get(key)
    }

    pub fn remove(
        &self,
        key: &K,
    ) {
        self.variables.remove(key);
    }

    pub fn iter(&self) -> moka::sync::Iter<'_, K, V> {
        self.variables.iter()
    }
}

impl<K, V> Default for MemCache<K, V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_are_never_evicted() {
        let cache = MemCache::<String, u32>::new();
        for i in 0..10_000 {
            cache.set(format!("exec-{}", i), i);
        }
        cache.variables.run_pending_tasks();

        assert!((0..10_000).all(|i| cache.get(&format!("exec-{}", i)) == Some(i)));
        cache.remove(&"exec-0".to_string());
        assert_eq!(cache.get(&"exec-0".to_string()), None);
    }
}
