//! Result cache — memoizes successful tool results.
//!
//! Keys are `tool_name + ":" + key-sorted JSON of the arguments`, so
//! argument objects that differ only in key order share an entry. The cache
//! is a bounded LRU; the least recently used entry is evicted at capacity.

use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use toolwright_core::tool::ToolResult;
use crate::canonical;

pub const DEFAULT_CAPACITY: usize = 512;

/// The cache key for one (tool, arguments) pair.
pub fn canonical_key(tool_name: &str, arguments: &serde_json::Value) -> String {
    format!("{tool_name}:{}", canonical::to_canonical_string(arguments))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
}

pub struct ResultCache {
    entries: Mutex<LruCache<String, ToolResult>>,
}

impl ResultCache {
    /// A cache holding at most `capacity` results (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, ToolResult>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up a result, marking it most recently used.
    pub fn get(&self, key: &str) -> Option<ToolResult> {
        self.lock().get(key).cloned()
    }

    pub fn insert(&self, key: String, result: ToolResult) {
        self.lock().put(key, result);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.lock();
        CacheStats {
            size: entries.len(),
            capacity: entries.cap().get(),
        }
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn result(n: i64) -> ToolResult {
        ToolResult::success(json!({ "n": n }), Duration::from_millis(5), 10)
    }

    #[test]
    fn key_ignores_argument_order() {
        let a = canonical_key("search_by_query", &json!({"query": "todo", "path": "src"}));
        let b = canonical_key("search_by_query", &json!({"path": "src", "query": "todo"}));
        assert_eq!(a, b);
        assert_eq!(a, r#"search_by_query:{"path":"src","query":"todo"}"#);
    }

    #[test]
    fn key_includes_tool_name() {
        let args = json!({"path": "."});
        assert_ne!(
            canonical_key("map_architecture", &args),
            canonical_key("detect_patterns", &args)
        );
    }

    #[test]
    fn stores_and_returns_results() {
        let cache = ResultCache::new(4);
        assert!(cache.get("k").is_none());
        cache.insert("k".into(), result(1));
        assert_eq!(cache.get("k").unwrap().data, Some(json!({"n": 1})));
        assert_eq!(cache.stats(), CacheStats { size: 1, capacity: 4 });
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = ResultCache::new(2);
        cache.insert("a".into(), result(1));
        cache.insert("b".into(), result(2));
        cache.get("a");
        cache.insert("c".into(), result(3));

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn clear_empties() {
        let cache = ResultCache::default();
        cache.insert("a".into(), result(1));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().capacity, DEFAULT_CAPACITY);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        assert_eq!(ResultCache::new(0).stats().capacity, 1);
    }
}
