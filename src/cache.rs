//! Computed-value cache with dependency-based invalidation
//!
//! Each entry stores the evaluated value together with the dependency set of
//! the formula that produced it. Entries are dropped three ways: a TTL check
//! on read, an explicit per-field drop, or a dependency sweep when a context
//! path changes. The TTL bounds staleness when an invalidation notification
//! is missed.

use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

/// A single cached evaluation result
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    dependencies: BTreeSet<String>,
    created: Instant,
}

/// Cache statistics snapshot
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses (including stale reads)
    pub misses: u64,
    /// Number of entries dropped by invalidation or staleness
    pub evictions: u64,
}

/// Value cache keyed by field id
pub struct FieldCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl FieldCache {
    /// Create a cache whose entries expire after `ttl`
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up a field's cached value, dropping the entry if it is stale
    pub fn get(&self, field_id: &str) -> Option<Value> {
        {
            let entries = self
                .entries
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            match entries.get(field_id) {
                Some(entry) if entry.created.elapsed() <= self.ttl => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        // stale entry; upgrade to a write lock and drop it
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if entries
            .get(field_id)
            .is_some_and(|e| e.created.elapsed() > self.ttl)
        {
            entries.remove(field_id);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a freshly evaluated value with its dependency set
    pub fn insert(&self, field_id: &str, value: Value, dependencies: BTreeSet<String>) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            field_id.to_string(),
            CacheEntry {
                value,
                dependencies,
                created: Instant::now(),
            },
        );
    }

    /// Drop one field's entry unconditionally
    pub fn invalidate(&self, field_id: &str) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if entries.remove(field_id).is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Drop every entry whose dependency set matches the changed path
    ///
    /// A dependency matches when it equals the changed path, when it is a
    /// dot-prefix ancestor of it (dependency `inventory` matches changed
    /// path `inventory.0.weight`), or when it is a wildcard pattern where
    /// each `*` stands for exactly one segment (`inventory.*.weight`).
    pub fn invalidate_dependents(&self, changed_path: &str) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let before = entries.len();
        entries.retain(|_, entry| {
            !entry
                .dependencies
                .iter()
                .any(|dep| dependency_matches(dep, changed_path))
        });
        let dropped = before - entries.len();

        if dropped > 0 {
            self.evictions
                .fetch_add(dropped as u64, Ordering::Relaxed);
            tracing::debug!(
                changed_path,
                dropped,
                "invalidated dependent cache entries"
            );
        }
    }

    /// Drop everything
    pub fn clear(&self) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        self.evictions
            .fetch_add(entries.len() as u64, Ordering::Relaxed);
        entries.clear();
    }

    /// Current statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Number of live entries (stale ones included until next read)
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Does a single dependency path match a changed context path?
fn dependency_matches(dependency: &str, changed_path: &str) -> bool {
    if dependency == changed_path {
        return true;
    }

    // dependency on an ancestor covers every path beneath it
    if changed_path.len() > dependency.len()
        && changed_path.as_bytes()[dependency.len()] == b'.'
        && changed_path.starts_with(dependency)
    {
        return true;
    }

    if dependency.contains('*') {
        let dep_segments: Vec<&str> = dependency.split('.').collect();
        let changed_segments: Vec<&str> = changed_path.split('.').collect();
        return dep_segments.len() == changed_segments.len()
            && dep_segments
                .iter()
                .zip(&changed_segments)
                .all(|(d, c)| *d == "*" || d == c);
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deps(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|p| (*p).to_string()).collect()
    }

    fn cache() -> FieldCache {
        FieldCache::new(Duration::from_secs(60))
    }

    #[test]
    fn test_insert_and_get() {
        let cache = cache();
        cache.insert("hp", json!(42), deps(&["constitution"]));
        assert_eq!(cache.get("hp"), Some(json!(42)));
        assert_eq!(cache.get("other"), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = FieldCache::new(Duration::ZERO);
        cache.insert("hp", json!(42), deps(&[]));
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(cache.get("hp"), None);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_invalidate_single_field() {
        let cache = cache();
        cache.insert("a", json!(1), deps(&["x"]));
        cache.insert("b", json!(2), deps(&["x"]));

        cache.invalidate("a");
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(json!(2)));
    }

    #[test]
    fn test_exact_dependency_match() {
        let cache = cache();
        cache.insert("carry", json!(10), deps(&["inventory.weight"]));
        cache.invalidate_dependents("inventory.weight");
        assert_eq!(cache.get("carry"), None);
    }

    #[test]
    fn test_ancestor_dependency_match() {
        let cache = cache();
        cache.insert("carry", json!(10), deps(&["inventory"]));
        cache.invalidate_dependents("inventory.0.weight");
        assert_eq!(cache.get("carry"), None);
    }

    #[test]
    fn test_prefix_requires_segment_boundary() {
        let cache = cache();
        cache.insert("carry", json!(10), deps(&["inv"]));
        cache.invalidate_dependents("inventory.weight");
        // "inv" is not a dot-ancestor of "inventory.weight"
        assert_eq!(cache.get("carry"), Some(json!(10)));
    }

    #[test]
    fn test_wildcard_dependency_match() {
        let cache = cache();
        cache.insert("carry", json!(10), deps(&["inventory.*.weight"]));
        cache.invalidate_dependents("inventory.3.weight");
        assert_eq!(cache.get("carry"), None);

        cache.insert("carry", json!(10), deps(&["inventory.*.weight"]));
        // the wildcard covers exactly one segment
        cache.invalidate_dependents("inventory.3.bag.weight");
        assert_eq!(cache.get("carry"), Some(json!(10)));
    }

    #[test]
    fn test_unrelated_path_untouched() {
        let cache = cache();
        cache.insert("carry", json!(10), deps(&["inventory.weight"]));
        cache.invalidate_dependents("abilities.strength");
        assert_eq!(cache.get("carry"), Some(json!(10)));
    }

    #[test]
    fn test_clear() {
        let cache = cache();
        cache.insert("a", json!(1), deps(&[]));
        cache.insert("b", json!(2), deps(&[]));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().evictions, 2);
    }
}
