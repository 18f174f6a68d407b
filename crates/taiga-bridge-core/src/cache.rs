//! Per-project caches
//!
//! Caches are append-only and never invalidated: a renamed user or retyped
//! status is not observed until a new facade is constructed. The behavior sits
//! behind the [`Cache`] trait so expiry can be added without touching the
//! resolver.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};

/// Lookup cache capability
pub trait Cache<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<V>;

    fn put(&self, key: K, value: V);

    /// Bulk-populate from a listing and mark the cache warm
    fn warm(&self, entries: Vec<(K, V)>);

    /// Whether a bulk population has completed
    fn is_warm(&self) -> bool;

    /// Copy of every entry
    fn snapshot(&self) -> Vec<(K, V)>;
}

/// In-memory [`Cache`] that never expires entries
#[derive(Debug)]
pub struct MemoryCache<K, V> {
    entries: RwLock<HashMap<K, V>>,
    warmed: AtomicBool,
}

impl<K, V> Default for MemoryCache<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            warmed: AtomicBool::new(false),
        }
    }
}

impl<K, V> MemoryCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<K, V> Cache<K, V> for MemoryCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        self.entries.read().get(key).cloned()
    }

    fn put(&self, key: K, value: V) {
        self.entries.write().insert(key, value);
    }

    fn warm(&self, entries: Vec<(K, V)>) {
        let mut map = self.entries.write();
        for (key, value) in entries {
            map.insert(key, value);
        }
        self.warmed.store(true, Ordering::Release);
    }

    fn is_warm(&self) -> bool {
        self.warmed.load(Ordering::Acquire)
    }

    fn snapshot(&self) -> Vec<(K, V)> {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
