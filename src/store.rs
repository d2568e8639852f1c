//! Rule text storage
//!
//! The engine only ever needs "rule text for id"; persistence is behind the
//! [`RuleStore`] trait. [`MemoryRuleStore`] keeps everything in process.

use ahash::AHashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, instrument};

/// Storage for rule source text, keyed by an assigned id
pub trait RuleStore: Send + Sync {
    /// Store rule text and return its new id
    fn insert(&self, rule_text: String) -> u64;

    /// Source text for `id`, if stored
    fn get_rule_text(&self, id: u64) -> Option<String>;

    /// Remove a rule, returning whether it existed
    fn remove(&self, id: u64) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory store with autoincrement ids starting at 1
pub struct MemoryRuleStore {
    rules: RwLock<AHashMap<u64, String>>,
    next_id: AtomicU64,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(AHashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Stored ids in ascending order
    pub fn ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.rules.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for MemoryRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleStore for MemoryRuleStore {
    #[instrument(skip(self, rule_text))]
    fn insert(&self, rule_text: String) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.rules.write().insert(id, rule_text);
        info!(rule_id = id, "rule stored");
        id
    }

    fn get_rule_text(&self, id: u64) -> Option<String> {
        self.rules.read().get(&id).cloned()
    }

    #[instrument(skip(self))]
    fn remove(&self, id: u64) -> bool {
        let removed = self.rules.write().remove(&id).is_some();
        if removed {
            info!(rule_id = id, "rule removed");
        }
        removed
    }

    fn len(&self) -> usize {
        self.rules.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_insert_and_get() {
        let store = MemoryRuleStore::new();
        assert!(store.is_empty());

        let first = store.insert("age > 30".to_string());
        let second = store.insert("b == 2".to_string());

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get_rule_text(first).as_deref(), Some("age > 30"));
        assert_eq!(store.get_rule_text(99), None);
    }

    #[test]
    fn test_remove_does_not_reuse_ids() {
        let store = MemoryRuleStore::new();
        let id = store.insert("a > 1".to_string());
        assert!(store.remove(id));
        assert!(!store.remove(id));
        assert_eq!(store.get_rule_text(id), None);

        let next = store.insert("a > 2".to_string());
        assert_ne!(next, id);
        assert_eq!(store.ids(), vec![next]);
    }

    #[test]
    fn test_concurrent_inserts_get_unique_ids() {
        let store = Arc::new(MemoryRuleStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    (0..50)
                        .map(|i| store.insert(format!("f{} > {}", t, i)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();

        assert_eq!(ids.len(), 400);
        assert_eq!(store.len(), 400);
    }
}
