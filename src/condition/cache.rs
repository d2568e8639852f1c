//! Parsed rule cache - keyed by rule text, fast hashing via ahash

use crate::condition::ast::Node;
use crate::condition::parser;
use crate::error::Result;
use crate::record::Record;
use ahash::AHashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Default number of parsed rules kept before a cache is reset
pub const DEFAULT_CACHE_CAPACITY: usize = 2048;

/// Map from rule text to its parsed tree.
///
/// When full, the whole map is dropped before the next insert.
pub struct RuleCache {
    entries: RwLock<AHashMap<String, Arc<Node>>>,
    capacity: usize,
}

impl RuleCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(AHashMap::with_capacity(capacity.min(DEFAULT_CACHE_CAPACITY))),
            capacity: capacity.max(1),
        }
    }

    /// Get or parse a rule string
    pub fn get_or_parse(&self, rule: &str) -> Result<Arc<Node>> {
        // Fast path: check read lock first
        {
            let entries = self.entries.read();
            if let Some(ast) = entries.get(rule) {
                debug!(rule, "rule cache hit");
                return Ok(Arc::clone(ast));
            }
        }

        // Slow path: parse outside the lock, failures are not cached
        let ast = Arc::new(parser::parse(rule)?);

        {
            let mut entries = self.entries.write();
            if entries.len() >= self.capacity && !entries.contains_key(rule) {
                debug!(entries = entries.len(), "rule cache full, clearing");
                entries.clear();
            }
            entries.insert(rule.to_string(), Arc::clone(&ast));
        }

        debug!(rule, "rule cache miss");
        Ok(ast)
    }

    pub fn contains(&self, rule: &str) -> bool {
        self.entries.read().contains_key(rule)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl Default for RuleCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

/// Global rule cache
static RULE_CACHE: Lazy<RuleCache> = Lazy::new(RuleCache::default);

/// Get or parse a rule string, using the global cache for repeated rules
#[inline]
pub fn get_or_parse(rule: &str) -> Result<Arc<Node>> {
    RULE_CACHE.get_or_parse(rule)
}

/// Check a rule against a record, using the cached AST
#[inline]
pub fn check_rule(rule: &str, record: &Record) -> Result<bool> {
    let ast = get_or_parse(rule)?;
    crate::condition::evaluator::evaluate(&ast, record)
}

/// Clear the global rule cache
pub fn clear_cache() {
    RULE_CACHE.clear();
}

/// Get global cache statistics
pub fn cache_size() -> usize {
    RULE_CACHE.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_hit() {
        let cache = RuleCache::default();
        let rule = "chr > 5";

        // First call - cache miss
        let first = cache.get_or_parse(rule).unwrap();
        assert_eq!(cache.len(), 1);

        // Second call - cache hit, same tree
        let second = cache.get_or_parse(rule).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_parse_errors_not_cached() {
        let cache = RuleCache::default();
        assert!(cache.get_or_parse("chr >> 5").is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_full_cache_is_reset() {
        let cache = RuleCache::with_capacity(2);
        cache.get_or_parse("a > 1").unwrap();
        cache.get_or_parse("b > 1").unwrap();
        assert_eq!(cache.len(), 2);

        // Re-reading an existing entry never resets
        cache.get_or_parse("a > 1").unwrap();
        assert_eq!(cache.len(), 2);

        cache.get_or_parse("c > 1").unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("c > 1"));
        assert!(!cache.contains("a > 1"));
    }

    #[test]
    fn test_zero_capacity_still_caches_one() {
        let cache = RuleCache::with_capacity(0);
        assert_eq!(cache.capacity(), 1);
        cache.get_or_parse("a > 1").unwrap();
        assert!(cache.contains("a > 1"));
    }

    #[test]
    fn test_global_check_rule() {
        let record = Record::new().with("global_cache_field", 10);
        assert!(check_rule("global_cache_field > 5", &record).unwrap());
        assert!(!check_rule("global_cache_field < 5", &record).unwrap());
        assert!(check_rule("", &record).is_err());
    }

    #[test]
    fn test_global_cache_size_and_clear() {
        get_or_parse("global_size_field == 1").unwrap();
        assert!(cache_size() >= 1);

        clear_cache();
        assert!(!RULE_CACHE.contains("global_size_field == 1"));
    }
}
