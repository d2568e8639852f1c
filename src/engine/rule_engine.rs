//! Rule engine: store + parse cache + evaluator

use crate::condition::{evaluate, parse, Node, RuleCache};
use crate::config::EngineConfig;
use crate::error::{Result, RuleError};
use crate::record::Record;
use crate::store::{MemoryRuleStore, RuleStore};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Registers rule text and evaluates stored rules against records
pub struct RuleEngine<S: RuleStore = MemoryRuleStore> {
    store: S,
    cache: Option<RuleCache>,
    config: EngineConfig,
}

impl RuleEngine<MemoryRuleStore> {
    /// Engine backed by an in-memory store
    pub fn in_memory(config: EngineConfig) -> Result<Self> {
        Self::new(MemoryRuleStore::new(), config)
    }
}

impl<S: RuleStore> RuleEngine<S> {
    pub fn new(store: S, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let cache = config
            .parse_cache
            .then(|| RuleCache::with_capacity(config.max_cached_rules));

        Ok(Self {
            store,
            cache,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of parsed trees currently cached
    pub fn cached_rules(&self) -> usize {
        self.cache.as_ref().map_or(0, RuleCache::len)
    }

    fn parse(&self, rule_text: &str) -> Result<Arc<Node>> {
        match &self.cache {
            Some(cache) => cache.get_or_parse(rule_text),
            None => parse(rule_text).map(Arc::new),
        }
    }

    /// Validate and store a rule, returning its id.
    ///
    /// Malformed rules are rejected and never stored.
    #[instrument(skip(self, rule_text))]
    pub fn create_rule(&self, rule_text: &str) -> Result<u64> {
        let tree = self.parse(rule_text).inspect_err(|e| {
            warn!(error = %e, "rule rejected");
        })?;

        let id = self.store.insert(rule_text.to_string());
        info!(rule_id = id, conditions = tree.condition_count(), "rule created");
        Ok(id)
    }

    /// Source text of a stored rule
    pub fn rule_text(&self, rule_id: u64) -> Result<String> {
        self.store.get_rule_text(rule_id).ok_or_else(|| {
            warn!(rule_id, "rule not found");
            RuleError::RuleNotFound(rule_id)
        })
    }

    /// Parsed tree of a stored rule
    pub fn rule_tree(&self, rule_id: u64) -> Result<Arc<Node>> {
        let text = self.rule_text(rule_id)?;
        self.parse(&text)
    }

    /// Evaluate a stored rule against a record
    #[instrument(skip(self, record), fields(record_fields = record.len()))]
    pub fn evaluate_rule(&self, rule_id: u64, record: &Record) -> Result<bool> {
        let tree = self.rule_tree(rule_id)?;
        let result = evaluate(&tree, record);
        debug!(?result, "rule evaluated");
        result
    }

    /// Evaluate rule text directly, without storing it
    #[instrument(skip(self, rule_text, record))]
    pub fn evaluate_text(&self, rule_text: &str, record: &Record) -> Result<bool> {
        let tree = self.parse(rule_text)?;
        evaluate(&tree, record)
    }

    /// Remove a stored rule
    pub fn delete_rule(&self, rule_id: u64) -> Result<()> {
        if self.store.remove(rule_id) {
            Ok(())
        } else {
            warn!(rule_id, "delete of unknown rule");
            Err(RuleError::RuleNotFound(rule_id))
        }
    }
}
