//! Rule Engine Core - boolean rule parser and evaluator
//!
//! Rules such as `age > 30 AND status == 'active'` are parsed into a
//! condition tree and evaluated against records of string / integer / float
//! fields. Python bindings are provided via PyO3.

use pyo3::prelude::*;

pub mod condition;
pub mod config;
pub mod engine;
pub mod error;
pub mod record;
pub mod store;

use crate::config::EngineConfig;
use crate::engine::{extract_record, RuleEngine, RuleHandle};
use crate::error::RuleError;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use pyo3::types::PyDict;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub use crate::condition::{evaluate, parse, Comparator, Condition, LogicalOperator, Node, NodeKind};
pub use crate::error::Result;
pub use crate::record::{Record, Scalar};

// ============================================================================
// Global Engine
// ============================================================================

/// Global engine holding stored rules
static ENGINE: OnceCell<Arc<RwLock<RuleEngine>>> = OnceCell::new();

fn global_engine() -> PyResult<Arc<RwLock<RuleEngine>>> {
    ENGINE
        .get()
        .cloned()
        .ok_or_else(|| RuleError::EngineNotInitialized.into())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Deserialize engine config from a Python dict
fn deserialize_config(dict: &Bound<'_, PyDict>) -> PyResult<EngineConfig> {
    let mut config = EngineConfig::default();
    for (key, value) in dict.iter() {
        let key: String = key.extract()?;
        match key.as_str() {
            "parse_cache" => config.parse_cache = value.extract()?,
            "max_cached_rules" => config.max_cached_rules = value.extract()?,
            other => {
                return Err(RuleError::InvalidConfig(format!("unknown config key: {}", other)).into())
            }
        }
    }
    config.validate()?;
    Ok(config)
}

// ============================================================================
// Python Functions
// ============================================================================

/// Initialize the rule engine (call once at startup)
///
/// Calling it again replaces the engine and drops all stored rules.
///
/// # Arguments
/// * `config` - Optional settings: `parse_cache` (bool), `max_cached_rules` (int)
#[pyfunction]
#[pyo3(signature = (config=None))]
fn init_engine(config: Option<&Bound<'_, PyDict>>) -> PyResult<()> {
    let config = match config {
        Some(dict) => deserialize_config(dict)?,
        None => EngineConfig::default(),
    };
    let engine = RuleEngine::in_memory(config)?;

    // If already initialized, replace the engine
    if let Some(existing) = ENGINE.get() {
        let mut guard = existing.write();
        *guard = engine;
    } else {
        let _ = ENGINE.set(Arc::new(RwLock::new(engine)));
    }

    Ok(())
}

/// Check if the engine is initialized
#[pyfunction]
fn is_engine_initialized() -> bool {
    ENGINE.get().is_some()
}

/// Install a tracing subscriber writing to stderr
///
/// # Arguments
/// * `filter` - EnvFilter directive, e.g. "rule_engine_core=debug" (default: "info")
///
/// # Returns
/// False if a global subscriber was already installed
#[pyfunction]
#[pyo3(signature = (filter=None))]
fn init_logging(filter: Option<&str>) -> PyResult<bool> {
    let filter = EnvFilter::try_new(filter.unwrap_or("info"))
        .map_err(|e| RuleError::InvalidConfig(format!("invalid log filter: {}", e)))?;
    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok())
}

/// Register a rule and return its id
///
/// # Raises
/// ValueError if the rule does not parse, RuntimeError if `init_engine` was not called
#[pyfunction]
fn create_rule(rule: &str) -> PyResult<u64> {
    let engine = global_engine()?;
    let id = engine.read().create_rule(rule)?;
    Ok(id)
}

/// Evaluate a stored rule against a dict of field values
///
/// # Raises
/// KeyError for an unknown rule id or a missing field, TypeError for an
/// ordering comparison between a number and text
#[pyfunction]
fn evaluate_rule(rule_id: u64, data: &Bound<'_, PyDict>) -> PyResult<bool> {
    let record = extract_record(data)?;
    let engine = global_engine()?;
    let result = engine.read().evaluate_rule(rule_id, &record)?;
    Ok(result)
}

/// Evaluate a stored rule asynchronously
///
/// The evaluation runs on Tokio's blocking pool so the asyncio event loop
/// stays responsive.
///
/// # Example (Python)
/// ```python
/// ok = await evaluate_rule_async(rule_id, {"age": 35})
/// ```
#[pyfunction]
fn evaluate_rule_async<'py>(
    py: Python<'py>,
    rule_id: u64,
    data: &Bound<'py, PyDict>,
) -> PyResult<Bound<'py, PyAny>> {
    // Convert the dict and grab the engine before leaving the GIL
    let record = extract_record(data)?;
    let engine = global_engine()?;

    pyo3_async_runtimes::tokio::future_into_py(py, async move {
        let result = tokio::task::spawn_blocking(move || {
            engine
                .read()
                .evaluate_rule(rule_id, &record)
                .map_err(PyErr::from)
        })
        .await
        .map_err(|e| {
            PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!(
                "Evaluation task panicked: {}",
                e
            ))
        })??;

        Ok(result)
    })
}

/// Evaluate a stored rule against a JSON object of field values
///
/// # Raises
/// ValueError if the text is not a JSON object of strings and numbers
#[pyfunction]
fn evaluate_rule_json(rule_id: u64, data: &str) -> PyResult<bool> {
    let record = Record::from_json_str(data)?;
    let engine = global_engine()?;
    let result = engine.read().evaluate_rule(rule_id, &record)?;
    Ok(result)
}

/// Evaluate rule text directly against a dict, without storing it
///
/// Parsed rules are cached process-wide by their text.
#[pyfunction]
#[pyo3(name = "evaluate")]
fn evaluate_text(rule: &str, data: &Bound<'_, PyDict>) -> PyResult<bool> {
    let record = extract_record(data)?;
    Ok(condition::check_rule(rule, &record)?)
}

/// Parse rule text into a Rule handle
#[pyfunction]
fn parse_rule(rule: &str) -> PyResult<RuleHandle> {
    let tree = condition::get_or_parse(rule)?;
    Ok(RuleHandle::new(rule, tree))
}

/// Get a stored rule as a Rule handle
#[pyfunction]
fn get_rule(rule_id: u64) -> PyResult<RuleHandle> {
    let engine = global_engine()?;
    let guard = engine.read();
    let text = guard.rule_text(rule_id)?;
    let tree = guard.rule_tree(rule_id)?;
    Ok(RuleHandle::new(text, tree))
}

/// Number of parsed rules in the process-wide cache used by `evaluate` and `parse_rule`
#[pyfunction]
fn rule_cache_size() -> usize {
    condition::cache_size()
}

/// Drop every entry from the process-wide parse cache
#[pyfunction]
fn clear_rule_cache() {
    condition::clear_cache();
}

/// Delete a stored rule
#[pyfunction]
fn delete_rule(rule_id: u64) -> PyResult<()> {
    let engine = global_engine()?;
    engine.read().delete_rule(rule_id)?;
    Ok(())
}

// ============================================================================
// Python Module Definition
// ============================================================================

/// Python module definition
#[pymodule]
fn rule_engine_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(init_engine, m)?)?;
    m.add_function(wrap_pyfunction!(is_engine_initialized, m)?)?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;
    m.add_function(wrap_pyfunction!(create_rule, m)?)?;
    m.add_function(wrap_pyfunction!(evaluate_rule, m)?)?;
    m.add_function(wrap_pyfunction!(evaluate_rule_async, m)?)?;
    m.add_function(wrap_pyfunction!(evaluate_rule_json, m)?)?;
    m.add_function(wrap_pyfunction!(evaluate_text, m)?)?;
    m.add_function(wrap_pyfunction!(parse_rule, m)?)?;
    m.add_function(wrap_pyfunction!(get_rule, m)?)?;
    m.add_function(wrap_pyfunction!(delete_rule, m)?)?;
    m.add_function(wrap_pyfunction!(rule_cache_size, m)?)?;
    m.add_function(wrap_pyfunction!(clear_rule_cache, m)?)?;
    m.add_class::<RuleHandle>()?;
    Ok(())
}
