//! Rule - parsed rule handle for the Python-Rust boundary
//!
//! Holds the parsed tree in Rust memory so Python can evaluate it repeatedly
//! without re-parsing, and converts Python dicts into records.

use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDict, PyFloat, PyInt, PyString};
use std::sync::Arc;

use crate::condition::{evaluate, Node};
use crate::error::RuleError;
use crate::record::{Record, Scalar};

// ============================================================================
// Helper Functions
// ============================================================================

/// Build a record from a Python dict of str -> str | int | float
pub fn extract_record(data: &Bound<'_, PyDict>) -> PyResult<Record> {
    let mut record = Record::new();
    for (key, value) in data.iter() {
        let field: String = key.extract()?;
        let scalar = extract_scalar(&field, &value)?;
        record.insert(field, scalar);
    }
    Ok(record)
}

fn extract_scalar(field: &str, value: &Bound<'_, PyAny>) -> PyResult<Scalar> {
    // bool is a subclass of int, reject it before the int check
    if value.is_instance_of::<PyBool>() {
        return Err(invalid_value(field, "bool"));
    }
    if value.is_instance_of::<PyString>() {
        return Ok(Scalar::Text(value.extract()?));
    }
    if value.is_instance_of::<PyInt>() {
        let i: i64 = value
            .extract()
            .map_err(|_| RuleError::InvalidRecord(format!("field '{}' does not fit in 64 bits", field)))?;
        return Ok(Scalar::Integer(i));
    }
    if value.is_instance_of::<PyFloat>() {
        return Ok(Scalar::Float(value.extract()?));
    }

    let type_name = value
        .get_type()
        .name()
        .map(|n| n.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    Err(invalid_value(field, &type_name))
}

fn invalid_value(field: &str, type_name: &str) -> PyErr {
    RuleError::InvalidRecord(format!(
        "field '{}' must be str, int or float, got {}",
        field, type_name
    ))
    .into()
}

/// Convert a tree to nested dicts: {"type", "left", "right", "value"}
pub fn node_to_dict<'py>(py: Python<'py>, node: &Node) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    match node {
        Node::Operator {
            operator,
            left,
            right,
        } => {
            dict.set_item("type", "operator")?;
            dict.set_item("left", node_to_dict(py, left)?)?;
            dict.set_item("right", node_to_dict(py, right)?)?;
            dict.set_item("value", operator.as_str())?;
        }
        Node::Operand(cond) => {
            dict.set_item("type", "operand")?;
            dict.set_item("left", py.None())?;
            dict.set_item("right", py.None())?;
            dict.set_item(
                "value",
                (cond.field(), cond.comparator().as_str(), cond.literal()),
            )?;
        }
    }
    Ok(dict)
}

// ============================================================================
// Rule PyClass
// ============================================================================

/// Parsed rule handle.
///
/// The tree is shared through `Arc`, so handles from the parse cache are cheap
/// and safe to use from several threads.
#[pyclass(name = "Rule", frozen)]
pub struct RuleHandle {
    source: String,
    tree: Arc<Node>,
}

impl RuleHandle {
    pub fn new(source: impl Into<String>, tree: Arc<Node>) -> Self {
        Self {
            source: source.into(),
            tree,
        }
    }
}

#[pymethods]
impl RuleHandle {
    /// Rebuild a rule from the JSON produced by `to_json`
    #[staticmethod]
    fn from_json(text: &str) -> PyResult<Self> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| RuleError::InvalidTree(e.to_string()))?;
        let tree = Node::from_json(&value)?;
        Ok(Self::new(tree.to_string(), Arc::new(tree)))
    }

    /// Rule text this handle was parsed from
    #[getter]
    fn source(&self) -> &str {
        &self.source
    }

    /// Number of leaf conditions
    #[getter]
    fn condition_count(&self) -> usize {
        self.tree.condition_count()
    }

    /// Field names referenced by the rule, in order
    #[getter]
    fn fields(&self) -> Vec<String> {
        self.tree.fields().into_iter().map(str::to_string).collect()
    }

    /// Evaluate against a dict of field values
    fn evaluate(&self, data: &Bound<'_, PyDict>) -> PyResult<bool> {
        let record = extract_record(data)?;
        Ok(evaluate(&self.tree, &record)?)
    }

    /// Tree as nested dicts
    fn to_dict<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        node_to_dict(py, &self.tree)
    }

    /// Tree as a JSON string
    fn to_json(&self) -> String {
        self.tree.to_json().to_string()
    }

    /// Canonical rule text
    fn __str__(&self) -> String {
        self.tree.to_string()
    }

    fn __repr__(&self) -> String {
        format!("Rule({:?})", self.tree.to_string())
    }
}
