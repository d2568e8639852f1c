//! Error types for the rule engine

use pyo3::exceptions::{PyKeyError, PyRuntimeError, PyTypeError, PyValueError};
use pyo3::PyErr;
use thiserror::Error;

/// Main error type for the rule engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error("Parse error: {message}: '{fragment}'")]
    Parse { message: String, fragment: String },

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Type mismatch: cannot compare {left} {comparator} {right} for field '{field}'")]
    TypeMismatch {
        field: String,
        comparator: String,
        left: &'static str,
        right: &'static str,
    },

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Unknown comparator: {0}")]
    UnknownComparator(String),

    #[error("Invalid tree: {0}")]
    InvalidTree(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Rule not found: {0}")]
    RuleNotFound(u64),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Engine not initialized. Call init_engine() first.")]
    EngineNotInitialized,
}

impl RuleError {
    /// Build a parse error naming the offending fragment
    pub fn parse(message: impl Into<String>, fragment: impl Into<String>) -> Self {
        RuleError::Parse {
            message: message.into(),
            fragment: fragment.into(),
        }
    }
}

impl From<RuleError> for PyErr {
    fn from(err: RuleError) -> PyErr {
        let msg = err.to_string();
        match err {
            RuleError::Parse { .. }
            | RuleError::InvalidRecord(_)
            | RuleError::InvalidTree(_)
            | RuleError::InvalidConfig(_) => PyValueError::new_err(msg),
            RuleError::MissingField(_) | RuleError::RuleNotFound(_) => PyKeyError::new_err(msg),
            RuleError::TypeMismatch { .. } => PyTypeError::new_err(msg),
            RuleError::UnknownOperator(_)
            | RuleError::UnknownComparator(_)
            | RuleError::EngineNotInitialized => PyRuntimeError::new_err(msg),
        }
    }
}

/// Result type alias for the rule engine
pub type Result<T> = std::result::Result<T, RuleError>;
