//! Input records that rules are evaluated against

use crate::error::{Result, RuleError};
use serde_json::Value;
use std::collections::HashMap;

/// Dynamically-typed scalar stored in a record
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Convert a JSON value; only strings and numbers are accepted
    pub fn from_json(value: &Value) -> Option<Scalar> {
        match value {
            Value::String(s) => Some(Scalar::Text(s.clone())),
            Value::Number(n) => n
                .as_i64()
                .map(Scalar::Integer)
                .or_else(|| n.as_f64().map(Scalar::Float)),
            _ => None,
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Integer(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Integer(v as i64)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

/// Field name to scalar mapping. Read-only during evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: HashMap<String, Scalar>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Scalar>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Scalar> {
        self.fields.get(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a record from a JSON object
    pub fn from_json(value: &Value) -> Result<Record> {
        let obj = value
            .as_object()
            .ok_or_else(|| RuleError::InvalidRecord(format!("expected a JSON object, got {}", value)))?;

        let mut record = Record::new();
        for (field, v) in obj {
            let scalar = Scalar::from_json(v).ok_or_else(|| {
                RuleError::InvalidRecord(format!(
                    "field '{}' must be a string or number, got {}",
                    field, v
                ))
            })?;
            record.fields.insert(field.clone(), scalar);
        }

        Ok(record)
    }

    /// Parse a record from JSON text
    pub fn from_json_str(text: &str) -> Result<Record> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| RuleError::InvalidRecord(e.to_string()))?;
        Record::from_json(&value)
    }
}

impl<K: Into<String>, V: Into<Scalar>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}
