//! Rule evaluator

use crate::condition::ast::{Comparator, Condition, LogicalOperator, Node};
use crate::error::{Result, RuleError};
use crate::record::{Record, Scalar};
use std::cmp::Ordering;

/// Evaluate an AST against a record
pub fn evaluate(node: &Node, record: &Record) -> Result<bool> {
    match node {
        Node::Operand(cond) => check_single(cond, record),
        Node::Operator {
            operator,
            left,
            right,
        } => {
            // Both sides always run so the first error wins regardless of values
            let left = evaluate(left, record)?;
            let right = evaluate(right, record)?;
            Ok(match operator {
                LogicalOperator::And => left && right,
                LogicalOperator::Or => left || right,
            })
        }
    }
}

fn check_single(cond: &Condition, record: &Record) -> Result<bool> {
    let value = record
        .get(cond.field())
        .ok_or_else(|| RuleError::MissingField(cond.field().to_string()))?;

    compare(
        cond.field(),
        coerce_scalar(value),
        cond.comparator(),
        coerce(cond.literal()),
    )
}

/// Operand after coercion
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced<'a> {
    Integer(i64),
    Float(f64),
    Text(&'a str),
}

impl Coerced<'_> {
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Coerced::Text(_))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Coerced::Integer(_) => "integer",
            Coerced::Float(_) => "float",
            Coerced::Text(_) => "text",
        }
    }
}

/// Coerce text to an integer when it is all digits (optionally signed),
/// otherwise to a float when it parses as one, otherwise keep it as text.
/// Surrounding whitespace is ignored for the numeric attempts only.
pub fn coerce(text: &str) -> Coerced<'_> {
    let number = text.trim();
    let digits = number.strip_prefix(&['-', '+'][..]).unwrap_or(number);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(i) = number.parse::<i64>() {
            return Coerced::Integer(i);
        }
    }

    // "inf" / "nan" spellings stay text
    if number.bytes().any(|b| b.is_ascii_digit()) {
        if let Ok(f) = number.parse::<f64>() {
            return Coerced::Float(f);
        }
    }

    Coerced::Text(text)
}

/// Numbers keep their kind; text goes through [`coerce`]
pub fn coerce_scalar(value: &Scalar) -> Coerced<'_> {
    match value {
        Scalar::Integer(i) => Coerced::Integer(*i),
        Scalar::Float(f) => Coerced::Float(*f),
        Scalar::Text(s) => coerce(s),
    }
}

/// Apply a comparator to a coerced pair.
///
/// Numeric against text is unequal under `==`/`!=` and an error under
/// `>`/`<`. Integers and floats compare with each other as floats.
pub fn compare(field: &str, left: Coerced<'_>, comparator: Comparator, right: Coerced<'_>) -> Result<bool> {
    if left.is_numeric() != right.is_numeric() {
        return match comparator {
            Comparator::Equal => Ok(false),
            Comparator::NotEqual => Ok(true),
            Comparator::Greater | Comparator::Less => Err(RuleError::TypeMismatch {
                field: field.to_string(),
                comparator: comparator.as_str().to_string(),
                left: left.kind_name(),
                right: right.kind_name(),
            }),
        };
    }

    let ordering = match (left, right) {
        (Coerced::Integer(a), Coerced::Integer(b)) => Some(a.cmp(&b)),
        (Coerced::Integer(a), Coerced::Float(b)) => (a as f64).partial_cmp(&b),
        (Coerced::Float(a), Coerced::Integer(b)) => a.partial_cmp(&(b as f64)),
        (Coerced::Float(a), Coerced::Float(b)) => a.partial_cmp(&b),
        (Coerced::Text(a), Coerced::Text(b)) => Some(a.cmp(b)),
        _ => unreachable!("mixed numeric and text handled above"),
    };

    // NaN is unordered: only != holds
    let Some(ordering) = ordering else {
        return Ok(comparator == Comparator::NotEqual);
    };

    Ok(match comparator {
        Comparator::Greater => ordering == Ordering::Greater,
        Comparator::Less => ordering == Ordering::Less,
        Comparator::Equal => ordering == Ordering::Equal,
        Comparator::NotEqual => ordering != Ordering::Equal,
    })
}
