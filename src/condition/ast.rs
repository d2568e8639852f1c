//! Abstract Syntax Tree for rule expressions

use crate::error::{Result, RuleError};
use serde_json::{json, Value};
use std::fmt;

/// AST node for rule expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Binary logical operation, e.g. "a > 1 AND b < 2"
    Operator {
        operator: LogicalOperator,
        left: Box<Node>,
        right: Box<Node>,
    },
    /// Single condition like "age > 30"
    Operand(Condition),
}

/// Node kind, as exposed in the serialized form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Operator,
    Operand,
}

/// Logical operators joining two subtrees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// Greater than (>)
    Greater,
    /// Less than (<)
    Less,
    /// Equal (== or =)
    Equal,
    /// Not equal (!=)
    NotEqual,
}

/// Single `field comparator literal` condition.
///
/// The literal is kept as written (minus surrounding quotes); typing happens
/// at evaluation time.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    field: String,
    comparator: Comparator,
    literal: String,
}

impl Condition {
    pub fn new(field: impl Into<String>, comparator: Comparator, literal: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            comparator,
            literal: literal.into(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    pub fn literal(&self) -> &str {
        &self.literal
    }
}

impl LogicalOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }

    /// Look up an operator keyword
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "AND" => Some(LogicalOperator::And),
            "OR" => Some(LogicalOperator::Or),
            _ => None,
        }
    }
}

impl Comparator {
    pub fn as_str(self) -> &'static str {
        match self {
            Comparator::Greater => ">",
            Comparator::Less => "<",
            Comparator::Equal => "==",
            Comparator::NotEqual => "!=",
        }
    }

    /// Look up a comparator symbol. A bare `=` reads as `==`.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            ">" => Some(Comparator::Greater),
            "<" => Some(Comparator::Less),
            "==" | "=" => Some(Comparator::Equal),
            "!=" => Some(Comparator::NotEqual),
            _ => None,
        }
    }
}

impl Node {
    /// Build an operator node
    pub fn operator(operator: LogicalOperator, left: Node, right: Node) -> Self {
        Node::Operator {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Build a leaf node
    pub fn operand(field: impl Into<String>, comparator: Comparator, literal: impl Into<String>) -> Self {
        Node::Operand(Condition::new(field, comparator, literal))
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Operator { .. } => NodeKind::Operator,
            Node::Operand(_) => NodeKind::Operand,
        }
    }

    /// Number of leaf conditions in the tree
    pub fn condition_count(&self) -> usize {
        match self {
            Node::Operator { left, right, .. } => left.condition_count() + right.condition_count(),
            Node::Operand(_) => 1,
        }
    }

    /// Field names referenced by the tree, left to right, duplicates included
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Node::Operator { left, right, .. } => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
            Node::Operand(cond) => out.push(cond.field()),
        }
    }

    /// Serialize into the dictionary shape used by the rule API:
    /// `{"type", "left", "right", "value"}`
    pub fn to_json(&self) -> Value {
        match self {
            Node::Operator {
                operator,
                left,
                right,
            } => json!({
                "type": "operator",
                "left": left.to_json(),
                "right": right.to_json(),
                "value": operator.as_str(),
            }),
            Node::Operand(cond) => json!({
                "type": "operand",
                "left": Value::Null,
                "right": Value::Null,
                "value": [cond.field, cond.comparator.as_str(), cond.literal],
            }),
        }
    }

    /// Rebuild a tree from the shape produced by [`Node::to_json`]
    pub fn from_json(value: &Value) -> Result<Node> {
        let obj = value
            .as_object()
            .ok_or_else(|| RuleError::InvalidTree(format!("expected object, got {}", value)))?;

        let node_type = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| RuleError::InvalidTree("missing node type".to_string()))?;

        match node_type {
            "operator" => {
                let keyword = obj
                    .get("value")
                    .and_then(Value::as_str)
                    .ok_or_else(|| RuleError::InvalidTree("operator without value".to_string()))?;
                let operator = LogicalOperator::from_keyword(keyword)
                    .ok_or_else(|| RuleError::UnknownOperator(keyword.to_string()))?;

                let child = |name: &str| -> Result<Node> {
                    match obj.get(name) {
                        Some(v) if !v.is_null() => Node::from_json(v),
                        _ => Err(RuleError::InvalidTree(format!(
                            "{} operator without {} child",
                            keyword, name
                        ))),
                    }
                };

                Ok(Node::operator(operator, child("left")?, child("right")?))
            }
            "operand" => {
                let parts = obj
                    .get("value")
                    .and_then(Value::as_array)
                    .filter(|parts| parts.len() == 3)
                    .ok_or_else(|| {
                        RuleError::InvalidTree("operand value must be [field, comparator, literal]".to_string())
                    })?;

                let field = operand_part(parts, 0)?;
                let symbol = operand_part(parts, 1)?;
                let comparator = Comparator::from_symbol(symbol)
                    .ok_or_else(|| RuleError::UnknownComparator(symbol.to_string()))?;

                Ok(Node::operand(field, comparator, operand_part(parts, 2)?))
            }
            other => Err(RuleError::InvalidTree(format!("unknown node type: {}", other))),
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ", self.field, self.comparator)?;
        if is_bare_number(&self.literal) {
            f.write_str(&self.literal)
        } else if self.literal.contains('\'') {
            write!(f, "\"{}\"", self.literal)
        } else {
            write!(f, "'{}'", self.literal)
        }
    }
}

/// Canonical text form. Re-parsing it yields an equal tree.
///
/// Left-hand operator children are written bare and right-hand ones in
/// parentheses, so `a AND (b OR c)` and `a AND b OR c` stay distinct.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Operator {
                operator,
                left,
                right,
            } => {
                // Chains fold left to right, so only a right-hand operator needs grouping
                write!(f, "{} {} ", left, operator)?;
                write_child(f, right)
            }
            Node::Operand(cond) => write!(f, "{}", cond),
        }
    }
}

fn operand_part(parts: &[Value], index: usize) -> Result<&str> {
    parts[index]
        .as_str()
        .ok_or_else(|| RuleError::InvalidTree(format!("operand part {} is not a string", index)))
}

fn write_child(f: &mut fmt::Formatter<'_>, node: &Node) -> fmt::Result {
    match node {
        Node::Operator { .. } => write!(f, "({})", node),
        Node::Operand(_) => write!(f, "{}", node),
    }
}

/// Literal that can be written without quotes: optional sign, digits and at
/// most one decimal point
fn is_bare_number(literal: &str) -> bool {
    let digits = literal.strip_prefix(&['-', '+'][..]).unwrap_or(literal);
    !digits.is_empty()
        && digits.bytes().any(|b| b.is_ascii_digit())
        && digits.bytes().all(|b| b.is_ascii_digit() || b == b'.')
        && digits.bytes().filter(|&b| b == b'.').count() <= 1
}
