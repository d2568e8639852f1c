//! Rule string parser

use crate::condition::ast::{Comparator, LogicalOperator, Node};
use crate::error::{Result, RuleError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

/// Maximum parenthesis nesting accepted by the parser
pub const MAX_NESTING_DEPTH: usize = 128;

/// Maximum depth of the built tree. A flat chain of n operators folds into a
/// left spine n levels deep, and evaluation recurses that deep.
pub const MAX_TREE_DEPTH: usize = 512;

/// `<identifier> <comparator characters> <value>`
static CONDITION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^(\w+)\s*([<>=!]+)\s*(.*)$").expect("condition pattern is valid")
});

/// Parse a rule string into an AST
pub fn parse(rule: &str) -> Result<Node> {
    let rule = rule.trim();
    if rule.is_empty() {
        return Err(RuleError::parse("empty rule", ""));
    }

    let tokens = tokenize(rule)?;
    parse_tokens(&tokens, rule, 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Text,
    And,
    Or,
    OpenParen,
    CloseParen,
}

/// Token with its byte span in the source
#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    span: Range<usize>,
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut text_start: Option<usize> = None;
    let mut quote: Option<(char, usize)> = None;
    let mut paren_depth = 0usize;
    let mut chars = source.char_indices();

    while let Some((i, c)) = chars.next() {
        if let Some((open, _)) = quote {
            if c == open {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some((c, i));
                text_start.get_or_insert(i);
            }
            '(' => {
                flush_text(source, &mut text_start, i, &mut tokens);
                paren_depth += 1;
                if paren_depth > MAX_NESTING_DEPTH {
                    return Err(RuleError::parse("parentheses nested too deeply", source));
                }
                tokens.push(Token {
                    kind: TokenKind::OpenParen,
                    span: i..i + 1,
                });
            }
            ')' => {
                flush_text(source, &mut text_start, i, &mut tokens);
                if paren_depth == 0 {
                    return Err(RuleError::parse("unbalanced parentheses", &source[..=i]));
                }
                paren_depth -= 1;
                tokens.push(Token {
                    kind: TokenKind::CloseParen,
                    span: i..i + 1,
                });
            }
            _ => {
                if let Some((kind, len)) = keyword_at(source, i) {
                    flush_text(source, &mut text_start, i, &mut tokens);
                    tokens.push(Token {
                        kind,
                        span: i..i + len,
                    });
                    // Keywords are ASCII, one char per byte
                    for _ in 1..len {
                        chars.next();
                    }
                } else if !c.is_whitespace() {
                    text_start.get_or_insert(i);
                }
            }
        }
    }

    if let Some((open, start)) = quote {
        return Err(RuleError::parse(
            format!("unterminated quote {}", open),
            &source[start..],
        ));
    }

    flush_text(source, &mut text_start, source.len(), &mut tokens);

    if paren_depth != 0 {
        return Err(RuleError::parse("unbalanced parentheses", source));
    }

    Ok(tokens)
}

/// Push the pending text run (right-trimmed) as a token
fn flush_text(source: &str, start: &mut Option<usize>, end: usize, tokens: &mut Vec<Token>) {
    if let Some(start) = start.take() {
        let end = start + source[start..end].trim_end().len();
        tokens.push(Token {
            kind: TokenKind::Text,
            span: start..end,
        });
    }
}

/// Match `AND` / `OR` at byte offset `i` as a whole word
fn keyword_at(source: &str, i: usize) -> Option<(TokenKind, usize)> {
    let rest = &source[i..];
    let (kind, len) = if rest.starts_with("AND") {
        (TokenKind::And, 3)
    } else if rest.starts_with("OR") {
        (TokenKind::Or, 2)
    } else {
        return None;
    };

    let before = source[..i].chars().next_back();
    let after = rest[len..].chars().next();
    if before.is_some_and(is_word_char) || after.is_some_and(is_word_char) {
        return None;
    }

    Some((kind, len))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn fragment<'a>(tokens: &[Token], source: &'a str) -> &'a str {
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => &source[first.span.start..last.span.end],
        _ => "",
    }
}

/// `depth` is how far below the root the node built from `tokens` will sit
fn parse_tokens(tokens: &[Token], source: &str, depth: usize) -> Result<Node> {
    if tokens.is_empty() {
        return Err(RuleError::parse("empty expression", source));
    }

    // Strip one pair of parentheses that encloses the whole list
    if encloses_all(tokens) {
        let inner = &tokens[1..tokens.len() - 1];
        if inner.is_empty() {
            return Err(RuleError::parse("empty parentheses", fragment(tokens, source)));
        }
        return parse_tokens(inner, source, depth);
    }

    // AND and OR share one precedence level; fold top-level operands left to right
    let mut paren_depth = 0usize;
    let mut segment_start = 0;
    let mut segments: Vec<&[Token]> = Vec::new();
    let mut operators: Vec<LogicalOperator> = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::OpenParen => paren_depth += 1,
            TokenKind::CloseParen => paren_depth -= 1,
            TokenKind::And | TokenKind::Or if paren_depth == 0 => {
                segments.push(&tokens[segment_start..i]);
                operators.push(if token.kind == TokenKind::And {
                    LogicalOperator::And
                } else {
                    LogicalOperator::Or
                });
                segment_start = i + 1;
            }
            _ => {}
        }
    }

    if !operators.is_empty() {
        segments.push(&tokens[segment_start..]);

        for (i, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                let operator = operators[i.saturating_sub(1)];
                return Err(RuleError::parse(
                    format!("missing operand for {}", operator),
                    fragment(tokens, source),
                ));
            }
        }

        // The first operand ends up at the bottom of the left spine
        let spine = depth + operators.len();
        if spine > MAX_TREE_DEPTH {
            return Err(RuleError::parse(
                format!("rule chains more than {} operators", MAX_TREE_DEPTH),
                fragment(tokens, source),
            ));
        }

        let mut node = parse_tokens(segments[0], source, spine)?;
        for (i, (segment, operator)) in segments[1..].iter().zip(operators).enumerate() {
            node = Node::operator(operator, node, parse_tokens(segment, source, spine - i)?);
        }
        return Ok(node);
    }

    match tokens {
        [token] if token.kind == TokenKind::Text => parse_condition(&source[token.span.clone()]),
        _ => Err(RuleError::parse(
            "unexpected token sequence",
            fragment(tokens, source),
        )),
    }
}

/// True when the first `(` closes exactly at the last token
fn encloses_all(tokens: &[Token]) -> bool {
    let last = tokens.len() - 1;
    if last == 0
        || tokens[0].kind != TokenKind::OpenParen
        || tokens[last].kind != TokenKind::CloseParen
    {
        return false;
    }

    let mut paren_depth = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::OpenParen => paren_depth += 1,
            TokenKind::CloseParen => {
                paren_depth -= 1;
                if paren_depth == 0 {
                    return i == last;
                }
            }
            _ => {}
        }
    }

    false
}

fn parse_condition(condition: &str) -> Result<Node> {
    let caps = CONDITION_PATTERN
        .captures(condition)
        .ok_or_else(|| RuleError::parse("invalid condition format", condition))?;

    let field = &caps[1];
    let symbol = &caps[2];
    let raw_value = caps[3].trim();

    let comparator = Comparator::from_symbol(symbol)
        .ok_or_else(|| RuleError::parse(format!("unknown comparator '{}'", symbol), condition))?;

    if raw_value.is_empty() {
        return Err(RuleError::parse("missing value", condition));
    }

    let literal = match unquote(raw_value) {
        Some(inner) => inner,
        None if raw_value.starts_with(['<', '>', '=', '!']) => {
            return Err(RuleError::parse(
                "unexpected comparator in value",
                condition,
            ))
        }
        None => raw_value,
    };

    Ok(Node::operand(field, comparator, literal))
}

/// Strip one pair of matching surrounding quotes
fn unquote(value: &str) -> Option<&str> {
    ['\'', '"'].into_iter().find_map(|q| {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            Some(&value[1..value.len() - 1])
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ast::NodeKind;

    fn leaf(field: &str, comparator: Comparator, literal: &str) -> Node {
        Node::operand(field, comparator, literal)
    }

    fn is_parse_error(result: Result<Node>) -> bool {
        matches!(result, Err(RuleError::Parse { .. }))
    }

    #[test]
    fn test_parse_simple_condition() {
        let ast = parse("age > 30").unwrap();
        match ast {
            Node::Operand(cond) => {
                assert_eq!(cond.field(), "age");
                assert_eq!(cond.comparator(), Comparator::Greater);
                assert_eq!(cond.literal(), "30");
            }
            _ => panic!("Expected operand"),
        }
    }

    #[test]
    fn test_parse_without_spaces() {
        assert_eq!(parse("age>30").unwrap(), leaf("age", Comparator::Greater, "30"));
        assert_eq!(parse("a==-1").unwrap(), leaf("a", Comparator::Equal, "-1"));
    }

    #[test]
    fn test_parse_all_comparators() {
        let comparators = [
            ("x > 1", Comparator::Greater),
            ("x < 1", Comparator::Less),
            ("x == 1", Comparator::Equal),
            ("x = 1", Comparator::Equal),
            ("x != 1", Comparator::NotEqual),
        ];

        for (rule, expected) in comparators {
            match parse(rule).unwrap() {
                Node::Operand(cond) => assert_eq!(cond.comparator(), expected, "Failed for: {}", rule),
                _ => panic!("Expected operand for: {}", rule),
            }
        }
    }

    #[test]
    fn test_parse_strips_quotes() {
        assert_eq!(
            parse("status == 'active'").unwrap(),
            leaf("status", Comparator::Equal, "active")
        );
        assert_eq!(
            parse("name == \"O'Brien\"").unwrap(),
            leaf("name", Comparator::Equal, "O'Brien")
        );
        assert_eq!(parse("name == ''").unwrap(), leaf("name", Comparator::Equal, ""));
    }

    #[test]
    fn test_parse_value_with_spaces() {
        assert_eq!(
            parse("city == New York").unwrap(),
            leaf("city", Comparator::Equal, "New York")
        );
    }

    #[test]
    fn test_parse_and_condition() {
        let ast = parse("a == 1 AND b == 2").unwrap();
        assert_eq!(
            ast,
            Node::operator(
                LogicalOperator::And,
                leaf("a", Comparator::Equal, "1"),
                leaf("b", Comparator::Equal, "2"),
            )
        );
    }

    #[test]
    fn test_parse_is_left_to_right() {
        // No precedence: a AND b OR c groups as (a AND b) OR c
        let ast = parse("a==1 AND b==1 OR c==1").unwrap();
        assert_eq!(
            ast,
            Node::operator(
                LogicalOperator::Or,
                Node::operator(
                    LogicalOperator::And,
                    leaf("a", Comparator::Equal, "1"),
                    leaf("b", Comparator::Equal, "1"),
                ),
                leaf("c", Comparator::Equal, "1"),
            )
        );

        // ...and a OR b AND c as (a OR b) AND c
        match parse("a==1 OR b==1 AND c==1").unwrap() {
            Node::Operator { operator, left, .. } => {
                assert_eq!(operator, LogicalOperator::And);
                assert_eq!(left.kind(), NodeKind::Operator);
            }
            _ => panic!("Expected operator"),
        }
    }

    #[test]
    fn test_parse_parenthesized_group() {
        let ast = parse("a==1 AND (b==1 OR c==1)").unwrap();
        match ast {
            Node::Operator {
                operator,
                left,
                right,
            } => {
                assert_eq!(operator, LogicalOperator::And);
                assert_eq!(left.kind(), NodeKind::Operand);
                match *right {
                    Node::Operator { operator, .. } => assert_eq!(operator, LogicalOperator::Or),
                    _ => panic!("Expected OR inside parentheses"),
                }
            }
            _ => panic!("Expected AND"),
        }
    }

    #[test]
    fn test_parse_outer_parentheses() {
        assert_eq!(parse("((age > 30))").unwrap(), parse("age > 30").unwrap());
    }

    #[test]
    fn test_outer_parentheses_checked_for_balance() {
        // First and last characters are parentheses but do not pair up
        let ast = parse("(a > 1) AND (b > 2)").unwrap();
        assert_eq!(
            ast,
            Node::operator(
                LogicalOperator::And,
                leaf("a", Comparator::Greater, "1"),
                leaf("b", Comparator::Greater, "2"),
            )
        );
    }

    #[test]
    fn test_keywords_need_word_boundaries() {
        assert_eq!(parse("GRAND > 5").unwrap(), leaf("GRAND", Comparator::Greater, "5"));
        assert_eq!(
            parse("color == ORANGE").unwrap(),
            leaf("color", Comparator::Equal, "ORANGE")
        );
        assert_eq!(parse("ORDER_ID == 7").unwrap(), leaf("ORDER_ID", Comparator::Equal, "7"));
    }

    #[test]
    fn test_keywords_inside_quotes_are_text() {
        assert_eq!(
            parse("title == 'Salt AND Pepper (2nd)'").unwrap(),
            leaf("title", Comparator::Equal, "Salt AND Pepper (2nd)")
        );
    }

    #[test]
    fn test_parse_keyword_next_to_parenthesis() {
        let ast = parse("(a>1)AND(b>2)").unwrap();
        assert_eq!(ast.condition_count(), 2);
    }

    #[test]
    fn test_parse_errors() {
        assert!(is_parse_error(parse("")));
        assert!(is_parse_error(parse("   ")));
        assert!(is_parse_error(parse("age >> 30")));
        assert!(is_parse_error(parse("age >= 30")));
        assert!(is_parse_error(parse("(age > 30")));
        assert!(is_parse_error(parse("age > 30)")));
        assert!(is_parse_error(parse("age > 30 AND")));
        assert!(is_parse_error(parse("OR age > 30")));
        assert!(is_parse_error(parse("a > 1 AND OR b > 2")));
        assert!(is_parse_error(parse("()")));
        assert!(is_parse_error(parse("age")));
        assert!(is_parse_error(parse("age >")));
        assert!(is_parse_error(parse("age > > 30")));
        assert!(is_parse_error(parse("name == 'open")));
        assert!(is_parse_error(parse("(a > 1) (b > 2)")));
    }

    #[test]
    fn test_parse_error_names_fragment() {
        match parse("a == 1 AND age >> 30") {
            Err(RuleError::Parse { message, fragment }) => {
                assert!(message.contains(">>"), "message was: {}", message);
                assert_eq!(fragment, "age >> 30");
            }
            other => panic!("Expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}a > 1{}", "(".repeat(MAX_NESTING_DEPTH + 1), ")".repeat(MAX_NESTING_DEPTH + 1));
        assert!(is_parse_error(parse(&deep)));

        let ok = format!("{}a > 1{}", "(".repeat(MAX_NESTING_DEPTH), ")".repeat(MAX_NESTING_DEPTH));
        assert!(parse(&ok).is_ok());
    }

    #[test]
    fn test_long_chain_rejected() {
        let rule = vec!["a == 1"; 100_000].join(" AND ");
        match parse(&rule) {
            Err(RuleError::Parse { message, .. }) => assert!(message.contains("operators")),
            other => panic!("Expected parse error, got ok={}", other.is_ok()),
        }
    }

    #[test]
    fn test_tree_depth_limit() {
        use crate::condition::evaluator::evaluate;
        use crate::record::Record;

        // MAX_TREE_DEPTH operators is the deepest chain accepted
        let rule = vec!["a == 1"; MAX_TREE_DEPTH + 1].join(" OR ");
        let tree = parse(&rule).unwrap();
        assert_eq!(tree.condition_count(), MAX_TREE_DEPTH + 1);
        assert!(evaluate(&tree, &Record::new().with("a", 1)).unwrap());
        assert_eq!(parse(&tree.to_string()).unwrap(), tree);
        assert_eq!(Node::from_json(&tree.to_json()).unwrap(), tree);

        let rule = vec!["a == 1"; MAX_TREE_DEPTH + 2].join(" OR ");
        assert!(is_parse_error(parse(&rule)));

        // Redundant parentheses add no depth, a grouped right operand does
        let rule = format!("({})", vec!["a == 1"; MAX_TREE_DEPTH + 1].join(" AND "));
        assert!(parse(&rule).is_ok());
        let rule = format!("b == 2 OR ({})", vec!["a == 1"; MAX_TREE_DEPTH].join(" AND "));
        assert!(parse(&rule).is_ok());
        let rule = format!("b == 2 OR ({})", vec!["a == 1"; MAX_TREE_DEPTH + 1].join(" AND "));
        assert!(is_parse_error(parse(&rule)));
    }

    #[test]
    fn test_parse_complex_condition() {
        let ast = parse("age > 30 AND status == 'active' AND (tier == 'gold' OR spend > 1000.5)").unwrap();
        assert_eq!(ast.condition_count(), 4);
        assert_eq!(ast.fields(), vec!["age", "status", "tier", "spend"]);
    }
}
