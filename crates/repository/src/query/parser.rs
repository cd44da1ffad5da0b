//! Filter text parser.
//!
//! # Grammar
//!
//! ```text
//! filter      = orExpr
//! orExpr      = andExpr ("OR" andExpr)*
//! andExpr     = notExpr ("AND" notExpr)*
//! notExpr     = "NOT" primary / primary
//! primary     = "(" orExpr ")" / comparison
//! comparison  = field op value / field "IN" "(" value ("," value)* ")"
//! op          = "=" / "!=" / "<>" / ">" / ">=" / "<" / "<=" / "LIKE"
//! field       = ident ("." ident)*
//! value       = quoted / "null" / unquoted
//! ```
//!
//! Keywords are case-insensitive. An unquoted `null` is the null literal;
//! every other literal is kept as text and the predicate compiler coerces it
//! to the field type.
//!
//! # Example
//!
//! ```
//! use helios_repository::query::{QueryParser, field};
//!
//! let parsed = QueryParser::parse("uniqueField=a OR uniqueField=a1").unwrap();
//! let built = field("uniqueField").equal_to("a").or(field("uniqueField").equal_to("a1"));
//! assert_eq!(parsed, built);
//! ```

use super::model::{ComparisonOp, FieldRef, Operand, Query};
use crate::types::Value;

/// Filter parsing error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParseError {
    /// What went wrong.
    pub message: String,
    /// Byte offset in the input.
    pub position: usize,
}

impl std::fmt::Display for QueryParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Filter parse error at position {}: {}",
            self.position, self.message
        )
    }
}

impl std::error::Error for QueryParseError {}

/// Parser for filter text.
pub struct QueryParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> QueryParser<'a> {
    /// Creates a new parser.
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Parses the entire filter text.
    pub fn parse(input: &str) -> Result<Query, QueryParseError> {
        let mut parser = QueryParser::new(input);
        let query = parser.parse_or_expr()?;
        parser.skip_whitespace();
        if parser.pos < parser.input.len() {
            return Err(parser.error(format!(
                "Unexpected characters after expression: '{}'",
                &parser.input[parser.pos..]
            )));
        }
        Ok(query)
    }

    fn error(&self, message: impl Into<String>) -> QueryParseError {
        QueryParseError {
            message: message.into(),
            position: self.pos,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn consume(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn consume_str(&mut self, s: &str) -> bool {
        if self.input[self.pos..].starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    /// Checks if the input continues with an ASCII keyword (case-insensitive).
    fn starts_with_ci(&self, keyword: &str) -> bool {
        self.input
            .get(self.pos..self.pos + keyword.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(keyword))
    }

    fn is_word_boundary(&self, offset: usize) -> bool {
        match self.input.get(self.pos + offset..).and_then(|rest| rest.chars().next()) {
            Some(c) => !c.is_alphanumeric() && c != '_',
            None => true,
        }
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if self.starts_with_ci(keyword) && self.is_word_boundary(keyword.len()) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    /// Parses an OR expression (lowest precedence).
    fn parse_or_expr(&mut self) -> Result<Query, QueryParseError> {
        let mut left = self.parse_and_expr()?;

        loop {
            self.skip_whitespace();
            if self.consume_keyword("or") {
                let right = self.parse_and_expr()?;
                left = left.or(right);
            } else {
                break;
            }
        }

        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Query, QueryParseError> {
        let mut left = self.parse_not_expr()?;

        loop {
            self.skip_whitespace();
            if self.consume_keyword("and") {
                let right = self.parse_not_expr()?;
                left = left.and(right);
            } else {
                break;
            }
        }

        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Query, QueryParseError> {
        self.skip_whitespace();
        if self.consume_keyword("not") {
            let inner = self.parse_primary()?;
            Ok(inner.not())
        } else {
            self.parse_primary()
        }
    }

    fn parse_primary(&mut self) -> Result<Query, QueryParseError> {
        self.skip_whitespace();

        if self.peek() == Some('(') {
            self.consume();
            let query = self.parse_or_expr()?;
            self.skip_whitespace();
            if self.consume() != Some(')') {
                return Err(self.error("Expected closing parenthesis"));
            }
            Ok(query)
        } else {
            self.parse_comparison()
        }
    }

    /// Parses `field op value` or `field IN (...)`.
    fn parse_comparison(&mut self) -> Result<Query, QueryParseError> {
        let field = self.parse_field()?;
        self.skip_whitespace();

        if self.consume_keyword("in") {
            let values = self.parse_value_list()?;
            let mut operands = vec![Operand::Field(field)];
            operands.extend(values.into_iter().map(Operand::Value));
            return Ok(Query::InList(operands));
        }

        let op = self.parse_operator()?;
        self.skip_whitespace();
        let value = self.parse_value()?;

        Ok(Query::Comparison { field, op, value })
    }

    fn parse_field(&mut self) -> Result<FieldRef, QueryParseError> {
        let start = self.pos;
        let mut expect_ident_start = true;

        while let Some(c) = self.peek() {
            if expect_ident_start {
                if !(c.is_alphabetic() || c == '_') {
                    break;
                }
                expect_ident_start = false;
            } else if c == '.' {
                expect_ident_start = true;
            } else if !(c.is_alphanumeric() || c == '_') {
                break;
            }
            self.consume();
        }

        if self.pos == start {
            return Err(self.error("Expected field name"));
        }
        if expect_ident_start {
            return Err(self.error("Field path cannot end with '.'"));
        }
        Ok(FieldRef::new(&self.input[start..self.pos]))
    }

    fn parse_operator(&mut self) -> Result<ComparisonOp, QueryParseError> {
        // Two-character operators first so ">=" is not read as ">".
        let op = if self.consume_str(">=") {
            ComparisonOp::GreaterOrEqual
        } else if self.consume_str("<=") {
            ComparisonOp::LowerOrEqual
        } else if self.consume_str("<>") || self.consume_str("!=") {
            ComparisonOp::NotEqualTo
        } else if self.consume_str("=") {
            ComparisonOp::EqualTo
        } else if self.consume_str(">") {
            ComparisonOp::GreaterThan
        } else if self.consume_str("<") {
            ComparisonOp::LowerThan
        } else if self.consume_keyword("like") {
            ComparisonOp::Like
        } else {
            return Err(self.error("Expected comparison operator"));
        };
        Ok(op)
    }

    fn parse_value_list(&mut self) -> Result<Vec<Value>, QueryParseError> {
        self.skip_whitespace();
        if self.consume() != Some('(') {
            return Err(self.error("Expected '(' after IN"));
        }

        let mut values = Vec::new();
        loop {
            self.skip_whitespace();
            values.push(self.parse_value()?);
            self.skip_whitespace();
            match self.consume() {
                Some(',') => continue,
                Some(')') => break,
                _ => return Err(self.error("Expected ',' or ')' in IN list")),
            }
        }
        Ok(values)
    }

    fn parse_value(&mut self) -> Result<Value, QueryParseError> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => self.parse_quoted(quote).map(Value::Text),
            _ => {
                let literal = self.parse_unquoted()?;
                if literal.eq_ignore_ascii_case("null") {
                    Ok(Value::Null)
                } else {
                    Ok(Value::Text(literal))
                }
            }
        }
    }

    fn parse_quoted(&mut self, quote: char) -> Result<String, QueryParseError> {
        self.consume();
        let mut value = String::new();

        loop {
            match self.consume() {
                Some(c) if c == quote => break,
                Some('\\') => match self.consume() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some(escaped @ ('"' | '\'' | '\\')) => value.push(escaped),
                    Some(other) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => return Err(self.error("Unterminated string")),
                },
                Some(c) => value.push(c),
                None => return Err(self.error("Unterminated string")),
            }
        }

        Ok(value)
    }

    /// Reads up to whitespace, a parenthesis or a comma.
    fn parse_unquoted(&mut self) -> Result<String, QueryParseError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, '(' | ')' | ',') {
                break;
            }
            self.consume();
        }

        if self.pos == start {
            return Err(self.error("Expected value"));
        }
        Ok(self.input[start..self.pos].to_string())
    }
}
