//! The query model: an immutable filter expression tree.
//!
//! Every node renders a canonical definition string. Definitions drive
//! equality and parse back into an equal tree:
//!
//! ```text
//! field = value        field <> value       field LIKE value
//! field > value        field >= value       field IN (v1,v2)
//! field < value        field <= value       NOT (expr)
//! left AND right       left OR right
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::Value;

/// A dotted field path such as `name` or `relation.field`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef(String);

impl FieldRef {
    /// Creates a field reference.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The full dotted path.
    pub fn path(&self) -> &str {
        &self.0
    }

    /// The path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An operand of an [`Query::InList`] node.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A field reference.
    Field(FieldRef),
    /// A literal value.
    Value(Value),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Field(field) => write!(f, "{}", field),
            Operand::Value(value) => write!(f, "{}", value),
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    /// `=`
    EqualTo,
    /// `<>` (also parsed from `!=`)
    NotEqualTo,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterOrEqual,
    /// `<`
    LowerThan,
    /// `<=`
    LowerOrEqual,
    /// `LIKE`
    Like,
}

impl ComparisonOp {
    /// The operator as written in a definition.
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOp::EqualTo => "=",
            ComparisonOp::NotEqualTo => "<>",
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::GreaterOrEqual => ">=",
            ComparisonOp::LowerThan => "<",
            ComparisonOp::LowerOrEqual => "<=",
            ComparisonOp::Like => "LIKE",
        }
    }

    /// Returns true for `>`, `>=`, `<` and `<=`.
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            ComparisonOp::GreaterThan
                | ComparisonOp::GreaterOrEqual
                | ComparisonOp::LowerThan
                | ComparisonOp::LowerOrEqual
        )
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A filter expression.
///
/// Two queries are equal when their definitions are equal, so a tree built
/// with [`field`](crate::query::field) compares equal to the same expression
/// parsed from text.
#[derive(Debug, Clone)]
pub enum Query {
    /// Both operands hold.
    And(Box<Query>, Box<Query>),
    /// Either operand holds.
    Or(Box<Query>, Box<Query>),
    /// The operand does not hold.
    Not(Box<Query>),
    /// `field <op> value`.
    Comparison {
        /// Compared field.
        field: FieldRef,
        /// Operator.
        op: ComparisonOp,
        /// Literal operand.
        value: Value,
    },
    /// `field IN (v1,v2,...)`: a leading field followed by values.
    InList(Vec<Operand>),
}

impl Query {
    /// Creates a comparison.
    pub fn comparison(field: impl Into<String>, op: ComparisonOp, value: impl Into<Value>) -> Self {
        Query::Comparison {
            field: FieldRef::new(field),
            op,
            value: value.into(),
        }
    }

    /// Creates a well-formed `IN` list.
    pub fn in_list<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut operands = vec![Operand::Field(FieldRef::new(field))];
        operands.extend(values.into_iter().map(|v| Operand::Value(v.into())));
        Query::InList(operands)
    }

    /// Combines with `other` using AND.
    pub fn and(self, other: Query) -> Query {
        Query::And(Box::new(self), Box::new(other))
    }

    /// Combines with `other` using OR.
    pub fn or(self, other: Query) -> Query {
        Query::Or(Box::new(self), Box::new(other))
    }

    /// Negates this query.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Query {
        Query::Not(Box::new(self))
    }

    /// The canonical definition string.
    pub fn definition(&self) -> String {
        self.to_string()
    }

    /// Parses filter text, returning `None` when it is malformed.
    pub fn parse(text: &str) -> Option<Query> {
        super::parser::QueryParser::parse(text).ok()
    }

    fn write_child(&self, f: &mut fmt::Formatter<'_>, parenthesize: bool) -> fmt::Result {
        if parenthesize {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // AND binds tighter than OR and both associate left, so only
            // children that would regroup on reparse get parentheses.
            Query::And(left, right) => {
                left.write_child(f, matches!(**left, Query::Or(..)))?;
                write!(f, " AND ")?;
                right.write_child(f, matches!(**right, Query::Or(..) | Query::And(..)))
            }
            Query::Or(left, right) => {
                left.write_child(f, false)?;
                write!(f, " OR ")?;
                right.write_child(f, matches!(**right, Query::Or(..)))
            }
            Query::Not(inner) => write!(f, "NOT ({})", inner),
            Query::Comparison { field, op, value } => write!(f, "{} {} {}", field, op, value),
            Query::InList(operands) => {
                let mut iter = operands.iter();
                if let Some(first) = iter.next() {
                    write!(f, "{} ", first)?;
                }
                let values: Vec<String> = iter.map(ToString::to_string).collect();
                write!(f, "IN ({})", values.join(","))
            }
        }
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        self.definition() == other.definition()
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.definition())
    }
}

impl<'de> Deserialize<'de> for Query {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parser::QueryParser::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_definitions() {
        let cases = [
            (ComparisonOp::EqualTo, "name = a"),
            (ComparisonOp::NotEqualTo, "name <> a"),
            (ComparisonOp::GreaterThan, "name > a"),
            (ComparisonOp::GreaterOrEqual, "name >= a"),
            (ComparisonOp::LowerThan, "name < a"),
            (ComparisonOp::LowerOrEqual, "name <= a"),
            (ComparisonOp::Like, "name LIKE a"),
        ];
        for (op, expected) in cases {
            assert_eq!(Query::comparison("name", op, "a").definition(), expected);
        }
    }

    #[test]
    fn test_logical_definitions() {
        let a = Query::comparison("a", ComparisonOp::EqualTo, 1);
        let b = Query::comparison("b", ComparisonOp::EqualTo, 2);
        let c = Query::comparison("c", ComparisonOp::EqualTo, 3);

        assert_eq!(a.clone().and(b.clone()).definition(), "a = 1 AND b = 2");
        assert_eq!(a.clone().or(b.clone()).definition(), "a = 1 OR b = 2");
        assert_eq!(a.clone().not().definition(), "NOT (a = 1)");
        assert_eq!(
            a.clone().or(b.clone()).and(c.clone()).definition(),
            "(a = 1 OR b = 2) AND c = 3"
        );
        assert_eq!(
            a.clone().and(b.clone()).or(c.clone()).definition(),
            "a = 1 AND b = 2 OR c = 3"
        );
        assert_eq!(
            a.clone().or(b.clone().or(c)).definition(),
            "a = 1 OR (b = 2 OR c = 3)"
        );
    }

    #[test]
    fn test_in_list_definition() {
        let query = Query::in_list("id", [1_i64, 2, 3]);
        assert_eq!(query.definition(), "id IN (1,2,3)");
    }

    #[test]
    fn test_equality_is_definition_equality() {
        let typed = Query::comparison("count", ComparisonOp::EqualTo, 10);
        let textual = Query::comparison("count", ComparisonOp::EqualTo, "10");
        assert_eq!(typed, textual);
        assert_ne!(typed, Query::comparison("count", ComparisonOp::EqualTo, 11));
    }

    #[test]
    fn test_serde_uses_definition() {
        let query = Query::comparison("uniqueField", ComparisonOp::EqualTo, "a")
            .or(Query::comparison("uniqueField", ComparisonOp::EqualTo, "b"));
        let json = serde_json::to_string(&query).unwrap();
        assert_eq!(json, "\"uniqueField = a OR uniqueField = b\"");

        let back: Query = serde_json::from_str(&json).unwrap();
        assert_eq!(back, query);

        assert!(serde_json::from_str::<Query>("\"-@das\"").is_err());
    }
}
