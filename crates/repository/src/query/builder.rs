//! Fluent query construction.

use super::model::{ComparisonOp, FieldRef, Query};
use super::parser::QueryParser;
use crate::types::Value;

/// Starts a query on `name`.
///
/// ```
/// use helios_repository::query::field;
///
/// let query = field("numberField").greater_than(10).and(field("name").like("a%"));
/// assert_eq!(query.definition(), "numberField > 10 AND name LIKE a%");
/// ```
pub fn field(name: impl Into<String>) -> FieldBuilder {
    FieldBuilder {
        field: FieldRef::new(name),
    }
}

/// Entry point handed out by repositories for building filters.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryBuilder;

impl QueryBuilder {
    /// Creates a query builder.
    pub fn new() -> Self {
        Self
    }

    /// Starts a query on `name`.
    pub fn field(&self, name: impl Into<String>) -> FieldBuilder {
        field(name)
    }

    /// Parses filter text, returning `None` when it is malformed.
    pub fn create_query_filter(&self, text: &str) -> Option<Query> {
        match QueryParser::parse(text) {
            Ok(query) => Some(query),
            Err(e) => {
                tracing::debug!(filter = text, error = %e, "Discarding malformed filter");
                None
            }
        }
    }
}

/// A builder positioned on a field reference.
#[derive(Debug, Clone)]
pub struct FieldBuilder {
    field: FieldRef,
}

impl FieldBuilder {
    fn compare(self, op: ComparisonOp, value: impl Into<Value>) -> Query {
        Query::Comparison {
            field: self.field,
            op,
            value: value.into(),
        }
    }

    /// `field = value`
    pub fn equal_to(self, value: impl Into<Value>) -> Query {
        self.compare(ComparisonOp::EqualTo, value)
    }

    /// `field <> value`
    pub fn not_equal_to(self, value: impl Into<Value>) -> Query {
        self.compare(ComparisonOp::NotEqualTo, value)
    }

    /// `field > value`
    pub fn greater_than(self, value: impl Into<Value>) -> Query {
        self.compare(ComparisonOp::GreaterThan, value)
    }

    /// `field >= value`
    pub fn greater_or_equal(self, value: impl Into<Value>) -> Query {
        self.compare(ComparisonOp::GreaterOrEqual, value)
    }

    /// `field < value`
    pub fn lower_than(self, value: impl Into<Value>) -> Query {
        self.compare(ComparisonOp::LowerThan, value)
    }

    /// `field <= value`
    pub fn lower_or_equal(self, value: impl Into<Value>) -> Query {
        self.compare(ComparisonOp::LowerOrEqual, value)
    }

    /// `field LIKE pattern`
    pub fn like(self, pattern: impl Into<Value>) -> Query {
        self.compare(ComparisonOp::Like, pattern)
    }

    /// `field IN (v1,v2,...)`
    pub fn in_values<I, V>(self, values: I) -> Query
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Query::in_list(self.field.path(), values)
    }
}
