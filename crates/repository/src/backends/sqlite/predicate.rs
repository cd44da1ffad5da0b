//! SQL predicates for the SQLite backend.
//!
//! Fragments use anonymous `?` placeholders; parameters are kept in the order
//! their placeholders appear, so combining fragments preserves binding order.

use chrono::SecondsFormat;
use rusqlite::ToSql;
use rusqlite::types::ToSqlOutput;

use crate::query::PredicateFactory;
use crate::types::{ResolvedField, Value};

/// A fragment of SQL with bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    /// The SQL clause.
    pub sql: String,
    /// Bound parameter values.
    pub params: Vec<SqlParam>,
}

/// A bound SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// String parameter.
    String(String),
    /// Integer parameter.
    Integer(i64),
    /// Float parameter.
    Float(f64),
    /// Null parameter.
    Null,
}

impl SqlParam {
    /// Creates a string parameter.
    pub fn string(s: impl Into<String>) -> Self {
        SqlParam::String(s.into())
    }

    /// Creates an integer parameter.
    pub fn integer(i: i64) -> Self {
        SqlParam::Integer(i)
    }

    /// Creates a float parameter.
    pub fn float(f: f64) -> Self {
        SqlParam::Float(f)
    }
}

impl From<Value> for SqlParam {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => SqlParam::Null,
            Value::Text(s) => SqlParam::String(s),
            Value::Integer(i) => SqlParam::Integer(i64::from(i)),
            Value::Long(l) => SqlParam::Integer(l),
            Value::Boolean(b) => SqlParam::Integer(i64::from(b)),
            Value::Double(d) => SqlParam::Float(d),
            Value::Float(f) => SqlParam::Float(f64::from(f)),
            Value::Timestamp(ts) => SqlParam::String(ts.to_rfc3339_opts(SecondsFormat::Nanos, true)),
        }
    }
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            SqlParam::String(s) => s.to_sql(),
            SqlParam::Integer(i) => i.to_sql(),
            SqlParam::Float(f) => f.to_sql(),
            SqlParam::Null => Ok(ToSqlOutput::Owned(rusqlite::types::Value::Null)),
        }
    }
}

impl SqlFragment {
    /// Creates a new SQL fragment.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Creates a fragment with parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Combines with another fragment using AND.
    pub fn and(mut self, other: SqlFragment) -> Self {
        if !self.sql.is_empty() && !other.sql.is_empty() {
            self.sql = format!("({}) AND ({})", self.sql, other.sql);
            self.params.extend(other.params);
            self
        } else if self.sql.is_empty() {
            other
        } else {
            self
        }
    }

    /// Combines with another fragment using OR.
    pub fn or(mut self, other: SqlFragment) -> Self {
        if !self.sql.is_empty() && !other.sql.is_empty() {
            self.sql = format!("({}) OR ({})", self.sql, other.sql);
            self.params.extend(other.params);
            self
        } else if self.sql.is_empty() {
            other
        } else {
            self
        }
    }

    /// Negates the fragment.
    pub fn negate(mut self) -> Self {
        self.sql = format!("NOT ({})", self.sql);
        self
    }

    /// Returns true if this fragment is empty.
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Quotes an identifier already checked against the identifier pattern.
pub(crate) fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier)
}

/// Builds [`SqlFragment`] predicates.
///
/// Direct fields compare the entity's own column. `relation.field` paths
/// compare the target table inside a subquery on the foreign key:
///
/// ```text
/// "book"."author_id" IN (SELECT "author"."id" FROM "author" WHERE "author"."name" = ?)
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlPredicateFactory;

impl SqlPredicateFactory {
    fn on_field(
        &self,
        field: &ResolvedField<'_>,
        condition: impl FnOnce(&str) -> String,
        params: Vec<SqlParam>,
    ) -> SqlFragment {
        match field.relation {
            None => {
                let column = format!("{}.{}", quote(field.table), quote(&field.field.column));
                SqlFragment::with_params(condition(&column), params)
            }
            Some(relation) => {
                let target = quote(&relation.target_table);
                let column = format!("{}.{}", target, quote(&field.field.column));
                let sql = format!(
                    "{}.{} IN (SELECT {}.{} FROM {} WHERE {})",
                    quote(field.table),
                    quote(&relation.foreign_key),
                    target,
                    quote(&relation.target_key),
                    target,
                    condition(&column)
                );
                SqlFragment::with_params(sql, params)
            }
        }
    }

    fn compare(&self, field: &ResolvedField<'_>, op: &str, param: SqlParam) -> SqlFragment {
        self.on_field(field, |column| format!("{} {} ?", column, op), vec![param])
    }
}

impl PredicateFactory for SqlPredicateFactory {
    type Predicate = SqlFragment;

    fn equal(&self, field: &ResolvedField<'_>, value: Value) -> SqlFragment {
        if value.is_null() {
            return self.on_field(field, |column| format!("{} IS NULL", column), Vec::new());
        }
        self.compare(field, "=", value.into())
    }

    fn not_equal(&self, field: &ResolvedField<'_>, value: Value) -> SqlFragment {
        if value.is_null() {
            return self.on_field(field, |column| format!("{} IS NOT NULL", column), Vec::new());
        }
        self.compare(field, "<>", value.into())
    }

    fn greater_than(&self, field: &ResolvedField<'_>, value: f64) -> SqlFragment {
        self.compare(field, ">", SqlParam::float(value))
    }

    fn greater_or_equal(&self, field: &ResolvedField<'_>, value: f64) -> SqlFragment {
        self.compare(field, ">=", SqlParam::float(value))
    }

    fn less_than(&self, field: &ResolvedField<'_>, value: f64) -> SqlFragment {
        self.compare(field, "<", SqlParam::float(value))
    }

    fn less_or_equal(&self, field: &ResolvedField<'_>, value: f64) -> SqlFragment {
        self.compare(field, "<=", SqlParam::float(value))
    }

    fn like(&self, field: &ResolvedField<'_>, pattern: String) -> SqlFragment {
        self.compare(field, "LIKE", SqlParam::String(pattern))
    }

    fn member_of(&self, field: &ResolvedField<'_>, values: Vec<Value>) -> SqlFragment {
        if values.is_empty() {
            return SqlFragment::new("0");
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        let params = values.into_iter().map(SqlParam::from).collect();
        self.on_field(field, |column| format!("{} IN ({})", column, placeholders), params)
    }

    fn and(&self, left: SqlFragment, right: SqlFragment) -> SqlFragment {
        left.and(right)
    }

    fn or(&self, left: SqlFragment, right: SqlFragment) -> SqlFragment {
        left.or(right)
    }

    fn not(&self, inner: SqlFragment) -> SqlFragment {
        inner.negate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldSchema, FieldType, RelationSchema};

    fn direct(field: &FieldSchema) -> ResolvedField<'_> {
        ResolvedField {
            table: "item",
            field,
            relation: None,
        }
    }

    #[test]
    fn test_fragment_and_or() {
        let a = SqlFragment::with_params("a = ?", vec![SqlParam::integer(1)]);
        let b = SqlFragment::with_params("b = ?", vec![SqlParam::string("x")]);
        let combined = a.clone().and(b.clone());
        assert_eq!(combined.sql, "(a = ?) AND (b = ?)");
        assert_eq!(combined.params, vec![SqlParam::integer(1), SqlParam::string("x")]);

        assert_eq!(a.clone().or(b).sql, "(a = ?) OR (b = ?)");
        assert_eq!(SqlFragment::new("").and(a.clone()), a);
        assert_eq!(a.clone().negate().sql, "NOT (a = ?)");
    }

    #[test]
    fn test_direct_comparisons() {
        let field = FieldSchema::new("count", "count", FieldType::Integer);
        let factory = SqlPredicateFactory;

        let eq = factory.equal(&direct(&field), Value::Integer(3));
        assert_eq!(eq.sql, "\"item\".\"count\" = ?");
        assert_eq!(eq.params, vec![SqlParam::integer(3)]);

        let gt = factory.greater_than(&direct(&field), 2.0);
        assert_eq!(gt.sql, "\"item\".\"count\" > ?");
        assert_eq!(gt.params, vec![SqlParam::float(2.0)]);

        let null = factory.equal(&direct(&field), Value::Null);
        assert_eq!(null.sql, "\"item\".\"count\" IS NULL");
        assert!(null.params.is_empty());

        let not_null = factory.not_equal(&direct(&field), Value::Null);
        assert_eq!(not_null.sql, "\"item\".\"count\" IS NOT NULL");
    }

    #[test]
    fn test_member_of() {
        let field = FieldSchema::new("id", "id", FieldType::Long);
        let factory = SqlPredicateFactory;

        let list = factory.member_of(&direct(&field), vec![Value::Long(1), Value::Long(2)]);
        assert_eq!(list.sql, "\"item\".\"id\" IN (?, ?)");
        assert_eq!(list.params.len(), 2);

        let empty = factory.member_of(&direct(&field), Vec::new());
        assert_eq!(empty.sql, "0");
    }

    #[test]
    fn test_relation_subquery() {
        let name = FieldSchema::new("name", "name", FieldType::Text);
        let relation = RelationSchema {
            name: "author".to_string(),
            foreign_key: "author_id".to_string(),
            target_table: "author".to_string(),
            target_key: "id".to_string(),
            target_fields: vec![name.clone()],
        };
        let resolved = ResolvedField {
            table: "book",
            field: &name,
            relation: Some(&relation),
        };

        let fragment = SqlPredicateFactory.like(&resolved, "Her%".to_string());
        assert_eq!(
            fragment.sql,
            "\"book\".\"author_id\" IN (SELECT \"author\".\"id\" FROM \"author\" WHERE \"author\".\"name\" LIKE ?)"
        );
        assert_eq!(fragment.params, vec![SqlParam::string("Her%")]);
    }

    #[test]
    fn test_value_to_param() {
        assert_eq!(SqlParam::from(Value::Boolean(true)), SqlParam::Integer(1));
        assert_eq!(SqlParam::from(Value::Float(0.5)), SqlParam::Float(0.5));
        assert_eq!(SqlParam::from(Value::Null), SqlParam::Null);
    }
}
