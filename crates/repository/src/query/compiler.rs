//! Predicate compilation.
//!
//! [`PredicateCompiler`] walks a [`Query`] and emits backend-native predicates
//! through a [`PredicateFactory`]. Field paths are resolved against an
//! [`EntitySchema`] and literals are coerced to the declared field type:
//!
//! | Field type | Equality / IN            | Range (`>`, `>=`, `<`, `<=`) |
//! |------------|--------------------------|------------------------------|
//! | text       | passthrough              | parsed as `f64`              |
//! | integer    | parsed as `i32`          | parsed as `f64`              |
//! | long       | parsed as `i64`          | parsed as `f64`              |
//! | boolean    | `true` (any case) or not | parsed as `f64`              |
//! | double     | parsed as `f64`          | parsed as `f64`              |
//! | float      | parsed as `f32`          | parsed as `f64`              |
//! | timestamp  | unsupported              | parsed as `f64`              |
//!
//! Range comparisons always go through `f64`, so long values beyond 2^53 lose
//! precision.

use crate::error::{QueryError, RepositoryResult};
use crate::types::{EntitySchema, FieldSchema, FieldType, ResolvedField, Value};

use super::model::{ComparisonOp, Operand, Query};

/// Builds backend-native predicates.
///
/// Implemented once per storage backend.
pub trait PredicateFactory {
    /// The native predicate type.
    type Predicate;

    /// `field = value`. A null value tests for absence.
    fn equal(&self, field: &ResolvedField<'_>, value: Value) -> Self::Predicate;

    /// `field <> value`. A null value tests for presence.
    fn not_equal(&self, field: &ResolvedField<'_>, value: Value) -> Self::Predicate;

    /// `field > value`
    fn greater_than(&self, field: &ResolvedField<'_>, value: f64) -> Self::Predicate;

    /// `field >= value`
    fn greater_or_equal(&self, field: &ResolvedField<'_>, value: f64) -> Self::Predicate;

    /// `field < value`
    fn less_than(&self, field: &ResolvedField<'_>, value: f64) -> Self::Predicate;

    /// `field <= value`
    fn less_or_equal(&self, field: &ResolvedField<'_>, value: f64) -> Self::Predicate;

    /// `field LIKE pattern`
    fn like(&self, field: &ResolvedField<'_>, pattern: String) -> Self::Predicate;

    /// `field IN (values)`
    fn member_of(&self, field: &ResolvedField<'_>, values: Vec<Value>) -> Self::Predicate;

    /// Conjunction.
    fn and(&self, left: Self::Predicate, right: Self::Predicate) -> Self::Predicate;

    /// Disjunction.
    fn or(&self, left: Self::Predicate, right: Self::Predicate) -> Self::Predicate;

    /// Negation.
    fn not(&self, inner: Self::Predicate) -> Self::Predicate;
}

/// Compiles queries for one entity schema.
pub struct PredicateCompiler<'a, F> {
    schema: &'a EntitySchema,
    factory: &'a F,
}

impl<'a, F: PredicateFactory> PredicateCompiler<'a, F> {
    /// Creates a compiler targeting `factory`.
    pub fn new(schema: &'a EntitySchema, factory: &'a F) -> Self {
        Self { schema, factory }
    }

    /// Compiles `query` into a native predicate.
    pub fn compile(&self, query: &Query) -> RepositoryResult<F::Predicate> {
        match query {
            Query::And(left, right) => {
                let left = self.compile(left)?;
                let right = self.compile(right)?;
                Ok(self.factory.and(left, right))
            }
            Query::Or(left, right) => {
                let left = self.compile(left)?;
                let right = self.compile(right)?;
                Ok(self.factory.or(left, right))
            }
            Query::Not(inner) => {
                let inner = self.compile(inner)?;
                Ok(self.factory.not(inner))
            }
            Query::Comparison { field, op, value } => {
                let resolved = self.schema.resolve(field.path())?;
                self.compile_comparison(&resolved, *op, value)
            }
            Query::InList(operands) => self.compile_in_list(operands),
        }
    }

    fn compile_comparison(
        &self,
        field: &ResolvedField<'_>,
        op: ComparisonOp,
        value: &Value,
    ) -> RepositoryResult<F::Predicate> {
        let factory = self.factory;
        let predicate = match op {
            ComparisonOp::EqualTo => factory.equal(field, coerce(field.field, value)?),
            ComparisonOp::NotEqualTo => factory.not_equal(field, coerce(field.field, value)?),
            ComparisonOp::GreaterThan => factory.greater_than(field, coerce_range(value)?),
            ComparisonOp::GreaterOrEqual => factory.greater_or_equal(field, coerce_range(value)?),
            ComparisonOp::LowerThan => factory.less_than(field, coerce_range(value)?),
            ComparisonOp::LowerOrEqual => factory.less_or_equal(field, coerce_range(value)?),
            ComparisonOp::Like => factory.like(field, value.literal()),
        };
        Ok(predicate)
    }

    fn compile_in_list(&self, operands: &[Operand]) -> RepositoryResult<F::Predicate> {
        let (field, values) = match operands.split_first() {
            Some((Operand::Field(field), rest)) => (field, rest),
            _ => {
                return Err(QueryError::InvalidOperands {
                    message: "IN requires a leading field reference".to_string(),
                }
                .into());
            }
        };

        let resolved = self.schema.resolve(field.path())?;
        let coerced = values
            .iter()
            .map(|operand| match operand {
                Operand::Value(value) => coerce(resolved.field, value),
                Operand::Field(other) => Err(QueryError::InvalidOperands {
                    message: format!("IN list for '{}' contains field reference '{}'", field, other),
                }
                .into()),
            })
            .collect::<RepositoryResult<Vec<_>>>()?;

        Ok(self.factory.member_of(&resolved, coerced))
    }
}

/// Coerces a literal to the declared type of `field`.
pub fn coerce(field: &FieldSchema, value: &Value) -> RepositoryResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    let literal = value.literal();
    let invalid = |target: &str| QueryError::InvalidLiteral {
        literal: literal.clone(),
        target: format!("{} field '{}'", target, field.name),
    };

    let coerced = match field.field_type {
        FieldType::Text => Value::Text(literal.clone()),
        FieldType::Integer => Value::Integer(literal.trim().parse().map_err(|_| invalid("integer"))?),
        FieldType::Long => Value::Long(literal.trim().parse().map_err(|_| invalid("long"))?),
        FieldType::Boolean => Value::Boolean(literal.trim().eq_ignore_ascii_case("true")),
        FieldType::Double => Value::Double(literal.trim().parse().map_err(|_| invalid("double"))?),
        FieldType::Float => Value::Float(literal.trim().parse().map_err(|_| invalid("float"))?),
        FieldType::Timestamp => {
            return Err(QueryError::UnsupportedFieldType {
                field: field.name.clone(),
                field_type: field.field_type.to_string(),
            }
            .into());
        }
    };
    Ok(coerced)
}

/// Coerces a range operand through `f64`.
pub fn coerce_range(value: &Value) -> RepositoryResult<f64> {
    if let Some(number) = value.as_f64() {
        return Ok(number);
    }
    let literal = value.literal();
    literal.trim().parse::<f64>().map_err(|_| {
        QueryError::InvalidLiteral {
            literal,
            target: "range comparison".to_string(),
        }
        .into()
    })
}
