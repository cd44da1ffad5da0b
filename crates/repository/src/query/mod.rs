//! Query filters.
//!
//! - [`Query`] - the filter expression tree and its canonical definitions
//! - [`field`], [`QueryBuilder`] - fluent construction
//! - [`QueryParser`] - the textual filter grammar
//! - [`QueryOrder`] - result ordering
//! - [`PredicateCompiler`], [`PredicateFactory`] - compilation to backend predicates

pub mod compiler;
mod builder;
mod model;
mod order;
mod parser;

pub use builder::{FieldBuilder, QueryBuilder, field};
pub use compiler::{PredicateCompiler, PredicateFactory};
pub use model::{ComparisonOp, FieldRef, Operand, Query};
pub use order::{QueryOrder, QueryOrderParameter};
pub use parser::{QueryParseError, QueryParser};
