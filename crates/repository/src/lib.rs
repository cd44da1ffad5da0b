//! Helios Repository Engine
//!
//! This crate provides a generic, backend-agnostic repository for entities with
//! identity, optimistic versioning and audit timestamps. Callers describe each
//! entity type once and get persist, update, remove, filtered lookup, paginated
//! listing and counting, with constraint validation and transaction
//! propagation handled by the engine.
//!
//! # Features
//!
//! - **Query filters**: a small filter language (`name = 'x' and count > 3`) with
//!   a fluent builder, canonical definitions and relation paths (`author.name`)
//! - **Constraint validation**: uniqueness groups declared on the entity
//!   descriptor, plus any custom [`ConstraintValidator`]
//! - **Transactions**: six propagation rules over container-managed or manually
//!   managed adapters
//! - **Optimistic locking**: versions checked and incremented on every update
//! - **Extensions**: satellite records written, updated and removed alongside
//!   their primary entity
//!
//! # Backend Features
//!
//! - `sqlite` (default) - SQLite with shared in-memory and file modes
//!
//! # Architecture
//!
//! - [`types`] - entity traits, descriptors, values and pagination
//! - [`query`] - the filter model, parser, builder and predicate compiler
//! - [`core`] - the storage, transaction and session capabilities
//! - [`repository`] - the generic repository engine and extension composition
//! - [`constraints`] - validators run before writes
//! - [`config`] - serde configuration
//! - [`error`] - error types for all operations
//! - [`backends`] - backend implementations
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::{Arc, LazyLock};
//!
//! use helios_repository::backends::sqlite::{SqliteBackend, SqliteTransactionAdapter};
//! use helios_repository::query::field;
//! use helios_repository::repository::{BaseRepository, Repository};
//! use helios_repository::types::{Entity, EntityDescriptor, EntityMeta};
//!
//! #[derive(Debug, Clone, Default)]
//! struct Customer {
//!     meta: EntityMeta,
//!     email: String,
//!     visits: i32,
//! }
//!
//! static CUSTOMER: LazyLock<EntityDescriptor<Customer>> = LazyLock::new(|| {
//!     EntityDescriptor::builder("Customer", "customer")
//!         .field("email", "email", |c: &Customer| c.email.clone(), |c, v| c.email = v)
//!         .field("visits", "visits", |c: &Customer| c.visits, |c, v| c.visits = v)
//!         .unique(&["email"])
//!         .build()
//! });
//!
//! impl Entity for Customer {
//!     fn descriptor() -> &'static EntityDescriptor<Self> {
//!         &CUSTOMER
//!     }
//!     fn meta(&self) -> &EntityMeta {
//!         &self.meta
//!     }
//!     fn meta_mut(&mut self) -> &mut EntityMeta {
//!         &mut self.meta
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(SqliteBackend::in_memory()?);
//! backend.register::<Customer>()?;
//! let customers = BaseRepository::<Customer, _>::new(Arc::new(SqliteTransactionAdapter::new(backend)));
//!
//! let saved = customers.persist(Customer {
//!     email: "ada@example.com".to_string(),
//!     ..Default::default()
//! })?;
//! assert_eq!(saved.version(), 1);
//!
//! let found = customers.find_by_filter("email = 'ada@example.com'")?;
//! assert_eq!(found.id(), saved.id());
//!
//! let regulars = customers.count_all(Some(&field("visits").greater_than(10)))?;
//! # let _ = regulars;
//! # Ok(())
//! # }
//! ```
//!
//! # Filters
//!
//! ```
//! use helios_repository::query::{Query, field};
//!
//! let query = field("status").equal_to("active").or(field("priority").greater_or_equal(3));
//! assert_eq!(query.definition(), "status = active OR priority >= 3");
//! assert_eq!(Query::parse("status = active or priority >= 3"), Some(query));
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod config;
pub mod constraints;
pub mod core;
pub mod error;
pub mod query;
pub mod repository;
pub mod types;

// Re-export commonly used types at crate root
pub use constraints::{ConstraintValidator, DuplicateConstraintValidator, ValidatorRegistry};
pub use error::{RepositoryError, RepositoryResult};
pub use query::{Query, QueryBuilder, QueryOrder, field};
pub use repository::{BaseRepository, Repository};
pub use types::{Entity, EntityDescriptor, EntityMeta, PaginatedResult};

// Re-export core traits
pub use crate::core::{
    Propagation, Selection, SessionProvider, SessionRegistry, StorageContext, TransactionAdapter,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
