//! SQLite backend implementation.
//!
//! Entities are stored one table per type, created from the entity
//! descriptor by [`SqliteBackend::register`]. The backend supports shared
//! in-memory databases (one per persistence unit, useful for tests) and
//! file-based databases.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use helios_repository::backends::sqlite::{SqliteBackend, SqliteTransactionAdapter};
//! use helios_repository::repository::BaseRepository;
//! # use helios_repository::types::{Entity, EntityDescriptor, EntityMeta};
//! # use std::sync::LazyLock;
//! # #[derive(Debug, Clone, Default)]
//! # struct Note { meta: EntityMeta, text: String }
//! # static NOTE: LazyLock<EntityDescriptor<Note>> = LazyLock::new(|| {
//! #     EntityDescriptor::builder("Note", "note")
//! #         .field("text", "text", |n: &Note| n.text.clone(), |n, v| n.text = v)
//! #         .build()
//! # });
//! # impl Entity for Note {
//! #     fn descriptor() -> &'static EntityDescriptor<Self> { &NOTE }
//! #     fn meta(&self) -> &EntityMeta { &self.meta }
//! #     fn meta_mut(&mut self) -> &mut EntityMeta { &mut self.meta }
//! # }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(SqliteBackend::in_memory()?);
//! backend.register::<Note>()?;
//!
//! let adapter = Arc::new(SqliteTransactionAdapter::new(backend));
//! let notes: BaseRepository<Note, _> = BaseRepository::new(adapter);
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! Every table carries the metadata columns:
//!
//! ```sql
//! CREATE TABLE note (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     entity_version INTEGER NOT NULL,
//!     entity_create_date TEXT NOT NULL,   -- RFC 3339
//!     entity_modify_date TEXT NOT NULL,
//!     text TEXT
//! );
//! ```

mod backend;
mod predicate;
mod schema;
mod session;
mod transaction;

pub use backend::{
    DEFAULT_IDENTIFIER_PATTERN, SqliteBackend, SqliteBackendConfig, SqliteSessionProvider,
};
pub use predicate::{SqlFragment, SqlParam, SqlPredicateFactory};
pub use schema::{column_type, create_table_sql};
pub use session::SqliteSession;
pub use transaction::{LocalTransactionAdapter, SqliteTransactionAdapter};
