//! Core types for the repository engine.
//!
//! - [`Entity`], [`EntityMeta`] - entities and their persistence metadata
//! - [`ExpandableEntity`], [`ExtensionEntity`] - primary/extension pairs
//! - [`EntityDescriptor`], [`EntitySchema`] - declarative entity shapes
//! - [`Value`], [`FieldType`] - literal values and field types
//! - [`PaginatedResult`] - a page of `find_all` results

mod descriptor;
mod entity;
mod pagination;
mod value;

pub use descriptor::{
    CREATED_COLUMN, CREATED_FIELD, DescriptorBuilder, EntityDescriptor, EntitySchema,
    FieldAccessor, FieldSchema, ID_COLUMN, ID_FIELD, MODIFIED_COLUMN, MODIFIED_FIELD,
    PathAccessor, RelationSchema, ResolvedField, UniqueGroup, VERSION_COLUMN, VERSION_FIELD,
};
pub use entity::{Entity, EntityMeta, ExpandableEntity, ExtensionEntity, RELATED_ENTITY_ID};
pub use pagination::{PageWindow, PaginatedResult};
pub use value::{FieldType, FieldValue, Value};
