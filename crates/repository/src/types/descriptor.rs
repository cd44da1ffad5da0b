//! Declarative entity descriptors.
//!
//! An [`EntityDescriptor`] is built once per entity type and replaces runtime
//! reflection. It carries:
//!
//! - the type-erased [`EntitySchema`] that queries resolve field paths against
//! - typed accessors used to write rows and to read them back
//! - a path accessor table keyed by field name, including compound
//!   `relation_field` names, used by constraint validators
//!
//! # Example
//!
//! ```
//! use std::sync::LazyLock;
//! use helios_repository::types::{Entity, EntityDescriptor, EntityMeta};
//!
//! #[derive(Debug, Clone, Default)]
//! struct Tag {
//!     meta: EntityMeta,
//!     label: String,
//! }
//!
//! static TAG: LazyLock<EntityDescriptor<Tag>> = LazyLock::new(|| {
//!     EntityDescriptor::builder("Tag", "tag")
//!         .field("label", "label", |t: &Tag| t.label.clone(), |t, v| t.label = v)
//!         .unique(&["label"])
//!         .build()
//! });
//!
//! impl Entity for Tag {
//!     fn descriptor() -> &'static EntityDescriptor<Self> { &TAG }
//!     fn meta(&self) -> &EntityMeta { &self.meta }
//!     fn meta_mut(&mut self) -> &mut EntityMeta { &mut self.meta }
//! }
//!
//! let schema = Tag::descriptor().schema();
//! assert_eq!(schema.table(), "tag");
//! assert!(schema.resolve("label").is_ok());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{BackendError, QueryError, RepositoryResult};

use super::entity::Entity;
use super::value::{FieldType, FieldValue, Value};

/// Query name of the identity field.
pub const ID_FIELD: &str = "id";
/// Query name of the version field.
pub const VERSION_FIELD: &str = "entityVersion";
/// Query name of the creation timestamp.
pub const CREATED_FIELD: &str = "entityCreateDate";
/// Query name of the modification timestamp.
pub const MODIFIED_FIELD: &str = "entityModifyDate";

/// Column holding the identity.
pub const ID_COLUMN: &str = "id";
/// Column holding the version.
pub const VERSION_COLUMN: &str = "entity_version";
/// Column holding the creation timestamp.
pub const CREATED_COLUMN: &str = "entity_create_date";
/// Column holding the modification timestamp.
pub const MODIFIED_COLUMN: &str = "entity_modify_date";

/// A stored field: query name, column and declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    /// Name used in filters.
    pub name: String,
    /// Storage column.
    pub column: String,
    /// Declared type.
    pub field_type: FieldType,
}

impl FieldSchema {
    /// Creates a field schema.
    pub fn new(name: impl Into<String>, column: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            field_type,
        }
    }

    /// Returns true for id, version and timestamp fields.
    pub fn is_meta(&self) -> bool {
        matches!(
            self.name.as_str(),
            ID_FIELD | VERSION_FIELD | CREATED_FIELD | MODIFIED_FIELD
        )
    }
}

/// A many-to-one relation followed by dotted filter paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSchema {
    /// Relation name, the first segment of `relation.field`.
    pub name: String,
    /// Column on this entity holding the target id.
    pub foreign_key: String,
    /// Table of the target entity.
    pub target_table: String,
    /// Identity column of the target entity.
    pub target_key: String,
    /// Fields of the target entity.
    pub target_fields: Vec<FieldSchema>,
}

impl RelationSchema {
    /// Looks up a field of the target entity.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.target_fields.iter().find(|f| f.name == name)
    }
}

/// A group of field names that must be jointly unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueGroup {
    columns: Vec<String>,
}

impl UniqueGroup {
    /// Creates a uniqueness group.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// The field names of the group.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// A field path resolved against a schema.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedField<'a> {
    /// Table of the entity the path starts from.
    pub table: &'a str,
    /// The field the path ends on.
    pub field: &'a FieldSchema,
    /// The relation traversed, for `relation.field` paths.
    pub relation: Option<&'a RelationSchema>,
}

/// The type-erased shape of an entity.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    entity_name: String,
    table: String,
    fields: Vec<FieldSchema>,
    relations: Vec<RelationSchema>,
    unique_groups: Vec<UniqueGroup>,
}

impl EntitySchema {
    /// The entity type name used in errors and logs.
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// The storage table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// All fields, metadata first.
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Declared relations.
    pub fn relations(&self) -> &[RelationSchema] {
        &self.relations
    }

    /// Declared uniqueness groups.
    pub fn unique_groups(&self) -> &[UniqueGroup] {
        &self.unique_groups
    }

    /// Looks up a field by query name.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Looks up a relation by name.
    pub fn relation(&self, name: &str) -> Option<&RelationSchema> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Resolves `field` or `relation.field`. Deeper paths are rejected.
    pub fn resolve(&self, path: &str) -> RepositoryResult<ResolvedField<'_>> {
        let unknown = || QueryError::UnknownField {
            entity_type: self.entity_name.clone(),
            path: path.to_string(),
        };

        match path.split_once('.') {
            None => {
                let field = self.field(path).ok_or_else(unknown)?;
                Ok(ResolvedField {
                    table: &self.table,
                    field,
                    relation: None,
                })
            }
            Some((relation_name, rest)) => {
                if rest.contains('.') {
                    return Err(unknown().into());
                }
                let relation = self.relation(relation_name).ok_or_else(unknown)?;
                let field = relation.field(rest).ok_or_else(unknown)?;
                Ok(ResolvedField {
                    table: &self.table,
                    field,
                    relation: Some(relation),
                })
            }
        }
    }
}

type Getter<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;
type Setter<T> = Arc<dyn Fn(&mut T, Value) -> bool + Send + Sync>;

/// Typed access to one stored field.
pub struct FieldAccessor<T> {
    schema: FieldSchema,
    get: Getter<T>,
    set: Setter<T>,
}

impl<T> FieldAccessor<T> {
    /// The field's schema.
    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// Reads the field.
    pub fn get(&self, entity: &T) -> Value {
        (self.get)(entity)
    }

    /// Writes the field, failing when the value has the wrong type.
    pub fn set(&self, entity: &mut T, value: Value) -> RepositoryResult<()> {
        let field_type = self.schema.field_type;
        if (self.set)(entity, value) {
            Ok(())
        } else {
            Err(BackendError::Serialization {
                message: format!(
                    "value for field '{}' is not a valid {}",
                    self.schema.name, field_type
                ),
            }
            .into())
        }
    }
}

/// Read access to a field by name, possibly through a relation.
pub struct PathAccessor<T> {
    path: String,
    get: Getter<T>,
}

impl<T> PathAccessor<T> {
    /// The dotted filter path this accessor reads.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Reads the value.
    pub fn get(&self, entity: &T) -> Value {
        (self.get)(entity)
    }
}

/// Declarative description of an entity type.
pub struct EntityDescriptor<T> {
    schema: EntitySchema,
    fields: Vec<FieldAccessor<T>>,
    paths: HashMap<String, PathAccessor<T>>,
}

impl<T> fmt::Debug for EntityDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl<T: Entity> EntityDescriptor<T> {
    /// Starts a descriptor for `entity_name` stored in `table`.
    pub fn builder(entity_name: impl Into<String>, table: impl Into<String>) -> DescriptorBuilder<T> {
        DescriptorBuilder::new(entity_name, table)
    }

    /// The type-erased schema.
    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// The entity type name.
    pub fn entity_name(&self) -> &str {
        self.schema.entity_name()
    }

    /// Declared uniqueness groups.
    pub fn unique_groups(&self) -> &[UniqueGroup] {
        self.schema.unique_groups()
    }

    /// Accessors of the declared (non-metadata) fields.
    pub fn fields(&self) -> &[FieldAccessor<T>] {
        &self.fields
    }

    /// Looks up a path accessor by field name or compound `relation_field`.
    pub fn path(&self, name: &str) -> Option<&PathAccessor<T>> {
        self.paths.get(name)
    }
}

/// Builder for [`EntityDescriptor`].
pub struct DescriptorBuilder<T> {
    entity_name: String,
    table: String,
    fields: Vec<FieldAccessor<T>>,
    relations: Vec<RelationSchema>,
    relation_paths: Vec<(String, PathAccessor<T>)>,
    unique_groups: Vec<UniqueGroup>,
}

impl<T: Entity> DescriptorBuilder<T> {
    /// Creates a builder with no declared fields.
    pub fn new(entity_name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            table: table.into(),
            fields: Vec::new(),
            relations: Vec::new(),
            relation_paths: Vec::new(),
            unique_groups: Vec::new(),
        }
    }

    /// Declares a stored field.
    pub fn field<V, G, S>(mut self, name: &str, column: &str, get: G, set: S) -> Self
    where
        V: FieldValue + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.fields.push(FieldAccessor {
            schema: FieldSchema::new(name, column, V::FIELD_TYPE),
            get: Arc::new(move |entity| get(entity).to_value()),
            set: Arc::new(move |entity, value| match V::from_value(value) {
                Some(v) => {
                    set(entity, v);
                    true
                }
                None => false,
            }),
        });
        self
    }

    /// Declares a many-to-one relation to `R` through `foreign_key`.
    ///
    /// Filters may then use `name.field` paths, and uniqueness groups may
    /// name `name_field`. The foreign key column should also be declared as a
    /// long field so it is written with the row.
    pub fn relation<R, F>(mut self, name: &str, foreign_key: &str, get: F) -> Self
    where
        R: Entity,
        F: Fn(&T) -> Option<&R> + Send + Sync + 'static,
    {
        let target = R::descriptor();
        let target_schema = target.schema();
        let get = Arc::new(get);

        for field in target_schema.fields() {
            let Some(inner) = target.path(&field.name) else {
                continue;
            };
            let inner = inner.get.clone();
            let get = get.clone();
            self.relation_paths.push((
                format!("{}_{}", name, field.name),
                PathAccessor {
                    path: format!("{}.{}", name, field.name),
                    get: Arc::new(move |entity: &T| get(entity).map_or(Value::Null, |r| inner(r))),
                },
            ));
        }

        self.relations.push(RelationSchema {
            name: name.to_string(),
            foreign_key: foreign_key.to_string(),
            target_table: target_schema.table().to_string(),
            target_key: ID_COLUMN.to_string(),
            target_fields: target_schema.fields().to_vec(),
        });
        self
    }

    /// Declares a uniqueness group. A single name is a simple unique field.
    pub fn unique(mut self, columns: &[&str]) -> Self {
        self.unique_groups.push(UniqueGroup::new(columns.iter().copied()));
        self
    }

    /// Builds the descriptor.
    pub fn build(self) -> EntityDescriptor<T> {
        let mut fields = meta_fields();
        fields.extend(self.fields.iter().map(|f| f.schema.clone()));

        let mut paths: HashMap<String, PathAccessor<T>> = HashMap::new();
        paths.insert(
            ID_FIELD.to_string(),
            meta_path(ID_FIELD, |e: &T| Value::Long(e.meta().id)),
        );
        paths.insert(
            VERSION_FIELD.to_string(),
            meta_path(VERSION_FIELD, |e: &T| Value::Integer(e.meta().version)),
        );
        paths.insert(
            CREATED_FIELD.to_string(),
            meta_path(CREATED_FIELD, |e: &T| Value::Timestamp(e.meta().created_at)),
        );
        paths.insert(
            MODIFIED_FIELD.to_string(),
            meta_path(MODIFIED_FIELD, |e: &T| Value::Timestamp(e.meta().modified_at)),
        );
        for field in &self.fields {
            paths.insert(
                field.schema.name.clone(),
                PathAccessor {
                    path: field.schema.name.clone(),
                    get: field.get.clone(),
                },
            );
        }
        paths.extend(self.relation_paths);

        EntityDescriptor {
            schema: EntitySchema {
                entity_name: self.entity_name,
                table: self.table,
                fields,
                relations: self.relations,
                unique_groups: self.unique_groups,
            },
            fields: self.fields,
            paths,
        }
    }
}

fn meta_fields() -> Vec<FieldSchema> {
    vec![
        FieldSchema::new(ID_FIELD, ID_COLUMN, FieldType::Long),
        FieldSchema::new(VERSION_FIELD, VERSION_COLUMN, FieldType::Integer),
        FieldSchema::new(CREATED_FIELD, CREATED_COLUMN, FieldType::Timestamp),
        FieldSchema::new(MODIFIED_FIELD, MODIFIED_COLUMN, FieldType::Timestamp),
    ]
}

fn meta_path<T>(name: &str, get: impl Fn(&T) -> Value + Send + Sync + 'static) -> PathAccessor<T> {
    PathAccessor {
        path: name.to_string(),
        get: Arc::new(get),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use super::*;
    use crate::types::EntityMeta;

    #[derive(Debug, Clone, Default)]
    struct Author {
        meta: EntityMeta,
        name: String,
    }

    #[derive(Debug, Clone, Default)]
    struct Book {
        meta: EntityMeta,
        title: String,
        author_id: Option<i64>,
        author: Option<Author>,
    }

    static AUTHOR: LazyLock<EntityDescriptor<Author>> = LazyLock::new(|| {
        EntityDescriptor::builder("Author", "author")
            .field("name", "name", |a: &Author| a.name.clone(), |a, v| a.name = v)
            .build()
    });

    static BOOK: LazyLock<EntityDescriptor<Book>> = LazyLock::new(|| {
        EntityDescriptor::builder("Book", "book")
            .field("title", "title", |b: &Book| b.title.clone(), |b, v| b.title = v)
            .field(
                "authorId",
                "author_id",
                |b: &Book| b.author_id,
                |b, v| b.author_id = v,
            )
            .relation("author", "author_id", |b: &Book| b.author.as_ref())
            .unique(&["title", "author_name"])
            .build()
    });

    impl Entity for Author {
        fn descriptor() -> &'static EntityDescriptor<Self> {
            &AUTHOR
        }
        fn meta(&self) -> &EntityMeta {
            &self.meta
        }
        fn meta_mut(&mut self) -> &mut EntityMeta {
            &mut self.meta
        }
    }

    impl Entity for Book {
        fn descriptor() -> &'static EntityDescriptor<Self> {
            &BOOK
        }
        fn meta(&self) -> &EntityMeta {
            &self.meta
        }
        fn meta_mut(&mut self) -> &mut EntityMeta {
            &mut self.meta
        }
    }

    #[test]
    fn test_schema_includes_meta_fields() {
        let schema = Book::descriptor().schema();
        let names: Vec<_> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "id",
                "entityVersion",
                "entityCreateDate",
                "entityModifyDate",
                "title",
                "authorId"
            ]
        );
        assert_eq!(schema.field("authorId").unwrap().field_type, FieldType::Long);
    }

    #[test]
    fn test_resolve_direct_and_relation_paths() {
        let schema = Book::descriptor().schema();

        let direct = schema.resolve("title").unwrap();
        assert!(direct.relation.is_none());
        assert_eq!(direct.field.column, "title");

        let related = schema.resolve("author.name").unwrap();
        assert_eq!(related.relation.unwrap().foreign_key, "author_id");
        assert_eq!(related.relation.unwrap().target_table, "author");
        assert_eq!(related.field.column, "name");
    }

    #[test]
    fn test_resolve_rejects_unknown_and_deep_paths() {
        let schema = Book::descriptor().schema();
        assert!(schema.resolve("missing").is_err());
        assert!(schema.resolve("publisher.name").is_err());
        assert!(schema.resolve("author.name.first").is_err());
    }

    #[test]
    fn test_compound_relation_accessor() {
        let book = Book {
            title: "Dune".to_string(),
            author: Some(Author {
                name: "Herbert".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let accessor = Book::descriptor().path("author_name").unwrap();
        assert_eq!(accessor.path(), "author.name");
        assert_eq!(accessor.get(&book), Value::from("Herbert"));

        let orphan = Book::default();
        assert_eq!(accessor.get(&orphan), Value::Null);
    }

    #[test]
    fn test_field_accessor_rejects_wrong_type() {
        let descriptor = Book::descriptor();
        let title = &descriptor.fields()[0];
        let mut book = Book::default();
        title.set(&mut book, Value::from("Emma")).unwrap();
        assert_eq!(book.title, "Emma");
        assert!(title.set(&mut book, Value::Long(3)).is_err());
    }
}
