//! SQLite table definitions derived from entity descriptors.

use regex::Regex;
use rusqlite::Connection;
use tracing::debug;

use crate::error::{BackendError, RepositoryResult};
use crate::types::{EntitySchema, FieldSchema, FieldType, ID_COLUMN};

use super::predicate::quote;

/// Column type for a declared field type.
pub fn column_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Text | FieldType::Timestamp => "TEXT",
        FieldType::Integer | FieldType::Long | FieldType::Boolean => "INTEGER",
        FieldType::Double | FieldType::Float => "REAL",
    }
}

/// Checks every table and column name of `schema` against `pattern`.
pub fn validate_identifiers(schema: &EntitySchema, pattern: &Regex) -> RepositoryResult<()> {
    let check = |identifier: &str| -> RepositoryResult<()> {
        if pattern.is_match(identifier) {
            Ok(())
        } else {
            Err(BackendError::InvalidIdentifier {
                identifier: identifier.to_string(),
            }
            .into())
        }
    };

    check(schema.table())?;
    for field in schema.fields() {
        check(&field.column)?;
    }
    for relation in schema.relations() {
        check(&relation.foreign_key)?;
        check(&relation.target_table)?;
        check(&relation.target_key)?;
        for field in &relation.target_fields {
            check(&field.column)?;
        }
    }
    Ok(())
}

fn column_definition(field: &FieldSchema) -> String {
    if field.column == ID_COLUMN {
        return format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quote(ID_COLUMN));
    }
    if field.is_meta() {
        return format!("{} {} NOT NULL", quote(&field.column), column_type(field.field_type));
    }
    format!("{} {}", quote(&field.column), column_type(field.field_type))
}

/// Builds the `CREATE TABLE` statement for `schema`.
///
/// Uniqueness groups made only of direct fields become `UNIQUE` constraints.
/// Groups reaching through a relation are left to the duplicate validator.
pub fn create_table_sql(schema: &EntitySchema) -> String {
    let mut definitions: Vec<String> = schema.fields().iter().map(column_definition).collect();

    for group in schema.unique_groups() {
        let columns: Option<Vec<String>> = group
            .columns()
            .iter()
            .map(|name| schema.field(name).map(|f| quote(&f.column)))
            .collect();
        if let Some(columns) = columns {
            definitions.push(format!("UNIQUE ({})", columns.join(", ")));
        }
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quote(schema.table()),
        definitions.join(",\n    ")
    )
}

/// Creates the table for `schema` if it does not exist.
pub fn create_table(conn: &Connection, schema: &EntitySchema, pattern: &Regex) -> RepositoryResult<()> {
    validate_identifiers(schema, pattern)?;

    let sql = create_table_sql(schema);
    conn.execute_batch(&sql).map_err(|e| BackendError::Internal {
        backend_name: "sqlite".to_string(),
        message: format!("Failed to create table {}: {}", schema.table(), e),
        source: Some(Box::new(e)),
    })?;

    debug!(entity_type = schema.entity_name(), table = schema.table(), "Table ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use super::*;
    use crate::types::{Entity, EntityDescriptor, EntityMeta};

    #[derive(Debug, Clone, Default)]
    struct Gadget {
        meta: EntityMeta,
        name: String,
        serial: Option<i64>,
        weight: f64,
        active: bool,
    }

    static GADGET: LazyLock<EntityDescriptor<Gadget>> = LazyLock::new(|| {
        EntityDescriptor::builder("Gadget", "gadget")
            .field("name", "name", |g: &Gadget| g.name.clone(), |g, v| g.name = v)
            .field("serial", "serial_no", |g: &Gadget| g.serial, |g, v| g.serial = v)
            .field("weight", "weight", |g: &Gadget| g.weight, |g, v| g.weight = v)
            .field("active", "active", |g: &Gadget| g.active, |g, v| g.active = v)
            .unique(&["serial"])
            .unique(&["name", "weight"])
            .build()
    });

    impl Entity for Gadget {
        fn descriptor() -> &'static EntityDescriptor<Self> {
            &GADGET
        }

        fn meta(&self) -> &EntityMeta {
            &self.meta
        }

        fn meta_mut(&mut self) -> &mut EntityMeta {
            &mut self.meta
        }
    }

    fn pattern() -> Regex {
        Regex::new(crate::backends::sqlite::DEFAULT_IDENTIFIER_PATTERN).unwrap()
    }

    #[test]
    fn test_create_table_sql() {
        let sql = create_table_sql(Gadget::descriptor().schema());
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"gadget\""));
        assert!(sql.contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sql.contains("\"entity_version\" INTEGER NOT NULL"));
        assert!(sql.contains("\"entity_create_date\" TEXT NOT NULL"));
        assert!(sql.contains("\"serial_no\" INTEGER"));
        assert!(sql.contains("\"weight\" REAL"));
        assert!(sql.contains("UNIQUE (\"serial_no\")"));
        assert!(sql.contains("UNIQUE (\"name\", \"weight\")"));
    }

    #[test]
    fn test_create_table_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = Gadget::descriptor().schema();
        create_table(&conn, schema, &pattern()).unwrap();
        create_table(&conn, schema, &pattern()).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'gadget'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_rejects_unsafe_identifier() {
        let strict = Regex::new("^[a-z]+$").unwrap();
        let err = validate_identifiers(Gadget::descriptor().schema(), &strict).unwrap_err();
        assert_eq!(err.to_string(), "invalid identifier 'entity_version'");
    }
}
