//! SQLite sessions.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{Row, params_from_iter};
use tracing::{trace, warn};

use crate::core::{Selection, StorageContext};
use crate::error::{BackendError, ConcurrencyError, QueryError, RepositoryResult};
use crate::types::{
    CREATED_COLUMN, Entity, EntitySchema, FieldType, ID_COLUMN, MODIFIED_COLUMN, VERSION_COLUMN, Value,
};

use super::backend::TableCatalog;
use super::predicate::{SqlFragment, SqlParam, SqlPredicateFactory, quote};

fn internal_error(message: String, source: rusqlite::Error) -> crate::error::RepositoryError {
    BackendError::Internal {
        backend_name: "sqlite".to_string(),
        message,
        source: Some(Box::new(source)),
    }
    .into()
}

struct SessionInner {
    conn: Mutex<PooledConnection<SqliteConnectionManager>>,
    catalog: Arc<TableCatalog>,
    active: AtomicBool,
    wrote: AtomicBool,
    managed: Mutex<HashSet<(&'static str, i64)>>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if self.active.load(Ordering::SeqCst) {
            if let Err(e) = self.conn.get_mut().execute("ROLLBACK", []) {
                warn!(error = %e, "Rollback of abandoned transaction failed");
            }
        }
    }
}

/// A storage session bound to one pooled connection.
///
/// Sessions are cheap handles; clones share the connection, the transaction
/// state and the set of rows written in the current transaction. Dropping
/// the last handle with a transaction still open rolls it back.
#[derive(Clone)]
pub struct SqliteSession {
    inner: Arc<SessionInner>,
    factory: SqlPredicateFactory,
}

impl std::fmt::Debug for SqliteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSession")
            .field("active", &self.is_transaction_active())
            .field("managed", &self.inner.managed.lock().len())
            .finish()
    }
}

impl SqliteSession {
    pub(crate) fn new(
        conn: PooledConnection<SqliteConnectionManager>,
        catalog: Arc<TableCatalog>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                conn: Mutex::new(conn),
                catalog,
                active: AtomicBool::new(false),
                wrote: AtomicBool::new(false),
                managed: Mutex::new(HashSet::new()),
            }),
            factory: SqlPredicateFactory,
        }
    }

    /// Returns true while the active transaction holds uncommitted writes.
    pub fn has_pending_writes(&self) -> bool {
        self.inner.wrote.load(Ordering::SeqCst)
    }

    /// Returns true if both handles refer to the same session.
    pub fn same_session(&self, other: &SqliteSession) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn schema<T: Entity>(&self) -> RepositoryResult<&'static EntitySchema> {
        let schema = T::descriptor().schema();
        self.inner
            .catalog
            .ensure_registered(schema.table(), schema.entity_name())?;
        Ok(schema)
    }

    fn table_of<T: Entity>() -> &'static str {
        T::descriptor().schema().table()
    }

    fn track<T: Entity>(&self, id: i64) {
        if self.is_transaction_active() {
            self.inner.managed.lock().insert((Self::table_of::<T>(), id));
        }
    }

    fn mark_written(&self) {
        if self.is_transaction_active() {
            self.inner.wrote.store(true, Ordering::SeqCst);
        }
    }

    fn end_transaction(&self) {
        self.inner.active.store(false, Ordering::SeqCst);
        self.inner.wrote.store(false, Ordering::SeqCst);
        self.inner.managed.lock().clear();
    }

    fn execute(&self, sql: &str, params: &[SqlParam]) -> RepositoryResult<usize> {
        trace!(sql, params = params.len(), "Executing statement");
        self.inner
            .conn
            .lock()
            .execute(sql, params_from_iter(params.iter()))
            .map_err(|e| internal_error(format!("Failed to execute statement: {}", e), e))
    }

    fn query_rows(
        &self,
        schema: &EntitySchema,
        sql: &str,
        params: &[SqlParam],
    ) -> RepositoryResult<Vec<Vec<Value>>> {
        trace!(sql, params = params.len(), "Executing query");
        let conn = self.inner.conn.lock();
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| internal_error(format!("Failed to prepare query: {}", e), e))?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| read_row(row, schema))
            .map_err(|e| internal_error(format!("Failed to execute query: {}", e), e))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| internal_error(format!("Failed to read row: {}", e), e))
    }

    fn column_list(schema: &EntitySchema) -> String {
        let table = quote(schema.table());
        schema
            .fields()
            .iter()
            .map(|f| format!("{}.{}", table, quote(&f.column)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn order_clause(
        schema: &EntitySchema,
        selection: &Selection<'_, SqlFragment>,
    ) -> RepositoryResult<String> {
        let Some(order) = selection.order else {
            return Ok(String::new());
        };
        if order.is_empty() {
            return Ok(String::new());
        }

        let mut terms = Vec::new();
        for parameter in order.parameters() {
            let field = schema
                .field(&parameter.name)
                .ok_or_else(|| QueryError::UnknownField {
                    entity_type: schema.entity_name().to_string(),
                    path: parameter.name.clone(),
                })?;
            terms.push(format!(
                "{}.{} {}",
                quote(schema.table()),
                quote(&field.column),
                if parameter.asc { "ASC" } else { "DESC" }
            ));
        }
        Ok(format!(" ORDER BY {}", terms.join(", ")))
    }
}

/// Reads every column of `schema` from a row.
fn read_row(row: &Row<'_>, schema: &EntitySchema) -> rusqlite::Result<Vec<Value>> {
    schema
        .fields()
        .iter()
        .enumerate()
        .map(|(idx, field)| read_value(row, idx, field.field_type))
        .collect()
}

fn read_value(row: &Row<'_>, idx: usize, field_type: FieldType) -> rusqlite::Result<Value> {
    let value = match field_type {
        FieldType::Text => row.get::<_, Option<String>>(idx)?.map(Value::Text),
        FieldType::Integer => row.get::<_, Option<i32>>(idx)?.map(Value::Integer),
        FieldType::Long => row.get::<_, Option<i64>>(idx)?.map(Value::Long),
        FieldType::Boolean => row.get::<_, Option<bool>>(idx)?.map(Value::Boolean),
        FieldType::Double => row.get::<_, Option<f64>>(idx)?.map(Value::Double),
        FieldType::Float => row
            .get::<_, Option<f64>>(idx)?
            .map(|f| Value::Float(f as f32)),
        FieldType::Timestamp => match row.get::<_, Option<String>>(idx)? {
            Some(text) => {
                let parsed = DateTime::parse_from_rfc3339(&text).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
                })?;
                Some(Value::Timestamp(parsed.with_timezone(&Utc)))
            }
            None => None,
        },
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Builds an entity from the values read by [`read_row`].
fn hydrate<T: Entity>(values: Vec<Value>) -> RepositoryResult<T> {
    let descriptor = T::descriptor();
    let mut entity = T::default();
    let mut values = values.into_iter();

    let mut next = || {
        values.next().ok_or_else(|| BackendError::Serialization {
            message: format!("row of {} has too few columns", descriptor.entity_name()),
        })
    };

    let id = next()?;
    let version = next()?;
    let created = next()?;
    let modified = next()?;

    let meta = entity.meta_mut();
    meta.id = id.as_i64().unwrap_or_default();
    meta.version = version.as_i64().and_then(|v| i32::try_from(v).ok()).unwrap_or(1);
    if let Value::Timestamp(ts) = created {
        meta.created_at = ts;
    }
    if let Value::Timestamp(ts) = modified {
        meta.modified_at = ts;
    }

    for accessor in descriptor.fields() {
        accessor.set(&mut entity, next()?)?;
    }
    Ok(entity)
}

impl StorageContext for SqliteSession {
    type Predicate = SqlFragment;
    type Factory = SqlPredicateFactory;

    fn predicate_factory(&self) -> &SqlPredicateFactory {
        &self.factory
    }

    fn is_transaction_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    fn begin(&self) -> RepositoryResult<()> {
        if self.is_transaction_active() {
            return Err(BackendError::QueryFailed {
                backend_name: "sqlite".to_string(),
                message: "a transaction is already active on this session".to_string(),
            }
            .into());
        }
        self.execute("BEGIN", &[])?;
        self.inner.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn commit(&self) -> RepositoryResult<()> {
        if !self.is_transaction_active() {
            return Err(crate::error::TransactionError::NotActive.into());
        }
        self.execute("COMMIT", &[])?;
        self.end_transaction();
        Ok(())
    }

    fn rollback(&self) -> RepositoryResult<()> {
        if !self.is_transaction_active() {
            return Err(crate::error::TransactionError::NotActive.into());
        }
        let result = self.execute("ROLLBACK", &[]);
        self.end_transaction();
        result.map(|_| ())
    }

    fn insert<T: Entity>(&self, entity: &mut T) -> RepositoryResult<()> {
        let schema = self.schema::<T>()?;
        let descriptor = T::descriptor();
        let meta = entity.meta().clone();

        let mut columns = Vec::new();
        let mut params = Vec::new();
        if meta.id != 0 {
            columns.push(quote(ID_COLUMN));
            params.push(SqlParam::integer(meta.id));
        }
        for (column, value) in [
            (VERSION_COLUMN, Value::Integer(meta.version)),
            (CREATED_COLUMN, Value::Timestamp(meta.created_at)),
            (MODIFIED_COLUMN, Value::Timestamp(meta.modified_at)),
        ] {
            columns.push(quote(column));
            params.push(SqlParam::from(value));
        }
        for accessor in descriptor.fields() {
            columns.push(quote(&accessor.schema().column));
            params.push(SqlParam::from(accessor.get(entity)));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(schema.table()),
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        );
        self.execute(&sql, &params)?;
        self.mark_written();

        if meta.id == 0 {
            entity.meta_mut().id = self.inner.conn.lock().last_insert_rowid();
        }
        self.track::<T>(entity.id());
        Ok(())
    }

    fn merge<T: Entity>(&self, mut entity: T) -> RepositoryResult<T> {
        let schema = self.schema::<T>()?;
        let descriptor = T::descriptor();
        let id = entity.id();
        let managed = self.is_managed::<T>(id);
        let meta = entity.meta().clone();

        let mut sets = Vec::new();
        let mut params = Vec::new();
        for (column, value) in [
            (CREATED_COLUMN, Value::Timestamp(meta.created_at)),
            (MODIFIED_COLUMN, Value::Timestamp(meta.modified_at)),
        ] {
            sets.push(format!("{} = ?", quote(column)));
            params.push(SqlParam::from(value));
        }
        for accessor in descriptor.fields() {
            sets.push(format!("{} = ?", quote(&accessor.schema().column)));
            params.push(SqlParam::from(accessor.get(&entity)));
        }

        // A managed row gets its version bumped here; a detached one arrives
        // already bumped and must still hold the previous version.
        let version = quote(VERSION_COLUMN);
        let expected = if managed {
            sets.push(format!("{} = {} + 1", version, version));
            meta.version
        } else {
            sets.push(format!("{} = ?", version));
            params.push(SqlParam::integer(i64::from(meta.version)));
            meta.version - 1
        };
        params.push(SqlParam::integer(id));
        params.push(SqlParam::integer(i64::from(expected)));

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ? AND {} = ?",
            quote(schema.table()),
            sets.join(", "),
            quote(ID_COLUMN),
            version
        );
        let updated = self.execute(&sql, &params)?;
        self.mark_written();
        if updated == 0 {
            return Err(ConcurrencyError::VersionConflict {
                entity_type: schema.entity_name().to_string(),
                id,
                expected_version: expected,
            }
            .into());
        }

        if managed {
            entity.meta_mut().version += 1;
        }
        self.track::<T>(id);
        Ok(entity)
    }

    fn delete<T: Entity>(&self, id: i64) -> RepositoryResult<()> {
        let schema = self.schema::<T>()?;
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote(schema.table()),
            quote(ID_COLUMN)
        );
        self.execute(&sql, &[SqlParam::integer(id)])?;
        self.mark_written();
        self.detach::<T>(id);
        Ok(())
    }

    fn load<T: Entity>(&self, id: i64) -> RepositoryResult<Option<T>> {
        let schema = self.schema::<T>()?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {}.{} = ?",
            Self::column_list(schema),
            quote(schema.table()),
            quote(schema.table()),
            quote(ID_COLUMN)
        );
        self.query_rows(schema, &sql, &[SqlParam::integer(id)])?
            .into_iter()
            .next()
            .map(hydrate::<T>)
            .transpose()
    }

    fn is_managed<T: Entity>(&self, id: i64) -> bool {
        self.inner
            .managed
            .lock()
            .contains(&(Self::table_of::<T>(), id))
    }

    fn detach<T: Entity>(&self, id: i64) {
        self.inner
            .managed
            .lock()
            .remove(&(Self::table_of::<T>(), id));
    }

    fn select<T: Entity>(&self, selection: &Selection<'_, SqlFragment>) -> RepositoryResult<Vec<T>> {
        let schema = self.schema::<T>()?;
        let mut sql = format!(
            "SELECT {} FROM {}",
            Self::column_list(schema),
            quote(schema.table())
        );
        let mut params = Vec::new();

        if let Some(predicate) = selection.predicate.filter(|p| !p.is_empty()) {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate.sql);
            params.extend(predicate.params.iter().cloned());
        }
        sql.push_str(&Self::order_clause(schema, selection)?);

        match (selection.limit, selection.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset)),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
            (None, None) => {}
        }

        self.query_rows(schema, &sql, &params)?
            .into_iter()
            .map(hydrate::<T>)
            .collect()
    }

    fn count<T: Entity>(&self, predicate: Option<&SqlFragment>) -> RepositoryResult<u64> {
        let schema = self.schema::<T>()?;
        let mut sql = format!("SELECT COUNT(*) FROM {}", quote(schema.table()));
        let mut params: &[SqlParam] = &[];
        if let Some(predicate) = predicate.filter(|p| !p.is_empty()) {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate.sql);
            params = &predicate.params;
        }

        trace!(sql = %sql, "Counting rows");
        let count: i64 = self
            .inner
            .conn
            .lock()
            .query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))
            .map_err(|e| internal_error(format!("Failed to count rows: {}", e), e))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
