//! SQLite backend implementation.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use regex::Regex;
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::SessionProvider;
use crate::error::{BackendError, ConfigError, RepositoryResult};
use crate::types::Entity;

use super::schema;
use super::session::SqliteSession;

/// Identifiers accepted for tables and columns unless configured otherwise.
pub const DEFAULT_IDENTIFIER_PATTERN: &str = "^[A-Za-z_][A-Za-z0-9_]*$";

/// Configuration for the SQLite backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteBackendConfig {
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    /// Enable WAL mode for better concurrency.
    #[serde(default = "default_true")]
    pub enable_wal: bool,

    /// Enable foreign key constraints.
    #[serde(default = "default_true")]
    pub enable_foreign_keys: bool,

    /// Directory holding one `{unit}.db` file per persistence unit.
    /// Units are shared in-memory databases when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Pattern every table and column name must match.
    #[serde(default = "default_identifier_pattern")]
    pub identifier_pattern: String,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_identifier_pattern() -> String {
    DEFAULT_IDENTIFIER_PATTERN.to_string()
}

impl Default for SqliteBackendConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_wal: true,
            enable_foreign_keys: true,
            directory: None,
            identifier_pattern: default_identifier_pattern(),
        }
    }
}

impl SqliteBackendConfig {
    /// Compiles the identifier pattern.
    pub fn identifier_regex(&self) -> Result<Regex, ConfigError> {
        Regex::new(&self.identifier_pattern).map_err(|source| ConfigError::InvalidPattern {
            pattern: self.identifier_pattern.clone(),
            source,
        })
    }
}

/// Tables created through [`SqliteBackend::register`].
#[derive(Debug)]
pub(crate) struct TableCatalog {
    tables: RwLock<HashSet<String>>,
}

impl TableCatalog {
    pub(crate) fn ensure_registered(&self, table: &str, entity_type: &str) -> RepositoryResult<()> {
        if self.tables.read().contains(table) {
            return Ok(());
        }
        Err(BackendError::QueryFailed {
            backend_name: "sqlite".to_string(),
            message: format!("entity type {} is not registered", entity_type),
        }
        .into())
    }
}

/// SQLite storage for one persistence unit.
///
/// The backend owns the connection pool and the per-thread stack of
/// transaction frames. Adapters built over the same backend share those
/// frames, so repositories for different entity types join one transaction.
pub struct SqliteBackend {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteBackendConfig,
    location: String,
    is_memory: bool,
    identifiers: Regex,
    catalog: Arc<TableCatalog>,
    frames: Mutex<HashMap<ThreadId, Vec<SqliteSession>>>,
    local: Mutex<Option<SqliteSession>>,
    // Holds a shared in-memory database open while the pool recycles.
    // Declared last so it closes after the pool.
    _keeper: Option<Mutex<Connection>>,
}

impl Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("location", &self.location)
            .field("is_memory", &self.is_memory)
            .field("tables", &self.catalog.tables.read().len())
            .finish_non_exhaustive()
    }
}

impl SqliteBackend {
    /// Creates a private in-memory backend.
    pub fn in_memory() -> RepositoryResult<Self> {
        Self::memory_with_config(
            &format!("memory-{}", Uuid::new_v4()),
            SqliteBackendConfig::default(),
        )
    }

    /// Opens the shared in-memory database named `unit`.
    pub fn memory_with_config(unit: &str, config: SqliteBackendConfig) -> RepositoryResult<Self> {
        let uri = format!("file:{}?mode=memory&cache=shared", unit);
        Self::build(&uri, true, config)
    }

    /// Opens or creates a file-based SQLite database.
    pub fn open<P: AsRef<Path>>(path: P) -> RepositoryResult<Self> {
        Self::with_config(path, SqliteBackendConfig::default())
    }

    /// Creates a file-based backend with custom configuration.
    pub fn with_config<P: AsRef<Path>>(path: P, config: SqliteBackendConfig) -> RepositoryResult<Self> {
        let location = path.as_ref().to_string_lossy().into_owned();
        Self::build(&location, false, config)
    }

    fn build(location: &str, is_memory: bool, config: SqliteBackendConfig) -> RepositoryResult<Self> {
        let identifiers = config.identifier_regex()?;
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let connection_failed = |message: String| BackendError::ConnectionFailed {
            backend_name: "sqlite".to_string(),
            message,
        };

        let keeper = if is_memory {
            let conn = Connection::open_with_flags(location, flags)
                .map_err(|e| connection_failed(e.to_string()))?;
            Some(Mutex::new(conn))
        } else {
            None
        };

        let init_config = config.clone();
        let manager = SqliteConnectionManager::file(location)
            .with_flags(flags)
            .with_init(move |conn| configure_connection(conn, &init_config, is_memory));

        let pool = Pool::builder()
            .max_size(config.max_connections)
            .min_idle(Some(config.min_connections))
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .build(manager)
            .map_err(|e| connection_failed(e.to_string()))?;

        info!(location, is_memory, "Opened SQLite backend");

        Ok(Self {
            pool,
            config,
            location: location.to_string(),
            is_memory,
            identifiers,
            catalog: Arc::new(TableCatalog {
                tables: RwLock::new(HashSet::new()),
            }),
            frames: Mutex::new(HashMap::new()),
            local: Mutex::new(None),
            _keeper: keeper,
        })
    }

    /// Creates the table of `T` if needed and makes the type usable.
    pub fn register<T: Entity>(&self) -> RepositoryResult<()> {
        let schema = T::descriptor().schema();
        let conn = self.get_connection()?;
        schema::create_table(&conn, schema, &self.identifiers)?;
        self.catalog.tables.write().insert(schema.table().to_string());
        Ok(())
    }

    /// Returns true if the table of `T` has been registered.
    pub fn is_registered<T: Entity>(&self) -> bool {
        self.catalog
            .tables
            .read()
            .contains(T::descriptor().schema().table())
    }

    /// Opens a new session on its own pooled connection.
    pub fn open_session(&self) -> RepositoryResult<SqliteSession> {
        Ok(SqliteSession::new(
            self.get_connection()?,
            Arc::clone(&self.catalog),
        ))
    }

    /// The session shared by every manually managed adapter over this backend.
    pub fn local_session(&self) -> RepositoryResult<SqliteSession> {
        let mut local = self.local.lock();
        if let Some(session) = local.as_ref() {
            return Ok(session.clone());
        }
        let session = self.open_session()?;
        *local = Some(session.clone());
        Ok(session)
    }

    /// Get a connection from the pool.
    pub(crate) fn get_connection(&self) -> RepositoryResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            BackendError::ConnectionFailed {
                backend_name: "sqlite".to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// The innermost transaction frame of the calling thread.
    pub(crate) fn current_frame(&self) -> Option<SqliteSession> {
        self.frames
            .lock()
            .get(&thread::current().id())
            .and_then(|stack| stack.last().cloned())
    }

    /// Pushes a frame for the calling thread, popped when the guard drops.
    pub(crate) fn push_frame(&self, session: SqliteSession) -> FrameGuard<'_> {
        let thread = thread::current().id();
        let mut frames = self.frames.lock();
        let stack = frames.entry(thread).or_default();
        stack.push(session);
        debug!(depth = stack.len(), "Pushed transaction frame");
        FrameGuard {
            backend: self,
            thread,
        }
    }

    /// Releases the shared local session, rolling back any open transaction.
    pub fn close(&self) {
        if self.local.lock().take().is_some() {
            debug!(location = %self.location, "Released local session");
        }
    }

    /// Returns whether this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    /// The database path or in-memory URI.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Returns the backend configuration.
    pub fn config(&self) -> &SqliteBackendConfig {
        &self.config
    }
}

/// Pops the calling thread's innermost frame on drop.
pub(crate) struct FrameGuard<'a> {
    backend: &'a SqliteBackend,
    thread: ThreadId,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        let mut frames = self.backend.frames.lock();
        if let Some(stack) = frames.get_mut(&self.thread) {
            stack.pop();
            if stack.is_empty() {
                frames.remove(&self.thread);
            }
        }
    }
}

/// Applies connection settings to every pooled connection.
fn configure_connection(
    conn: &mut Connection,
    config: &SqliteBackendConfig,
    is_memory: bool,
) -> rusqlite::Result<()> {
    conn.busy_timeout(Duration::from_millis(u64::from(config.busy_timeout_ms)))?;

    if config.enable_foreign_keys {
        conn.pragma_update(None, "foreign_keys", true)?;
    }

    if config.enable_wal && !is_memory {
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    }

    Ok(())
}

/// Opens one [`SqliteBackend`] per persistence unit.
///
/// With a configured directory each unit is the file `{directory}/{unit}.db`;
/// otherwise each unit is a shared in-memory database named after the unit.
#[derive(Debug, Clone, Default)]
pub struct SqliteSessionProvider {
    config: SqliteBackendConfig,
}

impl SqliteSessionProvider {
    /// Creates a provider using `config` for every unit.
    pub fn new(config: SqliteBackendConfig) -> Self {
        Self { config }
    }
}

impl SessionProvider for SqliteSessionProvider {
    type Session = SqliteBackend;

    fn open(&self, unit: &str) -> RepositoryResult<SqliteBackend> {
        match &self.config.directory {
            Some(directory) => {
                SqliteBackend::with_config(directory.join(format!("{}.db", unit)), self.config.clone())
            }
            None => SqliteBackend::memory_with_config(unit, self.config.clone()),
        }
    }

    fn close(&self, unit: &str, session: &SqliteBackend) -> RepositoryResult<()> {
        session.close();
        info!(unit, "Closed SQLite unit");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: SqliteBackendConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.busy_timeout_ms, 5000);
        assert!(config.enable_wal);
        assert!(config.directory.is_none());
        assert_eq!(config.identifier_pattern, DEFAULT_IDENTIFIER_PATTERN);
    }

    #[test]
    fn test_invalid_identifier_pattern() {
        let config = SqliteBackendConfig {
            identifier_pattern: "([a-z".to_string(),
            ..Default::default()
        };
        let err = SqliteBackend::memory_with_config("bad-pattern", config).unwrap_err();
        assert!(err.to_string().contains("([a-z"));
    }

    #[test]
    fn test_exhausted_pool_is_connection_failure() {
        let config = SqliteBackendConfig {
            max_connections: 1,
            min_connections: 1,
            connection_timeout_ms: 50,
            ..Default::default()
        };
        let backend = SqliteBackend::memory_with_config("exhausted-pool", config).unwrap();
        let _held = backend.get_connection().unwrap();

        let err = backend.get_connection().unwrap_err();
        assert!(matches!(
            err,
            crate::error::RepositoryError::Backend(BackendError::ConnectionFailed { .. })
        ));
        assert!(err.to_string().starts_with("connection failed to sqlite"));
    }

    #[test]
    fn test_in_memory_units_are_isolated() {
        let a = SqliteBackend::in_memory().unwrap();
        let b = SqliteBackend::in_memory().unwrap();
        assert!(a.is_memory());
        assert_ne!(a.location(), b.location());
    }

    #[test]
    fn test_frames_are_per_thread() {
        let backend = SqliteBackend::in_memory().unwrap();
        assert!(backend.current_frame().is_none());

        let session = backend.open_session().unwrap();
        {
            let _guard = backend.push_frame(session);
            assert!(backend.current_frame().is_some());

            std::thread::scope(|s| {
                s.spawn(|| assert!(backend.current_frame().is_none()));
            });
        }
        assert!(backend.current_frame().is_none());
    }

    #[test]
    fn test_local_session_is_shared() {
        let backend = SqliteBackend::in_memory().unwrap();
        let first = backend.local_session().unwrap();
        let second = backend.local_session().unwrap();
        assert!(first.same_session(&second));
    }

    #[test]
    fn test_provider_opens_files_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let provider = SqliteSessionProvider::new(SqliteBackendConfig {
            directory: Some(dir.path().to_path_buf()),
            ..Default::default()
        });
        let backend = provider.open("orders").unwrap();
        assert!(!backend.is_memory());
        assert!(dir.path().join("orders.db").exists());
    }
}
