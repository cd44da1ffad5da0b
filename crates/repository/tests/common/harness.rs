//! Test harness wiring fixture repositories to a SQLite backend.

use std::path::Path;
use std::sync::Arc;

use helios_repository::backends::sqlite::{
    LocalTransactionAdapter, SqliteBackend, SqliteBackendConfig, SqliteTransactionAdapter,
};
use helios_repository::core::TransactionAdapter;
use helios_repository::repository::BaseRepository;
use helios_repository::repository::extension::ExtensionRegistry;
use helios_repository::repository::Repository;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use super::fixtures::{Author, Book, OwnedDocument, TestEntity, TestEntityDetails};

/// Installs a test subscriber once; output is enabled through `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A unique persistence unit name.
pub fn unique_unit(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

fn register_fixtures(backend: &SqliteBackend) {
    backend.register::<TestEntity>().expect("register TestEntity");
    backend
        .register::<TestEntityDetails>()
        .expect("register TestEntityDetails");
    backend
        .register::<OwnedDocument>()
        .expect("register OwnedDocument");
    backend.register::<Author>().expect("register Author");
    backend.register::<Book>().expect("register Book");
}

/// A fresh in-memory backend with every fixture table registered.
pub fn memory_backend() -> Arc<SqliteBackend> {
    init_tracing();
    let backend = SqliteBackend::memory_with_config(&unique_unit("test"), SqliteBackendConfig::default())
        .expect("Failed to create SQLite backend");
    register_fixtures(&backend);
    Arc::new(backend)
}

/// A file-backed backend under `dir`, needed where two connections write
/// concurrently.
pub fn file_backend(dir: &Path) -> Arc<SqliteBackend> {
    init_tracing();
    let backend = SqliteBackend::open(dir.join(format!("{}.db", unique_unit("test"))))
        .expect("Failed to create SQLite backend");
    register_fixtures(&backend);
    Arc::new(backend)
}

/// Fixture repositories sharing one adapter.
pub struct Repositories<A: TransactionAdapter + 'static> {
    pub adapter: Arc<A>,
    pub entities: BaseRepository<TestEntity, A>,
    pub details: Arc<BaseRepository<TestEntityDetails, A>>,
    pub documents: BaseRepository<OwnedDocument, A>,
    pub authors: BaseRepository<Author, A>,
    pub books: BaseRepository<Book, A>,
    pub extensions: Arc<ExtensionRegistry>,
}

impl<A: TransactionAdapter + 'static> Repositories<A> {
    /// Builds every fixture repository over `adapter`, with extension
    /// composition enabled for [`TestEntity`].
    pub fn new(adapter: Arc<A>) -> Self {
        let details = Arc::new(BaseRepository::new(Arc::clone(&adapter)));
        let extensions = Arc::new(ExtensionRegistry::new());
        let details_repository: Arc<dyn Repository<TestEntityDetails>> = details.clone();
        extensions.register::<TestEntity>(details_repository);

        Self {
            entities: BaseRepository::new(Arc::clone(&adapter)).with_extensions(extensions.clone()),
            details,
            documents: BaseRepository::new(Arc::clone(&adapter)),
            authors: BaseRepository::new(Arc::clone(&adapter)),
            books: BaseRepository::new(Arc::clone(&adapter)),
            extensions,
            adapter,
        }
    }
}

/// Container-managed repositories over `backend`.
pub fn managed(backend: Arc<SqliteBackend>) -> Repositories<SqliteTransactionAdapter> {
    Repositories::new(Arc::new(SqliteTransactionAdapter::new(backend)))
}

/// Manually managed repositories over `backend`.
pub fn local(backend: Arc<SqliteBackend>) -> Repositories<LocalTransactionAdapter> {
    Repositories::new(Arc::new(
        LocalTransactionAdapter::new(backend).expect("Failed to open local session"),
    ))
}
