//! Transaction adapters over a [`SqliteBackend`].

use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::{Propagation, PropagationAction, StorageContext, TransactionAdapter};
use crate::error::{RepositoryResult, TransactionError};

use super::backend::SqliteBackend;
use super::session::SqliteSession;

/// A container-managed adapter.
///
/// Every unit of work runs in a frame on the calling thread's frame stack.
/// Joining reuses the innermost frame; beginning pushes a frame holding a new
/// session and transaction, committed when the work succeeds and rolled back
/// when it fails. Suspension is native: the outer frame stays on the stack,
/// untouched, until the inner one is popped.
///
/// The suspended transaction keeps its connection and its locks. Once it has
/// written, SQLite holds the database write lock (file units) or the table
/// locks of the shared cache (in-memory units) until it ends, so a second
/// connection would wait out the busy timeout or fail with `SQLITE_LOCKED`.
/// Suspending such a transaction therefore fails at once with
/// [`TransactionError::SuspensionBlocked`]:
///
/// - `REQUIRES_NEW` is rejected on every unit.
/// - `NOT_SUPPORTED` is rejected on in-memory units. File units run it as a
///   WAL reader; a write inside it still waits for the outer transaction.
///
/// Suspending a transaction that has only read is always allowed.
#[derive(Debug, Clone)]
pub struct SqliteTransactionAdapter {
    backend: Arc<SqliteBackend>,
}

impl SqliteTransactionAdapter {
    /// Creates an adapter over `backend`.
    pub fn new(backend: Arc<SqliteBackend>) -> Self {
        Self { backend }
    }

    /// The backend this adapter runs on.
    pub fn backend(&self) -> &Arc<SqliteBackend> {
        &self.backend
    }

    fn run_in_transaction<R, F>(&self, propagation: Propagation, work: F) -> RepositoryResult<R>
    where
        F: FnOnce(&SqliteSession) -> RepositoryResult<R>,
    {
        let session = self.backend.open_session()?;
        let _frame = self.backend.push_frame(session.clone());
        session.begin()?;
        debug!(%propagation, "Began transaction");

        match work(&session) {
            Ok(value) => {
                session.commit()?;
                debug!(%propagation, "Committed transaction");
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_error) = session.rollback() {
                    warn!(error = %rollback_error, "Rollback failed");
                }
                debug!(%propagation, error = %e, "Rolled back transaction");
                Err(e)
            }
        }
    }

    fn check_suspendable(
        &self,
        propagation: Propagation,
        action: PropagationAction,
        outer: Option<&SqliteSession>,
    ) -> RepositoryResult<()> {
        let blocked = match action {
            PropagationAction::SuspendAndBegin => true,
            PropagationAction::SuspendAndRunUnmanaged => self.backend.is_memory(),
            _ => false,
        };
        if blocked && outer.is_some_and(SqliteSession::has_pending_writes) {
            warn!(%propagation, "Outer transaction holds uncommitted writes");
            return Err(TransactionError::SuspensionBlocked { propagation }.into());
        }
        Ok(())
    }

    fn run_unmanaged<R, F>(&self, work: F) -> RepositoryResult<R>
    where
        F: FnOnce(&SqliteSession) -> RepositoryResult<R>,
    {
        let session = self.backend.open_session()?;
        let _frame = self.backend.push_frame(session.clone());
        work(&session)
    }
}

impl TransactionAdapter for SqliteTransactionAdapter {
    type Context = SqliteSession;

    fn is_container_managed(&self) -> bool {
        true
    }

    fn run_value<R, F>(&self, propagation: Propagation, work: F) -> RepositoryResult<R>
    where
        F: FnOnce(&SqliteSession) -> RepositoryResult<R>,
    {
        let current = self.backend.current_frame();
        let active = current
            .as_ref()
            .is_some_and(|session| session.is_transaction_active());

        let action = PropagationAction::resolve(propagation, active)?;
        self.check_suspendable(propagation, action, current.as_ref())?;

        match (action, current) {
            (PropagationAction::Join | PropagationAction::RunUnmanaged, Some(session)) => {
                work(&session)
            }
            (PropagationAction::Begin | PropagationAction::SuspendAndBegin, _) => {
                self.run_in_transaction(propagation, work)
            }
            (_, _) => self.run_unmanaged(work),
        }
    }
}

/// A manually managed adapter.
///
/// All adapters built over the same backend share one local session. The
/// adapter never begins or commits: the repository engine demarcates its own
/// writes. Suspension is not available, so `REQUIRES_NEW` and
/// `NOT_SUPPORTED` fail while a transaction is active.
#[derive(Debug, Clone)]
pub struct LocalTransactionAdapter {
    backend: Arc<SqliteBackend>,
    session: SqliteSession,
}

impl LocalTransactionAdapter {
    /// Creates an adapter over the local session of `backend`.
    pub fn new(backend: Arc<SqliteBackend>) -> RepositoryResult<Self> {
        let session = backend.local_session()?;
        Ok(Self { backend, session })
    }

    /// The backend this adapter runs on.
    pub fn backend(&self) -> &Arc<SqliteBackend> {
        &self.backend
    }

    /// The shared local session, for callers demarcating transactions
    /// around several repository calls.
    pub fn session(&self) -> &SqliteSession {
        &self.session
    }
}

impl TransactionAdapter for LocalTransactionAdapter {
    type Context = SqliteSession;

    fn is_container_managed(&self) -> bool {
        false
    }

    fn run_value<R, F>(&self, propagation: Propagation, work: F) -> RepositoryResult<R>
    where
        F: FnOnce(&SqliteSession) -> RepositoryResult<R>,
    {
        let action = PropagationAction::resolve(propagation, self.session.is_transaction_active())?;
        if action.suspends() {
            return Err(TransactionError::SuspensionNotSupported { propagation }.into());
        }
        work(&self.session)
    }
}
