//! The storage capability the repository engine runs on.

use crate::error::RepositoryResult;
use crate::query::{PredicateFactory, QueryOrder};
use crate::types::Entity;

/// Rows to read: an optional predicate, ordering and window.
#[derive(Debug)]
pub struct Selection<'a, P> {
    /// Filter; all rows when absent.
    pub predicate: Option<&'a P>,
    /// Ordering; storage order when absent.
    pub order: Option<&'a QueryOrder>,
    /// Rows to skip.
    pub offset: Option<u64>,
    /// Maximum rows to return.
    pub limit: Option<u64>,
}

impl<'a, P> Selection<'a, P> {
    /// Selects every row.
    pub fn all() -> Self {
        Self {
            predicate: None,
            order: None,
            offset: None,
            limit: None,
        }
    }

    /// Restricts to rows matching `predicate`.
    pub fn filter(mut self, predicate: Option<&'a P>) -> Self {
        self.predicate = predicate;
        self
    }

    /// Orders the rows.
    pub fn order(mut self, order: Option<&'a QueryOrder>) -> Self {
        self.order = order;
        self
    }

    /// Applies offset and limit.
    pub fn window(mut self, offset: u64, limit: u64) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }

    /// Applies a limit only.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A live storage session, joined to at most one transaction.
///
/// Contexts are handles: methods take `&self` and synchronise internally so
/// nested repository calls can share the same context.
///
/// The context tracks which rows were written in its current transaction.
/// Updating a tracked row lets the backend apply its own optimistic-lock
/// version increment; updating an untracked row writes the version supplied.
pub trait StorageContext {
    /// The native predicate type.
    type Predicate;

    /// The factory compiling queries into predicates.
    type Factory: PredicateFactory<Predicate = Self::Predicate>;

    /// The predicate factory for this backend.
    fn predicate_factory(&self) -> &Self::Factory;

    /// Returns true if a transaction is active on this context.
    fn is_transaction_active(&self) -> bool;

    /// Begins a transaction.
    fn begin(&self) -> RepositoryResult<()>;

    /// Commits the active transaction.
    fn commit(&self) -> RepositoryResult<()>;

    /// Rolls back the active transaction.
    fn rollback(&self) -> RepositoryResult<()>;

    /// Inserts a new row, assigning the id when it is 0.
    fn insert<T: Entity>(&self, entity: &mut T) -> RepositoryResult<()>;

    /// Writes the state of an existing row and returns it as stored.
    fn merge<T: Entity>(&self, entity: T) -> RepositoryResult<T>;

    /// Deletes a row by id.
    fn delete<T: Entity>(&self, id: i64) -> RepositoryResult<()>;

    /// Loads a row by id.
    fn load<T: Entity>(&self, id: i64) -> RepositoryResult<Option<T>>;

    /// Returns true if the row was written in the current transaction.
    fn is_managed<T: Entity>(&self, id: i64) -> bool;

    /// Stops tracking a row.
    fn detach<T: Entity>(&self, id: i64);

    /// Reads rows.
    fn select<T: Entity>(
        &self,
        selection: &Selection<'_, Self::Predicate>,
    ) -> RepositoryResult<Vec<T>>;

    /// Counts rows matching `predicate`.
    fn count<T: Entity>(&self, predicate: Option<&Self::Predicate>) -> RepositoryResult<u64>;
}
