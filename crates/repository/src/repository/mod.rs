//! The generic repository engine.
//!
//! [`BaseRepository`] implements [`Repository`] for any [`Entity`] on top of
//! a [`TransactionAdapter`]. Each operation declares its propagation:
//!
//! | Operation                          | Propagation |
//! |------------------------------------|-------------|
//! | `persist`, `update`, `remove*`     | REQUIRED    |
//! | `find*`, `find_all`, `count_all`   | SUPPORTS    |
//!
//! Under a manually managed adapter, mutating operations begin a transaction
//! when none is active, commit on success and roll back on any error.

pub mod extension;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::constraints::ValidatorRegistry;
use crate::core::{Propagation, Selection, StorageContext, TransactionAdapter};
use crate::error::{EntityError, QueryError, RepositoryError, RepositoryResult};
use crate::query::{PredicateCompiler, Query, QueryBuilder, QueryOrder, field};
use crate::types::{Entity, ExpandableEntity, ID_FIELD, PageWindow, PaginatedResult};

use extension::{ExtensionComposer, ExtensionHook, ExtensionRepositoryLocator};

/// Extra work run inside the transaction of a write, after the write.
pub type SideTask<'a> = Box<dyn FnOnce() -> RepositoryResult<()> + 'a>;

/// Repository operations for one entity type.
pub trait Repository<T: Entity>: Send + Sync {
    /// Persists a new entity and returns it with its assigned id.
    fn persist(&self, entity: T) -> RepositoryResult<T> {
        self.persist_with(entity, None)
    }

    /// Persists a new entity, then runs `task` in the same transaction.
    fn persist_with(&self, entity: T, task: Option<SideTask<'_>>) -> RepositoryResult<T>;

    /// Updates an existing entity.
    fn update(&self, entity: T) -> RepositoryResult<T> {
        self.update_with(entity, None)
    }

    /// Updates an existing entity, then runs `task` in the same transaction.
    fn update_with(&self, entity: T, task: Option<SideTask<'_>>) -> RepositoryResult<T>;

    /// Removes the entity with `id`.
    fn remove(&self, id: i64) -> RepositoryResult<()> {
        self.remove_with(id, None)
    }

    /// Removes the entity with `id`, then runs `task` in the same transaction.
    fn remove_with(&self, id: i64, task: Option<SideTask<'_>>) -> RepositoryResult<()>;

    /// Removes a stored entity.
    fn remove_entity(&self, entity: &T) -> RepositoryResult<()> {
        self.remove(entity.id())
    }

    /// Removes each id in turn.
    fn remove_all_by_ids(&self, ids: &[i64]) -> RepositoryResult<()> {
        ids.iter().try_for_each(|id| self.remove(*id))
    }

    /// Removes each entity in turn.
    fn remove_all_entities(&self, entities: &[T]) -> RepositoryResult<()> {
        entities.iter().try_for_each(|entity| self.remove_entity(entity))
    }

    /// Removes every row. Loads all rows first.
    fn remove_all(&self) -> RepositoryResult<()> {
        let all = self.find_all(-1, -1, None, None)?;
        self.remove_all_entities(&all.results)
    }

    /// Finds the entity with `id`.
    fn find(&self, id: i64) -> RepositoryResult<T> {
        self.find_by_query(&field(ID_FIELD).equal_to(id))
    }

    /// Finds the single entity matching filter text.
    fn find_by_filter(&self, filter: &str) -> RepositoryResult<T> {
        let query = self
            .query_builder()
            .create_query_filter(filter)
            .ok_or_else(|| QueryError::Malformed {
                filter: filter.to_string(),
            })?;
        self.find_by_query(&query)
    }

    /// Finds the single entity matching `query`.
    fn find_by_query(&self, query: &Query) -> RepositoryResult<T>;

    /// Reads a page of entities. Non-positive `page_size` or `page` reads all.
    fn find_all(
        &self,
        page_size: i32,
        page: i32,
        filter: Option<&Query>,
        order: Option<&QueryOrder>,
    ) -> RepositoryResult<PaginatedResult<T>>;

    /// Counts entities matching `filter`.
    fn count_all(&self, filter: Option<&Query>) -> RepositoryResult<u64>;

    /// A builder for filters on this repository.
    fn query_builder(&self) -> QueryBuilder {
        QueryBuilder::new()
    }
}

type Predicate<A> = <<A as TransactionAdapter>::Context as StorageContext>::Predicate;

/// The generic repository implementation.
pub struct BaseRepository<T: Entity, A: TransactionAdapter> {
    adapter: Arc<A>,
    validators: ValidatorRegistry<T>,
    extension: Option<Box<dyn ExtensionHook<T>>>,
}

impl<T: Entity, A: TransactionAdapter> std::fmt::Debug for BaseRepository<T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseRepository")
            .field("entity_type", &T::descriptor().entity_name())
            .field("validators", &self.validators)
            .field("extensions", &self.extension.is_some())
            .finish()
    }
}

impl<T: Entity, A: TransactionAdapter> BaseRepository<T, A> {
    /// Creates a repository with the default validators.
    pub fn new(adapter: Arc<A>) -> Self {
        Self {
            adapter,
            validators: ValidatorRegistry::with_defaults(),
            extension: None,
        }
    }

    /// Replaces the validator registry.
    pub fn with_validators(mut self, validators: ValidatorRegistry<T>) -> Self {
        self.validators = validators;
        self
    }

    /// Installs an extension hook.
    pub fn with_extension_hook(mut self, hook: Box<dyn ExtensionHook<T>>) -> Self {
        self.extension = Some(hook);
        self
    }

    /// The transaction adapter.
    pub fn adapter(&self) -> &Arc<A> {
        &self.adapter
    }

    /// The entity type name.
    pub fn entity_type(&self) -> &'static str {
        T::descriptor().entity_name()
    }

    fn not_found(&self, id: i64) -> RepositoryError {
        EntityError::NotFound {
            entity_type: self.entity_type().to_string(),
            id,
        }
        .into()
    }

    fn compile(&self, ctx: &A::Context, query: &Query) -> RepositoryResult<Predicate<A>> {
        PredicateCompiler::new(T::descriptor().schema(), ctx.predicate_factory()).compile(query)
    }

    /// Runs a write, demarcating the transaction when the adapter does not.
    fn in_unit_of_work<R>(
        &self,
        ctx: &A::Context,
        work: impl FnOnce() -> RepositoryResult<R>,
    ) -> RepositoryResult<R> {
        if self.adapter.is_container_managed() || ctx.is_transaction_active() {
            return work();
        }

        ctx.begin()?;
        let result = work().and_then(|value| ctx.commit().map(|_| value));
        if result.is_err() && ctx.is_transaction_active() {
            if let Err(e) = ctx.rollback() {
                warn!(entity_type = self.entity_type(), error = %e, "Rollback failed");
            }
        }
        result
    }

    fn do_remove(&self, ctx: &A::Context, mut entity: T) -> RepositoryResult<()> {
        if let Some(hook) = &self.extension {
            hook.compose(&mut entity)?;
            hook.on_remove(&entity)?;
        }
        ctx.delete::<T>(entity.id())
    }
}

impl<T: ExpandableEntity, A: TransactionAdapter> BaseRepository<T, A> {
    /// Enables extension composition through `locator`.
    pub fn with_extensions(self, locator: Arc<dyn ExtensionRepositoryLocator<T>>) -> Self {
        self.with_extension_hook(Box::new(ExtensionComposer::new(locator)))
    }
}

impl<T: Entity, A: TransactionAdapter> Repository<T> for BaseRepository<T, A> {
    fn persist_with(&self, mut entity: T, task: Option<SideTask<'_>>) -> RepositoryResult<T> {
        debug!(entity_type = self.entity_type(), "Persisting entity");

        self.adapter.run_value(Propagation::Required, |ctx| {
            self.in_unit_of_work(ctx, || {
                self.validators.run_check(&entity, self)?;

                let now = Utc::now();
                let meta = entity.meta_mut();
                meta.version = 1;
                meta.created_at = now;
                meta.modified_at = now;
                ctx.insert(&mut entity)?;

                if let Some(hook) = &self.extension {
                    hook.on_persist(&mut entity)?;
                }
                if let Some(task) = task {
                    task()?;
                }
                debug!(entity_type = self.entity_type(), id = entity.id(), "Entity persisted");
                Ok(entity)
            })
        })
    }

    fn update_with(&self, mut entity: T, task: Option<SideTask<'_>>) -> RepositoryResult<T> {
        let id = entity.id();
        debug!(entity_type = self.entity_type(), id, "Updating entity");

        self.adapter.run_value(Propagation::Required, |ctx| {
            self.in_unit_of_work(ctx, || {
                if id <= 0 {
                    return Err(self.not_found(id));
                }
                self.validators.run_check(&entity, self)?;

                let stored: T = ctx.load(id)?.ok_or_else(|| self.not_found(id))?;
                entity.set_owner_id(stored.owner_id());
                entity.meta_mut().created_at = stored.meta().created_at;
                if !ctx.is_managed::<T>(id) {
                    entity.meta_mut().version += 1;
                }
                entity.meta_mut().modified_at = Utc::now();

                let mut updated = ctx.merge(entity)?;
                if let Some(hook) = &self.extension {
                    hook.on_update(&mut updated)?;
                }
                if let Some(task) = task {
                    task()?;
                }
                Ok(updated)
            })
        })
    }

    fn remove_with(&self, id: i64, task: Option<SideTask<'_>>) -> RepositoryResult<()> {
        debug!(entity_type = self.entity_type(), id, "Removing entity");

        self.adapter.run_void(Propagation::Required, |ctx| {
            self.in_unit_of_work(ctx, || {
                let entity: T = ctx.load(id)?.ok_or_else(|| self.not_found(id))?;
                self.do_remove(ctx, entity)?;
                if let Some(task) = task {
                    task()?;
                }
                Ok(())
            })
        })
    }

    fn find_by_query(&self, query: &Query) -> RepositoryResult<T> {
        debug!(entity_type = self.entity_type(), filter = %query, "Finding entity");

        self.adapter.run_value(Propagation::Supports, |ctx| {
            let predicate = self.compile(ctx, query)?;
            let selection = Selection::all().filter(Some(&predicate)).limit(2);
            let rows = ctx
                .select::<T>(&selection)
                .map_err(|e| RepositoryError::generic("find", e))?;

            let mut rows = rows.into_iter();
            let mut entity = match (rows.next(), rows.next()) {
                (Some(entity), None) => entity,
                (None, _) => {
                    return Err(EntityError::NoResult {
                        entity_type: self.entity_type().to_string(),
                    }
                    .into());
                }
                (Some(_), Some(_)) => {
                    return Err(RepositoryError::Generic {
                        message: format!(
                            "generic error while executing find: more than one {} matches '{}'",
                            self.entity_type(),
                            query
                        ),
                        source: None,
                    });
                }
            };

            ctx.detach::<T>(entity.id());
            if let Some(hook) = &self.extension {
                hook.compose(&mut entity)?;
            }
            Ok(entity)
        })
    }

    fn find_all(
        &self,
        page_size: i32,
        page: i32,
        filter: Option<&Query>,
        order: Option<&QueryOrder>,
    ) -> RepositoryResult<PaginatedResult<T>> {
        debug!(entity_type = self.entity_type(), page_size, page, "Finding all entities");

        self.adapter.run_value(Propagation::Supports, |ctx| {
            let predicate = filter.map(|q| self.compile(ctx, q)).transpose()?;
            let selection = Selection::all().filter(predicate.as_ref()).order(order);

            if !PageWindow::is_enabled(page_size, page) {
                let results = ctx.select::<T>(&selection)?;
                return Ok(PaginatedResult::unpaginated(results, page, page_size));
            }

            let count = ctx.count::<T>(predicate.as_ref())?;
            let window = PageWindow::resolve(page_size, page, count);
            let results = ctx.select::<T>(&selection.window(window.offset, window.limit))?;
            Ok(PaginatedResult::new(
                results,
                page,
                page_size,
                window.last_page,
                window.next_page,
            ))
        })
    }

    fn count_all(&self, filter: Option<&Query>) -> RepositoryResult<u64> {
        debug!(
            entity_type = self.entity_type(),
            filter = %filter.map(Query::definition).unwrap_or_default(),
            "Counting entities"
        );

        self.adapter.run_value(Propagation::Supports, |ctx| {
            let predicate = filter.map(|q| self.compile(ctx, q)).transpose()?;
            ctx.count::<T>(predicate.as_ref())
        })
    }
}
