//! Entity extension composition.
//!
//! An expandable entity may carry an extension: a satellite record stored by
//! its own repository and linked through `relatedEntityId`. The repository
//! engine keeps the pair in step:
//!
//! - persist writes the extension with its id and `relatedEntityId` forced to
//!   the primary's id
//! - update updates the existing extension (keeping its id) or creates one
//! - remove deletes the extension before the primary
//! - find attaches the extension; none found is not an error
//!
//! Bulk reads (`find_all`) never attach extensions.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::RepositoryResult;
use crate::query::{Query, field};
use crate::types::{Entity, ExpandableEntity, ExtensionEntity, RELATED_ENTITY_ID};

use super::Repository;

/// Lifecycle callbacks the engine invokes around primary entity writes.
pub trait ExtensionHook<T>: Send + Sync {
    /// Called after the primary row was inserted.
    fn on_persist(&self, entity: &mut T) -> RepositoryResult<()>;

    /// Called after the primary row was updated.
    fn on_update(&self, entity: &mut T) -> RepositoryResult<()>;

    /// Called before the primary row is deleted.
    fn on_remove(&self, entity: &T) -> RepositoryResult<()>;

    /// Attaches the stored extension to a loaded primary entity.
    fn compose(&self, entity: &mut T) -> RepositoryResult<()>;
}

/// Resolves the repository storing the extension of `T`.
pub trait ExtensionRepositoryLocator<T: ExpandableEntity>: Send + Sync {
    /// Returns the extension repository, if one is registered.
    fn find(&self) -> Option<Arc<dyn Repository<T::Extension>>>;
}

/// Extension repositories keyed by primary entity type.
#[derive(Default)]
pub struct ExtensionRegistry {
    repositories: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("registered", &self.repositories.read().len())
            .finish()
    }
}

impl ExtensionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the extension repository of primary type `T`.
    pub fn register<T: ExpandableEntity>(&self, repository: Arc<dyn Repository<T::Extension>>) {
        self.repositories
            .write()
            .insert(TypeId::of::<T>(), Box::new(repository));
    }

    /// Removes the extension repository of primary type `T`.
    pub fn unregister<T: ExpandableEntity>(&self) -> bool {
        self.repositories.write().remove(&TypeId::of::<T>()).is_some()
    }
}

impl<T: ExpandableEntity> ExtensionRepositoryLocator<T> for ExtensionRegistry {
    fn find(&self) -> Option<Arc<dyn Repository<T::Extension>>> {
        self.repositories
            .read()
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.downcast_ref::<Arc<dyn Repository<T::Extension>>>())
            .cloned()
    }
}

/// The [`ExtensionHook`] for expandable entities.
pub struct ExtensionComposer<T: ExpandableEntity> {
    locator: Arc<dyn ExtensionRepositoryLocator<T>>,
}

impl<T: ExpandableEntity> ExtensionComposer<T> {
    /// Creates a composer resolving extension repositories through `locator`.
    pub fn new(locator: Arc<dyn ExtensionRepositoryLocator<T>>) -> Self {
        Self { locator }
    }

    fn repository(&self) -> Option<Arc<dyn Repository<T::Extension>>> {
        let repository = self.locator.find();
        if repository.is_none() {
            debug!(
                entity_type = T::descriptor().entity_name(),
                "No extension repository registered"
            );
        }
        repository
    }

    fn related_to(primary: &T) -> Query {
        field(RELATED_ENTITY_ID).equal_to(primary.id())
    }
}

impl<T: ExpandableEntity> ExtensionHook<T> for ExtensionComposer<T> {
    fn on_persist(&self, entity: &mut T) -> RepositoryResult<()> {
        let Some(mut extension) = entity.extension().cloned() else {
            return Ok(());
        };
        let Some(repository) = self.repository() else {
            return Ok(());
        };

        extension.setup_extension_fields(entity.id(), entity.id());
        let saved = repository.persist(extension)?;
        entity.set_extension(Some(saved));
        Ok(())
    }

    fn on_update(&self, entity: &mut T) -> RepositoryResult<()> {
        let Some(mut extension) = entity.extension().cloned() else {
            return Ok(());
        };
        let Some(repository) = self.repository() else {
            return Ok(());
        };

        let saved = match repository.find_by_query(&Self::related_to(entity)) {
            Ok(existing) => {
                extension.setup_extension_fields(existing.id(), entity.id());
                extension.meta_mut().version = existing.version();
                repository.update(extension)?
            }
            Err(e) if e.is_no_result() => {
                debug!(
                    entity_type = T::descriptor().entity_name(),
                    id = entity.id(),
                    "Creating missing extension on update"
                );
                extension.setup_extension_fields(entity.id(), entity.id());
                repository.persist(extension)?
            }
            Err(e) => return Err(e),
        };
        entity.set_extension(Some(saved));
        Ok(())
    }

    fn on_remove(&self, entity: &T) -> RepositoryResult<()> {
        let Some(extension) = entity.extension() else {
            return Ok(());
        };
        let Some(repository) = self.repository() else {
            return Ok(());
        };
        repository.remove(extension.id())
    }

    fn compose(&self, entity: &mut T) -> RepositoryResult<()> {
        let Some(repository) = self.repository() else {
            return Ok(());
        };

        match repository.find_by_query(&Self::related_to(entity)) {
            Ok(extension) => {
                entity.set_extension(Some(extension));
                Ok(())
            }
            Err(e) if e.is_no_result() => {
                debug!(
                    entity_type = T::descriptor().entity_name(),
                    id = entity.id(),
                    "No extension found"
                );
                entity.set_extension(None);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
