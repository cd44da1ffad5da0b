//! Constraint validation run before every persist and update.
//!
//! A [`ValidatorRegistry`] holds any number of [`ConstraintValidator`]s. The
//! repository engine runs all of them before writing; the first error aborts
//! the operation. [`DuplicateConstraintValidator`] enforces the uniqueness
//! groups declared on the entity descriptor.

mod duplicate;

use std::sync::Arc;

use crate::error::RepositoryResult;
use crate::repository::Repository;
use crate::types::Entity;

pub use duplicate::DuplicateConstraintValidator;

/// Checks an entity before it is written.
pub trait ConstraintValidator<T: Entity>: Send + Sync {
    /// Fails if `entity` may not be written. `repository` is the repository
    /// about to write it and runs inside the same transaction.
    fn check(&self, entity: &T, repository: &dyn Repository<T>) -> RepositoryResult<()>;
}

/// The validators run for one entity type.
pub struct ValidatorRegistry<T: Entity> {
    validators: Vec<Arc<dyn ConstraintValidator<T>>>,
}

impl<T: Entity> Clone for ValidatorRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            validators: self.validators.clone(),
        }
    }
}

impl<T: Entity> std::fmt::Debug for ValidatorRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("validators", &self.validators.len())
            .finish()
    }
}

impl<T: Entity> Default for ValidatorRegistry<T> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl<T: Entity> ValidatorRegistry<T> {
    /// Creates a registry with no validators.
    pub fn empty() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    /// Creates a registry holding the [`DuplicateConstraintValidator`].
    pub fn with_defaults() -> Self {
        Self::empty().register(DuplicateConstraintValidator)
    }

    /// Adds a validator.
    pub fn register(mut self, validator: impl ConstraintValidator<T> + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Number of registered validators.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Returns true if no validator is registered.
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Runs every validator against `entity`.
    pub fn run_check(&self, entity: &T, repository: &dyn Repository<T>) -> RepositoryResult<()> {
        for validator in &self.validators {
            validator.check(entity, repository)?;
        }
        Ok(())
    }
}
