use tracing::debug;

use crate::error::{ConstraintError, QueryError, RepositoryResult};
use crate::query::{Query, field};
use crate::repository::Repository;
use crate::types::{Entity, UniqueGroup};

use super::ConstraintValidator;

/// Rejects entities whose uniqueness group values are held by another row.
///
/// For each group declared on the descriptor the validator looks up a row
/// matching `f1 = v1 AND f2 = v2 ...`. A match with a different id is a
/// [`ConstraintError::DuplicateEntity`]. Groups naming `relation_field` read
/// the related entity's field and filter on `relation.field`. A group with a
/// null member is skipped since null never collides.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateConstraintValidator;

impl DuplicateConstraintValidator {
    /// Builds the lookup filter for one group, or `None` if a member is null.
    pub fn group_filter<T: Entity>(entity: &T, group: &UniqueGroup) -> RepositoryResult<Option<Query>> {
        let descriptor = T::descriptor();
        let mut filter: Option<Query> = None;

        for column in group.columns() {
            let accessor = descriptor.path(column).ok_or_else(|| QueryError::UnknownField {
                entity_type: descriptor.entity_name().to_string(),
                path: column.clone(),
            })?;

            let value = accessor.get(entity);
            if value.is_null() {
                return Ok(None);
            }

            let condition = field(accessor.path()).equal_to(value);
            filter = Some(match filter {
                Some(existing) => existing.and(condition),
                None => condition,
            });
        }

        Ok(filter)
    }
}

impl<T: Entity> ConstraintValidator<T> for DuplicateConstraintValidator {
    fn check(&self, entity: &T, repository: &dyn Repository<T>) -> RepositoryResult<()> {
        let descriptor = T::descriptor();

        for group in descriptor.unique_groups() {
            let Some(filter) = Self::group_filter(entity, group)? else {
                continue;
            };

            match repository.find_by_query(&filter) {
                Ok(found) if found.id() != entity.id() => {
                    debug!(
                        entity_type = descriptor.entity_name(),
                        existing_id = found.id(),
                        filter = %filter,
                        "Duplicate entity detected"
                    );
                    return Err(ConstraintError::DuplicateEntity {
                        entity_type: descriptor.entity_name().to_string(),
                        columns: group.columns().to_vec(),
                    }
                    .into());
                }
                Ok(_) => {}
                Err(e) if e.is_no_result() => {
                    debug!(
                        entity_type = descriptor.entity_name(),
                        filter = %filter,
                        "No duplicate found"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }
}
