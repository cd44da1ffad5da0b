#![cfg(feature = "sqlite")]

//! Extension composition tests.

mod common;

use helios_repository::error::{RepositoryError, RepositoryResult};
use helios_repository::repository::Repository;
use helios_repository::types::Entity;

use common::*;

fn with_details(unique: &str, field: &str, field2: i32) -> TestEntity {
    TestEntity {
        details: Some(details(field, field2)),
        ..test_entity(unique)
    }
}

// ============================================================================
// Persist / Find
// ============================================================================

/// The extension is stored under the primary's id.
#[test]
fn test_persist_writes_extension_with_primary_id() {
    let repos = managed(memory_backend());
    repos.entities.persist(test_entity("plain")).unwrap();

    let saved = repos.entities.persist(with_details("rich", "tall", 3)).unwrap();
    let stored = saved.details.as_ref().expect("extension persisted");
    assert_eq!(stored.id(), saved.id());
    assert_eq!(stored.related_entity_id, saved.id());
    assert_eq!(stored.version(), 1);
    assert_eq!(repos.details.count_all(None).unwrap(), 1);
}

/// find attaches the stored extension; an entity without one gets none.
#[test]
fn test_find_composes_extension() {
    let repos = managed(memory_backend());
    let rich = repos.entities.persist(with_details("rich", "wide", 9)).unwrap();
    let plain = repos.entities.persist(test_entity("plain")).unwrap();

    let found = repos.entities.find(rich.id()).unwrap();
    let extension = found.details.expect("extension composed");
    assert_eq!(extension.extension_field, "wide");
    assert_eq!(extension.extension_field2, 9);

    assert!(repos.entities.find(plain.id()).unwrap().details.is_none());

    let by_filter = repos.entities.find_by_filter("uniqueField = rich").unwrap();
    assert!(by_filter.details.is_some());
}

/// Bulk reads never compose extensions.
#[test]
fn test_find_all_does_not_compose() {
    let repos = managed(memory_backend());
    repos.entities.persist(with_details("rich", "deep", 1)).unwrap();

    let page = repos.entities.find_all(-1, -1, None, None).unwrap();
    assert_eq!(page.len(), 1);
    assert!(page.results[0].details.is_none());
}

// ============================================================================
// Update
// ============================================================================

/// Update creates a missing extension, then updates it in place.
#[test]
fn test_update_creates_then_reuses_extension() {
    let repos = managed(memory_backend());
    let saved = repos.entities.persist(test_entity("late")).unwrap();
    assert_eq!(repos.details.count_all(None).unwrap(), 0);

    let mut first = saved.clone();
    first.details = Some(details("v1", 1));
    let first = repos.entities.update(first).unwrap();
    let created = first.details.as_ref().expect("extension created");
    assert_eq!(created.id(), saved.id());
    assert_eq!(created.related_entity_id, saved.id());

    let mut second = first.clone();
    if let Some(extension) = second.details.as_mut() {
        extension.extension_field = "v2".to_string();
        extension.extension_field2 = 2;
    }
    let second = repos.entities.update(second).unwrap();
    let updated = second.details.as_ref().expect("extension updated");
    assert_eq!(updated.id(), created.id());
    assert_eq!(updated.version(), 2);

    assert_eq!(repos.details.count_all(None).unwrap(), 1);
    let found = repos.entities.find(saved.id()).unwrap();
    assert_eq!(found.details.map(|d| d.extension_field).as_deref(), Some("v2"));
}

/// The existing extension keeps its id even when the incoming copy carries
/// another one.
#[test]
fn test_update_keeps_existing_extension_id() {
    let repos = managed(memory_backend());
    let saved = repos.entities.persist(with_details("pinned", "a", 1)).unwrap();

    let mut changed = saved.clone();
    let mut stray = details("b", 2);
    stray.meta.id = 999;
    stray.related_entity_id = 12345;
    changed.details = Some(stray);
    let updated = repos.entities.update(changed).unwrap();

    let extension = updated.details.expect("extension updated");
    assert_eq!(extension.id(), saved.id());
    assert_eq!(extension.related_entity_id, saved.id());
    assert_eq!(extension.extension_field, "b");
    assert_eq!(repos.details.count_all(None).unwrap(), 1);
}

/// An update without an extension leaves the stored one untouched.
#[test]
fn test_update_without_extension_leaves_it() {
    let repos = managed(memory_backend());
    let saved = repos.entities.persist(with_details("kept", "x", 5)).unwrap();

    let mut changed = saved.clone();
    changed.details = None;
    changed.number_field = 1.5;
    repos.entities.update(changed).unwrap();

    let found = repos.entities.find(saved.id()).unwrap();
    assert_eq!(found.number_field, 1.5);
    assert_eq!(found.details.map(|d| d.extension_field2), Some(5));
}

// ============================================================================
// Remove
// ============================================================================

/// Removing the primary removes its extension.
#[test]
fn test_remove_deletes_extension() {
    let repos = managed(memory_backend());
    let saved = repos.entities.persist(with_details("doomed", "z", 0)).unwrap();
    let other = repos.entities.persist(with_details("spared", "y", 0)).unwrap();

    repos.entities.remove(saved.id()).unwrap();

    assert_eq!(repos.details.count_all(None).unwrap(), 1);
    assert!(repos.details.find(saved.id()).unwrap_err().is_no_result());
    assert!(repos.details.find(other.id()).is_ok());
}

// ============================================================================
// Registry
// ============================================================================

/// Without a registered extension repository, composition is skipped.
#[test]
fn test_missing_extension_repository_is_skipped() {
    let repos = managed(memory_backend());
    assert!(repos.extensions.unregister::<TestEntity>());

    let saved = repos.entities.persist(with_details("alone", "ignored", 4)).unwrap();
    assert_eq!(repos.details.count_all(None).unwrap(), 0);
    assert!(repos.entities.find(saved.id()).unwrap().details.is_none());

    repos.entities.remove(saved.id()).unwrap();
    assert_eq!(repos.entities.count_all(None).unwrap(), 0);
}

/// Under a manually managed adapter the extension write joins the primary's
/// transaction and rolls back with it.
#[test]
fn test_local_extension_rolls_back_with_primary() {
    let repos = local(memory_backend());

    let err = repos
        .entities
        .persist_with(
            with_details("undone", "never", 0),
            Some(Box::new(|| -> RepositoryResult<()> {
                assert_eq!(repos.details.count_all(None)?, 1);
                Err(RepositoryError::Generic {
                    message: "abort".to_string(),
                    source: None,
                })
            })),
        )
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Generic { .. }));
    assert_eq!(repos.entities.count_all(None).unwrap(), 0);
    assert_eq!(repos.details.count_all(None).unwrap(), 0);

    let saved = repos.entities.persist(with_details("stored", "kept", 0)).unwrap();
    assert_eq!(repos.details.count_all(None).unwrap(), 1);
    assert_eq!(saved.details.map(|d| d.id()), Some(saved.meta.id));
}
