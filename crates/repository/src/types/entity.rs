//! Entity traits and persistence metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::descriptor::EntityDescriptor;

/// Persistence metadata carried by every entity.
///
/// `id` is 0 until the entity is first persisted. `version` starts at 1 and
/// grows by one on every successful update. Both timestamps are set by the
/// repository engine, never by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMeta {
    /// Identity, 0 for unsaved entities.
    pub id: i64,

    /// Optimistic-lock version.
    #[serde(rename = "entityVersion")]
    pub version: i32,

    /// When the entity was first persisted.
    #[serde(rename = "entityCreateDate")]
    pub created_at: DateTime<Utc>,

    /// When the entity was last written.
    #[serde(rename = "entityModifyDate")]
    pub modified_at: DateTime<Utc>,
}

impl Default for EntityMeta {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            version: 1,
            created_at: now,
            modified_at: now,
        }
    }
}

impl EntityMeta {
    /// Returns true if the entity has not been persisted yet.
    pub fn is_transient(&self) -> bool {
        self.id == 0
    }
}

/// An entity managed by a repository.
///
/// Implementors describe their storage shape once through
/// [`Entity::descriptor`], usually held in a `LazyLock`.
pub trait Entity: Clone + Default + std::fmt::Debug + Send + Sync + 'static {
    /// The declarative description of this entity type.
    fn descriptor() -> &'static EntityDescriptor<Self>;

    /// Persistence metadata.
    fn meta(&self) -> &EntityMeta;

    /// Mutable persistence metadata.
    fn meta_mut(&mut self) -> &mut EntityMeta;

    /// The entity's identity.
    fn id(&self) -> i64 {
        self.meta().id
    }

    /// The entity's version.
    fn version(&self) -> i32 {
        self.meta().version
    }

    /// The owning user, for owned entities.
    ///
    /// Ownership is fixed at creation: `update` always restores the stored
    /// owner.
    fn owner_id(&self) -> Option<i64> {
        None
    }

    /// Sets the owning user. A no-op for entities without ownership.
    fn set_owner_id(&mut self, _owner_id: Option<i64>) {}
}

/// Field name linking an extension to its primary entity.
pub const RELATED_ENTITY_ID: &str = "relatedEntityId";

/// A satellite record sharing its identity with a primary entity.
///
/// The descriptor of an extension type must declare a `relatedEntityId` long
/// field.
pub trait ExtensionEntity: Entity {
    /// The id of the primary entity.
    fn related_entity_id(&self) -> i64;

    /// Sets the id of the primary entity.
    fn set_related_entity_id(&mut self, id: i64);

    /// Forces identity and relation fields before the extension is written.
    fn setup_extension_fields(&mut self, id: i64, primary_id: i64) {
        self.meta_mut().id = id;
        self.set_related_entity_id(primary_id);
    }
}

/// A primary entity that may carry an extension payload.
pub trait ExpandableEntity: Entity {
    /// The extension type.
    type Extension: ExtensionEntity;

    /// The extension payload, if any.
    fn extension(&self) -> Option<&Self::Extension>;

    /// Replaces the extension payload.
    fn set_extension(&mut self, extension: Option<Self::Extension>);
}
