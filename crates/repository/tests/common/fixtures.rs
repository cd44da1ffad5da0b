//! Fixture entities.

use std::sync::LazyLock;

use helios_repository::types::{
    Entity, EntityDescriptor, EntityMeta, ExpandableEntity, ExtensionEntity,
};

// ============================================================================
// TestEntity / TestEntityDetails
// ============================================================================

/// An entity with a simple and a combined uniqueness group and an extension.
#[derive(Debug, Clone, Default)]
pub struct TestEntity {
    pub meta: EntityMeta,
    pub unique_field: String,
    pub combined_unique_field1: Option<String>,
    pub combined_unique_field2: Option<String>,
    pub number_field: f64,
    pub details: Option<TestEntityDetails>,
}

static TEST_ENTITY: LazyLock<EntityDescriptor<TestEntity>> = LazyLock::new(|| {
    EntityDescriptor::builder("TestEntity", "test_entity")
        .field(
            "uniqueField",
            "unique_field",
            |e: &TestEntity| e.unique_field.clone(),
            |e, v| e.unique_field = v,
        )
        .field(
            "combinedUniqueField1",
            "combined_unique_field1",
            |e: &TestEntity| e.combined_unique_field1.clone(),
            |e, v| e.combined_unique_field1 = v,
        )
        .field(
            "combinedUniqueField2",
            "combined_unique_field2",
            |e: &TestEntity| e.combined_unique_field2.clone(),
            |e, v| e.combined_unique_field2 = v,
        )
        .field(
            "numberField",
            "number_field",
            |e: &TestEntity| e.number_field,
            |e, v| e.number_field = v,
        )
        .unique(&["uniqueField"])
        .unique(&["combinedUniqueField1", "combinedUniqueField2"])
        .build()
});

impl Entity for TestEntity {
    fn descriptor() -> &'static EntityDescriptor<Self> {
        &TEST_ENTITY
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
}

impl ExpandableEntity for TestEntity {
    type Extension = TestEntityDetails;

    fn extension(&self) -> Option<&TestEntityDetails> {
        self.details.as_ref()
    }

    fn set_extension(&mut self, extension: Option<TestEntityDetails>) {
        self.details = extension;
    }
}

/// The extension of [`TestEntity`].
#[derive(Debug, Clone, Default)]
pub struct TestEntityDetails {
    pub meta: EntityMeta,
    pub related_entity_id: i64,
    pub extension_field: String,
    pub extension_field2: i32,
}

static TEST_ENTITY_DETAILS: LazyLock<EntityDescriptor<TestEntityDetails>> = LazyLock::new(|| {
    EntityDescriptor::builder("TestEntityDetails", "test_entity_details")
        .field(
            "relatedEntityId",
            "related_entity_id",
            |e: &TestEntityDetails| e.related_entity_id,
            |e, v| e.related_entity_id = v,
        )
        .field(
            "extensionField",
            "extension_field",
            |e: &TestEntityDetails| e.extension_field.clone(),
            |e, v| e.extension_field = v,
        )
        .field(
            "extensionField2",
            "extension_field2",
            |e: &TestEntityDetails| e.extension_field2,
            |e, v| e.extension_field2 = v,
        )
        .build()
});

impl Entity for TestEntityDetails {
    fn descriptor() -> &'static EntityDescriptor<Self> {
        &TEST_ENTITY_DETAILS
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
}

impl ExtensionEntity for TestEntityDetails {
    fn related_entity_id(&self) -> i64 {
        self.related_entity_id
    }

    fn set_related_entity_id(&mut self, id: i64) {
        self.related_entity_id = id;
    }
}

/// Builds a test entity with a unique value and distinct combined values.
pub fn test_entity(unique: &str) -> TestEntity {
    TestEntity {
        unique_field: unique.to_string(),
        combined_unique_field1: Some(format!("{}-c1", unique)),
        combined_unique_field2: Some(format!("{}-c2", unique)),
        ..Default::default()
    }
}

/// Builds a details payload.
pub fn details(field: &str, field2: i32) -> TestEntityDetails {
    TestEntityDetails {
        extension_field: field.to_string(),
        extension_field2: field2,
        ..Default::default()
    }
}

// ============================================================================
// OwnedDocument
// ============================================================================

/// An entity whose owner is fixed at creation.
#[derive(Debug, Clone, Default)]
pub struct OwnedDocument {
    pub meta: EntityMeta,
    pub title: String,
    pub owner: Option<i64>,
}

static OWNED_DOCUMENT: LazyLock<EntityDescriptor<OwnedDocument>> = LazyLock::new(|| {
    EntityDescriptor::builder("OwnedDocument", "owned_document")
        .field(
            "title",
            "title",
            |d: &OwnedDocument| d.title.clone(),
            |d, v| d.title = v,
        )
        .field(
            "ownerId",
            "owner_id",
            |d: &OwnedDocument| d.owner,
            |d, v| d.owner = v,
        )
        .build()
});

impl Entity for OwnedDocument {
    fn descriptor() -> &'static EntityDescriptor<Self> {
        &OWNED_DOCUMENT
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn owner_id(&self) -> Option<i64> {
        self.owner
    }

    fn set_owner_id(&mut self, owner_id: Option<i64>) {
        self.owner = owner_id;
    }
}

// ============================================================================
// Author / Book
// ============================================================================

/// A relation target.
#[derive(Debug, Clone, Default)]
pub struct Author {
    pub meta: EntityMeta,
    pub name: String,
}

static AUTHOR: LazyLock<EntityDescriptor<Author>> = LazyLock::new(|| {
    EntityDescriptor::builder("Author", "author")
        .field("name", "name", |a: &Author| a.name.clone(), |a, v| a.name = v)
        .build()
});

impl Entity for Author {
    fn descriptor() -> &'static EntityDescriptor<Self> {
        &AUTHOR
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
}

/// An entity with a many-to-one relation; titles are unique per author name.
#[derive(Debug, Clone, Default)]
pub struct Book {
    pub meta: EntityMeta,
    pub title: String,
    pub pages: i32,
    pub author_id: Option<i64>,
    pub author: Option<Author>,
}

static BOOK: LazyLock<EntityDescriptor<Book>> = LazyLock::new(|| {
    EntityDescriptor::builder("Book", "book")
        .field("title", "title", |b: &Book| b.title.clone(), |b, v| b.title = v)
        .field("pages", "pages", |b: &Book| b.pages, |b, v| b.pages = v)
        .field(
            "authorId",
            "author_id",
            |b: &Book| b.author_id,
            |b, v| b.author_id = v,
        )
        .relation("author", "author_id", |b: &Book| b.author.as_ref())
        .unique(&["title", "author_name"])
        .build()
});

impl Entity for Book {
    fn descriptor() -> &'static EntityDescriptor<Self> {
        &BOOK
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
}

/// Builds a book written by `author`.
pub fn book(title: &str, pages: i32, author: &Author) -> Book {
    Book {
        title: title.to_string(),
        pages,
        author_id: Some(author.id()),
        author: Some(author.clone()),
        ..Default::default()
    }
}
