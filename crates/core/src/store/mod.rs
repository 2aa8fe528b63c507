//! Record store abstraction.
//!
//! The sync hooks never own persistent state; they read and write documents
//! in a shared store through [`RecordStore`]. Two implementations ship with
//! the crate: the in-process [`MemoryStore`] and the SQLite-backed
//! [`Database`](crate::db::Database).

pub mod memory;

pub use memory::MemoryStore;

use crate::errors::StoreError;
use crate::models::{Document, Entity};

/// An equality filter over document fields.
///
/// Values are compared in their string form, so a numeric field `12` matches
/// the filter value `"12"`. The pseudo-field `name` matches the document
/// name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    conditions: Vec<(String, String)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match a document by its name.
    pub fn by_name(name: &str) -> Self {
        Self::new().eq("name", name)
    }

    /// Add a `field == value` condition.
    pub fn eq(mut self, field: &str, value: &str) -> Self {
        self.conditions.push((field.to_string(), value.to_string()));
        self
    }

    pub fn conditions(&self) -> &[(String, String)] {
        &self.conditions
    }

    /// True when every condition holds for `doc`. An empty filter matches
    /// everything.
    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| doc.get(field).as_deref() == Some(value.as_str()))
    }
}

/// The operations the sync hooks need from the shared document store.
///
/// Methods take `&self`; implementations use interior mutability so a store
/// handle can be shared by reference between the reconciler and its caller.
/// Writes become durable on [`commit`](Self::commit).
pub trait RecordStore {
    /// Return `field` of the first document of `entity` matching `filter`.
    /// `Ok(None)` when no document matches or the field is unset.
    fn get_value(
        &self,
        entity: Entity,
        filter: &Filter,
        field: &str,
    ) -> Result<Option<String>, StoreError>;

    /// Whether any document of `entity` matches `filter`.
    fn exists(&self, entity: Entity, filter: &Filter) -> Result<bool, StoreError>;

    /// Insert a document, returning its name. A name is generated when the
    /// document has none.
    fn insert(&self, doc: Document) -> Result<String, StoreError>;

    /// Hard-delete the named document.
    fn delete(&self, entity: Entity, name: &str) -> Result<(), StoreError>;

    /// Make all writes since the last commit durable.
    fn commit(&self) -> Result<(), StoreError>;
}

impl<T: RecordStore + ?Sized> RecordStore for &T {
    fn get_value(
        &self,
        entity: Entity,
        filter: &Filter,
        field: &str,
    ) -> Result<Option<String>, StoreError> {
        (**self).get_value(entity, filter, field)
    }

    fn exists(&self, entity: Entity, filter: &Filter) -> Result<bool, StoreError> {
        (**self).exists(entity, filter)
    }

    fn insert(&self, doc: Document) -> Result<String, StoreError> {
        (**self).insert(doc)
    }

    fn delete(&self, entity: Entity, name: &str) -> Result<(), StoreError> {
        (**self).delete(entity, name)
    }

    fn commit(&self) -> Result<(), StoreError> {
        (**self).commit()
    }
}

/// Generate a document name for `entity`, e.g. `lms-enrollment-3f2a9c1d0b`.
pub(crate) fn generate_name(entity: Entity) -> String {
    let prefix = entity.as_str().to_ascii_lowercase().replace(' ', "-");
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &id[..10])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches() {
        let doc = Document::new(Entity::LmsEnrollment)
            .named("enr-1")
            .with("member", "s1@x.com")
            .with("course", "lms-algebra");

        assert!(Filter::new().matches(&doc));
        assert!(Filter::by_name("enr-1").matches(&doc));
        assert!(Filter::new()
            .eq("member", "s1@x.com")
            .eq("course", "lms-algebra")
            .matches(&doc));
        assert!(!Filter::new()
            .eq("member", "s1@x.com")
            .eq("course", "lms-geometry")
            .matches(&doc));
        assert!(!Filter::new().eq("missing", "x").matches(&doc));
    }

    #[test]
    fn test_filter_compares_numbers_as_text() {
        let doc = Document::new(Entity::Course).with("duration", 12);
        assert!(Filter::new().eq("duration", "12").matches(&doc));
    }

    #[test]
    fn test_generate_name_prefix() {
        let name = generate_name(Entity::LmsEnrollment);
        assert!(name.starts_with("lms-enrollment-"));
        assert_eq!(name.len(), "lms-enrollment-".len() + 10);
    }
}
