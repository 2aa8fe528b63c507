//! In-process record store.
//!
//! Writes go to a working set and become visible to [`MemoryStore::committed`]
//! only after [`RecordStore::commit`]. Reads always see the working set, like
//! a connection reading its own uncommitted transaction.

use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use super::{generate_name, Filter, RecordStore};
use crate::errors::StoreError;
use crate::models::{Document, Entity};

#[derive(Debug, Default)]
struct State {
    working: Vec<Document>,
    committed: Vec<Document>,
    commits: usize,
}

/// A [`RecordStore`] held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed documents directly into committed state.
    pub fn with_documents(docs: impl IntoIterator<Item = Document>) -> Result<Self, StoreError> {
        let store = Self::new();
        for doc in docs {
            store.insert(doc)?;
        }
        store.commit()?;
        Ok(store)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Discard uncommitted writes.
    pub fn rollback(&self) {
        let mut state = self.state();
        state.working = state.committed.clone();
    }

    /// Working-set documents of `entity` matching `filter`.
    pub fn find(&self, entity: Entity, filter: &Filter) -> Vec<Document> {
        self.state()
            .working
            .iter()
            .filter(|d| d.entity == entity && filter.matches(d))
            .cloned()
            .collect()
    }

    /// Number of working-set documents of `entity`.
    pub fn count(&self, entity: Entity) -> usize {
        self.state()
            .working
            .iter()
            .filter(|d| d.entity == entity)
            .count()
    }

    /// Committed documents of `entity`.
    pub fn committed(&self, entity: Entity) -> Vec<Document> {
        self.state()
            .committed
            .iter()
            .filter(|d| d.entity == entity)
            .cloned()
            .collect()
    }

    /// How many times `commit` has been called.
    pub fn commit_count(&self) -> usize {
        self.state().commits
    }
}

impl RecordStore for MemoryStore {
    fn get_value(
        &self,
        entity: Entity,
        filter: &Filter,
        field: &str,
    ) -> Result<Option<String>, StoreError> {
        Ok(self
            .state()
            .working
            .iter()
            .find(|d| d.entity == entity && filter.matches(d))
            .and_then(|d| d.get(field)))
    }

    fn exists(&self, entity: Entity, filter: &Filter) -> Result<bool, StoreError> {
        Ok(self
            .state()
            .working
            .iter()
            .any(|d| d.entity == entity && filter.matches(d)))
    }

    fn insert(&self, mut doc: Document) -> Result<String, StoreError> {
        let name = doc
            .name
            .clone()
            .unwrap_or_else(|| generate_name(doc.entity));
        let mut state = self.state();
        if state
            .working
            .iter()
            .any(|d| d.entity == doc.entity && d.name.as_deref() == Some(name.as_str()))
        {
            return Err(StoreError::Duplicate {
                entity: doc.entity.to_string(),
                name,
            });
        }
        debug!(entity = %doc.entity, name = %name, "inserted document");
        doc.name = Some(name.clone());
        state.working.push(doc);
        Ok(name)
    }

    fn delete(&self, entity: Entity, name: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        let before = state.working.len();
        state
            .working
            .retain(|d| !(d.entity == entity && d.name.as_deref() == Some(name)));
        if state.working.len() == before {
            return Err(StoreError::NotFound {
                entity: entity.to_string(),
                name: name.to_string(),
            });
        }
        debug!(entity = %entity, name, "deleted document");
        Ok(())
    }

    fn commit(&self) -> Result<(), StoreError> {
        let mut state = self.state();
        state.committed = state.working.clone();
        state.commits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(name: &str, email: &str) -> Document {
        Document::new(Entity::Student)
            .named(name)
            .with("student_email_id", email)
            .with("student_name", "Student One")
    }

    #[test]
    fn test_insert_and_lookup() {
        let store = MemoryStore::new();
        store.insert(student("S1", "s1@x.com")).unwrap();

        let email = store
            .get_value(Entity::Student, &Filter::by_name("S1"), "student_email_id")
            .unwrap();
        assert_eq!(email.as_deref(), Some("s1@x.com"));
        assert!(store.exists(Entity::Student, &Filter::by_name("S1")).unwrap());
        assert!(!store.exists(Entity::Course, &Filter::by_name("S1")).unwrap());
        assert!(store
            .get_value(Entity::Student, &Filter::by_name("S2"), "student_email_id")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_generated_name_and_duplicate() {
        let store = MemoryStore::new();
        let name = store
            .insert(Document::new(Entity::LmsCourse).with("title", "Algebra"))
            .unwrap();
        assert!(name.starts_with("lms-course-"));

        let err = store
            .insert(Document::new(Entity::LmsCourse).named(name.as_str()))
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
    }

    #[test]
    fn test_delete() {
        let store = MemoryStore::new();
        store.insert(student("S1", "s1@x.com")).unwrap();
        store.delete(Entity::Student, "S1").unwrap();
        assert_eq!(store.count(Entity::Student), 0);

        let err = store.delete(Entity::Student, "S1").unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_commit_and_rollback() {
        let store = MemoryStore::with_documents([student("S1", "s1@x.com")]).unwrap();
        assert_eq!(store.committed(Entity::Student).len(), 1);

        store.insert(student("S2", "s2@x.com")).unwrap();
        assert_eq!(store.count(Entity::Student), 2);
        assert_eq!(store.committed(Entity::Student).len(), 1);

        store.rollback();
        assert_eq!(store.count(Entity::Student), 1);

        store.insert(student("S3", "s3@x.com")).unwrap();
        store.commit().unwrap();
        assert_eq!(store.committed(Entity::Student).len(), 2);
        assert_eq!(store.commit_count(), 2);
    }
}
