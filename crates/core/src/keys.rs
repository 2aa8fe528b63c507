//! Natural-key lookups across the two modules.
//!
//! Education and LMS records are linked by business fields (course name vs.
//! LMS title, student email vs. LMS member) instead of a stored cross
//! reference. Every lookup the reconciler performs is built here so the
//! matching rule lives in one place.

use crate::errors::StoreError;
use crate::models::Entity;
use crate::store::{Filter, RecordStore};

/// An entity plus the filter that identifies a record by its natural key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalKey {
    entity: Entity,
    filter: Filter,
}

impl NaturalKey {
    /// A student, by document name.
    pub fn student(student: &str) -> Self {
        Self {
            entity: Entity::Student,
            filter: Filter::by_name(student),
        }
    }

    /// The LMS course whose title equals an Education course name.
    pub fn lms_course_by_title(title: &str) -> Self {
        Self {
            entity: Entity::LmsCourse,
            filter: Filter::new().eq("title", title),
        }
    }

    /// The Education course whose `course_name` equals an LMS title.
    pub fn course_by_name(course_name: &str) -> Self {
        Self {
            entity: Entity::Course,
            filter: Filter::new().eq("course_name", course_name),
        }
    }

    /// The LMS enrollment of `member` (an email) in the LMS course `course`.
    pub fn lms_enrollment_for(member: &str, course: &str) -> Self {
        Self {
            entity: Entity::LmsEnrollment,
            filter: Filter::new().eq("member", member).eq("course", course),
        }
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// The name of the matching document, if any.
    pub fn resolve<S: RecordStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<Option<String>, StoreError> {
        self.value(store, "name")
    }

    /// A field of the matching document, if any.
    pub fn value<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        field: &str,
    ) -> Result<Option<String>, StoreError> {
        store.get_value(self.entity, &self.filter, field)
    }

    pub fn exists<S: RecordStore + ?Sized>(&self, store: &S) -> Result<bool, StoreError> {
        store.exists(self.entity, &self.filter)
    }
}

impl std::fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.entity)?;
        for (field, value) in self.filter.conditions() {
            write!(f, " {field}='{value}'")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;
    use crate::store::MemoryStore;

    #[test]
    fn test_resolve_by_title() {
        let store = MemoryStore::with_documents([Document::new(Entity::LmsCourse)
            .named("lms-algebra")
            .with("title", "Algebra")])
        .unwrap();

        let key = NaturalKey::lms_course_by_title("Algebra");
        assert_eq!(key.resolve(&store).unwrap().as_deref(), Some("lms-algebra"));
        assert!(key.exists(&store).unwrap());

        // Matching is exact: no case folding or trimming.
        let key = NaturalKey::lms_course_by_title("algebra");
        assert!(key.resolve(&store).unwrap().is_none());
    }

    #[test]
    fn test_display() {
        let key = NaturalKey::lms_enrollment_for("s1@x.com", "lms-algebra");
        assert_eq!(
            key.to_string(),
            "LMS Enrollment member='s1@x.com' course='lms-algebra'"
        );
    }
}
