//! Lifecycle-event routing.
//!
//! The host platform calls hooks as `(document, event)`. A [`HookTable`]
//! maps each `(entity, event)` pair to the [`Handler`] bound to it, decodes
//! the JSON document into the handler's record type and runs it. A document
//! that does not decode ends the run like any other handler fault: logged,
//! reported and returned as an aborted [`Outcome`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::errors::DispatchError;
use crate::models::{Course, CourseEnrollment, Entity, LmsCourse, ProgramEnrollment};
use crate::outcome::Outcome;
use crate::reconciler::{titles, CourseEvent, Reconciler};
use crate::report::Reporter;
use crate::store::RecordStore;

/// A record lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocEvent {
    AfterInsert,
    OnTrash,
}

impl DocEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AfterInsert => "after_insert",
            Self::OnTrash => "on_trash",
        }
    }

    /// Parse an event name (`after_insert`, `on_trash`).
    pub fn from_str_val(s: &str) -> Option<Self> {
        match s.trim() {
            "after_insert" => Some(Self::AfterInsert),
            "on_trash" => Some(Self::OnTrash),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The sync handlers that can be bound to lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handler {
    EnrollmentCreated,
    EnrollmentDeleted,
    CourseEnrollmentCreated,
    EducationCourseCreated,
    EducationCourseDeleted,
    LmsCourseCreated,
    LmsCourseDeleted,
}

impl Handler {
    pub const ALL: [Handler; 7] = [
        Handler::EnrollmentCreated,
        Handler::EnrollmentDeleted,
        Handler::CourseEnrollmentCreated,
        Handler::EducationCourseCreated,
        Handler::EducationCourseDeleted,
        Handler::LmsCourseCreated,
        Handler::LmsCourseDeleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnrollmentCreated => "enrollment_created",
            Self::EnrollmentDeleted => "enrollment_deleted",
            Self::CourseEnrollmentCreated => "course_enrollment_created",
            Self::EducationCourseCreated => "education_course_created",
            Self::EducationCourseDeleted => "education_course_deleted",
            Self::LmsCourseCreated => "lms_course_created",
            Self::LmsCourseDeleted => "lms_course_deleted",
        }
    }

    /// The `(entity, event)` pair this handler reacts to.
    pub fn trigger(&self) -> (Entity, DocEvent) {
        match self {
            Self::EnrollmentCreated => (Entity::ProgramEnrollment, DocEvent::AfterInsert),
            Self::EnrollmentDeleted => (Entity::ProgramEnrollment, DocEvent::OnTrash),
            Self::CourseEnrollmentCreated => (Entity::CourseEnrollment, DocEvent::AfterInsert),
            Self::EducationCourseCreated => (Entity::Course, DocEvent::AfterInsert),
            Self::EducationCourseDeleted => (Entity::Course, DocEvent::OnTrash),
            Self::LmsCourseCreated => (Entity::LmsCourse, DocEvent::AfterInsert),
            Self::LmsCourseDeleted => (Entity::LmsCourse, DocEvent::OnTrash),
        }
    }

    /// Title of the error report filed when this handler fails.
    pub fn error_title(&self) -> &'static str {
        match self {
            Self::EnrollmentCreated => titles::ENROLLMENT_CREATED,
            Self::EnrollmentDeleted => titles::ENROLLMENT_DELETED,
            Self::CourseEnrollmentCreated => titles::COURSE_ENROLLMENT_CREATED,
            Self::EducationCourseCreated => titles::EDUCATION_COURSE_CREATED,
            Self::EducationCourseDeleted => titles::EDUCATION_COURSE_DELETED,
            Self::LmsCourseCreated => titles::LMS_COURSE_CREATED,
            Self::LmsCourseDeleted => titles::LMS_COURSE_DELETED,
        }
    }

    /// Decode `doc` and run the handler.
    pub fn run<S, R>(&self, reconciler: &Reconciler<'_, S, R>, doc: &Value) -> Outcome
    where
        S: RecordStore + ?Sized,
        R: Reporter + ?Sized,
    {
        match self.try_run(reconciler, doc) {
            Ok(outcome) => outcome,
            Err(e) => reconciler.reject(e, self.error_title()),
        }
    }

    fn try_run<S, R>(
        &self,
        reconciler: &Reconciler<'_, S, R>,
        doc: &Value,
    ) -> Result<Outcome, DispatchError>
    where
        S: RecordStore + ?Sized,
        R: Reporter + ?Sized,
    {
        let entity = self.trigger().0;
        let outcome = match self {
            Self::EnrollmentCreated => {
                reconciler.enrollment_created(&decode::<ProgramEnrollment>(entity, doc)?)
            }
            Self::EnrollmentDeleted => {
                reconciler.enrollment_deleted(&decode::<ProgramEnrollment>(entity, doc)?)
            }
            Self::CourseEnrollmentCreated => {
                reconciler.course_enrollment_created(&decode::<CourseEnrollment>(entity, doc)?)
            }
            Self::EducationCourseCreated => {
                reconciler.course_created(&CourseEvent::Education(decode::<Course>(entity, doc)?))
            }
            Self::EducationCourseDeleted => {
                reconciler.course_deleted(&CourseEvent::Education(decode::<Course>(entity, doc)?))
            }
            Self::LmsCourseCreated => {
                reconciler.course_created(&CourseEvent::Lms(decode::<LmsCourse>(entity, doc)?))
            }
            Self::LmsCourseDeleted => {
                reconciler.course_deleted(&CourseEvent::Lms(decode::<LmsCourse>(entity, doc)?))
            }
        };
        Ok(outcome)
    }
}

fn decode<T: serde::de::DeserializeOwned>(entity: Entity, doc: &Value) -> Result<T, DispatchError> {
    T::deserialize(doc).map_err(|source| DispatchError::Decode {
        entity: entity.to_string(),
        source,
    })
}

/// Which handler, if any, is bound to each lifecycle event.
#[derive(Debug, Clone)]
pub struct HookTable {
    enabled: Vec<Handler>,
}

impl Default for HookTable {
    fn default() -> Self {
        Self::new(&Handler::ALL)
    }
}

impl HookTable {
    /// Bind only the listed handlers.
    pub fn new(enabled: &[Handler]) -> Self {
        Self {
            enabled: enabled.to_vec(),
        }
    }

    pub fn enabled(&self) -> &[Handler] {
        &self.enabled
    }

    /// The handler bound to `(entity, event)`.
    pub fn lookup(&self, entity: Entity, event: DocEvent) -> Option<Handler> {
        self.enabled
            .iter()
            .copied()
            .find(|h| h.trigger() == (entity, event))
    }

    /// Route one event. Returns `None` when nothing is bound to it.
    pub fn dispatch<S, R>(
        &self,
        reconciler: &Reconciler<'_, S, R>,
        entity: Entity,
        event: DocEvent,
        doc: &Value,
    ) -> Option<(Handler, Outcome)>
    where
        S: RecordStore + ?Sized,
        R: Reporter + ?Sized,
    {
        let Some(handler) = self.lookup(entity, event) else {
            debug!(entity = %entity, event = %event, "no handler bound");
            return None;
        };
        info!(entity = %entity, event = %event, handler = handler.as_str(), "dispatching");
        let outcome = handler.run(reconciler, doc);
        Some((handler, outcome))
    }
}
