//! Cross-module record reconciliation.
//!
//! The [`Reconciler`] turns one lifecycle event in Education or the LMS into
//! the matching writes in the other module:
//!
//! | Handler | Trigger | Effect |
//! |---|---|---|
//! | [`enrollment_created`](Reconciler::enrollment_created) | Program Enrollment inserted | LMS Enrollment per course line |
//! | [`enrollment_deleted`](Reconciler::enrollment_deleted) | Program Enrollment trashed | delete those LMS Enrollments |
//! | [`course_created`](Reconciler::course_created) | Course / LMS Course inserted | mirror course in the other module |
//! | [`course_deleted`](Reconciler::course_deleted) | Course / LMS Course trashed | delete the mirror |
//! | [`course_enrollment_created`](Reconciler::course_enrollment_created) | Course Enrollment inserted | one LMS Enrollment |
//!
//! Every handler looks records up by natural key and then inserts if absent
//! or deletes if present; nothing is updated in place. Failures never reach
//! the caller: each handler returns an [`Outcome`], logs, and files an error
//! report for unexpected faults.
//!
//! Existence-check-then-insert is not atomic. Two concurrent triggers for the
//! same (student, course) pair can both insert.

use tracing::{error, info, warn};

use crate::errors::{DispatchError, ReconcileError};
use crate::keys::NaturalKey;
use crate::models::{
    Course, CourseEnrollment, Document, Entity, LmsCourse, LmsEnrollment, ProgramEnrollment,
    SyncDirection,
};
use crate::outcome::{AbortReason, Outcome, SkipReason, Tally};
use crate::report::{MessageLevel, Reporter};
use crate::store::RecordStore;

/// Error-report titles, one per handler and direction.
pub mod titles {
    pub const ENROLLMENT_CREATED: &str = "Error in Syncing Program Enrollment to LMS";
    pub const ENROLLMENT_DELETED: &str = "Error in Deleting LMS Enrollment";
    pub const COURSE_ENROLLMENT_CREATED: &str = "Error in Syncing Course Enrollment to LMS";
    pub const EDUCATION_COURSE_CREATED: &str = "Error in Syncing Course to LMS";
    pub const LMS_COURSE_CREATED: &str = "Error in Syncing LMS Course to Education";
    pub const EDUCATION_COURSE_DELETED: &str = "Error in Removing LMS Course";
    pub const LMS_COURSE_DELETED: &str = "Error in Removing Education Course";
}

/// A course lifecycle event from either side.
#[derive(Debug, Clone)]
pub enum CourseEvent {
    /// A course in Education; mirrored into the LMS.
    Education(Course),
    /// A course in the LMS; mirrored into Education.
    Lms(LmsCourse),
}

impl CourseEvent {
    pub fn direction(&self) -> SyncDirection {
        match self {
            Self::Education(_) => SyncDirection::EducationToLms,
            Self::Lms(_) => SyncDirection::LmsToEducation,
        }
    }

    /// The natural-key value carried by the source record.
    pub fn key_name(&self) -> &str {
        match self {
            Self::Education(course) => &course.course_name,
            Self::Lms(course) => &course.title,
        }
    }

    /// Natural key of the mirrored record in the other module.
    fn mirror_key(&self) -> NaturalKey {
        match self {
            Self::Education(course) => NaturalKey::lms_course_by_title(&course.course_name),
            Self::Lms(course) => NaturalKey::course_by_name(&course.title),
        }
    }
}

/// Email and display name of a student.
#[derive(Debug, Clone)]
struct StudentContact {
    email: String,
    name: Option<String>,
}

/// Applies lifecycle events from one module to the other.
///
/// Holds borrowed handles to the record store and the report sink; build one
/// per event or keep one around, it carries no state of its own.
pub struct Reconciler<'a, S: ?Sized, R: ?Sized> {
    store: &'a S,
    reporter: &'a R,
}

impl<'a, S, R> Reconciler<'a, S, R>
where
    S: RecordStore + ?Sized,
    R: Reporter + ?Sized,
{
    pub fn new(store: &'a S, reporter: &'a R) -> Self {
        Self { store, reporter }
    }

    // -----------------------------------------------------------------------
    // Program enrollment
    // -----------------------------------------------------------------------

    /// Ensure an LMS Enrollment exists for every course line of a newly
    /// created Program Enrollment.
    ///
    /// Lines whose course has no LMS counterpart are skipped; a student
    /// without an email aborts the whole run before any line is looked at.
    pub fn enrollment_created(&self, enrollment: &ProgramEnrollment) -> Outcome {
        info!(enrollment = %enrollment.name, "syncing program enrollment to LMS");
        let result = self.sync_enrollment(enrollment);
        self.settle(result, titles::ENROLLMENT_CREATED)
    }

    fn sync_enrollment(&self, enrollment: &ProgramEnrollment) -> Result<Outcome, ReconcileError> {
        let contact = self.student_contact(&enrollment.student)?;
        info!(email = %contact.email, name = ?contact.name, "resolved student");

        let mut tally = Tally::default();
        for line in &enrollment.courses {
            let Some(lms_course) = self.lms_course_for(&line.course_name, &mut tally)? else {
                continue;
            };

            let key = NaturalKey::lms_enrollment_for(&contact.email, &lms_course);
            if key.exists(self.store)? {
                info!(member = %contact.email, course = %lms_course, "already enrolled");
                tally.unchanged();
                continue;
            }

            let record = LmsEnrollment {
                name: None,
                member: contact.email.clone(),
                member_name: contact.name.clone(),
                member_username: Some(contact.email.clone()),
                course: lms_course.clone(),
                enrollment_date: None,
            };
            let name = self
                .store
                .insert(Document::from_record(Entity::LmsEnrollment, &record)?)?;
            info!(member = %contact.email, course = %lms_course, enrollment = %name, "enrolled");
            tally.inserted(Entity::LmsEnrollment, name);
        }

        self.store.commit()?;
        Ok(tally.finish())
    }

    /// Delete the LMS Enrollments mirrored from a Program Enrollment that is
    /// being removed.
    pub fn enrollment_deleted(&self, enrollment: &ProgramEnrollment) -> Outcome {
        info!(
            enrollment = %enrollment.name,
            "removing LMS enrollments for program enrollment"
        );
        let result = self.unsync_enrollment(enrollment);
        self.settle(result, titles::ENROLLMENT_DELETED)
    }

    fn unsync_enrollment(&self, enrollment: &ProgramEnrollment) -> Result<Outcome, ReconcileError> {
        let contact = self.student_contact(&enrollment.student)?;

        let mut tally = Tally::default();
        for line in &enrollment.courses {
            let Some(lms_course) = self.lms_course_for(&line.course_name, &mut tally)? else {
                continue;
            };

            let key = NaturalKey::lms_enrollment_for(&contact.email, &lms_course);
            match key.resolve(self.store)? {
                Some(name) => {
                    self.store.delete(Entity::LmsEnrollment, &name)?;
                    info!(member = %contact.email, course = %lms_course, "enrollment deleted");
                    tally.deleted(Entity::LmsEnrollment, name);
                }
                None => {
                    info!(
                        member = %contact.email,
                        course = %lms_course,
                        "no LMS enrollment to delete"
                    );
                    tally.unchanged();
                }
            }
        }

        self.store.commit()?;
        Ok(tally.finish())
    }

    // -----------------------------------------------------------------------
    // Course enrollment
    // -----------------------------------------------------------------------

    /// Ensure an LMS Enrollment exists for a single-course enrollment.
    ///
    /// An unknown course is reported to the user as an alert and the event
    /// is skipped.
    pub fn course_enrollment_created(&self, enrollment: &CourseEnrollment) -> Outcome {
        info!(
            enrollment = %enrollment.name,
            course = %enrollment.course_name,
            "syncing course enrollment to LMS"
        );
        let result = self.sync_course_enrollment(enrollment);
        self.settle(result, titles::COURSE_ENROLLMENT_CREATED)
    }

    fn sync_course_enrollment(
        &self,
        enrollment: &CourseEnrollment,
    ) -> Result<Outcome, ReconcileError> {
        let mut tally = Tally::default();
        let Some(lms_course) = self.lms_course_for(&enrollment.course_name, &mut tally)? else {
            self.reporter.message(
                &format!(
                    "LMS Course '{}' not found. Please create the course first.",
                    enrollment.course_name
                ),
                MessageLevel::Alert,
            );
            return Ok(tally.finish());
        };

        let contact = self.student_contact(&enrollment.student)?;
        let key = NaturalKey::lms_enrollment_for(&contact.email, &lms_course);
        if key.exists(self.store)? {
            tally.unchanged();
            self.reporter.message(
                &format!(
                    "Student '{}' is already enrolled in LMS Course '{}'.",
                    enrollment.student, enrollment.course_name
                ),
                MessageLevel::Info,
            );
            return Ok(tally.finish());
        }

        let record = LmsEnrollment {
            name: None,
            member: contact.email.clone(),
            member_name: contact.name,
            member_username: Some(contact.email),
            course: lms_course,
            enrollment_date: enrollment.enrollment_date.clone(),
        };
        let name = self
            .store
            .insert(Document::from_record(Entity::LmsEnrollment, &record)?)?;
        self.store.commit()?;
        tally.inserted(Entity::LmsEnrollment, name);
        self.reporter.message(
            &format!(
                "Student '{}' enrolled in LMS Course '{}'.",
                enrollment.student, enrollment.course_name
            ),
            MessageLevel::Info,
        );
        Ok(tally.finish())
    }

    // -----------------------------------------------------------------------
    // Courses
    // -----------------------------------------------------------------------

    /// Mirror a newly created course into the other module unless a record
    /// with the same name already exists there. Existing mirrors are never
    /// updated.
    pub fn course_created(&self, event: &CourseEvent) -> Outcome {
        info!(course = %event.key_name(), direction = %event.direction(), "mirroring course");
        let title = match event.direction() {
            SyncDirection::EducationToLms => titles::EDUCATION_COURSE_CREATED,
            SyncDirection::LmsToEducation => titles::LMS_COURSE_CREATED,
        };
        let result = self.mirror_course(event);
        self.settle(result, title)
    }

    fn mirror_course(&self, event: &CourseEvent) -> Result<Outcome, ReconcileError> {
        let mut tally = Tally::default();
        let key = event.mirror_key();

        if key.exists(self.store)? {
            info!(
                course = %event.key_name(),
                target = %key.entity(),
                "mirrored course already exists"
            );
            tally.unchanged();
            if let CourseEvent::Education(course) = event {
                self.reporter.message(
                    &format!("LMS Course '{}' already exists.", course.course_name),
                    MessageLevel::Info,
                );
            }
            return Ok(tally.finish());
        }

        let doc = match event {
            CourseEvent::Education(course) => Document::from_record(
                Entity::LmsCourse,
                &LmsCourse {
                    name: None,
                    title: course.course_name.clone(),
                    description: course.description.clone(),
                    course_code: course.course_code.clone(),
                    course_duration: course.duration.clone(),
                },
            )?,
            CourseEvent::Lms(course) => Document::from_record(
                Entity::Course,
                &Course {
                    name: None,
                    course_name: course.title.clone(),
                    description: Some(course.description.clone().unwrap_or_default()),
                    course_code: None,
                    duration: None,
                },
            )?,
        };

        let entity = doc.entity;
        let name = self.store.insert(doc)?;
        self.store.commit()?;
        info!(course = %event.key_name(), target = %entity, name = %name, "course created");
        tally.inserted(entity, name);

        if let CourseEvent::Education(course) = event {
            self.reporter.message(
                &format!("LMS Course '{}' created successfully.", course.course_name),
                MessageLevel::Info,
            );
        }
        Ok(tally.finish())
    }

    /// Hard-delete the mirror of a course that is being removed. A missing
    /// mirror is not an error.
    pub fn course_deleted(&self, event: &CourseEvent) -> Outcome {
        info!(
            course = %event.key_name(),
            direction = %event.direction(),
            "removing mirrored course"
        );
        let title = match event.direction() {
            SyncDirection::EducationToLms => titles::EDUCATION_COURSE_DELETED,
            SyncDirection::LmsToEducation => titles::LMS_COURSE_DELETED,
        };
        let result = self.remove_course_mirror(event);
        self.settle(result, title)
    }

    fn remove_course_mirror(&self, event: &CourseEvent) -> Result<Outcome, ReconcileError> {
        let mut tally = Tally::default();
        let key = event.mirror_key();

        match key.resolve(self.store)? {
            Some(name) => {
                self.store.delete(key.entity(), &name)?;
                self.store.commit()?;
                info!(target = %key.entity(), name = %name, "mirrored course deleted");
                tally.deleted(key.entity(), name);
            }
            None => {
                info!(course = %event.key_name(), "no mirrored course to delete");
                tally.unchanged();
            }
        }
        Ok(tally.finish())
    }

    /// Settle a trigger whose document could not be decoded. It is logged
    /// and reported under `title` like any other unexpected fault.
    pub fn reject(&self, error: DispatchError, title: &str) -> Outcome {
        self.settle(Err(ReconcileError::InvalidPayload(error)), title)
    }

    // -----------------------------------------------------------------------
    // Shared lookups
    // -----------------------------------------------------------------------

    /// Resolve a student's email and display name. An unset or empty email
    /// is [`ReconcileError::MissingContactInfo`].
    fn student_contact(&self, student: &str) -> Result<StudentContact, ReconcileError> {
        let key = NaturalKey::student(student);
        let email = key
            .value(self.store, "student_email_id")?
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| ReconcileError::MissingContactInfo {
                student: student.to_string(),
            })?;
        let name = key.value(self.store, "student_name")?;
        Ok(StudentContact { email, name })
    }

    /// Resolve the LMS course for an Education course name, recording a skip
    /// when there is none.
    fn lms_course_for(
        &self,
        course_name: &str,
        tally: &mut Tally,
    ) -> Result<Option<String>, ReconcileError> {
        let found = if course_name.trim().is_empty() {
            None
        } else {
            NaturalKey::lms_course_by_title(course_name).resolve(self.store)?
        };
        if found.is_none() {
            let err = ReconcileError::UnknownCourse {
                course_name: course_name.to_string(),
            };
            error!(course = %course_name, "{}", err);
            tally.skip(course_name, SkipReason::UnknownCourse);
        }
        Ok(found)
    }

    /// Fold a handler result into an [`Outcome`]. Missing contact info is
    /// logged only; anything else also gets an error report under `title`.
    fn settle(&self, result: Result<Outcome, ReconcileError>, title: &str) -> Outcome {
        match result {
            Ok(outcome) => {
                if !outcome.skipped().is_empty() {
                    warn!(skipped = outcome.skipped().len(), "sync finished with skipped items");
                }
                outcome
            }
            Err(ReconcileError::MissingContactInfo { student }) => {
                error!(student = %student, "no email found for student");
                Outcome::Aborted {
                    reason: AbortReason::MissingContactInfo { student },
                }
            }
            Err(e) => {
                let message = e.to_string();
                error!(error = %message, "{}", title);
                self.reporter.log_error(title, &message);
                Outcome::Aborted {
                    reason: AbortReason::Unhandled { message },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::errors::StoreError;
    use crate::models::EnrollmentCourse;
    use crate::outcome::Mutation;
    use crate::report::RecordingReporter;
    use crate::store::{Filter, MemoryStore};

    fn student(name: &str, email: Option<&str>) -> Document {
        let doc = Document::new(Entity::Student)
            .named(name)
            .with("student_name", format!("Student {name}"));
        match email {
            Some(email) => doc.with("student_email_id", email),
            None => doc,
        }
    }

    fn lms_course(name: &str, title: &str) -> Document {
        Document::new(Entity::LmsCourse).named(name).with("title", title)
    }

    fn program_enrollment(student: &str, courses: &[&str]) -> ProgramEnrollment {
        ProgramEnrollment {
            name: "EDU-ENR-0001".into(),
            student: student.into(),
            courses: courses
                .iter()
                .map(|c| EnrollmentCourse {
                    course_name: c.to_string(),
                })
                .collect(),
        }
    }

    fn seeded() -> MemoryStore {
        MemoryStore::with_documents([
            student("S1", Some("s1@x.com")),
            student("S2", None),
            lms_course("lms-algebra", "Algebra"),
            lms_course("lms-geometry", "Geometry"),
        ])
        .unwrap()
    }

    /// Wraps a store and fails every insert after the first `allowed`.
    struct FailingInserts<'a> {
        inner: &'a MemoryStore,
        allowed: Cell<usize>,
    }

    impl RecordStore for FailingInserts<'_> {
        fn get_value(
            &self,
            e: Entity,
            f: &Filter,
            field: &str,
        ) -> Result<Option<String>, StoreError> {
            self.inner.get_value(e, f, field)
        }
        fn exists(&self, e: Entity, f: &Filter) -> Result<bool, StoreError> {
            self.inner.exists(e, f)
        }
        fn insert(&self, doc: Document) -> Result<String, StoreError> {
            if self.allowed.get() == 0 {
                return Err(StoreError::InvalidDocument("store is read-only".into()));
            }
            self.allowed.set(self.allowed.get() - 1);
            self.inner.insert(doc)
        }
        fn delete(&self, e: Entity, name: &str) -> Result<(), StoreError> {
            self.inner.delete(e, name)
        }
        fn commit(&self) -> Result<(), StoreError> {
            self.inner.commit()
        }
    }

    #[test]
    fn test_enrollment_created_with_unknown_course() {
        let store = seeded();
        let reporter = RecordingReporter::new();
        let reconciler = Reconciler::new(&store, &reporter);

        let enrollment = program_enrollment("S1", &["Algebra", "Unknown101"]);
        let outcome = reconciler.enrollment_created(&enrollment);

        assert_eq!(outcome.status_str(), "partial");
        assert_eq!(outcome.applied().len(), 1);
        assert_eq!(outcome.skipped().len(), 1);
        assert_eq!(outcome.skipped()[0].item, "Unknown101");
        assert_eq!(outcome.skipped()[0].reason, SkipReason::UnknownCourse);
        assert!(reporter.errors().is_empty());

        let enrollments = store.committed(Entity::LmsEnrollment);
        assert_eq!(enrollments.len(), 1);
        let enrollment = &enrollments[0];
        assert_eq!(enrollment.get("member").as_deref(), Some("s1@x.com"));
        assert_eq!(enrollment.get("member_username").as_deref(), Some("s1@x.com"));
        assert_eq!(enrollment.get("member_name").as_deref(), Some("Student S1"));
        assert_eq!(enrollment.get("course").as_deref(), Some("lms-algebra"));
    }

    #[test]
    fn test_course_line_without_name_is_skipped() {
        let store = seeded();
        store.insert(lms_course("lms-untitled", "")).unwrap();
        store.commit().unwrap();
        let reporter = RecordingReporter::new();
        let reconciler = Reconciler::new(&store, &reporter);

        let outcome = reconciler.enrollment_created(&program_enrollment("S1", &["Algebra", ""]));

        assert_eq!(outcome.status_str(), "partial");
        assert_eq!(outcome.applied().len(), 1);
        assert_eq!(outcome.skipped()[0].item, "");
        assert_eq!(outcome.skipped()[0].reason, SkipReason::UnknownCourse);
        let enrollments = store.committed(Entity::LmsEnrollment);
        assert_eq!(enrollments.len(), 1);
        assert_eq!(enrollments[0].get("course").as_deref(), Some("lms-algebra"));
    }

    #[test]
    fn test_reject_reports_under_handler_title() {
        let store = seeded();
        let reporter = RecordingReporter::new();
        let reconciler = Reconciler::new(&store, &reporter);
        let source = serde_json::from_str::<ProgramEnrollment>("{}").unwrap_err();
        let error = DispatchError::Decode {
            entity: "Program Enrollment".into(),
            source,
        };

        let outcome = reconciler.reject(error, titles::ENROLLMENT_CREATED);

        assert!(matches!(
            outcome,
            Outcome::Aborted { reason: AbortReason::Unhandled { ref message } }
                if message.contains("missing field `student`")
        ));
        let errors = reporter.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].title, "Error in Syncing Program Enrollment to LMS");
        assert!(store.committed(Entity::LmsEnrollment).is_empty());
    }

    #[test]
    fn test_enrollment_created_is_idempotent() {
        let store = seeded();
        let reporter = RecordingReporter::new();
        let reconciler = Reconciler::new(&store, &reporter);
        let enrollment = program_enrollment("S1", &["Algebra", "Geometry"]);

        let first = reconciler.enrollment_created(&enrollment);
        let second = reconciler.enrollment_created(&enrollment);

        assert_eq!(first.applied().len(), 2);
        assert_eq!(first.status_str(), "completed");
        assert!(second.applied().is_empty());
        assert_eq!(second.unchanged(), 2);
        assert_eq!(store.count(Entity::LmsEnrollment), 2);
    }

    #[test]
    fn test_enrollment_created_counts_resolvable_lines() {
        let store = seeded();
        let reporter = RecordingReporter::new();
        let reconciler = Reconciler::new(&store, &reporter);

        let outcome = reconciler.enrollment_created(&program_enrollment(
            "S1",
            &["Algebra", "Chemistry", "Geometry", "Biology"],
        ));

        assert_eq!(outcome.applied().len() + outcome.unchanged(), 2);
        assert_eq!(outcome.skipped().len(), 2);
        assert_eq!(store.count(Entity::LmsEnrollment), 2);
    }

    #[test]
    fn test_missing_email_aborts_before_any_line() {
        let store = seeded();
        let reporter = RecordingReporter::new();
        let reconciler = Reconciler::new(&store, &reporter);

        let enrollment = program_enrollment("S2", &["Algebra", "Geometry"]);
        let outcome = reconciler.enrollment_created(&enrollment);

        assert_eq!(
            outcome,
            Outcome::Aborted {
                reason: AbortReason::MissingContactInfo {
                    student: "S2".into()
                }
            }
        );
        assert_eq!(store.count(Entity::LmsEnrollment), 0);
        assert_eq!(store.commit_count(), 1);
        assert!(reporter.errors().is_empty());
    }

    #[test]
    fn test_empty_email_counts_as_missing() {
        let store = MemoryStore::with_documents([student("S3", Some("  "))]).unwrap();
        let reporter = RecordingReporter::new();
        let outcome = Reconciler::new(&store, &reporter)
            .enrollment_created(&program_enrollment("S3", &["Algebra"]));
        assert!(matches!(
            outcome,
            Outcome::Aborted {
                reason: AbortReason::MissingContactInfo { .. }
            }
        ));
    }

    #[test]
    fn test_unknown_student_counts_as_missing() {
        let store = seeded();
        let reporter = RecordingReporter::new();
        let outcome = Reconciler::new(&store, &reporter)
            .enrollment_deleted(&program_enrollment("S404", &["Algebra"]));
        assert!(outcome.is_aborted());
    }

    #[test]
    fn test_store_fault_is_reported_not_raised() {
        let store = seeded();
        let failing = FailingInserts {
            inner: &store,
            allowed: Cell::new(1),
        };
        let reporter = RecordingReporter::new();
        let reconciler = Reconciler::new(&failing, &reporter);

        let enrollment = program_enrollment("S1", &["Algebra", "Geometry"]);
        let outcome = reconciler.enrollment_created(&enrollment);

        match &outcome {
            Outcome::Aborted {
                reason: AbortReason::Unhandled { message },
            } => assert!(message.contains("read-only")),
            other => panic!("expected unhandled abort, got {other:?}"),
        }
        let errors = reporter.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].title, "Error in Syncing Program Enrollment to LMS");
        // The first insert is left uncommitted for the caller to deal with.
        assert_eq!(store.count(Entity::LmsEnrollment), 1);
        assert!(store.committed(Entity::LmsEnrollment).is_empty());
    }

    #[test]
    fn test_enrollment_deleted_after_created() {
        let store = seeded();
        let reporter = RecordingReporter::new();
        let reconciler = Reconciler::new(&store, &reporter);
        let enrollment = program_enrollment("S1", &["Algebra", "Unknown101", "Geometry"]);

        reconciler.enrollment_created(&enrollment);
        assert_eq!(store.count(Entity::LmsEnrollment), 2);

        let outcome = reconciler.enrollment_deleted(&enrollment);
        assert_eq!(outcome.applied().len(), 2);
        assert!(outcome
            .applied()
            .iter()
            .all(|m| matches!(m, Mutation::Deleted { entity: Entity::LmsEnrollment, .. })));
        assert_eq!(outcome.skipped().len(), 1);
        assert!(store.committed(Entity::LmsEnrollment).is_empty());

        let again = reconciler.enrollment_deleted(&enrollment);
        assert!(again.applied().is_empty());
        assert_eq!(again.unchanged(), 2);
    }

    #[test]
    fn test_enrollment_deleted_leaves_other_members() {
        let store = seeded();
        store
            .insert(
                Document::new(Entity::LmsEnrollment)
                    .with("member", "other@x.com")
                    .with("course", "lms-algebra"),
            )
            .unwrap();
        let reporter = RecordingReporter::new();
        let reconciler = Reconciler::new(&store, &reporter);
        let enrollment = program_enrollment("S1", &["Algebra"]);

        reconciler.enrollment_created(&enrollment);
        reconciler.enrollment_deleted(&enrollment);

        let left = store.find(Entity::LmsEnrollment, &Filter::new());
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].get("member").as_deref(), Some("other@x.com"));
    }

    #[test]
    fn test_education_course_created_mirrors_into_lms() {
        let store = MemoryStore::new();
        let reporter = RecordingReporter::new();
        let reconciler = Reconciler::new(&store, &reporter);
        let event = CourseEvent::Education(Course {
            name: Some("CRS-ALG".into()),
            course_name: "Algebra".into(),
            description: Some("Linear equations".into()),
            course_code: Some("MATH-101".into()),
            duration: Some(serde_json::json!(12)),
        });

        let first = reconciler.course_created(&event);
        let second = reconciler.course_created(&event);

        assert_eq!(first.applied().len(), 1);
        assert_eq!(second.unchanged(), 1);
        let mirrors = store.committed(Entity::LmsCourse);
        assert_eq!(mirrors.len(), 1);
        let mirror: LmsCourse = mirrors[0].to_record().unwrap();
        assert_eq!(mirror.title, "Algebra");
        assert_eq!(mirror.course_code.as_deref(), Some("MATH-101"));
        assert_eq!(mirror.course_duration, Some(serde_json::json!(12)));
        assert_ne!(mirror.name.as_deref(), Some("CRS-ALG"));

        let messages: Vec<String> = reporter.messages().into_iter().map(|m| m.text).collect();
        assert_eq!(
            messages,
            vec![
                "LMS Course 'Algebra' created successfully.".to_string(),
                "LMS Course 'Algebra' already exists.".to_string(),
            ]
        );
    }

    #[test]
    fn test_lms_course_created_copies_title_and_description_only() {
        let store = MemoryStore::new();
        let reporter = RecordingReporter::new();
        let reconciler = Reconciler::new(&store, &reporter);
        let event = CourseEvent::Lms(LmsCourse {
            name: Some("lms-alg".into()),
            title: "Algebra".into(),
            description: None,
            course_code: Some("IGNORED".into()),
            course_duration: None,
        });

        reconciler.course_created(&event);
        reconciler.course_created(&event);

        let courses = store.committed(Entity::Course);
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].get("course_name").as_deref(), Some("Algebra"));
        assert_eq!(courses[0].get("description").as_deref(), Some(""));
        assert!(courses[0].get("course_code").is_none());
        assert!(reporter.messages().is_empty());
    }

    #[test]
    fn test_course_created_never_updates_existing_mirror() {
        let store = MemoryStore::with_documents([Document::new(Entity::Course)
            .named("CRS-1")
            .with("course_name", "Algebra")
            .with("description", "old")])
        .unwrap();
        let reporter = RecordingReporter::new();
        let event = CourseEvent::Lms(LmsCourse {
            title: "Algebra".into(),
            description: Some("new".into()),
            ..Default::default()
        });

        let outcome = Reconciler::new(&store, &reporter).course_created(&event);

        assert_eq!(outcome.unchanged(), 1);
        let course = store.find(Entity::Course, &Filter::by_name("CRS-1"));
        assert_eq!(course[0].get("description").as_deref(), Some("old"));
    }

    #[test]
    fn test_course_deleted_is_symmetric_and_idempotent() {
        let store = MemoryStore::new();
        let reporter = RecordingReporter::new();
        let reconciler = Reconciler::new(&store, &reporter);
        let event = CourseEvent::Lms(LmsCourse {
            title: "Algebra".into(),
            ..Default::default()
        });

        reconciler.course_created(&event);
        assert_eq!(store.count(Entity::Course), 1);

        let removed = reconciler.course_deleted(&event);
        assert!(matches!(
            removed.applied(),
            [Mutation::Deleted { entity: Entity::Course, .. }]
        ));
        assert_eq!(store.count(Entity::Course), 0);

        let again = reconciler.course_deleted(&event);
        assert_eq!(again.status_str(), "completed");
        assert!(again.applied().is_empty());
        assert!(reporter.errors().is_empty());
    }

    #[test]
    fn test_education_course_deleted_removes_lms_course() {
        let store = seeded();
        let reporter = RecordingReporter::new();
        let event = CourseEvent::Education(Course {
            course_name: "Geometry".into(),
            ..Default::default()
        });

        let outcome = Reconciler::new(&store, &reporter).course_deleted(&event);

        assert_eq!(outcome.applied().len(), 1);
        assert!(!store
            .exists(Entity::LmsCourse, &Filter::by_name("lms-geometry"))
            .unwrap());
        assert!(store
            .exists(Entity::LmsCourse, &Filter::by_name("lms-algebra"))
            .unwrap());
    }

    #[test]
    fn test_course_enrollment_created() {
        let store = seeded();
        let reporter = RecordingReporter::new();
        let reconciler = Reconciler::new(&store, &reporter);
        let enrollment = CourseEnrollment {
            name: "EDU-CE-0001".into(),
            student: "S1".into(),
            course_name: "Geometry".into(),
            enrollment_date: Some("2026-09-01".into()),
        };

        let first = reconciler.course_enrollment_created(&enrollment);
        let second = reconciler.course_enrollment_created(&enrollment);

        assert_eq!(first.applied().len(), 1);
        assert_eq!(second.unchanged(), 1);
        let enrollments = store.committed(Entity::LmsEnrollment);
        assert_eq!(enrollments.len(), 1);
        assert_eq!(enrollments[0].get("enrollment_date").as_deref(), Some("2026-09-01"));
        assert_eq!(enrollments[0].get("course").as_deref(), Some("lms-geometry"));
        assert_eq!(reporter.messages().len(), 2);
    }

    #[test]
    fn test_course_enrollment_unknown_course_alerts() {
        let store = seeded();
        let reporter = RecordingReporter::new();
        let enrollment = CourseEnrollment {
            name: "EDU-CE-0002".into(),
            student: "S2".into(),
            course_name: "Unknown101".into(),
            enrollment_date: None,
        };

        let outcome = Reconciler::new(&store, &reporter).course_enrollment_created(&enrollment);

        assert_eq!(outcome.skipped().len(), 1);
        let messages = reporter.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].level, MessageLevel::Alert);
        assert!(messages[0].text.contains("Please create the course first"));
        assert_eq!(store.count(Entity::LmsEnrollment), 0);
    }
}
