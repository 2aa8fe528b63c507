//! Running an event against the SQLite store.
//!
//! [`EventRunner`] plays the host's part around a handler: it dispatches the
//! event, rolls back whatever an aborted handler left uncommitted, then
//! writes the error reports and an audit entry. Reports are captured during
//! the run and written afterwards so they never share the handler's
//! transaction.

use serde_json::Value;
use tracing::{info, warn};

use crate::db::Database;
use crate::dispatch::{DocEvent, Handler, HookTable};
use crate::errors::CoreError;
use crate::models::{AuditEntry, Entity};
use crate::outcome::Outcome;
use crate::reconciler::Reconciler;
use crate::report::{ErrorReport, RecordingReporter, Reporter};

/// Result of running one bound handler.
#[derive(Debug, Clone)]
pub struct Fired {
    pub handler: Handler,
    pub outcome: Outcome,
    pub error_reports: Vec<ErrorReport>,
}

/// Dispatches events into a [`Database`] and keeps its error log and audit
/// trail up to date.
pub struct EventRunner<'a, R: ?Sized> {
    db: &'a Database,
    hooks: &'a HookTable,
    reporter: &'a R,
    persist_error_reports: bool,
}

impl<'a, R: Reporter + ?Sized> EventRunner<'a, R> {
    pub fn new(db: &'a Database, hooks: &'a HookTable, reporter: &'a R) -> Self {
        Self {
            db,
            hooks,
            reporter,
            persist_error_reports: true,
        }
    }

    /// Whether error reports go to the `error_log` table (default `true`).
    pub fn persist_error_reports(mut self, yes: bool) -> Self {
        self.persist_error_reports = yes;
        self
    }

    /// Run the handler bound to `(entity, event)` for `doc`.
    ///
    /// `Ok(None)` means no handler is bound. Handler failures, undecodable
    /// documents included, are part of the returned [`Outcome`]; only
    /// error-log and audit bookkeeping errors are returned as `Err`.
    pub fn run(
        &self,
        entity: Entity,
        event: DocEvent,
        doc: &Value,
    ) -> Result<Option<Fired>, CoreError> {
        let recorder = RecordingReporter::new();
        let sink = (&recorder, self.reporter);
        let reconciler = Reconciler::new(self.db, &sink);

        let Some((handler, outcome)) = self.hooks.dispatch(&reconciler, entity, event, doc) else {
            return Ok(None);
        };

        if outcome.is_aborted() {
            self.db.rollback()?;
        }

        let error_reports = recorder.errors();
        if self.persist_error_reports {
            for report in &error_reports {
                self.db.insert_error_log(&report.title, &report.message)?;
            }
        }

        let document = doc.get("name").and_then(Value::as_str);
        let details = outcome.summary();
        let audit = if outcome.is_aborted() {
            warn!(handler = handler.as_str(), details = %details, "handler aborted");
            AuditEntry::failure(handler.as_str(), &details)
        } else {
            info!(handler = handler.as_str(), details = %details, "handler finished");
            AuditEntry::success(handler.as_str(), &details)
        };
        self.db.insert_audit_entry(&audit.for_document(entity, document))?;

        Ok(Some(Fired {
            handler,
            outcome,
            error_reports,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;
    use crate::report::TracingReporter;
    use crate::store::RecordStore;
    use serde_json::json;

    fn setup_db() -> Database {
        let db = Database::in_memory().unwrap();
        db.initialize().unwrap();
        db.insert(
            Document::new(Entity::Student)
                .named("S1")
                .with("student_email_id", "s1@x.com"),
        )
        .unwrap();
        db.insert(Document::new(Entity::Student).named("S2")).unwrap();
        db.insert(Document::new(Entity::LmsCourse).named("lms-algebra").with("title", "Algebra"))
            .unwrap();
        db.commit().unwrap();
        db
    }

    #[test]
    fn test_run_records_audit_entry() {
        let db = setup_db();
        let hooks = HookTable::default();
        let runner = EventRunner::new(&db, &hooks, &TracingReporter);

        let doc = json!({
            "name": "ENR-1",
            "student": "S1",
            "courses": [{"course_name": "Algebra"}]
        });
        let fired = runner
            .run(Entity::ProgramEnrollment, DocEvent::AfterInsert, &doc)
            .unwrap()
            .unwrap();

        assert_eq!(fired.handler, Handler::EnrollmentCreated);
        assert_eq!(db.count_documents(Entity::LmsEnrollment).unwrap(), 1);
        let audit = db.list_audit_log(1).unwrap();
        assert_eq!(audit[0].action, "enrollment_created");
        assert_eq!(audit[0].document.as_deref(), Some("ENR-1"));
        assert!(audit[0].success);
    }

    #[test]
    fn test_aborted_run_is_audited_as_failure() {
        let db = setup_db();
        let hooks = HookTable::default();
        let runner = EventRunner::new(&db, &hooks, &TracingReporter);

        let doc = json!({
            "name": "ENR-2",
            "student": "S2",
            "courses": [{"course_name": "Algebra"}]
        });
        let fired = runner
            .run(Entity::ProgramEnrollment, DocEvent::AfterInsert, &doc)
            .unwrap()
            .unwrap();

        assert!(fired.outcome.is_aborted());
        assert!(fired.error_reports.is_empty());
        assert_eq!(db.count_documents(Entity::LmsEnrollment).unwrap(), 0);
        assert_eq!(db.count_failures().unwrap(), 1);
    }

    #[test]
    fn test_undecodable_document_is_logged_and_audited() {
        let db = setup_db();
        let hooks = HookTable::default();
        let runner = EventRunner::new(&db, &hooks, &TracingReporter);

        let doc = json!({"name": "ENR-3", "courses": [{"course_name": "Algebra"}]});
        let fired = runner
            .run(Entity::ProgramEnrollment, DocEvent::AfterInsert, &doc)
            .unwrap()
            .unwrap();

        assert!(fired.outcome.is_aborted());
        assert_eq!(fired.error_reports.len(), 1);
        let logged = db.list_error_log(10).unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].title, "Error in Syncing Program Enrollment to LMS");
        assert!(logged[0].message.contains("missing field `student`"));

        let audit = db.list_audit_log(1).unwrap();
        assert!(!audit[0].success);
        assert_eq!(audit[0].document.as_deref(), Some("ENR-3"));
    }

    #[test]
    fn test_unbound_event_is_not_audited() {
        let db = setup_db();
        let hooks = HookTable::new(&[]);
        let runner = EventRunner::new(&db, &hooks, &TracingReporter);

        let fired = runner
            .run(Entity::LmsCourse, DocEvent::OnTrash, &json!({"title": "Algebra"}))
            .unwrap();
        assert!(fired.is_none());
        assert_eq!(db.count_audit_log().unwrap(), 0);
    }
}
