//! Typed query helpers for the error log, the audit trail and document
//! listings.

use chrono::Utc;
use rusqlite::params;
use serde_json::{Map, Value};
use tracing::debug;

use super::Database;
use crate::errors::DatabaseError;
use crate::models::{self, Document, Entity};

// ---------------------------------------------------------------------------
// Domain structs returned by queries
// ---------------------------------------------------------------------------

/// A row from the `error_log` table.
#[derive(Debug, Clone)]
pub struct ErrorLogEntry {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub created_at: String,
}

/// A row from the `audit_log` table.
#[derive(Debug, Clone)]
pub struct AuditLogEntry {
    pub id: i64,
    pub action: String,
    pub entity: Option<String>,
    pub document: Option<String>,
    pub details: Option<String>,
    pub success: bool,
    pub created_at: String,
}

// ---------------------------------------------------------------------------
// Query implementations
// ---------------------------------------------------------------------------

impl Database {
    // -- documents ----------------------------------------------------------

    /// Fetch a single document by name.
    pub fn get_document(
        &self,
        entity: Entity,
        name: &str,
    ) -> Result<Option<Document>, DatabaseError> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT data FROM documents WHERE entity = ?1 AND name = ?2")?;
        let mut rows =
            stmt.query_map(params![entity.as_str(), name], |row| row.get::<_, String>(0))?;
        match rows.next() {
            Some(Ok(data)) => Ok(Some(Document {
                entity,
                name: Some(name.to_string()),
                fields: parse_fields(entity, name, &data)?,
            })),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// List documents of one entity, oldest first.
    pub fn list_documents(
        &self,
        entity: Entity,
        limit: u32,
    ) -> Result<Vec<Document>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT name, data FROM documents WHERE entity = ?1 ORDER BY rowid LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![entity.as_str(), limit], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(name, data)| {
                let fields = parse_fields(entity, &name, &data)?;
                Ok(Document {
                    entity,
                    name: Some(name),
                    fields,
                })
            })
            .collect()
    }

    /// Count documents of one entity.
    pub fn count_documents(&self, entity: Entity) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE entity = ?1",
            params![entity.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // -- error_log ----------------------------------------------------------

    /// Insert an error report.
    pub fn insert_error_log(&self, title: &str, message: &str) -> Result<i64, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO error_log (title, message, created_at) VALUES (?1, ?2, ?3)",
            params![title, message, now],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, title, "inserted error_log entry");
        Ok(id)
    }

    /// List recent error reports, newest first.
    pub fn list_error_log(&self, limit: u32) -> Result<Vec<ErrorLogEntry>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, title, message, created_at FROM error_log ORDER BY id DESC LIMIT ?1",
        )?;
        let entries = stmt
            .query_map(params![limit], |row| {
                Ok(ErrorLogEntry {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    message: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // -- audit_log ----------------------------------------------------------

    /// Insert an audit entry from a model struct.
    pub fn insert_audit_entry(&self, entry: &models::AuditEntry) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO audit_log (action, entity, document, details, success, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.action,
                entry.entity,
                entry.document,
                entry.details,
                entry.success,
                entry.timestamp.to_rfc3339()
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, action = %entry.action, "inserted audit_log entry");
        Ok(id)
    }

    /// List recent audit-log entries, newest first.
    pub fn list_audit_log(&self, limit: u32) -> Result<Vec<AuditLogEntry>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, action, entity, document, details, success, created_at
             FROM audit_log ORDER BY id DESC LIMIT ?1",
        )?;
        let entries = stmt
            .query_map(params![limit], |row| {
                Ok(AuditLogEntry {
                    id: row.get(0)?,
                    action: row.get(1)?,
                    entity: row.get(2)?,
                    document: row.get(3)?,
                    details: row.get(4)?,
                    success: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Count all audit-log entries.
    pub fn count_audit_log(&self) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Count failed handler runs.
    pub fn count_failures(&self) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM audit_log WHERE success = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn parse_fields(
    entity: Entity,
    name: &str,
    data: &str,
) -> Result<Map<String, Value>, DatabaseError> {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(DatabaseError::CorruptDocument {
            entity: entity.to_string(),
            name: name.to_string(),
            detail: format!("expected a JSON object, found {other}"),
        }),
        Err(e) => Err(DatabaseError::CorruptDocument {
            entity: entity.to_string(),
            name: name.to_string(),
            detail: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuditEntry;
    use crate::store::RecordStore;

    fn setup_db() -> Database {
        let db = Database::in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    #[test]
    fn test_documents_listing() {
        let db = setup_db();
        db.insert(Document::new(Entity::LmsCourse).named("lms-1").with("title", "Algebra"))
            .unwrap();
        db.insert(Document::new(Entity::LmsCourse).named("lms-2").with("title", "Geometry"))
            .unwrap();
        db.commit().unwrap();

        let docs = db.list_documents(Entity::LmsCourse, 10).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].get("title").as_deref(), Some("Algebra"));
        assert_eq!(db.count_documents(Entity::LmsCourse).unwrap(), 2);
        assert_eq!(db.count_documents(Entity::Course).unwrap(), 0);

        let doc = db.get_document(Entity::LmsCourse, "lms-2").unwrap().unwrap();
        assert_eq!(doc.get("title").as_deref(), Some("Geometry"));
        assert!(db.get_document(Entity::LmsCourse, "lms-3").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_document_body() {
        let db = setup_db();
        db.conn()
            .execute(
                "INSERT INTO documents (entity, name, data, created_at) \
                 VALUES ('Course', 'bad', '[1]', 'now')",
                [],
            )
            .unwrap();
        let err = db.get_document(Entity::Course, "bad").unwrap_err();
        assert!(matches!(err, DatabaseError::CorruptDocument { .. }));
    }

    #[test]
    fn test_error_log() {
        let db = setup_db();
        db.insert_error_log("Error in Syncing LMS Course to Education", "boom")
            .unwrap();
        db.insert_error_log("Error in Deleting LMS Enrollment", "bang")
            .unwrap();
        let entries = db.list_error_log(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "bang");
    }

    #[test]
    fn test_audit_log() {
        let db = setup_db();
        db.insert_audit_entry(
            &AuditEntry::success("enrollment_created", "completed: applied 1, unchanged 0")
                .for_document(Entity::ProgramEnrollment, Some("EDU-ENR-0001")),
        )
        .unwrap();
        db.insert_audit_entry(&AuditEntry::failure("enrollment_deleted", "aborted"))
            .unwrap();

        let entries = db.list_audit_log(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(!entries[0].success);
        assert_eq!(entries[1].document.as_deref(), Some("EDU-ENR-0001"));
        assert_eq!(db.count_audit_log().unwrap(), 2);
        assert_eq!(db.count_failures().unwrap(), 1);
    }
}
