//! [`RecordStore`] implementation over the `documents` table.
//!
//! Each document is one row keyed by `(entity, name)` with its fields in a
//! JSON `data` column. Field filters are evaluated with `json_extract` and
//! compared as text, matching [`Filter`] semantics. The first write after a
//! commit opens a transaction; [`RecordStore::commit`] closes it.

use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension};
use tracing::debug;

use super::Database;
use crate::errors::StoreError;
use crate::models::{Document, Entity};
use crate::store::{generate_name, Filter, RecordStore};

/// JSON path for a top-level field, quoted so any key is addressable.
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}

/// SQL expression rendering the scalar at `?{p}` as text, or NULL for
/// missing / null / object / array values.
///
/// Numbers come back as their stored JSON text, which is what serde_json
/// wrote and what [`scalar_to_string`] renders, so `1e20` stays `1e20`.
///
/// [`scalar_to_string`]: crate::models::scalar_to_string
fn scalar_expr(p: usize) -> String {
    format!(
        "CASE json_type(data, ?{p}) \
         WHEN 'true' THEN 'true' \
         WHEN 'false' THEN 'false' \
         WHEN 'object' THEN NULL \
         WHEN 'array' THEN NULL \
         WHEN 'integer' THEN data -> ?{p} \
         WHEN 'real' THEN data -> ?{p} \
         ELSE CAST(json_extract(data, ?{p}) AS TEXT) END"
    )
}

/// Build the WHERE clause for `entity` + `filter`. Parameters are numbered
/// from `first`.
fn where_clause(entity: Entity, filter: &Filter, first: usize) -> (String, Vec<String>) {
    let mut sql = format!("entity = ?{first}");
    let mut values = vec![entity.as_str().to_string()];
    for (field, value) in filter.conditions() {
        let p = first + values.len();
        if field == "name" {
            sql.push_str(&format!(" AND name = ?{p}"));
            values.push(value.clone());
        } else {
            sql.push_str(&format!(" AND {} = ?{}", scalar_expr(p), p + 1));
            values.push(json_path(field));
            values.push(value.clone());
        }
    }
    (sql, values)
}

fn begin_if_needed(conn: &Connection) -> Result<(), StoreError> {
    if conn.is_autocommit() {
        conn.execute_batch("BEGIN IMMEDIATE")?;
        debug!("opened write transaction");
    }
    Ok(())
}

impl RecordStore for Database {
    fn get_value(
        &self,
        entity: Entity,
        filter: &Filter,
        field: &str,
    ) -> Result<Option<String>, StoreError> {
        let (select, mut values) = if field == "name" {
            ("name".to_string(), Vec::new())
        } else {
            (scalar_expr(1), vec![json_path(field)])
        };
        let (where_sql, where_values) = where_clause(entity, filter, values.len() + 1);
        values.extend(where_values);

        let sql =
            format!("SELECT {select} FROM documents WHERE {where_sql} ORDER BY rowid LIMIT 1");
        let conn = self.conn();
        let value: Option<Option<String>> = conn
            .query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))
            .optional()?;
        Ok(value.flatten())
    }

    fn exists(&self, entity: Entity, filter: &Filter) -> Result<bool, StoreError> {
        let (where_sql, values) = where_clause(entity, filter, 1);
        let sql = format!("SELECT EXISTS(SELECT 1 FROM documents WHERE {where_sql})");
        let conn = self.conn();
        let found: bool = conn.query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
        Ok(found)
    }

    fn insert(&self, doc: Document) -> Result<String, StoreError> {
        let name = doc
            .name
            .clone()
            .unwrap_or_else(|| generate_name(doc.entity));
        let data = serde_json::to_string(&doc.fields)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.conn();
        begin_if_needed(&conn)?;
        let result = conn.execute(
            "INSERT INTO documents (entity, name, data, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![doc.entity.as_str(), name, data, now],
        );
        match result {
            Ok(_) => {
                debug!(entity = %doc.entity, name = %name, "inserted document");
                Ok(name)
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Duplicate {
                    entity: doc.entity.to_string(),
                    name,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, entity: Entity, name: &str) -> Result<(), StoreError> {
        let conn = self.conn();
        begin_if_needed(&conn)?;
        let changed = conn.execute(
            "DELETE FROM documents WHERE entity = ?1 AND name = ?2",
            params![entity.as_str(), name],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: entity.to_string(),
                name: name.to_string(),
            });
        }
        debug!(entity = %entity, name, "deleted document");
        Ok(())
    }

    fn commit(&self) -> Result<(), StoreError> {
        let conn = self.conn();
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
            debug!("committed write transaction");
        }
        Ok(())
    }
}
