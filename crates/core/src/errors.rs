//! Error types for the Education <-> LMS sync core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.
//!
//! Reconciliation errors never escape a handler: the [`Reconciler`] folds
//! them into an [`Outcome`]. They are still typed so that logging and tests
//! can tell them apart.
//!
//! [`Reconciler`]: crate::reconciler::Reconciler
//! [`Outcome`]: crate::outcome::Outcome

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

// ---------------------------------------------------------------------------
// Reconciliation errors
// ---------------------------------------------------------------------------

/// Errors raised while mirroring a record into the other module.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The student has no email on file; the whole operation is abandoned.
    #[error("no email found for student '{student}'")]
    MissingContactInfo { student: String },

    /// No LMS course carries the title of an Education course line.
    #[error("LMS course '{course_name}' not found")]
    UnknownCourse { course_name: String },

    /// Anything the record store reported while the handler was running.
    #[error("record store error: {0}")]
    Store(#[from] StoreError),

    /// The triggering document did not have the shape the handler expects.
    #[error(transparent)]
    InvalidPayload(#[from] DispatchError),
}

// ---------------------------------------------------------------------------
// Record store errors
// ---------------------------------------------------------------------------

/// Errors from a [`RecordStore`](crate::store::RecordStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A document with the same name already exists for the entity.
    #[error("{entity} '{name}' already exists")]
    Duplicate { entity: String, name: String },

    /// The document to delete does not exist.
    #[error("{entity} '{name}' not found")]
    NotFound { entity: String, name: String },

    /// A document could not be built from (or read into) a typed record.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// JSON encoding / decoding of document fields failed.
    #[error("document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The SQLite backend failed.
    #[error("store backend error: {0}")]
    Backend(#[from] DatabaseError),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(DatabaseError::SqliteError(e))
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Database errors
// ---------------------------------------------------------------------------

/// Errors from the SQLite persistence layer.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Underlying rusqlite error.
    #[error("database error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// A migration failed.
    #[error("database migration failed (version {version}): {detail}")]
    MigrationFailed { version: u32, detail: String },

    /// A stored document body is not a JSON object.
    #[error("corrupt document {entity} '{name}': {detail}")]
    CorruptDocument {
        entity: String,
        name: String,
        detail: String,
    },

    /// Generic I/O error (e.g. file permissions).
    #[error("database I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Dispatch errors
// ---------------------------------------------------------------------------

/// Errors from routing a lifecycle event to a handler.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The entity name is not one this system knows about.
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    /// The event name is not a supported lifecycle event.
    #[error("unknown document event '{0}'")]
    UnknownEvent(String),

    /// The document payload did not match the entity's shape.
    #[error("failed to decode {entity} document: {source}")]
    Decode {
        entity: String,
        #[source]
        source: serde_json::Error,
    },
}
