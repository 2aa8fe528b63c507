//! Education <-> LMS sync core library.
//!
//! This crate keeps enrollment and course records mirrored between the
//! Education and LMS modules of a shared document store: the record store
//! abstraction and its SQLite backend, natural-key lookups, the reconciler
//! handlers, event dispatch, and configuration.

pub mod config;
pub mod db;
pub mod dispatch;
pub mod errors;
pub mod keys;
pub mod models;
pub mod outcome;
pub mod reconciler;
pub mod report;
pub mod runner;
pub mod store;

// Re-exports for convenience.
pub use config::AppConfig;
pub use db::Database;
pub use dispatch::{DocEvent, Handler, HookTable};
pub use outcome::Outcome;
pub use reconciler::{CourseEvent, Reconciler};
pub use runner::EventRunner;
pub use store::{MemoryStore, RecordStore};
