//! Storage abstraction for note persistence.
//!
//! Two independent backends hold every note:
//!
//! - a synchronous, size-limited [`KeyValueStore`] holding one JSON array of
//!   full notes ([`FastNoteStore`]);
//! - an asynchronous, transactional [`NoteDatabase`] holding note metadata
//!   and stroke records in separate tables ([`SqliteNoteDatabase`]).
//!
//! The [`Reconciler`] keeps them consistent.

mod autosave;
mod fast;
mod file;
mod memory;
mod reconciler;
mod sqlite;

pub use autosave::AutosaveDebouncer;
pub use fast::{FastNoteStore, NOTES_KEY};
pub use file::FileKeyValue;
pub use memory::MemoryKeyValue;
pub use reconciler::{
    DeleteReport, LoadedNote, NoteSource, ReconcileError, Reconciler, SaveReport,
};
pub use sqlite::{DATABASE_FILE, DbLocation, SqliteNoteDatabase};

use crate::note::Note;
use crate::stroke::Stroke;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Note not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Synchronous string key-value store with a byte quota.
///
/// Mirrors the browser-local storage the fast backend stands in for: small,
/// synchronous, and failing loudly once the quota is reached.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write a value, replacing any previous one.
    fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a value. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> StorageResult<()>;
}

/// Transactional note database.
///
/// Note rows carry metadata only; strokes live in their own records keyed
/// by note id and come back in insertion order.
pub trait NoteDatabase: Send + Sync {
    /// Write `note`'s metadata and replace all of its stroke records, in one
    /// transaction.
    fn save_note<'a>(&'a self, note: &'a Note, strokes: &'a [Stroke]) -> BoxFuture<'a, StorageResult<()>>;

    /// Write `note`'s metadata, leaving stroke records alone.
    fn put_metadata<'a>(&'a self, note: &'a Note) -> BoxFuture<'a, StorageResult<()>>;

    /// Read a note's metadata. `elements` is always empty.
    fn get_note<'a>(&'a self, id: &'a str) -> BoxFuture<'a, StorageResult<Note>>;

    /// Read a note's strokes.
    ///
    /// Fails with [`StorageError::SchemaMismatch`] when the stroke table or
    /// its note index is missing.
    fn get_strokes<'a>(&'a self, note_id: &'a str) -> BoxFuture<'a, StorageResult<Vec<Stroke>>>;

    /// All notes' metadata, most recently updated first.
    fn list_notes(&self) -> BoxFuture<'_, StorageResult<Vec<Note>>>;

    /// Remove a note and all of its stroke records, in one transaction.
    fn delete_note<'a>(&'a self, id: &'a str) -> BoxFuture<'a, StorageResult<()>>;

    /// Destroy the database and create it again with the current schema.
    fn recreate(&self) -> BoxFuture<'_, StorageResult<()>>;

    /// Release the underlying connection. Later calls fail with
    /// [`StorageError::Unavailable`].
    fn close(&self);
}
