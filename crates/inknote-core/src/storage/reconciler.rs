//! Keeps the fast store and the note database consistent.
//!
//! Writes go to both backends independently: a failure in one is logged and
//! reported but never rolls back or blocks the other. Reads prefer the
//! database and fall back to the fast store.

use super::{
    DATABASE_FILE, FastNoteStore, FileKeyValue, KeyValueStore, MemoryKeyValue, NoteDatabase,
    SqliteNoteDatabase, StorageError, StorageResult,
};
use crate::config::Config;
use crate::note::{MetadataUpdate, Note, NoteError};
use crate::stroke::Stroke;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Directory (under the data dir) holding the fast store's files.
const FAST_STORE_DIR: &str = "local";

/// Errors surfaced by the reconciler.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Note not found: {0}")]
    NoteNotFound(String),
    #[error(transparent)]
    Note(#[from] NoteError),
}

/// Per-backend outcome of a save.
#[derive(Debug)]
pub struct SaveReport {
    pub fast: StorageResult<()>,
    pub durable: StorageResult<()>,
}

impl SaveReport {
    /// Both backends accepted the write.
    pub fn is_complete(&self) -> bool {
        self.fast.is_ok() && self.durable.is_ok()
    }

    /// At least one backend accepted the write.
    pub fn is_persisted(&self) -> bool {
        self.fast.is_ok() || self.durable.is_ok()
    }
}

/// Per-backend outcome of a delete.
#[derive(Debug)]
pub struct DeleteReport {
    pub fast: StorageResult<()>,
    pub durable: StorageResult<()>,
}

impl DeleteReport {
    pub fn is_complete(&self) -> bool {
        self.fast.is_ok() && self.durable.is_ok()
    }
}

/// Backend a note was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteSource {
    Durable,
    Fast,
}

/// A note read back from storage.
#[derive(Debug, Clone)]
pub struct LoadedNote {
    /// The note, `elements` rebuilt from `strokes`.
    pub note: Note,
    pub strokes: Vec<Stroke>,
    pub source: NoteSource,
}

/// Dual-backend persistence.
pub struct Reconciler {
    fast: FastNoteStore,
    durable: Arc<dyn NoteDatabase>,
}

impl Reconciler {
    /// Wrap already opened backends.
    pub fn new(kv: Arc<dyn KeyValueStore>, durable: Arc<dyn NoteDatabase>) -> Self {
        Self {
            fast: FastNoteStore::new(kv),
            durable,
        }
    }

    /// Open both backends under the configured data directory.
    pub fn open(config: &Config) -> StorageResult<Self> {
        let dir = config
            .data_dir()
            .ok_or_else(|| StorageError::Io("Could not determine data directory".to_string()))?;
        let kv = FileKeyValue::with_quota(dir.join(FAST_STORE_DIR), config.fast_store_quota_bytes)?;
        let db = SqliteNoteDatabase::open(dir.join(DATABASE_FILE))?;
        info!("Opened note storage in {}", dir.display());
        Ok(Self::new(Arc::new(kv), Arc::new(db)))
    }

    /// Ephemeral backends, for tests and throwaway sessions.
    pub fn in_memory(config: &Config) -> StorageResult<Self> {
        let kv = MemoryKeyValue::with_quota(config.fast_store_quota_bytes);
        let db = SqliteNoteDatabase::open_in_memory()?;
        Ok(Self::new(Arc::new(kv), Arc::new(db)))
    }

    pub fn fast(&self) -> &FastNoteStore {
        &self.fast
    }

    pub fn durable(&self) -> &Arc<dyn NoteDatabase> {
        &self.durable
    }

    /// Release the database connection.
    pub fn close(&self) {
        self.durable.close();
    }

    /// Write a full note to both backends.
    ///
    /// The fast store gets the note as is; the database gets its metadata
    /// and a fresh set of stroke records taken from `elements`.
    pub async fn save_note(&self, note: &Note) -> SaveReport {
        let fast = self.fast.upsert(note);
        if let Err(e) = &fast {
            warn!("Fast store rejected note {}: {}", note.id, e);
        }

        let strokes = note.strokes();
        let durable = self.durable.save_note(note, &strokes).await;
        if let Err(e) = &durable {
            warn!("Note database rejected note {}: {}", note.id, e);
        }

        let report = SaveReport { fast, durable };
        if !report.is_persisted() {
            error!("Note {} was not saved to any backend", note.id);
        } else {
            debug!("Saved note {} ({} stroke(s))", note.id, strokes.len());
        }
        report
    }

    /// Read a note, preferring the database.
    pub async fn load_note(&self, id: &str) -> Result<LoadedNote, ReconcileError> {
        match self.durable.get_note(id).await {
            Ok(mut note) => {
                let strokes = self.durable_strokes(id).await;
                note.set_strokes(&strokes);
                info!("Loaded note {} from note database", id);
                Ok(LoadedNote {
                    note,
                    strokes,
                    source: NoteSource::Durable,
                })
            }
            Err(e) => {
                if !matches!(e, StorageError::NotFound(_)) {
                    warn!("Note database read failed for {}: {}", id, e);
                }
                match self.fast_note(id) {
                    Some(note) => {
                        info!("Loaded note {} from fast store", id);
                        Ok(LoadedNote {
                            strokes: note.strokes(),
                            note,
                            source: NoteSource::Fast,
                        })
                    }
                    None => Err(ReconcileError::NoteNotFound(id.to_string())),
                }
            }
        }
    }

    /// Strokes from the database, healing a stale schema and falling back to
    /// the fast store on other failures.
    async fn durable_strokes(&self, id: &str) -> Vec<Stroke> {
        match self.durable.get_strokes(id).await {
            Ok(strokes) => strokes,
            Err(StorageError::SchemaMismatch(reason)) => {
                warn!("Note database schema is stale ({}), recreating it", reason);
                self.heal().await;
                Vec::new()
            }
            Err(e) => {
                warn!("Reading strokes of {} failed: {}; using fast store copy", id, e);
                self.fast_note(id).map(|n| n.strokes()).unwrap_or_default()
            }
        }
    }

    async fn heal(&self) {
        self.durable.close();
        match self.durable.recreate().await {
            Ok(()) => info!("Note database recreated"),
            Err(e) => error!("Failed to recreate note database: {}", e),
        }
    }

    fn fast_note(&self, id: &str) -> Option<Note> {
        match self.fast.find(id) {
            Ok(note) => note,
            Err(e) => {
                warn!("Fast store read failed: {}", e);
                None
            }
        }
    }

    /// Remove a note from both backends.
    pub async fn delete_note(&self, id: &str) -> DeleteReport {
        let durable = self.durable.delete_note(id).await;
        if let Err(e) = &durable {
            warn!("Note database failed to delete {}: {}", id, e);
        }
        let fast = self.fast.remove(id).map(|_| ());
        if let Err(e) = &fast {
            warn!("Fast store failed to delete {}: {}", id, e);
        }
        info!("Deleted note {}", id);
        DeleteReport { fast, durable }
    }

    /// Metadata of every known note, most recently updated first.
    ///
    /// Notes present in both backends are taken from the database.
    pub async fn list_notes(&self) -> Vec<Note> {
        let mut notes = match self.durable.list_notes().await {
            Ok(notes) => notes,
            Err(e) => {
                warn!("Listing note database failed: {}", e);
                Vec::new()
            }
        };
        let known: HashSet<String> = notes.iter().map(|n| n.id.clone()).collect();
        match self.fast.read_all() {
            Ok(fast) => notes.extend(
                fast.into_iter()
                    .filter(|n| !known.contains(&n.id))
                    .map(|n| n.metadata()),
            ),
            Err(e) => warn!("Listing fast store failed: {}", e),
        }
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        notes
    }

    /// Apply a title/tag edit and write it straight to both backends.
    ///
    /// Returns the updated note metadata.
    pub async fn update_metadata(&self, id: &str, update: &MetadataUpdate) -> Result<Note, ReconcileError> {
        let fast_copy = self.fast_note(id);
        let (mut note, in_durable) = match self.durable.get_note(id).await {
            Ok(note) => (note, true),
            Err(_) => {
                let note = fast_copy
                    .as_ref()
                    .map(Note::metadata)
                    .ok_or_else(|| ReconcileError::NoteNotFound(id.to_string()))?;
                (note, false)
            }
        };
        update.apply(&mut note)?;

        // A note the database has never seen goes in with its strokes, or
        // later loads would find an empty durable copy.
        let written = match (&fast_copy, in_durable) {
            (Some(full), false) => self.durable.save_note(&note, &full.strokes()).await,
            _ => self.durable.put_metadata(&note).await,
        };
        if let Err(e) = written {
            warn!("Note database rejected metadata of {}: {}", id, e);
        }
        if let Some(mut full) = fast_copy {
            full.title = note.title.clone();
            full.tags = note.tags.clone();
            full.updated_at = note.updated_at;
            if let Err(e) = self.fast.upsert(&full) {
                warn!("Fast store rejected metadata of {}: {}", id, e);
            }
        }
        debug!("Updated metadata of note {}", id);
        Ok(note)
    }
}
