//! Fast note store: every note in one JSON array under a single key.

use super::{KeyValueStore, StorageResult};
use crate::note::Note;
use std::sync::Arc;

/// Key holding the note array.
pub const NOTES_KEY: &str = "notes";

/// Full notes (elements included) kept in a [`KeyValueStore`].
///
/// Every write rewrites the whole array, so the quota bounds the total size
/// of all notes together.
#[derive(Clone)]
pub struct FastNoteStore {
    kv: Arc<dyn KeyValueStore>,
}

impl FastNoteStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// All stored notes, in insertion order. A missing key is an empty list.
    pub fn read_all(&self) -> StorageResult<Vec<Note>> {
        match self.kv.get_item(NOTES_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn write_all(&self, notes: &[Note]) -> StorageResult<()> {
        let json = serde_json::to_string(notes)?;
        self.kv.set_item(NOTES_KEY, &json)
    }

    /// Find a note by id.
    pub fn find(&self, id: &str) -> StorageResult<Option<Note>> {
        Ok(self.read_all()?.into_iter().find(|n| n.id == id))
    }

    /// Replace the note with the same id, or append it.
    pub fn upsert(&self, note: &Note) -> StorageResult<()> {
        let mut notes = self.read_all()?;
        match notes.iter_mut().find(|n| n.id == note.id) {
            Some(existing) => *existing = note.clone(),
            None => notes.push(note.clone()),
        }
        self.write_all(&notes)
    }

    /// Remove a note. Returns whether it was present.
    pub fn remove(&self, id: &str) -> StorageResult<bool> {
        let mut notes = self.read_all()?;
        let before = notes.len();
        notes.retain(|n| n.id != id);
        if notes.len() == before {
            return Ok(false);
        }
        self.write_all(&notes)?;
        Ok(true)
    }
}
