//! Canonical note store.
//!
//! Owns the open note and its stroke list. Every stroke mutation restarts
//! the autosave timer; the note's `elements` are only rebuilt from the
//! stroke list when a save happens.

use crate::config::Config;
use crate::ids::IdGenerator;
use crate::note::{MetadataUpdate, Note, NoteDraft, NoteError, MAX_TAGS};
use crate::storage::{
    AutosaveDebouncer, DeleteReport, LoadedNote, ReconcileError, Reconciler, SaveReport,
};
use crate::stroke::{Stroke, StrokeId};
use log::{debug, info};
use std::sync::Arc;
use std::time::Instant;

impl From<ReconcileError> for NoteError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::NoteNotFound(id) => NoteError::NoteNotFound(id),
            ReconcileError::Note(e) => e,
        }
    }
}

/// A load handed out by [`NoteStore::begin_load`].
///
/// Owns everything it needs, so it can run without borrowing the store.
pub struct LoadRequest {
    id: String,
    reconciler: Arc<Reconciler>,
}

impl LoadRequest {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Read the note from storage.
    pub async fn run(self) -> LoadResponse {
        let result = self.reconciler.load_note(&self.id).await;
        LoadResponse {
            id: self.id,
            result,
        }
    }
}

/// Result of a [`LoadRequest`], to be passed to [`NoteStore::finish_load`].
pub struct LoadResponse {
    pub id: String,
    pub result: Result<LoadedNote, ReconcileError>,
}

/// Whether a load replaced the store's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// Another load was already in flight; this one was dropped.
    Ignored,
}

/// The open note and its strokes.
pub struct NoteStore {
    reconciler: Arc<Reconciler>,
    ids: Arc<IdGenerator>,
    note: Option<Note>,
    strokes: Vec<Stroke>,
    autosave: AutosaveDebouncer,
    /// Id of the load in flight.
    loading: Option<String>,
}

impl NoteStore {
    pub fn new(reconciler: Arc<Reconciler>, ids: Arc<IdGenerator>, config: &Config) -> Self {
        Self {
            reconciler,
            ids,
            note: None,
            strokes: Vec::new(),
            autosave: AutosaveDebouncer::new(config.autosave_delay()),
            loading: None,
        }
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// The open note. Its `elements` reflect the last save, not the live
    /// stroke list.
    pub fn current_note(&self) -> Option<&Note> {
        self.note.as_ref()
    }

    pub fn current_strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    pub fn autosave_pending(&self) -> bool {
        self.autosave.is_pending()
    }

    /// Append a finished stroke.
    pub fn add_stroke(&mut self, stroke: Stroke) {
        self.strokes.push(stroke);
        self.autosave.schedule(Instant::now());
    }

    /// Remove strokes by id. Returns how many were removed.
    pub fn remove_strokes(&mut self, ids: &[StrokeId]) -> usize {
        let before = self.strokes.len();
        self.strokes.retain(|s| !ids.contains(&s.id));
        let removed = before - self.strokes.len();
        if removed > 0 {
            self.autosave.schedule(Instant::now());
        }
        removed
    }

    /// Rebuild the open note from the stroke list and stamp it as modified.
    fn snapshot(&mut self) -> Option<Note> {
        let note = self.note.as_mut()?;
        note.set_strokes(&self.strokes);
        note.touch();
        Some(note.clone())
    }

    /// Snapshot to persist if the autosave timer fired by `now`.
    ///
    /// Returns `Some` once per quiet period.
    pub fn poll_autosave(&mut self, now: Instant) -> Option<Note> {
        if self.autosave.poll(now) {
            self.snapshot()
        } else {
            None
        }
    }

    /// Poll the autosave timer and save if it fired.
    pub async fn tick(&mut self, now: Instant) -> Option<SaveReport> {
        let note = self.poll_autosave(now)?;
        debug!("Autosaving note {}", note.id);
        Some(self.reconciler.save_note(&note).await)
    }

    /// Save the open note now. Clears any pending autosave.
    pub async fn save_note(&mut self) -> Result<SaveReport, NoteError> {
        self.autosave.cancel();
        let note = self.snapshot().ok_or(NoteError::NoActiveNote)?;
        Ok(self.reconciler.save_note(&note).await)
    }

    /// Start loading a note. Returns `None` while another load is in flight.
    pub fn begin_load(&mut self, id: &str) -> Option<LoadRequest> {
        if let Some(in_flight) = &self.loading {
            debug!("Ignoring load of {} while {} is loading", id, in_flight);
            return None;
        }
        self.loading = Some(id.to_string());
        Some(LoadRequest {
            id: id.to_string(),
            reconciler: self.reconciler.clone(),
        })
    }

    /// Apply a finished load, replacing the open note and its strokes.
    pub fn finish_load(&mut self, response: LoadResponse) -> Result<(), NoteError> {
        if self.loading.as_deref() == Some(response.id.as_str()) {
            self.loading = None;
        }
        let loaded = response.result?;

        if let Some(max) = loaded.strokes.iter().map(|s| s.id).max() {
            self.ids.observe(max);
        }
        if let Ok(numeric) = loaded.note.id.parse::<u64>() {
            self.ids.observe(numeric);
        }

        self.autosave.cancel();
        self.strokes = loaded.strokes;
        self.note = Some(loaded.note);
        Ok(())
    }

    /// Load a note and make it the open one.
    pub async fn load_note(&mut self, id: &str) -> Result<LoadOutcome, NoteError> {
        let Some(request) = self.begin_load(id) else {
            return Ok(LoadOutcome::Ignored);
        };
        let response = request.run().await;
        self.finish_load(response)?;
        Ok(LoadOutcome::Loaded)
    }

    /// Create an empty note, persist it and open it.
    pub async fn create_new_note(&mut self) -> Note {
        let note = self.new_note(NoteDraft::default());
        self.persist_new(note).await
    }

    /// Create a note with a caller-chosen title, tags and template.
    pub async fn create_note(&mut self, draft: NoteDraft) -> Result<Note, NoteError> {
        if draft.tags.len() > MAX_TAGS {
            return Err(NoteError::TagLimitReached);
        }
        let note = self.new_note(draft);
        Ok(self.persist_new(note).await)
    }

    fn new_note(&self, draft: NoteDraft) -> Note {
        let id = self.ids.next_note_id();
        let title = draft
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| format!("Note {}", id));
        let mut note = Note::new(id, title);
        note.tags = draft.tags;
        note.template = draft.template;
        note
    }

    async fn persist_new(&mut self, note: Note) -> Note {
        self.reconciler.save_note(&note).await;
        info!("Created note {}", note.id);
        self.autosave.cancel();
        self.strokes.clear();
        self.note = Some(note.clone());
        note
    }

    /// Delete a note from storage. If it is the open note it is closed too,
    /// and its pending autosave dropped so it cannot come back.
    pub async fn delete_note(&mut self, id: &str) -> DeleteReport {
        let report = self.reconciler.delete_note(id).await;
        if self.note.as_ref().is_some_and(|n| n.id == id) {
            self.autosave.cancel();
            self.note = None;
            self.strokes.clear();
        }
        report
    }

    /// Edit a note's title or tags, writing both backends immediately.
    pub async fn update_metadata(&mut self, id: &str, update: &MetadataUpdate) -> Result<Note, NoteError> {
        let updated = self.reconciler.update_metadata(id, update).await?;
        if let Some(open) = self.note.as_mut().filter(|n| n.id == id) {
            open.title = updated.title.clone();
            open.tags = updated.tags.clone();
            open.updated_at = updated.updated_at;
        }
        Ok(updated)
    }

    /// Every known note, most recently updated first.
    pub async fn list_notes(&self) -> Vec<Note> {
        self.reconciler.list_notes().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::{Tag, TagColor};
    use crate::storage::NoteSource;
    use crate::storage::test_util::block_on;
    use crate::stroke::{Point, StrokeStyle};
    use std::time::Duration;

    fn store() -> NoteStore {
        let config = Config::default();
        let reconciler = Arc::new(Reconciler::in_memory(&config).unwrap());
        NoteStore::new(reconciler, Arc::new(IdGenerator::new()), &config)
    }

    fn stroke(id: StrokeId) -> Stroke {
        let points = vec![Point::new(0.0, 0.0, 0.5), Point::new(1.0, 1.0, 0.5)];
        Stroke::finalize(id, points, &StrokeStyle::default()).unwrap()
    }

    #[test]
    fn test_create_new_note_is_persisted() {
        let mut store = store();
        let note = block_on(store.create_new_note());
        assert_eq!(note.title, format!("Note {}", note.id));
        assert_eq!(note.template.id, "blank");
        assert!(note.tags.is_empty());
        assert_eq!(store.current_note().unwrap().id, note.id);
        assert!(store.reconciler().fast().find(&note.id).unwrap().is_some());
    }

    #[test]
    fn test_create_note_from_draft() {
        let mut store = store();
        let draft = NoteDraft {
            title: Some("  Plans ".to_string()),
            tags: vec![Tag::new("work", TagColor::Blue).unwrap()],
            ..NoteDraft::default()
        };
        let note = block_on(store.create_note(draft)).unwrap();
        assert_eq!(note.title, "Plans");
        assert_eq!(note.tags.len(), 1);

        let too_many = NoteDraft {
            tags: (0..5).map(|i| Tag::new(&i.to_string(), TagColor::Red).unwrap()).collect(),
            ..NoteDraft::default()
        };
        assert_eq!(block_on(store.create_note(too_many)), Err(NoteError::TagLimitReached));
    }

    #[test]
    fn test_mutations_debounce_into_one_save() {
        let mut store = store();
        block_on(store.create_new_note());
        let start = Instant::now();
        for id in 1..=5 {
            store.add_stroke(stroke(id));
        }
        store.remove_strokes(&[2]);

        assert!(store.poll_autosave(start + Duration::from_millis(500)).is_none());
        let later = Instant::now() + Duration::from_millis(1000);
        let saved = store.poll_autosave(later).unwrap();
        assert_eq!(saved.strokes().len(), 4);
        assert!(store.poll_autosave(later + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn test_remove_unknown_ids_does_not_schedule() {
        let mut store = store();
        block_on(store.create_new_note());
        assert_eq!(store.remove_strokes(&[42]), 0);
        assert!(!store.autosave_pending());
    }

    #[test]
    fn test_tick_saves_both_backends() {
        let mut store = store();
        let note = block_on(store.create_new_note());
        store.add_stroke(stroke(1));

        let report = block_on(store.tick(Instant::now() + Duration::from_secs(1))).unwrap();
        assert!(report.is_complete());

        let loaded = block_on(store.reconciler().load_note(&note.id)).unwrap();
        assert_eq!(loaded.source, NoteSource::Durable);
        assert_eq!(loaded.strokes.len(), 1);
    }

    #[test]
    fn test_manual_save_cancels_timer() {
        let mut store = store();
        block_on(store.create_new_note());
        store.add_stroke(stroke(1));
        assert!(block_on(store.save_note()).unwrap().is_complete());
        assert!(!store.autosave_pending());
    }

    #[test]
    fn test_save_without_note() {
        let mut store = store();
        assert!(matches!(block_on(store.save_note()), Err(NoteError::NoActiveNote)));
    }

    #[test]
    fn test_load_replaces_state() {
        let mut store = store();
        let first = block_on(store.create_new_note());
        store.add_stroke(stroke(1));
        block_on(store.save_note()).unwrap();

        block_on(store.create_new_note());
        store.add_stroke(stroke(2));
        assert!(store.autosave_pending());

        assert_eq!(block_on(store.load_note(&first.id)), Ok(LoadOutcome::Loaded));
        assert_eq!(store.current_note().unwrap().id, first.id);
        assert_eq!(store.current_strokes().iter().map(|s| s.id).collect::<Vec<_>>(), vec![1]);
        assert!(!store.autosave_pending());
    }

    #[test]
    fn test_second_load_is_dropped() {
        let mut store = store();
        let note = block_on(store.create_new_note());

        let request = store.begin_load(&note.id).unwrap();
        assert!(store.is_loading());
        assert!(store.begin_load(&note.id).is_none());
        assert_eq!(block_on(store.load_note(&note.id)), Ok(LoadOutcome::Ignored));

        let response = block_on(request.run());
        store.finish_load(response).unwrap();
        assert!(!store.is_loading());
    }

    #[test]
    fn test_load_missing_note() {
        let mut store = store();
        assert_eq!(
            block_on(store.load_note("nope")),
            Err(NoteError::NoteNotFound("nope".to_string()))
        );
        assert!(!store.is_loading());
    }

    #[test]
    fn test_load_moves_id_floor() {
        let mut store = store();
        let note = block_on(store.create_new_note());
        let far = note.id.parse::<u64>().unwrap() + 10_000_000;
        store.add_stroke(stroke(far));
        block_on(store.save_note()).unwrap();

        block_on(store.load_note(&note.id)).unwrap();
        let next = block_on(store.create_new_note());
        assert!(next.id.parse::<u64>().unwrap() > far);
    }

    #[test]
    fn test_delete_active_note_cancels_autosave() {
        let mut store = store();
        let note = block_on(store.create_new_note());
        store.add_stroke(stroke(1));

        assert!(block_on(store.delete_note(&note.id)).is_complete());
        assert!(store.current_note().is_none());
        assert!(store.current_strokes().is_empty());
        assert!(block_on(store.tick(Instant::now() + Duration::from_secs(2))).is_none());
        assert!(block_on(store.reconciler().load_note(&note.id)).is_err());
    }

    #[test]
    fn test_update_metadata_updates_open_note() {
        let mut store = store();
        let note = block_on(store.create_new_note());
        let update = MetadataUpdate {
            title: Some("Renamed".to_string()),
            tags: None,
        };
        block_on(store.update_metadata(&note.id, &update)).unwrap();
        assert_eq!(store.current_note().unwrap().title, "Renamed");
        assert_eq!(block_on(store.list_notes())[0].title, "Renamed");
    }
}
