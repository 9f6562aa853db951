//! Drawing session: the tool machine wired to the note store.

use crate::config::Config;
use crate::ids::IdGenerator;
use crate::input::PointerEvent;
use crate::note::{MetadataUpdate, Note, NoteDraft, NoteError};
use crate::storage::{DeleteReport, Reconciler, SaveReport};
use crate::store::{LoadOutcome, NoteStore};
use crate::stroke::Stroke;
use crate::tools::{ToolEffect, ToolKind, ToolManager};
use std::sync::Arc;
use std::time::Instant;

/// A drawing surface bound to a note store.
pub struct Canvas {
    /// Tool manager.
    pub tool_manager: ToolManager,
    /// The open note and its strokes.
    pub store: NoteStore,
    /// Viewport size.
    pub viewport_size: kurbo::Size,
}

impl Canvas {
    /// Create a canvas persisting through `reconciler`.
    pub fn new(reconciler: Arc<Reconciler>, config: &Config) -> Self {
        let ids = Arc::new(IdGenerator::new());
        Self {
            tool_manager: ToolManager::new(ids.clone(), config),
            store: NoteStore::new(reconciler, ids, config),
            viewport_size: kurbo::Size::new(800.0, 600.0),
        }
    }

    /// Route a pointer event through the tool machine and apply its result
    /// to the store.
    pub fn handle_pointer_event(&mut self, event: &PointerEvent) -> ToolEffect {
        let effect = self
            .tool_manager
            .handle_event(event, self.store.current_strokes());
        match &effect {
            ToolEffect::StrokeFinished(stroke) => self.store.add_stroke(stroke.clone()),
            ToolEffect::EraseCommitted(ids) => {
                self.store.remove_strokes(ids);
            }
            ToolEffect::None | ToolEffect::Redraw => {}
        }
        effect
    }

    pub fn current_note(&self) -> Option<&Note> {
        self.store.current_note()
    }

    pub fn current_strokes(&self) -> &[Stroke] {
        self.store.current_strokes()
    }

    /// Committed strokes minus those the eraser gesture has marked.
    pub fn visible_strokes(&self) -> impl Iterator<Item = &Stroke> + '_ {
        let pending = self.tool_manager.pending_erase();
        self.store
            .current_strokes()
            .iter()
            .filter(move |s| !pending.contains(&s.id))
    }

    pub fn is_drawing(&self) -> bool {
        self.tool_manager.is_drawing()
    }

    pub fn is_erasing(&self) -> bool {
        self.tool_manager.is_erasing()
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.tool_manager.set_tool(tool);
    }

    pub fn set_stroke_color(&mut self, color: impl Into<String>) {
        self.tool_manager.set_stroke_color(color);
    }

    pub fn set_stroke_width(&mut self, width: f64) {
        self.tool_manager.set_stroke_width(width);
    }

    pub fn add_stroke(&mut self, stroke: Stroke) {
        self.store.add_stroke(stroke);
    }

    pub fn remove_strokes(&mut self, ids: &[u64]) -> usize {
        self.store.remove_strokes(ids)
    }

    /// Open another note. Any gesture in progress is dropped first.
    pub async fn load_note(&mut self, id: &str) -> Result<LoadOutcome, NoteError> {
        self.tool_manager.cancel();
        self.store.load_note(id).await
    }

    pub async fn create_new_note(&mut self) -> Note {
        self.tool_manager.cancel();
        self.store.create_new_note().await
    }

    pub async fn create_note(&mut self, draft: NoteDraft) -> Result<Note, NoteError> {
        self.tool_manager.cancel();
        self.store.create_note(draft).await
    }

    pub async fn delete_note(&mut self, id: &str) -> DeleteReport {
        if self.current_note().is_some_and(|n| n.id == id) {
            self.tool_manager.cancel();
        }
        self.store.delete_note(id).await
    }

    pub async fn save_note(&mut self) -> Result<SaveReport, NoteError> {
        self.store.save_note().await
    }

    pub async fn update_metadata(&mut self, id: &str, update: &MetadataUpdate) -> Result<Note, NoteError> {
        self.store.update_metadata(id, update).await
    }

    pub async fn list_notes(&self) -> Vec<Note> {
        self.store.list_notes().await
    }

    /// Drive the autosave timer.
    pub async fn tick(&mut self, now: Instant) -> Option<SaveReport> {
        self.store.tick(now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::DeviceKind;
    use crate::storage::test_util::block_on;
    use kurbo::Point;

    fn canvas() -> Canvas {
        let config = Config::default();
        let reconciler = Arc::new(Reconciler::in_memory(&config).unwrap());
        Canvas::new(reconciler, &config)
    }

    fn pen(event: &str, x: f64, y: f64) -> PointerEvent {
        let position = Point::new(x, y);
        let device = DeviceKind::Pen;
        match event {
            "down" => PointerEvent::Down { position, pressure: Some(0.5), device },
            "move" => PointerEvent::Move { position, pressure: Some(0.5), device },
            _ => PointerEvent::Up { position, device },
        }
    }

    fn draw_line(canvas: &mut Canvas, x: f64) {
        canvas.handle_pointer_event(&pen("down", x, 0.0));
        canvas.handle_pointer_event(&pen("move", x, 10.0));
        canvas.handle_pointer_event(&pen("up", x, 10.0));
    }

    #[test]
    fn test_drawn_stroke_reaches_store() {
        let mut canvas = canvas();
        block_on(canvas.create_new_note());
        draw_line(&mut canvas, 0.0);
        assert_eq!(canvas.current_strokes().len(), 1);
        assert!(canvas.store.autosave_pending());
    }

    #[test]
    fn test_pending_erase_hidden_then_removed() {
        let mut canvas = canvas();
        block_on(canvas.create_new_note());
        draw_line(&mut canvas, 0.0);
        draw_line(&mut canvas, 300.0);

        canvas.set_tool(ToolKind::Eraser);
        canvas.handle_pointer_event(&pen("down", 0.0, 5.0));
        assert_eq!(canvas.visible_strokes().count(), 1);
        assert_eq!(canvas.current_strokes().len(), 2);

        canvas.handle_pointer_event(&pen("up", 0.0, 5.0));
        assert_eq!(canvas.current_strokes().len(), 1);
        assert_eq!(canvas.current_strokes()[0].points[0].x, 300.0);
    }

    #[test]
    fn test_load_cancels_gesture() {
        let mut canvas = canvas();
        let note = block_on(canvas.create_new_note());
        canvas.handle_pointer_event(&pen("down", 0.0, 0.0));
        assert!(canvas.is_drawing());

        block_on(canvas.load_note(&note.id)).unwrap();
        assert!(!canvas.is_drawing());
    }
}
