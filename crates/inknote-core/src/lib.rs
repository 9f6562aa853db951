//! InkNote Core Library
//!
//! Freehand stroke pipeline and dual-backend note persistence: pointer
//! events become pressure-shaped strokes, strokes live in the open note's
//! store, and notes are kept in a fast key-value store and a SQLite
//! database at the same time.

pub mod canvas;
pub mod config;
pub mod eraser;
pub mod freehand;
pub mod ids;
pub mod input;
pub mod note;
pub mod storage;
pub mod store;
pub mod stroke;
pub mod tools;

pub use canvas::Canvas;
pub use config::{Config, ConfigError};
pub use ids::IdGenerator;
pub use input::{DeviceKind, PointerEvent};
pub use note::{CanvasElement, MetadataUpdate, Note, NoteDraft, NoteError, Tag, TagColor};
pub use storage::{Reconciler, StorageError};
pub use store::{LoadOutcome, NoteStore};
pub use stroke::{Point, Stroke, StrokeError, StrokeId, StrokeStyle};
pub use tools::{GestureState, ToolEffect, ToolKind, ToolManager};
