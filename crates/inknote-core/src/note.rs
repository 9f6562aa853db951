//! Notes, tags and canvas elements.

use crate::stroke::Stroke;
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum number of tags on a note.
pub const MAX_TAGS: usize = 4;

/// Template every new note starts with.
pub const BLANK_TEMPLATE_ID: &str = "blank";

/// Errors raised by note operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NoteError {
    #[error("note not found: {0}")]
    NoteNotFound(String),
    #[error("no note is open")]
    NoActiveNote,
    #[error("a note holds at most {MAX_TAGS} tags")]
    TagLimitReached,
    #[error("tag name is empty")]
    EmptyTagName,
    #[error("note title is empty")]
    EmptyTitle,
}

/// Fixed tag palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagColor {
    Blue,
    Red,
    Pink,
    Green,
    Yellow,
    Orange,
    Turquoise,
    Purple,
    White,
    Grey,
}

impl TagColor {
    /// All palette entries, in palette order.
    pub const ALL: [TagColor; 10] = [
        TagColor::Blue,
        TagColor::Red,
        TagColor::Pink,
        TagColor::Green,
        TagColor::Yellow,
        TagColor::Orange,
        TagColor::Turquoise,
        TagColor::Purple,
        TagColor::White,
        TagColor::Grey,
    ];

    /// Hex value of the palette entry.
    pub fn hex(self) -> &'static str {
        match self {
            TagColor::Blue => "#7aa2f7",
            TagColor::Red => "#f7768e",
            TagColor::Pink => "#bb9af7",
            TagColor::Green => "#9ece6a",
            TagColor::Yellow => "#e0af68",
            TagColor::Orange => "#ff9e64",
            TagColor::Turquoise => "#73daca",
            TagColor::Purple => "#9d7cd8",
            TagColor::White => "#c0caf5",
            TagColor::Grey => "#565f89",
        }
    }

    /// Pick a color for a new tag. White and grey are reserved for ink and
    /// chrome, so they are never picked.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> TagColor {
        let choices = &Self::ALL[..Self::ALL.len() - 2];
        choices.choose(rng).copied().unwrap_or(TagColor::Blue)
    }
}

/// A colored label attached to a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub color: TagColor,
}

impl Tag {
    /// Create a tag; `name` is trimmed and must not be empty.
    pub fn new(name: &str, color: TagColor) -> Result<Self, NoteError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(NoteError::EmptyTagName);
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            color,
        })
    }

    /// Create a tag with a random palette color.
    pub fn with_random_color(name: &str) -> Result<Self, NoteError> {
        Self::new(name, TagColor::random(&mut rand::thread_rng()))
    }
}

/// Background template reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            id: BLANK_TEMPLATE_ID.to_string(),
            options: None,
        }
    }
}

/// Placed image. Reserved in the data model; nothing draws or edits it yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageElement {
    pub id: u64,
    pub src: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One item on a note's canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum CanvasElement {
    Stroke(Stroke),
    Image(ImageElement),
}

impl CanvasElement {
    /// The stroke carried by this element, if it is one.
    pub fn as_stroke(&self) -> Option<&Stroke> {
        match self {
            CanvasElement::Stroke(stroke) => Some(stroke),
            _ => None,
        }
    }
}

/// A named drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub elements: Vec<CanvasElement>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub template: Template,
}

impl Note {
    /// Create an empty note.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            elements: Vec::new(),
            created_at: now,
            updated_at: now,
            tags: Vec::new(),
            template: Template::default(),
        }
    }

    /// Strokes stored in `elements`, in order.
    pub fn strokes(&self) -> Vec<Stroke> {
        self.elements
            .iter()
            .filter_map(CanvasElement::as_stroke)
            .cloned()
            .collect()
    }

    /// Replace the stroke elements with `strokes`, keeping other elements.
    pub fn set_strokes(&mut self, strokes: &[Stroke]) {
        self.elements.retain(|e| !matches!(e, CanvasElement::Stroke(_)));
        self.elements
            .extend(strokes.iter().cloned().map(CanvasElement::Stroke));
    }

    /// Copy of the note without stroke elements.
    pub fn metadata(&self) -> Note {
        let mut note = self.clone();
        note.elements.retain(|e| !matches!(e, CanvasElement::Stroke(_)));
        note
    }

    /// Attach a tag. Rejected once the note holds [`MAX_TAGS`] tags.
    pub fn add_tag(&mut self, tag: Tag) -> Result<(), NoteError> {
        if self.tags.len() >= MAX_TAGS {
            return Err(NoteError::TagLimitReached);
        }
        self.tags.push(tag);
        Ok(())
    }

    /// Detach a tag by id. Returns whether it was present.
    pub fn remove_tag(&mut self, tag_id: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t.id != tag_id);
        self.tags.len() != before
    }

    /// Mark the note as modified now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Parameters for creating a note.
#[derive(Debug, Clone, Default)]
pub struct NoteDraft {
    /// Title; a default is derived from the note id when `None`.
    pub title: Option<String>,
    pub tags: Vec<Tag>,
    pub template: Template,
}

/// Metadata edit applied outside the drawing surface.
#[derive(Debug, Clone, Default)]
pub struct MetadataUpdate {
    pub title: Option<String>,
    pub tags: Option<Vec<Tag>>,
}

impl MetadataUpdate {
    /// Apply the edit to `note`, validating title and tag count.
    pub fn apply(&self, note: &mut Note) -> Result<(), NoteError> {
        if let Some(title) = &self.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(NoteError::EmptyTitle);
            }
            note.title = title.to_string();
        }
        if let Some(tags) = &self.tags {
            if tags.len() > MAX_TAGS {
                return Err(NoteError::TagLimitReached);
            }
            note.tags = tags.clone();
        }
        note.touch();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::{Point, StrokeStyle};

    fn stroke(id: u64) -> Stroke {
        let points = vec![Point::new(0.0, 0.0, 0.5), Point::new(10.0, 10.0, 0.5)];
        Stroke::finalize(id, points, &StrokeStyle::default()).unwrap()
    }

    #[test]
    fn test_fifth_tag_rejected() {
        let mut note = Note::new("1", "Tags");
        for name in ["a", "b", "c", "d"] {
            note.add_tag(Tag::new(name, TagColor::Blue).unwrap()).unwrap();
        }
        let fifth = Tag::new("e", TagColor::Red).unwrap();
        assert_eq!(note.add_tag(fifth), Err(NoteError::TagLimitReached));
        assert_eq!(note.tags.len(), MAX_TAGS);
    }

    #[test]
    fn test_tag_name_trimmed() {
        assert_eq!(Tag::new("   ", TagColor::Blue), Err(NoteError::EmptyTagName));
        assert_eq!(Tag::new("  work ", TagColor::Blue).unwrap().name, "work");
    }

    #[test]
    fn test_tag_ids_unique() {
        let a = Tag::new("x", TagColor::Blue).unwrap();
        let b = Tag::new("x", TagColor::Blue).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_random_color_skips_reserved() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let color = TagColor::random(&mut rng);
            assert!(color != TagColor::White && color != TagColor::Grey);
        }
    }

    #[test]
    fn test_stroke_projection() {
        let mut note = Note::new("1", "Projection");
        note.elements.push(CanvasElement::Image(ImageElement {
            id: 9,
            src: "data:".to_string(),
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        }));
        note.set_strokes(&[stroke(1), stroke(2)]);
        assert_eq!(note.elements.len(), 3);
        assert_eq!(note.strokes().iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 2]);

        note.set_strokes(&[stroke(3)]);
        assert_eq!(note.elements.len(), 2);
        assert!(note.metadata().strokes().is_empty());
    }

    #[test]
    fn test_note_json_layout() {
        let mut note = Note::new("42", "Layout");
        note.set_strokes(&[stroke(1)]);
        let json = serde_json::to_value(&note).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
        assert_eq!(json["elements"][0]["type"], "stroke");
        assert_eq!(json["elements"][0]["data"]["id"], 1);
        assert_eq!(json["template"]["id"], BLANK_TEMPLATE_ID);
    }

    #[test]
    fn test_metadata_update() {
        let mut note = Note::new("1", "Old");
        let update = MetadataUpdate {
            title: Some("  New  ".to_string()),
            tags: Some(vec![Tag::new("t", TagColor::Green).unwrap()]),
        };
        update.apply(&mut note).unwrap();
        assert_eq!(note.title, "New");
        assert_eq!(note.tags.len(), 1);

        let blank = MetadataUpdate {
            title: Some(" ".to_string()),
            tags: None,
        };
        assert_eq!(blank.apply(&mut note), Err(NoteError::EmptyTitle));
    }
}
