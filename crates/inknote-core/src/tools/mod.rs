//! Pointer/tool state machine.
//!
//! Turns pointer events into stroke commits and erase batches. At most one
//! gesture is active at a time; it belongs to the device that started it.

use crate::config::Config;
use crate::eraser;
use crate::freehand;
use crate::ids::IdGenerator;
use crate::input::{DeviceKind, PointerEvent};
use crate::stroke::{Point, Stroke, StrokeId, StrokeStyle, normalize_pressure};
use kurbo::BezPath;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Pencil,
    Eraser,
}

/// State of the current gesture.
#[derive(Debug, Clone, Default)]
pub enum GestureState {
    /// Waiting for a pointer to go down.
    #[default]
    Idle,
    /// Pencil gesture in progress.
    Drawing {
        /// Recorded samples, pressure already normalized.
        points: Vec<Point>,
        device: DeviceKind,
        /// Whether the device reports real pressure.
        precision: bool,
        /// Outline of the stroke so far.
        preview: BezPath,
    },
    /// Eraser gesture in progress.
    Erasing {
        device: DeviceKind,
        /// Strokes marked for removal, in the order they were hit.
        pending: Vec<StrokeId>,
    },
}

impl GestureState {
    fn device(&self) -> Option<DeviceKind> {
        match self {
            GestureState::Idle => None,
            GestureState::Drawing { device, .. } | GestureState::Erasing { device, .. } => {
                Some(*device)
            }
        }
    }
}

/// What the caller has to do after an event.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolEffect {
    /// Nothing changed.
    None,
    /// The preview or the pending-erase set changed.
    Redraw,
    /// A stroke was finished and belongs in the note.
    StrokeFinished(Stroke),
    /// These strokes were erased, as one batch.
    EraseCommitted(Vec<StrokeId>),
}

/// Manages the current tool and its gesture.
#[derive(Debug, Clone)]
pub struct ToolManager {
    /// Currently selected tool.
    current_tool: ToolKind,
    state: GestureState,
    /// Style applied to new strokes.
    style: StrokeStyle,
    pen_only: bool,
    eraser_radius_factor: f64,
    ids: Arc<IdGenerator>,
}

impl ToolManager {
    /// Create a tool manager with the pencil selected.
    pub fn new(ids: Arc<IdGenerator>, config: &Config) -> Self {
        Self {
            current_tool: ToolKind::default(),
            state: GestureState::Idle,
            style: config.stroke_style(),
            pen_only: config.pen_only,
            eraser_radius_factor: config.eraser_radius_factor,
            ids,
        }
    }

    pub fn tool(&self) -> ToolKind {
        self.current_tool
    }

    /// Select a tool. Switching to a different tool discards an unfinished
    /// gesture without committing anything; returns whether one was.
    /// Reselecting the current tool leaves the gesture alone.
    pub fn set_tool(&mut self, tool: ToolKind) -> bool {
        if tool == self.current_tool {
            return false;
        }
        self.current_tool = tool;
        self.cancel()
    }

    /// Drop the current gesture. Returns whether one was active.
    pub fn cancel(&mut self) -> bool {
        let was_active = !matches!(self.state, GestureState::Idle);
        if was_active {
            debug!("Discarding unfinished {:?} gesture", self.current_tool);
        }
        self.state = GestureState::Idle;
        was_active
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.state, GestureState::Drawing { .. })
    }

    pub fn is_erasing(&self) -> bool {
        matches!(self.state, GestureState::Erasing { .. })
    }

    /// Outline of the stroke being drawn.
    pub fn preview(&self) -> Option<&BezPath> {
        match &self.state {
            GestureState::Drawing { preview, .. } => Some(preview),
            _ => None,
        }
    }

    /// Strokes marked by the eraser gesture in progress.
    pub fn pending_erase(&self) -> &[StrokeId] {
        match &self.state {
            GestureState::Erasing { pending, .. } => pending,
            _ => &[],
        }
    }

    pub fn style(&self) -> &StrokeStyle {
        &self.style
    }

    /// Color for strokes started from now on.
    pub fn set_stroke_color(&mut self, color: impl Into<String>) {
        self.style.color = color.into();
    }

    /// Width for strokes started from now on. Also scales the eraser.
    pub fn set_stroke_width(&mut self, width: f64) {
        if width.is_finite() && width > 0.0 {
            self.style.width = width;
        }
    }

    pub fn eraser_radius(&self) -> f64 {
        eraser::eraser_radius(self.style.width, self.eraser_radius_factor)
    }

    fn may_draw(&self, device: DeviceKind) -> bool {
        device.is_precision() || !self.pen_only
    }

    /// Feed one pointer event. `strokes` is the committed stroke list the
    /// eraser tests against.
    pub fn handle_event(&mut self, event: &PointerEvent, strokes: &[Stroke]) -> ToolEffect {
        // Events from another pointer never touch an active gesture.
        if let (Some(active), Some(device)) = (self.state.device(), event.device()) {
            if active != device {
                return ToolEffect::None;
            }
        }

        match event {
            PointerEvent::Down {
                position,
                pressure,
                device,
            } => self.begin(*position, *pressure, *device, strokes),
            PointerEvent::Move {
                position, pressure, ..
            } => self.update(*position, *pressure, strokes),
            PointerEvent::Force { force } => self.apply_force(*force),
            PointerEvent::Up { .. } | PointerEvent::Cancel { .. } | PointerEvent::Leave { .. } => {
                self.end()
            }
        }
    }

    fn begin(
        &mut self,
        position: kurbo::Point,
        pressure: Option<f64>,
        device: DeviceKind,
        strokes: &[Stroke],
    ) -> ToolEffect {
        if !matches!(self.state, GestureState::Idle) {
            return ToolEffect::None;
        }
        match self.current_tool {
            ToolKind::Pencil => {
                if !self.may_draw(device) {
                    return ToolEffect::None;
                }
                let points = vec![Point::from_device(position, pressure)];
                let preview = freehand::stroke_path(&points, self.style.width);
                self.state = GestureState::Drawing {
                    points,
                    device,
                    precision: device.is_precision(),
                    preview,
                };
                ToolEffect::Redraw
            }
            ToolKind::Eraser => {
                let mut pending = Vec::new();
                if !strokes.is_empty() {
                    merge_hits(&mut pending, eraser::hit_test(strokes, position, self.eraser_radius()));
                }
                self.state = GestureState::Erasing { device, pending };
                ToolEffect::Redraw
            }
        }
    }

    fn update(&mut self, position: kurbo::Point, pressure: Option<f64>, strokes: &[Stroke]) -> ToolEffect {
        let radius = self.eraser_radius();
        let width = self.style.width;
        match &mut self.state {
            GestureState::Idle => ToolEffect::None,
            GestureState::Drawing { points, preview, .. } => {
                points.push(Point::from_device(position, pressure));
                *preview = freehand::stroke_path(points, width);
                ToolEffect::Redraw
            }
            GestureState::Erasing { pending, .. } => {
                if merge_hits(pending, eraser::hit_test(strokes, position, radius)) {
                    ToolEffect::Redraw
                } else {
                    ToolEffect::None
                }
            }
        }
    }

    fn apply_force(&mut self, force: f64) -> ToolEffect {
        let width = self.style.width;
        match &mut self.state {
            GestureState::Drawing {
                points,
                precision: true,
                preview,
                ..
            } => {
                let Some(last) = points.last().copied() else {
                    return ToolEffect::None;
                };
                points.push(Point {
                    pressure: normalize_pressure(Some(force)),
                    ..last
                });
                *preview = freehand::stroke_path(points, width);
                ToolEffect::Redraw
            }
            _ => ToolEffect::None,
        }
    }

    fn end(&mut self) -> ToolEffect {
        match std::mem::take(&mut self.state) {
            GestureState::Idle => ToolEffect::None,
            GestureState::Drawing { points, .. } => {
                match Stroke::finalize(self.ids.next_id(), points, &self.style) {
                    Ok(stroke) => {
                        debug!("Finished stroke {} with {} point(s)", stroke.id, stroke.points.len());
                        ToolEffect::StrokeFinished(stroke)
                    }
                    Err(e) => {
                        debug!("Dropping stroke: {}", e);
                        ToolEffect::Redraw
                    }
                }
            }
            GestureState::Erasing { pending, .. } => {
                if pending.is_empty() {
                    ToolEffect::Redraw
                } else {
                    debug!("Erasing {} stroke(s)", pending.len());
                    ToolEffect::EraseCommitted(pending)
                }
            }
        }
    }
}

/// Add new hits to `pending`, keeping first-hit order. Returns whether any
/// id was new.
fn merge_hits(pending: &mut Vec<StrokeId>, hits: Vec<StrokeId>) -> bool {
    let before = pending.len();
    for id in hits {
        if !pending.contains(&id) {
            pending.push(id);
        }
    }
    pending.len() != before
}
