//! Pointer events delivered to the tool machine.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Kind of device behind a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Pen,
    Touch,
    Mouse,
}

impl DeviceKind {
    /// Precision devices report real pressure and may draw in pen-only mode.
    pub fn is_precision(self) -> bool {
        matches!(self, DeviceKind::Pen)
    }
}

/// Pointer event type for unified pen/touch/mouse handling.
///
/// `pressure` is the raw device value in `[0, 1]`, `None` when the device
/// does not report one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down {
        position: Point,
        pressure: Option<f64>,
        device: DeviceKind,
    },
    Move {
        position: Point,
        pressure: Option<f64>,
        device: DeviceKind,
    },
    Up {
        position: Point,
        device: DeviceKind,
    },
    /// The platform took the pointer away (palm rejection, gesture, ...).
    Cancel {
        device: DeviceKind,
    },
    /// The pointer left the canvas.
    Leave {
        device: DeviceKind,
    },
    /// Pressure-only update from a force-sensing pen.
    Force {
        force: f64,
    },
}

impl PointerEvent {
    /// Device that produced the event, if the event carries one.
    pub fn device(&self) -> Option<DeviceKind> {
        match self {
            PointerEvent::Down { device, .. }
            | PointerEvent::Move { device, .. }
            | PointerEvent::Up { device, .. }
            | PointerEvent::Cancel { device }
            | PointerEvent::Leave { device } => Some(*device),
            PointerEvent::Force { .. } => None,
        }
    }

    /// Canvas position of the event, if it has one.
    pub fn position(&self) -> Option<Point> {
        match self {
            PointerEvent::Down { position, .. }
            | PointerEvent::Move { position, .. }
            | PointerEvent::Up { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// Whether the event ends a gesture.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PointerEvent::Up { .. } | PointerEvent::Cancel { .. } | PointerEvent::Leave { .. }
        )
    }
}
