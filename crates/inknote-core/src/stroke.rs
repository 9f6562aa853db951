//! Stroke data: pressure-normalized sample points and finalized strokes.

use crate::freehand;
use kurbo::BezPath;
use peniko::Color;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stroke identifier, issued by [`crate::ids::IdGenerator`].
pub type StrokeId = u64;

/// Lowest pressure a point may carry.
pub const MIN_PRESSURE: f64 = 0.1;
/// Highest pressure a point may carry.
pub const MAX_PRESSURE: f64 = 1.0;
/// Pressure used when the device does not report one.
pub const DEFAULT_PRESSURE: f64 = 0.5;

/// Default stroke color (palette white).
pub const DEFAULT_STROKE_COLOR: &str = "#c0caf5";
/// Default stroke width in canvas units.
pub const DEFAULT_STROKE_WIDTH: f64 = 2.0;

/// Fewest points a stroke needs to be finalized.
pub const MIN_STROKE_POINTS: usize = 2;

/// Errors raised while finalizing a stroke.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StrokeError {
    #[error("stroke has {points} point(s), at least {MIN_STROKE_POINTS} are required")]
    Degenerate { points: usize },
}

/// Map a device-reported pressure into `[MIN_PRESSURE, MAX_PRESSURE]`.
///
/// Devices that report nothing (or zero, as mice do) get [`DEFAULT_PRESSURE`].
/// A reported force in `[0, 1]` is rescaled so the full device range lands
/// inside the stored range.
pub fn normalize_pressure(raw: Option<f64>) -> f64 {
    match raw {
        Some(force) if force.is_finite() && force > 0.0 => {
            MIN_PRESSURE + force.clamp(0.0, 1.0) * (MAX_PRESSURE - MIN_PRESSURE)
        }
        _ => DEFAULT_PRESSURE,
    }
}

/// A single sample of a freehand stroke.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub pressure: f64,
}

impl Point {
    /// Create a point, clamping `pressure` into the stored range.
    pub fn new(x: f64, y: f64, pressure: f64) -> Self {
        let pressure = if pressure.is_finite() {
            pressure.clamp(MIN_PRESSURE, MAX_PRESSURE)
        } else {
            DEFAULT_PRESSURE
        };
        Self { x, y, pressure }
    }

    /// Create a point from a raw device sample.
    pub fn from_device(position: kurbo::Point, raw_pressure: Option<f64>) -> Self {
        Self {
            x: position.x,
            y: position.y,
            pressure: normalize_pressure(raw_pressure),
        }
    }

    /// Position without pressure.
    pub fn position(&self) -> kurbo::Point {
        kurbo::Point::new(self.x, self.y)
    }
}

/// Tool that produced a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeTool {
    #[default]
    Pencil,
}

/// Color and width applied to new strokes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    pub color: String,
    pub width: f64,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: DEFAULT_STROKE_COLOR.to_string(),
            width: DEFAULT_STROKE_WIDTH,
        }
    }
}

/// A finalized freehand stroke.
///
/// `path` is the filled outline produced by [`freehand::stroke_path`] when the
/// stroke was finalized. Rendering always uses it as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub id: StrokeId,
    #[serde(default)]
    pub tool: StrokeTool,
    pub points: Vec<Point>,
    pub color: String,
    pub width: f64,
    #[serde(default)]
    pub path: BezPath,
}

impl Stroke {
    /// Finalize a stroke from its recorded points.
    ///
    /// Points are kept exactly as given, in order.
    pub fn finalize(id: StrokeId, points: Vec<Point>, style: &StrokeStyle) -> Result<Self, StrokeError> {
        if points.len() < MIN_STROKE_POINTS {
            return Err(StrokeError::Degenerate { points: points.len() });
        }
        let path = freehand::stroke_path(&points, style.width);
        Ok(Self {
            id,
            tool: StrokeTool::Pencil,
            points,
            color: style.color.clone(),
            width: style.width,
            path,
        })
    }

    /// Whether any sample point lies within `radius` of `at`.
    pub fn has_point_within(&self, at: kurbo::Point, radius: f64) -> bool {
        self.points.iter().any(|p| p.position().distance(at) <= radius)
    }
}

/// Parse a CSS color string such as `#7aa2f7`.
pub fn parse_color(value: &str) -> Option<Color> {
    peniko::color::parse_color(value)
        .ok()
        .map(|color| color.to_alpha_color::<peniko::color::Srgb>())
}
