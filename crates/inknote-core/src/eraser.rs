//! Radius-based eraser hit-testing.

use crate::stroke::{Stroke, StrokeId};
use kurbo::Point;

/// Eraser radius for the given stroke width.
pub fn eraser_radius(stroke_width: f64, factor: f64) -> f64 {
    stroke_width * factor
}

/// Ids of strokes with at least one sample point within `radius` of `at`.
///
/// Only sample points are tested, not the segments between them, so a fast
/// stroke with widely spaced samples can be missed between two samples.
/// Ids are returned in stroke-list order.
pub fn hit_test(strokes: &[Stroke], at: Point, radius: f64) -> Vec<StrokeId> {
    strokes
        .iter()
        .filter(|stroke| stroke.has_point_within(at, radius))
        .map(|stroke| stroke.id)
        .collect()
}
