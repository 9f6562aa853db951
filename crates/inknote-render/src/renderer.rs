//! Renderer trait abstraction.

use inknote_core::canvas::Canvas;
use inknote_core::freehand;
use inknote_core::stroke::{DEFAULT_STROKE_COLOR, Stroke, parse_color};
use kurbo::{Affine, BezPath, Rect, Size};
use log::warn;
use peniko::Color;
use std::borrow::Cow;

/// Canvas background (Tokyo Night).
pub const BACKGROUND_COLOR: Color = Color::from_rgb8(0x1a, 0x1b, 0x26);

/// Context for a single render frame.
pub struct RenderContext<'a> {
    /// The canvas to render.
    pub canvas: &'a Canvas,
    /// Viewport size in physical pixels.
    pub viewport_size: Size,
    /// Device pixel ratio (for HiDPI).
    pub scale_factor: f64,
    /// Background color.
    pub background_color: Color,
}

impl<'a> RenderContext<'a> {
    /// Create a new render context.
    pub fn new(canvas: &'a Canvas, viewport_size: Size) -> Self {
        Self {
            canvas,
            viewport_size,
            scale_factor: 1.0,
            background_color: BACKGROUND_COLOR,
        }
    }

    /// Set the scale factor for HiDPI.
    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    /// Set the background color.
    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    /// Canvas-to-viewport transform.
    pub fn transform(&self) -> Affine {
        Affine::scale(self.scale_factor)
    }
}

/// Trait for rendering backends.
pub trait Renderer: Send + Sync {
    /// Build the scene/command buffer for a frame.
    fn build_scene(&mut self, ctx: &RenderContext);

    /// Get the background color (for clearing).
    fn background_color(&self, ctx: &RenderContext) -> Color {
        ctx.background_color
    }
}

/// Minimal drawing surface the canvas is painted onto.
pub trait PaintTarget {
    /// Fill a rectangle in viewport coordinates.
    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Fill a closed path.
    fn fill_path(&mut self, path: &BezPath, transform: Affine, color: Color);
}

fn stroke_color(value: &str) -> Color {
    parse_color(value).unwrap_or_else(|| {
        warn!("Unparseable stroke color {:?}, using default", value);
        parse_color(DEFAULT_STROKE_COLOR).unwrap_or(Color::WHITE)
    })
}

/// Outline to fill for a committed stroke. Records saved without an outline
/// are shaped from their points.
fn stroke_outline(stroke: &Stroke) -> Cow<'_, BezPath> {
    if stroke.path.elements().is_empty() {
        Cow::Owned(freehand::stroke_path(&stroke.points, stroke.width))
    } else {
        Cow::Borrowed(&stroke.path)
    }
}

/// Paint one frame: background, committed strokes (minus those the eraser
/// has marked), then the stroke being drawn.
pub fn paint_canvas<T: PaintTarget + ?Sized>(target: &mut T, ctx: &RenderContext) {
    let viewport = Rect::new(0.0, 0.0, ctx.viewport_size.width, ctx.viewport_size.height);
    target.fill_rect(viewport, ctx.background_color);

    let transform = ctx.transform();
    for stroke in ctx.canvas.visible_strokes() {
        target.fill_path(&stroke_outline(stroke), transform, stroke_color(&stroke.color));
    }

    let tools = &ctx.canvas.tool_manager;
    if let Some(preview) = tools.preview() {
        if !preview.elements().is_empty() {
            target.fill_path(preview, transform, stroke_color(&tools.style().color));
        }
    }
}
