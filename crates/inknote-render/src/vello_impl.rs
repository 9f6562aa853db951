//! Vello-based renderer implementation.

use crate::renderer::{PaintTarget, RenderContext, Renderer, paint_canvas};
use kurbo::{Affine, BezPath, Rect};
use peniko::{Color, Fill};
use vello::Scene;

impl PaintTarget for Scene {
    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.fill(Fill::NonZero, Affine::IDENTITY, color, None, &rect);
    }

    fn fill_path(&mut self, path: &BezPath, transform: Affine, color: Color) {
        self.fill(Fill::NonZero, transform, color, None, path);
    }
}

/// Vello-based renderer for GPU-accelerated 2D graphics.
#[derive(Default)]
pub struct VelloRenderer {
    /// The Vello scene being built.
    scene: Scene,
}

impl VelloRenderer {
    /// Create a new renderer with an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the scene built by the last frame.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Take ownership of the scene (resets internal scene).
    pub fn take_scene(&mut self) -> Scene {
        std::mem::take(&mut self.scene)
    }
}

impl Renderer for VelloRenderer {
    fn build_scene(&mut self, ctx: &RenderContext) {
        self.scene.reset();
        paint_canvas(&mut self.scene, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inknote_core::canvas::Canvas;
    use inknote_core::config::Config;
    use inknote_core::storage::Reconciler;
    use inknote_core::stroke::{Point, Stroke, StrokeStyle};
    use std::sync::Arc;

    fn canvas() -> Canvas {
        let config = Config::default();
        let reconciler = Arc::new(Reconciler::in_memory(&config).unwrap());
        Canvas::new(reconciler, &config)
    }

    #[test]
    fn test_renderer_creation() {
        let renderer = VelloRenderer::new();
        assert!(renderer.scene().encoding().is_empty());
    }

    #[test]
    fn test_build_scene_with_strokes() {
        let mut renderer = VelloRenderer::new();
        let mut canvas = canvas();
        let points = vec![Point::new(10.0, 10.0, 0.5), Point::new(60.0, 40.0, 0.8)];
        canvas.add_stroke(Stroke::finalize(1, points, &StrokeStyle::default()).unwrap());

        let ctx = RenderContext::new(&canvas, kurbo::Size::new(800.0, 600.0));
        renderer.build_scene(&ctx);
        assert!(!renderer.scene().encoding().is_empty());

        let taken = renderer.take_scene();
        assert!(!taken.encoding().is_empty());
        assert!(renderer.scene().encoding().is_empty());
    }
}
