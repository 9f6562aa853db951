//! InkNote Render Library
//!
//! Paints a canvas: background, committed strokes and the live preview.
//! The default implementation uses Vello for GPU-accelerated rendering.

mod renderer;

#[cfg(feature = "vello-renderer")]
mod vello_impl;

pub use renderer::{BACKGROUND_COLOR, PaintTarget, RenderContext, Renderer, paint_canvas};

#[cfg(feature = "vello-renderer")]
pub use vello_impl::VelloRenderer;
