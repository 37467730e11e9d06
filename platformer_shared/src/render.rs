//! Rendering abstraction.
//!
//! This crate intentionally does not depend on a graphics backend.
//! The UI layer implements this trait; the core only issues rectangles.

use crate::math::Rect;

/// RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub const WHITE: Color = Color(255, 255, 255);
    pub const BLACK: Color = Color(0, 0, 0);
    pub const BLUE: Color = Color(0, 0, 255);
    pub const RED: Color = Color(255, 0, 0);
    pub const GOLD: Color = Color(255, 200, 0);
}

/// A minimal rendering API.
pub trait RenderBackend {
    fn begin_frame(&mut self, clear: Color);
    fn draw_rect(&mut self, rect: Rect, color: Color);
    fn end_frame(&mut self);
}

/// A no-op renderer useful for headless runs and tests.
#[derive(Default)]
pub struct NullRenderer;

impl RenderBackend for NullRenderer {
    fn begin_frame(&mut self, _clear: Color) {}
    fn draw_rect(&mut self, _rect: Rect, _color: Color) {}
    fn end_frame(&mut self) {}
}
