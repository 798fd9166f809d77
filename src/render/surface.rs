//! Drawing surface abstraction
//!
//! The renderer describes every frame as a sequence of [`DrawCall`]s and
//! hands them to a [`Surface`]. The tiny-skia pixmap turns them into pixels;
//! the recording surface keeps them around so frames can be compared.

use crate::color::Color;
use crate::render::RenderError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCall {
    /// Wipe the `width` x `height` region at the origin
    Clear { width: u32, height: u32 },
    /// Pie slice from `center` out to `radius`, between two angles in radians
    Wedge {
        center: Point,
        radius: f32,
        start: f32,
        end: f32,
        fill: Color,
        stroke: Color,
        stroke_width: f32,
    },
    Disc {
        center: Point,
        radius: f32,
        fill: Color,
    },
    Ring {
        center: Point,
        radius: f32,
        color: Color,
        width: f32,
    },
    Polygon {
        points: Vec<Point>,
        fill: Color,
    },
    /// Text centered on `anchor + rotate(rotation) * offset`, turned by `rotation`
    Text {
        text: String,
        anchor: Point,
        rotation: f32,
        offset: Point,
        size: f32,
        color: Color,
    },
}

/// Something the renderer can draw onto
pub trait Surface {
    fn size(&self) -> (u32, u32);

    fn draw(&mut self, call: &DrawCall) -> Result<(), RenderError>;
}

/// Surface that records draw calls instead of rasterizing them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    calls: Vec<DrawCall>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    /// Calls issued since the most recent clear
    pub fn current_frame(&self) -> &[DrawCall] {
        let start = self
            .calls
            .iter()
            .rposition(|call| matches!(call, DrawCall::Clear { .. }))
            .map(|i| i + 1)
            .unwrap_or(0);
        &self.calls[start..]
    }

    pub fn clear_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, DrawCall::Clear { .. }))
            .count()
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn draw(&mut self, call: &DrawCall) -> Result<(), RenderError> {
        self.calls.push(call.clone());
        Ok(())
    }
}
