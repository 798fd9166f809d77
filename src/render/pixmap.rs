//! tiny-skia backed surface

use std::f32::consts::FRAC_PI_2;
use std::path::Path;
use tiny_skia::{
    BlendMode, FillRule, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke, Transform,
};

use crate::color::Color;
use crate::render::font::Typeface;
use crate::render::surface::{DrawCall, Point, Surface};
use crate::render::RenderError;

pub struct PixmapSurface {
    pixmap: Pixmap,
    typeface: Typeface,
}

impl PixmapSurface {
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        let pixmap =
            Pixmap::new(width, height).ok_or(RenderError::SurfaceUnavailable { width, height })?;
        Ok(Self {
            pixmap,
            typeface: Typeface::bitmap(),
        })
    }

    pub fn with_typeface(mut self, typeface: Typeface) -> Self {
        self.typeface = typeface;
        self
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    fn fill_path(&mut self, path: &tiny_skia::Path, color: Color, transform: Transform) {
        let mut paint = Paint::default();
        paint.set_color(color.into());
        paint.anti_alias = true;
        self.pixmap
            .fill_path(path, &paint, FillRule::Winding, transform, None);
    }

    fn stroke_path(&mut self, path: &tiny_skia::Path, color: Color, width: f32) {
        let mut paint = Paint::default();
        paint.set_color(color.into());
        paint.anti_alias = true;
        let stroke = Stroke {
            width,
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(path, &paint, &stroke, Transform::identity(), None);
    }

    fn clear_region(&mut self, width: u32, height: u32) {
        if width >= self.pixmap.width() && height >= self.pixmap.height() {
            self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
            return;
        }
        let Some(rect) = Rect::from_xywh(0.0, 0.0, width as f32, height as f32) else {
            return;
        };
        let mut paint = Paint::default();
        paint.blend_mode = BlendMode::Clear;
        self.pixmap
            .fill_rect(rect, &paint, Transform::identity(), None);
    }
}

impl Surface for PixmapSurface {
    fn size(&self) -> (u32, u32) {
        (self.pixmap.width(), self.pixmap.height())
    }

    fn draw(&mut self, call: &DrawCall) -> Result<(), RenderError> {
        match call {
            DrawCall::Clear { width, height } => self.clear_region(*width, *height),
            DrawCall::Wedge {
                center,
                radius,
                start,
                end,
                fill,
                stroke,
                stroke_width,
            } => {
                let mut pb = PathBuilder::new();
                pb.move_to(center.x, center.y);
                pb.line_to(
                    center.x + radius * start.cos(),
                    center.y + radius * start.sin(),
                );
                push_arc(&mut pb, *center, *radius, *start, *end);
                pb.close();
                let path = pb.finish().ok_or(RenderError::Path("wedge"))?;

                self.fill_path(&path, *fill, Transform::identity());
                if *stroke_width > 0.0 {
                    self.stroke_path(&path, *stroke, *stroke_width);
                }
            }
            DrawCall::Disc {
                center,
                radius,
                fill,
            } => {
                let path = PathBuilder::from_circle(center.x, center.y, *radius)
                    .ok_or(RenderError::Path("disc"))?;
                self.fill_path(&path, *fill, Transform::identity());
            }
            DrawCall::Ring {
                center,
                radius,
                color,
                width,
            } => {
                let path = PathBuilder::from_circle(center.x, center.y, *radius)
                    .ok_or(RenderError::Path("ring"))?;
                self.stroke_path(&path, *color, *width);
            }
            DrawCall::Polygon { points, fill } => {
                let Some((first, rest)) = points.split_first() else {
                    return Ok(());
                };
                let mut pb = PathBuilder::new();
                pb.move_to(first.x, first.y);
                for point in rest {
                    pb.line_to(point.x, point.y);
                }
                pb.close();
                let path = pb.finish().ok_or(RenderError::Path("polygon"))?;
                self.fill_path(&path, *fill, Transform::identity());
            }
            DrawCall::Text {
                text,
                anchor,
                rotation,
                offset,
                size,
                color,
            } => {
                // Blank labels have nothing to fill
                let Some(path) = self.typeface.layout(text, *size) else {
                    return Ok(());
                };
                let transform = Transform::from_translate(anchor.x, anchor.y)
                    .pre_rotate(rotation.to_degrees())
                    .pre_translate(offset.x, offset.y);
                self.fill_path(&path, *color, transform);
            }
        }
        Ok(())
    }
}

/// Append a circular arc as cubic Béziers of at most a quarter turn each
fn push_arc(pb: &mut PathBuilder, center: Point, radius: f32, start: f32, end: f32) {
    let sweep = end - start;
    let pieces = (sweep.abs() / FRAC_PI_2).ceil().max(1.0) as usize;
    let step = sweep / pieces as f32;
    let k = 4.0 / 3.0 * (step / 4.0).tan();

    let mut a0 = start;
    for _ in 0..pieces {
        let a1 = a0 + step;
        let (s0, c0) = a0.sin_cos();
        let (s1, c1) = a1.sin_cos();
        pb.cubic_to(
            center.x + radius * (c0 - k * s0),
            center.y + radius * (s0 + k * c0),
            center.x + radius * (c1 + k * s1),
            center.y + radius * (s1 - k * c1),
            center.x + radius * c1,
            center.y + radius * s1,
        );
        a0 = a1;
    }
}

/// Flatten layers, bottom first, over a solid background
pub fn composite(layers: &[&PixmapSurface], background: Color) -> Result<Pixmap, RenderError> {
    let (width, height) = layers
        .first()
        .map(|layer| layer.size())
        .ok_or(RenderError::SurfaceUnavailable {
            width: 0,
            height: 0,
        })?;
    let mut out =
        Pixmap::new(width, height).ok_or(RenderError::SurfaceUnavailable { width, height })?;
    out.fill(background.into());

    for layer in layers {
        out.draw_pixmap(
            0,
            0,
            layer.pixmap.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }
    Ok(out)
}

pub fn save_png(pixmap: &Pixmap, path: &Path) -> Result<(), RenderError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    pixmap
        .save_png(path)
        .map_err(|e| RenderError::Encode(e.to_string()))
}
