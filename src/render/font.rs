//! Text outlines for the pixmap surface
//!
//! Labels are drawn with the configured font family when the system has it
//! (looked up through fontdb, outlines read with ttf-parser). Without a
//! usable font we fall back to a built-in 5x7 bitmap font so a wheel always
//! gets its labels.

use std::fmt;
use std::sync::Arc;
use tiny_skia::{Path, PathBuilder, Rect};

#[derive(Clone)]
pub enum Typeface {
    Outline(OutlineFace),
    Bitmap,
}

#[derive(Clone)]
pub struct OutlineFace {
    family: String,
    data: Arc<Vec<u8>>,
    index: u32,
}

impl fmt::Debug for Typeface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Typeface {
    /// Look up `family` among the system fonts, preferring a bold face
    pub fn load(family: &str) -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();

        let families = [fontdb::Family::Name(family), fontdb::Family::SansSerif];
        let query = fontdb::Query {
            families: &families,
            weight: fontdb::Weight::BOLD,
            ..fontdb::Query::default()
        };

        let Some(id) = db.query(&query) else {
            tracing::debug!(family, "No system font found, using bitmap font");
            return Typeface::Bitmap;
        };

        let resolved = db
            .face(id)
            .and_then(|face| face.families.first().map(|(name, _)| name.clone()))
            .unwrap_or_else(|| family.to_string());

        match db.with_face_data(id, |data, index| (data.to_vec(), index)) {
            Some((data, index)) if ttf_parser::Face::parse(&data, index).is_ok() => {
                tracing::debug!(requested = family, resolved = %resolved, "Loaded font");
                Typeface::Outline(OutlineFace {
                    family: resolved,
                    data: Arc::new(data),
                    index,
                })
            }
            _ => {
                tracing::debug!(family, "Font could not be parsed, using bitmap font");
                Typeface::Bitmap
            }
        }
    }

    pub fn bitmap() -> Self {
        Typeface::Bitmap
    }

    pub fn name(&self) -> &str {
        match self {
            Typeface::Outline(face) => &face.family,
            Typeface::Bitmap => "bitmap",
        }
    }

    /// Outline of `text` at `size` pixels, centered horizontally and
    /// vertically on the origin. `None` when nothing would be drawn.
    pub fn layout(&self, text: &str, size: f32) -> Option<Path> {
        match self {
            Typeface::Outline(face) => match ttf_parser::Face::parse(&face.data, face.index) {
                Ok(parsed) => outline_layout(&parsed, text, size),
                Err(_) => bitmap_layout(text, size),
            },
            Typeface::Bitmap => bitmap_layout(text, size),
        }
    }
}

fn outline_layout(face: &ttf_parser::Face, text: &str, size: f32) -> Option<Path> {
    let units = face.units_per_em() as f32;
    if units <= 0.0 {
        return None;
    }
    let scale = size / units;

    let mut pen = 0.0;
    let mut glyphs = Vec::new();
    for ch in text.chars() {
        match face.glyph_index(ch) {
            Some(id) => {
                glyphs.push((id, pen));
                pen += face.glyph_hor_advance(id).unwrap_or(0) as f32 * scale;
            }
            None => pen += size * 0.5,
        }
    }

    let dx = -pen / 2.0;
    let dy = (face.ascender() as f32 + face.descender() as f32) / 2.0 * scale;

    let mut pb = PathBuilder::new();
    for (id, x) in glyphs {
        let mut sink = GlyphSink {
            pb: &mut pb,
            scale,
            dx: dx + x,
            dy,
        };
        face.outline_glyph(id, &mut sink);
    }
    pb.finish()
}

/// Feeds font units into a path builder, flipping y to screen space
struct GlyphSink<'a> {
    pb: &'a mut PathBuilder,
    scale: f32,
    dx: f32,
    dy: f32,
}

impl GlyphSink<'_> {
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.dx + x * self.scale, self.dy - y * self.scale)
    }
}

impl ttf_parser::OutlineBuilder for GlyphSink<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.pb.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.pb.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.pb.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.pb.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.pb.close();
    }
}

fn bitmap_layout(text: &str, size: f32) -> Option<Path> {
    let pixel = size / 7.0;
    let count = text.chars().count();
    if count == 0 || pixel <= 0.0 {
        return None;
    }

    // (5px glyph + 1px spacing) per char, minus the trailing space
    let width = (count as f32 * 6.0 - 1.0) * pixel;
    let left = -width / 2.0;
    let top = -3.5 * pixel;

    let mut pb = PathBuilder::new();
    for (i, ch) in text.chars().enumerate() {
        let Some(rows) = glyph(ch) else {
            continue;
        };
        let char_x = left + i as f32 * 6.0 * pixel;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..5 {
                if (bits >> (4 - col)) & 1 == 1 {
                    let x = char_x + col as f32 * pixel;
                    let y = top + row as f32 * pixel;
                    if let Some(rect) = Rect::from_xywh(x, y, pixel, pixel) {
                        push_rect(&mut pb, rect);
                    }
                }
            }
        }
    }
    pb.finish()
}

fn push_rect(pb: &mut PathBuilder, rect: Rect) {
    pb.move_to(rect.left(), rect.top());
    pb.line_to(rect.right(), rect.top());
    pb.line_to(rect.right(), rect.bottom());
    pb.line_to(rect.left(), rect.bottom());
    pb.close();
}

/// Simple 5x7 bitmap patterns (1 = filled, 0 = empty)
fn glyph(ch: char) -> Option<[u8; 7]> {
    let rows = match ch.to_ascii_uppercase() {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10011, 0b10001, 0b10001, 0b01110],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '!' => [0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00000, 0b00100],
        '?' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b00000, 0b00100],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        ',' => [0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b00100, 0b01000],
        '\'' => [0b00100, 0b00100, 0b01000, 0b00000, 0b00000, 0b00000, 0b00000],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        '+' => [0b00000, 0b00100, 0b00100, 0b11111, 0b00100, 0b00100, 0b00000],
        ':' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000],
        '/' => [0b00001, 0b00010, 0b00010, 0b00100, 0b01000, 0b01000, 0b10000],
        '&' => [0b01100, 0b10010, 0b10100, 0b01000, 0b10101, 0b10010, 0b01101],
        '$' => [0b00100, 0b01111, 0b10100, 0b01110, 0b00101, 0b11110, 0b00100],
        '#' => [0b01010, 0b01010, 0b11111, 0b01010, 0b11111, 0b01010, 0b01010],
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_layout_is_centered() {
        let path = Typeface::bitmap().layout("SPIN", 14.0).unwrap();
        let bounds = path.bounds();
        assert!((bounds.left() + bounds.right()).abs() < 0.01);
        assert!((bounds.top() + bounds.bottom()).abs() < 0.01);
        assert!((bounds.height() - 14.0).abs() < 0.01);
    }

    #[test]
    fn test_bitmap_layout_lowercase_matches_uppercase() {
        let lower = Typeface::bitmap().layout("wendy's", 14.0).unwrap();
        let upper = Typeface::bitmap().layout("WENDY'S", 14.0).unwrap();
        assert_eq!(lower.bounds(), upper.bounds());
    }

    #[test]
    fn test_bitmap_layout_of_blank_text() {
        assert!(Typeface::bitmap().layout("", 14.0).is_none());
        assert!(Typeface::bitmap().layout("   ", 14.0).is_none());
    }

    #[test]
    fn test_every_pattern_fits_five_columns() {
        let chars = ('A'..='Z').chain('0'..='9').chain("!?.,'-+:/&$#".chars());
        for ch in chars {
            let rows = glyph(ch).unwrap_or_else(|| panic!("missing glyph for {:?}", ch));
            assert!(rows.iter().all(|row| *row < 0b100000), "{:?}", ch);
            assert!(rows.iter().any(|row| *row != 0), "{:?}", ch);
        }
    }
}
