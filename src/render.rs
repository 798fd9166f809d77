//! Wheel rendering
//!
//! Stateless drawing functions: everything they need comes in through their
//! arguments, and the output goes to whatever [`Surface`] the caller holds.
//! The wheel itself is redrawn every tick; the outline, spin button and
//! needle live on a separate overlay drawn once.

pub mod font;
pub mod pixmap;
pub mod surface;

pub use pixmap::PixmapSurface;
pub use surface::{DrawCall, Point, RecordingSurface, Surface};

use thiserror::Error;

use crate::color::Color;
use crate::config::{CanvasConfig, WheelConfig};
use crate::geometry;
use crate::segment::Segment;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Could not allocate a {width}x{height} surface")]
    SurfaceUnavailable { width: u32, height: u32 },

    #[error("Degenerate {0} path")]
    Path(&'static str),

    #[error("PNG encoding failed: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stroke width of the lines between segments
pub const SEGMENT_STROKE_WIDTH: f32 = 1.0;
/// Stroke width of the wheel outline and the spin button ring
pub const OUTLINE_WIDTH: f32 = 10.0;

const NEEDLE_HALF_WIDTH: f32 = 20.0;
const NEEDLE_LENGTH: f32 = 20.0;
const BUTTON_TEXT_DROP: f32 = 3.0;
const CAPTION_OFFSET: Point = Point::new(10.0, 50.0);

/// Everything that changes between two frames of the wheel layer
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub angle: f64,
    pub segments: &'a [Segment],
    pub canvas: &'a CanvasConfig,
    pub wheel: &'a WheelConfig,
    /// Winner caption and its colour, drawn under the wheel
    pub caption: Option<(&'a str, Color)>,
}

impl CanvasConfig {
    pub fn center(&self) -> Point {
        Point::new(self.center_x, self.center_y)
    }
}

/// Wipe the whole canvas
pub fn clear<S: Surface + ?Sized>(surface: &mut S, canvas: &CanvasConfig) -> Result<(), RenderError> {
    surface.draw(&DrawCall::Clear {
        width: canvas.width,
        height: canvas.height,
    })
}

/// Draw every segment rotated by `angle`, each with its label
pub fn draw_wheel<S: Surface + ?Sized>(
    surface: &mut S,
    angle: f64,
    segments: &[Segment],
    canvas: &CanvasConfig,
    wheel: &WheelConfig,
) -> Result<(), RenderError> {
    let center = canvas.center();
    let label_distance = wheel.radius / 2.0 + wheel.spin_button_radius / 2.0;

    for (index, segment) in segments.iter().enumerate() {
        let (start, end) = geometry::segment_span(index, segments.len(), angle);

        surface.draw(&DrawCall::Wedge {
            center,
            radius: wheel.radius,
            start: start as f32,
            end: end as f32,
            fill: segment.fill,
            stroke: wheel.primary_color,
            stroke_width: SEGMENT_STROKE_WIDTH,
        })?;

        surface.draw(&DrawCall::Text {
            text: segment.label().to_string(),
            anchor: center,
            rotation: ((start + end) / 2.0) as f32,
            offset: Point::new(label_distance, 0.0),
            size: wheel.font_size,
            color: segment.text_color.unwrap_or(wheel.contrast_color),
        })?;
    }

    Ok(())
}

/// Outline ring, spin button and needle; these never move
pub fn draw_static_overlay<S: Surface + ?Sized>(
    surface: &mut S,
    wheel: &WheelConfig,
    canvas: &CanvasConfig,
) -> Result<(), RenderError> {
    let center = canvas.center();
    let button = wheel.spin_button_radius;

    surface.draw(&DrawCall::Ring {
        center,
        radius: wheel.radius,
        color: wheel.outline(),
        width: OUTLINE_WIDTH,
    })?;

    surface.draw(&DrawCall::Disc {
        center,
        radius: button,
        fill: wheel.spin_button_fill(),
    })?;
    surface.draw(&DrawCall::Ring {
        center,
        radius: button,
        color: wheel.contrast_color,
        width: OUTLINE_WIDTH,
    })?;
    surface.draw(&DrawCall::Text {
        text: wheel.spin_button_text.clone(),
        anchor: center,
        rotation: 0.0,
        offset: Point::new(0.0, BUTTON_TEXT_DROP),
        size: wheel.font_size,
        color: wheel.contrast_color,
    })?;

    // Triangle sitting on top of the button, tip pointing up
    let base_y = center.y - button;
    surface.draw(&DrawCall::Polygon {
        points: vec![
            Point::new(center.x + NEEDLE_HALF_WIDTH, base_y),
            Point::new(center.x - NEEDLE_HALF_WIDTH, base_y),
            Point::new(center.x, base_y - NEEDLE_LENGTH),
        ],
        fill: wheel.contrast_color,
    })
}

/// Where the winner caption goes: just below the wheel
pub fn caption_position(canvas: &CanvasConfig, wheel: &WheelConfig) -> Point {
    Point::new(
        canvas.center_x + CAPTION_OFFSET.x,
        canvas.center_y + wheel.radius + CAPTION_OFFSET.y,
    )
}

pub fn draw_winner_caption<S: Surface + ?Sized>(
    surface: &mut S,
    text: &str,
    color: Color,
    position: Point,
    wheel: &WheelConfig,
) -> Result<(), RenderError> {
    surface.draw(&DrawCall::Text {
        text: text.to_string(),
        anchor: position,
        rotation: 0.0,
        offset: Point::new(0.0, 0.0),
        size: wheel.font_size * 1.5,
        color,
    })
}

/// Clear the wheel layer and draw one full frame on it
pub fn draw_frame<S: Surface + ?Sized>(surface: &mut S, frame: &Frame<'_>) -> Result<(), RenderError> {
    clear(surface, frame.canvas)?;
    draw_wheel(surface, frame.angle, frame.segments, frame.canvas, frame.wheel)?;
    if let Some((text, color)) = frame.caption {
        let position = caption_position(frame.canvas, frame.wheel);
        draw_winner_caption(surface, text, color, position, frame.wheel)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::sample_segments;

    fn configs() -> (CanvasConfig, WheelConfig) {
        (CanvasConfig::default(), WheelConfig::default())
    }

    #[test]
    fn test_draw_wheel_emits_wedge_and_label_per_segment() {
        let (canvas, wheel) = configs();
        let segments = sample_segments();
        let mut surface = RecordingSurface::new(canvas.width, canvas.height);

        draw_wheel(&mut surface, 0.3, &segments, &canvas, &wheel).unwrap();

        let calls = surface.calls();
        assert_eq!(calls.len(), segments.len() * 2);
        for (i, pair) in calls.chunks(2).enumerate() {
            match (&pair[0], &pair[1]) {
                (
                    DrawCall::Wedge { fill, stroke, .. },
                    DrawCall::Text { text, offset, .. },
                ) => {
                    assert_eq!(*fill, segments[i].fill);
                    assert_eq!(*stroke, wheel.primary_color);
                    assert_eq!(text, segments[i].label());
                    assert_eq!(offset.x, 280.0 / 2.0 + 50.0 / 2.0);
                }
                other => panic!("unexpected calls {:?}", other),
            }
        }
    }

    #[test]
    fn test_label_rotation_is_segment_midpoint() {
        let (canvas, wheel) = configs();
        let segments = vec![
            Segment::new("A", Color::RED),
            Segment::new("B", Color::BLUE),
        ];
        let mut surface = RecordingSurface::new(canvas.width, canvas.height);

        draw_wheel(&mut surface, 0.0, &segments, &canvas, &wheel).unwrap();

        let rotations: Vec<f32> = surface
            .calls()
            .iter()
            .filter_map(|call| match call {
                DrawCall::Text { rotation, .. } => Some(*rotation),
                _ => None,
            })
            .collect();
        assert!((rotations[0] - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
        assert!((rotations[1] - 3.0 * std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_segment_text_color_overrides_contrast() {
        let (canvas, wheel) = configs();
        let segments = vec![Segment::new("A", Color::WHITE).with_text_color(Color::RED)];
        let mut surface = RecordingSurface::new(canvas.width, canvas.height);

        draw_wheel(&mut surface, 0.0, &segments, &canvas, &wheel).unwrap();

        assert!(matches!(
            surface.calls()[1],
            DrawCall::Text { color, .. } if color == Color::RED
        ));
    }

    #[test]
    fn test_long_labels_are_truncated_when_drawn() {
        let (canvas, wheel) = configs();
        let segments = vec![Segment::new("An extremely long segment label", Color::GRAY)];
        let mut surface = RecordingSurface::new(canvas.width, canvas.height);

        draw_wheel(&mut surface, 0.0, &segments, &canvas, &wheel).unwrap();

        match &surface.calls()[1] {
            DrawCall::Text { text, .. } => assert_eq!(text.chars().count(), 21),
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[test]
    fn test_same_inputs_same_frame() {
        let (canvas, wheel) = configs();
        let segments = sample_segments();
        let frame = Frame {
            angle: 1.234,
            segments: &segments,
            canvas: &canvas,
            wheel: &wheel,
            caption: Some(("Wendy's", Color::BLACK)),
        };

        let mut first = RecordingSurface::new(canvas.width, canvas.height);
        let mut second = RecordingSurface::new(canvas.width, canvas.height);
        draw_frame(&mut first, &frame).unwrap();
        draw_frame(&mut second, &frame).unwrap();

        assert_eq!(first.calls(), second.calls());
        assert_eq!(first.clear_count(), 1);
    }

    #[test]
    fn test_static_overlay_layout() {
        let (canvas, wheel) = configs();
        let mut surface = RecordingSurface::new(canvas.width, canvas.height);

        draw_static_overlay(&mut surface, &wheel, &canvas).unwrap();

        let calls = surface.calls();
        assert_eq!(calls.len(), 5);
        assert!(matches!(
            calls[0],
            DrawCall::Ring { radius, width, color, .. }
                if radius == 280.0 && width == OUTLINE_WIDTH && color == Color::BLACK
        ));
        assert!(matches!(calls[1], DrawCall::Disc { radius, .. } if radius == 50.0));
        assert!(matches!(&calls[3], DrawCall::Text { text, .. } if text == "Spin"));
        match &calls[4] {
            DrawCall::Polygon { points, fill } => {
                assert_eq!(*fill, wheel.contrast_color);
                assert_eq!(points[0], Point::new(320.0, 250.0));
                assert_eq!(points[1], Point::new(280.0, 250.0));
                assert_eq!(points[2], Point::new(300.0, 230.0));
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[test]
    fn test_caption_sits_below_the_wheel() {
        let (canvas, wheel) = configs();
        assert_eq!(caption_position(&canvas, &wheel), Point::new(310.0, 630.0));

        let mut surface = RecordingSurface::new(canvas.width, canvas.height);
        draw_winner_caption(
            &mut surface,
            "Raising Canes",
            Color::BLACK,
            caption_position(&canvas, &wheel),
            &wheel,
        )
        .unwrap();
        assert!(matches!(
            &surface.calls()[0],
            DrawCall::Text { text, size, .. } if text == "Raising Canes" && *size == 24.0
        ));
    }
}
