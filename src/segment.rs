//! Wheel segments

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::config::ConfigError;

/// Labels longer than this are cut off when drawn on the wheel
pub const MAX_LABEL_CHARS: usize = 21;

const PALETTE: [Color; 8] = [
    Color::rgb(0xEE, 0x40, 0x40),
    Color::rgb(0xF0, 0xCF, 0x50),
    Color::rgb(0x3D, 0xA5, 0xE0),
    Color::rgb(0x34, 0xA2, 0x4F),
    Color::rgb(0xF9, 0xA4, 0x31),
    Color::rgb(0x81, 0x5C, 0xD1),
    Color::rgb(0xFF, 0x9F, 0xB2),
    Color::rgb(0x55, 0x55, 0x44),
];

/// One labeled, colored slice of the wheel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    #[serde(alias = "color")]
    pub fill: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<Color>,
}

impl Segment {
    pub fn new(text: impl Into<String>, fill: Color) -> Self {
        Self {
            text: text.into(),
            fill,
            text_color: None,
        }
    }

    pub fn with_text_color(mut self, color: Color) -> Self {
        self.text_color = Some(color);
        self
    }

    /// The text as drawn on the wheel, cut to `MAX_LABEL_CHARS` characters
    pub fn label(&self) -> &str {
        match self.text.char_indices().nth(MAX_LABEL_CHARS) {
            Some((end, _)) => &self.text[..end],
            None => &self.text,
        }
    }

    /// Parse a command-line segment of the form `TEXT` or `TEXT:COLOR`.
    ///
    /// Segments without a color take one from the built-in palette based on
    /// their position, so neighbouring slices stay distinguishable.
    pub fn parse_arg(arg: &str, index: usize) -> Result<Self, ConfigError> {
        let (text, fill) = match arg.rsplit_once(':') {
            Some((text, color)) => match color.parse::<Color>() {
                Ok(fill) => (text, fill),
                Err(_) => (arg, palette_color(index)),
            },
            None => (arg, palette_color(index)),
        };

        if text.trim().is_empty() {
            return Err(ConfigError::EmptyLabel { index });
        }
        Ok(Self::new(text, fill))
    }
}

/// Fill color for the segment at `index` when none was given
pub fn palette_color(index: usize) -> Color {
    PALETTE[index % PALETTE.len()]
}

/// The demo list the wheel ships with when nothing else is configured
pub fn sample_segments() -> Vec<Segment> {
    let mut segments = vec![
        Segment::new("123McDonalds", Color::rgb(0xEE, 0x40, 0x40)),
        Segment::new("Wendy's", Color::rgb(0xF0, 0xCF, 0x50)),
        Segment::new("Raising Canes", Color::rgb(0x3D, 0xA5, 0xE0)),
    ];
    for i in 0..=4 {
        segments.push(Segment::new(format!("tester{}", i), Color::rgb(0x55, 0x55, 0x44)));
    }
    segments
}
