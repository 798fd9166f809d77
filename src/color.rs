//! Colors used by wheel segments and decorations
//!
//! Colors are stored as plain RGBA bytes so they can be compared, hashed and
//! written to config files. They convert into `tiny_skia::Color` at draw time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColorError {
    #[error("Invalid color '{0}': expected #RRGGBB, #RRGGBBAA or a color name")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(231, 76, 60);
    pub const GREEN: Color = Color::rgb(76, 217, 100);
    pub const BLUE: Color = Color::rgb(52, 152, 219);
    pub const ORANGE: Color = Color::rgb(243, 156, 18);
    pub const GRAY: Color = Color::rgb(122, 122, 122);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    fn named(name: &str) -> Option<Self> {
        let color = match name {
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "red" => Self::RED,
            "green" => Self::GREEN,
            "blue" => Self::BLUE,
            "orange" => Self::ORANGE,
            "gray" | "grey" => Self::GRAY,
            "transparent" => Self::TRANSPARENT,
            _ => return None,
        };
        Some(color)
    }
}

impl FromStr for Color {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(color) = Self::named(&trimmed.to_ascii_lowercase()) {
            return Ok(color);
        }

        let invalid = || ColorError::Invalid(s.to_string());
        let hex = trimmed.strip_prefix('#').ok_or_else(invalid)?;
        if !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());

        match hex.len() {
            6 => Ok(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Ok(Self::rgba(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = ColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }
}

impl From<Color> for tiny_skia::Color {
    fn from(color: Color) -> Self {
        tiny_skia::Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}
