//! Wheel configuration
//!
//! Settings live in `~/.config/prize-wheel/config.toml`. Every section is
//! optional; anything left out falls back to the defaults below, which give
//! a black and white wheel with a 280px radius and a "Spin" button.

use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::color::Color;
use crate::geometry::Easing;
use crate::segment::{self, Segment};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Wheel needs at least one segment")]
    NoSegments,
    #[error("Segment {index} has an empty label")]
    EmptyLabel { index: usize },
    #[error("Wheel radius must be positive, got {0}")]
    InvalidRadius(f32),
    #[error("Spin button radius {button} must be positive and smaller than the wheel radius {radius}")]
    InvalidButtonRadius { button: f32, radius: f32 },
    #[error("Font size must be positive, got {0}")]
    InvalidFontSize(f32),
    #[error("Canvas must have a non-zero size, got {width}x{height}")]
    InvalidCanvas { width: u32, height: u32 },
    #[error("Drawing surface is {actual_width}x{actual_height} but the canvas is {width}x{height}")]
    SurfaceMismatch {
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("Duration '{0}' must be greater than zero")]
    InvalidDuration(&'static str),
    #[error("Duration '{field}' must be at most {max_ms}ms per segment")]
    DurationTooLong { field: &'static str, max_ms: u64 },
}

/// Appearance of the wheel itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelConfig {
    pub radius: f32,
    pub primary_color: Color,
    pub contrast_color: Color,
    pub font_family: String,
    pub font_size: f32,
    pub spin_button_radius: f32,
    pub spin_button_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outline_color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spin_button_color: Option<Color>,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            radius: 280.0,
            primary_color: Color::BLACK,
            contrast_color: Color::WHITE,
            font_family: "Arial".to_string(),
            font_size: 16.0,
            spin_button_radius: 50.0,
            spin_button_text: "Spin".to_string(),
            outline_color: None,
            spin_button_color: None,
        }
    }
}

impl WheelConfig {
    pub fn outline(&self) -> Color {
        self.outline_color.unwrap_or(self.primary_color)
    }

    pub fn spin_button_fill(&self) -> Color {
        self.spin_button_color.unwrap_or(self.primary_color)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.radius.is_nan() || self.radius <= 0.0 {
            return Err(ConfigError::InvalidRadius(self.radius));
        }
        if self.spin_button_radius.is_nan()
            || self.spin_button_radius <= 0.0
            || self.spin_button_radius >= self.radius
        {
            return Err(ConfigError::InvalidButtonRadius {
                button: self.spin_button_radius,
                radius: self.radius,
            });
        }
        if self.font_size.is_nan() || self.font_size <= 0.0 {
            return Err(ConfigError::InvalidFontSize(self.font_size));
        }
        Ok(())
    }
}

/// Drawing surface size and where the wheel sits on it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    pub center_x: f32,
    pub center_y: f32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 600,
            height: 680,
            center_x: 300.0,
            center_y: 300.0,
        }
    }
}

impl CanvasConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidCanvas {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Check that a surface handed to the wheel matches this canvas
    pub fn check_surface(&self, (width, height): (u32, u32)) -> Result<(), ConfigError> {
        if (width, height) != (self.width, self.height) {
            return Err(ConfigError::SurfaceMismatch {
                width: self.width,
                height: self.height,
                actual_width: width,
                actual_height: height,
            });
        }
        Ok(())
    }
}

/// How a spin plays out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpinConfig {
    /// Text of the segment the wheel should stop on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winning_segment: Option<String>,
    /// Draw the segment under the pointer below the wheel while spinning
    pub display_winning_text: bool,
    /// Ignore further input once a spin has finished
    pub one_shot: bool,
    /// Hard limit on a spin in milliseconds; derived from the easing when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_duration_ms: Option<u64>,
    pub easing: Easing,
}

impl Default for SpinConfig {
    fn default() -> Self {
        Self {
            winning_segment: None,
            display_winning_text: true,
            one_shot: false,
            max_duration_ms: None,
            easing: Easing::default(),
        }
    }
}

impl SpinConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.easing.validate()?;
        if self.max_duration_ms == Some(0) {
            return Err(ConfigError::InvalidDuration("max_duration_ms"));
        }
        Ok(())
    }
}

/// Everything needed to mount a wheel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub wheel: WheelConfig,
    #[serde(default)]
    pub canvas: CanvasConfig,
    #[serde(default)]
    pub spin: SpinConfig,
    #[serde(default = "segment::sample_segments")]
    pub segments: Vec<Segment>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            wheel: WheelConfig::default(),
            canvas: CanvasConfig::default(),
            spin: SpinConfig::default(),
            segments: segment::sample_segments(),
        }
    }
}

impl Settings {
    /// Load config from ~/.config/prize-wheel/config.toml
    /// Returns default settings if the file doesn't exist or fails to parse
    pub fn load() -> Self {
        let Some(path) = config_path() else {
            tracing::warn!("Could not determine config directory, using defaults");
            return Self::default();
        };

        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(settings) => {
                    tracing::info!(path = %path.display(), "Loaded settings");
                    settings
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load config from an explicit path; unlike `load`, failures are errors
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let settings = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::info!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    /// Save config to ~/.config/prize-wheel/config.toml
    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = config_path() else {
            anyhow::bail!("Could not determine config directory");
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml = self.to_toml()?;
        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!(path = %path.display(), "Saved settings");
        Ok(())
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize settings to TOML")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_segments(&self.segments)?;
        self.wheel.validate()?;
        self.canvas.validate()?;
        self.spin.validate()?;
        Ok(())
    }
}

pub fn validate_segments(segments: &[Segment]) -> Result<(), ConfigError> {
    if segments.is_empty() {
        return Err(ConfigError::NoSegments);
    }
    if let Some(index) = segments.iter().position(|s| s.text.trim().is_empty()) {
        return Err(ConfigError::EmptyLabel { index });
    }
    Ok(())
}

/// Get the path to the config file: ~/.config/prize-wheel/config.toml
pub fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "prize-wheel").map(|dirs| dirs.config_dir().join("config.toml"))
}

#[derive(Deserialize)]
struct SegmentFile {
    segments: Vec<Segment>,
}

/// Read a segment list from a `.json` array or a `.toml` file with `[[segments]]`
pub fn load_segments(path: &Path) -> anyhow::Result<Vec<Segment>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read segment file: {}", path.display()))?;

    let segments = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => {
            let file: SegmentFile = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse segment file: {}", path.display()))?;
            file.segments
        }
        _ => serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse segment file: {}", path.display()))?,
    };

    validate_segments(&segments)?;
    tracing::debug!(path = %path.display(), count = segments.len(), "Loaded segments");
    Ok(segments)
}
