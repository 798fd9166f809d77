//! Animated prize wheel
//!
//! A segmented wheel that spins on a calloop event loop, eases to a stop on
//! a segment (optionally a chosen one) and reports the winner exactly once.

pub mod color;
pub mod config;
pub mod geometry;
pub mod render;
pub mod segment;
pub mod spin;
pub mod wheel;

pub use color::{Color, ColorError};
pub use config::{CanvasConfig, ConfigError, Settings, SpinConfig, WheelConfig};
pub use geometry::{Easing, resolve_segment};
pub use render::{PixmapSurface, RecordingSurface, RenderError, Surface};
pub use segment::Segment;
pub use spin::{AnimationState, SpinController, SpinPhase, TickOutcome};
pub use wheel::{Layers, Wheel, WheelError, WheelEvent, WheelInput};
