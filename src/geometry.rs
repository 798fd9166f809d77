//! Angle math for the wheel
//!
//! Everything here is a pure function of its inputs: easing curves that turn
//! elapsed time into a per-tick rotation step, and the inverse mapping from a
//! rotation angle to the segment sitting under the pointer.

use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::time::Duration;

use crate::config::ConfigError;
use crate::segment::Segment;

/// Longest per-segment phase accepted from config: ten minutes
pub const MAX_PHASE_MS: u64 = 600_000;

/// Easing policy for a spin.
///
/// Durations are per segment: they are multiplied by the segment count, so a
/// wheel with more slices spins for longer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum Easing {
    /// Sine ramp up to full speed, then a cosine ramp back down to rest
    UpDown { up_ms: u64, down_ms: u64 },
    /// A single `sin + cos` curve over the whole run
    SingleRun { run_ms: u64 },
}

impl Default for Easing {
    fn default() -> Self {
        Easing::UpDown {
            up_ms: 100,
            down_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Accelerating,
    Decelerating,
    /// The curve has run its course (progress >= 1)
    Settled,
}

/// One evaluation of an easing curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub phase: Phase,
    pub progress: f64,
    /// Rotation to apply this tick, in radians
    pub velocity: f64,
}

impl Easing {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Easing::UpDown { up_ms: 0, .. } => Err(ConfigError::InvalidDuration("up_ms")),
            Easing::UpDown { down_ms: 0, .. } => Err(ConfigError::InvalidDuration("down_ms")),
            Easing::SingleRun { run_ms: 0 } => Err(ConfigError::InvalidDuration("run_ms")),
            Easing::UpDown { up_ms, .. } if up_ms > MAX_PHASE_MS => Err(too_long("up_ms")),
            Easing::UpDown { down_ms, .. } if down_ms > MAX_PHASE_MS => Err(too_long("down_ms")),
            Easing::SingleRun { run_ms } if run_ms > MAX_PHASE_MS => Err(too_long("run_ms")),
            _ => Ok(()),
        }
    }

    /// How long the curve takes to settle on a wheel with `segment_count` slices
    pub fn natural_duration(&self, segment_count: usize) -> Duration {
        let n = segment_count as u64;
        match *self {
            Easing::UpDown { up_ms, down_ms } => {
                Duration::from_millis(n.saturating_mul(up_ms.saturating_add(down_ms)))
            }
            Easing::SingleRun { run_ms } => Duration::from_millis(n.saturating_mul(run_ms)),
        }
    }

    /// Evaluate the curve `elapsed` after the spin started
    pub fn sample(&self, elapsed: Duration, segment_count: usize) -> Sample {
        let n = segment_count as f64;
        let speed = max_speed(segment_count);
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;

        match *self {
            Easing::UpDown { up_ms, down_ms } => {
                let up_time = n * up_ms as f64;
                let down_time = n * down_ms as f64;

                if elapsed_ms < up_time {
                    let progress = elapsed_ms / up_time;
                    return Sample {
                        phase: Phase::Accelerating,
                        progress,
                        velocity: accelerate(speed, progress),
                    };
                }

                let progress = (elapsed_ms - up_time) / down_time;
                Sample {
                    phase: settled_or(progress, Phase::Decelerating),
                    progress,
                    velocity: decelerate(speed, progress).max(0.0),
                }
            }
            Easing::SingleRun { run_ms } => {
                let progress = elapsed_ms / (n * run_ms as f64);
                Sample {
                    phase: settled_or(progress, Phase::Decelerating),
                    progress,
                    velocity: single_run(speed, progress),
                }
            }
        }
    }
}

fn too_long(field: &'static str) -> ConfigError {
    ConfigError::DurationTooLong {
        field,
        max_ms: MAX_PHASE_MS,
    }
}

fn settled_or(progress: f64, phase: Phase) -> Phase {
    if progress >= 1.0 { Phase::Settled } else { phase }
}

/// Peak rotation per tick: half a segment, so the pointer never skips a slice
pub fn max_speed(segment_count: usize) -> f64 {
    PI / segment_count.max(1) as f64
}

/// Up phase of the up/down curve; reaches `max_speed` at progress 1
pub fn accelerate(max_speed: f64, progress: f64) -> f64 {
    max_speed * (progress * FRAC_PI_2).sin()
}

/// Down phase of the up/down curve; starts at `max_speed` at progress 0
pub fn decelerate(max_speed: f64, progress: f64) -> f64 {
    max_speed * (progress * FRAC_PI_2 + FRAC_PI_2).sin()
}

pub fn single_run(max_speed: f64, progress: f64) -> f64 {
    max_speed * progress.sin() + progress.cos()
}

/// Wrap an angle into `[0, 2π)`.
pub fn normalize_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }

    // Far-off angles are folded first so the loops below run at most once or twice
    let mut angle = if angle.abs() > 4.0 * TAU {
        angle.rem_euclid(TAU)
    } else {
        angle
    };
    while angle >= TAU {
        angle -= TAU;
    }
    while angle < 0.0 {
        angle += TAU;
    }
    angle
}

/// Index of the segment under the pointer at the top of the wheel.
///
/// The pointer sits a quarter turn from the drawing origin, so the angle is
/// shifted by π/2 before being turned into a fractional segment count.
pub fn segment_index(segment_count: usize, angle: f64) -> usize {
    if segment_count == 0 {
        return 0;
    }

    let n = segment_count as i64;
    let shifted = normalize_angle(angle) + FRAC_PI_2;
    let fraction = (shifted / TAU) * segment_count as f64;
    let mut index = n - fraction.floor() as i64 - 1;
    if index < 0 {
        index += n;
    }
    index.clamp(0, n - 1) as usize
}

/// The segment under the pointer, or `None` for an empty wheel
pub fn resolve_segment(segments: &[Segment], angle: f64) -> Option<&Segment> {
    if segments.is_empty() {
        return None;
    }
    segments.get(segment_index(segments.len(), angle))
}

/// Start and end angle of segment `index` with the wheel rotated by `angle`
pub fn segment_span(index: usize, segment_count: usize, angle: f64) -> (f64, f64) {
    let n = segment_count.max(1) as f64;
    let start = TAU * (index as f64 / n) + angle;
    let end = TAU * ((index + 1) as f64 / n) + angle;
    (start, end)
}
