//! Spin state machine
//!
//! The controller owns the animation state and advances it one tick at a
//! time. It knows nothing about timers or drawing: the caller passes the
//! current instant into [`SpinController::tick`] and reacts to the outcome.

use std::time::{Duration, Instant};

use crate::config::{ConfigError, SpinConfig, validate_segments};
use crate::geometry::{self, Easing, Phase};
use crate::segment::Segment;

/// Crawl speed while hunting for a target after the curve has settled, as a
/// fraction of the peak speed
const CREEP_FRACTION: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinPhase {
    Idle,
    Spinning,
    Finished,
}

/// Mutable animation state, owned by the controller
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationState {
    /// Rotation in radians, always in `[0, 2π)`
    pub current_angle: f64,
    /// Rotation applied on the last tick
    pub angle_velocity: f64,
    pub started: bool,
    pub finished: bool,
    pub start_timestamp: Option<Instant>,
    pub tick_count: u64,
}

impl AnimationState {
    fn new() -> Self {
        Self {
            current_angle: 0.0,
            angle_velocity: 0.0,
            started: false,
            finished: false,
            start_timestamp: None,
            tick_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Free,
    /// Indices of every segment carrying the winning text
    Matching(Vec<usize>),
    /// A winning text was requested but no segment carries it
    Unreachable,
}

/// What ends a spin that never lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cap {
    /// Wall-clock time since the start of the spin
    Elapsed(Duration),
    /// Ticks spent crawling after the curve has settled
    CrawlTicks(u64),
}

/// How a spin ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finish {
    pub index: usize,
    /// The safety cap stopped the spin rather than the easing curve
    pub capped: bool,
    pub ticks: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    Continue { angle: f64, index: usize },
    Finished(Finish),
}

#[derive(Debug, Clone)]
pub struct SpinController {
    segment_count: usize,
    easing: Easing,
    target: Target,
    cap: Cap,
    crawl_ticks: u64,
    phase: SpinPhase,
    state: AnimationState,
}

impl SpinController {
    pub fn new(segments: &[Segment], config: &SpinConfig) -> Result<Self, ConfigError> {
        validate_segments(segments)?;
        config.validate()?;

        let segment_count = segments.len();
        let target = match &config.winning_segment {
            None => Target::Free,
            Some(text) => {
                let matching: Vec<usize> = segments
                    .iter()
                    .enumerate()
                    .filter(|(_, segment)| &segment.text == text)
                    .map(|(index, _)| index)
                    .collect();
                if matching.is_empty() {
                    tracing::warn!(
                        winning_segment = %text,
                        "Winning segment matches no segment, spin will stop at the safety cap"
                    );
                    Target::Unreachable
                } else {
                    Target::Matching(matching)
                }
            }
        };

        // A reachable target is bounded by the crawl itself, however slow the
        // ticks; only an explicit limit cuts it short in wall-clock time
        let cap = match (config.max_duration_ms, &target) {
            (Some(ms), _) => Cap::Elapsed(Duration::from_millis(ms)),
            (None, Target::Matching(_)) => Cap::CrawlTicks(crawl_tick_budget(segment_count)),
            (None, _) => Cap::Elapsed(default_max_duration(&config.easing, segment_count)),
        };

        Ok(Self {
            segment_count,
            easing: config.easing,
            target,
            cap,
            crawl_ticks: 0,
            phase: SpinPhase::Idle,
            state: AnimationState::new(),
        })
    }

    pub fn phase(&self) -> SpinPhase {
        self.phase
    }

    pub fn state(&self) -> &AnimationState {
        &self.state
    }

    pub fn current_angle(&self) -> f64 {
        self.state.current_angle
    }

    /// Index of the segment currently under the pointer
    pub fn current_index(&self) -> usize {
        geometry::segment_index(self.segment_count, self.state.current_angle)
    }

    /// Segments the spin may stop on; empty when any segment will do or
    /// none can
    pub fn target_indices(&self) -> &[usize] {
        match &self.target {
            Target::Matching(indices) => indices,
            _ => &[],
        }
    }

    /// Wall-clock limit on the spin, if it has one
    pub fn max_duration(&self) -> Option<Duration> {
        match self.cap {
            Cap::Elapsed(limit) => Some(limit),
            Cap::CrawlTicks(_) => None,
        }
    }

    /// Delay between ticks: one millisecond per segment
    pub fn tick_delay(&self) -> Duration {
        Duration::from_millis(self.segment_count as u64)
    }

    /// Begin a spin. Returns `false` when the controller isn't idle.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.phase != SpinPhase::Idle {
            return false;
        }

        self.phase = SpinPhase::Spinning;
        self.state.started = true;
        self.state.finished = false;
        self.state.start_timestamp = Some(now);
        self.state.tick_count = 0;
        self.state.angle_velocity = 0.0;
        self.crawl_ticks = 0;
        tracing::debug!(angle = self.state.current_angle, "Spin started");
        true
    }

    /// Make a finished controller ready for another spin, keeping the angle
    /// where the wheel came to rest
    pub fn rearm(&mut self) {
        if self.phase == SpinPhase::Finished {
            self.phase = SpinPhase::Idle;
            self.state.finished = false;
            self.state.started = false;
            self.state.start_timestamp = None;
        }
    }

    /// Abandon any spin in progress and leave the wheel where it is
    pub fn cancel(&mut self) {
        if self.phase == SpinPhase::Spinning {
            tracing::debug!(ticks = self.state.tick_count, "Spin cancelled");
        }
        let angle = self.state.current_angle;
        self.state = AnimationState::new();
        self.state.current_angle = angle;
        self.phase = SpinPhase::Idle;
    }

    /// Back to the state of a freshly mounted wheel
    pub fn reset(&mut self) {
        self.state = AnimationState::new();
        self.phase = SpinPhase::Idle;
    }

    /// Advance the spin by one tick. Returns `None` unless spinning.
    pub fn tick(&mut self, now: Instant) -> Option<TickOutcome> {
        if self.phase != SpinPhase::Spinning {
            return None;
        }
        let start = self.state.start_timestamp?;

        self.state.tick_count += 1;
        let elapsed = now.saturating_duration_since(start);
        let sample = self.easing.sample(elapsed, self.segment_count);
        let settled = sample.phase == Phase::Settled;
        if settled {
            self.crawl_ticks += 1;
        }

        let velocity = match (settled, &self.target) {
            (false, _) => sample.velocity,
            (true, Target::Free) => 0.0,
            (true, _) => geometry::max_speed(self.segment_count) * CREEP_FRACTION,
        };

        self.state.angle_velocity = velocity;
        self.state.current_angle = geometry::normalize_angle(self.state.current_angle + velocity);
        let index = self.current_index();

        tracing::trace!(
            tick = self.state.tick_count,
            progress = sample.progress,
            velocity,
            angle = self.state.current_angle,
            index,
            "Spin tick"
        );

        let capped = match self.cap {
            Cap::Elapsed(limit) => elapsed >= limit,
            Cap::CrawlTicks(budget) => self.crawl_ticks >= budget,
        };
        let landed = settled
            && match &self.target {
                Target::Free => true,
                Target::Matching(indices) => {
                    indices.contains(&index) && self.state.tick_count >= self.segment_count as u64
                }
                Target::Unreachable => false,
            };

        if !(landed || capped) {
            return Some(TickOutcome::Continue {
                angle: self.state.current_angle,
                index,
            });
        }

        if capped && !landed {
            tracing::warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                index,
                "Spin hit the safety cap"
            );
        }

        self.phase = SpinPhase::Finished;
        self.state.finished = true;
        self.state.angle_velocity = 0.0;

        Some(TickOutcome::Finished(Finish {
            index,
            capped: capped && !landed,
            ticks: self.state.tick_count,
        }))
    }
}

/// Two full revolutions at crawl speed
fn crawl_tick_budget(segment_count: usize) -> u64 {
    let n = segment_count.max(1) as u64;
    let ticks_per_revolution = (2.0 / CREEP_FRACTION).ceil() as u64 * n;
    ticks_per_revolution.saturating_mul(2)
}

/// The natural spin time plus the crawl budget at the nominal tick delay
fn default_max_duration(easing: &Easing, segment_count: usize) -> Duration {
    let tick_ms = segment_count.max(1) as u64;
    let crawl = Duration::from_millis(crawl_tick_budget(segment_count).saturating_mul(tick_ms));
    easing.natural_duration(segment_count).saturating_add(crawl)
}
