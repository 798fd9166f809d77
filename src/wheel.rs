//! Wheel widget
//!
//! Ties the spin controller to a calloop event loop and a pair of drawing
//! surfaces. Input arrives over a channel registered at mount; every tick is
//! a one-shot calloop timer that re-arms itself until the spin finishes.

use calloop::channel::{self, Channel, Event, Sender};
use calloop::timer::{TimeoutAction, Timer};
use calloop::{EventLoop, LoopHandle, RegistrationToken};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::{ConfigError, Settings};
use crate::render::{self, Frame, RenderError, Surface};
use crate::segment::Segment;
use crate::spin::{AnimationState, Finish, SpinController, SpinPhase, TickOutcome};

#[derive(Error, Debug)]
pub enum WheelError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Event loop error: {0}")]
    EventLoop(#[from] calloop::Error),
}

/// The two drawing surfaces of a wheel: the spinning part is redrawn every
/// tick, the overlay only when mounted or reconfigured
#[derive(Debug)]
pub struct Layers<S> {
    pub wheel: S,
    pub overlay: S,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WheelEvent {
    /// Pointer press in canvas coordinates
    Click { x: f32, y: f32 },
    Start,
    Reset,
}

/// Cloneable handle for feeding input to a mounted wheel
#[derive(Debug, Clone)]
pub struct WheelInput {
    sender: Sender<WheelEvent>,
}

impl WheelInput {
    /// Queue an event. Returns `false` once the wheel has been unmounted.
    pub fn send(&self, event: WheelEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

type FinishedCallback<'l> = Box<dyn FnMut(&Segment) + 'l>;
type FrameObserver<'l, S> = Box<dyn FnMut(&Layers<S>, &AnimationState) + 'l>;

pub struct Wheel<'l, S: Surface + 'l> {
    handle: LoopHandle<'l, Wheel<'l, S>>,
    settings: Settings,
    controller: SpinController,
    layers: Layers<S>,
    on_finished: FinishedCallback<'l>,
    on_frame: Option<FrameObserver<'l, S>>,
    timer: Option<RegistrationToken>,
    input: Option<RegistrationToken>,
    input_enabled: bool,
    failure: Option<RenderError>,
}

impl<'l, S: Surface + 'l> Wheel<'l, S> {
    /// Validate `settings`, draw the first frame and start listening for input
    pub fn mount(
        handle: LoopHandle<'l, Self>,
        settings: Settings,
        layers: Layers<S>,
        on_finished: impl FnMut(&Segment) + 'l,
    ) -> Result<(Self, WheelInput), WheelError> {
        settings.validate()?;
        settings.canvas.check_surface(layers.wheel.size())?;
        settings.canvas.check_surface(layers.overlay.size())?;
        let controller = SpinController::new(&settings.segments, &settings.spin)?;

        let (sender, channel): (Sender<WheelEvent>, Channel<WheelEvent>) = channel::channel();
        let input = handle
            .insert_source(channel, |event, _, wheel: &mut Self| {
                if let Event::Msg(event) = event {
                    wheel.handle_event(event);
                }
            })
            .map_err(|e| e.error)?;

        let mut wheel = Self {
            handle,
            settings,
            controller,
            layers,
            on_finished: Box::new(on_finished),
            on_frame: None,
            timer: None,
            input: Some(input),
            input_enabled: true,
            failure: None,
        };
        wheel.draw_overlay()?;
        wheel.redraw()?;

        tracing::info!(
            segments = wheel.settings.segments.len(),
            target = ?wheel.controller.target_indices(),
            max_duration_ms = ?wheel.controller.max_duration().map(|d| d.as_millis() as u64),
            "Wheel mounted"
        );
        Ok((wheel, WheelInput { sender }))
    }

    /// Called with both layers after every redraw of the wheel layer
    pub fn set_frame_observer(&mut self, observer: impl FnMut(&Layers<S>, &AnimationState) + 'l) {
        self.on_frame = Some(Box::new(observer));
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn layers(&self) -> &Layers<S> {
        &self.layers
    }

    pub fn phase(&self) -> SpinPhase {
        self.controller.phase()
    }

    pub fn state(&self) -> &AnimationState {
        self.controller.state()
    }

    pub fn is_spinning(&self) -> bool {
        self.timer.is_some()
    }

    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    /// The segment currently under the pointer
    pub fn current_segment(&self) -> &Segment {
        &self.settings.segments[self.controller.current_index()]
    }

    /// Begin a spin. Returns `Ok(false)` when a spin is already running or
    /// input has been disabled by a finished one-shot spin.
    pub fn start(&mut self) -> Result<bool, WheelError> {
        if self.timer.is_some() || !self.input_enabled {
            return Ok(false);
        }

        self.controller.rearm();
        if !self.controller.start(Instant::now()) {
            return Ok(false);
        }

        let timer = Timer::from_duration(self.controller.tick_delay());
        let token = self
            .handle
            .insert_source(timer, |deadline, _, wheel: &mut Self| wheel.on_timer(deadline))
            .map_err(|e| e.error)?;
        self.timer = Some(token);
        tracing::info!(
            tick_ms = self.controller.tick_delay().as_millis() as u64,
            "Spin started"
        );
        Ok(true)
    }

    /// Start a spin if `(x, y)` lies on the spin button
    pub fn click(&mut self, x: f32, y: f32) -> Result<bool, WheelError> {
        let dx = x - self.settings.canvas.center_x;
        let dy = y - self.settings.canvas.center_y;
        let radius = self.settings.wheel.spin_button_radius;
        if dx * dx + dy * dy > radius * radius {
            return Ok(false);
        }
        self.start()
    }

    /// Stop any spin without reporting it and return to the mounted state
    pub fn reset(&mut self) -> Result<(), WheelError> {
        self.cancel_timer();
        self.controller.reset();
        self.input_enabled = true;
        self.redraw()?;
        Ok(())
    }

    /// Swap in new settings. The running spin, if any, is dropped.
    pub fn reconfigure(&mut self, settings: Settings) -> Result<(), WheelError> {
        settings.validate()?;
        settings.canvas.check_surface(self.layers.wheel.size())?;
        settings.canvas.check_surface(self.layers.overlay.size())?;
        let controller = SpinController::new(&settings.segments, &settings.spin)?;

        self.cancel_timer();
        self.settings = settings;
        self.controller = controller;
        self.input_enabled = true;
        self.draw_overlay()?;
        self.redraw()?;
        tracing::debug!(segments = self.settings.segments.len(), "Wheel reconfigured");
        Ok(())
    }

    /// Deregister from the event loop and hand the surfaces back
    pub fn unmount(mut self) -> Layers<S> {
        self.cancel_timer();
        if let Some(token) = self.input.take() {
            self.handle.remove(token);
        }
        self.controller.cancel();
        self.layers
    }

    /// Dispatch `event_loop` until the running spin ends. Returns the draw
    /// error that stopped the spin, if any.
    pub fn drive(&mut self, event_loop: &mut EventLoop<'l, Self>) -> Result<(), WheelError> {
        while self.timer.is_some() {
            let timeout = self.controller.tick_delay().max(Duration::from_millis(1));
            event_loop.dispatch(Some(timeout), self)?;
            self.take_failure()?;
        }
        self.take_failure()
    }

    fn take_failure(&mut self) -> Result<(), WheelError> {
        match self.failure.take() {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }

    fn handle_event(&mut self, event: WheelEvent) {
        let result = match event {
            WheelEvent::Click { x, y } => self.click(x, y).map(|_| ()),
            WheelEvent::Start => self.start().map(|_| ()),
            WheelEvent::Reset => self.reset(),
        };
        match result {
            Ok(()) => {}
            Err(WheelError::Render(error)) => self.failure = Some(error),
            Err(error) => tracing::error!(?event, "Failed to handle wheel input: {}", error),
        }
    }

    fn on_timer(&mut self, now: Instant) -> TimeoutAction {
        match self.tick(now) {
            Ok(Some(delay)) => TimeoutAction::ToDuration(delay),
            Ok(None) => {
                self.timer = None;
                TimeoutAction::Drop
            }
            Err(error) => {
                tracing::error!("Spin aborted: {}", error);
                self.timer = None;
                self.controller.cancel();
                self.failure = Some(error);
                TimeoutAction::Drop
            }
        }
    }

    /// One tick: draw, advance, and report on finish. Returns the delay to
    /// the next tick while the spin goes on.
    fn tick(&mut self, now: Instant) -> Result<Option<Duration>, RenderError> {
        if self.controller.phase() != SpinPhase::Spinning {
            return Ok(None);
        }

        self.redraw()?;
        match self.controller.tick(now) {
            Some(TickOutcome::Continue { .. }) => Ok(Some(self.controller.tick_delay())),
            Some(TickOutcome::Finished(finish)) => {
                self.redraw()?;
                self.finish(finish);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn finish(&mut self, finish: Finish) {
        self.timer = None;
        if self.settings.spin.one_shot {
            self.input_enabled = false;
        }

        let segment = &self.settings.segments[finish.index];
        tracing::info!(
            winner = %segment.text,
            index = finish.index,
            ticks = finish.ticks,
            capped = finish.capped,
            "Spin finished"
        );
        (self.on_finished)(segment);
    }

    fn cancel_timer(&mut self) {
        if let Some(token) = self.timer.take() {
            self.handle.remove(token);
        }
        self.controller.cancel();
    }

    fn draw_overlay(&mut self) -> Result<(), RenderError> {
        render::clear(&mut self.layers.overlay, &self.settings.canvas)?;
        render::draw_static_overlay(
            &mut self.layers.overlay,
            &self.settings.wheel,
            &self.settings.canvas,
        )
    }

    fn redraw(&mut self) -> Result<(), RenderError> {
        let state = self.controller.state();
        let caption = (state.started && self.settings.spin.display_winning_text).then(|| {
            let segment = &self.settings.segments[self.controller.current_index()];
            (segment.text.as_str(), self.settings.wheel.primary_color)
        });

        let frame = Frame {
            angle: state.current_angle,
            segments: &self.settings.segments,
            canvas: &self.settings.canvas,
            wheel: &self.settings.wheel,
            caption,
        };
        render::draw_frame(&mut self.layers.wheel, &frame)?;

        if let Some(observer) = self.on_frame.as_mut() {
            observer(&self.layers, self.controller.state());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::config::SpinConfig;
    use crate::geometry::Easing;
    use crate::render::{DrawCall, RecordingSurface};
    use std::cell::RefCell;
    use std::rc::Rc;

    type TestLoop = EventLoop<'static, Wheel<'static, RecordingSurface>>;

    fn settings(spin: SpinConfig) -> Settings {
        Settings {
            segments: vec![
                Segment::new("A", Color::RED),
                Segment::new("B", Color::GREEN),
                Segment::new("C", Color::BLUE),
            ],
            spin,
            ..Settings::default()
        }
    }

    fn quick_spin() -> SpinConfig {
        SpinConfig {
            easing: Easing::UpDown {
                up_ms: 1,
                down_ms: 4,
            },
            ..SpinConfig::default()
        }
    }

    fn layers() -> Layers<RecordingSurface> {
        Layers {
            wheel: RecordingSurface::new(600, 680),
            overlay: RecordingSurface::new(600, 680),
        }
    }

    fn mount(
        spin: SpinConfig,
    ) -> (
        TestLoop,
        Wheel<'static, RecordingSurface>,
        WheelInput,
        Rc<RefCell<Vec<String>>>,
    ) {
        let event_loop = TestLoop::try_new().unwrap();
        let winners = Rc::new(RefCell::new(Vec::new()));
        let sink = winners.clone();
        let (wheel, input) = Wheel::mount(event_loop.handle(), settings(spin), layers(), move |s| {
            sink.borrow_mut().push(s.text.clone())
        })
        .unwrap();
        (event_loop, wheel, input, winners)
    }

    fn pump(event_loop: &mut TestLoop, wheel: &mut Wheel<'static, RecordingSurface>, ms: u64) {
        let until = Instant::now() + Duration::from_millis(ms);
        while Instant::now() < until {
            event_loop
                .dispatch(Some(Duration::from_millis(2)), wheel)
                .unwrap();
        }
    }

    #[test]
    fn test_double_start_finishes_once() {
        let (mut event_loop, mut wheel, _input, winners) = mount(quick_spin());

        assert!(wheel.start().unwrap());
        assert!(!wheel.start().unwrap());
        wheel.drive(&mut event_loop).unwrap();

        assert_eq!(winners.borrow().len(), 1);
        assert_eq!(wheel.phase(), SpinPhase::Finished);
        assert!(!wheel.is_spinning());
        assert_eq!(winners.borrow()[0], wheel.current_segment().text);

        // No stray ticks after the finish
        let frames = wheel.layers().wheel.clear_count();
        pump(&mut event_loop, &mut wheel, 30);
        assert_eq!(winners.borrow().len(), 1);
        assert_eq!(wheel.layers().wheel.clear_count(), frames);
    }

    #[test]
    fn test_finished_wheel_can_spin_again() {
        let (mut event_loop, mut wheel, _input, winners) = mount(quick_spin());

        assert!(wheel.start().unwrap());
        wheel.drive(&mut event_loop).unwrap();
        assert!(wheel.start().unwrap());
        wheel.drive(&mut event_loop).unwrap();

        assert_eq!(winners.borrow().len(), 2);
    }

    #[test]
    fn test_one_shot_ignores_further_starts() {
        let spin = SpinConfig {
            one_shot: true,
            ..quick_spin()
        };
        let (mut event_loop, mut wheel, _input, winners) = mount(spin);

        assert!(wheel.start().unwrap());
        wheel.drive(&mut event_loop).unwrap();
        assert!(!wheel.input_enabled());
        assert!(!wheel.start().unwrap());
        assert!(!wheel.click(300.0, 300.0).unwrap());
        assert_eq!(winners.borrow().len(), 1);

        wheel.reset().unwrap();
        assert!(wheel.input_enabled());
    }

    #[test]
    fn test_reset_mid_spin_never_reports() {
        let spin = SpinConfig {
            easing: Easing::UpDown {
                up_ms: 10,
                down_ms: 40,
            },
            ..SpinConfig::default()
        };
        let (mut event_loop, mut wheel, _input, winners) = mount(spin);

        assert!(wheel.start().unwrap());
        pump(&mut event_loop, &mut wheel, 20);
        wheel.reset().unwrap();
        assert!(!wheel.is_spinning());
        assert_eq!(wheel.phase(), SpinPhase::Idle);
        assert_eq!(wheel.state().current_angle, 0.0);

        pump(&mut event_loop, &mut wheel, 200);
        assert!(winners.borrow().is_empty());
    }

    #[test]
    fn test_click_outside_button_is_ignored() {
        let (mut event_loop, mut wheel, input, _winners) = mount(quick_spin());

        assert!(input.send(WheelEvent::Click { x: 10.0, y: 10.0 }));
        event_loop
            .dispatch(Some(Duration::ZERO), &mut wheel)
            .unwrap();
        assert!(!wheel.is_spinning());

        assert!(input.send(WheelEvent::Click { x: 320.0, y: 290.0 }));
        event_loop
            .dispatch(Some(Duration::ZERO), &mut wheel)
            .unwrap();
        assert!(wheel.is_spinning());
        assert_eq!(wheel.phase(), SpinPhase::Spinning);
    }

    #[test]
    fn test_overlay_drawn_once_per_mount() {
        let (mut event_loop, mut wheel, _input, _winners) = mount(quick_spin());

        assert!(wheel.start().unwrap());
        wheel.drive(&mut event_loop).unwrap();
        assert_eq!(wheel.layers().overlay.clear_count(), 1);
        assert!(wheel.layers().wheel.clear_count() > 2);

        let mut next = settings(quick_spin());
        next.segments.push(Segment::new("D", Color::ORANGE));
        wheel.reconfigure(next).unwrap();
        assert_eq!(wheel.layers().overlay.clear_count(), 2);
        assert_eq!(wheel.settings().segments.len(), 4);
        assert_eq!(wheel.phase(), SpinPhase::Idle);
    }

    #[test]
    fn test_caption_shows_winner() {
        let (mut event_loop, mut wheel, _input, winners) = mount(quick_spin());

        // Nothing has started yet, so no caption
        let idle_texts = wheel
            .layers()
            .wheel
            .current_frame()
            .iter()
            .filter(|call| matches!(call, DrawCall::Text { .. }))
            .count();
        assert_eq!(idle_texts, 3);

        assert!(wheel.start().unwrap());
        wheel.drive(&mut event_loop).unwrap();

        let frame = wheel.layers().wheel.current_frame();
        match frame.last() {
            Some(DrawCall::Text { text, color, .. }) => {
                assert_eq!(*text, winners.borrow()[0]);
                assert_eq!(*color, Color::BLACK);
            }
            other => panic!("expected caption, got {:?}", other),
        }
    }

    #[test]
    fn test_mount_rejects_mismatched_surface() {
        let event_loop = TestLoop::try_new().unwrap();
        let layers = Layers {
            wheel: RecordingSurface::new(10, 10),
            overlay: RecordingSurface::new(600, 680),
        };
        let result = Wheel::mount(event_loop.handle(), settings(quick_spin()), layers, |_| {});
        assert!(matches!(
            result,
            Err(WheelError::Config(ConfigError::SurfaceMismatch { .. }))
        ));
    }

    #[test]
    fn test_unmount_closes_input() {
        let (event_loop, wheel, input, _winners) = mount(quick_spin());

        let layers = wheel.unmount();
        assert_eq!(layers.overlay.clear_count(), 1);
        drop(event_loop);
        assert!(!input.send(WheelEvent::Start));
    }

    #[test]
    fn test_frame_observer_sees_every_redraw() {
        let (mut event_loop, mut wheel, _input, _winners) = mount(quick_spin());
        let seen = Rc::new(RefCell::new(0u64));
        let counter = seen.clone();
        wheel.set_frame_observer(move |_, _| *counter.borrow_mut() += 1);

        assert!(wheel.start().unwrap());
        wheel.drive(&mut event_loop).unwrap();

        let ticks = wheel.state().tick_count;
        // One frame per tick plus the final frame at rest
        assert_eq!(*seen.borrow(), ticks + 1);
    }

    /// Recording surface that takes a while to clear, like a slow display
    struct SlowSurface {
        inner: RecordingSurface,
        clear_delay: Duration,
    }

    impl Surface for SlowSurface {
        fn size(&self) -> (u32, u32) {
            self.inner.size()
        }

        fn draw(&mut self, call: &DrawCall) -> Result<(), RenderError> {
            if matches!(call, DrawCall::Clear { .. }) {
                std::thread::sleep(self.clear_delay);
            }
            self.inner.draw(call)
        }
    }

    #[test]
    fn test_slow_surface_still_lands_on_target() {
        let slow = || SlowSurface {
            inner: RecordingSurface::new(600, 680),
            clear_delay: Duration::from_millis(15),
        };
        let segments: Vec<Segment> = ["A", "B", "C", "D", "E", "F"]
            .iter()
            .map(|text| Segment::new(*text, Color::GRAY))
            .collect();

        // E and F are the furthest crawl from where the curve settles
        for target in ["E", "F"] {
            let settings = Settings {
                segments: segments.clone(),
                spin: SpinConfig {
                    winning_segment: Some(target.to_string()),
                    easing: Easing::UpDown {
                        up_ms: 1,
                        down_ms: 2,
                    },
                    ..SpinConfig::default()
                },
                ..Settings::default()
            };

            let mut event_loop: EventLoop<'static, Wheel<'static, SlowSurface>> =
                EventLoop::try_new().unwrap();
            let winners = Rc::new(RefCell::new(Vec::new()));
            let sink = winners.clone();
            let layers = Layers {
                wheel: slow(),
                overlay: slow(),
            };
            let (mut wheel, _input) =
                Wheel::mount(event_loop.handle(), settings, layers, move |s: &Segment| {
                    sink.borrow_mut().push(s.text.clone())
                })
                .unwrap();

            assert!(wheel.start().unwrap());
            wheel.drive(&mut event_loop).unwrap();

            assert_eq!(*winners.borrow(), vec![target.to_string()]);
        }
    }
}
