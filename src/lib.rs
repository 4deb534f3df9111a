//! # Gazecheck
//!
//! Measurement and scoring core of a self-administered gaze tracking test.
//! The user calibrates a camera-based gaze estimator by clicking a sequence of
//! dots, then follows a target moving once around a circle while their
//! smoothed gaze is paired with the target every frame. The trace reduces to
//! a single 0-100 accuracy score.
//!
//! Nothing here draws or waits. [`GazeTest::tick`] is called once per frame
//! with a monotonic timestamp and returns a [`FrameSnapshot`] for the renderer,
//! so the whole protocol runs the same under a display loop or a test harness
//! feeding synthetic times.

pub mod calibration;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod path;
pub mod render;
pub mod scoring;
pub mod session;
pub mod types;

pub use calibration::{CalibrationComplete, CalibrationSequencer, ClickOutcome};
pub use config::GazeTestConfig;
pub use engine::{GazeEngine, GazeFeed, GazePublisher};
pub use error::{GazeError, Result};
pub use filter::GazeSampleFilter;
pub use render::{FpsMeter, RenderLoop, Renderer};
pub use scoring::AccuracyScorer;
pub use session::{SessionTick, TrackingSession};
pub use types::*;

use crossbeam_channel::Sender;

/// One complete run of the test: calibration, countdown, tracking session.
///
/// Owns every piece of mutable state the run needs. The engine only reaches
/// in through the [`GazePublisher`] queue, which is drained at the start of
/// each tick.
pub struct GazeTest {
    config: GazeTestConfig,
    engine: Box<dyn GazeEngine>,
    feed: GazeFeed,
    filter: GazeSampleFilter,
    calibration: CalibrationSequencer,
    calibrated: Option<CalibrationComplete>,
    countdown_start_ms: Option<f64>,
    session: TrackingSession,
    phase: TestPhase,
    fps: FpsMeter,
    events: Option<Sender<SessionEvent>>,
}

impl GazeTest {
    pub fn new(config: GazeTestConfig, engine: Box<dyn GazeEngine>, width: f64, height: f64) -> Result<Self> {
        config.validate()?;

        let calibration = CalibrationSequencer::new(&config.calibration, width, height);
        let session = TrackingSession::new(&config.tracking, &config.scoring, canvas_center(width, height));
        let filter = GazeSampleFilter::new(config.filter.smoothing_factor);

        Ok(Self {
            config,
            engine,
            feed: GazeFeed::new(),
            filter,
            calibration,
            calibrated: None,
            countdown_start_ms: None,
            session,
            phase: TestPhase::Uninitialized,
            fps: FpsMeter::new(),
            events: None,
        })
    }

    /// Receive lifecycle events on `tx`
    pub fn connect_events(&mut self, tx: Sender<SessionEvent>) {
        self.events = Some(tx);
    }

    /// Start the engine and show the first calibration point.
    ///
    /// A missing engine or camera leaves the test in
    /// [`TestPhase::Unavailable`]; there is no fallback source.
    pub fn initialize(&mut self) -> Result<()> {
        log::info!("Initializing gaze test...");
        if let Err(e) = self.engine.begin(&self.config.engine, self.feed.publisher()) {
            log::error!("Gaze engine unavailable: {e}");
            self.phase = TestPhase::Unavailable;
            return Err(e);
        }
        self.calibration.start();
        self.phase = TestPhase::Calibrating;
        Ok(())
    }

    /// Handle for pushing engine samples from outside the engine object
    pub fn publisher(&self) -> GazePublisher {
        self.feed.publisher()
    }

    /// Forward a click from the calibration UI
    pub fn click(&mut self, x: f64, y: f64, now_ms: f64) -> ClickOutcome {
        if self.phase != TestPhase::Calibrating {
            return ClickOutcome::Ignored;
        }

        let outcome = self.calibration.click(Point::new(x, y), now_ms, self.engine.as_mut());
        if let ClickOutcome::Confirmed { index, completion } = outcome {
            self.emit(SessionEvent::PointConfirmed { index });
            if let Some(done) = completion {
                self.on_calibrated(done, now_ms);
            }
            return ClickOutcome::Confirmed {
                index,
                completion: None,
            };
        }
        outcome
    }

    /// Start tracking right away, skipping whatever is left of the countdown.
    pub fn start_session(&mut self, now_ms: f64) -> Result<()> {
        if self.phase == TestPhase::Unavailable {
            return Err(GazeError::MissingCapability("gaze engine was not started".to_string()));
        }
        let Some(calibrated) = self.calibrated.as_ref() else {
            log::warn!("Refusing to start tracking before calibration is complete");
            return Err(GazeError::CalibrationIncomplete {
                confirmed: self.calibration.confirmed_points(),
                required: self.calibration.point_count(),
            });
        };

        self.session.start(calibrated, &mut self.filter, now_ms);
        self.countdown_start_ms = None;
        self.phase = TestPhase::Tracking;
        self.emit(SessionEvent::SessionStarted);
        Ok(())
    }

    /// New viewport size: moves the calibration dots and the target path
    pub fn resize(&mut self, width: f64, height: f64) {
        self.calibration.resize(width, height);
        self.session.set_center(canvas_center(width, height));
    }

    /// Advance the whole test to `now_ms` and describe the resulting frame
    pub fn tick(&mut self, now_ms: f64) -> FrameSnapshot {
        let fps = self.fps.frame(now_ms);

        for sample in self.feed.drain() {
            self.filter.update(sample);
        }

        match self.phase {
            TestPhase::Calibrating => {
                if let Some(done) = self.calibration.tick(now_ms) {
                    self.on_calibrated(done, now_ms);
                }
            }
            TestPhase::Countdown => {
                let started = self.countdown_start_ms.unwrap_or(now_ms);
                if now_ms - started >= self.config.calibration.countdown_ms as f64 {
                    // calibrated is set whenever the phase is Countdown
                    if let Err(e) = self.start_session(now_ms) {
                        log::error!("Could not start tracking session: {e}");
                    }
                }
            }
            _ => {}
        }

        if self.phase == TestPhase::Tracking {
            match self.session.tick(now_ms, self.filter.current()) {
                SessionTick::Finished(result) => {
                    self.phase = TestPhase::Finished;
                    self.emit(SessionEvent::SessionFinished(result));
                }
                SessionTick::Running { recorded } => {
                    log::trace!("frame at {now_ms:.1}ms recorded={recorded}");
                }
                SessionTick::Idle => {}
            }
        }

        self.snapshot(now_ms, fps)
    }

    fn on_calibrated(&mut self, done: CalibrationComplete, now_ms: f64) {
        self.calibrated = Some(done);
        self.countdown_start_ms = Some(now_ms);
        self.phase = TestPhase::Countdown;
        self.emit(SessionEvent::CalibrationComplete);
        log::info!("Countdown started ({}ms)", self.config.calibration.countdown_ms);
        self.emit(SessionEvent::CountdownStarted);
    }

    fn snapshot(&self, now_ms: f64, fps: u32) -> FrameSnapshot {
        let tracking = self.phase == TestPhase::Tracking;
        FrameSnapshot {
            phase: self.phase,
            calibration: self.calibration.view(),
            countdown: self.countdown_value(now_ms),
            target: self.session.target().filter(|_| tracking || self.phase == TestPhase::Finished),
            target_radius_px: self.config.tracking.target_radius_px,
            gaze: self.filter.current(),
            live: self.session.live().filter(|_| tracking),
            elapsed_ms: self.session.elapsed_ms(now_ms),
            remaining_secs: self.session.remaining_secs(now_ms),
            result: self.session.result(),
            fps,
        }
    }

    fn countdown_value(&self, now_ms: f64) -> Option<u32> {
        if self.phase != TestPhase::Countdown {
            return None;
        }
        let started = self.countdown_start_ms?;
        let total_secs = self.config.calibration.countdown_ms / 1000;
        let elapsed_secs = ((now_ms - started).max(0.0) / 1000.0).floor() as u64;
        Some(total_secs.saturating_sub(elapsed_secs) as u32)
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(ref tx) = self.events {
            if let Err(e) = tx.send(event) {
                log::warn!("Failed to deliver session event: {e}");
            }
        }
    }

    /// Stop the engine. Any running session is abandoned without a result.
    pub fn shutdown(mut self) {
        log::info!("Shutting down gaze test during {}", self.phase.as_str());
        self.engine.end();
    }

    pub fn phase(&self) -> TestPhase {
        self.phase
    }

    pub fn calibration(&self) -> &CalibrationSequencer {
        &self.calibration
    }

    pub fn session(&self) -> &TrackingSession {
        &self.session
    }

    pub fn smoothed_gaze(&self) -> Option<EyePair> {
        self.filter.current()
    }

    pub fn result(&self) -> Option<SessionResult> {
        self.session.result()
    }

    pub fn config(&self) -> &GazeTestConfig {
        &self.config
    }
}

fn canvas_center(width: f64, height: f64) -> Point {
    Point::new(width / 2.0, height / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{SimulatedEngine, SimulationParams};

    fn quick_config() -> GazeTestConfig {
        let mut config = GazeTestConfig::default();
        config.calibration.advance_delay_ms = 0;
        config.calibration.clicks_per_point = 1;
        config
    }

    fn new_test(config: GazeTestConfig) -> GazeTest {
        let engine = SimulatedEngine::new(SimulationParams::default());
        let mut test = GazeTest::new(config, Box::new(engine), 1280.0, 720.0).expect("config");
        test.initialize().expect("engine");
        test
    }

    fn calibrate(test: &mut GazeTest, now_ms: f64) {
        while test.phase() == TestPhase::Calibrating {
            let p = test.calibration().view().expect("point").position;
            test.click(p.x, p.y, now_ms);
        }
    }

    #[test]
    fn unavailable_engine_blocks_everything() {
        let mut test = GazeTest::new(
            GazeTestConfig::default(),
            Box::new(SimulatedEngine::unavailable()),
            800.0,
            600.0,
        )
        .expect("config");
        assert!(matches!(test.initialize(), Err(GazeError::MissingCapability(_))));
        assert_eq!(test.phase(), TestPhase::Unavailable);
        assert!(test.start_session(0.0).is_err());
        assert!(matches!(test.click(10.0, 10.0, 0.0), ClickOutcome::Ignored));
    }

    #[test]
    fn session_refused_before_calibration() {
        let mut test = new_test(quick_config());
        let err = test.start_session(0.0);
        assert!(matches!(
            err,
            Err(GazeError::CalibrationIncomplete { confirmed: 0, required: 9 })
        ));
        assert_eq!(test.phase(), TestPhase::Calibrating);
    }

    #[test]
    fn countdown_then_session() {
        let mut test = new_test(quick_config());
        let (tx, rx) = crossbeam_channel::unbounded();
        test.connect_events(tx);

        calibrate(&mut test, 1_000.0);
        assert_eq!(test.phase(), TestPhase::Countdown);

        assert_eq!(test.tick(1_000.0).countdown, Some(3));
        assert_eq!(test.tick(2_500.0).countdown, Some(2));
        assert_eq!(test.tick(3_999.0).countdown, Some(1));
        let frame = test.tick(4_000.0);
        assert_eq!(frame.phase, TestPhase::Tracking);
        assert_eq!(frame.remaining_secs, Some(15));
        assert_eq!(frame.elapsed_ms, Some(0.0));

        let frame = test.tick(6_500.0);
        assert_eq!(frame.elapsed_ms, Some(2_500.0));
        assert_eq!(frame.remaining_secs, Some(13));

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 9 + 3);
        assert_eq!(events[0], SessionEvent::PointConfirmed { index: 0 });
        assert_eq!(events[9], SessionEvent::CalibrationComplete);
        assert_eq!(events[10], SessionEvent::CountdownStarted);
        assert_eq!(events[11], SessionEvent::SessionStarted);
    }

    #[test]
    fn samples_flow_through_filter() {
        let mut test = new_test(quick_config());
        let publisher = test.publisher();
        publisher.publish(Some(GazeSample::new(300.0, 200.0)), 0.0);
        publisher.publish(Some(GazeSample::new(400.0, 200.0)), 5.0);
        publisher.publish(Some(GazeSample::missing()), 10.0);

        let frame = test.tick(16.0);
        let gaze = frame.gaze.expect("smoothed gaze");
        assert!((gaze.left.x - 320.0).abs() < 1e-9);
        assert_eq!(gaze.left, gaze.right);
    }

    #[test]
    fn resize_moves_the_path() {
        let mut test = new_test(quick_config());
        calibrate(&mut test, 0.0);
        test.start_session(0.0).expect("calibrated");
        test.resize(1000.0, 1000.0);
        test.tick(1.0);
        assert_eq!(test.session().path().center(), Point::new(500.0, 500.0));
        assert_eq!(test.tick(2.0).target, Some(Point::new(700.0, 500.0)));
    }
}
