//! Boundary to the gaze estimation engine
//!
//! The engine is a black box: it is started with settings passed through
//! untouched, it accepts labelled calibration samples, and it pushes gaze
//! estimates from its own callback at whatever rate it manages. Those
//! estimates go through a [`GazeFeed`] so the frame loop can drain them at a
//! point of its choosing instead of being re-entered mid-frame.

use crate::error::{GazeError, Result};
use crate::types::{GazeSample, Point};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How a calibration sample was confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleKind {
    Click,
}

impl SampleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
        }
    }
}

/// Requested camera resolution bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionRange {
    pub min: u32,
    pub ideal: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConstraints {
    pub width: DimensionRange,
    pub height: DimensionRange,
    pub facing_mode: String,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            width: DimensionRange {
                min: 320,
                ideal: 640,
                max: 1280,
            },
            height: DimensionRange {
                min: 240,
                ideal: 480,
                max: 720,
            },
            facing_mode: "user".to_string(),
        }
    }
}

/// Engine start-up options. Forwarded as-is, never interpreted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub regression: String,
    pub tracker: String,
    pub show_video: bool,
    pub show_face_overlay: bool,
    pub show_face_feedback_box: bool,
    pub show_prediction_points: bool,
    pub track_eyes: bool,
    pub show_eye_patches: bool,
    pub camera: CameraConstraints,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            regression: "ridge".to_string(),
            tracker: "TFFacemesh".to_string(),
            show_video: true,
            show_face_overlay: true,
            show_face_feedback_box: true,
            show_prediction_points: false,
            track_eyes: true,
            show_eye_patches: true,
            camera: CameraConstraints::default(),
        }
    }
}

/// A gaze estimation engine
pub trait GazeEngine: Send {
    /// Start capture. Fails with [`GazeError::MissingCapability`] when there is
    /// no camera or no engine to start.
    fn begin(&mut self, settings: &EngineSettings, feed: GazePublisher) -> Result<()>;

    /// Register one training sample at a screen position.
    fn record_screen_position(&mut self, x: f64, y: f64, kind: SampleKind);

    fn end(&mut self) {}
}

/// Writer half of the sample feed, handed to the engine's callback
#[derive(Debug, Clone)]
pub struct GazePublisher {
    tx: Sender<GazeSample>,
    rx: Receiver<GazeSample>,
}

impl GazePublisher {
    /// Engine callback entry point. `None` means the engine had no estimate.
    ///
    /// When the feed is full the oldest queued sample is dropped.
    pub fn publish(&self, sample: Option<GazeSample>, elapsed_ms: f64) {
        let Some(sample) = sample else {
            return;
        };
        log::trace!("gaze sample at {elapsed_ms:.0}ms: {:?}", sample);

        let mut pending = sample;
        loop {
            match self.tx.try_send(pending) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    let _ = self.rx.try_recv();
                    pending = back;
                }
                // Receiver gone means the test was torn down; nothing left to feed.
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

/// Single-producer, single-consumer queue of raw samples, holding at most
/// [`GazeFeed::CAPACITY`] undrained samples
#[derive(Debug)]
pub struct GazeFeed {
    tx: Sender<GazeSample>,
    rx: Receiver<GazeSample>,
}

impl GazeFeed {
    /// A few seconds of engine output at typical callback rates
    pub const CAPACITY: usize = 256;

    pub fn new() -> Self {
        Self::with_capacity(Self::CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        Self { tx, rx }
    }

    pub fn publisher(&self) -> GazePublisher {
        GazePublisher {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }

    /// Everything delivered since the previous drain, oldest first
    pub fn drain(&self) -> impl Iterator<Item = GazeSample> + '_ {
        self.rx.try_iter()
    }
}

impl Default for GazeFeed {
    fn default() -> Self {
        Self::new()
    }
}

// ── Simulation ──────────────────────────────────────────────

/// Behaviour of the simulated eye
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    /// Fraction of the remaining distance the eye covers per sample, in (0, 1]
    pub follow: f64,
    /// Peak uniform noise added to each estimate, in px
    pub noise_px: f64,
    /// Probability that a sample carries no detection
    pub drop_rate: f64,
    pub seed: u64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            follow: 0.6,
            noise_px: 15.0,
            drop_rate: 0.05,
            seed: 7,
        }
    }
}

/// Stand-in engine for headless runs and tests
pub struct SimulatedEngine {
    available: bool,
    publisher: Arc<Mutex<Option<GazePublisher>>>,
    recorded: Arc<Mutex<Vec<(Point, SampleKind)>>>,
    params: SimulationParams,
}

impl SimulatedEngine {
    pub fn new(params: SimulationParams) -> Self {
        Self {
            available: true,
            publisher: Arc::new(Mutex::new(None)),
            recorded: Arc::new(Mutex::new(Vec::new())),
            params,
        }
    }

    /// An engine whose camera cannot be opened
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(SimulationParams::default())
        }
    }

    /// Sample producer bound to this engine. It stays silent until `begin`.
    pub fn sampler(&self) -> SimulatedSampler {
        SimulatedSampler {
            publisher: Arc::clone(&self.publisher),
            rng: fastrand::Rng::with_seed(self.params.seed),
            params: self.params,
            eye: None,
        }
    }

    /// Shared view of the calibration samples registered so far
    pub fn recorded(&self) -> Arc<Mutex<Vec<(Point, SampleKind)>>> {
        Arc::clone(&self.recorded)
    }
}

impl GazeEngine for SimulatedEngine {
    fn begin(&mut self, settings: &EngineSettings, feed: GazePublisher) -> Result<()> {
        if !self.available {
            return Err(GazeError::MissingCapability(
                "no camera available to the simulated engine".to_string(),
            ));
        }
        log::info!(
            "Simulated engine started (regression={}, tracker={})",
            settings.regression,
            settings.tracker
        );
        *self.publisher.lock() = Some(feed);
        Ok(())
    }

    fn record_screen_position(&mut self, x: f64, y: f64, kind: SampleKind) {
        log::debug!("calibration sample ({x:.0}, {y:.0}) [{}]", kind.as_str());
        self.recorded.lock().push((Point::new(x, y), kind));
    }

    fn end(&mut self) {
        self.publisher.lock().take();
    }
}

/// Produces samples from a lagging, noisy eye that chases a stimulus
pub struct SimulatedSampler {
    publisher: Arc<Mutex<Option<GazePublisher>>>,
    rng: fastrand::Rng,
    params: SimulationParams,
    eye: Option<Point>,
}

impl SimulatedSampler {
    /// Emit one sample while the eye looks toward `stimulus`
    pub fn sample(&mut self, stimulus: Point, elapsed_ms: f64) {
        let eye = match self.eye {
            Some(eye) => Point::new(
                eye.x + self.params.follow * (stimulus.x - eye.x),
                eye.y + self.params.follow * (stimulus.y - eye.y),
            ),
            None => stimulus,
        };
        self.eye = Some(eye);

        let sample = if self.rng.f64() < self.params.drop_rate {
            GazeSample::missing()
        } else {
            let noise = self.params.noise_px;
            let dx = (self.rng.f64() * 2.0 - 1.0) * noise;
            let dy = (self.rng.f64() * 2.0 - 1.0) * noise;
            GazeSample::new(eye.x + dx, eye.y + dy)
        };

        if let Some(publisher) = self.publisher.lock().as_ref() {
            publisher.publish(Some(sample), elapsed_ms);
        }
    }
}
