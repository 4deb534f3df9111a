//! Timed tracking session
//!
//! A session moves the target once around its circular path over a fixed
//! duration. Every frame with a smoothed gaze estimate adds a record to the
//! trace; frames without one add nothing. When the clock runs out the trace
//! is scored once and dropped.

use crate::calibration::CalibrationComplete;
use crate::config::{ScoringConfig, TrackingConfig};
use crate::filter::GazeSampleFilter;
use crate::path::TargetPath;
use crate::scoring::AccuracyScorer;
use crate::types::{EyePair, LiveStats, Point, SessionResult, TrackingRecord};

/// Elapsed time since session start on the caller's monotonic clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionClock {
    start_ms: f64,
    duration_ms: f64,
}

impl SessionClock {
    pub fn new(start_ms: f64, duration_ms: u64) -> Self {
        Self {
            start_ms,
            duration_ms: duration_ms as f64,
        }
    }

    pub fn elapsed(&self, now_ms: f64) -> f64 {
        (now_ms - self.start_ms).max(0.0)
    }

    /// Share of the session done, in [0, 1]
    pub fn progress(&self, now_ms: f64) -> f64 {
        (self.elapsed(now_ms) / self.duration_ms).clamp(0.0, 1.0)
    }

    /// Whole seconds left, rounded up
    pub fn remaining_secs(&self, now_ms: f64) -> u32 {
        ((self.duration_ms - self.elapsed(now_ms)) / 1000.0).ceil().max(0.0) as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionState {
    Idle,
    Running(SessionClock),
    Finished(SessionResult),
}

/// What one tick did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionTick {
    /// No session running
    Idle,
    Running {
        recorded: bool,
    },
    /// The session ended on this tick
    Finished(SessionResult),
}

pub struct TrackingSession {
    config: TrackingConfig,
    scorer: AccuracyScorer,
    center: Point,
    path: TargetPath,
    trace: Vec<TrackingRecord>,
    state: SessionState,
    target: Option<Point>,
    live: Option<LiveStats>,
}

impl TrackingSession {
    pub fn new(config: &TrackingConfig, scoring: &ScoringConfig, center: Point) -> Self {
        Self {
            config: config.clone(),
            scorer: AccuracyScorer::new(config.target_radius_px, scoring),
            center,
            path: TargetPath::circular(center, config.path_radius_px, config.path_steps),
            trace: Vec::new(),
            state: SessionState::Idle,
            target: None,
            live: None,
        }
    }

    /// Begin a run. Requires proof of a completed calibration.
    pub fn start(&mut self, _calibrated: &CalibrationComplete, filter: &mut GazeSampleFilter, now_ms: f64) {
        self.trace.clear();
        filter.reset();
        self.path = TargetPath::circular(self.center, self.config.path_radius_px, self.config.path_steps);
        self.target = self.path.at_progress(0.0);
        self.live = None;
        self.state = SessionState::Running(SessionClock::new(now_ms, self.config.duration_ms));
        log::info!(
            "Tracking session started ({}ms, {} path steps)",
            self.config.duration_ms,
            self.path.len()
        );
    }

    /// Follow a new canvas centre; the path is rebuilt around it
    pub fn set_center(&mut self, center: Point) {
        self.center = center;
        self.path = TargetPath::circular(center, self.config.path_radius_px, self.config.path_steps);
        log::debug!("target path regenerated around ({:.0}, {:.0})", center.x, center.y);
    }

    /// Advance to `now_ms`, pairing the target with the current gaze estimate
    pub fn tick(&mut self, now_ms: f64, gaze: Option<EyePair>) -> SessionTick {
        let SessionState::Running(clock) = self.state else {
            return SessionTick::Idle;
        };

        let progress = clock.progress(now_ms);
        if let Some(target) = self.path.at_progress(progress) {
            self.target = Some(target);
        }

        if progress >= 1.0 {
            return SessionTick::Finished(self.finish(clock));
        }

        let Some(target) = self.target else {
            return SessionTick::Running { recorded: false };
        };

        let Some(gaze) = gaze else {
            self.live = None;
            return SessionTick::Running { recorded: false };
        };

        let timestamp_ms = clock.elapsed(now_ms);
        if self.trace.last().is_some_and(|r| r.timestamp_ms >= timestamp_ms) {
            log::trace!("non-increasing frame time {timestamp_ms:.1}ms, skipped");
            return SessionTick::Running { recorded: false };
        }
        self.trace.push(TrackingRecord::new(gaze, target, timestamp_ms));

        let deviation_px = gaze.average().distance_to(target);
        self.live = Some(LiveStats {
            deviation_px,
            deviation_pct: self.scorer.deviation_percent(deviation_px),
            running_accuracy: self.scorer.score(&self.trace),
        });
        SessionTick::Running { recorded: true }
    }

    fn finish(&mut self, clock: SessionClock) -> SessionResult {
        let result = SessionResult {
            accuracy: self.scorer.score(&self.trace),
            records: self.trace.len(),
            duration_ms: self.config.duration_ms,
        };
        log::info!(
            "Tracking session finished: {} records, accuracy {}%",
            result.records,
            result.accuracy
        );
        log::debug!("session started at {:.0}ms", clock.start_ms);
        self.trace.clear();
        self.live = None;
        self.state = SessionState::Finished(result);
        result
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SessionState::Running(_))
    }

    pub fn target(&self) -> Option<Point> {
        self.target
    }

    pub fn live(&self) -> Option<LiveStats> {
        self.live
    }

    pub fn trace(&self) -> &[TrackingRecord] {
        &self.trace
    }

    pub fn path(&self) -> &TargetPath {
        &self.path
    }

    pub fn remaining_secs(&self, now_ms: f64) -> Option<u32> {
        match self.state {
            SessionState::Running(clock) => Some(clock.remaining_secs(now_ms)),
            _ => None,
        }
    }

    /// Time since the running session started
    pub fn elapsed_ms(&self, now_ms: f64) -> Option<f64> {
        match self.state {
            SessionState::Running(clock) => Some(clock.elapsed(now_ms)),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<SessionResult> {
        match self.state {
            SessionState::Finished(result) => Some(result),
            _ => None,
        }
    }
}
