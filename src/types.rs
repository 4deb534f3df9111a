//! Core data types shared across the gaze test pipeline

use serde::{Deserialize, Serialize};

/// A position on the canvas in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(&self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// One raw estimate from the gaze engine. Either coordinate may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    pub x: Option<f64>,
    pub y: Option<f64>,
}

impl GazeSample {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
        }
    }

    /// A tick on which the engine detected nothing.
    pub fn missing() -> Self {
        Self::default()
    }

    /// The sample as a usable point.
    ///
    /// The engine reports 0 (or garbage) when it has lost the face, so zero and
    /// non-finite coordinates count as no detection.
    pub fn position(&self) -> Option<Point> {
        let usable = |v: Option<f64>| v.filter(|v| v.is_finite() && *v != 0.0);
        Some(Point::new(usable(self.x)?, usable(self.y)?))
    }
}

/// Smoothed gaze for both eyes.
///
/// The engine yields a single point, so both channels always hold the same
/// value today; they are kept apart for binocular sources.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyePair {
    pub left: Point,
    pub right: Point,
}

impl EyePair {
    pub fn both(p: Point) -> Self {
        Self { left: p, right: p }
    }

    pub fn average(&self) -> Point {
        self.left.midpoint(self.right)
    }
}

/// One frame of a tracking trace
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub gaze_left: Option<Point>,
    pub gaze_right: Option<Point>,
    pub target: Point,
    /// Milliseconds since the session started
    pub timestamp_ms: f64,
}

impl TrackingRecord {
    pub fn new(gaze: EyePair, target: Point, timestamp_ms: f64) -> Self {
        Self {
            gaze_left: Some(gaze.left),
            gaze_right: Some(gaze.right),
            target,
            timestamp_ms,
        }
    }
}

/// Outcome of a completed tracking session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    /// Accuracy percentage in [0, 100]
    pub accuracy: u8,
    /// Number of trace records the score was computed from
    pub records: usize,
    pub duration_ms: u64,
}

/// Read-out for the on-screen stats panel
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LiveStats {
    /// Distance between averaged gaze and target, in px
    pub deviation_px: f64,
    /// Closeness of the current frame, 0-100
    pub deviation_pct: u8,
    /// Accuracy over the trace so far
    pub running_accuracy: u8,
}

/// Where the overall test currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestPhase {
    /// Engine not started yet
    Uninitialized,
    /// Engine or camera missing; nothing further can run
    Unavailable,
    Calibrating,
    Countdown,
    Tracking,
    Finished,
}

impl TestPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Unavailable => "unavailable",
            Self::Calibrating => "calibrating",
            Self::Countdown => "countdown",
            Self::Tracking => "tracking",
            Self::Finished => "finished",
        }
    }
}

/// What the calibration UI needs to draw the current dot
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationView {
    pub point_index: usize,
    pub point_count: usize,
    pub position: Point,
    pub clicks: u32,
    pub clicks_required: u32,
    /// Quota met, waiting to advance
    pub inert: bool,
}

/// Everything an external drawing routine reads for one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameSnapshot {
    pub phase: TestPhase,
    pub calibration: Option<CalibrationView>,
    /// Number to show during the countdown
    pub countdown: Option<u32>,
    pub target: Option<Point>,
    pub target_radius_px: f64,
    pub gaze: Option<EyePair>,
    pub live: Option<LiveStats>,
    /// Session time so far, while tracking
    pub elapsed_ms: Option<f64>,
    pub remaining_secs: Option<u32>,
    pub result: Option<SessionResult>,
    pub fps: u32,
}

/// Notifications for whoever sits on the other side of the test
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SessionEvent {
    /// A calibration point reached its click quota
    PointConfirmed { index: usize },
    CalibrationComplete,
    CountdownStarted,
    SessionStarted,
    SessionFinished(SessionResult),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_position_rejects_missing_and_zero() {
        assert!(GazeSample::missing().position().is_none());
        assert!(GazeSample { x: Some(10.0), y: None }.position().is_none());
        assert!(GazeSample::new(0.0, 12.0).position().is_none());
        assert!(GazeSample::new(f64::NAN, 12.0).position().is_none());
        assert_eq!(GazeSample::new(3.0, 4.0).position(), Some(Point::new(3.0, 4.0)));
    }

    #[test]
    fn eye_pair_average() {
        let pair = EyePair {
            left: Point::new(0.0, 10.0),
            right: Point::new(20.0, 30.0),
        };
        assert_eq!(pair.average(), Point::new(10.0, 20.0));
        assert!((Point::new(0.0, 0.0).distance_to(Point::new(3.0, 4.0)) - 5.0).abs() < 1e-12);
    }
}
