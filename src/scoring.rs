//! Accuracy scoring of a tracking trace
//!
//! Each record's gaze-to-target distance is scaled against a generous
//! multiple of the target radius and bent by an exponent, so small misses cost
//! little and anything past the scale costs the full unit. The score is the
//! complement of the mean cost. The same reduction serves the live read-out
//! and the final result.

use crate::config::ScoringConfig;
use crate::types::{Point, TrackingRecord};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccuracyScorer {
    max_error_distance: f64,
    exponent: f64,
}

impl AccuracyScorer {
    pub fn new(target_radius: f64, config: &ScoringConfig) -> Self {
        Self {
            max_error_distance: target_radius * config.error_radius_multiplier,
            exponent: config.error_exponent,
        }
    }

    pub fn max_error_distance(&self) -> f64 {
        self.max_error_distance
    }

    /// Cost of one frame, in [0, 1]
    pub fn normalized_error(&self, distance: f64) -> f64 {
        (distance / self.max_error_distance)
            .powf(self.exponent)
            .min(1.0)
    }

    /// Accuracy percentage over any slice of a trace.
    ///
    /// Records missing either eye are skipped. No usable records scores 0.
    pub fn score(&self, trace: &[TrackingRecord]) -> u8 {
        let (total, valid) = trace
            .iter()
            .filter_map(record_gaze)
            .map(|(gaze, target)| self.normalized_error(gaze.distance_to(target)))
            .fold((0.0, 0usize), |(sum, n), err| (sum + err, n + 1));

        if valid == 0 {
            return 0;
        }
        to_percent(1.0 - total / valid as f64)
    }

    /// Closeness of a single frame for the stats panel
    pub fn deviation_percent(&self, distance: f64) -> u8 {
        to_percent(1.0 - (distance / self.max_error_distance).powf(self.exponent))
    }
}

fn record_gaze(record: &TrackingRecord) -> Option<(Point, Point)> {
    let left = record.gaze_left?;
    let right = record.gaze_right?;
    Some((left.midpoint(right), record.target))
}

fn to_percent(fraction: f64) -> u8 {
    (100.0 * fraction).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EyePair;

    fn scorer() -> AccuracyScorer {
        AccuracyScorer::new(25.0, &ScoringConfig::default())
    }

    fn record(gaze: Point, target: Point) -> TrackingRecord {
        TrackingRecord::new(EyePair::both(gaze), target, 0.0)
    }

    #[test]
    fn empty_trace_scores_zero() {
        assert_eq!(scorer().score(&[]), 0);
    }

    #[test]
    fn records_missing_an_eye_are_skipped() {
        let mut broken = record(Point::new(1.0, 1.0), Point::new(1.0, 1.0));
        broken.gaze_right = None;
        assert_eq!(scorer().score(&[broken]), 0);

        let good = record(Point::new(5.0, 5.0), Point::new(5.0, 5.0));
        assert_eq!(scorer().score(&[broken, good]), 100);
    }

    #[test]
    fn error_curve() {
        let s = scorer();
        assert!((s.max_error_distance() - 200.0).abs() < 1e-12);
        assert_eq!(s.normalized_error(0.0), 0.0);
        assert!((s.normalized_error(50.0) - 0.125).abs() < 1e-12);
        assert_eq!(s.normalized_error(200.0), 1.0);
        assert_eq!(s.normalized_error(1_000.0), 1.0);
    }

    #[test]
    fn averages_eyes_before_measuring() {
        let target = Point::new(100.0, 100.0);
        let rec = TrackingRecord {
            gaze_left: Some(Point::new(50.0, 100.0)),
            gaze_right: Some(Point::new(150.0, 100.0)),
            target,
            timestamp_ms: 0.0,
        };
        assert_eq!(scorer().score(&[rec]), 100);
    }

    #[test]
    fn mean_of_errors_is_rounded() {
        let target = Point::new(0.0, 0.0);
        // errors 0.125 and 1.0 -> mean 0.5625 -> 43.75 -> 44
        let trace = [
            record(Point::new(50.0, 0.0), target),
            record(Point::new(400.0, 0.0), target),
        ];
        assert_eq!(scorer().score(&trace), 44);
    }

    #[test]
    fn closer_gaze_never_scores_lower() {
        let s = scorer();
        let targets: Vec<Point> = (0..30).map(|i| Point::new(i as f64 * 10.0, 50.0)).collect();
        let trace_at = |offset: f64| -> Vec<TrackingRecord> {
            targets
                .iter()
                .map(|t| record(Point::new(t.x + offset, t.y), *t))
                .collect()
        };
        let near = s.score(&trace_at(40.0));
        let far = s.score(&trace_at(90.0));
        assert!(near > far);
        assert_eq!(s.score(&trace_at(500.0)), s.score(&trace_at(900.0)));
    }

    #[test]
    fn deviation_percent_clamps() {
        let s = scorer();
        assert_eq!(s.deviation_percent(0.0), 100);
        // (100 / 200)^1.5 = 0.354 -> 64.6
        assert_eq!(s.deviation_percent(100.0), 65);
        assert_eq!(s.deviation_percent(600.0), 0);
    }
}
