//! Temporal smoothing of raw gaze samples
//!
//! The engine delivers samples at its own cadence and drops some of them. The
//! filter always holds the latest known-good estimate so the frame loop can
//! read it whenever it runs.

use crate::types::{EyePair, GazeSample, Point};

/// Exponential moving average over raw gaze, one channel per eye
#[derive(Debug, Clone)]
pub struct GazeSampleFilter {
    /// Weight of the previous estimate: 0 = no smoothing
    alpha: f64,
    smoothed: Option<EyePair>,
}

impl GazeSampleFilter {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            smoothed: None,
        }
    }

    /// Fold one raw sample into the estimate.
    ///
    /// Samples without usable coordinates leave the estimate untouched; once
    /// initialized it never goes back to empty until `reset`.
    pub fn update(&mut self, sample: GazeSample) -> Option<EyePair> {
        let Some(raw) = sample.position() else {
            log::trace!("gaze sample gap, keeping last estimate");
            return self.smoothed;
        };

        let next = match self.smoothed {
            Some(prev) => EyePair {
                left: self.blend(prev.left, raw),
                right: self.blend(prev.right, raw),
            },
            None => {
                log::debug!("gaze filter initialized at ({:.1}, {:.1})", raw.x, raw.y);
                EyePair::both(raw)
            }
        };
        self.smoothed = Some(next);
        self.smoothed
    }

    fn blend(&self, prev: Point, raw: Point) -> Point {
        Point::new(
            prev.x * self.alpha + raw.x * (1.0 - self.alpha),
            prev.y * self.alpha + raw.y * (1.0 - self.alpha),
        )
    }

    pub fn current(&self) -> Option<EyePair> {
        self.smoothed
    }

    pub fn reset(&mut self) {
        self.smoothed = None;
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Default for GazeSampleFilter {
    fn default() -> Self {
        Self::new(0.8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_initializes_both_eyes() {
        let mut filter = GazeSampleFilter::default();
        assert!(filter.current().is_none());

        let g = filter.update(GazeSample::new(120.0, 80.0)).expect("initialized");
        assert_eq!(g.left, Point::new(120.0, 80.0));
        assert_eq!(g.right, Point::new(120.0, 80.0));
    }

    #[test]
    fn blends_with_previous_estimate() {
        let mut filter = GazeSampleFilter::new(0.8);
        filter.update(GazeSample::new(100.0, 100.0));
        let g = filter.update(GazeSample::new(200.0, 0.5)).expect("estimate");
        assert!((g.left.x - 120.0).abs() < 1e-9);
        assert!((g.left.y - 80.1).abs() < 1e-9);
        assert_eq!(g.left, g.right);
    }

    #[test]
    fn converges_toward_constant_input() {
        let mut filter = GazeSampleFilter::new(0.8);
        filter.update(GazeSample::new(10.0, 10.0));
        let target = Point::new(500.0, 300.0);
        let initial_delta = Point::new(10.0, 10.0).distance_to(target);

        let mut last = initial_delta;
        for n in 1..=40 {
            let g = filter.update(GazeSample::new(target.x, target.y)).expect("estimate");
            let delta = g.left.distance_to(target);
            assert!(delta < last, "not monotone at tick {n}");
            assert!(delta <= 0.8f64.powi(n) * initial_delta + 1e-9);
            last = delta;
        }
    }

    #[test]
    fn gaps_retain_last_estimate() {
        let mut filter = GazeSampleFilter::default();
        let first = filter.update(GazeSample::new(42.0, 24.0));

        for _ in 0..25 {
            filter.update(GazeSample::missing());
            filter.update(GazeSample { x: Some(5.0), y: None });
            filter.update(GazeSample::new(0.0, 0.0));
        }
        assert_eq!(filter.current(), first);
    }

    #[test]
    fn gap_before_first_sample_stays_empty() {
        let mut filter = GazeSampleFilter::default();
        assert!(filter.update(GazeSample::missing()).is_none());
    }

    #[test]
    fn reset_clears_estimate() {
        let mut filter = GazeSampleFilter::default();
        filter.update(GazeSample::new(1.0, 1.0));
        filter.reset();
        assert!(filter.current().is_none());
    }
}
