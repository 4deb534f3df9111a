//! Guided calibration protocol
//!
//! The user fixates a fixed sequence of dots and clicks each one a set number
//! of times. Every counted click becomes a training sample for the engine at
//! the dot's centre. Once a dot has its quota it ignores further clicks until
//! the next dot is shown, and there is no way to skip ahead.

use crate::config::{CalibrationConfig, PointLayout};
use crate::engine::{GazeEngine, SampleKind};
use crate::types::{CalibrationView, Point};

/// Proof that every calibration point was confirmed.
///
/// Only the sequencer can produce one, and it does so exactly once per run;
/// a tracking session cannot start without it.
#[derive(Debug)]
pub struct CalibrationComplete {
    _private: (),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationState {
    NotStarted,
    ShowingPoint { index: usize, clicks: u32 },
    /// Quota met; the point is inert until the advance delay runs out
    Settling { index: usize, since_ms: f64 },
    Complete,
}

#[derive(Debug)]
pub enum ClickOutcome {
    /// Off the current point, over quota, or not calibrating
    Ignored,
    Counted { index: usize, clicks: u32 },
    /// The point reached its quota. Carries the completion proof when this
    /// was the last point and no advance delay applies.
    Confirmed {
        index: usize,
        completion: Option<CalibrationComplete>,
    },
}

pub struct CalibrationSequencer {
    layout: Vec<PointLayout>,
    centers: Vec<Point>,
    clicks_required: u32,
    dot_radius: f64,
    advance_delay_ms: u64,
    state: CalibrationState,
}

impl CalibrationSequencer {
    pub fn new(config: &CalibrationConfig, width: f64, height: f64) -> Self {
        let layout = config.active_points();
        let centers = resolve_centers(&layout, config.dot_radius_px, width, height);
        Self {
            layout,
            centers,
            clicks_required: config.clicks_per_point,
            dot_radius: config.dot_radius_px,
            advance_delay_ms: config.advance_delay_ms,
            state: CalibrationState::NotStarted,
        }
    }

    /// Show the first point. With no points there is nothing to confirm,
    /// so the sequencer ends up `Complete` without issuing a proof.
    pub fn start(&mut self) {
        if self.centers.is_empty() {
            log::warn!("Calibration started with no points");
            self.state = CalibrationState::Complete;
            return;
        }
        log::info!("Calibration started ({} points)", self.centers.len());
        self.state = CalibrationState::ShowingPoint { index: 0, clicks: 0 };
    }

    /// Recompute dot positions for a new viewport
    pub fn resize(&mut self, width: f64, height: f64) {
        self.centers = resolve_centers(&self.layout, self.dot_radius, width, height);
    }

    /// Handle a click at `pos`, registering a training sample when it counts
    pub fn click(&mut self, pos: Point, now_ms: f64, engine: &mut dyn GazeEngine) -> ClickOutcome {
        let CalibrationState::ShowingPoint { index, clicks } = self.state else {
            return ClickOutcome::Ignored;
        };

        let Some(&center) = self.centers.get(index) else {
            return ClickOutcome::Ignored;
        };
        if pos.distance_to(center) > self.dot_radius {
            return ClickOutcome::Ignored;
        }

        let clicks = clicks + 1;
        engine.record_screen_position(center.x, center.y, SampleKind::Click);

        if clicks < self.clicks_required {
            self.state = CalibrationState::ShowingPoint { index, clicks };
            return ClickOutcome::Counted { index, clicks };
        }

        log::info!("Calibration point {}/{} confirmed", index + 1, self.centers.len());
        let completion = if self.advance_delay_ms == 0 {
            self.advance(index)
        } else {
            self.state = CalibrationState::Settling {
                index,
                since_ms: now_ms,
            };
            None
        };
        ClickOutcome::Confirmed { index, completion }
    }

    /// Move past a settled point once its delay has elapsed
    pub fn tick(&mut self, now_ms: f64) -> Option<CalibrationComplete> {
        match self.state {
            CalibrationState::Settling { index, since_ms }
                if now_ms - since_ms >= self.advance_delay_ms as f64 =>
            {
                self.advance(index)
            }
            _ => None,
        }
    }

    fn advance(&mut self, index: usize) -> Option<CalibrationComplete> {
        let next = index + 1;
        if next < self.centers.len() {
            self.state = CalibrationState::ShowingPoint {
                index: next,
                clicks: 0,
            };
            return None;
        }

        log::info!("Calibration complete");
        self.state = CalibrationState::Complete;
        Some(CalibrationComplete { _private: () })
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == CalibrationState::Complete
    }

    pub fn point_count(&self) -> usize {
        self.centers.len()
    }

    /// Points that have reached their quota
    pub fn confirmed_points(&self) -> usize {
        match self.state {
            CalibrationState::NotStarted => 0,
            CalibrationState::ShowingPoint { index, .. } => index,
            CalibrationState::Settling { index, .. } => index + 1,
            CalibrationState::Complete => self.centers.len(),
        }
    }

    pub fn clicks_required(&self) -> u32 {
        self.clicks_required
    }

    pub fn centers(&self) -> &[Point] {
        &self.centers
    }

    pub fn view(&self) -> Option<CalibrationView> {
        let (index, clicks, inert) = match self.state {
            CalibrationState::ShowingPoint { index, clicks } => (index, clicks, false),
            CalibrationState::Settling { index, .. } => (index, self.clicks_required, true),
            _ => return None,
        };
        let position = *self.centers.get(index)?;
        Some(CalibrationView {
            point_index: index,
            point_count: self.centers.len(),
            position,
            clicks,
            clicks_required: self.clicks_required,
            inert,
        })
    }
}

/// Dots are placed by their top-left corner as a share of the viewport
fn resolve_centers(layout: &[PointLayout], dot_radius: f64, width: f64, height: f64) -> Vec<Point> {
    layout
        .iter()
        .map(|p| {
            Point::new(
                p.left_pct * width / 100.0 + dot_radius,
                p.top_pct * height / 100.0 + dot_radius,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{SimulatedEngine, SimulationParams};

    fn sequencer(delay_ms: u64) -> CalibrationSequencer {
        let config = CalibrationConfig {
            advance_delay_ms: delay_ms,
            ..CalibrationConfig::default()
        };
        let mut seq = CalibrationSequencer::new(&config, 1000.0, 800.0);
        seq.start();
        seq
    }

    fn current_center(seq: &CalibrationSequencer) -> Point {
        seq.view().expect("showing a point").position
    }

    #[test]
    fn centers_follow_percent_layout() {
        let seq = sequencer(0);
        assert_eq!(seq.point_count(), 9);
        assert_eq!(seq.centers()[0], Point::new(70.0, 60.0));
        assert_eq!(seq.centers()[8], Point::new(870.0, 700.0));
    }

    #[test]
    fn counts_clicks_and_registers_samples() {
        let mut engine = SimulatedEngine::new(SimulationParams::default());
        let recorded = engine.recorded();
        let mut seq = sequencer(0);
        let c = current_center(&seq);

        for n in 1..5 {
            match seq.click(c, 0.0, &mut engine) {
                ClickOutcome::Counted { index: 0, clicks } => assert_eq!(clicks, n),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert!(matches!(
            seq.click(c, 0.0, &mut engine),
            ClickOutcome::Confirmed { index: 0, completion: None }
        ));
        assert_eq!(seq.state(), CalibrationState::ShowingPoint { index: 1, clicks: 0 });
        assert_eq!(recorded.lock().len(), 5);
        assert!(recorded.lock().iter().all(|(p, k)| *p == c && *k == SampleKind::Click));
    }

    #[test]
    fn off_point_clicks_are_ignored() {
        let mut engine = SimulatedEngine::new(SimulationParams::default());
        let mut seq = sequencer(0);
        let c = current_center(&seq);
        let miss = Point::new(c.x + 100.0, c.y);
        assert!(matches!(seq.click(miss, 0.0, &mut engine), ClickOutcome::Ignored));
        assert_eq!(seq.state(), CalibrationState::ShowingPoint { index: 0, clicks: 0 });
    }

    #[test]
    fn settled_point_is_inert_until_delay() {
        let mut engine = SimulatedEngine::new(SimulationParams::default());
        let recorded = engine.recorded();
        let mut seq = sequencer(300);
        let c = current_center(&seq);
        for _ in 0..5 {
            seq.click(c, 1_000.0, &mut engine);
        }
        assert!(seq.view().expect("view").inert);
        assert!(matches!(seq.click(c, 1_100.0, &mut engine), ClickOutcome::Ignored));
        assert_eq!(recorded.lock().len(), 5);

        assert!(seq.tick(1_299.0).is_none());
        assert_eq!(seq.confirmed_points(), 1);
        assert!(seq.tick(1_300.0).is_none());
        assert_eq!(seq.state(), CalibrationState::ShowingPoint { index: 1, clicks: 0 });
    }

    #[test]
    fn completion_fires_once() {
        let mut engine = SimulatedEngine::new(SimulationParams::default());
        let mut seq = sequencer(0);
        let mut completions = 0;
        let mut clicks = 0;

        while !seq.is_complete() {
            let c = current_center(&seq);
            clicks += 1;
            if let ClickOutcome::Confirmed { completion: Some(_), .. } = seq.click(c, 0.0, &mut engine) {
                completions += 1;
            }
        }
        assert_eq!(clicks, 45);
        assert_eq!(completions, 1);

        let last = seq.centers()[8];
        assert!(matches!(seq.click(last, 0.0, &mut engine), ClickOutcome::Ignored));
        assert!(seq.tick(10_000.0).is_none());
    }

    #[test]
    fn excluded_point_is_not_shown() {
        let config = CalibrationConfig {
            excluded_points: vec![0],
            ..CalibrationConfig::default()
        };
        let mut seq = CalibrationSequencer::new(&config, 1000.0, 800.0);
        seq.start();
        assert_eq!(seq.point_count(), 8);
        assert_eq!(current_center(&seq), Point::new(470.0, 60.0));
    }

    #[test]
    fn no_points_means_nothing_to_show() {
        let config = CalibrationConfig {
            excluded_points: (0..9).collect(),
            ..CalibrationConfig::default()
        };
        let mut engine = SimulatedEngine::new(SimulationParams::default());
        let recorded = engine.recorded();
        let mut seq = CalibrationSequencer::new(&config, 1000.0, 800.0);
        seq.start();

        assert_eq!(seq.point_count(), 0);
        assert!(seq.view().is_none());
        assert!(matches!(seq.click(Point::new(70.0, 60.0), 0.0, &mut engine), ClickOutcome::Ignored));
        assert!(seq.tick(1_000.0).is_none());
        assert!(recorded.lock().is_empty());
    }
}
