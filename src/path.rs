//! Moving-target trajectory

use crate::types::Point;
use std::f64::consts::PI;

/// One revolution around a centre, sampled at evenly spaced angles.
///
/// Immutable: a resize or a new session builds a fresh path.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPath {
    center: Point,
    radius: f64,
    points: Vec<Point>,
}

impl TargetPath {
    pub fn circular(center: Point, radius: f64, steps: usize) -> Self {
        let angle_step = 2.0 * PI / steps as f64;
        let points = (0..steps)
            .map(|i| {
                let angle = i as f64 * angle_step;
                Point::new(
                    center.x + angle.cos() * radius,
                    center.y + angle.sin() * radius,
                )
            })
            .collect();

        Self {
            center,
            radius,
            points,
        }
    }

    /// Position for a session progress in [0, 1]
    pub fn at_progress(&self, progress: f64) -> Option<Point> {
        if self.points.is_empty() {
            return None;
        }
        let progress = progress.clamp(0.0, 1.0);
        let index = ((progress * self.points.len() as f64).floor() as usize).min(self.points.len() - 1);
        Some(self.points[index])
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn center(&self) -> Point {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }
}
