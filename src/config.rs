//! Configuration for the gaze test
//!
//! Every constant of the protocol lives here with its stock value as the
//! default, so a TOML file only needs to name what it changes.

use crate::engine::EngineSettings;
use crate::error::{GazeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GazeTestConfig {
    pub tracking: TrackingConfig,
    pub scoring: ScoringConfig,
    pub filter: FilterConfig,
    pub calibration: CalibrationConfig,
    pub engine: EngineSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Length of one tracking session
    pub duration_ms: u64,
    /// Radius of the circle the target travels along
    pub path_radius_px: f64,
    /// Points per revolution
    pub path_steps: usize,
    /// Visual radius of the target itself
    pub target_radius_px: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            duration_ms: 15_000,
            path_radius_px: 200.0,
            path_steps: 180,
            target_radius_px: 25.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Error distance that saturates the per-frame error, in target radii
    pub error_radius_multiplier: f64,
    /// Curve applied to the normalized distance
    pub error_exponent: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            error_radius_multiplier: 8.0,
            error_exponent: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Weight of the previous estimate in the moving average
    pub smoothing_factor: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            smoothing_factor: 0.8,
        }
    }
}

/// A calibration dot placed as a percentage of the viewport
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLayout {
    pub top_pct: f64,
    pub left_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub clicks_per_point: u32,
    /// Hit radius of a calibration dot
    pub dot_radius_px: f64,
    /// Pause between a point's last click and the next point
    pub advance_delay_ms: u64,
    /// Countdown between calibration and the tracking session
    pub countdown_ms: u64,
    /// Indices into `points` that are left out of the run
    pub excluded_points: Vec<usize>,
    pub points: Vec<PointLayout>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        let steps = [5.0, 45.0, 85.0];
        let points = steps
            .iter()
            .flat_map(|&top_pct| {
                steps
                    .iter()
                    .map(move |&left_pct| PointLayout { top_pct, left_pct })
            })
            .collect();

        Self {
            clicks_per_point: 5,
            dot_radius_px: 20.0,
            advance_delay_ms: 300,
            countdown_ms: 3_000,
            excluded_points: Vec::new(),
            points,
        }
    }
}

impl CalibrationConfig {
    /// Layout entries that take part in the run, in display order
    pub fn active_points(&self) -> Vec<PointLayout> {
        self.points
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.excluded_points.contains(i))
            .map(|(_, p)| *p)
            .collect()
    }
}

impl GazeTestConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading config from: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.tracking;
        if t.duration_ms == 0 {
            return Err(invalid("tracking.duration_ms must be positive"));
        }
        if t.path_steps == 0 {
            return Err(invalid("tracking.path_steps must be positive"));
        }
        if !(t.path_radius_px > 0.0) || !(t.target_radius_px > 0.0) {
            return Err(invalid("tracking radii must be positive"));
        }

        let s = &self.scoring;
        if !(s.error_radius_multiplier > 0.0) || !(s.error_exponent > 0.0) {
            return Err(invalid("scoring constants must be positive"));
        }

        let alpha = self.filter.smoothing_factor;
        if !(0.0..1.0).contains(&alpha) {
            return Err(invalid("filter.smoothing_factor must be in [0, 1)"));
        }

        let c = &self.calibration;
        if c.clicks_per_point == 0 {
            return Err(invalid("calibration.clicks_per_point must be positive"));
        }
        if c.active_points().is_empty() {
            return Err(invalid("calibration needs at least one active point"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> GazeError {
    GazeError::InvalidConfig(msg.to_string())
}
