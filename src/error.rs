//! Error taxonomy for the gaze test pipeline.
//!
//! Only failures with no local resolution live here. Missing samples and
//! empty traces are not errors: the filter retains its last estimate and the
//! scorer yields 0.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GazeError {
    /// The gaze estimation engine or the camera behind it is not available.
    #[error("gaze estimation unavailable: {0}")]
    MissingCapability(String),

    /// A tracking session was requested before every calibration point was confirmed.
    #[error("calibration incomplete: {confirmed}/{required} points confirmed")]
    CalibrationIncomplete { confirmed: usize, required: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GazeError>;
