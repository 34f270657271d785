//! Error types for drill construction and playback

use thiserror::Error;

/// Drill error type
#[derive(Error, Debug)]
pub enum DrillError {
    #[error("invalid duration: {0} beats")]
    InvalidDuration(f64),

    #[error("invalid radius: {0}")]
    InvalidRadius(f64),

    #[error("invalid angle: {0} degrees")]
    InvalidAngle(f64),

    #[error(
        "player (row {row}, column {column}) has no path at distance {distance} (path defined up to {defined})"
    )]
    UnresolvedDistance {
        row: usize,
        column: usize,
        distance: f64,
        defined: f64,
    },

    #[error("time {0} lies before the start of the drill")]
    NegativeTime(f64),

    #[error("invalid band configuration: {0}")]
    InvalidConfig(String),

    #[error("could not parse band configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("frame schedule needs at least one step and a positive step size")]
    InvalidFrameCount,
}

pub type Result<T> = std::result::Result<T, DrillError>;
