//! QuickMarch - Marching band trajectory engine
//!
//! Scripts band drill as a sequence of movement commands and answers
//! "where is each player, and which way are they facing, at time t".
//! Drawing the frames and encoding video is left to the caller.

pub mod drill;
pub mod error;

pub use drill::band::{
    Alignment, Band, BandConfig, BandSnapshot, ManeuverContext, DEFAULT_BEND_BEATS,
    DEFAULT_COUNTER_BEATS, DEFAULT_TURN_BEATS,
};
pub use drill::geometry::{Pose, Vec2};
pub use drill::playback::FrameSchedule;
pub use drill::player::{Player, PlayerSnapshot, PIVOT_RADIUS};
pub use error::{DrillError, Result};
