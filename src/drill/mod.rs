//! Drill Module
//!
//! Trajectory engine for a marching band: every player's position and
//! facing as a function of performance time (in beats).

pub mod band;
pub mod geometry;
pub mod playback;
pub mod player;

pub use band::{Alignment, Band, BandConfig, BandSnapshot, ManeuverContext};
pub use geometry::{PathShape, Pose, Vec2};
pub use playback::FrameSchedule;
pub use player::{Player, PlayerSnapshot, Segment, SpeedCommand, SpeedProfile, PIVOT_RADIUS};
