//! Playback - Frame stepping for offline rendering
//!
//! Produces one band snapshot per animation frame. Frames are stepped
//! incrementally so each frame only integrates the speed profile over `dt`.

use serde::{Deserialize, Serialize};

use crate::drill::band::{Band, BandSnapshot};
use crate::error::{DrillError, Result};

/// Frame count and spacing of an animation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameSchedule {
    /// Number of frames, including the opening frame at time 0
    pub steps: usize,
    /// Beats between consecutive frames
    pub dt: f64,
}

impl FrameSchedule {
    pub fn new(steps: usize, dt: f64) -> Result<Self> {
        if steps < 1 || !dt.is_finite() || dt <= 0.0 {
            return Err(DrillError::InvalidFrameCount);
        }
        Ok(Self { steps, dt })
    }

    /// Time of the last frame
    pub fn duration(&self) -> f64 {
        (self.steps - 1) as f64 * self.dt
    }

    /// Frames per second when the music plays at `bpm` beats per minute
    pub fn frame_rate(&self, bpm: f64) -> f64 {
        1.0 / (60.0 / bpm * self.dt)
    }

    /// Snapshot the band at every frame time
    pub fn render(&self, band: &mut Band) -> Result<Vec<BandSnapshot>> {
        log::debug!(
            "rendering {} frames, {} beats apart",
            self.steps, self.dt
        );
        let mut frames = Vec::with_capacity(self.steps);
        band.set_time(0.0)?;
        frames.push(band.snapshot());
        for _ in 1..self.steps {
            band.advance_time(self.dt)?;
            frames.push(band.snapshot());
        }
        Ok(frames)
    }
}
