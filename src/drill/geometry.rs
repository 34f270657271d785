//! Geometry - Degree based trigonometry and path shapes
//!
//! All public angles are in degrees. Paths are parameterized by the distance
//! walked from the start of the path, not by time.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::ops::{Add, Mul, Sub};

use crate::error::{DrillError, Result};

/// Sine of an angle given in degrees
pub fn sind(angle: f64) -> f64 {
    (angle / 180.0 * PI).sin()
}

/// Cosine of an angle given in degrees
pub fn cosd(angle: f64) -> f64 {
    (angle / 180.0 * PI).cos()
}

/// Planar vector / position
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    /// Vector from its components
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Origin / null vector
    pub fn zero() -> Self {
        Self::default()
    }

    /// Euclidean length
    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Euclidean distance to `other`
    pub fn distance_to(&self, other: Vec2) -> f64 {
        (other - *self).norm()
    }

    /// Unit vector pointing along `angle`
    pub fn heading(angle: f64) -> Self {
        Self::new(cosd(angle), sind(angle))
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Self) -> Self::Output {
        vec_sum(self, rhs)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Self) -> Self::Output {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f64) -> Self::Output {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Component-wise sum of two vectors
pub fn vec_sum(a: Vec2, b: Vec2) -> Vec2 {
    Vec2::new(a.x + b.x, a.y + b.y)
}

/// Rotate `v` counter-clockwise by `angle` degrees
pub fn rotate(v: Vec2, angle: f64) -> Vec2 {
    let (s, c) = (sind(angle), cosd(angle));
    Vec2::new(c * v.x - s * v.y, s * v.x + c * v.y)
}

/// Position and facing of a player
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec2,
    /// Facing angle in degrees
    pub angle: f64,
}

impl Pose {
    /// Pose at `position`, facing `angle` degrees
    pub fn new(position: Vec2, angle: f64) -> Self {
        Self { position, angle }
    }
}

/// Shape of one piece of a player's path
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathShape {
    /// Straight line along the start heading
    Straight { start: Pose },
    /// Circular arc. Positive sweeps turn right (clockwise).
    Arc {
        start: Pose,
        radius: f64,
        sweep: f64,
    },
}

impl PathShape {
    /// Straight line leaving `start` along its heading
    pub fn straight(start: Pose) -> Self {
        PathShape::Straight { start }
    }

    /// Arc of `sweep` degrees on a circle of `radius`.
    ///
    /// A zero radius has no defined tangent and is rejected; in-place pivots
    /// use a tiny positive radius instead. The sweep must be finite.
    pub fn arc(start: Pose, radius: f64, sweep: f64) -> Result<Self> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(DrillError::InvalidRadius(radius));
        }
        if !sweep.is_finite() {
            return Err(DrillError::InvalidAngle(sweep));
        }
        Ok(PathShape::Arc {
            start,
            radius,
            sweep,
        })
    }

    /// Arc length of a sweep of `sweep` degrees on a circle of `radius`
    pub fn arc_length(radius: f64, sweep: f64) -> f64 {
        sweep.abs() / 180.0 * PI * radius
    }

    /// Pose at distance 0
    pub fn start(&self) -> Pose {
        match *self {
            PathShape::Straight { start } | PathShape::Arc { start, .. } => start,
        }
    }

    /// Position after walking `distance` along the shape
    pub fn position_at(&self, distance: f64) -> Vec2 {
        match *self {
            PathShape::Straight { start } => start.position + Vec2::heading(start.angle) * distance,
            PathShape::Arc {
                start,
                radius,
                sweep,
            } => {
                let side = 1f64.copysign(sweep);
                let phi = distance / radius;
                let local = Vec2::new(radius * phi.sin(), side * radius * (phi.cos() - 1.0));
                start.position + rotate(local, start.angle)
            }
        }
    }

    /// Facing angle (degrees) after walking `distance` along the shape
    pub fn angle_at(&self, distance: f64) -> f64 {
        match *self {
            PathShape::Straight { start } => start.angle,
            PathShape::Arc {
                start,
                radius,
                sweep,
            } => start.angle - 1f64.copysign(sweep) * (distance / radius).to_degrees(),
        }
    }

    /// Position and facing after walking `distance`
    pub fn evaluate(&self, distance: f64) -> Pose {
        Pose::new(self.position_at(distance), self.angle_at(distance))
    }
}
