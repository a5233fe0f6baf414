use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

use crate::ProtocolError;

/// Position plus heading of the agent.
///
/// The heading is in radians and circular: two headings that differ by a
/// multiple of 2π describe the same orientation. Poses are plain values; a
/// moved agent is a new `Pose`.
///
/// On the wire a pose is the array `[x, y, z, heading]`. Producers that only
/// know a position may send three values, in which case the heading is 0.
/// Extra trailing values are ignored.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "[f64; 4]")]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub heading: f64,
}

impl Pose {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64, heading: f64) -> Self {
        Self { x, y, z, heading }
    }

    /// Builds a pose from a heading given in degrees, the unit used by the
    /// recorded `posture.json` trajectories.
    #[must_use]
    pub fn from_degrees(x: f64, y: f64, z: f64, heading_degrees: f64) -> Self {
        Self::new(x, y, z, heading_degrees.to_radians())
    }

    #[must_use]
    pub const fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Euclidean distance between the two positions. Headings are ignored.
    #[must_use]
    pub fn distance_to(&self, other: &Pose) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Smallest angle between the two headings, in `[0, π]`.
    #[must_use]
    pub fn heading_difference(&self, other: &Pose) -> f64 {
        circular_difference(self.heading, other.heading)
    }

    #[must_use]
    pub const fn to_array(self) -> [f64; 4] {
        [self.x, self.y, self.z, self.heading]
    }
}

impl From<Pose> for [f64; 4] {
    fn from(pose: Pose) -> Self {
        pose.to_array()
    }
}

impl From<[f64; 4]> for Pose {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl TryFrom<Vec<f64>> for Pose {
    type Error = ProtocolError;

    fn try_from(v: Vec<f64>) -> Result<Self, Self::Error> {
        match v.as_slice() {
            [x, y, z] => Ok(Self::new(*x, *y, *z, 0.0)),
            [x, y, z, heading, ..] => Ok(Self::new(*x, *y, *z, *heading)),
            short => Err(ProtocolError::ShortPose(short.len())),
        }
    }
}

/// Maps an angle in radians into `[0, 2π)`.
#[must_use]
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Circular distance between two headings in radians.
///
/// The result lies in `[0, π]` and does not depend on argument order.
#[must_use]
pub fn circular_difference(a: f64, b: f64) -> f64 {
    let diff = (normalize_angle(a) - normalize_angle(b)).abs();
    let diff = diff.min(TAU - diff);
    diff.clamp(0.0, PI)
}
