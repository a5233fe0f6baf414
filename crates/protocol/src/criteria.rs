//! Pose proximity tests used by the episode controller.
//!
//! Both tests compare exactly one pair of poses. Thresholds are carried by
//! the value, so the same controller logic can be driven with the tolerances
//! of any deployment.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::Pose;

/// Goal test: inclusive on both the positional and the angular threshold.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuccessCriterion {
    pub max_distance: f64,
    /// Radians.
    pub max_heading: f64,
}

impl SuccessCriterion {
    #[must_use]
    pub const fn new(max_distance: f64, max_heading: f64) -> Self {
        Self {
            max_distance,
            max_heading,
        }
    }

    #[must_use]
    pub fn from_degrees(max_distance: f64, max_heading_degrees: f64) -> Self {
        Self::new(max_distance, max_heading_degrees.to_radians())
    }

    #[must_use]
    pub fn is_met(&self, current: &Pose, goal: &Pose) -> bool {
        current.distance_to(goal) <= self.max_distance
            && current.heading_difference(goal) <= self.max_heading
    }
}

impl Default for SuccessCriterion {
    fn default() -> Self {
        Self::new(0.1, PI / 4.0)
    }
}

/// Settling test for multi-instruction episodes.
///
/// Met when the pose proposed by the policy stays strictly within both
/// thresholds of the pose used for the previous inference, i.e. the agent
/// stopped moving and the current instruction is considered done.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateCondition {
    pub max_distance: f64,
    /// Radians.
    pub max_heading: f64,
}

impl UpdateCondition {
    #[must_use]
    pub const fn new(max_distance: f64, max_heading: f64) -> Self {
        Self {
            max_distance,
            max_heading,
        }
    }

    #[must_use]
    pub fn from_degrees(max_distance: f64, max_heading_degrees: f64) -> Self {
        Self::new(max_distance, max_heading_degrees.to_radians())
    }

    #[must_use]
    pub fn is_met(&self, proposed: &Pose, previous: &Pose) -> bool {
        proposed.distance_to(previous) < self.max_distance
            && proposed.heading_difference(previous) < self.max_heading
    }
}

impl Default for UpdateCondition {
    fn default() -> Self {
        Self::new(0.2, PI / 12.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_inclusive() {
        let c = SuccessCriterion::new(1.0, 0.5);
        let goal = Pose::new(0.0, 0.0, 0.0, 0.0);
        assert!(c.is_met(&Pose::new(1.0, 0.0, 0.0, 0.5), &goal));
        assert!(!c.is_met(&Pose::new(1.0, 0.0, 0.0, 0.5001), &goal));
    }

    #[test]
    fn update_is_strict() {
        let u = UpdateCondition::new(1.0, 0.5);
        let prev = Pose::new(0.0, 0.0, 0.0, 0.0);
        assert!(!u.is_met(&Pose::new(1.0, 0.0, 0.0, 0.0), &prev));
        assert!(u.is_met(&Pose::new(0.99, 0.0, 0.0, 0.49), &prev));
    }

    #[test]
    fn defaults_match_historical_tolerances() {
        let u = UpdateCondition::default();
        assert!((u.max_heading.to_degrees() - 15.0).abs() < 1e-9);
        let s = SuccessCriterion::default();
        assert!((s.max_heading.to_degrees() - 45.0).abs() < 1e-9);
        assert!((s.max_distance - 0.1).abs() < 1e-12);
    }
}
