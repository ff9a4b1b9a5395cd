//! Inverse-kinematics collaborator.

use nalgebra::Vector3;

use crate::types::LegId;

/// Maps a desired foot position to joint positions for one leg.
///
/// The planner calls this once per commanded leg per tick with the foot
/// position expressed in the base frame.
pub trait LegKinematics {
    /// Joint positions (hip abduction, hip flexion, knee) that place the foot
    /// of `leg` at `foot_in_base`, or `None` when the point is unreachable.
    fn joint_positions(&self, leg: LegId, foot_in_base: &Vector3<f64>) -> Option<Vector3<f64>>;
}
