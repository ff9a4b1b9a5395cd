//! Kinematic quadruped closing the loop around the controller.
//!
//! The torso follows the desired pose exactly and every foot tracks its
//! target, stopping at the terrain surface. A foot is in contact when its
//! target reaches the ground.

use nalgebra::Vector3;
use strider_core::{LegTable, SensedState, StriderError, TerrainModel};
use strider_planner::{ControlOutput, LocomotionController};

/// Height tolerance for contact detection (m).
const CONTACT_TOLERANCE: f64 = 1e-6;

pub struct KinematicQuadruped {
    sensed: SensedState,
    terrain: Box<dyn TerrainModel>,
}

impl KinematicQuadruped {
    pub fn new(sensed: SensedState, terrain: Box<dyn TerrainModel>) -> Self {
        Self { sensed, terrain }
    }

    pub const fn sensed(&self) -> &SensedState {
        &self.sensed
    }

    pub fn sensed_mut(&mut self) -> &mut SensedState {
        &mut self.sensed
    }

    /// Move the robot according to one controller output.
    pub fn apply(&mut self, output: &ControlOutput, dt: f64) {
        let torso = &mut self.sensed.torso;
        let previous = torso.position;
        torso.position = output.torso_pose.position;
        torso.orientation = output.torso_pose.orientation;
        if dt > 0.0 {
            torso.linear_velocity = (torso.position - previous) / dt;
        }
        let torso = *torso;

        for (leg, measurement) in self.sensed.legs.iter_mut() {
            measurement.hip_world = torso.position + torso.orientation * measurement.hip_base;
            let Some(target) = output.foot_targets[leg] else {
                continue;
            };
            let ground = self
                .terrain
                .height_at(&target.position)
                .unwrap_or(f64::NEG_INFINITY);
            let mut foot = target.position;
            foot.z = foot.z.max(ground);
            measurement.foot_world = foot;
            measurement.grounded = target.position.z <= ground + CONTACT_TOLERANCE;
            measurement.slipping = false;
        }
    }

    /// Run `ticks` control ticks, feeding every output back as the next
    /// sensed state.
    pub fn drive(
        &mut self,
        controller: &mut LocomotionController,
        ticks: usize,
        dt: f64,
    ) -> Result<Vec<ControlOutput>, StriderError> {
        let mut outputs = Vec::with_capacity(ticks);
        for _ in 0..ticks {
            let output = controller.tick(dt, &self.sensed)?;
            self.apply(&output, dt);
            outputs.push(output);
        }
        Ok(outputs)
    }

    /// Current foot positions in world frame.
    pub fn feet(&self) -> LegTable<Vector3<f64>> {
        self.sensed.legs.map(|_, m| m.foot_world)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
