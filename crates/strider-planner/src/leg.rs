//! Per-leg runtime state shared by the planning stages of a control tick.

use nalgebra::Vector3;
use strider_core::{LegId, LegMeasurement, LegTable, SensedState};

/// Kinematic state captured while a leg was last on the ground.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LiftoffSnapshot {
    pub foot_world: Vector3<f64>,
    pub hip_world: Vector3<f64>,
    /// Hip position projected onto the terrain below it.
    pub hip_on_terrain: Vector3<f64>,
}

/// Kinematic state captured when a leg last re-entered stance.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TouchdownSnapshot {
    pub foot_world: Vector3<f64>,
    /// Horizontal distance between the touchdown and the planned foothold.
    pub foothold_error: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LegRuntimeState {
    pub id: LegId,
    /// Normalized stance phase, -1 when scheduled to swing.
    pub stance_phase: f64,
    /// Normalized swing phase, -1 when scheduled in stance.
    pub swing_phase: f64,
    pub measurement: LegMeasurement,
    /// Scheduled stance and sensed in contact.
    pub support_leg: bool,
    /// Held in stance regardless of the gait schedule.
    pub in_stand_configuration: bool,
    pub liftoff: LiftoffSnapshot,
    pub touchdown: TouchdownSnapshot,
}

impl LegRuntimeState {
    /// Fresh state from the sensed leg at controller start. Legs start in
    /// stand configuration.
    pub fn new(id: LegId, measurement: LegMeasurement) -> Self {
        Self {
            id,
            stance_phase: 0.0,
            swing_phase: -1.0,
            measurement,
            support_leg: measurement.grounded,
            in_stand_configuration: true,
            liftoff: LiftoffSnapshot {
                foot_world: measurement.foot_world,
                hip_world: measurement.hip_world,
                hip_on_terrain: Vector3::new(
                    measurement.hip_world.x,
                    measurement.hip_world.y,
                    measurement.foot_world.z,
                ),
            },
            touchdown: TouchdownSnapshot {
                foot_world: measurement.foot_world,
                foothold_error: None,
            },
        }
    }

    /// Table of fresh states for every leg of `sensed`.
    pub fn table(sensed: &SensedState) -> LegTable<Self> {
        LegTable::from_fn(|leg| Self::new(leg, sensed.legs[leg]))
    }

    /// Refresh sensed data and scheduled phases for this tick.
    pub fn update(&mut self, measurement: LegMeasurement, stance_phase: f64, swing_phase: f64) {
        self.measurement = measurement;
        self.stance_phase = stance_phase;
        self.swing_phase = swing_phase;
        self.support_leg = self.is_scheduled_stance() && measurement.grounded;
    }

    /// Stance is scheduled by the gait or forced by stand configuration.
    pub fn is_scheduled_stance(&self) -> bool {
        self.in_stand_configuration || self.stance_phase >= 0.0
    }

    /// Swing is scheduled and the leg is not held in stand configuration.
    pub fn is_swinging(&self) -> bool {
        !self.in_stand_configuration && self.swing_phase >= 0.0
    }

    pub const fn is_grounded(&self) -> bool {
        self.measurement.grounded
    }

    pub fn foot(&self) -> Vector3<f64> {
        self.measurement.foot_world
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measurement(grounded: bool) -> LegMeasurement {
        LegMeasurement {
            grounded,
            ..Default::default()
        }
    }

    #[test]
    fn stand_configuration_forces_stance() {
        let mut leg = LegRuntimeState::new(LegId::LeftFore, measurement(true));
        leg.update(measurement(true), -1.0, 0.4);
        assert!(leg.is_scheduled_stance());
        assert!(!leg.is_swinging());
        assert!(leg.support_leg);

        leg.in_stand_configuration = false;
        leg.update(measurement(true), -1.0, 0.4);
        assert!(!leg.is_scheduled_stance());
        assert!(leg.is_swinging());
        assert!(!leg.support_leg);
    }

    #[test]
    fn support_leg_requires_contact() {
        let mut leg = LegRuntimeState::new(LegId::RightHind, measurement(false));
        leg.in_stand_configuration = false;
        leg.update(measurement(false), 0.3, -1.0);
        assert!(leg.is_scheduled_stance());
        assert!(!leg.support_leg);
    }
}
