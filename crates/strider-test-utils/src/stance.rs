//! Nominal standing posture.

use nalgebra::Vector3;
use strider_core::{LegId, LegMeasurement, LegTable, SensedState, TorsoMeasurement};

/// Base height above the ground in the nominal stance (m).
pub const NOMINAL_HEIGHT: f64 = 0.42;

/// Hip position in the base frame.
pub fn hip_in_base(leg: LegId) -> Vector3<f64> {
    let (sx, sy) = signs(leg);
    Vector3::new(sx * 0.25, sy * 0.12, 0.0)
}

/// Foot offset from the base, projected on the ground, in the nominal stance.
pub fn nominal_foot_offset(leg: LegId) -> Vector3<f64> {
    let (sx, sy) = signs(leg);
    Vector3::new(sx * 0.25, sy * 0.18, 0.0)
}

/// Robot standing still on level ground at `ground` height: base at the
/// origin, identity orientation, all four feet grounded.
pub fn nominal_stance(ground: f64) -> SensedState {
    let position = Vector3::new(0.0, 0.0, ground + NOMINAL_HEIGHT);
    SensedState {
        legs: LegTable::from_fn(|leg| {
            let hip_base = hip_in_base(leg);
            let mut foot_world = nominal_foot_offset(leg);
            foot_world.z = ground;
            LegMeasurement {
                foot_world,
                hip_world: position + hip_base,
                hip_base,
                grounded: true,
                slipping: false,
            }
        }),
        torso: TorsoMeasurement {
            position,
            ..TorsoMeasurement::default()
        },
    }
}

const fn signs(leg: LegId) -> (f64, f64) {
    let sx = if leg.is_fore() { 1.0 } else { -1.0 };
    let sy = if leg.is_left() { 1.0 } else { -1.0 };
    (sx, sy)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feet_sit_outside_hips_on_the_ground() {
        let sensed = nominal_stance(0.1);
        for leg in LegId::ALL {
            let m = sensed.legs[leg];
            assert!(m.grounded);
            assert!((m.foot_world.z - 0.1).abs() < 1e-12);
            assert!(m.foot_world.y.abs() > m.hip_world.y.abs());
            assert!((m.hip_world.z - m.foot_world.z - NOMINAL_HEIGHT).abs() < 1e-12);
        }
    }

    #[test]
    fn left_fore_is_front_left() {
        let foot = nominal_stance(0.0).legs[LegId::LeftFore].foot_world;
        assert!(foot.x > 0.0 && foot.y > 0.0);
        let foot = nominal_stance(0.0).legs[LegId::RightHind].foot_world;
        assert!(foot.x < 0.0 && foot.y < 0.0);
    }
}
