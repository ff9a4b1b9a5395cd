//! Swing foot trajectory sampling.
//!
//! Horizontal motion eases from the liftoff position to the validated
//! foothold; height follows a rise-then-fall profile applied along the
//! terrain normal below the interpolated ground point. Both profiles are
//! 12-point (degree-11) Bezier curves whose first and last three control
//! points coincide, giving zero velocity and acceleration at liftoff and
//! touchdown.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use strider_core::{TerrainError, TerrainModel};

// S-curve from 0 to 1.
const BEZIER_S: [f64; 12] = [0.0, 0.0, 0.0, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 1.0, 1.0, 1.0];

// Height bump, zero at both ends.
const BEZIER_H: [f64; 12] = [0.0, 0.0, 0.0, 0.9, 0.9, 1.0, 1.0, 0.9, 0.9, 0.0, 0.0, 0.0];

// bezier_eval(&BEZIER_H, 0.5), used to normalize the bump to a unit peak.
const BEZIER_H_PEAK: f64 = 0.886_230_468_75;

/// De Casteljau evaluation of a degree-11 Bezier curve.
fn bezier_eval(points: &[f64; 12], t: f64) -> f64 {
    let mut work = *points;
    for k in 1..12 {
        for i in 0..(12 - k) {
            work[i] = work[i] * (1.0 - t) + work[i + 1] * t;
        }
    }
    work[0]
}

/// Horizontal easing of the swing foot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwingEasing {
    #[default]
    Linear,
    Bezier,
}

impl SwingEasing {
    pub fn apply(self, s: f64) -> f64 {
        let s = s.clamp(0.0, 1.0);
        match self {
            Self::Linear => s,
            Self::Bezier => bezier_eval(&BEZIER_S, s),
        }
    }
}

/// Unit-peak swing height profile: 0 at both ends, 1 at `s = 0.5`.
pub fn height_fraction(s: f64) -> f64 {
    bezier_eval(&BEZIER_H, s.clamp(0.0, 1.0)) / BEZIER_H_PEAK
}

/// Swing trajectory of one leg, from liftoff to touchdown.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SwingTrajectoryState {
    /// Liftoff foot position.
    pub start: Vector3<f64>,
    /// Validated foothold, unknown while the handshake is pending.
    pub target: Option<Vector3<f64>>,
    /// Interpolation parameter at which the target became known.
    pub resume_parameter: f64,
    /// Last interpolation parameter in [0, 1].
    pub parameter: f64,
    /// Last ground point below the swing foot (terrain snapped).
    pub ground: Vector3<f64>,
    /// Last height sample along the terrain normal.
    pub height: f64,
    held: bool,
}

impl SwingTrajectoryState {
    pub fn new(start: Vector3<f64>) -> Self {
        Self {
            start,
            target: None,
            resume_parameter: 0.0,
            parameter: 0.0,
            ground: start,
            height: 0.0,
            held: false,
        }
    }

    /// Sample the foot position at `parameter`.
    ///
    /// While `target` is `None` the horizontal position holds at the start.
    /// Once the target becomes known, horizontal interpolation restarts from
    /// the current parameter and reaches the target at `parameter = 1`.
    pub fn sample(
        &mut self,
        parameter: f64,
        target: Option<Vector3<f64>>,
        easing: SwingEasing,
        swing_height: f64,
        terrain: &dyn TerrainModel,
    ) -> Result<Vector3<f64>, TerrainError> {
        let parameter = parameter.clamp(0.0, 1.0);
        if self.target.is_none() {
            if let Some(target) = target {
                self.target = Some(target);
                self.resume_parameter = if self.held { parameter } else { 0.0 };
            } else {
                self.held = true;
            }
        }

        let horizontal = match self.target {
            Some(target) => {
                let s = if self.resume_parameter < 1.0 {
                    (parameter - self.resume_parameter) / (1.0 - self.resume_parameter)
                } else {
                    1.0
                };
                self.start + (target - self.start) * easing.apply(s)
            }
            None => self.start,
        };

        let ground = terrain.on_terrain(&horizontal)?;
        let normal = terrain.surface_normal(&ground)?;
        self.parameter = parameter;
        self.ground = ground;
        self.height = swing_height * height_fraction(parameter);
        Ok(ground + normal.into_inner() * self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strider_core::{HorizontalPlane, InclinedPlane};

    #[test]
    fn height_profile_peak_and_ends() {
        assert_relative_eq!(height_fraction(0.0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(height_fraction(1.0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(height_fraction(0.5), 1.0, epsilon = 1e-10);
        assert_relative_eq!(height_fraction(0.25), height_fraction(0.75), epsilon = 1e-12);
    }

    #[test]
    fn easing_endpoints() {
        for easing in [SwingEasing::Linear, SwingEasing::Bezier] {
            assert_relative_eq!(easing.apply(0.0), 0.0, epsilon = 1e-12);
            assert_relative_eq!(easing.apply(1.0), 1.0, epsilon = 1e-12);
        }
        assert_relative_eq!(SwingEasing::Bezier.apply(0.5), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn trajectory_reaches_target_on_terrain() {
        let terrain = HorizontalPlane::new(0.1);
        let start = Vector3::new(0.0, 0.0, 0.1);
        let target = Vector3::new(0.12, 0.02, 0.1);
        let mut swing = SwingTrajectoryState::new(start);

        for i in 0..=20 {
            let s = f64::from(i) / 20.0;
            let foot = swing
                .sample(s, Some(target), SwingEasing::Linear, 0.08, &terrain)
                .unwrap();
            assert_relative_eq!(swing.ground.z, 0.1, epsilon = 1e-12);
            assert!(foot.z >= 0.1 - 1e-12);
        }
        let end = swing
            .sample(1.0, Some(target), SwingEasing::Linear, 0.08, &terrain)
            .unwrap();
        assert_relative_eq!(end, target, epsilon = 1e-12);
    }

    #[test]
    fn pending_target_holds_then_restarts() {
        let terrain = HorizontalPlane::new(0.0);
        let start = Vector3::zeros();
        let target = Vector3::new(0.1, 0.0, 0.0);
        let mut swing = SwingTrajectoryState::new(start);

        let held = swing
            .sample(0.3, None, SwingEasing::Linear, 0.05, &terrain)
            .unwrap();
        assert_relative_eq!(held.xy(), start.xy());
        assert!(held.z > 0.0);

        let resumed = swing
            .sample(0.5, Some(target), SwingEasing::Linear, 0.05, &terrain)
            .unwrap();
        assert_relative_eq!(resumed.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(swing.resume_parameter, 0.5);

        let mid = swing
            .sample(0.75, Some(target), SwingEasing::Linear, 0.05, &terrain)
            .unwrap();
        assert_relative_eq!(mid.x, 0.05, epsilon = 1e-12);
        let end = swing
            .sample(1.0, Some(target), SwingEasing::Linear, 0.05, &terrain)
            .unwrap();
        assert_relative_eq!(end, target, epsilon = 1e-12);
    }

    #[test]
    fn height_applied_along_terrain_normal() {
        let terrain = InclinedPlane::from_angles(Vector3::zeros(), 0.3, 0.0).unwrap();
        let mut swing = SwingTrajectoryState::new(Vector3::zeros());
        let foot = swing
            .sample(0.5, Some(Vector3::zeros()), SwingEasing::Bezier, 0.1, &terrain)
            .unwrap();
        let offset = foot - swing.ground;
        assert_relative_eq!(offset.norm(), 0.1, epsilon = 1e-9);
        assert_relative_eq!(offset.normalize(), terrain.normal().into_inner(), epsilon = 1e-9);
    }
}
