//! Desired torso pose.
//!
//! Height follows independent fore and hind clearance profiles indexed by
//! stride phase, on top of the terrain below the CoM target. Pitch follows
//! the fore/hind clearance difference, compensated by a filtered terrain
//! slope estimate. Heading keeps the measured heading and turns the hip axis
//! towards the feet axis.

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use strider_core::{
    ConfigError, FootTarget, LegId, LegTable, Pose, TargetSource, TerrainError, TerrainModel,
    TorsoMeasurement,
};

use crate::curve::PeriodicCurve;
use crate::leg::LegRuntimeState;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const fn default_height_offset() -> f64 {
    0.42
}
const fn default_slope_gain() -> f64 {
    0.75
}
const fn default_damping() -> f64 {
    1.0
}
const fn default_stance_nudge() -> f64 {
    0.01
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TorsoConfig {
    /// Fore hip clearance above ground (m).
    #[serde(default = "default_height_offset")]
    pub fore_height_offset: f64,
    /// Hind hip clearance above ground (m).
    #[serde(default = "default_height_offset")]
    pub hind_height_offset: f64,
    /// Periodic fore clearance variation over the stride, `[phase, value]` knots.
    #[serde(default)]
    pub fore_height_profile: PeriodicCurve,
    #[serde(default)]
    pub hind_height_profile: PeriodicCurve,
    /// Fraction of the terrain slope removed from the pitch.
    #[serde(default = "default_slope_gain")]
    pub slope_gain: f64,
    /// Fraction of the terrain roll followed by the torso.
    #[serde(default)]
    pub roll_gain: f64,
    /// Low-pass coefficient of the slope/roll estimate (1 = no filtering).
    #[serde(default = "default_damping")]
    pub slope_damping: f64,
    /// Downward offset applied to ungrounded stance feet (m).
    #[serde(default = "default_stance_nudge")]
    pub stance_nudge: f64,
}

impl Default for TorsoConfig {
    fn default() -> Self {
        Self {
            fore_height_offset: default_height_offset(),
            hind_height_offset: default_height_offset(),
            fore_height_profile: PeriodicCurve::default(),
            hind_height_profile: PeriodicCurve::default(),
            slope_gain: default_slope_gain(),
            roll_gain: 0.0,
            slope_damping: default_damping(),
            stance_nudge: default_stance_nudge(),
        }
    }
}

impl TorsoConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fore_height_offset <= 0.0 || self.hind_height_offset <= 0.0 {
            return Err(ConfigError::invalid(
                "torso.height_offset",
                "clearance offsets must be positive",
            ));
        }
        if !(self.slope_damping > 0.0 && self.slope_damping <= 1.0) {
            return Err(ConfigError::invalid("torso.slope_damping", "must be in (0, 1]"));
        }
        if self.stance_nudge < 0.0 {
            return Err(ConfigError::invalid("torso.stance_nudge", "must be non-negative"));
        }
        self.fore_height_profile
            .validate("torso.fore_height_profile")?;
        self.hind_height_profile
            .validate("torso.hind_height_profile")
    }
}

// ---------------------------------------------------------------------------
// Synthesizer
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct TorsoPoseSynthesizer {
    config: TorsoConfig,
    /// Fore-to-hind hip distance along the base x axis.
    hip_spacing: f64,
    slope: f64,
    roll: f64,
    fore_height: f64,
    hind_height: f64,
    desired: Pose,
}

impl TorsoPoseSynthesizer {
    const MIN_HIP_SPACING: f64 = 1e-6;

    pub fn new(config: TorsoConfig) -> Self {
        Self {
            fore_height: config.fore_height_offset,
            hind_height: config.hind_height_offset,
            config,
            hip_spacing: 0.0,
            slope: 0.0,
            roll: 0.0,
            desired: Pose::default(),
        }
    }

    /// Capture the fixed hip geometry.
    pub fn initialize(&mut self, legs: &LegTable<LegRuntimeState>) -> Result<(), ConfigError> {
        let spacing = legs[LegId::LeftFore].measurement.hip_base.x
            - legs[LegId::LeftHind].measurement.hip_base.x;
        if spacing <= Self::MIN_HIP_SPACING {
            return Err(ConfigError::invalid(
                "torso.hip_spacing",
                format!("fore hips must lie ahead of hind hips (spacing {spacing:.4} m)"),
            ));
        }
        self.hip_spacing = spacing;
        self.slope = 0.0;
        self.roll = 0.0;
        Ok(())
    }

    pub fn desired_pose(&self) -> &Pose {
        &self.desired
    }

    /// Filtered (slope, roll) estimate.
    pub const fn terrain_angles(&self) -> (f64, f64) {
        (self.slope, self.roll)
    }

    /// Desired (fore, hind) clearance of the last tick.
    pub const fn clearances(&self) -> (f64, f64) {
        (self.fore_height, self.hind_height)
    }

    /// Compute the desired torso pose and hold every stance foot that has no
    /// target yet.
    pub fn advance(
        &mut self,
        stride_phase: f64,
        com_target: &Vector3<f64>,
        legs: &LegTable<LegRuntimeState>,
        torso: &TorsoMeasurement,
        terrain: &dyn TerrainModel,
        targets: &mut LegTable<Option<FootTarget>>,
    ) -> Result<Pose, TerrainError> {
        self.fore_height =
            self.config.fore_height_offset + self.config.fore_height_profile.evaluate(stride_phase);
        self.hind_height =
            self.config.hind_height_offset + self.config.hind_height_profile.evaluate(stride_phase);
        let ground = terrain.on_terrain(com_target)?;
        let position = Vector3::new(
            com_target.x,
            com_target.y,
            ground.z + 0.5 * (self.fore_height + self.hind_height),
        );

        let pitch = (self.hind_height - self.fore_height).atan2(self.hip_spacing);
        let damping = self.config.slope_damping;
        self.slope += damping * (terrain.slope_angle() - self.slope);
        self.roll += damping * (terrain.roll_angle() - self.roll);
        let pitch_roll = UnitQuaternion::from_euler_angles(
            self.config.roll_gain * self.roll,
            pitch - self.config.slope_gain * self.slope,
            0.0,
        );

        let align = heading_alignment(legs);
        let orientation = align * torso.control_orientation() * pitch_roll;
        self.desired = Pose {
            position,
            orientation,
        };

        for (leg, state) in legs.iter() {
            if targets[leg].is_some() || !state.is_scheduled_stance() {
                continue;
            }
            let mut foot = state.foot();
            if !state.is_grounded() {
                foot.z -= self.config.stance_nudge;
            }
            targets[leg] = Some(FootTarget {
                position: foot,
                source: TargetSource::Stance,
            });
        }

        Ok(self.desired)
    }
}

/// Yaw rotation turning the horizontal hind-to-fore hip axis onto the
/// horizontal hind-to-fore feet axis.
fn heading_alignment(legs: &LegTable<LegRuntimeState>) -> UnitQuaternion<f64> {
    let midpoint = |a: LegId, b: LegId, hip: bool| {
        let pick = |leg: LegId| {
            if hip {
                legs[leg].measurement.hip_world
            } else {
                legs[leg].foot()
            }
        };
        (pick(a) + pick(b)) * 0.5
    };
    let horizontal = |v: Vector3<f64>| Vector3::new(v.x, v.y, 0.0);

    let hip_axis = horizontal(
        midpoint(LegId::LeftFore, LegId::RightFore, true)
            - midpoint(LegId::LeftHind, LegId::RightHind, true),
    );
    let feet_axis = horizontal(
        midpoint(LegId::LeftFore, LegId::RightFore, false)
            - midpoint(LegId::LeftHind, LegId::RightHind, false),
    );
    UnitQuaternion::rotation_between(&hip_axis, &feet_axis).unwrap_or_else(UnitQuaternion::identity)
}
