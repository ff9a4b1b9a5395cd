//! Foot placement for dynamic gaits.
//!
//! The foothold is chosen at liftoff with the Raibert heuristic plus a
//! capture-point velocity correction, so it reflects the body velocity at
//! the moment the leg leaves the ground. The swing foot follows Bezier
//! easing.

use log::info;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use strider_core::{ConfigError, FootTarget, LegId, LegTable, TerrainError};

use super::validation::{Foothold, FootholdRecord, FootholdValidator, ValidationHandshake};
use super::{
    FootPlacement, FootholdConfig, LegPlans, PlanningContext, SwingEasing, SwingTrajectoryState,
    clamp_step,
};
use crate::gait::GaitScheduler;
use crate::support_polygon::SafetyDeltaMode;

const fn default_cp_gain() -> f64 {
    0.5
}
const fn default_max_reach() -> f64 {
    0.3
}
const fn default_gravity() -> f64 {
    9.81
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DynamicGaitConfig {
    /// Capture-point gain. The velocity feedback gain is
    /// `cp_gain * sqrt(body_height / gravity)`.
    #[serde(default = "default_cp_gain")]
    pub cp_gain: f64,
    /// Maximum horizontal distance between hip and foothold (m).
    #[serde(default = "default_max_reach")]
    pub max_reach: f64,
    #[serde(default = "default_gravity")]
    pub gravity: f64,
}

impl Default for DynamicGaitConfig {
    fn default() -> Self {
        Self {
            cp_gain: default_cp_gain(),
            max_reach: default_max_reach(),
            gravity: default_gravity(),
        }
    }
}

impl DynamicGaitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cp_gain < 0.0 {
            return Err(ConfigError::invalid("foothold.dynamic.cp_gain", "must be non-negative"));
        }
        if self.max_reach <= 0.0 {
            return Err(ConfigError::invalid("foothold.dynamic.max_reach", "must be positive"));
        }
        if self.gravity <= 0.0 {
            return Err(ConfigError::invalid("foothold.dynamic.gravity", "must be positive"));
        }
        Ok(())
    }

    /// Raibert foothold with capture-point correction:
    ///
    /// ```text
    /// hip_td = hip + v * T_swing
    /// kv     = cp_gain * sqrt(h / g)
    /// target = hip_td + v * T_stance / 2 + kv * (v - v_des)
    /// ```
    ///
    /// clamped to `max_reach` around the current hip and placed at
    /// `ground_height`.
    pub fn raibert_target(
        &self,
        hip: &Vector3<f64>,
        body_velocity: &Vector3<f64>,
        desired_velocity: &Vector3<f64>,
        (stance_duration, swing_duration): (f64, f64),
        ground_height: f64,
    ) -> Vector3<f64> {
        let body_height = hip.z - ground_height;
        let hip_at_touchdown = hip + body_velocity * swing_duration;
        let symmetry = body_velocity * (0.5 * stance_duration);
        let kv = self.cp_gain * (body_height / self.gravity).max(0.0).sqrt();
        let correction = (body_velocity - desired_velocity) * kv;

        let mut target = hip_at_touchdown + symmetry + correction;
        let reach = (target - hip).xy();
        let distance = reach.norm();
        if distance > self.max_reach {
            let scaled = reach * (self.max_reach / distance);
            target.x = hip.x + scaled.x;
            target.y = hip.y + scaled.y;
        }
        target.z = ground_height;
        target
    }
}

pub struct DynamicGaitPlacement {
    config: FootholdConfig,
    max_step_length: f64,
    plans: LegPlans,
}

impl DynamicGaitPlacement {
    pub fn new(
        config: &FootholdConfig,
        gait: &GaitScheduler,
        validator: Box<dyn FootholdValidator>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let handshake = ValidationHandshake::new(
            validator,
            config.watchdog(gait.nominal_stance_duration()),
            config.abandon_swing_phase,
        );
        Ok(Self {
            config: config.clone(),
            max_step_length: config.step_limit()?,
            plans: LegPlans::new(handshake),
        })
    }
}

impl FootPlacement for DynamicGaitPlacement {
    fn initialize(&mut self, ctx: &mut PlanningContext<'_>) -> Result<(), TerrainError> {
        self.plans.reset();
        LegPlans::record_liftoff_snapshots(ctx)?;
        ctx.support.seed_footholds(ctx.legs);
        Ok(())
    }

    fn advance(
        &mut self,
        ctx: &mut PlanningContext<'_>,
    ) -> Result<LegTable<Option<FootTarget>>, TerrainError> {
        LegPlans::record_liftoff_snapshots(ctx)?;
        self.plans.handle_touchdowns(ctx);
        LegPlans::release_next_leg(ctx);

        if ctx.support.swing_foot_changed() && ctx.walk.go_to_stand {
            LegPlans::enter_stand(ctx);
        }

        for leg in LegId::ALL {
            let lifting = ctx.transitions[leg].is_some_and(|t| t.is_liftoff());
            let unplanned = self.plans.handshake.record(leg).is_none();
            if ctx.legs[leg].is_swinging() && (lifting || unplanned) {
                self.generate_foothold(leg, ctx)?;
            }
        }

        self.plans.poll_validation(ctx);
        self.plans.dispatch(ctx, &self.config, SwingEasing::Bezier)
    }

    fn generate_foothold(
        &mut self,
        leg: LegId,
        ctx: &mut PlanningContext<'_>,
    ) -> Result<Foothold, TerrainError> {
        let state = &ctx.legs[leg];
        let hip = state.measurement.hip_world;
        let start = ctx.terrain.on_terrain(&state.liftoff.foot_world)?;
        let ground = ctx.terrain.on_terrain(&hip)?.z;
        let desired = ctx.torso.control_orientation() * ctx.command.linear_velocity;

        let target = self.config.dynamic.raibert_target(
            &hip,
            &ctx.torso.linear_velocity,
            &desired,
            (ctx.gait.stance_duration(leg), ctx.gait.swing_duration(leg)),
            ground,
        );
        let position = ctx
            .terrain
            .on_terrain(&clamp_step(&start, &target, self.max_step_length))?;

        ctx.support
            .set_safety_delta(SafetyDeltaMode::from_heading_velocity(
                ctx.command.linear_velocity.x,
            ));
        let foothold = Foothold {
            leg,
            candidate: position,
            validated: position,
            step_number: self.plans.next_step_number(),
        };
        info!(
            "{leg}: liftoff foothold #{} at ({:.3}, {:.3}, {:.3})",
            foothold.step_number, position.x, position.y, position.z
        );
        self.plans.open(foothold, ctx.support);
        Ok(foothold)
    }

    fn load_parameters(
        &mut self,
        config: &FootholdConfig,
        gait: &GaitScheduler,
    ) -> Result<(), ConfigError> {
        config.validate()?;
        self.max_step_length = config.step_limit()?;
        self.plans.handshake.set_limits(
            config.watchdog(gait.nominal_stance_duration()),
            config.abandon_swing_phase,
        );
        self.config = config.clone();
        Ok(())
    }

    fn foothold(&self, leg: LegId) -> Option<&FootholdRecord> {
        self.plans.handshake.record(leg)
    }

    fn swing_trajectory(&self, leg: LegId) -> Option<&SwingTrajectoryState> {
        self.plans.swings[leg].as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config() -> DynamicGaitConfig {
        DynamicGaitConfig::default()
    }

    #[test]
    fn stationary_target_under_hip() {
        let hip = Vector3::new(0.15, 0.08, 0.35);
        let target = config().raibert_target(
            &hip,
            &Vector3::zeros(),
            &Vector3::zeros(),
            (0.2, 0.2),
            0.0,
        );
        assert_relative_eq!(target, Vector3::new(0.15, 0.08, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn capture_point_correction() {
        let hip = Vector3::new(0.15, 0.08, 0.32);
        let cfg = config();
        let target = cfg.raibert_target(
            &hip,
            &Vector3::new(0.5, 0.0, 0.0),
            &Vector3::new(0.3, 0.0, 0.0),
            (0.2, 0.2),
            0.0,
        );
        let kv = cfg.cp_gain * (0.32_f64 / cfg.gravity).sqrt();
        // hip + v * T_swing + v * T_stance / 2 + kv * dv
        assert_relative_eq!(target.x, 0.15 + 0.1 + 0.05 + kv * 0.2, epsilon = 1e-12);
    }

    #[test]
    fn target_clamped_to_reach() {
        let hip = Vector3::new(0.0, 0.0, 0.35);
        let cfg = DynamicGaitConfig {
            max_reach: 0.2,
            ..config()
        };
        let target = cfg.raibert_target(
            &hip,
            &Vector3::new(5.0, 0.0, 0.0),
            &Vector3::zeros(),
            (0.2, 0.2),
            0.05,
        );
        assert_relative_eq!((target - hip).xy().norm(), 0.2, epsilon = 1e-12);
        assert_relative_eq!(target.z, 0.05);
    }

    #[test]
    fn higher_body_corrects_more() {
        let cfg = config();
        let low = cfg.raibert_target(
            &Vector3::new(0.0, 0.0, 0.2),
            &Vector3::new(0.2, 0.0, 0.0),
            &Vector3::zeros(),
            (0.2, 0.2),
            0.0,
        );
        let high = cfg.raibert_target(
            &Vector3::new(0.0, 0.0, 0.4),
            &Vector3::new(0.2, 0.0, 0.0),
            &Vector3::zeros(),
            (0.2, 0.2),
            0.0,
        );
        assert!(high.x > low.x);
    }

    #[test]
    fn rejects_non_positive_reach() {
        let cfg = DynamicGaitConfig {
            max_reach: 0.0,
            ..config()
        };
        assert!(cfg.validate().is_err());
    }
}
