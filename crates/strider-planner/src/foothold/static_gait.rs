//! Foot placement for the statically stable crawl gait.
//!
//! The foothold of the next swing leg is generated once per swing-leg edge
//! reported by the support polygon, while that leg is still on the ground,
//! so the handshake with an optional validator can complete before liftoff.

use log::{debug, info, warn};
use nalgebra::Vector3;
use strider_core::{ConfigError, FootTarget, LegId, LegTable, TerrainError};

use super::validation::{Foothold, FootholdRecord, FootholdValidator, ValidationHandshake};
use super::{
    FootPlacement, FootholdConfig, LegPlans, PlanningContext, SwingTrajectoryState, clamp_step,
};
use crate::gait::GaitScheduler;
use crate::support_polygon::SafetyDeltaMode;

pub struct StaticGaitPlacement {
    config: FootholdConfig,
    max_step_length: f64,
    plans: LegPlans,
}

impl StaticGaitPlacement {
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

    /// Heuristic foothold: default stance offset around the feet centroid,
    /// velocity feedback, turning compensation and the step length clamp.
    fn plan_foothold(
        &self,
        leg: LegId,
        ctx: &PlanningContext<'_>,
    ) -> Result<Vector3<f64>, TerrainError> {
        let terrain = ctx.terrain;
        let start = terrain.on_terrain(&ctx.legs[leg].liftoff.foot_world)?;
        let center = terrain.on_terrain(&ctx.support.foothold_centroid())?;
        let control = ctx.torso.control_orientation();

        let [ox, oy] = self.config.default_stance_offsets[leg];
        let mut candidate = center + control * Vector3::new(ox, oy, 0.0);

        let velocity = ctx.command.linear_velocity;
        let mut heading = self.config.heading_gain * velocity.x;
        if velocity.x < 0.0 {
            heading *= self.config.backward_attenuation;
        }
        let lateral = self.config.lateral_gain * velocity.y;
        candidate += control * Vector3::new(heading, lateral, 0.0);

        let angular_world = control * ctx.command.angular_velocity;
        candidate += angular_world.cross(&(candidate - center));

        let clamped = clamp_step(&start, &candidate, self.max_step_length);
        if clamped != candidate {
            debug!(
                "{leg}: step clamped from {:.3} m to {:.3} m",
                (candidate - start).xy().norm(),
                self.max_step_length
            );
        }
        terrain.on_terrain(&clamped)
    }
}

impl FootPlacement for StaticGaitPlacement {
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

        if ctx.support.swing_foot_changed() {
            self.plans.edge_pending = true;
        }
        if self.plans.edge_pending {
            if ctx.walk.go_to_stand {
                LegPlans::enter_stand(ctx);
                self.plans.edge_pending = false;
            } else if ctx.walk.resume_walking && ctx.support.is_safe_to_resume_walking() {
                let next = ctx.support.next_swing_leg();
                self.generate_foothold(next, ctx)?;
                self.plans.edge_pending = false;
            }
        }

        self.plans.poll_validation(ctx);

        for leg in LegId::ALL {
            let starts_swing = ctx.legs[leg].is_swinging()
                && self.plans.handshake.record(leg).is_none();
            if starts_swing {
                warn!("{leg}: swing started without a planned foothold");
                self.generate_foothold(leg, ctx)?;
            }
        }

        let easing = self.config.easing;
        self.plans.dispatch(ctx, &self.config, easing)
    }

    fn generate_foothold(
        &mut self,
        leg: LegId,
        ctx: &mut PlanningContext<'_>,
    ) -> Result<Foothold, TerrainError> {
        let position = self.plan_foothold(leg, ctx)?;
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
            "{leg}: foothold #{} at ({:.3}, {:.3}, {:.3})",
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
