//! Foothold planning.
//!
//! A [`FootPlacement`] decides where each swing leg lands, drives the swing
//! foot along its trajectory and lowers stance feet that lost contact. Two
//! variants share the interface: [`StaticGaitPlacement`] plans the next
//! swing leg's foothold while it is still in stance (crawl gait), and
//! [`DynamicGaitPlacement`] plans at liftoff with a capture-point heuristic.

pub mod dynamic_gait;
pub mod static_gait;
pub mod swing;
pub mod validation;

use log::{debug, info};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use strider_core::{
    ConfigError, FootTarget, LegId, LegTable, MotionCommand, TargetSource, TerrainError,
    TerrainModel, TorsoMeasurement,
};

pub use dynamic_gait::{DynamicGaitConfig, DynamicGaitPlacement};
pub use static_gait::StaticGaitPlacement;
pub use swing::{SwingEasing, SwingTrajectoryState};
pub use validation::{
    Foothold, FootholdRecord, FootholdStatus, FootholdValidator, HandshakePhase, NoValidation,
    ValidationHandshake, ValidationOutcome, ValidationRequest, ValidationResponse,
};

use crate::curve::KnotCurve;
use crate::gait::GaitScheduler;
use crate::leg::LegRuntimeState;
use crate::state_machine::{LegAction, LegMode, Transition};
use crate::support_polygon::SupportPolygonController;

/// Stance phase below which the next swing leg may leave stand configuration.
const RELEASE_STANCE_PHASE: f64 = 0.9;

/// Swing phase below which a still-grounded foot keeps refreshing its
/// liftoff snapshot.
const LATE_LIFTOFF_SWING_PHASE: f64 = 0.25;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementKind {
    #[default]
    StaticGait,
    DynamicGait,
}

const fn default_stance_offsets() -> LegTable<[f64; 2]> {
    LegTable::new([[0.25, 0.18], [0.25, -0.18], [-0.25, 0.18], [-0.25, -0.18]])
}
const fn default_feedback_gain() -> f64 {
    0.5
}
const fn default_swing_height() -> f64 {
    0.08
}
const fn default_regain_step() -> f64 {
    0.01
}
const fn default_abandon_swing_phase() -> f64 {
    0.8
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FootholdConfig {
    /// Maximum horizontal step from the liftoff position (m). Required.
    #[serde(default)]
    pub max_step_length: Option<f64>,
    /// Default foot positions relative to the feet centroid, in the control
    /// frame (x forward, y left).
    #[serde(default = "default_stance_offsets")]
    pub default_stance_offsets: LegTable<[f64; 2]>,
    /// Step offset per unit of commanded heading velocity (s).
    #[serde(default = "default_feedback_gain")]
    pub heading_gain: f64,
    /// Extra attenuation of the heading term when walking backward.
    #[serde(default = "default_feedback_gain")]
    pub backward_attenuation: f64,
    /// Step offset per unit of commanded lateral velocity (s).
    #[serde(default = "default_feedback_gain")]
    pub lateral_gain: f64,
    /// Peak swing height along the terrain normal (m).
    #[serde(default = "default_swing_height")]
    pub swing_height: f64,
    #[serde(default)]
    pub easing: SwingEasing,
    /// Swing phase to interpolation parameter.
    #[serde(default)]
    pub swing_profile: KnotCurve,
    /// Per-tick lowering of a foot regaining contact (m).
    #[serde(default = "default_regain_step")]
    pub regain_step: f64,
    /// Swing phase at which a pending validation is abandoned.
    #[serde(default = "default_abandon_swing_phase")]
    pub abandon_swing_phase: f64,
    /// Validation watchdog (s). Defaults to half the nominal stance duration.
    #[serde(default)]
    pub validation_timeout: Option<f64>,
    #[serde(default)]
    pub dynamic: DynamicGaitConfig,
}

impl Default for FootholdConfig {
    fn default() -> Self {
        Self {
            max_step_length: None,
            default_stance_offsets: default_stance_offsets(),
            heading_gain: default_feedback_gain(),
            backward_attenuation: default_feedback_gain(),
            lateral_gain: default_feedback_gain(),
            swing_height: default_swing_height(),
            easing: SwingEasing::default(),
            swing_profile: KnotCurve::default(),
            regain_step: default_regain_step(),
            abandon_swing_phase: default_abandon_swing_phase(),
            validation_timeout: None,
            dynamic: DynamicGaitConfig::default(),
        }
    }
}

impl FootholdConfig {
    /// Validated maximum step length.
    pub fn step_limit(&self) -> Result<f64, ConfigError> {
        match self.max_step_length {
            None => Err(ConfigError::MissingField("foothold.max_step_length".into())),
            Some(length) if length <= 0.0 => Err(ConfigError::invalid(
                "foothold.max_step_length",
                format!("{length} must be positive"),
            )),
            Some(length) => Ok(length),
        }
    }

    /// Watchdog duration for a gait with the given nominal stance duration.
    pub fn watchdog(&self, nominal_stance_duration: f64) -> f64 {
        self.validation_timeout
            .unwrap_or(0.5 * nominal_stance_duration)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.step_limit()?;
        for (field, value) in [
            ("foothold.heading_gain", self.heading_gain),
            ("foothold.backward_attenuation", self.backward_attenuation),
            ("foothold.lateral_gain", self.lateral_gain),
            ("foothold.swing_height", self.swing_height),
        ] {
            if value < 0.0 {
                return Err(ConfigError::invalid(field, format!("{value} is negative")));
            }
        }
        if self.regain_step <= 0.0 {
            return Err(ConfigError::invalid(
                "foothold.regain_step",
                "must be positive",
            ));
        }
        if !(self.abandon_swing_phase > 0.0 && self.abandon_swing_phase <= 1.0) {
            return Err(ConfigError::invalid(
                "foothold.abandon_swing_phase",
                "must be in (0, 1]",
            ));
        }
        if self.validation_timeout.is_some_and(|t| t <= 0.0) {
            return Err(ConfigError::invalid(
                "foothold.validation_timeout",
                "must be positive",
            ));
        }
        self.swing_profile.validate("foothold.swing_profile")?;
        self.dynamic.validate()
    }
}

// ---------------------------------------------------------------------------
// Planning interface
// ---------------------------------------------------------------------------

/// Stand/walk requests forwarded by the controller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WalkRequest {
    pub resume_walking: bool,
    pub go_to_stand: bool,
}

/// Everything a foot placement reads or updates during one tick.
pub struct PlanningContext<'a> {
    pub dt: f64,
    pub legs: &'a mut LegTable<LegRuntimeState>,
    pub modes: &'a LegTable<LegMode>,
    pub transitions: &'a LegTable<Option<Transition>>,
    pub torso: &'a TorsoMeasurement,
    pub command: &'a MotionCommand,
    pub terrain: &'a dyn TerrainModel,
    pub support: &'a mut SupportPolygonController,
    pub gait: &'a GaitScheduler,
    pub walk: WalkRequest,
}

impl PlanningContext<'_> {
    /// Swing phase per leg, -1 for legs held in stand configuration.
    pub fn swing_phases(&self) -> LegTable<f64> {
        LegTable::from_fn(|leg| {
            if self.legs[leg].is_swinging() {
                self.legs[leg].swing_phase
            } else {
                -1.0
            }
        })
    }
}

/// Foot placement strategy.
pub trait FootPlacement {
    /// Reset all plans from the current sensed state.
    fn initialize(&mut self, ctx: &mut PlanningContext<'_>) -> Result<(), TerrainError>;

    /// Run one tick. Returns the foot targets produced by this stage; legs
    /// without a target are held by the torso stage.
    fn advance(
        &mut self,
        ctx: &mut PlanningContext<'_>,
    ) -> Result<LegTable<Option<FootTarget>>, TerrainError>;

    /// Generate and register a new foothold for `leg`.
    fn generate_foothold(
        &mut self,
        leg: LegId,
        ctx: &mut PlanningContext<'_>,
    ) -> Result<Foothold, TerrainError>;

    /// Apply new parameters. `gait` sizes the validation watchdog.
    fn load_parameters(
        &mut self,
        config: &FootholdConfig,
        gait: &GaitScheduler,
    ) -> Result<(), ConfigError>;

    /// Current foothold record of `leg`.
    fn foothold(&self, leg: LegId) -> Option<&FootholdRecord>;

    /// Active swing trajectory of `leg`.
    fn swing_trajectory(&self, leg: LegId) -> Option<&SwingTrajectoryState>;
}

/// Clamp the horizontal displacement from `start` to `max_length`,
/// preserving its direction. The vertical component is left untouched.
pub fn clamp_step(start: &Vector3<f64>, candidate: &Vector3<f64>, max_length: f64) -> Vector3<f64> {
    let step = (candidate - start).xy();
    let length = step.norm();
    if length <= max_length {
        return *candidate;
    }
    let clamped = step * (max_length / length);
    Vector3::new(start.x + clamped.x, start.y + clamped.y, candidate.z)
}

// ---------------------------------------------------------------------------
// Shared per-leg plans
// ---------------------------------------------------------------------------

/// Per-leg plans owned by a foot placement and threaded through its stages.
pub(crate) struct LegPlans {
    pub handshake: ValidationHandshake,
    pub swings: LegTable<Option<SwingTrajectoryState>>,
    pub regains: LegTable<Option<Vector3<f64>>>,
    /// A swing-leg edge was seen and not yet acted on.
    pub edge_pending: bool,
    pub step_number: u64,
}

impl LegPlans {
    pub fn new(handshake: ValidationHandshake) -> Self {
        Self {
            handshake,
            swings: LegTable::default(),
            regains: LegTable::default(),
            edge_pending: false,
            step_number: 0,
        }
    }

    pub fn reset(&mut self) {
        for leg in LegId::ALL {
            self.handshake.close(leg);
        }
        self.swings = LegTable::default();
        self.regains = LegTable::default();
        self.edge_pending = false;
    }

    pub fn next_step_number(&mut self) -> u64 {
        self.step_number += 1;
        self.step_number
    }

    /// Refresh liftoff snapshots of feet that are (or still are) on the ground.
    pub fn record_liftoff_snapshots(ctx: &mut PlanningContext<'_>) -> Result<(), TerrainError> {
        for (_, state) in ctx.legs.iter_mut() {
            let late_liftoff = state.is_grounded()
                && state.swing_phase >= 0.0
                && state.swing_phase < LATE_LIFTOFF_SWING_PHASE;
            if state.is_scheduled_stance() || late_liftoff {
                state.liftoff.foot_world = state.foot();
                state.liftoff.hip_world = state.measurement.hip_world;
                state.liftoff.hip_on_terrain = ctx.terrain.on_terrain(&state.measurement.hip_world)?;
            }
        }
        Ok(())
    }

    /// Record touchdown snapshots and finalize the landed footholds.
    pub fn handle_touchdowns(&mut self, ctx: &mut PlanningContext<'_>) {
        for leg in LegId::ALL {
            if !ctx.transitions[leg].is_some_and(|t| t.is_touchdown()) {
                continue;
            }
            let state = &mut ctx.legs[leg];
            let record = self.handshake.close(leg);
            let error = record.map(|r| (state.foot() - r.foothold.validated).xy().norm());
            state.touchdown.foot_world = state.foot();
            state.touchdown.foothold_error = error;
            self.swings[leg] = None;
            match error {
                Some(error) => info!("{leg}: touchdown {error:.3} m from planned foothold"),
                None => debug!("{leg}: touchdown without planned foothold"),
            }
        }
    }

    /// While resuming, let the next swing leg leave stand configuration.
    pub fn release_next_leg(ctx: &mut PlanningContext<'_>) {
        if !ctx.walk.resume_walking || !ctx.support.is_safe_to_resume_walking() {
            return;
        }
        let next = ctx.support.next_swing_leg();
        let state = &mut ctx.legs[next];
        if state.in_stand_configuration
            && (0.0..RELEASE_STANCE_PHASE).contains(&state.stance_phase)
        {
            state.in_stand_configuration = false;
            info!("{next}: leaving stand configuration");
        }
    }

    /// Put every leg back in stand configuration.
    pub fn enter_stand(ctx: &mut PlanningContext<'_>) {
        for (_, state) in ctx.legs.iter_mut() {
            state.in_stand_configuration = true;
        }
        ctx.support.seed_footholds(ctx.legs);
        info!("all legs in stand configuration");
    }

    /// Register a freshly generated foothold with the validation handshake.
    pub fn open(&mut self, foothold: Foothold, support: &mut SupportPolygonController) {
        if let Some(position) = self.handshake.open(foothold) {
            support.set_foothold(foothold.leg, position);
        }
    }

    pub fn poll_validation(&mut self, ctx: &mut PlanningContext<'_>) {
        let phases = ctx.swing_phases();
        for foothold in self.handshake.poll(ctx.dt, &phases) {
            ctx.support.set_foothold(foothold.leg, foothold.validated);
        }
    }

    /// Lower the foot of `leg` by `step` along the terrain normal. The target
    /// accumulates from the foot position measured on entry.
    pub fn regain_contact(
        &mut self,
        leg: LegId,
        ctx: &PlanningContext<'_>,
        step: f64,
    ) -> Result<Vector3<f64>, TerrainError> {
        let entering = ctx.transitions[leg].is_some_and(|t| t.starts_contact_regain());
        let start = match self.regains[leg] {
            Some(target) if !entering => target,
            _ => ctx.legs[leg].foot(),
        };
        let normal = ctx.terrain.surface_normal(&start)?;
        let target = start - normal.into_inner() * step;
        self.regains[leg] = Some(target);
        Ok(target)
    }

    /// Sample the swing trajectory of `leg`, starting it if needed.
    pub fn follow_swing(
        &mut self,
        leg: LegId,
        ctx: &PlanningContext<'_>,
        parameter: f64,
        easing: SwingEasing,
        swing_height: f64,
    ) -> Result<Vector3<f64>, TerrainError> {
        let start = ctx.legs[leg].liftoff.foot_world;
        let target = self.handshake.record(leg).and_then(FootholdRecord::resolved_target);
        let swing = self.swings[leg].get_or_insert_with(|| SwingTrajectoryState::new(start));
        swing.sample(parameter, target, easing, swing_height, ctx.terrain)
    }

    /// Run the per-mode branch of every walking leg.
    pub fn dispatch(
        &mut self,
        ctx: &PlanningContext<'_>,
        config: &FootholdConfig,
        easing: SwingEasing,
    ) -> Result<LegTable<Option<FootTarget>>, TerrainError> {
        let mut targets = LegTable::default();
        for leg in LegId::ALL {
            if ctx.legs[leg].in_stand_configuration {
                self.regains[leg] = None;
                continue;
            }
            targets[leg] = match ctx.modes[leg].action() {
                LegAction::RegainContact => Some(FootTarget {
                    position: self.regain_contact(leg, ctx, config.regain_step)?,
                    source: TargetSource::RegainContact,
                }),
                LegAction::FollowSwingTrajectory => {
                    self.regains[leg] = None;
                    let parameter = config.swing_profile.evaluate(ctx.legs[leg].swing_phase);
                    Some(FootTarget {
                        position: self.follow_swing(
                            leg,
                            ctx,
                            parameter,
                            easing,
                            config.swing_height,
                        )?,
                        source: TargetSource::Swing,
                    })
                }
                LegAction::Hold => {
                    self.regains[leg] = None;
                    None
                }
            };
        }
        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn clamp_step_preserves_direction() {
        let start = Vector3::new(1.0, 1.0, 0.0);
        let candidate = Vector3::new(1.3, 1.4, 0.2);
        let clamped = clamp_step(&start, &candidate, 0.25);
        let step = (clamped - start).xy();
        assert_relative_eq!(step.norm(), 0.25, epsilon = 1e-12);
        assert_relative_eq!(step.normalize(), (candidate - start).xy().normalize(), epsilon = 1e-12);
        assert_relative_eq!(clamped.z, 0.2);
    }

    #[test]
    fn clamp_step_keeps_short_steps() {
        let start = Vector3::zeros();
        let candidate = Vector3::new(0.05, 0.0, 0.0);
        assert_relative_eq!(clamp_step(&start, &candidate, 0.15), candidate);
    }

    #[test]
    fn missing_max_step_length_is_reported() {
        let err = FootholdConfig::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "foothold.max_step_length"));
    }

    #[test]
    fn watchdog_defaults_to_half_stance() {
        let config = FootholdConfig::default();
        assert_relative_eq!(config.watchdog(1.6), 0.8);
        let config = FootholdConfig {
            validation_timeout: Some(0.2),
            ..FootholdConfig::default()
        };
        assert_relative_eq!(config.watchdog(1.6), 0.2);
    }

    #[test]
    fn offsets_deserialize_from_nested_arrays() {
        let config: FootholdConfig = toml::from_str(
            "max_step_length = 0.2\n\
             default_stance_offsets = [[0.3, 0.2], [0.3, -0.2], [-0.3, 0.2], [-0.3, -0.2]]\n\
             easing = \"bezier\"\n",
        )
        .unwrap();
        assert_relative_eq!(config.default_stance_offsets[LegId::RightHind][1], -0.2);
        assert_eq!(config.easing, SwingEasing::Bezier);
        assert!(config.validate().is_ok());
    }
}
