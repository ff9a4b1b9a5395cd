//! Locomotion controller: one ordered planning pass per control tick.
//!
//! ```text
//! GaitScheduler -> LegStateMachine -> SupportPolygonController
//!               -> FootPlacement -> TorsoPoseSynthesizer -> LegKinematics
//! ```

use log::{info, warn};
use nalgebra::Vector3;
use strider_core::{
    FootTarget, LegId, LegKinematics, LegTable, MotionCommand, Pose, SensedState, StriderError,
    TerrainModel,
};

use crate::config::LocomotionConfig;
use crate::foothold::{
    DynamicGaitPlacement, FootPlacement, FootholdConfig, FootholdRecord, FootholdValidator,
    PlacementKind, PlanningContext, StaticGaitPlacement, SwingTrajectoryState, WalkRequest,
};
use crate::gait::GaitScheduler;
use crate::leg::LegRuntimeState;
use crate::state_machine::{LegMode, LegStateMachine, Transition};
use crate::support_polygon::{SafetyDeltaMode, SupportPolygonController};
use crate::torso::TorsoPoseSynthesizer;

/// Result of one control tick.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlOutput {
    pub stride_phase: f64,
    pub torso_pose: Pose,
    pub com_target: Vector3<f64>,
    /// Desired foot positions in world frame.
    pub foot_targets: LegTable<Option<FootTarget>>,
    /// Desired joint positions; `None` when no target or unreachable.
    pub joint_targets: LegTable<Option<Vector3<f64>>>,
}

pub struct LocomotionController {
    config: LocomotionConfig,
    terrain: Box<dyn TerrainModel>,
    kinematics: Box<dyn LegKinematics>,
    gait: GaitScheduler,
    machines: LegTable<LegStateMachine>,
    legs: LegTable<LegRuntimeState>,
    support: SupportPolygonController,
    placement: Box<dyn FootPlacement>,
    torso: TorsoPoseSynthesizer,
    command: MotionCommand,
    walk: WalkRequest,
    ticks: u64,
}

impl LocomotionController {
    /// Build and initialize the controller from the sensed state at startup.
    /// All legs start in stand configuration.
    pub fn new(
        config: LocomotionConfig,
        terrain: Box<dyn TerrainModel>,
        kinematics: Box<dyn LegKinematics>,
        validator: Box<dyn FootholdValidator>,
        sensed: &SensedState,
    ) -> Result<Self, StriderError> {
        config.validate()?;
        let gait = GaitScheduler::new(config.gait.clone());
        let legs = LegRuntimeState::table(sensed);
        let machines =
            LegTable::from_fn(|leg| LegStateMachine::new(leg, sensed.legs[leg].grounded));
        let support = SupportPolygonController::new(config.support_polygon.clone(), &legs);
        let placement: Box<dyn FootPlacement> = match config.placement {
            PlacementKind::StaticGait => Box::new(StaticGaitPlacement::new(
                &config.foothold,
                &gait,
                validator,
            )?),
            PlacementKind::DynamicGait => Box::new(DynamicGaitPlacement::new(
                &config.foothold,
                &gait,
                validator,
            )?),
        };
        let mut torso = TorsoPoseSynthesizer::new(config.torso.clone());
        torso.initialize(&legs)?;

        let mut controller = Self {
            config,
            terrain,
            kinematics,
            gait,
            machines,
            legs,
            support,
            placement,
            torso,
            command: MotionCommand::default(),
            walk: WalkRequest::default(),
            ticks: 0,
        };
        let modes = controller.modes();
        let transitions = LegTable::default();
        let mut ctx = PlanningContext {
            dt: 0.0,
            legs: &mut controller.legs,
            modes: &modes,
            transitions: &transitions,
            torso: &sensed.torso,
            command: &controller.command,
            terrain: controller.terrain.as_ref(),
            support: &mut controller.support,
            gait: &controller.gait,
            walk: controller.walk,
        };
        controller.placement.initialize(&mut ctx)?;
        info!("locomotion controller ready ({:?})", controller.config.placement);
        Ok(controller)
    }

    /// Run one control tick of `dt` seconds.
    pub fn tick(&mut self, dt: f64, sensed: &SensedState) -> Result<ControlOutput, StriderError> {
        self.gait.advance(dt);
        for (leg, state) in self.legs.iter_mut() {
            state.update(
                sensed.legs[leg],
                self.gait.stance_phase(leg),
                self.gait.swing_phase(leg),
            );
        }

        let transitions: LegTable<Option<Transition>> =
            LegTable::from_fn(|leg| self.machines[leg].update(&self.legs[leg]));
        let modes = self.modes();

        self.support.update(&self.legs);

        let mut ctx = PlanningContext {
            dt,
            legs: &mut self.legs,
            modes: &modes,
            transitions: &transitions,
            torso: &sensed.torso,
            command: &self.command,
            terrain: self.terrain.as_ref(),
            support: &mut self.support,
            gait: &self.gait,
            walk: self.walk,
        };
        let mut foot_targets = self.placement.advance(&mut ctx)?;

        // Stand configuration may have changed during placement.
        let com_target = self.support.compute_safe_com_target(&self.legs);
        let torso_pose = self.torso.advance(
            self.gait.stride_phase(),
            &com_target,
            &self.legs,
            &sensed.torso,
            self.terrain.as_ref(),
            &mut foot_targets,
        )?;

        let joint_targets = foot_targets.map(|leg, target| {
            let target = target?;
            let foot_in_base = sensed.torso.world_to_base(&target.position);
            let joints = self.kinematics.joint_positions(leg, &foot_in_base);
            if joints.is_none() {
                warn!("{leg}: foot target out of reach {foot_in_base:?}");
            }
            joints
        });

        self.ticks += 1;
        Ok(ControlOutput {
            stride_phase: self.gait.stride_phase(),
            torso_pose,
            com_target,
            foot_targets,
            joint_targets,
        })
    }

    /// Set the commanded base motion. Gait timing follows from the next stride.
    pub fn set_velocity(&mut self, command: MotionCommand) {
        self.command = command;
        self.gait.set_velocity(command.speed());
    }

    pub fn set_safety_delta(&mut self, mode: SafetyDeltaMode) {
        self.support.set_safety_delta(mode);
    }

    /// Return to stand configuration at the next swing-leg change.
    pub fn go_to_stand(&mut self) {
        info!("go to stand requested");
        self.walk = WalkRequest {
            resume_walking: false,
            go_to_stand: true,
        };
    }

    /// Start (or resume) walking from stand configuration.
    pub fn resume_walking(&mut self) {
        info!("resume walking requested");
        self.walk = WalkRequest {
            resume_walking: true,
            go_to_stand: false,
        };
        self.support.rearm();
    }

    /// Replace the foothold parameters at runtime.
    pub fn load_foothold_parameters(
        &mut self,
        config: FootholdConfig,
    ) -> Result<(), StriderError> {
        self.placement.load_parameters(&config, &self.gait)?;
        self.config.foothold = config;
        Ok(())
    }

    pub fn config(&self) -> &LocomotionConfig {
        &self.config
    }

    pub fn gait(&self) -> &GaitScheduler {
        &self.gait
    }

    pub fn legs(&self) -> &LegTable<LegRuntimeState> {
        &self.legs
    }

    pub fn support(&self) -> &SupportPolygonController {
        &self.support
    }

    pub fn torso(&self) -> &TorsoPoseSynthesizer {
        &self.torso
    }

    pub fn command(&self) -> &MotionCommand {
        &self.command
    }

    pub fn mode(&self, leg: LegId) -> LegMode {
        self.machines[leg].mode()
    }

    pub fn foothold(&self, leg: LegId) -> Option<&FootholdRecord> {
        self.placement.foothold(leg)
    }

    pub fn swing_trajectory(&self, leg: LegId) -> Option<&SwingTrajectoryState> {
        self.placement.swing_trajectory(leg)
    }

    pub fn is_walking(&self) -> bool {
        self.legs.values().any(|leg| !leg.in_stand_configuration)
    }

    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    fn modes(&self) -> LegTable<LegMode> {
        LegTable::from_fn(|leg| self.machines[leg].mode())
    }
}
