//! Real-time locomotion planning for quadrupeds on terrain.
//!
//! Every control tick the [`LocomotionController`] runs one ordered pass:
//!
//! 1. **Gait scheduler** advances the stride phase and per-leg stance/swing phases
//! 2. **Leg state machines** classify each leg (swing, late liftoff, slipping, lost contact)
//! 3. **Support polygon** tracks the swing sequence and computes a safe CoM target
//! 4. **Foot placement** picks footholds, validates them and drives swing feet
//! 5. **Torso pose** derives height and orientation from terrain and leg clearances
//!
//! Foot targets are converted to joint targets by a [`strider_core::LegKinematics`]
//! collaborator. Terrain is queried through [`strider_core::TerrainModel`], and
//! footholds may be checked by an external [`FootholdValidator`].

pub mod config;
pub mod controller;
pub mod curve;
pub mod foothold;
pub mod gait;
pub mod leg;
pub mod state_machine;
pub mod support_polygon;
pub mod torso;

pub use config::LocomotionConfig;
pub use controller::{ControlOutput, LocomotionController};
pub use curve::{KnotCurve, PeriodicCurve};
pub use foothold::{
    DynamicGaitConfig, DynamicGaitPlacement, FootPlacement, Foothold, FootholdConfig,
    FootholdRecord, FootholdStatus, FootholdValidator, NoValidation, PlacementKind,
    StaticGaitPlacement, SwingEasing, SwingTrajectoryState, ValidationOutcome, ValidationRequest,
    ValidationResponse, WalkRequest,
};
pub use gait::{GaitConfig, GaitScheduler, GaitTiming, ScheduledParameter, VelocityLaw};
pub use leg::{LegRuntimeState, LiftoffSnapshot, TouchdownSnapshot};
pub use state_machine::{LegAction, LegMode, LegStateMachine, Transition};
pub use support_polygon::{SafetyDeltaMode, SupportPolygonConfig, SupportPolygonController};
pub use torso::{TorsoConfig, TorsoPoseSynthesizer};
