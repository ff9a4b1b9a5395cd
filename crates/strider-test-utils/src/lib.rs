//! Shared test fixtures and utilities for strider crates.
//!
//! Provides the nominal standing posture used across planner tests, mock
//! collaborators (validator, terrain, kinematics) and a kinematic quadruped
//! that closes the loop around a [`strider_planner::LocomotionController`].

pub mod mocks;
pub mod sim;
pub mod stance;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use mocks::{IdentityKinematics, NoNormalTerrain, ScriptedValidator, ValidatorScript};
pub use sim::KinematicQuadruped;
pub use stance::{NOMINAL_HEIGHT, nominal_stance};
