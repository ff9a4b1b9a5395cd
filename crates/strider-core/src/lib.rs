// strider-core: Leg identities, sensed state, collaborators, errors and rotation math
// for the strider locomotion planner.

pub mod error;
pub mod kinematics;
pub mod rotation;
pub mod terrain;
pub mod types;

pub use error::{ConfigError, StriderError, TerrainError};
pub use kinematics::LegKinematics;
pub use rotation::{decompose_rotation, heading_of, safe_acos};
pub use terrain::{HorizontalPlane, InclinedPlane, TerrainModel};
pub use types::{
    FootTarget, LegId, LegMeasurement, LegTable, MotionCommand, Pose, SensedState, TargetSource,
    TorsoMeasurement,
};
