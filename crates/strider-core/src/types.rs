//! Leg identities, per-leg tables and the sensed/commanded state records
//! exchanged with the planner every control tick.

use std::fmt;
use std::ops::{Index, IndexMut};

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::rotation::heading_of;

// ---------------------------------------------------------------------------
// LegId
// ---------------------------------------------------------------------------

/// Leg of a quadruped.
///
/// The declaration order (LF, RF, LH, RH) is the storage order of
/// [`LegTable`] and is relied upon by the support polygon geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegId {
    LeftFore,
    RightFore,
    LeftHind,
    RightHind,
}

impl LegId {
    /// All legs in storage order.
    pub const ALL: [Self; 4] = [
        Self::LeftFore,
        Self::RightFore,
        Self::LeftHind,
        Self::RightHind,
    ];

    /// Storage index in [0, 4).
    pub const fn index(self) -> usize {
        match self {
            Self::LeftFore => 0,
            Self::RightFore => 1,
            Self::LeftHind => 2,
            Self::RightHind => 3,
        }
    }

    pub const fn is_fore(self) -> bool {
        matches!(self, Self::LeftFore | Self::RightFore)
    }

    pub const fn is_left(self) -> bool {
        matches!(self, Self::LeftFore | Self::LeftHind)
    }

    /// Two-letter tag used on the foothold validation wire.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::LeftFore => "LF",
            Self::RightFore => "RF",
            Self::LeftHind => "LH",
            Self::RightHind => "RH",
        }
    }

    /// Parse a two-letter wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|leg| leg.tag() == tag)
    }
}

impl fmt::Display for LegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ---------------------------------------------------------------------------
// LegTable
// ---------------------------------------------------------------------------

/// Fixed-size table with one entry per leg, indexed by [`LegId`].
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct LegTable<T>([T; 4]);

impl<T> LegTable<T> {
    /// Build from entries in storage order (LF, RF, LH, RH).
    pub const fn new(entries: [T; 4]) -> Self {
        Self(entries)
    }

    /// Build by evaluating `f` for every leg.
    pub fn from_fn(mut f: impl FnMut(LegId) -> T) -> Self {
        Self(std::array::from_fn(|i| f(LegId::ALL[i])))
    }

    /// Iterate `(leg, entry)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (LegId, &T)> {
        LegId::ALL.into_iter().zip(self.0.iter())
    }

    /// Iterate `(leg, entry)` pairs mutably in storage order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (LegId, &mut T)> {
        LegId::ALL.into_iter().zip(self.0.iter_mut())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }

    /// Transform every entry, keeping the leg association.
    pub fn map<U>(self, mut f: impl FnMut(LegId, T) -> U) -> LegTable<U> {
        let mut i = 0;
        LegTable(self.0.map(|entry| {
            let leg = LegId::ALL[i];
            i += 1;
            f(leg, entry)
        }))
    }
}

impl<T: Clone> LegTable<T> {
    /// Table with the same value for every leg.
    pub fn splat(value: T) -> Self {
        Self::from_fn(|_| value.clone())
    }
}

impl<T> Index<LegId> for LegTable<T> {
    type Output = T;

    fn index(&self, leg: LegId) -> &T {
        &self.0[leg.index()]
    }
}

impl<T> IndexMut<LegId> for LegTable<T> {
    fn index_mut(&mut self, leg: LegId) -> &mut T {
        &mut self.0[leg.index()]
    }
}

// ---------------------------------------------------------------------------
// Poses and sensed state
// ---------------------------------------------------------------------------

/// Rigid pose in the world frame.
///
/// `orientation` maps base-frame vectors into the world frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
        }
    }
}

/// Sensed state of a single leg, as reported by the robot model and the
/// contact event detector.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct LegMeasurement {
    /// Foot position in world frame.
    pub foot_world: Vector3<f64>,
    /// Hip position in world frame.
    pub hip_world: Vector3<f64>,
    /// Hip position in base frame (fixed by the robot geometry).
    pub hip_base: Vector3<f64>,
    /// Foot is in contact with the ground.
    pub grounded: bool,
    /// Foot is in contact but slipping.
    pub slipping: bool,
}

/// Sensed torso state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TorsoMeasurement {
    /// Base position in world frame.
    pub position: Vector3<f64>,
    /// Base orientation (base to world).
    pub orientation: UnitQuaternion<f64>,
    /// Linear velocity in world frame.
    pub linear_velocity: Vector3<f64>,
    /// Angular velocity in world frame.
    pub angular_velocity: Vector3<f64>,
}

impl Default for TorsoMeasurement {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
        }
    }
}

impl TorsoMeasurement {
    /// Orientation of the control frame: the heading part of the base
    /// orientation, with pitch and roll removed.
    pub fn control_orientation(&self) -> UnitQuaternion<f64> {
        heading_of(&self.orientation)
    }

    /// Express a world-frame point in the base frame.
    pub fn world_to_base(&self, point_world: &Vector3<f64>) -> Vector3<f64> {
        self.orientation
            .inverse_transform_vector(&(point_world - self.position))
    }
}

/// Everything sensed at the start of a control tick.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct SensedState {
    pub legs: LegTable<LegMeasurement>,
    pub torso: TorsoMeasurement,
}

/// Commanded base motion, expressed in the control (heading) frame.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionCommand {
    /// x = heading velocity, y = lateral velocity (m/s). z is ignored.
    pub linear_velocity: Vector3<f64>,
    /// Angular velocity (rad/s); only z is meaningful for a walking gait.
    pub angular_velocity: Vector3<f64>,
}

impl MotionCommand {
    /// Pure forward/backward command.
    pub fn heading(velocity: f64) -> Self {
        Self {
            linear_velocity: Vector3::new(velocity, 0.0, 0.0),
            angular_velocity: Vector3::zeros(),
        }
    }

    /// Horizontal speed used to index the gait timing laws.
    pub fn speed(&self) -> f64 {
        self.linear_velocity.xy().norm()
    }
}

// ---------------------------------------------------------------------------
// Planner output
// ---------------------------------------------------------------------------

/// Which branch of the planner produced a foot target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetSource {
    /// Interpolated swing trajectory.
    Swing,
    /// Lowering a stance foot that lost contact or slipped.
    RegainContact,
    /// Holding a stance foot (possibly nudged down) under the torso.
    Stance,
}

/// Desired foot position for one leg, handed to the kinematics collaborator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FootTarget {
    /// Desired foot position in world frame.
    pub position: Vector3<f64>,
    pub source: TargetSource,
}
