//! Terrain collaborator.
//!
//! The planner only reads terrain through [`TerrainModel`]: a height query
//! below a point, a surface normal query, and a slope/roll estimate used by
//! the torso. Implementations must be cheap enough to be queried several
//! times per control tick.

use nalgebra::{Unit, UnitVector3, Vector3};

use crate::error::TerrainError;

/// Source of terrain geometry.
pub trait TerrainModel {
    /// Terrain height (world z) below the horizontal coordinates of `position`.
    fn height_at(&self, position: &Vector3<f64>) -> Option<f64>;

    /// Unit surface normal at the horizontal coordinates of `position`.
    fn normal_at(&self, position: &Vector3<f64>) -> Option<UnitVector3<f64>>;

    /// Estimated terrain inclination along the heading axis (rad, positive uphill).
    fn slope_angle(&self) -> f64 {
        0.0
    }

    /// Estimated terrain inclination along the lateral axis (rad, positive
    /// when the terrain rises to the left).
    fn roll_angle(&self) -> f64 {
        0.0
    }

    /// Replace `position.z` with the terrain height below it.
    fn snap_height(&self, position: &mut Vector3<f64>) -> Result<(), TerrainError> {
        let height = self
            .height_at(position)
            .ok_or(TerrainError::HeightUnavailable {
                x: position.x,
                y: position.y,
            })?;
        position.z = height;
        Ok(())
    }

    /// Copy of `position` snapped onto the terrain.
    fn on_terrain(&self, position: &Vector3<f64>) -> Result<Vector3<f64>, TerrainError> {
        let mut snapped = *position;
        self.snap_height(&mut snapped)?;
        Ok(snapped)
    }

    /// Surface normal, failing with [`TerrainError::NormalUnavailable`].
    fn surface_normal(&self, position: &Vector3<f64>) -> Result<UnitVector3<f64>, TerrainError> {
        self.normal_at(position)
            .ok_or(TerrainError::NormalUnavailable {
                x: position.x,
                y: position.y,
            })
    }
}

// ---------------------------------------------------------------------------
// HorizontalPlane
// ---------------------------------------------------------------------------

/// Flat, level ground at a fixed height.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct HorizontalPlane {
    height: f64,
}

impl HorizontalPlane {
    pub const fn new(height: f64) -> Self {
        Self { height }
    }

    pub const fn height(&self) -> f64 {
        self.height
    }

    pub fn set_height(&mut self, height: f64) {
        self.height = height;
    }
}

impl TerrainModel for HorizontalPlane {
    fn height_at(&self, _position: &Vector3<f64>) -> Option<f64> {
        Some(self.height)
    }

    fn normal_at(&self, _position: &Vector3<f64>) -> Option<UnitVector3<f64>> {
        Some(Vector3::z_axis())
    }
}

// ---------------------------------------------------------------------------
// InclinedPlane
// ---------------------------------------------------------------------------

/// Planar terrain through `point` with surface normal `normal`, e.g. a plane
/// fitted to the last footholds by a terrain perception module.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InclinedPlane {
    point: Vector3<f64>,
    normal: UnitVector3<f64>,
}

impl InclinedPlane {
    /// Minimum vertical component of the normal for the plane to be walkable.
    const MIN_NORMAL_Z: f64 = 1e-3;

    /// Returns `None` for vertical or downward-facing planes.
    pub fn new(point: Vector3<f64>, normal: Vector3<f64>) -> Option<Self> {
        let normal = Unit::try_new(normal, 1e-12)?;
        (normal.z > Self::MIN_NORMAL_Z).then_some(Self { point, normal })
    }

    /// Plane through `point` rising by `slope` (rad) along world x and by
    /// `roll` (rad) along world y.
    pub fn from_angles(point: Vector3<f64>, slope: f64, roll: f64) -> Option<Self> {
        Self::new(point, Vector3::new(-slope.tan(), -roll.tan(), 1.0))
    }

    pub fn normal(&self) -> UnitVector3<f64> {
        self.normal
    }
}

impl TerrainModel for InclinedPlane {
    fn height_at(&self, position: &Vector3<f64>) -> Option<f64> {
        let n = self.normal;
        let dx = position.x - self.point.x;
        let dy = position.y - self.point.y;
        Some(self.point.z - (n.x * dx + n.y * dy) / n.z)
    }

    fn normal_at(&self, _position: &Vector3<f64>) -> Option<UnitVector3<f64>> {
        Some(self.normal)
    }

    fn slope_angle(&self) -> f64 {
        (-self.normal.x).atan2(self.normal.z)
    }

    fn roll_angle(&self) -> f64 {
        (-self.normal.y).atan2(self.normal.z)
    }
}
