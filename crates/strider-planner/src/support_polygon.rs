//! Support polygon tracking and swing-leg sequencing.
//!
//! The controller keeps one foothold per leg, sequences
//! the legs in the fixed crawl order RH, RF, LH, LF and computes a
//! center-of-mass target inside the polygon spanned by the legs that stay on
//! the ground while the next leg swings.
//!
//! A leg's foothold follows its measured foot until the foot placement pushes
//! a planned foothold. From then on it holds the latest validated position,
//! whatever the foot measures, until the footholds are seeded again from
//! measurement on initialization or stand entry.

use log::debug;
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};
use strider_core::{ConfigError, LegId, LegTable};

use crate::leg::LegRuntimeState;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const fn default_delta_forward() -> f64 {
    0.05
}
const fn default_delta_backward() -> f64 {
    0.02
}
const fn default_weight() -> f64 {
    1.0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SupportPolygonConfig {
    /// Safety margin while walking forward (m).
    #[serde(default = "default_delta_forward")]
    pub delta_forward: f64,
    /// Safety margin while walking backward (m).
    #[serde(default = "default_delta_backward")]
    pub delta_backward: f64,
    /// Centroid weight of fore feet.
    #[serde(default = "default_weight")]
    pub fore_weight: f64,
    /// Centroid weight of hind feet.
    #[serde(default = "default_weight")]
    pub hind_weight: f64,
}

impl Default for SupportPolygonConfig {
    fn default() -> Self {
        Self {
            delta_forward: default_delta_forward(),
            delta_backward: default_delta_backward(),
            fore_weight: default_weight(),
            hind_weight: default_weight(),
        }
    }
}

impl SupportPolygonConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delta_forward < 0.0 || self.delta_backward < 0.0 {
            return Err(ConfigError::invalid(
                "support_polygon.delta",
                "safety deltas must be non-negative",
            ));
        }
        if self.fore_weight <= 0.0 || self.hind_weight <= 0.0 {
            return Err(ConfigError::invalid(
                "support_polygon.weight",
                "centroid weights must be positive",
            ));
        }
        Ok(())
    }
}

/// Which safety margin shrinks the support polygon.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyDeltaMode {
    #[default]
    Forward,
    Backward,
}

impl SafetyDeltaMode {
    /// Mode matching the sign of a commanded heading velocity.
    pub fn from_heading_velocity(velocity: f64) -> Self {
        if velocity < 0.0 {
            Self::Backward
        } else {
            Self::Forward
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Crawl sequence successor.
pub const fn successor(leg: LegId) -> LegId {
    match leg {
        LegId::RightHind => LegId::RightFore,
        LegId::RightFore => LegId::LeftHind,
        LegId::LeftHind => LegId::LeftFore,
        LegId::LeftFore => LegId::RightHind,
    }
}

#[derive(Clone, Debug)]
pub struct SupportPolygonController {
    config: SupportPolygonConfig,
    delta_mode: SafetyDeltaMode,
    footholds: LegTable<Vector3<f64>>,
    /// Legs whose foothold was pushed by the foot placement.
    planned: LegTable<bool>,
    grounded: LegTable<bool>,
    next_swing_leg: LegId,
    current_swing_leg: Option<LegId>,
    last_swing_leg: Option<LegId>,
    announced_leg: Option<LegId>,
    swing_foot_changed: bool,
    all_feet_grounded: bool,
    polygon: Vec<Vector3<f64>>,
    com_target: Vector3<f64>,
}

impl SupportPolygonController {
    pub fn new(config: SupportPolygonConfig, legs: &LegTable<LegRuntimeState>) -> Self {
        let mut controller = Self {
            config,
            delta_mode: SafetyDeltaMode::Forward,
            footholds: LegTable::from_fn(|leg| legs[leg].foot()),
            planned: LegTable::default(),
            grounded: LegTable::from_fn(|leg| legs[leg].is_grounded()),
            next_swing_leg: LegId::RightHind,
            current_swing_leg: None,
            last_swing_leg: None,
            announced_leg: None,
            swing_foot_changed: false,
            all_feet_grounded: false,
            polygon: Vec::new(),
            com_target: Vector3::zeros(),
        };
        controller.refresh_target(legs);
        controller
    }

    /// Track grounded feet and swing legs, then recompute the CoM target.
    pub fn update(&mut self, legs: &LegTable<LegRuntimeState>) {
        for (leg, state) in legs.iter() {
            self.grounded[leg] = state.is_grounded();
            if state.is_grounded() && !self.planned[leg] {
                self.footholds[leg] = state.foot();
            }
        }
        self.all_feet_grounded = self.grounded.values().all(|&g| g);

        let swinging = LegId::ALL.into_iter().find(|&leg| legs[leg].is_swinging());
        if let Some(previous) = self.current_swing_leg {
            if !legs[previous].is_swinging() {
                self.last_swing_leg = Some(previous);
                self.next_swing_leg = successor(previous);
            }
        }
        self.current_swing_leg = swinging;

        self.swing_foot_changed = self.announced_leg != Some(self.next_swing_leg);
        if self.swing_foot_changed {
            debug!("next swing leg: {}", self.next_swing_leg);
            self.announced_leg = Some(self.next_swing_leg);
        }

        self.refresh_target(legs);
    }

    /// Fire the swing-leg edge again on the next update.
    pub fn rearm(&mut self) {
        self.announced_leg = None;
    }

    /// Hold `position` as the foothold of `leg` until the next seeding.
    pub fn set_foothold(&mut self, leg: LegId, position: Vector3<f64>) {
        self.footholds[leg] = position;
        self.planned[leg] = true;
    }

    /// Reset every foothold to the measured foot position.
    pub fn seed_footholds(&mut self, legs: &LegTable<LegRuntimeState>) {
        self.footholds = LegTable::from_fn(|leg| legs[leg].foot());
        self.planned = LegTable::default();
    }

    pub fn set_safety_delta(&mut self, mode: SafetyDeltaMode) {
        if mode != self.delta_mode {
            debug!("safety delta mode: {mode:?}");
        }
        self.delta_mode = mode;
    }

    pub const fn safety_delta_mode(&self) -> SafetyDeltaMode {
        self.delta_mode
    }

    pub const fn safety_delta(&self) -> f64 {
        match self.delta_mode {
            SafetyDeltaMode::Forward => self.config.delta_forward,
            SafetyDeltaMode::Backward => self.config.delta_backward,
        }
    }

    pub const fn footholds(&self) -> &LegTable<Vector3<f64>> {
        &self.footholds
    }

    /// Mean of all per-leg footholds.
    pub fn foothold_centroid(&self) -> Vector3<f64> {
        self.footholds.values().sum::<Vector3<f64>>() / 4.0
    }

    pub const fn next_swing_leg(&self) -> LegId {
        self.next_swing_leg
    }

    pub const fn current_swing_leg(&self) -> Option<LegId> {
        self.current_swing_leg
    }

    pub const fn last_swing_leg(&self) -> Option<LegId> {
        self.last_swing_leg
    }

    /// The next swing leg changed during the last update.
    pub const fn swing_foot_changed(&self) -> bool {
        self.swing_foot_changed
    }

    pub const fn all_feet_grounded(&self) -> bool {
        self.all_feet_grounded
    }

    /// Walking may start only from a fully supported stance.
    pub const fn is_safe_to_resume_walking(&self) -> bool {
        self.all_feet_grounded
    }

    /// Support polygon vertices, counter-clockwise in the horizontal plane.
    pub fn polygon(&self) -> &[Vector3<f64>] {
        &self.polygon
    }

    pub const fn com_target(&self) -> Vector3<f64> {
        self.com_target
    }

    /// Recompute the safety-shrunk support polygon and CoM target.
    pub fn compute_safe_com_target(&mut self, legs: &LegTable<LegRuntimeState>) -> Vector3<f64> {
        self.refresh_target(legs);
        self.com_target
    }

    /// Whether `point` lies inside the current polygon (horizontal plane).
    pub fn contains(&self, point: &Vector3<f64>) -> bool {
        polygon_contains(&self.polygon, point)
    }

    /// Horizontal offset from `position` to the CoM target.
    pub fn position_error(&self, position: &Vector3<f64>) -> Vector2<f64> {
        (self.com_target - position).xy()
    }

    fn refresh_target(&mut self, legs: &LegTable<LegRuntimeState>) {
        let all_in_stand = legs.values().all(|state| state.in_stand_configuration);
        let mut vertices: Vec<(LegId, Vector3<f64>)> = if all_in_stand {
            LegId::ALL
                .into_iter()
                .filter(|&leg| self.grounded[leg])
                .map(|leg| (leg, self.footholds[leg]))
                .collect()
        } else {
            LegId::ALL
                .into_iter()
                .filter(|&leg| {
                    leg != self.next_swing_leg && Some(leg) != self.current_swing_leg
                })
                .map(|leg| (leg, self.footholds[leg]))
                .collect()
        };
        if vertices.is_empty() {
            vertices = LegId::ALL.into_iter().map(|leg| (leg, self.footholds[leg])).collect();
        }

        let centroid =
            vertices.iter().map(|(_, p)| p).sum::<Vector3<f64>>() / vertices.len() as f64;
        vertices.sort_by(|(_, a), (_, b)| {
            let angle_a = (a.y - centroid.y).atan2(a.x - centroid.x);
            let angle_b = (b.y - centroid.y).atan2(b.x - centroid.x);
            angle_a.total_cmp(&angle_b)
        });

        let ratio = if vertices.len() < 3 {
            0.0
        } else {
            let points: Vec<Vector3<f64>> = vertices.iter().map(|(_, p)| *p).collect();
            let inradius = min_edge_distance(&points, &centroid);
            if inradius <= self.safety_delta() {
                0.0
            } else {
                (inradius - self.safety_delta()) / inradius
            }
        };

        self.polygon = vertices
            .iter()
            .map(|(_, p)| centroid + (p - centroid) * ratio)
            .collect();

        let (weighted_sum, weight_total) = vertices.iter().zip(&self.polygon).fold(
            (Vector3::zeros(), 0.0),
            |(sum, total), ((leg, _), shrunk)| {
                let w = if leg.is_fore() {
                    self.config.fore_weight
                } else {
                    self.config.hind_weight
                };
                (sum + shrunk * w, total + w)
            },
        );
        self.com_target = weighted_sum / weight_total;
    }
}

/// Smallest horizontal distance from `point` to the edges of a closed polygon.
fn min_edge_distance(polygon: &[Vector3<f64>], point: &Vector3<f64>) -> f64 {
    let p = point.xy();
    (0..polygon.len())
        .map(|i| {
            let a = polygon[i].xy();
            let b = polygon[(i + 1) % polygon.len()].xy();
            let ab = b - a;
            let len2 = ab.norm_squared();
            let t = if len2 > 0.0 {
                ((p - a).dot(&ab) / len2).clamp(0.0, 1.0)
            } else {
                0.0
            };
            (a + ab * t - p).norm()
        })
        .fold(f64::INFINITY, f64::min)
}

/// Point-in-convex-polygon test in the horizontal plane, boundary inclusive.
fn polygon_contains(polygon: &[Vector3<f64>], point: &Vector3<f64>) -> bool {
    const EPS: f64 = 1e-9;
    match polygon.len() {
        0 => false,
        1 => (polygon[0].xy() - point.xy()).norm() <= EPS,
        n => (0..n).all(|i| {
            let a = polygon[i].xy();
            let b = polygon[(i + 1) % n].xy();
            let edge = b - a;
            let to_point = point.xy() - a;
            edge.perp(&to_point) >= -EPS
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strider_core::LegMeasurement;
    use strider_test_utils::nominal_stance;

    fn legs(in_stand: bool) -> LegTable<LegRuntimeState> {
        let sensed = nominal_stance(0.0);
        let mut legs = LegRuntimeState::table(&sensed);
        for (_, leg) in legs.iter_mut() {
            leg.in_stand_configuration = in_stand;
        }
        legs
    }

    fn set_phase(legs: &mut LegTable<LegRuntimeState>, leg: LegId, swing: Option<f64>) {
        let measurement = LegMeasurement {
            grounded: swing.is_none(),
            ..legs[leg].measurement
        };
        match swing {
            Some(phase) => legs[leg].update(measurement, -1.0, phase),
            None => legs[leg].update(measurement, 0.5, -1.0),
        }
    }

    #[test]
    fn first_update_fires_edge_for_right_hind() {
        let l = legs(true);
        let mut support = SupportPolygonController::new(SupportPolygonConfig::default(), &l);
        support.update(&l);
        assert!(support.swing_foot_changed());
        assert_eq!(support.next_swing_leg(), LegId::RightHind);
        support.update(&l);
        assert!(!support.swing_foot_changed());
        support.rearm();
        support.update(&l);
        assert!(support.swing_foot_changed());
    }

    #[test]
    fn stand_polygon_uses_all_grounded_feet() {
        let l = legs(true);
        let mut support = SupportPolygonController::new(SupportPolygonConfig::default(), &l);
        support.update(&l);
        assert_eq!(support.polygon().len(), 4);
        let target = support.com_target();
        assert!(support.contains(&target));
        assert_relative_eq!(target.xy(), support.foothold_centroid().xy(), epsilon = 1e-12);
    }

    #[test]
    fn sequence_advances_at_touchdown() {
        let mut l = legs(false);
        let mut support = SupportPolygonController::new(SupportPolygonConfig::default(), &l);
        support.update(&l);

        set_phase(&mut l, LegId::RightHind, Some(0.1));
        support.update(&l);
        assert_eq!(support.current_swing_leg(), Some(LegId::RightHind));
        assert_eq!(support.next_swing_leg(), LegId::RightHind);
        assert!(!support.swing_foot_changed());
        // Triangle without the swinging leg.
        assert_eq!(support.polygon().len(), 3);

        set_phase(&mut l, LegId::RightHind, None);
        support.update(&l);
        assert_eq!(support.current_swing_leg(), None);
        assert_eq!(support.last_swing_leg(), Some(LegId::RightHind));
        assert_eq!(support.next_swing_leg(), LegId::RightFore);
        assert!(support.swing_foot_changed());
    }

    #[test]
    fn com_target_inside_shrunk_triangle() {
        let l = legs(false);
        let mut support = SupportPolygonController::new(SupportPolygonConfig::default(), &l);
        support.update(&l);
        let target = support.com_target();
        assert!(support.contains(&target));

        // Every shrunk edge keeps at least delta from the unshrunk triangle.
        let unshrunk: Vec<Vector3<f64>> = [LegId::LeftFore, LegId::RightFore, LegId::LeftHind]
            .into_iter()
            .map(|leg| support.footholds()[leg])
            .collect();
        let delta = support.safety_delta();
        for vertex in support.polygon() {
            assert!(polygon_contains(&sorted_ccw(unshrunk.clone()), vertex));
            assert!(min_edge_distance(&sorted_ccw(unshrunk.clone()), vertex) >= delta - 1e-9);
        }
    }

    #[test]
    fn large_delta_collapses_to_centroid() {
        let l = legs(false);
        let config = SupportPolygonConfig {
            delta_forward: 10.0,
            ..SupportPolygonConfig::default()
        };
        let mut support = SupportPolygonController::new(config, &l);
        support.update(&l);
        let first = support.polygon()[0];
        for vertex in support.polygon() {
            assert_relative_eq!(*vertex, first, epsilon = 1e-12);
        }
        assert_relative_eq!(support.com_target(), first, epsilon = 1e-12);
    }

    #[test]
    fn backward_delta_is_smaller() {
        let l = legs(false);
        let mut support = SupportPolygonController::new(SupportPolygonConfig::default(), &l);
        support.set_safety_delta(SafetyDeltaMode::from_heading_velocity(-0.1));
        assert_eq!(support.safety_delta_mode(), SafetyDeltaMode::Backward);
        assert!(support.safety_delta() < SupportPolygonConfig::default().delta_forward);
    }

    #[test]
    fn planned_foothold_survives_grounded_updates() {
        let mut l = legs(false);
        let mut support = SupportPolygonController::new(SupportPolygonConfig::default(), &l);
        support.update(&l);
        let measured = l[LegId::RightHind].foot();
        let planned = measured + Vector3::new(0.1, 0.0, 0.0);

        support.set_foothold(LegId::RightHind, planned);
        support.update(&l);
        support.update(&l);
        assert_relative_eq!(support.footholds()[LegId::RightHind], planned);
        assert_relative_eq!(support.foothold_centroid().x, 0.025, epsilon = 1e-12);

        // Unplanned legs keep following the measured foot.
        l[LegId::LeftFore].measurement.foot_world.x += 0.04;
        support.update(&l);
        assert_relative_eq!(support.footholds()[LegId::LeftFore], l[LegId::LeftFore].foot());

        support.seed_footholds(&l);
        assert_relative_eq!(support.footholds()[LegId::RightHind], measured);
        l[LegId::RightHind].measurement.foot_world.x -= 0.02;
        support.update(&l);
        assert_relative_eq!(support.footholds()[LegId::RightHind], l[LegId::RightHind].foot());
    }

    #[test]
    fn crawl_sequence_cycles_all_legs() {
        let mut leg = LegId::RightHind;
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(leg);
            leg = successor(leg);
        }
        assert_eq!(leg, LegId::RightHind);
        seen.sort();
        assert_eq!(seen, LegId::ALL.to_vec());
    }

    fn sorted_ccw(mut points: Vec<Vector3<f64>>) -> Vec<Vector3<f64>> {
        let c = points.iter().sum::<Vector3<f64>>() / points.len() as f64;
        points.sort_by(|a, b| {
            (a.y - c.y)
                .atan2(a.x - c.x)
                .total_cmp(&(b.y - c.y).atan2(b.x - c.x))
        });
        points
    }
}
