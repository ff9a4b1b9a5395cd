//! Rotation decomposition utilities.
//!
//! Every rotation is decomposed as `q = swing * twist`, where `twist` is a
//! rotation about a chosen axis and `swing` is the minimal rotation that
//! carries that axis onto its rotated image. With the world z axis this
//! isolates the heading of a tilted body from its pitch and roll.

use std::f64::consts::PI;

use nalgebra::{Unit, UnitQuaternion, Vector3};

/// Arccos that clamps out-of-range inputs to the nearest boundary angle
/// instead of returning NaN.
pub fn safe_acos(value: f64) -> f64 {
    if value <= -1.0 {
        PI
    } else if value >= 1.0 {
        0.0
    } else {
        value.acos()
    }
}

/// Split `rotation` into `(swing, twist)` with `rotation = swing * twist`.
///
/// `twist` is a pure rotation about `axis` (it leaves `axis` unchanged) and
/// `swing` rotates `axis` onto `rotation * axis` along the shortest arc.
pub fn decompose_rotation(
    rotation: &UnitQuaternion<f64>,
    axis: &Unit<Vector3<f64>>,
) -> (UnitQuaternion<f64>, UnitQuaternion<f64>) {
    let rotated = rotation * axis.into_inner();
    let angle = safe_acos(axis.dot(&rotated) / rotated.norm());

    let swing_axis = Unit::try_new(axis.cross(&rotated), 1e-12)
        .unwrap_or_else(|| any_perpendicular(axis));
    let swing = UnitQuaternion::from_axis_angle(&swing_axis, angle);
    let twist = swing.inverse() * rotation;
    (swing, twist)
}

/// Heading (twist about world z) of a base orientation.
pub fn heading_of(orientation: &UnitQuaternion<f64>) -> UnitQuaternion<f64> {
    decompose_rotation(orientation, &Vector3::z_axis()).1
}

/// A unit vector orthogonal to `axis`.
fn any_perpendicular(axis: &Unit<Vector3<f64>>) -> Unit<Vector3<f64>> {
    let helper = if axis.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    Unit::new_normalize(axis.cross(&helper))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn safe_acos_clamps() {
        assert_relative_eq!(safe_acos(1.5), 0.0);
        assert_relative_eq!(safe_acos(-1.000_001), PI);
        assert_relative_eq!(safe_acos(0.0), PI / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn heading_of_pure_yaw_is_identity_decomposition() {
        let q = UnitQuaternion::from_euler_angles(0.0, 0.0, 1.1);
        let h = heading_of(&q);
        assert_relative_eq!(h.angle_to(&q), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn heading_of_yaw_then_pitch_recovers_yaw() {
        let yaw = UnitQuaternion::from_euler_angles(0.0, 0.0, -0.7);
        let pitch = UnitQuaternion::from_euler_angles(0.0, 0.4, 0.0);
        let h = heading_of(&(yaw * pitch));
        assert_relative_eq!(h.angle_to(&yaw), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn heading_independent_of_tilt_direction() {
        let yaw = UnitQuaternion::from_euler_angles(0.0, 0.0, 0.5);
        for tilt in [
            UnitQuaternion::from_euler_angles(0.2, 0.0, 0.0),
            UnitQuaternion::from_euler_angles(0.0, -0.3, 0.0),
        ] {
            let h = heading_of(&(yaw * tilt));
            assert_relative_eq!(h.angle_to(&yaw), 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn twist_preserves_axis_and_product_reconstructs() {
        let q = UnitQuaternion::from_euler_angles(0.3, -0.2, 2.0);
        let axis = Vector3::z_axis();
        let (swing, twist) = decompose_rotation(&q, &axis);

        assert_relative_eq!(twist * axis.into_inner(), axis.into_inner(), epsilon = 1e-10);
        assert_relative_eq!((swing * twist).angle_to(&q), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn upside_down_rotation_is_finite() {
        let q = UnitQuaternion::from_euler_angles(PI, 0.0, 0.0);
        let (swing, twist) = decompose_rotation(&q, &Vector3::z_axis());
        assert!(swing.angle().is_finite());
        assert!(twist.angle().is_finite());
        assert_relative_eq!((swing * twist).angle_to(&q), 0.0, epsilon = 1e-9);
    }
}
