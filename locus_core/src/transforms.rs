// locus_core/src/transforms.rs

//! Rigid-transform helpers shared by the pose buffer, the baseframe estimator and the gate.

use nalgebra::{Quaternion, Translation3, UnitQuaternion, Vector3, Vector4};

use crate::types::Pose;

const MIN_QUATERNION_NORM: f64 = 1e-9;

/// Picks the representative of `{q, -q}` with a non-negative scalar part.
/// Ties at `w == 0` go to the one whose first non-zero vector component is positive.
pub fn canonicalize_rotation(q: &UnitQuaternion<f64>) -> UnitQuaternion<f64> {
    if is_canonical(q) {
        *q
    } else {
        UnitQuaternion::new_unchecked(-q.into_inner())
    }
}

pub fn canonicalize_pose(pose: &Pose) -> Pose {
    Pose::from_parts(pose.translation, canonicalize_rotation(&pose.rotation))
}

pub fn is_canonical(q: &UnitQuaternion<f64>) -> bool {
    let c = q.coords; // [i, j, k, w]
    if c.w != 0.0 {
        return c.w > 0.0;
    }
    [c.x, c.y, c.z]
        .into_iter()
        .find(|v| *v != 0.0)
        .map_or(true, |v| v > 0.0)
}

/// Interpolates between two poses: linear in translation, slerp in rotation.
pub fn interpolate_pose(a: &Pose, b: &Pose, alpha: f64) -> Pose {
    let translation = a.translation.vector.lerp(&b.translation.vector, alpha);
    let rotation = a
        .rotation
        .try_slerp(&b.rotation, alpha, MIN_QUATERNION_NORM)
        .unwrap_or_else(|| a.rotation.nlerp(&b.rotation, alpha));
    Pose::from_parts(Translation3::from(translation), rotation)
}

/// Angle of the relative rotation between two poses, in radians.
pub fn rotation_error(a: &Pose, b: &Pose) -> f64 {
    a.rotation.angle_to(&b.rotation)
}

pub fn translation_error(a: &Pose, b: &Pose) -> f64 {
    (a.translation.vector - b.translation.vector).norm()
}

/// Least-squares mean of a set of poses: arithmetic mean of the translations and
/// the normalized sum of sign-aligned quaternions. Canonicalized.
pub fn mean_pose<'a, I>(poses: I) -> Option<Pose>
where
    I: IntoIterator<Item = &'a Pose>,
{
    let mut count = 0usize;
    let mut translation_sum = Vector3::zeros();
    let mut quaternion_sum = Vector4::zeros();
    let mut anchor: Option<Vector4<f64>> = None;

    for pose in poses {
        let coords = pose.rotation.coords;
        let reference = *anchor.get_or_insert(coords);
        let aligned = if coords.dot(&reference) < 0.0 {
            -coords
        } else {
            coords
        };
        quaternion_sum += aligned;
        translation_sum += pose.translation.vector;
        count += 1;
    }

    if count == 0 || quaternion_sum.norm() < MIN_QUATERNION_NORM {
        return None;
    }

    let rotation = UnitQuaternion::from_quaternion(Quaternion::from(quaternion_sum));
    let translation = translation_sum / count as f64;
    Some(canonicalize_pose(&Pose::from_parts(
        Translation3::from(translation),
        rotation,
    )))
}

/// Angle between the gravity directions implied by two body orientations, in degrees.
pub fn gravity_disparity_deg(t_g_a: &Pose, t_g_b: &Pose) -> f64 {
    let gravity_a = t_g_a.rotation.inverse() * Vector3::z();
    let gravity_b = t_g_b.rotation.inverse() * Vector3::z();
    let cosine = gravity_a.dot(&gravity_b).clamp(-1.0, 1.0);
    cosine.acos().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn pose(x: f64, y: f64, z: f64, yaw: f64) -> Pose {
        Pose::new(Vector3::new(x, y, z), Vector3::z() * yaw)
    }

    #[test]
    fn canonical_rotation_has_positive_scalar() {
        let q = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.7);
        let flipped = UnitQuaternion::new_unchecked(-q.into_inner());
        assert!(!is_canonical(&flipped));

        let fixed = canonicalize_rotation(&flipped);
        assert!(is_canonical(&fixed));
        assert_eq!(fixed.coords, q.coords);
    }

    #[test]
    fn canonicalization_breaks_ties_at_half_turn() {
        let q = UnitQuaternion::new_unchecked(Quaternion::new(0.0, -1.0, 0.0, 0.0));
        let fixed = canonicalize_rotation(&q);
        assert_eq!(fixed.coords, Vector4::new(1.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn interpolation_hits_midpoint() {
        let a = pose(0.0, 0.0, 0.0, 0.0);
        let b = pose(2.0, 4.0, -2.0, PI / 2.0);
        let mid = interpolate_pose(&a, &b, 0.5);

        assert_abs_diff_eq!(mid.translation.vector, Vector3::new(1.0, 2.0, -1.0), epsilon = 1e-12);
        assert_abs_diff_eq!(mid.rotation.angle(), PI / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn mean_ignores_quaternion_sign() {
        let a = pose(1.0, 0.0, 0.0, 0.2);
        let mut b = a;
        b.rotation = UnitQuaternion::new_unchecked(-a.rotation.into_inner());

        let mean = mean_pose([a, b].iter()).unwrap();
        assert_abs_diff_eq!(rotation_error(&mean, &a), 0.0, epsilon = 1e-6);
        assert!(is_canonical(&mean.rotation));
    }

    #[test]
    fn mean_of_nothing_is_none() {
        assert!(mean_pose(std::iter::empty::<&Pose>()).is_none());
    }

    #[test]
    fn gravity_disparity_ignores_yaw() {
        let a = pose(0.0, 0.0, 0.0, 0.0);
        let b = pose(5.0, 1.0, 0.0, 1.2);
        assert_abs_diff_eq!(gravity_disparity_deg(&a, &b), 0.0, epsilon = 1e-4);

        let tilted = Pose::new(Vector3::zeros(), Vector3::x() * 10f64.to_radians());
        assert_abs_diff_eq!(gravity_disparity_deg(&a, &tilted), 10.0, epsilon = 1e-6);
    }
}
