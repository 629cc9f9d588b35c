//! Geometry kernel - angles, distances and fits over landmarks
//!
//! Pure functions with no shared state. Every division that can hit a zero
//! denominator is guarded with [`EPSILON`], so degenerate input yields a sane
//! default (0° angle, 0 velocity, 100 alignment) rather than NaN.

use crate::types::Landmark;
use serde::{Deserialize, Serialize};

/// Smallest vector norm treated as non-degenerate
pub const EPSILON: f64 = 1e-9;

/// Default tolerance for [`symmetry`], in the units of the compared values
pub const DEFAULT_SYMMETRY_TOLERANCE: f64 = 10.0;

/// Coordinate plane used by [`angle_2d`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plane {
    /// Image plane (frontal view)
    Xy,
    /// Ground plane
    Xz,
    /// Side plane
    Yz,
}

#[derive(Debug, Clone, Copy)]
struct Vec3 {
    x: f64,
    y: f64,
    z: f64,
}

impl Vec3 {
    fn between(from: &Landmark, to: &Landmark) -> Self {
        Self {
            x: to.x - from.x,
            y: to.y - from.y,
            z: to.z - from.z,
        }
    }

    fn project(self, plane: Plane) -> Self {
        match plane {
            Plane::Xy => Self { z: 0.0, ..self },
            Plane::Xz => Self { y: 0.0, ..self },
            Plane::Yz => Self { x: 0.0, ..self },
        }
    }

    fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }
}

fn angle_between(u: Vec3, v: Vec3) -> f64 {
    let (nu, nv) = (u.norm(), v.norm());
    if nu < EPSILON || nv < EPSILON {
        return 0.0;
    }
    let cos = (u.dot(v) / (nu * nv).max(EPSILON)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// Angle at vertex `b` between rays `b→a` and `b→c`, in degrees
pub fn angle_3d(a: &Landmark, b: &Landmark, c: &Landmark) -> f64 {
    angle_between(Vec3::between(b, a), Vec3::between(b, c))
}

/// [`angle_3d`] restricted to one coordinate plane, for when depth is unreliable
pub fn angle_2d(a: &Landmark, b: &Landmark, c: &Landmark, plane: Plane) -> f64 {
    angle_between(
        Vec3::between(b, a).project(plane),
        Vec3::between(b, c).project(plane),
    )
}

/// Euclidean distance. Detectors without depth report `z = 0`.
pub fn distance_3d(a: &Landmark, b: &Landmark) -> f64 {
    Vec3::between(a, b).norm()
}

/// Distance ignoring the vertical axis
pub fn horizontal_distance(a: &Landmark, b: &Landmark) -> f64 {
    Vec3::between(a, b).project(Plane::Xz).norm()
}

/// Speed between two samples, in units per second. 0 without a previous sample.
pub fn velocity(curr: &Landmark, prev: Option<&Landmark>, dt: f64) -> f64 {
    match prev {
        Some(prev) if dt > EPSILON => distance_3d(curr, prev) / dt,
        _ => 0.0,
    }
}

/// Angle of the segment `from→to` away from straight up, in the image plane
pub fn angle_from_vertical(from: &Landmark, to: &Landmark) -> f64 {
    let up = Vec3 { x: 0.0, y: -1.0, z: 0.0 };
    angle_between(Vec3::between(from, to).project(Plane::Xy), up)
}

/// Collinearity score (0-100) of a point set.
///
/// Fits a line by ordinary least squares along the dominant image axis,
/// takes the mean absolute residual and maps it to `100 - residual * 1000`.
pub fn alignment(points: &[Landmark]) -> f64 {
    if points.len() < 3 {
        return 100.0;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;
    let var_x: f64 = points.iter().map(|p| (p.x - mean_x).powi(2)).sum();
    let var_y: f64 = points.iter().map(|p| (p.y - mean_y).powi(2)).sum();

    // Regress the minor axis on the major one so near-vertical bodies fit too.
    let (pairs, mean_u, mean_v, var_u): (Vec<(f64, f64)>, f64, f64, f64) = if var_x >= var_y {
        (points.iter().map(|p| (p.x, p.y)).collect(), mean_x, mean_y, var_x)
    } else {
        (points.iter().map(|p| (p.y, p.x)).collect(), mean_y, mean_x, var_y)
    };

    if var_u < EPSILON {
        return 100.0;
    }

    let covariance: f64 = pairs.iter().map(|(u, v)| (u - mean_u) * (v - mean_v)).sum();
    let slope = covariance / var_u;
    let intercept = mean_v - slope * mean_u;

    let residual = pairs
        .iter()
        .map(|(u, v)| (v - (slope * u + intercept)).abs())
        .sum::<f64>()
        / n;

    (100.0 - residual * 1000.0).max(0.0)
}

/// Compare two bilateral measurements.
///
/// Returns whether they differ by at most `tolerance`, and a score of
/// `100 - |left - right| * 10` floored at 0.
pub fn symmetry(left: f64, right: f64, tolerance: f64) -> (bool, f64) {
    let diff = (left - right).abs();
    if !diff.is_finite() {
        return (false, 0.0);
    }
    (diff <= tolerance, (100.0 - diff * 10.0).max(0.0))
}

/// Linear decay from 100 once `value` passes `start`, floored at 0
pub fn decay_score(value: f64, start: f64, per_unit: f64) -> f64 {
    if value <= start {
        100.0
    } else {
        (100.0 - (value - start) * per_unit).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Landmark {
        Landmark::new(x, y, z, 1.0)
    }

    #[test]
    fn test_right_angle() {
        let angle = angle_3d(&p(1.0, 0.0, 0.0), &p(0.0, 0.0, 0.0), &p(0.0, 1.0, 0.0));
        assert!((angle - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_straight_angle_survives_float_drift() {
        let angle = angle_3d(&p(0.0, 0.0, 0.0), &p(0.5, 0.5, 0.5), &p(1.0, 1.0, 1.0));
        assert!((angle - 180.0).abs() < 1e-6);
        assert!(angle.is_finite());
    }

    #[test]
    fn test_degenerate_angle_is_zero() {
        let a = p(0.3, 0.3, 0.0);
        assert_eq!(angle_3d(&a, &a, &p(1.0, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn test_angle_2d_ignores_depth() {
        let a = p(1.0, 0.0, 5.0);
        let b = p(0.0, 0.0, 0.0);
        let c = p(0.0, 1.0, -3.0);
        assert!((angle_2d(&a, &b, &c, Plane::Xy) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_with_flat_depth() {
        assert!((distance_3d(&p(0.0, 0.0, 0.0), &p(3.0, 4.0, 0.0)) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_velocity() {
        let curr = p(0.0, 0.3, 0.0);
        let prev = p(0.0, 0.0, 0.0);
        assert!((velocity(&curr, Some(&prev), 0.5) - 0.6).abs() < 1e-12);
        assert_eq!(velocity(&curr, None, 0.5), 0.0);
        assert_eq!(velocity(&curr, Some(&prev), 0.0), 0.0);
    }

    #[test]
    fn test_alignment_of_collinear_points() {
        let points = [p(0.1, 0.5, 0.0), p(0.3, 0.52, 0.0), p(0.5, 0.54, 0.0), p(0.7, 0.56, 0.0)];
        assert!((alignment(&points) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_alignment_penalizes_bent_line() {
        let points = [p(0.1, 0.5, 0.0), p(0.3, 0.5, 0.0), p(0.5, 0.6, 0.0), p(0.7, 0.5, 0.0)];
        let score = alignment(&points);
        assert!(score < 100.0);
        assert!(score >= 0.0);
    }

    #[test]
    fn test_alignment_vertical_line() {
        let points = [p(0.5, 0.1, 0.0), p(0.5, 0.4, 0.0), p(0.5, 0.9, 0.0)];
        assert!((alignment(&points) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_symmetry() {
        assert_eq!(symmetry(42.0, 42.0, DEFAULT_SYMMETRY_TOLERANCE), (true, 100.0));
        let (ok, score) = symmetry(42.0, 62.0, DEFAULT_SYMMETRY_TOLERANCE);
        assert!(!ok);
        assert!(score < 100.0);
    }

    #[test]
    fn test_vertical_reference() {
        let hip = p(0.5, 0.6, 0.0);
        let shoulder = p(0.5, 0.3, 0.0);
        assert!(angle_from_vertical(&hip, &shoulder).abs() < 1e-9);
        let leaning = p(0.8, 0.3, 0.0);
        assert!((angle_from_vertical(&hip, &leaning) - 45.0).abs() < 1e-9);
    }
}
