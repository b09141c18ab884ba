// src/pursuit/separation.rs
//
// Boid-style separation between pursuers.

use rapier3d::prelude::*;

/// Σ (self - n).normalize() / |self - n| over neighbors within `radius`.
/// Coincident neighbors are skipped. Zero when nobody is close.
pub fn compute_separation<'a>(
    self_pos: &Point<Real>,
    neighbors: impl IntoIterator<Item = &'a Point<Real>>,
    radius: Real,
) -> Vector<Real> {
    neighbors.into_iter().fold(Vector::zeros(), |acc, n| {
        let away = self_pos - n;
        let d = away.norm();
        if d <= 1e-6 || d > radius {
            acc
        } else {
            acc + away / (d * d)
        }
    })
}

/// Unit chase direction after mixing in separation. Falls back to the plain
/// direction when the mix cancels out; zero when there is no direction at all.
pub fn blend_direction(to_target: &Vector<Real>, separation: &Vector<Real>, strength: Real) -> Vector<Real> {
    let dir = to_target.try_normalize(1e-6).unwrap_or_else(Vector::zeros);
    (dir + separation * strength).try_normalize(1e-6).unwrap_or(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pushes_away_inversely_with_distance() {
        let me = point![0.0, 0.0, 0.0];
        let near = [point![2.0, 0.0, 0.0]];
        let s = compute_separation(&me, &near, 8.0);
        assert_relative_eq!(s, vector![-0.5, 0.0, 0.0], epsilon = 1e-6);
    }

    #[test]
    fn ignores_far_and_coincident_neighbors() {
        let me = point![0.0, 0.0, 0.0];
        let others = [point![0.0, 0.0, 0.0], point![20.0, 0.0, 0.0]];
        assert_eq!(compute_separation(&me, &others, 8.0), Vector::zeros());
        assert_eq!(compute_separation(&me, &[], 8.0), Vector::zeros());
    }

    #[test]
    fn symmetric_neighbors_cancel() {
        let me = point![0.0, 0.0, 0.0];
        let others = [point![3.0, 0.0, 0.0], point![-3.0, 0.0, 0.0]];
        assert_relative_eq!(compute_separation(&me, &others, 8.0), Vector::zeros(), epsilon = 1e-6);
    }

    #[test]
    fn blend_bends_direction_and_stays_unit() {
        let d = blend_direction(&vector![0.0, 0.0, 10.0], &vector![1.0, 0.0, 0.0], 1.0);
        assert_relative_eq!(d.norm(), 1.0, epsilon = 1e-6);
        assert!(d.x > 0.0 && d.z > 0.0);
        assert_eq!(blend_direction(&Vector::zeros(), &Vector::zeros(), 1.2), Vector::zeros());
    }
}
