// src/pursuit/scanner.rs
//
// Three-ray obstacle scan ahead of a pursuer. The center ray looks straight
// ahead at full range, the side rays are yawed 30° out and reach 0.8 of it.

use nalgebra::UnitQuaternion;
use rapier3d::prelude::*;

use crate::surface::SurfaceQuery;

pub const SIDE_RAY_ANGLE_DEG: Real = 30.0;
pub const SIDE_RAY_RANGE: Real = 0.8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub center: bool,
    pub left: bool,
    pub right: bool,
}

impl ScanResult {
    #[inline]
    pub fn blocked(&self) -> bool {
        self.center || self.left || self.right
    }
}

/// (left, right) side ray directions for `forward`, yawed about world up.
/// Left is a positive turn in the +Z-forward, -X-right frame.
pub fn side_directions(forward: &Vector<Real>) -> (Vector<Real>, Vector<Real>) {
    let angle = SIDE_RAY_ANGLE_DEG.to_radians();
    let up = Vector::y_axis();
    let left = UnitQuaternion::from_axis_angle(&up, angle) * forward;
    let right = UnitQuaternion::from_axis_angle(&up, -angle) * forward;
    (left, right)
}

pub fn scan(
    surface: &dyn SurfaceQuery,
    center: &Point<Real>,
    left: &Point<Real>,
    right: &Point<Real>,
    forward: &Vector<Real>,
    distance: Real,
) -> ScanResult {
    let Some(forward) = forward.try_normalize(1e-6) else {
        return ScanResult::default();
    };
    let (left_dir, right_dir) = side_directions(&forward);
    let side_range = distance * SIDE_RAY_RANGE;
    ScanResult {
        center: surface.cast_ray(center, &forward, distance).is_some(),
        left: surface.cast_ray(left, &left_dir, side_range).is_some(),
        right: surface.cast_ray(right, &right_dir, side_range).is_some(),
    }
}
