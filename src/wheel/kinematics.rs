// ==============================================================================
// kinematics.rs — BODY FRAME + POINT VELOCITY (WORLD SPACE)
// ------------------------------------------------------------------------------
// Chassis convention (shared by wheels, stabilizer and the pursuit layer):
//   +Y up, +Z forward, -X right
//
// BodyState is a read-only copy of the chassis kinematics taken before any
// force is computed for the tick, so every wheel sees the same settled state.
// ==============================================================================

use nalgebra::UnitQuaternion;
use rapier3d::prelude::*;

pub const LOCAL_UP: Vector<Real> = Vector::new(0.0, 1.0, 0.0);
pub const LOCAL_FORWARD: Vector<Real> = Vector::new(0.0, 0.0, 1.0);
pub const LOCAL_RIGHT: Vector<Real> = Vector::new(-1.0, 0.0, 0.0);

pub const WORLD_UP: Vector<Real> = LOCAL_UP;

pub const MS_TO_KPH: Real = 3.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub position: Isometry<Real>,
    pub linvel: Vector<Real>,
    pub angvel: Vector<Real>,
    /// World-space center of mass.
    pub com: Point<Real>,
    pub mass: Real,
}

impl BodyState {
    pub fn from_rigid_body(body: &RigidBody) -> Self {
        Self {
            position: *body.position(),
            linvel: *body.linvel(),
            angvel: *body.angvel(),
            com: *body.center_of_mass(),
            mass: body.mass(),
        }
    }

    /// Body at rest at `translation`, rotated by `yaw` around world up.
    pub fn at_rest(translation: Vector<Real>, yaw: Real, mass: Real) -> Self {
        let position = Isometry::new(translation, WORLD_UP * yaw);
        Self {
            position,
            linvel: Vector::zeros(),
            angvel: Vector::zeros(),
            com: Point::from(translation),
            mass,
        }
    }

    #[inline]
    pub fn rotation(&self) -> &UnitQuaternion<Real> {
        &self.position.rotation
    }

    #[inline]
    pub fn translation(&self) -> Vector<Real> {
        self.position.translation.vector
    }

    #[inline]
    pub fn up(&self) -> Vector<Real> {
        self.position.rotation * LOCAL_UP
    }

    #[inline]
    pub fn forward(&self) -> Vector<Real> {
        self.position.rotation * LOCAL_FORWARD
    }

    #[inline]
    pub fn right(&self) -> Vector<Real> {
        self.position.rotation * LOCAL_RIGHT
    }

    #[inline]
    pub fn speed(&self) -> Real {
        self.linvel.norm()
    }

    #[inline]
    pub fn speed_kph(&self) -> Real {
        self.speed() * MS_TO_KPH
    }

    /// Chassis-local point to world space.
    #[inline]
    pub fn to_world(&self, local: &Point<Real>) -> Point<Real> {
        self.position * local
    }

    /// v(p) = v_com + ω × (p - com)
    #[inline]
    pub fn point_velocity(&self, p: &Point<Real>) -> Vector<Real> {
        point_velocity(self.linvel, self.angvel, self.com, *p)
    }
}

#[inline]
pub fn point_velocity(linvel: Vector<Real>, angvel: Vector<Real>, com: Point<Real>, p: Point<Real>) -> Vector<Real> {
    let r = p.coords - com.coords;
    linvel + angvel.cross(&r)
}

/// Wheel yaw relative to the chassis. Positive steer turns right.
#[inline]
pub fn steer_rotation(angle: Real) -> UnitQuaternion<Real> {
    UnitQuaternion::from_axis_angle(&Vector::y_axis(), -angle)
}

/// (forward, right) of a wheel steered by `angle`, in world space.
#[inline]
pub fn wheel_basis_world(rot: &UnitQuaternion<Real>, angle: Real) -> (Vector<Real>, Vector<Real>) {
    let r = rot * steer_rotation(angle);
    (r * LOCAL_FORWARD, r * LOCAL_RIGHT)
}

/// Project velocity onto the wheel basis: (v_long, v_lat).
#[inline]
pub fn slip_components(point_vel: Vector<Real>, forward: Vector<Real>, right: Vector<Real>) -> (Real, Real) {
    (point_vel.dot(&forward), point_vel.dot(&right))
}

/// Unsigned angle between two directions, radians.
#[inline]
pub fn angle_between(a: &Vector<Real>, b: &Vector<Real>) -> Real {
    let denom = a.norm() * b.norm();
    if denom <= 1e-9 {
        return 0.0;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos()
}

/// Signed yaw from `from` to `to` around world up, radians. Positive = `to` is
/// to the right of `from`.
#[inline]
pub fn signed_yaw(from: &Vector<Real>, to: &Vector<Real>) -> Real {
    let cross = from.cross(to).dot(&WORLD_UP);
    -cross.atan2(from.dot(to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn positive_steer_turns_toward_local_right() {
        let (fwd, right) = wheel_basis_world(&UnitQuaternion::identity(), FRAC_PI_2);
        assert_relative_eq!(fwd, LOCAL_RIGHT, epsilon = 1e-6);
        assert_relative_eq!(right, -LOCAL_FORWARD, epsilon = 1e-6);
    }

    #[test]
    fn signed_yaw_is_positive_to_the_right() {
        let yaw = signed_yaw(&LOCAL_FORWARD, &LOCAL_RIGHT);
        assert_relative_eq!(yaw, FRAC_PI_2, epsilon = 1e-6);
        let yaw = signed_yaw(&LOCAL_FORWARD, &-LOCAL_RIGHT);
        assert_relative_eq!(yaw, -FRAC_PI_2, epsilon = 1e-6);
    }

    #[test]
    fn point_velocity_includes_spin() {
        let v = point_velocity(
            Vector::zeros(),
            vector![0.0, 1.0, 0.0],
            Point::origin(),
            point![0.0, 0.0, 2.0],
        );
        assert_relative_eq!(v, vector![2.0, 0.0, 0.0], epsilon = 1e-6);
    }

    #[test]
    fn yawed_body_frame_is_orthonormal() {
        let s = BodyState::at_rest(vector![0.0, 1.0, 0.0], 0.7, 1000.0);
        assert_relative_eq!(s.forward().dot(&s.right()), 0.0, epsilon = 1e-6);
        assert_relative_eq!(s.up(), WORLD_UP, epsilon = 1e-6);
    }
}
