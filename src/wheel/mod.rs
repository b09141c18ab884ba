// ==============================================================================
// wheel — ONE RAYCAST WHEEL: CONTACT, STEERING, DRIVE, SLIP
// ------------------------------------------------------------------------------
// A WheelUnit never touches the rigid body. It reads a BodyState snapshot,
// queries the surface, and hands back world-space forces. The vehicle decides
// where and when they are applied.
//
// Per tick, in order:
//   compute_suspension_force   ray + spring/damper, refreshes ground contact
//   compute_lateral_friction   slip% + sideways correction (grounded only)
//   compute_longitudinal_force motor or brake (driven + grounded only)
// ==============================================================================

pub mod curve;
pub mod friction;
pub mod kinematics;
pub mod suspension;

use std::fmt;

use rapier3d::prelude::*;
use serde::Serialize;

use crate::config::WheelConfig;
use crate::error::ConfigError;
use crate::vehicle::telemetry::WheelTelemetry;
use crate::surface::SurfaceQuery;

use kinematics::{BodyState, slip_components, steer_rotation, wheel_basis_world};

// ============================================
// Wheel identification
// ============================================

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
pub enum WheelId {
    FL,
    FR,
    RL,
    RR,
}

impl WheelId {
    pub const ALL: [WheelId; 4] = [WheelId::FL, WheelId::FR, WheelId::RL, WheelId::RR];

    pub fn as_str(&self) -> &'static str {
        match self {
            WheelId::FL => "FL",
            WheelId::FR => "FR",
            WheelId::RL => "RL",
            WheelId::RR => "RR",
        }
    }

    pub fn is_front(&self) -> bool {
        matches!(self, WheelId::FL | WheelId::FR)
    }

    pub fn is_left(&self) -> bool {
        matches!(self, WheelId::FL | WheelId::RL)
    }
}

impl fmt::Display for WheelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last ray hit under the wheel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundContact {
    pub point: Point<Real>,
    pub distance: Real,
}

#[derive(Debug, Clone)]
pub struct WheelUnit {
    pub id: WheelId,
    pub mount: Point<Real>,          // chassis local
    pub steering: bool,
    pub driven: bool,
    config: WheelConfig,
    max_steer_angle: Real,           // rad

    // --- per-tick state ---
    steer_angle: Real,               // rad, + = right
    motor: Real,                     // N
    brake: Real,                     // N
    contact: Option<GroundContact>,
    lateral_velocity: Real,          // m/s along wheel right
    slip: Real,                      // 0..1
}

impl WheelUnit {
    pub fn new(
        id: WheelId,
        mount: Point<Real>,
        steering: bool,
        driven: bool,
        config: WheelConfig,
        max_steer_angle: Real,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        ConfigError::non_negative("max_steer_angle", max_steer_angle)?;
        Ok(Self {
            id,
            mount,
            steering,
            driven,
            config,
            max_steer_angle,
            steer_angle: 0.0,
            motor: 0.0,
            brake: 0.0,
            contact: None,
            lateral_velocity: 0.0,
            slip: 0.0,
        })
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    pub fn apply_steering(&mut self, angle: Real) {
        if !self.steering {
            return;
        }
        self.steer_angle = angle.clamp(-self.max_steer_angle, self.max_steer_angle);
    }

    pub fn apply_throttle(&mut self, force: Real) {
        if !self.driven {
            return;
        }
        self.motor = force;
        self.brake = 0.0;
    }

    pub fn apply_brake(&mut self, force: Real) {
        if !self.driven {
            return;
        }
        self.motor = 0.0;
        self.brake = force.max(0.0);
    }

    // ------------------------------------------------------------------
    // Forces
    // ------------------------------------------------------------------

    /// Casts the suspension ray and returns the spring/damper force (world).
    /// A miss clears the contact and returns exactly zero.
    pub fn compute_suspension_force(&mut self, body: &BodyState, surface: &dyn SurfaceQuery) -> Vector<Real> {
        let up = body.up();
        let origin = body.to_world(&self.mount);
        let max_distance = self.config.rest_length * suspension::RAY_LENGTH_FACTOR;

        let Some(hit) = surface.cast_ray(&origin, &-up, max_distance) else {
            self.contact = None;
            self.lateral_velocity = 0.0;
            self.slip = 0.0;
            return Vector::zeros();
        };

        self.contact = Some(GroundContact { point: hit.point, distance: hit.distance });

        let v_up = body.point_velocity(&origin).dot(&up);
        let magnitude = suspension::spring_damper(
            self.config.rest_length,
            hit.distance,
            v_up,
            self.config.spring_stiffness,
            self.config.damping,
        );
        up * magnitude
    }

    /// Sideways correction at the contact; also refreshes slip%. Airborne
    /// wheels report zero slip and zero force.
    pub fn compute_lateral_friction(&mut self, body: &BodyState, dt: Real) -> Vector<Real> {
        if self.contact.is_none() {
            self.lateral_velocity = 0.0;
            self.slip = 0.0;
            return Vector::zeros();
        }

        let (forward, right) = wheel_basis_world(body.rotation(), self.steer_angle);
        let v = body.point_velocity(&body.to_world(&self.mount));
        let (_v_long, v_lat) = slip_components(v, forward, right);

        self.lateral_velocity = v_lat;
        self.slip = friction::slip_percent(v_lat, self.config.max_slip_speed);

        if self.config.max_slip_speed <= 0.0 {
            return Vector::zeros();
        }
        let grip = self.config.traction_curve.evaluate(self.slip);
        friction::lateral_force(v_lat, &right, dt, grip, self.config.friction_multiplier)
    }

    /// Motor or brake along the wheel's forward axis. `mass_share` is the
    /// chassis mass divided among driven wheels.
    pub fn compute_longitudinal_force(&self, body: &BodyState, top_speed_ms: Real, mass_share: Real, dt: Real) -> Vector<Real> {
        if !self.driven || self.contact.is_none() {
            return Vector::zeros();
        }
        let (forward, right) = wheel_basis_world(body.rotation(), self.steer_angle);

        if self.motor != 0.0 {
            let speed_percent = if top_speed_ms > 0.0 {
                (body.linvel.dot(&body.forward()) / top_speed_ms).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let torque = self.config.torque_curve.evaluate(speed_percent);
            return friction::motor_force(&forward, self.motor, torque);
        }

        let v = body.point_velocity(&body.to_world(&self.mount));
        let (v_long, _v_lat) = slip_components(v, forward, right);
        friction::brake_force(&forward, v_long, self.brake, mass_share, dt)
    }

    /// Where this wheel's forces act: the wheel center above the contact.
    pub fn force_point(&self, body: &BodyState) -> Option<Point<Real>> {
        self.contact.map(|c| c.point + body.up() * self.config.radius)
    }

    // ------------------------------------------------------------------
    // Read-only outputs
    // ------------------------------------------------------------------

    pub fn is_drifting(&self) -> bool {
        self.contact.is_some() && self.slip > self.config.drift_threshold
    }

    #[inline]
    pub fn is_grounded(&self) -> bool {
        self.contact.is_some()
    }

    #[inline]
    pub fn contact(&self) -> Option<GroundContact> {
        self.contact
    }

    #[inline]
    pub fn slip(&self) -> Real {
        self.slip
    }

    #[inline]
    pub fn lateral_velocity(&self) -> Real {
        self.lateral_velocity
    }

    #[inline]
    pub fn steer_angle(&self) -> Real {
        self.steer_angle
    }

    #[inline]
    pub fn motor(&self) -> Real {
        self.motor
    }

    #[inline]
    pub fn brake(&self) -> Real {
        self.brake
    }

    pub fn config(&self) -> &WheelConfig {
        &self.config
    }

    /// World pose of the wheel center: resting on the contact when grounded,
    /// hanging at rest length otherwise.
    pub fn pose(&self, body: &BodyState) -> Isometry<Real> {
        let up = body.up();
        let center = match self.contact {
            Some(c) => c.point + up * self.config.radius,
            None => body.to_world(&self.mount) - up * self.config.rest_length,
        };
        let rotation = body.rotation() * steer_rotation(self.steer_angle);
        Isometry::from_parts(center.coords.into(), rotation)
    }

    pub fn telemetry(&self, body: &BodyState) -> WheelTelemetry {
        let pose = self.pose(body);
        let t = pose.translation.vector;
        let q = pose.rotation;
        WheelTelemetry {
            id: self.id,
            grounded: self.is_grounded(),
            slip: self.slip,
            drifting: self.is_drifting(),
            steer_angle: self.steer_angle,
            center: [t.x, t.y, t.z],
            rotation: [q.i, q.j, q.k, q.w],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{EmptySpace, FlatGround};
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn wheel(steering: bool, driven: bool) -> WheelUnit {
        let config = WheelConfig {
            rest_length: 0.5,
            spring_stiffness: 20_000.0,
            damping: 1_000.0,
            max_slip_speed: 1.0,
            friction_multiplier: 100.0,
            ..WheelConfig::default()
        };
        WheelUnit::new(WheelId::FL, point![0.8, 0.0, 1.3], steering, driven, config, 0.5).unwrap()
    }

    #[test]
    fn rejects_non_positive_rest_length() {
        let config = WheelConfig { rest_length: 0.0, ..WheelConfig::default() };
        let err = WheelUnit::new(WheelId::RR, Point::origin(), false, true, config, 0.4).unwrap_err();
        assert!(matches!(err, ConfigError::NonPositive { field: "wheel.rest_length", .. }));
    }

    #[test]
    fn steering_clamps_and_ignores_fixed_wheels() {
        let mut w = wheel(true, false);
        w.apply_steering(2.0);
        assert_relative_eq!(w.steer_angle(), 0.5);
        w.apply_steering(-2.0);
        assert_relative_eq!(w.steer_angle(), -0.5);

        let mut rear = wheel(false, true);
        rear.apply_steering(0.3);
        assert_eq!(rear.steer_angle(), 0.0);
    }

    #[test]
    fn throttle_and_brake_are_exclusive() {
        let mut w = wheel(false, true);
        w.apply_throttle(1_500.0);
        assert_eq!((w.motor(), w.brake()), (1_500.0, 0.0));
        w.apply_brake(3_000.0);
        assert_eq!((w.motor(), w.brake()), (0.0, 3_000.0));
        w.apply_throttle(-700.0);
        assert_eq!((w.motor(), w.brake()), (-700.0, 0.0));
    }

    #[test]
    fn undriven_wheel_ignores_drive_commands() {
        let mut w = wheel(true, false);
        w.apply_throttle(1_500.0);
        w.apply_brake(3_000.0);
        assert_eq!((w.motor(), w.brake()), (0.0, 0.0));
    }

    #[test]
    fn suspension_pushes_when_compressed() {
        let mut w = wheel(false, false);
        // mount at y = 0.4 -> hit distance 0.4, offset 0.1
        let body = BodyState::at_rest(vector![0.0, 0.4, 0.0], 0.0, 1_000.0);
        let f = w.compute_suspension_force(&body, &FlatGround::at(0.0));
        assert_relative_eq!(f, vector![0.0, 2_000.0, 0.0], epsilon = 1e-2);
        assert!(w.is_grounded());
        assert_relative_eq!(w.contact().unwrap().distance, 0.4, epsilon = 1e-6);
    }

    #[test]
    fn ray_is_bounded_by_twice_rest_length() {
        let mut w = wheel(false, false);
        let body = BodyState::at_rest(vector![0.0, 1.01, 0.0], 0.0, 1_000.0);
        assert_eq!(w.compute_suspension_force(&body, &FlatGround::at(0.0)), Vector::zeros());
        assert!(!w.is_grounded());
    }

    #[test]
    fn airborne_wheel_has_no_grip_or_slip() {
        let mut w = wheel(false, true);
        let mut body = BodyState::at_rest(vector![0.0, 5.0, 0.0], 0.0, 1_000.0);
        body.linvel = vector![5.0, 0.0, 0.0];
        w.compute_suspension_force(&body, &EmptySpace);
        assert_eq!(w.compute_lateral_friction(&body, 1.0 / 60.0), Vector::zeros());
        assert_eq!(w.slip(), 0.0);
        assert!(!w.is_drifting());
        w.apply_throttle(1_000.0);
        assert_eq!(w.compute_longitudinal_force(&body, 27.0, 300.0, 1.0 / 60.0), Vector::zeros());
    }

    #[test]
    fn full_slip_when_lateral_speed_exceeds_max() {
        let mut w = wheel(false, false);
        let mut body = BodyState::at_rest(vector![0.0, 0.4, 0.0], 0.0, 1_000.0);
        // -X is right, 5 m/s sideways against max_slip_speed 1
        body.linvel = vector![-5.0, 0.0, 0.0];
        w.compute_suspension_force(&body, &FlatGround::at(0.0));
        let f = w.compute_lateral_friction(&body, 0.1);
        assert_relative_eq!(w.slip(), 1.0);
        assert!(w.is_drifting());
        // force points back toward +X
        assert!(f.x > 0.0);
        assert_relative_eq!(f.y, 0.0);
    }

    #[test]
    fn motor_pushes_along_steered_forward() {
        let mut w = wheel(false, true);
        let body = BodyState::at_rest(vector![0.0, 0.4, 0.0], 0.0, 1_000.0);
        w.compute_suspension_force(&body, &FlatGround::at(0.0));
        w.apply_throttle(1_000.0);
        let f = w.compute_longitudinal_force(&body, 27.0, 500.0, 1.0 / 60.0);
        assert!(f.z > 0.0);
        assert_relative_eq!(f.x, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn grounded_pose_sits_on_contact() {
        let mut w = wheel(false, false);
        let body = BodyState::at_rest(vector![0.0, 0.4, 0.0], 0.0, 1_000.0);
        w.compute_suspension_force(&body, &FlatGround::at(0.0));
        let pose = w.pose(&body);
        assert_relative_eq!(pose.translation.vector.y, w.config().radius, epsilon = 1e-5);
    }

    proptest! {
        #[test]
        fn prop_suspension_zero_on_miss(
            x in -50.0f32..50.0, y in -50.0f32..50.0, z in -50.0f32..50.0,
            yaw in -3.0f32..3.0,
            vx in -30.0f32..30.0, vy in -30.0f32..30.0,
        ) {
            let mut w = wheel(true, true);
            let mut body = BodyState::at_rest(vector![x, y, z], yaw, 1_200.0);
            body.linvel = vector![vx, vy, 0.0];
            let f = w.compute_suspension_force(&body, &EmptySpace);
            prop_assert_eq!(f, Vector::zeros());
            prop_assert!(!w.is_grounded());
        }
    }
}
