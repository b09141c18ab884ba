// ==============================================================================
// stabilizer.rs — DOWN-FORCE + ANTI-FLIP
// ------------------------------------------------------------------------------
// Runs once per fixed tick on the chassis snapshot:
// - down-force: -up * coefficient * speed
// - flip watch: angle(body up, world up) past the detection angle accumulates
//   a timer and applies a passive righting torque ~ cross(body_up, world_up)
// - auto-flip: once the timer reaches time_to_auto_flip, one torque impulse
//   about the body right axis plus one upward impulse, then the timer restarts
// - back within the detection angle resets the timer
// ==============================================================================

use nalgebra::UnitQuaternion;
use rapier3d::prelude::*;

use crate::config::StabilizerConfig;
use crate::wheel::kinematics::{BodyState, WORLD_UP, angle_between};

/// One-shot impulses of an auto-flip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoFlipImpulse {
    pub torque_impulse: Vector<Real>,
    pub lift_impulse: Vector<Real>,
}

/// Per-tick stabilizer output. Forces and torques are continuous (N, N*m).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stabilization {
    pub down_force: Vector<Real>,
    pub righting_torque: Vector<Real>,
    pub auto_flip: Option<AutoFlipImpulse>,
}

#[derive(Debug, Clone)]
pub struct Stabilizer {
    config: StabilizerConfig,
    flip_timer: Real,
    flipped: bool,
}

impl Stabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        Self { config, flip_timer: 0.0, flipped: false }
    }

    pub fn flip_timer(&self) -> Real {
        self.flip_timer
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    /// Tilt of the chassis from world up, degrees.
    pub fn tilt_deg(body: &BodyState) -> Real {
        angle_between(&body.up(), &WORLD_UP).to_degrees()
    }

    pub fn update(&mut self, body: &BodyState, dt: Real) -> Stabilization {
        let up = body.up();
        let down_force = -up * (self.config.down_force * body.speed());

        if Self::tilt_deg(body) <= self.config.flip_detection_angle_deg {
            self.flipped = false;
            self.flip_timer = 0.0;
            return Stabilization { down_force, righting_torque: Vector::zeros(), auto_flip: None };
        }

        self.flipped = true;
        self.flip_timer += dt;
        let righting_torque = up.cross(&WORLD_UP) * self.config.flip_torque;

        let auto_flip = (self.flip_timer >= self.config.time_to_auto_flip).then(|| {
            self.flip_timer = 0.0;
            AutoFlipImpulse {
                torque_impulse: body.right() * self.config.auto_flip_torque_impulse,
                lift_impulse: WORLD_UP * self.config.auto_flip_lift_impulse,
            }
        });

        Stabilization { down_force, righting_torque, auto_flip }
    }

    /// Yaw-preserving upright pose for a stopped, inverted chassis. `None`
    /// when the body is upright enough or still moving.
    pub fn recover_upright(&mut self, body: &BodyState) -> Option<Isometry<Real>> {
        if Self::tilt_deg(body) <= self.config.flip_detection_angle_deg {
            return None;
        }
        if body.speed() > self.config.recover_max_speed {
            return None;
        }

        let fwd = body.forward();
        let flat = vector![fwd.x, 0.0, fwd.z];
        let yaw = if flat.norm() > 1e-4 { flat.x.atan2(flat.z) } else { 0.0 };
        let rotation = UnitQuaternion::from_axis_angle(&Vector::y_axis(), yaw);
        let translation = body.translation() + WORLD_UP * self.config.recover_lift;

        self.flip_timer = 0.0;
        self.flipped = false;
        Some(Isometry::from_parts(translation.into(), rotation))
    }
}
