// ==============================================================================
// vehicle — CHASSIS + 4 WHEELS + STABILIZER
// ------------------------------------------------------------------------------
// VehicleBody wraps one rapier rigid body. It never holds a borrow of the body
// set: the world feeds it a BodyState snapshot (`sync_state`), asks it for the
// tick's impulses (`compute_forces`), and applies the resulting ForcePlan.
//
//   drive(steer, throttle)  -> wheel commands (steer lock, motor XOR brake)
//   compute_forces(...)     -> suspension + grip + drive per grounded wheel,
//                              down-force, flip assist
//   ForcePlan::apply(rb)    -> impulses into rapier
// ==============================================================================

pub mod stabilizer;
pub mod steering;
pub mod telemetry;

use rapier3d::prelude::*;
use tracing::{debug, info, warn};

use crate::config::VehicleConfig;
use crate::error::ConfigError;
use crate::events::{EventSink, SimEvent};
use crate::surface::SurfaceQuery;
use crate::wheel::kinematics::BodyState;
use crate::wheel::{WheelId, WheelUnit};
use crate::world::VehicleId;

use stabilizer::Stabilizer;
use steering::{DriveForce, clamp_axis, drive_force, effective_steer_deg};
use telemetry::VehicleTelemetry;

/// Impulses collected for one body during a tick, applied in one go.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForcePlan {
    pub impulses: Vec<(Vector<Real>, Option<Point<Real>>)>,
    pub torque_impulse: Vector<Real>,
}

impl ForcePlan {
    pub fn is_empty(&self) -> bool {
        self.impulses.is_empty() && self.torque_impulse == Vector::zeros()
    }

    pub fn apply(&self, body: &mut RigidBody) {
        for (impulse, point) in &self.impulses {
            match point {
                Some(p) => body.apply_impulse_at_point(*impulse, *p, true),
                None => body.apply_impulse(*impulse, true),
            }
        }
        if self.torque_impulse != Vector::zeros() {
            body.apply_torque_impulse(self.torque_impulse, true);
        }
    }
}

#[derive(Debug, Clone)]
pub struct VehicleBody {
    id: VehicleId,
    handle: RigidBodyHandle,
    config: VehicleConfig,
    wheels: [WheelUnit; 4],
    stabilizer: Stabilizer,
    state: BodyState,
    steer: Real,      // last applied input
    throttle: Real,   // last applied input
    lost: bool,
}

impl VehicleBody {
    pub fn new(id: VehicleId, handle: RigidBodyHandle, config: VehicleConfig, state: BodyState) -> Result<Self, ConfigError> {
        config.validate()?;
        let wheels = Self::wheel_layout(&config)?;
        let stabilizer = Stabilizer::new(config.stabilizer.clone());
        Ok(Self {
            id,
            handle,
            config,
            wheels,
            stabilizer,
            state,
            steer: 0.0,
            throttle: 0.0,
            lost: false,
        })
    }

    /// FL/FR/RL/RR mounts. Left is +X since the chassis right axis is -X.
    fn wheel_layout(config: &VehicleConfig) -> Result<[WheelUnit; 4], ConfigError> {
        let max_steer = config.max_steer_angle_deg.to_radians();
        let make = |id: WheelId| {
            let x = if id.is_left() { config.track_half_width } else { -config.track_half_width };
            let z = if id.is_front() { config.front_axle_z } else { config.rear_axle_z };
            let driven = if id.is_front() { config.front_drive } else { config.rear_drive };
            WheelUnit::new(
                id,
                point![x, config.mount_height, z],
                id.is_front(),
                driven,
                config.wheel.clone(),
                max_steer,
            )
        };
        Ok([make(WheelId::FL)?, make(WheelId::FR)?, make(WheelId::RL)?, make(WheelId::RR)?])
    }

    // ------------------------------------------------------------------
    // Per-tick pipeline
    // ------------------------------------------------------------------

    /// Readback from the integrator.
    pub fn sync_state(&mut self, state: BodyState) {
        self.state = state;
    }

    pub fn drive(&mut self, steer: Real, throttle: Real) {
        self.steer = clamp_axis(steer);
        self.throttle = clamp_axis(throttle);

        let speed_kph = self.state.speed_kph();
        let lock = effective_steer_deg(
            self.config.max_steer_angle_deg,
            self.config.min_steer_angle_deg,
            speed_kph,
            self.config.top_speed_kph,
        )
        .to_radians();

        let force = drive_force(
            self.throttle,
            speed_kph,
            self.config.top_speed_kph,
            self.config.motor_force,
            self.config.brake_force,
        );

        for wheel in self.wheels.iter_mut() {
            wheel.apply_steering(self.steer * lock);
            match force {
                DriveForce::Motor(f) => wheel.apply_throttle(f),
                DriveForce::Brake(f) => wheel.apply_brake(f),
            }
        }
    }

    /// Everything the chassis receives this tick, as impulses. A lost vehicle
    /// receives nothing.
    pub fn compute_forces(&mut self, surface: &dyn SurfaceQuery, dt: Real, events: &mut dyn EventSink) -> ForcePlan {
        let mut plan = ForcePlan::default();
        if self.lost {
            return plan;
        }

        let body = self.state;
        let driven = self.wheels.iter().filter(|w| w.driven).count().max(1);
        let mass_share = body.mass / driven as Real;
        let top_speed_ms = self.config.top_speed_ms();

        for wheel in self.wheels.iter_mut() {
            let suspension = wheel.compute_suspension_force(&body, surface);
            let lateral = wheel.compute_lateral_friction(&body, dt);
            let longitudinal = wheel.compute_longitudinal_force(&body, top_speed_ms, mass_share, dt);

            if let Some(point) = wheel.force_point(&body) {
                plan.impulses.push(((suspension + lateral + longitudinal) * dt, Some(point)));
            }
        }

        let stab = self.stabilizer.update(&body, dt);
        plan.impulses.push((stab.down_force * dt, None));
        plan.torque_impulse = stab.righting_torque * dt;

        if let Some(flip) = stab.auto_flip {
            plan.torque_impulse += flip.torque_impulse;
            plan.impulses.push((flip.lift_impulse, None));
            info!(vehicle = %self.id, "auto-flip assist");
            events.emit(SimEvent::AutoFlip { vehicle: self.id });
        }

        plan
    }

    /// Marks the vehicle lost once it drops below `threshold`. Emits the
    /// terminal event on the first crossing only. Returns the lost flag.
    pub fn check_out_of_bounds(&mut self, threshold: Real, events: &mut dyn EventSink) -> bool {
        if self.lost {
            return true;
        }
        let p = self.state.translation();
        if p.y >= threshold {
            return false;
        }

        self.lost = true;
        self.state.linvel = Vector::zeros();
        self.state.angvel = Vector::zeros();
        warn!(vehicle = %self.id, y = p.y, threshold, "vehicle lost below water level");
        events.emit(SimEvent::VehicleLost { vehicle: self.id, position: [p.x, p.y, p.z] });
        true
    }

    /// Manual "get me back on my wheels". Only for an inverted, near-stopped
    /// chassis; returns the new pose when it applies.
    pub fn recover(&mut self) -> Option<Isometry<Real>> {
        if self.lost {
            return None;
        }
        let pose = self.stabilizer.recover_upright(&self.state)?;
        self.state.position = pose;
        self.state.com = Point::from(pose.translation.vector);
        self.state.linvel = Vector::zeros();
        self.state.angvel = Vector::zeros();
        debug!(vehicle = %self.id, "recovered upright");
        Some(pose)
    }

    // ------------------------------------------------------------------
    // Read-only
    // ------------------------------------------------------------------

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn handle(&self) -> RigidBodyHandle {
        self.handle
    }

    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }

    pub fn state(&self) -> &BodyState {
        &self.state
    }

    pub fn wheels(&self) -> &[WheelUnit; 4] {
        &self.wheels
    }

    pub fn wheel(&self, id: WheelId) -> &WheelUnit {
        &self.wheels[id as usize]
    }

    pub fn is_lost(&self) -> bool {
        self.lost
    }

    pub fn is_flipped(&self) -> bool {
        self.stabilizer.is_flipped()
    }

    pub fn flip_timer(&self) -> Real {
        self.stabilizer.flip_timer()
    }

    pub fn max_slip(&self) -> Real {
        self.wheels.iter().map(|w| w.slip()).fold(0.0, Real::max)
    }

    pub fn is_drifting(&self) -> bool {
        self.wheels.iter().any(|w| w.is_drifting())
    }

    pub fn telemetry(&self) -> VehicleTelemetry {
        let t = self.state.translation();
        let q = self.state.rotation();
        let speed = self.state.speed();
        VehicleTelemetry {
            id: self.id,
            position: [t.x, t.y, t.z],
            rotation: [q.i, q.j, q.k, q.w],
            speed,
            speed_kph: self.state.speed_kph(),
            steer: self.steer,
            throttle: self.throttle,
            wheels: self.wheels.iter().map(|w| w.telemetry(&self.state)).collect(),
            max_slip: self.max_slip(),
            drifting: self.is_drifting(),
            flipped: self.is_flipped(),
            lost: self.lost,
            throttle_effect: self.throttle.abs(),
            speed_percent: speed / 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{EmptySpace, FlatGround};
    use approx::assert_relative_eq;

    fn car() -> VehicleBody {
        // mounts at y = 0.4 above flat ground: grounded, slightly compressed
        let state = BodyState::at_rest(vector![0.0, 0.5, 0.0], 0.0, 1_200.0);
        VehicleBody::new(VehicleId(1), RigidBodyHandle::invalid(), VehicleConfig::player_car(), state).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = VehicleConfig::player_car();
        config.top_speed_kph = 0.0;
        let state = BodyState::at_rest(Vector::zeros(), 0.0, 1.0);
        assert!(VehicleBody::new(VehicleId(1), RigidBodyHandle::invalid(), config, state).is_err());
    }

    #[test]
    fn layout_puts_steering_front_and_drive_rear() {
        let v = car();
        assert!(v.wheel(WheelId::FL).steering && !v.wheel(WheelId::FL).driven);
        assert!(v.wheel(WheelId::RR).driven && !v.wheel(WheelId::RR).steering);
        assert!(v.wheel(WheelId::FL).mount.x > 0.0);
        assert!(v.wheel(WheelId::FR).mount.x < 0.0);
    }

    #[test]
    fn steering_only_without_throttle_never_applies_motor() {
        let mut v = car();
        v.drive(0.8, 0.04);
        for w in v.wheels() {
            assert_eq!(w.motor(), 0.0);
        }
        assert!(v.wheel(WheelId::RL).brake() > 0.0);
        assert_relative_eq!(v.wheel(WheelId::FL).steer_angle(), (0.8 * 25.0_f32).to_radians(), epsilon = 1e-5);
    }

    #[test]
    fn non_finite_input_is_released() {
        let mut v = car();
        v.drive(f32::NAN, f32::INFINITY);
        for w in v.wheels() {
            assert_eq!(w.motor(), 0.0);
            assert_eq!(w.steer_angle(), 0.0);
        }
        let t = v.telemetry();
        assert_eq!((t.steer, t.throttle), (0.0, 0.0));
    }

    #[test]
    fn throttle_drives_rear_wheels_only() {
        let mut v = car();
        v.drive(0.0, 1.0);
        assert_eq!(v.wheel(WheelId::RL).motor(), 3_000.0);
        assert_eq!(v.wheel(WheelId::FL).motor(), 0.0);
    }

    #[test]
    fn steer_lock_follows_speed() {
        let mut v = car();
        let mut s = *v.state();
        s.linvel = vector![0.0, 0.0, 100.0 / 3.6 / 2.0]; // 50 kph
        v.sync_state(s);
        v.drive(1.0, 0.0);
        assert_relative_eq!(v.wheel(WheelId::FR).steer_angle(), 15.0_f32.to_radians(), epsilon = 1e-4);
    }

    #[test]
    fn grounded_car_gets_upward_impulses() {
        let mut v = car();
        let mut events: Vec<SimEvent> = Vec::new();
        v.drive(0.0, 0.0);
        let plan = v.compute_forces(&FlatGround::at(0.0), 1.0 / 60.0, &mut events);
        let wheel_impulses: Vec<_> = plan.impulses.iter().filter(|(_, p)| p.is_some()).collect();
        assert_eq!(wheel_impulses.len(), 4);
        assert!(wheel_impulses.iter().all(|(j, _)| j.y > 0.0));
        assert!(events.is_empty());
    }

    #[test]
    fn airborne_car_gets_no_wheel_impulses() {
        let mut v = car();
        let mut events: Vec<SimEvent> = Vec::new();
        v.drive(0.5, 1.0);
        let plan = v.compute_forces(&EmptySpace, 1.0 / 60.0, &mut events);
        assert!(plan.impulses.iter().all(|(_, p)| p.is_none()));
        assert!(v.wheels().iter().all(|w| !w.is_grounded()));
    }

    #[test]
    fn out_of_bounds_fires_once() {
        let mut v = car();
        let mut events: Vec<SimEvent> = Vec::new();
        assert!(!v.check_out_of_bounds(-10.0, &mut events));

        let mut s = *v.state();
        s.position.translation.vector.y = -11.0;
        s.linvel = vector![0.0, -8.0, 0.0];
        v.sync_state(s);
        assert!(v.check_out_of_bounds(-10.0, &mut events));
        assert!(v.check_out_of_bounds(-10.0, &mut events));

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], SimEvent::VehicleLost { vehicle: VehicleId(1), .. }));
        assert!(v.is_lost());
        assert_eq!(v.state().linvel, Vector::zeros());
        assert!(v.compute_forces(&FlatGround::at(0.0), 0.1, &mut events).is_empty());
    }

    #[test]
    fn telemetry_reports_engine_drivers() {
        let mut v = car();
        v.drive(-0.5, -0.6);
        let t = v.telemetry();
        assert_relative_eq!(t.throttle_effect, 0.6);
        assert_eq!(t.wheels.len(), 4);
        assert!(!t.lost && !t.flipped);
    }
}
