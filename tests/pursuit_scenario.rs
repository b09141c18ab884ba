// Drives a single PursuitAgent against a tiny kinematic integrator instead of
// rapier, so the decision/catch loop can be checked in isolation.

use pursuit_server::config::PursuitConfig;
use pursuit_server::pursuit::{DecisionState, PursuitAgent};
use pursuit_server::surface::EmptySpace;
use pursuit_server::wheel::kinematics::BodyState;
use pursuit_server::{SimEvent, VehicleId};
use rapier3d::prelude::*;

const DT: Real = 1.0 / 60.0;
const SPEED: Real = 2.0; // m/s at full throttle
const BUMPER: Real = 0.8; // the two bodies can't get closer than this

struct Kinematic {
    position: Vector<Real>,
    yaw: Real,
    velocity: Vector<Real>,
}

impl Kinematic {
    fn state(&self) -> BodyState {
        let mut s = BodyState::at_rest(self.position, self.yaw, 1_400.0);
        s.linvel = self.velocity;
        s
    }

    fn integrate(&mut self, steer: Real, throttle: Real, target: &Vector<Real>) {
        let forward = vector![self.yaw.sin(), 0.0, self.yaw.cos()];
        let signed_speed = throttle * SPEED;
        // positive steer turns toward -X, i.e. yaw decreases when rolling forward
        self.yaw -= steer * signed_speed * 0.3 * DT;
        let next = self.position + forward * signed_speed * DT;
        if (next - target).norm() < BUMPER {
            self.velocity = Vector::zeros();
        } else {
            self.velocity = next - self.position;
            self.velocity /= DT;
            self.position = next;
        }
    }
}

fn scenario_config() -> PursuitConfig {
    PursuitConfig {
        reverse_distance: 5.0,
        catch_distance: 1.0,
        min_catch_speed: 2.0,
        ..PursuitConfig::default()
    }
}

#[test]
fn pursuer_facing_away_reverses_into_a_catch() {
    let config = scenario_config();
    let catch_time = config.catch_time;
    let mut agent = PursuitAgent::new(VehicleId(1), config, 11).unwrap();
    let target = BodyState::at_rest(vector![0.0, 0.5, 0.0], 0.0, 1_200.0);
    let target_position = target.translation();

    // 3 m in front of the target, nose pointing away from it
    let mut pursuer = Kinematic { position: vector![0.0, 0.5, 3.0], yaw: 0.0, velocity: Vector::zeros() };
    let mut events: Vec<SimEvent> = Vec::new();

    let mut last_distance = (pursuer.position - target_position).norm();
    let mut in_range_since: Option<Real> = None;
    let mut caught_at: Option<Real> = None;

    for tick in 0..600 {
        let t = tick as Real * DT;
        let out = agent.update(VehicleId(2), &pursuer.state(), &target, &[], &EmptySpace, DT, &mut events);

        if tick == 0 {
            assert_eq!(agent.decision(), DecisionState::Reversing);
            assert_eq!(out.command.throttle, -1.0);
            assert!(out.command.steer.abs() < 1e-4, "target dead astern, got {}", out.command.steer);
        }

        let distance = (pursuer.position - target_position).norm();
        if tick > 0 && tick < 30 {
            assert!(distance < last_distance, "tick {tick}: {distance} >= {last_distance}");
        }
        last_distance = distance;

        if distance <= 1.0 && in_range_since.is_none() {
            in_range_since = Some(t);
        }
        if agent.has_caught() && caught_at.is_none() {
            caught_at = Some(t);
        }

        pursuer.integrate(out.command.steer, out.command.throttle, &target_position);
    }

    let caught_events: Vec<_> = events.iter().filter(|e| matches!(e, SimEvent::TargetCaught { .. })).collect();
    assert_eq!(caught_events.len(), 1);
    assert_eq!(caught_events[0], &SimEvent::TargetCaught { pursuer: VehicleId(2), target: VehicleId(1) });

    let entered = in_range_since.expect("pursuer reached catch range");
    let caught = caught_at.expect("target caught");
    assert!(caught - entered >= catch_time - 2.0 * DT, "caught {caught}s, in range since {entered}s");
    assert!((pursuer.position - target_position).norm() <= 1.0);
}

#[test]
fn fast_target_is_never_caught() {
    let mut agent = PursuitAgent::new(VehicleId(1), scenario_config(), 3).unwrap();
    let mut target = BodyState::at_rest(vector![0.0, 0.5, 0.0], 0.0, 1_200.0);
    target.linvel = vector![0.0, 0.0, 5.0];
    // sitting right on top of the (predicted) target, but it is moving too fast
    let own = BodyState::at_rest(vector![0.0, 0.5, 2.5], 0.0, 1_400.0);
    let mut events: Vec<SimEvent> = Vec::new();

    for _ in 0..240 {
        agent.update(VehicleId(2), &own, &target, &[], &EmptySpace, DT, &mut events);
    }
    assert!(events.is_empty());
    assert!(!agent.has_caught());
}
