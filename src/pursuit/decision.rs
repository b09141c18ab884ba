// ==============================================================================
// decision.rs — PURSUIT DECISION STATE MACHINE
// ------------------------------------------------------------------------------
// Pure transition: (FsmState, Sensors, PursuitConfig) -> (FsmState, DriveCommand)
//
// Priority, highest first:
//   1. AvoidingObstacle  while its timer runs, whatever the scans say
//   2. AvoidingObstacle  entered when a scan reports blocked
//   3. Stuck             low speed for longer than stuck_time, inverts nominal
//   4. Reversing / ChasingForward, re-decided only when the cooldown expires
//
// The stuck clock runs every tick. The forward/reverse cooldown only runs on
// ticks that reach step 3.
// ==============================================================================

use rapier3d::prelude::*;
use serde::Serialize;

use crate::config::PursuitConfig;
use crate::wheel::kinematics::signed_yaw;

/// Remaining avoidance time below this counts as expired.
const AVOID_EPSILON: Real = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AvoidSide {
    Left,
    Right,
}

impl AvoidSide {
    pub fn steer(self) -> Real {
        match self {
            AvoidSide::Left => -1.0,
            AvoidSide::Right => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DecisionState {
    #[default]
    ChasingForward,
    Reversing,
    Stuck,
    AvoidingObstacle { side: AvoidSide },
}

impl DecisionState {
    pub fn is_avoiding(&self) -> bool {
        matches!(self, DecisionState::AvoidingObstacle { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DriveCommand {
    pub steer: Real,
    pub throttle: Real,
}

impl DriveCommand {
    pub const HOLD: DriveCommand = DriveCommand { steer: 0.0, throttle: 0.0 };

    pub fn inverted(self) -> Self {
        Self { steer: -self.steer, throttle: -self.throttle }
    }
}

/// What the agent perceived this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sensors {
    pub forward: Vector<Real>,
    /// Unit direction toward the steering target, separation already mixed in.
    /// Zero when there is nowhere to go.
    pub direction: Vector<Real>,
    /// Distance to the predicted target.
    pub distance: Real,
    pub speed: Real,
    pub blocked: bool,
    /// Side to use if avoidance starts this tick.
    pub avoid_side: AvoidSide,
    pub dt: Real,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FsmState {
    pub decision: DecisionState,
    pub avoid_remaining: Real,
    pub stuck_time: Real,
    pub cooldown: Real,
    /// Last forward/reverse verdict, held between cooldowns.
    pub reversing: bool,
}

impl Default for FsmState {
    fn default() -> Self {
        Self {
            decision: DecisionState::ChasingForward,
            avoid_remaining: 0.0,
            stuck_time: 0.0,
            cooldown: 0.0,
            reversing: false,
        }
    }
}

fn normalized_steer(yaw: Real, config: &PursuitConfig) -> Real {
    (yaw.to_degrees() / config.steer_normalization_deg).clamp(-1.0, 1.0)
}

/// Full throttle, nose toward the target.
pub fn chase_command(s: &Sensors, config: &PursuitConfig) -> DriveCommand {
    let steer = if s.direction == Vector::zeros() {
        0.0
    } else {
        normalized_steer(signed_yaw(&s.forward, &s.direction), config)
    };
    DriveCommand { steer, throttle: 1.0 }
}

/// Full reverse, tail toward the target. The angle is measured from the rear
/// and the sign flipped: reversing with the wheels turned right moves the
/// tail right.
pub fn reverse_command(s: &Sensors, config: &PursuitConfig) -> DriveCommand {
    let steer = if s.direction == Vector::zeros() {
        0.0
    } else {
        -normalized_steer(signed_yaw(&-s.forward, &s.direction), config)
    };
    DriveCommand { steer, throttle: -1.0 }
}

pub fn transition(state: &FsmState, s: &Sensors, config: &PursuitConfig) -> (FsmState, DriveCommand) {
    let dt = s.dt.max(0.0);
    let mut next = *state;

    next.stuck_time = if s.speed < config.stuck_speed { state.stuck_time + dt } else { 0.0 };

    if let DecisionState::AvoidingObstacle { side } = state.decision {
        if state.avoid_remaining > AVOID_EPSILON {
            next.avoid_remaining = state.avoid_remaining - dt;
            return (next, DriveCommand { steer: side.steer(), throttle: -1.0 });
        }
    }

    if s.blocked {
        let side = s.avoid_side;
        next.decision = DecisionState::AvoidingObstacle { side };
        next.avoid_remaining = config.avoid_duration - dt;
        return (next, DriveCommand { steer: side.steer(), throttle: -1.0 });
    }
    next.avoid_remaining = 0.0;

    next.cooldown = state.cooldown - dt;
    if next.cooldown <= 0.0 {
        let alignment = s.forward.dot(&s.direction);
        next.reversing = alignment < config.alignment_threshold && s.distance <= config.reverse_distance;
        next.cooldown = config.decision_cooldown;
    }

    let (nominal_state, nominal) = if next.reversing {
        (DecisionState::Reversing, reverse_command(s, config))
    } else {
        (DecisionState::ChasingForward, chase_command(s, config))
    };

    let stuck = match state.decision {
        DecisionState::Stuck => s.speed < config.stuck_speed,
        _ => next.stuck_time > config.stuck_time,
    };

    if stuck {
        next.decision = DecisionState::Stuck;
        (next, nominal.inverted())
    } else {
        next.decision = nominal_state;
        (next, nominal)
    }
}
