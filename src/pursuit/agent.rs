// ==============================================================================
// agent.rs — ONE AI PURSUER
// ------------------------------------------------------------------------------
// Per tick, against the previous tick's settled snapshot:
//   predict target -> catch check -> path request (rate limited)
//   -> steering target -> separation blend -> obstacle scan
//   -> FSM transition -> DriveCommand
//
// The agent only writes its own state. It never touches a rigid body.
// ==============================================================================

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rapier3d::prelude::*;
use tracing::{debug, info};

use crate::config::PursuitConfig;
use crate::error::ConfigError;
use crate::events::{EventSink, SimEvent};
use crate::surface::SurfaceQuery;
use crate::wheel::kinematics::BodyState;
use crate::world::VehicleId;

use super::decision::{AvoidSide, DecisionState, DriveCommand, FsmState, Sensors, transition};
use super::planner::{PathReply, PathRequest, PursuitPlanner, predict_target};
use super::scanner::{ScanResult, scan};
use super::separation::{blend_direction, compute_separation};

/// Everything one agent tick produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutput {
    pub command: DriveCommand,
    pub path_request: Option<PathRequest>,
    pub scan: ScanResult,
}

#[derive(Debug, Clone)]
pub struct PursuitAgent {
    target: VehicleId,
    config: PursuitConfig,
    fsm: FsmState,
    planner: PursuitPlanner,
    rng: ChaCha8Rng,
    catch_timer: Real,
    caught: bool,
}

impl PursuitAgent {
    pub fn new(target: VehicleId, config: PursuitConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        let planner = PursuitPlanner::new(config.replan_interval, config.corner_reach_radius);
        Ok(Self {
            target,
            config,
            fsm: FsmState::default(),
            planner,
            rng: ChaCha8Rng::seed_from_u64(seed),
            catch_timer: 0.0,
            caught: false,
        })
    }

    pub fn target(&self) -> VehicleId {
        self.target
    }

    pub fn decision(&self) -> DecisionState {
        self.fsm.decision
    }

    pub fn fsm(&self) -> &FsmState {
        &self.fsm
    }

    pub fn has_caught(&self) -> bool {
        self.caught
    }

    pub fn catch_timer(&self) -> Real {
        self.catch_timer
    }

    pub fn planner(&self) -> &PursuitPlanner {
        &self.planner
    }

    pub fn accept_path(&mut self, reply: PathReply) -> bool {
        self.planner.accept(reply)
    }

    /// `neighbors` are the positions of the other pursuers.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        me: VehicleId,
        own: &BodyState,
        target: &BodyState,
        neighbors: &[Point<Real>],
        surface: &dyn SurfaceQuery,
        dt: Real,
        events: &mut dyn EventSink,
    ) -> AgentOutput {
        let position = Point::from(own.translation());
        let predicted = predict_target(&Point::from(target.translation()), &target.linvel, self.config.prediction_time);
        let distance = (predicted - position).norm();

        self.update_catch(me, distance, target.speed(), dt, events);
        if self.caught {
            return AgentOutput { command: DriveCommand::HOLD, path_request: None, scan: ScanResult::default() };
        }

        let path_request = self.planner.tick(me, position, predicted, dt);
        let steer_target = self.planner.steering_target(&position, &predicted);

        let separation = compute_separation(&position, neighbors, self.config.separation_radius);
        let direction = blend_direction(&(steer_target - position), &separation, self.config.separation_strength);

        let geometry = &self.config.scan;
        let scan = scan(
            surface,
            &own.to_world(&Point::from(geometry.center)),
            &own.to_world(&Point::from(geometry.left)),
            &own.to_world(&Point::from(geometry.right)),
            &own.forward(),
            geometry.detection_distance,
        );

        // only roll the dice when avoidance can start this tick
        let avoid_side = if scan.blocked() && !self.fsm.decision.is_avoiding() {
            if self.rng.gen_bool(0.5) { AvoidSide::Right } else { AvoidSide::Left }
        } else {
            AvoidSide::Right
        };

        let sensors = Sensors {
            forward: own.forward(),
            direction,
            distance,
            speed: own.speed(),
            blocked: scan.blocked(),
            avoid_side,
            dt,
        };

        let (next, command) = transition(&self.fsm, &sensors, &self.config);
        if next.decision != self.fsm.decision {
            debug!(vehicle = %me, from = ?self.fsm.decision, to = ?next.decision, distance, "pursuit decision");
        }
        self.fsm = next;

        AgentOutput { command, path_request, scan }
    }

    fn update_catch(&mut self, me: VehicleId, distance: Real, target_speed: Real, dt: Real, events: &mut dyn EventSink) {
        if self.caught {
            return;
        }
        if distance <= self.config.catch_distance && target_speed < self.config.min_catch_speed {
            self.catch_timer += dt;
            if self.catch_timer >= self.config.catch_time {
                self.caught = true;
                info!(pursuer = %me, target = %self.target, "target caught");
                events.emit(SimEvent::TargetCaught { pursuer: me, target: self.target });
            }
        } else {
            self.catch_timer = 0.0;
        }
    }
}
