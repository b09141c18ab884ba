// ==============================================================================
// world.rs — SIMULATION WORLD (RAPIER + VEHICLES + PURSUIT)
// ------------------------------------------------------------------------------
// Owns every rapier set, the vehicles (BTreeMap: iteration order is part of
// determinism), the path request queue, the optional navigation planner and
// the event sink.
//
// step():
//   1. snapshot      every vehicle's settled BodyState from the last tick
//   2. decisions     pursuit agents read the snapshot only
//   3. drive         wheel commands -> ForcePlan per vehicle (impulses)
//   4. integrate     rapier PhysicsPipeline::step
//   5. readback      sync BodyState, out-of-bounds check
//   6. paths         serve queued path requests within the per-tick budget
// ==============================================================================

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use rapier3d::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{SimConfig, VehicleConfig};
use crate::error::{SimError, SimResult};
use crate::events::EventSink;
use crate::pursuit::{DecisionState, DriveCommand, NavPlanner, PathRequest, PursuitAgent};
use crate::surface::RapierSurface;
use crate::vehicle::steering::clamp_axis;
use crate::vehicle::telemetry::VehicleTelemetry;
use crate::vehicle::{ForcePlan, VehicleBody};
use crate::wheel::kinematics::{BodyState, WORLD_UP};

const GROUP_GROUND: Group = Group::from_bits_truncate(0b0001);
const GROUP_CHASSIS: Group = Group::from_bits_truncate(0b0010);
const GROUP_OBSTACLE: Group = Group::from_bits_truncate(0b0100);

/// Chassis body contacts only. Tire grip comes from the wheel model.
const CHASSIS_FRICTION: Real = 1.0;

/// Ground slab thickness below y = 0.
const GROUND_HALF_HEIGHT: Real = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub u32);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleRole {
    Player,
    Police,
}

struct WorldVehicle {
    role: VehicleRole,
    body: VehicleBody,
    agent: Option<PursuitAgent>,
    input: DriveCommand,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleSnapshot {
    #[serde(flatten)]
    pub telemetry: VehicleTelemetry,
    pub role: VehicleRole,
    pub decision: Option<DecisionState>,
    pub target: Option<VehicleId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub time: f32,
    pub vehicles: Vec<VehicleSnapshot>,
}

pub struct SimWorld {
    config: SimConfig,
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    query_pipeline: QueryPipeline,

    vehicles: BTreeMap<VehicleId, WorldVehicle>,
    next_id: u32,
    path_queue: VecDeque<PathRequest>,
    nav: Option<Box<dyn NavPlanner>>,
    events: Box<dyn EventSink + Send>,
    tick: u64,
    elapsed: Real,
}

impl SimWorld {
    pub fn new(config: SimConfig, events: Box<dyn EventSink + Send>) -> SimResult<Self> {
        config.validate()?;

        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();

        // Flat static slab whose top face is y = 0.
        let [hx, hz] = config.world.ground_half_extents;
        let ground = bodies.insert(RigidBodyBuilder::fixed().translation(vector![0.0, -GROUND_HALF_HEIGHT, 0.0]));
        let ground_collider = ColliderBuilder::cuboid(hx, GROUND_HALF_HEIGHT, hz)
            .collision_groups(InteractionGroups::new(GROUP_GROUND, GROUP_CHASSIS))
            .friction(config.world.ground_friction)
            .restitution(0.0)
            .build();
        colliders.insert_with_parent(ground_collider, ground, &mut bodies);

        let [gx, gy, gz] = config.world.gravity;
        let integration_parameters = IntegrationParameters { dt: config.world.fixed_dt, ..IntegrationParameters::default() };

        info!(dt = config.world.fixed_dt, ground = ?config.world.ground_half_extents, "simulation world ready");

        Ok(Self {
            gravity: vector![gx, gy, gz],
            integration_parameters,
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies,
            colliders,
            joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            vehicles: BTreeMap::new(),
            next_id: 1,
            path_queue: VecDeque::new(),
            nav: None,
            events,
            tick: 0,
            elapsed: 0.0,
            config,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn set_nav_planner(&mut self, nav: Box<dyn NavPlanner>) {
        self.nav = Some(nav);
    }

    /// Static box obstacle. Hit by suspension rays and obstacle scans.
    pub fn add_static_box(&mut self, center: [f32; 3], half_extents: [f32; 3]) -> ColliderHandle {
        let [cx, cy, cz] = center;
        let [hx, hy, hz] = half_extents;
        let body = self.bodies.insert(RigidBodyBuilder::fixed().translation(vector![cx, cy, cz]));
        let collider = ColliderBuilder::cuboid(hx, hy, hz)
            .collision_groups(InteractionGroups::new(GROUP_OBSTACLE, GROUP_CHASSIS))
            .restitution(0.0)
            .build();
        debug!(?center, ?half_extents, "static obstacle added");
        self.colliders.insert_with_parent(collider, body, &mut self.bodies)
    }

    // ------------------------------------------------------------------
    // Vehicles
    // ------------------------------------------------------------------

    /// Player or police car with the preset from the world config.
    pub fn spawn_vehicle(&mut self, role: VehicleRole, position: Vector<Real>, yaw: Real) -> SimResult<VehicleId> {
        let config = match role {
            VehicleRole::Player => self.config.player.clone(),
            VehicleRole::Police => self.config.police.clone(),
        };
        self.spawn_with_config(role, config, position, yaw)
    }

    pub fn spawn_with_config(
        &mut self,
        role: VehicleRole,
        config: VehicleConfig,
        position: Vector<Real>,
        yaw: Real,
    ) -> SimResult<VehicleId> {
        config.validate()?;

        let rb = RigidBodyBuilder::dynamic()
            .position(Isometry::new(position, WORLD_UP * yaw))
            .linear_damping(config.linear_damping)
            .angular_damping(config.angular_damping)
            .ccd_enabled(true)
            .build();

        let [hx, hy, hz] = config.chassis_half_extents;
        let [ox, oy, oz] = config.com_offset;
        let collider = ColliderBuilder::cuboid(hx, hy, hz)
            .translation(vector![ox, oy, oz])
            .collision_groups(InteractionGroups::new(GROUP_CHASSIS, Group::ALL))
            .mass(config.mass)
            .friction(CHASSIS_FRICTION)
            .restitution(0.0)
            .build();

        let handle = self.bodies.insert(rb);
        self.colliders.insert_with_parent(collider, handle, &mut self.bodies);

        let state = match self.bodies.get(handle) {
            Some(rb) => BodyState::from_rigid_body(rb),
            None => BodyState::at_rest(position, yaw, config.mass),
        };

        let id = VehicleId(self.next_id);
        self.next_id += 1;

        let body = VehicleBody::new(id, handle, config, state)?;
        self.vehicles.insert(id, WorldVehicle { role, body, agent: None, input: DriveCommand::HOLD });

        info!(vehicle = %id, ?role, x = position.x, y = position.y, z = position.z, "vehicle spawned");
        Ok(id)
    }

    /// Police car chasing `target`. `seed` drives its avoidance choices.
    pub fn spawn_pursuer(&mut self, target: VehicleId, position: Vector<Real>, yaw: Real, seed: u64) -> SimResult<VehicleId> {
        if !self.vehicles.contains_key(&target) {
            return Err(SimError::UnknownVehicle(target));
        }
        let agent = PursuitAgent::new(target, self.config.pursuit.clone(), seed)?;
        let id = self.spawn_vehicle(VehicleRole::Police, position, yaw)?;
        if let Some(v) = self.vehicles.get_mut(&id) {
            v.agent = Some(agent);
        }
        debug!(pursuer = %id, %target, seed, "pursuit agent attached");
        Ok(id)
    }

    /// Points an existing pursuer at a new target.
    pub fn retarget(&mut self, pursuer: VehicleId, target: VehicleId) -> SimResult<()> {
        if pursuer == target {
            return Err(SimError::SelfPursuit(pursuer));
        }
        if !self.vehicles.contains_key(&target) {
            return Err(SimError::UnknownVehicle(target));
        }
        let pursuit = self.config.pursuit.clone();
        let v = self.vehicles.get_mut(&pursuer).ok_or(SimError::UnknownVehicle(pursuer))?;
        v.agent = Some(PursuitAgent::new(target, pursuit, u64::from(pursuer.0))?);
        self.path_queue.retain(|r| r.vehicle != pursuer);
        Ok(())
    }

    /// Removes the vehicle and its body. Queued path requests are dropped and
    /// late replies for it are ignored.
    pub fn remove_vehicle(&mut self, id: VehicleId) -> SimResult<()> {
        let v = self.vehicles.remove(&id).ok_or(SimError::UnknownVehicle(id))?;
        self.bodies.remove(
            v.body.handle(),
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            true,
        );
        self.path_queue.retain(|r| r.vehicle != id);
        info!(vehicle = %id, "vehicle removed");
        Ok(())
    }

    pub fn set_input(&mut self, id: VehicleId, steer: Real, throttle: Real) -> SimResult<()> {
        let v = self.vehicles.get_mut(&id).ok_or(SimError::UnknownVehicle(id))?;
        v.input = DriveCommand { steer: clamp_axis(steer), throttle: clamp_axis(throttle) };
        Ok(())
    }

    /// Manual upright recovery. `Ok(false)` when the vehicle is not inverted
    /// or still moving.
    pub fn recover_vehicle(&mut self, id: VehicleId) -> SimResult<bool> {
        let v = self.vehicles.get_mut(&id).ok_or(SimError::UnknownVehicle(id))?;
        let Some(pose) = v.body.recover() else {
            return Ok(false);
        };
        if let Some(rb) = self.bodies.get_mut(v.body.handle()) {
            rb.set_position(pose, true);
            rb.set_linvel(Vector::zeros(), true);
            rb.set_angvel(Vector::zeros(), true);
        }
        info!(vehicle = %id, "vehicle recovered upright");
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn vehicle(&self, id: VehicleId) -> Option<&VehicleBody> {
        self.vehicles.get(&id).map(|v| &v.body)
    }

    pub fn vehicle_ids(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.vehicles.keys().copied()
    }

    pub fn pursuer_count(&self) -> usize {
        self.vehicles.values().filter(|v| v.agent.is_some()).count()
    }

    pub fn telemetry(&self, id: VehicleId) -> SimResult<VehicleTelemetry> {
        self.vehicles.get(&id).map(|v| v.body.telemetry()).ok_or(SimError::UnknownVehicle(id))
    }

    /// `Ok(None)` for vehicles without a pursuit agent.
    pub fn decision_state(&self, id: VehicleId) -> SimResult<Option<DecisionState>> {
        let v = self.vehicles.get(&id).ok_or(SimError::UnknownVehicle(id))?;
        Ok(v.agent.as_ref().map(|a| a.decision()))
    }

    pub fn agent(&self, id: VehicleId) -> Option<&PursuitAgent> {
        self.vehicles.get(&id).and_then(|v| v.agent.as_ref())
    }

    pub fn queued_path_requests(&self) -> usize {
        self.path_queue.len()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn elapsed(&self) -> Real {
        self.elapsed
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            tick: self.tick,
            time: self.elapsed,
            vehicles: self
                .vehicles
                .values()
                .map(|v| VehicleSnapshot {
                    telemetry: v.body.telemetry(),
                    role: v.role,
                    decision: v.agent.as_ref().map(|a| a.decision()),
                    target: v.agent.as_ref().map(|a| a.target()),
                })
                .collect(),
        }
    }

    // ------------------------------------------------------------------
    // Fixed step
    // ------------------------------------------------------------------

    pub fn step(&mut self) {
        let dt = self.config.world.fixed_dt;

        // === 1. Snapshot ===
        let states: BTreeMap<VehicleId, BodyState> =
            self.vehicles.iter().map(|(id, v)| (*id, *v.body.state())).collect();
        let handles: BTreeMap<VehicleId, RigidBodyHandle> =
            self.vehicles.iter().map(|(id, v)| (*id, v.body.handle())).collect();
        let pursuers: Vec<(VehicleId, Point<Real>)> = self
            .vehicles
            .iter()
            .filter(|(_, v)| v.agent.is_some() && !v.body.is_lost())
            .map(|(id, v)| (*id, Point::from(v.body.state().translation())))
            .collect();

        self.query_pipeline.update(&self.colliders);

        // === 2. Decisions ===
        for (id, v) in self.vehicles.iter_mut() {
            let Some(agent) = v.agent.as_mut() else { continue };
            let target = agent.target();
            let (Some(own), Some(target_state)) = (states.get(id), states.get(&target)) else {
                v.input = DriveCommand::HOLD;
                continue;
            };
            if v.body.is_lost() {
                v.input = DriveCommand::HOLD;
                continue;
            }

            let neighbors: Vec<Point<Real>> =
                pursuers.iter().filter(|(other, _)| other != id).map(|(_, p)| *p).collect();
            let surface = RapierSurface::new(&self.query_pipeline, &self.bodies, &self.colliders, v.body.handle())
                .ignoring(handles.get(&target).copied());

            let out = agent.update(*id, own, target_state, &neighbors, &surface, dt, self.events.as_mut());
            v.input = out.command;

            if let Some(request) = out.path_request {
                self.path_queue.retain(|r| r.vehicle != *id);
                self.path_queue.push_back(request);
            }
        }

        // === 3. Drive -> impulses ===
        let mut plans: Vec<(RigidBodyHandle, ForcePlan)> = Vec::with_capacity(self.vehicles.len());
        for v in self.vehicles.values_mut() {
            v.body.drive(v.input.steer, v.input.throttle);
            let surface = RapierSurface::new(&self.query_pipeline, &self.bodies, &self.colliders, v.body.handle());
            let plan = v.body.compute_forces(&surface, dt, self.events.as_mut());
            plans.push((v.body.handle(), plan));
        }
        for (handle, plan) in &plans {
            if let Some(rb) = self.bodies.get_mut(*handle) {
                plan.apply(rb);
            }
        }

        // === 4. Integrate ===
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );

        // === 5. Readback + out of bounds ===
        for v in self.vehicles.values_mut() {
            let Some(rb) = self.bodies.get_mut(v.body.handle()) else { continue };
            v.body.sync_state(BodyState::from_rigid_body(rb));
            let water_level = v.body.config().water_level;
            if v.body.check_out_of_bounds(water_level, self.events.as_mut()) {
                rb.set_linvel(Vector::zeros(), true);
                rb.set_angvel(Vector::zeros(), true);
                rb.set_gravity_scale(0.0, true);
                v.body.sync_state(BodyState::from_rigid_body(rb));
            }
        }

        // === 6. Path requests ===
        for _ in 0..self.config.world.path_budget {
            let Some(request) = self.path_queue.pop_front() else { break };
            let reply = request.serve(self.nav.as_deref());
            match self.vehicles.get_mut(&reply.vehicle).and_then(|v| v.agent.as_mut()) {
                Some(agent) => {
                    agent.accept_path(reply);
                }
                None => debug!(vehicle = %reply.vehicle, "path reply for a removed vehicle dropped"),
            }
        }

        self.tick += 1;
        self.elapsed += dt;
    }
}
