// src/dispatch.rs
//
// Police pressure. Every `star_interval` seconds of pursuit adds a star, and
// each new star calls in `pursuers_per_star` more cars, never more than
// `max_pursuers` alive at once. Reinforcements appear on a horizontal ring
// around the target, nose pointed at it.

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rapier3d::prelude::*;
use tracing::info;

use crate::config::DispatchConfig;
use crate::error::{ConfigError, SimError, SimResult};
use crate::world::{SimWorld, VehicleId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPoint {
    pub position: Vector<Real>,
    /// Rotation about world up that points +Z at the target.
    pub yaw: Real,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    config: DispatchConfig,
    rng: ChaCha8Rng,
    elapsed: Real,
    stars: u32,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, rng: ChaCha8Rng::seed_from_u64(seed), elapsed: 0.0, stars: 0 })
    }

    pub fn stars(&self) -> u32 {
        self.stars
    }

    pub fn elapsed(&self) -> Real {
        self.elapsed
    }

    /// Advances pursuit time by `dt` and returns how many pursuers to add.
    pub fn update(&mut self, dt: Real, alive: usize) -> usize {
        if !self.config.enabled {
            return 0;
        }
        self.elapsed += dt;

        let stars = (self.elapsed / self.config.star_interval).floor() as u32;
        if stars <= self.stars {
            return 0;
        }
        let new_stars = stars - self.stars;
        self.stars = stars;

        let wanted = (new_stars * self.config.pursuers_per_star) as usize;
        let room = (self.config.max_pursuers as usize).saturating_sub(alive);
        info!(stars, wanted, room, "pursuit pressure raised");
        wanted.min(room)
    }

    pub fn spawn_point(&mut self, target: &Vector<Real>) -> SpawnPoint {
        let bearing = self.rng.gen_range(0.0..std::f32::consts::TAU);
        let offset = vector![bearing.sin(), 0.0, bearing.cos()] * self.config.spawn_distance;
        let position = vector![target.x + offset.x, self.config.spawn_height, target.z + offset.z];
        let to_target = target - position;
        SpawnPoint { position, yaw: to_target.x.atan2(to_target.z) }
    }

    /// Seed for a new pursuer's own avoidance RNG.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.next_u64()
    }

    /// Runs one dispatch tick against `world`, spawning any reinforcements
    /// that chase `target`.
    pub fn dispatch(&mut self, world: &mut SimWorld, target: VehicleId, dt: Real) -> SimResult<Vec<VehicleId>> {
        let target_position = world
            .vehicle(target)
            .map(|v| v.state().translation())
            .ok_or(SimError::UnknownVehicle(target))?;

        let count = self.update(dt, world.pursuer_count());
        let mut spawned = Vec::with_capacity(count);
        for _ in 0..count {
            let point = self.spawn_point(&target_position);
            let seed = self.next_seed();
            spawned.push(world.spawn_pursuer(target, point.position, point.yaw, seed)?);
        }
        Ok(spawned)
    }
}
