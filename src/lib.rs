//! Arcade raycast-wheel vehicles and police pursuit AI on top of rapier3d.
//!
//! [`world::SimWorld`] owns the physics state and steps every vehicle at a
//! fixed rate. Player cars take `(steer, throttle)` input. Police cars carry a
//! [`pursuit::PursuitAgent`] that plans, scans and decides its own input.
//! Gameplay outcomes leave through an [`events::EventSink`].

pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod pursuit;
pub mod surface;
pub mod vehicle;
pub mod wheel;
pub mod world;

pub use config::SimConfig;
pub use error::{ConfigError, SimError, SimResult};
pub use events::{EventSink, SimEvent};
pub use world::{SimWorld, VehicleId, VehicleRole};
