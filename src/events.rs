// src/events.rs
//
// Point and terminal gameplay events. The world owns one sink, injected at
// construction, and lends it to vehicles and agents for the duration of a tick.

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use crate::world::VehicleId;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SimEvent {
    TargetCaught { pursuer: VehicleId, target: VehicleId },
    VehicleLost { vehicle: VehicleId, position: [f32; 3] },
    AutoFlip { vehicle: VehicleId },
}

pub trait EventSink {
    fn emit(&mut self, event: SimEvent);
}

/// Collects events in order. Used by tests and headless runs.
impl EventSink for Vec<SimEvent> {
    fn emit(&mut self, event: SimEvent) {
        self.push(event);
    }
}

impl EventSink for UnboundedSender<SimEvent> {
    fn emit(&mut self, event: SimEvent) {
        if let Err(err) = self.send(event) {
            warn!(event = ?err.0, "event receiver dropped");
        }
    }
}

/// Drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: SimEvent) {}
}
