// src/vehicle/telemetry.rs

use serde::Serialize;

use crate::wheel::WheelId;
use crate::world::VehicleId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WheelTelemetry {
    pub id: WheelId,
    pub grounded: bool,
    pub slip: f32,          // 0..1
    pub drifting: bool,
    pub steer_angle: f32,   // rad
    pub center: [f32; 3],
    pub rotation: [f32; 4], // quaternion (i, j, k, w)
}

/// Read-only view of one vehicle after the last tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleTelemetry {
    pub id: VehicleId,
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub speed: f32,         // m/s
    pub speed_kph: f32,
    pub steer: f32,         // applied input, -1..1
    pub throttle: f32,      // applied input, -1..1
    pub wheels: Vec<WheelTelemetry>,
    pub max_slip: f32,
    pub drifting: bool,
    pub flipped: bool,
    pub lost: bool,

    // engine sound drivers
    pub throttle_effect: f32, // |throttle|
    pub speed_percent: f32,   // speed / 100
}
