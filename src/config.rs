// src/config.rs
//
// All tunables live here. Everything deserializes with defaults so a config
// file only has to name what it changes. `validate()` is the single gate for
// configuration errors: constructors call it and refuse bad values.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::wheel::curve::ResponseCurve;
use crate::wheel::suspension;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelConfig {
    pub radius: f32,                // m
    pub rest_length: f32,           // m, ray length is 2x this
    pub spring_stiffness: f32,      // N/m
    pub damping: f32,               // N*s/m
    pub max_slip_speed: f32,        // m/s of lateral speed that counts as full slip
    pub friction_multiplier: f32,   // kg-equivalent per wheel
    pub drift_threshold: f32,       // slip% (0..1)
    pub traction_curve: ResponseCurve,
    pub torque_curve: ResponseCurve,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            radius: 0.35,
            rest_length: 0.5,
            spring_stiffness: 30_000.0,
            damping: 3_000.0,
            max_slip_speed: 4.0,
            friction_multiplier: 180.0,
            drift_threshold: 0.2,
            traction_curve: ResponseCurve::drift_grip(0.25, 0.45),
            torque_curve: ResponseCurve::linear(0.0, 1.0, 1.0, 0.35),
        }
    }
}

impl WheelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::positive("wheel.radius", self.radius)?;
        ConfigError::positive("wheel.rest_length", self.rest_length)?;
        ConfigError::positive("wheel.spring_stiffness", self.spring_stiffness)?;
        ConfigError::non_negative("wheel.damping", self.damping)?;
        ConfigError::positive("wheel.max_slip_speed", self.max_slip_speed)?;
        ConfigError::non_negative("wheel.friction_multiplier", self.friction_multiplier)?;
        ConfigError::positive("wheel.drift_threshold", self.drift_threshold)?;
        self.traction_curve.validate("traction_curve")?;
        self.torque_curve.validate("torque_curve")?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    pub down_force: f32,                // N per m/s
    pub flip_torque: f32,               // N*m, passive righting
    pub flip_detection_angle_deg: f32,  // deg between body up and world up
    pub time_to_auto_flip: f32,         // s
    pub auto_flip_torque_impulse: f32,  // N*m*s, one-shot
    pub auto_flip_lift_impulse: f32,    // N*s, one-shot
    pub recover_max_speed: f32,         // m/s, manual recovery gate
    pub recover_lift: f32,              // m
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            down_force: 100.0,
            flip_torque: 500.0,
            flip_detection_angle_deg: 120.0,
            time_to_auto_flip: 2.0,
            auto_flip_torque_impulse: 2_500.0,
            auto_flip_lift_impulse: 4_000.0,
            recover_max_speed: 1.0,
            recover_lift: 1.0,
        }
    }
}

impl StabilizerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::non_negative("stabilizer.down_force", self.down_force)?;
        ConfigError::non_negative("stabilizer.flip_torque", self.flip_torque)?;
        ConfigError::positive("stabilizer.flip_detection_angle_deg", self.flip_detection_angle_deg)?;
        ConfigError::positive("stabilizer.time_to_auto_flip", self.time_to_auto_flip)?;
        ConfigError::non_negative("stabilizer.auto_flip_torque_impulse", self.auto_flip_torque_impulse)?;
        ConfigError::non_negative("stabilizer.auto_flip_lift_impulse", self.auto_flip_lift_impulse)?;
        ConfigError::non_negative("stabilizer.recover_max_speed", self.recover_max_speed)?;
        ConfigError::non_negative("stabilizer.recover_lift", self.recover_lift)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    pub mass: f32,                        // kg
    pub chassis_half_extents: [f32; 3],   // [hx, hy, hz] m
    pub com_offset: [f32; 3],             // local offset of the chassis collider
    pub linear_damping: f32,
    pub angular_damping: f32,

    // --- wheel layout (chassis local, +Z forward) ---
    pub track_half_width: f32,
    pub front_axle_z: f32,
    pub rear_axle_z: f32,
    pub mount_height: f32,
    pub wheel: WheelConfig,

    // --- drivetrain ---
    pub front_drive: bool,
    pub rear_drive: bool,
    pub motor_force: f32,                 // N per driven wheel at full throttle
    pub brake_force: f32,                 // N per driven wheel
    pub top_speed_kph: f32,

    // --- steering ---
    pub max_steer_angle_deg: f32,
    pub min_steer_angle_deg: Option<f32>, // reached at top speed

    pub stabilizer: StabilizerConfig,
    pub water_level: f32,                 // y below which the vehicle is lost
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self::player_car()
    }
}

impl VehicleConfig {
    /// The player's delivery car: light, twitchy, speed-sensitive steering.
    pub fn player_car() -> Self {
        let mass = 1200.0;
        let (spring_stiffness, damping) = suspension::from_sag(mass, 4, 0.1, 0.8);
        Self {
            mass,
            chassis_half_extents: [0.9, 0.35, 2.0],
            com_offset: [0.0, 0.25, 0.0],
            linear_damping: 0.05,
            angular_damping: 0.8,
            track_half_width: 0.8,
            front_axle_z: 1.3,
            rear_axle_z: -1.3,
            mount_height: -0.1,
            wheel: WheelConfig { spring_stiffness, damping, ..WheelConfig::default() },
            front_drive: false,
            rear_drive: true,
            motor_force: 3_000.0,
            brake_force: 6_000.0,
            top_speed_kph: 100.0,
            max_steer_angle_deg: 25.0,
            min_steer_angle_deg: Some(5.0),
            stabilizer: StabilizerConfig::default(),
            water_level: -10.0,
        }
    }

    /// Police cruiser: heavier, constant steering lock, no min angle.
    pub fn police_car() -> Self {
        let mass = 1400.0;
        let (spring_stiffness, damping) = suspension::from_sag(mass, 4, 0.1, 0.8);
        Self {
            mass,
            wheel: WheelConfig {
                spring_stiffness,
                damping,
                friction_multiplier: 210.0,
                ..WheelConfig::default()
            },
            motor_force: 3_400.0,
            brake_force: 7_000.0,
            min_steer_angle_deg: None,
            ..Self::player_car()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::positive("mass", self.mass)?;
        for (field, v) in ["chassis_half_extents.x", "chassis_half_extents.y", "chassis_half_extents.z"]
            .into_iter()
            .zip(self.chassis_half_extents)
        {
            ConfigError::positive(field, v)?;
        }
        ConfigError::non_negative("linear_damping", self.linear_damping)?;
        ConfigError::non_negative("angular_damping", self.angular_damping)?;
        ConfigError::positive("track_half_width", self.track_half_width)?;
        ConfigError::positive("motor_force", self.motor_force)?;
        ConfigError::non_negative("brake_force", self.brake_force)?;
        ConfigError::positive("top_speed_kph", self.top_speed_kph)?;
        ConfigError::positive("max_steer_angle_deg", self.max_steer_angle_deg)?;
        if let Some(min) = self.min_steer_angle_deg {
            ConfigError::non_negative("min_steer_angle_deg", min)?;
            if min > self.max_steer_angle_deg {
                return Err(ConfigError::SteerRange { min, max: self.max_steer_angle_deg });
            }
        }
        if !self.front_drive && !self.rear_drive {
            return Err(ConfigError::NoDrivenWheels);
        }
        self.wheel.validate()?;
        self.stabilizer.validate()?;
        Ok(())
    }

    pub fn top_speed_ms(&self) -> f32 {
        self.top_speed_kph / 3.6
    }
}

/// Local ray origins of the obstacle scanner, chassis space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanGeometry {
    pub center: [f32; 3],
    pub left: [f32; 3],
    pub right: [f32; 3],
    pub detection_distance: f32,
}

impl Default for ScanGeometry {
    fn default() -> Self {
        Self {
            center: [0.0, 0.2, 2.1],
            left: [0.8, 0.2, 2.0],
            right: [-0.8, 0.2, 2.0],
            detection_distance: 6.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PursuitConfig {
    pub prediction_time: f32,          // s of target velocity extrapolation
    pub reverse_distance: f32,         // m
    pub alignment_threshold: f32,      // dot(forward, dir) below this counts as facing away
    pub steer_normalization_deg: f32,  // angle that maps to full lock
    pub decision_cooldown: f32,        // s between forward/reverse re-decisions

    pub catch_distance: f32,           // m, center to center
    pub catch_time: f32,               // s
    pub min_catch_speed: f32,          // m/s, target must be slower

    pub separation_radius: f32,        // m
    pub separation_strength: f32,

    pub scan: ScanGeometry,
    pub avoid_duration: f32,           // s

    pub stuck_speed: f32,              // m/s
    pub stuck_time: f32,               // s

    pub replan_interval: f32,          // s
    pub corner_reach_radius: f32,      // m
}

impl Default for PursuitConfig {
    fn default() -> Self {
        Self {
            prediction_time: 0.5,
            reverse_distance: 5.0,
            alignment_threshold: 0.1,
            steer_normalization_deg: 45.0,
            decision_cooldown: 1.0,
            catch_distance: 4.5,
            catch_time: 1.0,
            min_catch_speed: 2.0,
            separation_radius: 8.0,
            separation_strength: 1.2,
            scan: ScanGeometry::default(),
            avoid_duration: 1.5,
            stuck_speed: 0.5,
            stuck_time: 2.0,
            replan_interval: 0.5,
            corner_reach_radius: 2.0,
        }
    }
}

impl PursuitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::non_negative("prediction_time", self.prediction_time)?;
        ConfigError::non_negative("reverse_distance", self.reverse_distance)?;
        ConfigError::positive("steer_normalization_deg", self.steer_normalization_deg)?;
        ConfigError::non_negative("decision_cooldown", self.decision_cooldown)?;
        ConfigError::positive("catch_distance", self.catch_distance)?;
        ConfigError::non_negative("catch_time", self.catch_time)?;
        ConfigError::positive("min_catch_speed", self.min_catch_speed)?;
        ConfigError::non_negative("separation_radius", self.separation_radius)?;
        ConfigError::non_negative("separation_strength", self.separation_strength)?;
        ConfigError::positive("scan.detection_distance", self.scan.detection_distance)?;
        ConfigError::positive("avoid_duration", self.avoid_duration)?;
        ConfigError::positive("stuck_speed", self.stuck_speed)?;
        ConfigError::positive("stuck_time", self.stuck_time)?;
        ConfigError::positive("replan_interval", self.replan_interval)?;
        ConfigError::non_negative("corner_reach_radius", self.corner_reach_radius)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub enabled: bool,
    pub star_interval: f32,     // s of pursuit per pressure star
    pub pursuers_per_star: u32,
    pub max_pursuers: u32,
    pub spawn_distance: f32,    // m from the target
    pub spawn_height: f32,      // m above ground
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            star_interval: 30.0,
            pursuers_per_star: 2,
            max_pursuers: 10,
            spawn_distance: 60.0,
            spawn_height: 1.5,
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::positive("dispatch.star_interval", self.star_interval)?;
        ConfigError::positive("dispatch.spawn_distance", self.spawn_distance)?;
        ConfigError::non_negative("dispatch.spawn_height", self.spawn_height)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub fixed_dt: f32,
    pub gravity: [f32; 3],
    pub ground_half_extents: [f32; 2],   // x, z
    pub ground_friction: f32,
    /// Path requests served per tick.
    pub path_budget: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            gravity: [0.0, -9.81, 0.0],
            ground_half_extents: [500.0, 500.0],
            ground_friction: 1.0,
            path_budget: 4,
        }
    }
}

impl WorldConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::positive("fixed_dt", self.fixed_dt)?;
        ConfigError::positive("ground_half_extents.x", self.ground_half_extents[0])?;
        ConfigError::positive("ground_half_extents.z", self.ground_half_extents[1])?;
        ConfigError::non_negative("ground_friction", self.ground_friction)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub world: WorldConfig,
    pub player: VehicleConfig,
    pub police: VehicleConfig,
    pub pursuit: PursuitConfig,
    pub dispatch: DispatchConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            world: WorldConfig::default(),
            player: VehicleConfig::player_car(),
            police: VehicleConfig::police_car(),
            pursuit: PursuitConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json_str(&text)?;
        info!(path = %path.display(), "loaded simulation config");
        Ok(config)
    }

    /// Catch range is measured between body centers. Two chassis side by side
    /// can't get closer than the sum of their half widths.
    fn check_catch_reachable(&self) -> Result<(), ConfigError> {
        let closest = self.player.chassis_half_extents[0] + self.police.chassis_half_extents[0];
        if self.pursuit.catch_distance <= closest {
            return Err(ConfigError::CatchUnreachable { catch_distance: self.pursuit.catch_distance, closest });
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.world.validate()?;
        self.player.validate()?;
        self.police.validate()?;
        self.pursuit.validate()?;
        self.dispatch.validate()?;
        self.check_catch_reachable()?;
        Ok(())
    }
}
