// src/error.rs

use thiserror::Error;

use crate::world::VehicleId;

/// Rejected configuration. Physical constants are never silently clamped.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be positive (got {value})")]
    NonPositive { field: &'static str, value: f32 },

    #[error("{field} must be finite and non-negative (got {value})")]
    Negative { field: &'static str, value: f32 },

    #[error("min steer angle {min}° exceeds max steer angle {max}°")]
    SteerRange { min: f32, max: f32 },

    #[error("curve `{name}`: {reason}")]
    Curve { name: &'static str, reason: String },

    #[error("catch distance {catch_distance} m is unreachable, chassis centers stay at least {closest} m apart")]
    CatchUnreachable { catch_distance: f32, closest: f32 },

    #[error("vehicle has no driven wheels")]
    NoDrivenWheels,

    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    pub(crate) fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(ConfigError::NonPositive { field, value })
        }
    }

    pub(crate) fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
        if value.is_finite() && value >= 0.0 {
            Ok(())
        } else {
            Err(ConfigError::Negative { field, value })
        }
    }
}

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unknown vehicle {0}")]
    UnknownVehicle(VehicleId),

    #[error("vehicle {0} cannot pursue itself")]
    SelfPursuit(VehicleId),
}

pub type SimResult<T> = Result<T, SimError>;
