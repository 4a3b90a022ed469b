//! Unit-system selection and the named constants the engine branches on.
//!
//! The selector fixes the speed-to-distance conversion factor and the gravity
//! constant used by every stage, so a run is unit-system-pure end to end.

use serde::{Deserialize, Serialize};

/// Imperial speed (mph) to distance-per-second (ft/s) multiplier.
pub const MPH_TO_FPS: f64 = 1.466;
/// Metric speed (km/h) to distance-per-second (m/s) divisor.
pub const KMH_PER_MPS: f64 = 3.6;
/// Gravitational acceleration, ft/s².
pub const GRAVITY_FPS2: f64 = 32.2;
/// Gravitational acceleration, m/s².
pub const GRAVITY_MPS2: f64 = 9.81;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    Imperial,
    Metric,
}

impl Default for UnitSystem {
    fn default() -> Self {
        UnitSystem::Imperial
    }
}

impl UnitSystem {
    /// Convert a speed in the active speed unit to distance-per-second units
    /// (ft/s or m/s).
    pub fn speed_to_distance_per_sec(self, speed: f64) -> f64 {
        match self {
            UnitSystem::Imperial => speed * MPH_TO_FPS,
            UnitSystem::Metric => speed / KMH_PER_MPS,
        }
    }

    pub fn gravity(self) -> f64 {
        match self {
            UnitSystem::Imperial => GRAVITY_FPS2,
            UnitSystem::Metric => GRAVITY_MPS2,
        }
    }

    pub fn speed_label(self) -> &'static str {
        match self {
            UnitSystem::Imperial => "mph",
            UnitSystem::Metric => "km/h",
        }
    }

    pub fn distance_label(self) -> &'static str {
        match self {
            UnitSystem::Imperial => "ft",
            UnitSystem::Metric => "m",
        }
    }

    pub fn rate_label(self) -> &'static str {
        match self {
            UnitSystem::Imperial => "ft/s²",
            UnitSystem::Metric => "m/s²",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imperial_speed_conversion() {
        let fps = UnitSystem::Imperial.speed_to_distance_per_sec(30.0);
        assert!((fps - 43.98).abs() < 1e-9);
    }

    #[test]
    fn test_metric_speed_conversion() {
        let mps = UnitSystem::Metric.speed_to_distance_per_sec(36.0);
        assert!((mps - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_gravity_per_system() {
        assert_eq!(UnitSystem::Imperial.gravity(), GRAVITY_FPS2);
        assert_eq!(UnitSystem::Metric.gravity(), GRAVITY_MPS2);
    }
}
