//! CLI configuration from environment.

use deconflict_core::SafetyRules;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub safety_buffer_m: f64,
    pub temporal_buffer_secs: i64,
    pub max_registered_drones: usize,
    pub cache_capacity: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = SafetyRules::default();
        Self {
            safety_buffer_m: env::var("DECONFLICT_SAFETY_BUFFER_M")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.safety_buffer_m),
            temporal_buffer_secs: env::var("DECONFLICT_TEMPORAL_BUFFER_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.temporal_buffer_secs),
            max_registered_drones: env::var("DECONFLICT_MAX_DRONES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_registered_drones),
            cache_capacity: env::var("DECONFLICT_CACHE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.cache_capacity),
        }
    }

    pub fn rules(&self) -> SafetyRules {
        SafetyRules {
            safety_buffer_m: self.safety_buffer_m,
            temporal_buffer_secs: self.temporal_buffer_secs,
            max_registered_drones: self.max_registered_drones,
            cache_capacity: self.cache_capacity,
            ..SafetyRules::default()
        }
    }
}
