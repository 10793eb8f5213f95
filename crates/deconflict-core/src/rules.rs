//! Safety rules and thresholds for mission deconfliction.

use crate::error::{DeconflictError, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Separation parameters, fixed for the lifetime of an engine.
///
/// Cached pair outcomes are only meaningful for one set of buffers, so
/// changing these means constructing a new engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyRules {
    /// Minimum 3D separation in meters (strict: exactly this far is fine)
    pub safety_buffer_m: f64,
    /// Time tolerance in seconds for window pre-filtering and waypoint matching
    pub temporal_buffer_secs: i64,
    /// Maximum number of registered missions
    pub max_registered_drones: usize,
    /// Maximum number of cached pair outcomes
    pub cache_capacity: usize,
    /// Maximum |x| and |y| of any waypoint in meters
    pub max_abs_horizontal_m: f64,
    /// Maximum |z| of any waypoint in meters
    pub max_abs_altitude_m: f64,
}

impl Default for SafetyRules {
    fn default() -> Self {
        Self {
            safety_buffer_m: 10.0,
            temporal_buffer_secs: 15 * 60,
            max_registered_drones: 1000,
            cache_capacity: 4096,
            max_abs_horizontal_m: 10_000.0,
            max_abs_altitude_m: 500.0,
        }
    }
}

impl SafetyRules {
    /// Rules with the given buffers and default limits.
    ///
    /// The temporal buffer has whole-second resolution: a buffer with a
    /// fractional second is rejected.
    pub fn with_buffers(safety_buffer_m: f64, temporal_buffer: Duration) -> Result<Self> {
        if temporal_buffer.subsec_nanos() != 0 {
            return Err(DeconflictError::InvalidConfig(format!(
                "temporal buffer must be a whole number of seconds, got {}ms",
                temporal_buffer.num_milliseconds()
            )));
        }
        Ok(Self {
            safety_buffer_m,
            temporal_buffer_secs: temporal_buffer.num_seconds(),
            ..Self::default()
        })
    }

    /// Temporal buffer as a duration, saturating at [`Duration::MAX`].
    pub fn temporal_buffer(&self) -> Duration {
        Duration::try_seconds(self.temporal_buffer_secs).unwrap_or(Duration::MAX)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.safety_buffer_m.is_finite() || self.safety_buffer_m <= 0.0 {
            return Err(DeconflictError::InvalidConfig(format!(
                "safety buffer must be a positive distance, got {}",
                self.safety_buffer_m
            )));
        }
        if self.temporal_buffer_secs <= 0 {
            return Err(DeconflictError::InvalidConfig(format!(
                "temporal buffer must be a positive duration, got {}s",
                self.temporal_buffer_secs
            )));
        }
        if Duration::try_seconds(self.temporal_buffer_secs).is_none() {
            return Err(DeconflictError::InvalidConfig(format!(
                "temporal buffer of {}s is out of range",
                self.temporal_buffer_secs
            )));
        }
        if self.max_registered_drones == 0 {
            return Err(DeconflictError::InvalidConfig(
                "max registered drones must be at least 1".into(),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(DeconflictError::InvalidConfig(
                "cache capacity must be at least 1".into(),
            ));
        }
        for (name, bound) in [
            ("horizontal", self.max_abs_horizontal_m),
            ("altitude", self.max_abs_altitude_m),
        ] {
            if bound.is_nan() || bound <= 0.0 {
                return Err(DeconflictError::InvalidConfig(format!(
                    "{name} airspace bound must be positive, got {bound}"
                )));
            }
        }
        Ok(())
    }

    /// Whether a position lies inside the configured airspace.
    pub fn contains(&self, x: f64, y: f64, z: f64) -> bool {
        x.abs() <= self.max_abs_horizontal_m
            && y.abs() <= self.max_abs_horizontal_m
            && z.abs() <= self.max_abs_altitude_m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let rules = SafetyRules::default();
        assert_eq!(rules.safety_buffer_m, 10.0);
        assert_eq!(rules.temporal_buffer(), Duration::minutes(15));
        assert!(rules.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_buffers() {
        let mut rules = SafetyRules::default();
        rules.safety_buffer_m = 0.0;
        assert!(matches!(
            rules.validate(),
            Err(DeconflictError::InvalidConfig(_))
        ));

        let rules = SafetyRules::with_buffers(10.0, Duration::zero()).unwrap();
        assert!(rules.validate().is_err());

        let mut rules = SafetyRules::default();
        rules.safety_buffer_m = f64::NAN;
        assert!(rules.validate().is_err());
    }

    #[test]
    fn rejects_unrepresentable_temporal_buffer() {
        let rules = SafetyRules {
            temporal_buffer_secs: i64::MAX,
            ..SafetyRules::default()
        };
        assert!(matches!(
            rules.validate(),
            Err(DeconflictError::InvalidConfig(_))
        ));
        assert_eq!(rules.temporal_buffer(), Duration::MAX);
    }

    #[test]
    fn fractional_second_buffer_is_rejected() {
        let err = SafetyRules::with_buffers(10.0, Duration::milliseconds(500)).unwrap_err();
        assert!(err.to_string().contains("whole number of seconds"));

        let rules = SafetyRules::with_buffers(10.0, Duration::minutes(2)).unwrap();
        assert_eq!(rules.temporal_buffer_secs, 120);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let rules: SafetyRules = serde_json::from_str(r#"{"safety_buffer_m": 25.0}"#).unwrap();
        assert_eq!(rules.safety_buffer_m, 25.0);
        assert_eq!(rules.temporal_buffer_secs, 900);
        assert_eq!(rules.max_registered_drones, 1000);
    }

    #[test]
    fn airspace_bounds_are_inclusive() {
        let rules = SafetyRules::default();
        assert!(rules.contains(10_000.0, -10_000.0, 500.0));
        assert!(!rules.contains(10_000.1, 0.0, 0.0));
        assert!(!rules.contains(0.0, 0.0, -500.5));
    }
}
