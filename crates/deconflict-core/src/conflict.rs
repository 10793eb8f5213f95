//! Conflict records and the per-mission validation result.

use crate::models::Waypoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

const EXPLAIN_MAX_LOCATIONS: usize = 5;

/// Severity of a separation violation, from how deep into the buffer it goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    /// Separation above two thirds of the buffer
    Low,
    /// Separation between one and two thirds of the buffer
    Medium,
    /// Separation below a third of the buffer
    High,
}

impl ConflictSeverity {
    pub fn from_separation(distance_m: f64, safety_buffer_m: f64) -> Self {
        let ratio = distance_m / safety_buffer_m;
        if ratio < 1.0 / 3.0 {
            Self::High
        } else if ratio < 2.0 / 3.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// A located, timestamped safety-buffer violation between two drones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictPoint {
    pub drone_a: String,
    pub drone_b: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub t: DateTime<Utc>,
    pub distance_m: f64,
    pub severity: ConflictSeverity,
}

impl ConflictPoint {
    /// Build the record for two waypoints that violate separation.
    ///
    /// Position is the midpoint, time the earlier of the two samples.
    pub fn from_violation(
        drone_a: &str,
        a: &Waypoint,
        drone_b: &str,
        b: &Waypoint,
        distance_m: f64,
        safety_buffer_m: f64,
    ) -> Self {
        Self {
            drone_a: drone_a.to_string(),
            drone_b: drone_b.to_string(),
            x: (a.x + b.x) / 2.0,
            y: (a.y + b.y) / 2.0,
            z: (a.z + b.z) / 2.0,
            t: a.t.min(b.t),
            distance_m,
            severity: ConflictSeverity::from_separation(distance_m, safety_buffer_m),
        }
    }

    pub fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Same conflict with the drone ids exchanged.
    pub fn swapped(mut self) -> Self {
        std::mem::swap(&mut self.drone_a, &mut self.drone_b);
        self
    }

    /// Orient the record so `drone_a == first`.
    pub fn oriented(self, first: &str) -> Self {
        if self.drone_a == first {
            self
        } else {
            self.swapped()
        }
    }

    /// Total order used for every conflict list the engine returns:
    /// time, then position, then separation, then drone ids.
    pub fn ordering(&self, other: &Self) -> Ordering {
        self.t
            .cmp(&other.t)
            .then_with(|| self.x.total_cmp(&other.x))
            .then_with(|| self.y.total_cmp(&other.y))
            .then_with(|| self.z.total_cmp(&other.z))
            .then_with(|| self.distance_m.total_cmp(&other.distance_m))
            .then_with(|| self.drone_a.cmp(&other.drone_a))
            .then_with(|| self.drone_b.cmp(&other.drone_b))
    }
}

impl fmt::Display for ConflictPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <-> {} at ({:.2}, {:.2}, {:.2}) {} separation {:.2}m ({:?})",
            self.drone_a,
            self.drone_b,
            self.x,
            self.y,
            self.z,
            self.t.to_rfc3339(),
            self.distance_m,
            self.severity
        )
    }
}

/// Two missions scheduled over the same interval without a spatial violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalConflict {
    pub drone_a: String,
    pub drone_b: String,
    pub overlap_start: DateTime<Utc>,
    pub overlap_end: DateTime<Utc>,
}

/// Counters gathered while validating one mission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStats {
    pub registered_drones: usize,
    /// Drones that survived the temporal pre-filter
    pub temporal_candidates: usize,
    pub spatial_queries: usize,
    /// Exact waypoint-pair distance checks
    pub pair_checks: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
}

/// Outcome of validating one candidate mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub mission_id: String,
    pub spatial_conflicts: Vec<ConflictPoint>,
    pub temporal_conflicts: Vec<TemporalConflict>,
    pub is_valid: bool,
    pub stats: ValidationStats,
}

impl ValidationResult {
    pub fn new(
        mission_id: impl Into<String>,
        spatial_conflicts: Vec<ConflictPoint>,
        temporal_conflicts: Vec<TemporalConflict>,
        stats: ValidationStats,
    ) -> Self {
        let is_valid = spatial_conflicts.is_empty() && temporal_conflicts.is_empty();
        Self {
            mission_id: mission_id.into(),
            spatial_conflicts,
            temporal_conflicts,
            is_valid,
            stats,
        }
    }

    /// Same conflicts and verdict, ignoring counters.
    pub fn same_outcome(&self, other: &ValidationResult) -> bool {
        self.mission_id == other.mission_id
            && self.spatial_conflicts == other.spatial_conflicts
            && self.temporal_conflicts == other.temporal_conflicts
            && self.is_valid == other.is_valid
    }

    /// Ids of every drone involved in a spatial conflict, sorted and unique.
    pub fn conflicting_drones(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .spatial_conflicts
            .iter()
            .map(|c| c.drone_b.as_str())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Human-readable summary, one block per conflicting drone.
    pub fn explain(&self) -> String {
        if self.is_valid {
            return "No conflicts detected in the mission.".to_string();
        }

        let mut lines = Vec::new();
        for drone_id in self.conflicting_drones() {
            let locations: Vec<&ConflictPoint> = self
                .spatial_conflicts
                .iter()
                .filter(|c| c.drone_b == drone_id)
                .collect();
            let closest = locations
                .iter()
                .map(|c| c.distance_m)
                .fold(f64::INFINITY, f64::min);

            lines.push(format!("Spatial conflict with drone {drone_id}:"));
            lines.push(format!("  Closest separation: {closest:.2}m"));
            lines.push(format!("  Number of conflict locations: {}", locations.len()));
            for loc in locations.iter().take(EXPLAIN_MAX_LOCATIONS) {
                lines.push(format!(
                    "  - X: {:.2}, Y: {:.2}, Z: {:.2} at {} ({:?})",
                    loc.x,
                    loc.y,
                    loc.z,
                    loc.t.to_rfc3339(),
                    loc.severity
                ));
            }
            if locations.len() > EXPLAIN_MAX_LOCATIONS {
                lines.push(format!(
                    "  ... and {} more locations",
                    locations.len() - EXPLAIN_MAX_LOCATIONS
                ));
            }
        }

        for temporal in &self.temporal_conflicts {
            lines.push(format!("Schedule overlap with drone {}:", temporal.drone_b));
            lines.push(format!(
                "  Time overlap: {} to {}",
                temporal.overlap_start.to_rfc3339(),
                temporal.overlap_end.to_rfc3339()
            ));
        }

        lines.join("\n")
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.explain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn point(drone_b: &str, x: f64, distance_m: f64) -> ConflictPoint {
        ConflictPoint {
            drone_a: "M".into(),
            drone_b: drone_b.into(),
            x,
            y: 0.0,
            z: 0.0,
            t: t0(),
            distance_m,
            severity: ConflictSeverity::from_separation(distance_m, 10.0),
        }
    }

    #[test]
    fn conflict_point_uses_midpoint_and_earlier_time() {
        let a = Waypoint::new(0.0, 0.0, 0.0, t0() + Duration::minutes(2));
        let b = Waypoint::new(5.0, 2.0, 4.0, t0());
        let cp = ConflictPoint::from_violation("A", &a, "B", &b, 6.7, 10.0);
        assert_eq!(cp.position(), [2.5, 1.0, 2.0]);
        assert_eq!(cp.t, t0());
        assert_eq!(cp.distance_m, 6.7);
        assert_eq!(cp.severity, ConflictSeverity::Low);
    }

    #[test]
    fn severity_bands() {
        assert_eq!(ConflictSeverity::from_separation(0.0, 10.0), ConflictSeverity::High);
        assert_eq!(ConflictSeverity::from_separation(5.0, 10.0), ConflictSeverity::Medium);
        assert_eq!(ConflictSeverity::from_separation(9.9, 10.0), ConflictSeverity::Low);
    }

    #[test]
    fn oriented_swaps_only_when_needed() {
        let cp = point("B", 1.0, 2.0);
        assert_eq!(cp.clone().oriented("M"), cp);
        let flipped = cp.clone().oriented("B");
        assert_eq!(flipped.drone_a, "B");
        assert_eq!(flipped.drone_b, "M");
        assert_eq!(flipped.position(), cp.position());
    }

    #[test]
    fn validity_follows_both_lists() {
        let clear = ValidationResult::new("M", Vec::new(), Vec::new(), ValidationStats::default());
        assert!(clear.is_valid);
        assert_eq!(clear.explain(), "No conflicts detected in the mission.");

        let temporal = TemporalConflict {
            drone_a: "M".into(),
            drone_b: "B".into(),
            overlap_start: t0(),
            overlap_end: t0() + Duration::minutes(1),
        };
        let busy = ValidationResult::new("M", Vec::new(), vec![temporal], ValidationStats::default());
        assert!(!busy.is_valid);
        assert!(busy.explain().contains("Schedule overlap with drone B"));
    }

    #[test]
    fn explain_truncates_long_location_lists() {
        let conflicts: Vec<ConflictPoint> = (0..7).map(|i| point("B", i as f64, 1.0)).collect();
        let result = ValidationResult::new("M", conflicts, Vec::new(), ValidationStats::default());
        let text = result.explain();
        assert!(text.contains("Number of conflict locations: 7"));
        assert!(text.contains("... and 2 more locations"));
        assert_eq!(result.conflicting_drones(), vec!["B"]);
    }
}
