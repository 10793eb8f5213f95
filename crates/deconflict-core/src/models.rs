//! Core data models: waypoints, missions and their time windows.

use crate::error::{DeconflictError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// A sample of a drone's path in 4D space-time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
    /// Altitude
    #[serde(default)]
    pub z: f64,
    #[serde(alias = "timestamp")]
    pub t: DateTime<Utc>,
}

impl Waypoint {
    pub fn new(x: f64, y: f64, z: f64, t: DateTime<Utc>) -> Self {
        Self { x, y, z, t }
    }

    pub fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Euclidean distance to another waypoint, ignoring time.
    pub fn distance_to(&self, other: &Waypoint) -> f64 {
        euclidean_distance(self.position(), other.position())
    }

    /// Absolute time between two waypoints.
    pub fn time_gap(&self, other: &Waypoint) -> Duration {
        if self.t >= other.t {
            self.t - other.t
        } else {
            other.t - self.t
        }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

pub fn euclidean_distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    squared_distance(a, b).sqrt()
}

pub(crate) fn squared_distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

fn duration_secs_f64(duration: Duration) -> f64 {
    match duration.num_nanoseconds() {
        Some(nanos) => nanos as f64 / 1e9,
        None => duration.num_milliseconds() as f64 / 1e3,
    }
}

/// Closed mission interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MissionWindow {
    /// Overlap test widened by `buffer` on both sides.
    ///
    /// `[s1,e1]` and `[s2,e2]` overlap iff `s1 <= e2 + buffer && s2 <= e1 + buffer`.
    /// An end that overflows the calendar when widened counts as unbounded.
    pub fn overlaps(&self, other: &MissionWindow, buffer: Duration) -> bool {
        let reaches = |start: DateTime<Utc>, end: DateTime<Utc>| {
            end.checked_add_signed(buffer)
                .map_or(true, |widened| start <= widened)
        };
        reaches(self.start, other.end) && reaches(other.start, self.end)
    }

    /// Shared interval, or `None` when the windows are disjoint.
    ///
    /// Windows that only touch at an endpoint do not intersect: each must
    /// start strictly before the other ends.
    pub fn intersection(&self, other: &MissionWindow) -> Option<MissionWindow> {
        let shared = self.start < other.end && other.start < self.end;
        shared.then(|| MissionWindow {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        })
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// A registered or candidate mission.
///
/// Only constructed through [`Drone::new`] (or deserialization, which goes
/// through the same checks), so every instance has at least one waypoint,
/// finite coordinates and non-decreasing timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DroneRecord")]
pub struct Drone {
    id: String,
    waypoints: Vec<Waypoint>,
    #[serde(skip_serializing)]
    fingerprint: u64,
}

/// Unvalidated wire form of a [`Drone`].
#[derive(Debug, Clone, Deserialize)]
pub struct DroneRecord {
    pub id: String,
    pub waypoints: Vec<Waypoint>,
}

impl TryFrom<DroneRecord> for Drone {
    type Error = DeconflictError;

    fn try_from(record: DroneRecord) -> Result<Self> {
        Drone::new(record.id, record.waypoints)
    }
}

impl Drone {
    pub fn new(id: impl Into<String>, waypoints: Vec<Waypoint>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(DeconflictError::InvalidInput(
                "drone id must not be empty".into(),
            ));
        }
        if waypoints.is_empty() {
            return Err(DeconflictError::EmptyTrajectory { drone_id: id });
        }
        for (index, waypoint) in waypoints.iter().enumerate() {
            if !waypoint.is_finite() {
                return Err(DeconflictError::NonFiniteCoordinate { drone_id: id, index });
            }
            if index > 0 && waypoint.t < waypoints[index - 1].t {
                return Err(DeconflictError::NonMonotonicTimestamps { drone_id: id, index });
            }
        }

        let fingerprint = fingerprint(&waypoints);
        Ok(Self {
            id,
            waypoints,
            fingerprint,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.waypoints[0].t
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.waypoints[self.waypoints.len() - 1].t
    }

    pub fn window(&self) -> MissionWindow {
        MissionWindow {
            start: self.start_time(),
            end: self.end_time(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.end_time() - self.start_time()
    }

    /// Content hash of the path, stable for identical waypoint sequences.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// The 3D path without timestamps.
    pub fn trajectory(&self) -> Vec<[f64; 3]> {
        self.waypoints.iter().map(Waypoint::position).collect()
    }

    /// Total path length in meters.
    pub fn path_length_m(&self) -> f64 {
        self.waypoints
            .windows(2)
            .map(|pair| pair[0].distance_to(&pair[1]))
            .sum()
    }

    /// Average speed over the mission; zero for a zero-length window.
    pub fn average_speed_mps(&self) -> f64 {
        let secs = duration_secs_f64(self.duration());
        if secs > 0.0 {
            self.path_length_m() / secs
        } else {
            0.0
        }
    }

    /// Linearly interpolated position at `t`, or `None` outside the window.
    pub fn position_at(&self, t: DateTime<Utc>) -> Option<[f64; 3]> {
        let next = self.waypoints.partition_point(|wp| wp.t <= t);
        if next == 0 {
            return None;
        }
        let current = &self.waypoints[next - 1];
        if current.t == t {
            return Some(current.position());
        }
        let upcoming = self.waypoints.get(next)?;

        let span = duration_secs_f64(upcoming.t - current.t);
        let ratio = (duration_secs_f64(t - current.t) / span).clamp(0.0, 1.0);
        let a = current.position();
        let b = upcoming.position();
        Some([
            a[0] + (b[0] - a[0]) * ratio,
            a[1] + (b[1] - a[1]) * ratio,
            a[2] + (b[2] - a[2]) * ratio,
        ])
    }
}

fn fingerprint(waypoints: &[Waypoint]) -> u64 {
    let mut hasher = DefaultHasher::new();
    waypoints.len().hash(&mut hasher);
    for wp in waypoints {
        wp.x.to_bits().hash(&mut hasher);
        wp.y.to_bits().hash(&mut hasher);
        wp.z.to_bits().hash(&mut hasher);
        wp.t.hash(&mut hasher);
    }
    hasher.finish()
}
