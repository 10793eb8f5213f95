//! Strategic deconfliction for drone missions in shared airspace.
//!
//! A candidate mission is checked against every registered mission: a
//! temporal pre-filter discards missions that cannot overlap, a k-d tree
//! finds waypoints within the safety buffer, and pairwise outcomes are
//! cached per index generation.

pub mod cache;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod models;
pub mod rules;
pub mod spatial;
pub mod temporal;

pub use cache::{LruResultCache, NoopCache, PairKey, PairOutcome, ResultCache};
pub use conflict::{
    ConflictPoint, ConflictSeverity, TemporalConflict, ValidationResult, ValidationStats,
};
pub use engine::ConflictEngine;
pub use error::{DeconflictError, Result};
pub use models::{euclidean_distance, Drone, DroneRecord, MissionWindow, Waypoint};
pub use rules::SafetyRules;
pub use spatial::{Bounds, IndexedWaypoint, SpatialIndex};
pub use temporal::TemporalIndex;
