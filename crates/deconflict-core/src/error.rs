//! Error taxonomy for the deconfliction engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeconflictError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeconflictError {
    #[error("drone {drone_id} has no waypoints")]
    EmptyTrajectory { drone_id: String },

    #[error("drone {drone_id} waypoint {index} is earlier than the waypoint before it")]
    NonMonotonicTimestamps { drone_id: String, index: usize },

    #[error("drone {drone_id} waypoint {index} has a non-finite coordinate")]
    NonFiniteCoordinate { drone_id: String, index: usize },

    #[error("drone {drone_id} waypoint {index} lies outside the configured airspace")]
    OutOfAirspace { drone_id: String, index: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown drone: {0}")]
    UnknownDrone(String),

    #[error("maximum number of registered drones ({max}) exceeded")]
    CapacityExceeded { max: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DeconflictError {
    /// True for errors caused by a malformed drone record.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::EmptyTrajectory { .. }
                | Self::NonMonotonicTimestamps { .. }
                | Self::NonFiniteCoordinate { .. }
                | Self::OutOfAirspace { .. }
                | Self::InvalidInput(_)
        )
    }
}
