//! Command-line front end for the deconfliction engine.

pub mod config;
pub mod scenario;

pub use config::Config;
pub use scenario::Scenario;
