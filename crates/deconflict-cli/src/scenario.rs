//! Scenario input: one candidate mission plus scheduled traffic.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use deconflict_core::{Drone, SafetyRules, Waypoint};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use std::fs;
use std::path::Path;

const AREA_M: f64 = 1_000.0;
const MIN_ALT_M: f64 = 20.0;
const MAX_ALT_M: f64 = 120.0;

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Overrides the environment configuration when present
    #[serde(default)]
    pub rules: Option<SafetyRules>,
    pub mission: Drone,
    #[serde(default)]
    pub traffic: Vec<Drone>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid scenario {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Random traffic around a fixed diagonal mission across the area.
    pub fn random(count: usize, seed: u64, start: DateTime<Utc>) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);

        let mission = Drone::new(
            "primary",
            vec![
                Waypoint::new(0.0, 0.0, 50.0, start),
                Waypoint::new(AREA_M / 2.0, AREA_M / 2.0, 60.0, start + Duration::minutes(10)),
                Waypoint::new(AREA_M, AREA_M, 80.0, start + Duration::minutes(20)),
            ],
        )?;

        let traffic = (0..count)
            .map(|i| {
                let mut t = start + Duration::minutes(rng.random_range(-30..60));
                let waypoints = (0..3)
                    .map(|_| {
                        let wp = Waypoint::new(
                            rng.random_range(0.0..AREA_M),
                            rng.random_range(0.0..AREA_M),
                            rng.random_range(MIN_ALT_M..MAX_ALT_M),
                            t,
                        );
                        t += Duration::minutes(rng.random_range(2..8));
                        wp
                    })
                    .collect();
                Drone::new(format!("drone_{i:04}"), waypoints)
            })
            .collect::<deconflict_core::Result<Vec<_>>>()?;

        Ok(Self {
            rules: None,
            mission,
            traffic,
        })
    }
}
