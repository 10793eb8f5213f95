//! Strategic deconfliction engine.
//!
//! Validates a candidate mission against every registered mission using a
//! temporal pre-filter, a k-d tree radius search and a pairwise result cache.

use crate::cache::{LruResultCache, PairKey, PairOutcome, ResultCache};
use crate::conflict::{ConflictPoint, TemporalConflict, ValidationResult, ValidationStats};
use crate::error::{DeconflictError, Result};
use crate::models::Drone;
use crate::rules::SafetyRules;
use crate::spatial::SpatialIndex;
use crate::temporal::TemporalIndex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// Single-owner deconfliction engine.
///
/// Not internally synchronized: hosts that share an engine across threads
/// must serialize writers against readers themselves.
pub struct ConflictEngine {
    rules: SafetyRules,
    drones: BTreeMap<String, Arc<Drone>>,
    spatial: Arc<SpatialIndex>,
    temporal: TemporalIndex,
    cache: Box<dyn ResultCache>,
    /// Bumped on every change to the registered set
    generation: u64,
}

impl ConflictEngine {
    /// Engine with an LRU cache sized by `rules.cache_capacity`.
    pub fn new(rules: SafetyRules) -> Result<Self> {
        let cache = LruResultCache::new(rules.cache_capacity);
        Self::with_cache(rules, Box::new(cache))
    }

    pub fn with_cache(rules: SafetyRules, cache: Box<dyn ResultCache>) -> Result<Self> {
        rules.validate()?;
        tracing::info!(
            "Initialized deconfliction engine with safety buffer {}m, temporal buffer {}s",
            rules.safety_buffer_m,
            rules.temporal_buffer_secs
        );
        Ok(Self {
            temporal: TemporalIndex::new(rules.temporal_buffer()),
            rules,
            drones: BTreeMap::new(),
            spatial: Arc::new(SpatialIndex::default()),
            cache,
            generation: 0,
        })
    }

    pub fn rules(&self) -> &SafetyRules {
        &self.rules
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn drone_count(&self) -> usize {
        self.drones.len()
    }

    pub fn drone(&self, drone_id: &str) -> Option<Arc<Drone>> {
        self.drones.get(drone_id).cloned()
    }

    /// Registered ids in sorted order.
    pub fn drone_ids(&self) -> Vec<&str> {
        self.drones.keys().map(String::as_str).collect()
    }

    /// Current spatial index. Stays valid after later rebuilds.
    pub fn spatial_snapshot(&self) -> Arc<SpatialIndex> {
        Arc::clone(&self.spatial)
    }

    pub fn temporal_index(&self) -> &TemporalIndex {
        &self.temporal
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Register a mission, replacing any mission with the same id.
    pub fn register(&mut self, drone: impl Into<Arc<Drone>>) -> Result<()> {
        let drone = drone.into();
        self.check_airspace(&drone)?;

        let replacing = self.drones.contains_key(drone.id());
        if !replacing && self.drones.len() >= self.rules.max_registered_drones {
            tracing::warn!(
                "Rejected drone {}: maximum of {} registered drones reached",
                drone.id(),
                self.rules.max_registered_drones
            );
            return Err(DeconflictError::CapacityExceeded {
                max: self.rules.max_registered_drones,
            });
        }

        let waypoints = drone.waypoints().len();
        let drone_id = drone.id().to_string();
        self.temporal.insert(drone_id.clone(), drone.window());
        self.drones.insert(drone_id.clone(), drone);
        self.rebuild();

        tracing::info!(
            "{} drone {} with {} waypoints (generation {})",
            if replacing { "Replaced" } else { "Registered" },
            drone_id,
            waypoints,
            self.generation
        );
        Ok(())
    }

    /// Register a batch with a single index rebuild.
    ///
    /// Either every mission is registered or none is.
    pub fn register_all<I>(&mut self, drones: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Arc<Drone>>,
    {
        let batch: Vec<Arc<Drone>> = drones.into_iter().map(Into::into).collect();
        if batch.is_empty() {
            return Ok(());
        }

        let mut new_ids = HashSet::new();
        for drone in &batch {
            self.check_airspace(drone)?;
            if !self.drones.contains_key(drone.id()) {
                new_ids.insert(drone.id());
            }
        }
        if self.drones.len() + new_ids.len() > self.rules.max_registered_drones {
            tracing::warn!(
                "Rejected batch of {} drones: maximum of {} registered drones would be exceeded",
                batch.len(),
                self.rules.max_registered_drones
            );
            return Err(DeconflictError::CapacityExceeded {
                max: self.rules.max_registered_drones,
            });
        }

        let count = batch.len();
        for drone in batch {
            self.temporal.insert(drone.id(), drone.window());
            self.drones.insert(drone.id().to_string(), drone);
        }
        self.rebuild();

        tracing::info!(
            "Registered batch of {} drones (generation {})",
            count,
            self.generation
        );
        Ok(())
    }

    /// Remove a registered mission.
    pub fn remove(&mut self, drone_id: &str) -> Result<Arc<Drone>> {
        let drone = self
            .drones
            .remove(drone_id)
            .ok_or_else(|| DeconflictError::UnknownDrone(drone_id.to_string()))?;
        self.temporal.remove(drone_id);
        self.rebuild();

        tracing::info!("Removed drone {} (generation {})", drone_id, self.generation);
        Ok(drone)
    }

    pub fn clear_cache(&mut self) {
        let dropped = self.cache.len();
        self.cache.invalidate();
        tracing::debug!("Cleared {} cached pair outcome(s)", dropped);
    }

    /// Validate a candidate mission against every registered mission.
    ///
    /// A registered mission with the candidate's id is ignored, so a
    /// registered mission can be re-validated against the rest.
    pub fn validate_mission(&mut self, candidate: &Drone) -> Result<ValidationResult> {
        let started = Instant::now();
        self.check_airspace(candidate)?;

        let mut stats = ValidationStats {
            registered_drones: self.drones.len(),
            ..ValidationStats::default()
        };

        let window = candidate.window();
        let shortlist: Vec<Arc<Drone>> = self
            .temporal
            .overlapping(window.start, window.end)
            .into_iter()
            .filter(|id| id != candidate.id())
            .filter_map(|id| self.drones.get(&id).cloned())
            .collect();
        stats.temporal_candidates = shortlist.len();

        let mut resolved: Vec<(Arc<Drone>, PairOutcome)> = Vec::with_capacity(shortlist.len());
        let mut missed: Vec<(Arc<Drone>, PairKey)> = Vec::new();
        for other in shortlist {
            let key = self.pair_key(candidate, &other);
            match self.cache.get(&key) {
                Some(outcome) => {
                    stats.cache_hits += 1;
                    resolved.push((other, outcome));
                }
                None => {
                    stats.cache_misses += 1;
                    missed.push((other, key));
                }
            }
        }

        if !missed.is_empty() {
            let targets: HashSet<&str> = missed.iter().map(|(drone, _)| drone.id()).collect();
            let mut found = self.scan(candidate, &targets, &mut stats);
            for (other, key) in missed {
                let outcome = normalize(found.remove(other.id()).unwrap_or_default(), &key.first);
                self.cache.put(key, outcome.clone());
                resolved.push((other, outcome));
            }
        }
        resolved.sort_by(|(a, _), (b, _)| a.id().cmp(b.id()));

        let mut spatial_conflicts = Vec::new();
        let mut temporal_conflicts = Vec::new();
        for (other, outcome) in resolved {
            if outcome.is_empty() {
                if let Some(overlap) = window.intersection(&other.window()) {
                    temporal_conflicts.push(TemporalConflict {
                        drone_a: candidate.id().to_string(),
                        drone_b: other.id().to_string(),
                        overlap_start: overlap.start,
                        overlap_end: overlap.end,
                    });
                }
            } else {
                spatial_conflicts.extend(outcome.into_iter().map(|c| c.oriented(candidate.id())));
            }
        }
        spatial_conflicts.sort_by(ConflictPoint::ordering);

        let result = ValidationResult::new(
            candidate.id(),
            spatial_conflicts,
            temporal_conflicts,
            stats,
        );
        tracing::info!(
            "Validated mission {}: {} spatial / {} temporal conflict(s) across {} candidate drone(s) in {:?}",
            candidate.id(),
            result.spatial_conflicts.len(),
            result.temporal_conflicts.len(),
            stats.temporal_candidates,
            started.elapsed()
        );
        tracing::debug!(
            "Mission {} cache: {} hit(s), {} miss(es), {} pair check(s)",
            candidate.id(),
            stats.cache_hits,
            stats.cache_misses,
            stats.pair_checks
        );
        Ok(result)
    }

    /// Conflicts between two registered missions, without the temporal
    /// pre-filter. Every record's `drone_a` is the first argument.
    pub fn get_conflict_points(&mut self, drone_a: &str, drone_b: &str) -> Result<Vec<ConflictPoint>> {
        if drone_a == drone_b {
            return Err(DeconflictError::InvalidInput(format!(
                "cannot compare drone {drone_a} with itself"
            )));
        }
        let a = self
            .drone(drone_a)
            .ok_or_else(|| DeconflictError::UnknownDrone(drone_a.to_string()))?;
        let b = self
            .drone(drone_b)
            .ok_or_else(|| DeconflictError::UnknownDrone(drone_b.to_string()))?;

        let key = self.pair_key(&a, &b);
        let outcome = match self.cache.get(&key) {
            Some(outcome) => outcome,
            None => {
                let mut stats = ValidationStats::default();
                let targets = HashSet::from([b.id()]);
                let mut found = self.scan(&a, &targets, &mut stats);
                let outcome = normalize(found.remove(b.id()).unwrap_or_default(), &key.first);
                self.cache.put(key, outcome.clone());
                outcome
            }
        };

        Ok(outcome.into_iter().map(|c| c.oriented(drone_a)).collect())
    }

    fn pair_key(&self, a: &Drone, b: &Drone) -> PairKey {
        PairKey::new(
            (a.id(), a.fingerprint()),
            (b.id(), b.fingerprint()),
            self.generation,
        )
    }

    fn check_airspace(&self, drone: &Drone) -> Result<()> {
        match drone
            .waypoints()
            .iter()
            .position(|wp| !self.rules.contains(wp.x, wp.y, wp.z))
        {
            Some(index) => Err(DeconflictError::OutOfAirspace {
                drone_id: drone.id().to_string(),
                index,
            }),
            None => Ok(()),
        }
    }

    fn rebuild(&mut self) {
        let index = SpatialIndex::build(self.drones.values().map(|d| d.as_ref()));
        self.spatial = Arc::new(index);
        self.generation += 1;
        tracing::debug!(
            "Rebuilt spatial index with {} waypoints (generation {})",
            self.spatial.len(),
            self.generation
        );
    }

    /// Probe the spatial index around every waypoint of `probe` and collect
    /// violations against the `targets`, grouped by drone id.
    fn scan(
        &self,
        probe: &Drone,
        targets: &HashSet<&str>,
        stats: &mut ValidationStats,
    ) -> HashMap<String, Vec<ConflictPoint>> {
        let radius = self.rules.safety_buffer_m;
        let temporal_buffer = self.rules.temporal_buffer();
        let mut found: HashMap<String, Vec<ConflictPoint>> = HashMap::new();

        for waypoint in probe.waypoints() {
            stats.spatial_queries += 1;
            for hit in self.spatial.query_radius(waypoint.position(), radius) {
                if !targets.contains(&*hit.drone_id) {
                    continue;
                }
                stats.pair_checks += 1;

                // Strict on both axes: exactly one buffer apart is clear
                let distance = waypoint.distance_to(&hit.waypoint);
                if distance < radius && waypoint.time_gap(&hit.waypoint) < temporal_buffer {
                    found
                        .entry(hit.drone_id.to_string())
                        .or_default()
                        .push(ConflictPoint::from_violation(
                            probe.id(),
                            waypoint,
                            &hit.drone_id,
                            &hit.waypoint,
                            distance,
                            radius,
                        ));
                }
            }
        }
        found
    }
}

/// Canonical cached form: oriented to the key's first id and sorted.
fn normalize(conflicts: Vec<ConflictPoint>, first: &str) -> PairOutcome {
    let mut outcome: PairOutcome = conflicts.into_iter().map(|c| c.oriented(first)).collect();
    outcome.sort_by(ConflictPoint::ordering);
    outcome
}
