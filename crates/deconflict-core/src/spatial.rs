//! Static k-d tree over the waypoints of every registered mission.
//!
//! The tree is never updated in place. The engine builds a fresh index
//! whenever the registered set changes and publishes it behind an `Arc`,
//! so readers holding an older snapshot keep a consistent view.

use crate::models::{squared_distance, Drone, Waypoint};
use std::sync::Arc;

/// One indexed sample, tagged with its owning mission.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedWaypoint {
    pub drone_id: Arc<str>,
    /// Position of the waypoint within its mission
    pub sequence: usize,
    pub waypoint: Waypoint,
}

impl IndexedWaypoint {
    fn coord(&self, axis: usize) -> f64 {
        self.waypoint.position()[axis]
    }
}

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Bounds {
    fn around(mut points: impl Iterator<Item = [f64; 3]>) -> Option<Self> {
        let first = points.next()?;
        let mut bounds = Bounds {
            min: first,
            max: first,
        };
        for p in points {
            for axis in 0..3 {
                bounds.min[axis] = bounds.min[axis].min(p[axis]);
                bounds.max[axis] = bounds.max[axis].max(p[axis]);
            }
        }
        Some(bounds)
    }

    fn widest_axis(&self) -> usize {
        let spread = |axis: usize| self.max[axis] - self.min[axis];
        let mut widest = 0;
        for axis in 1..3 {
            if spread(axis) > spread(widest) {
                widest = axis;
            }
        }
        widest
    }

    /// Squared distance from `point` to the nearest point of the box.
    fn squared_distance_to(&self, point: [f64; 3]) -> f64 {
        let mut total = 0.0;
        for axis in 0..3 {
            let d = if point[axis] < self.min[axis] {
                self.min[axis] - point[axis]
            } else if point[axis] > self.max[axis] {
                point[axis] - self.max[axis]
            } else {
                0.0
            };
            total += d * d;
        }
        total
    }
}

#[derive(Debug, Clone)]
struct Node {
    entry: usize,
    axis: usize,
    bounds: Bounds,
    left: Option<usize>,
    right: Option<usize>,
}

/// Balanced k-d tree supporting radius and nearest-neighbour queries.
#[derive(Debug, Clone, Default)]
pub struct SpatialIndex {
    entries: Vec<IndexedWaypoint>,
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl SpatialIndex {
    /// Build a tree over every waypoint of `drones`.
    pub fn build<'a>(drones: impl IntoIterator<Item = &'a Drone>) -> Self {
        let mut entries = Vec::new();
        for drone in drones {
            let drone_id: Arc<str> = Arc::from(drone.id());
            entries.extend(
                drone
                    .waypoints()
                    .iter()
                    .enumerate()
                    .map(|(sequence, waypoint)| IndexedWaypoint {
                        drone_id: drone_id.clone(),
                        sequence,
                        waypoint: *waypoint,
                    }),
            );
        }

        let mut order: Vec<usize> = (0..entries.len()).collect();
        let mut nodes = Vec::with_capacity(entries.len());
        let root = build_subtree(&entries, &mut order, &mut nodes);
        Self {
            entries,
            nodes,
            root,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bounding box of every indexed waypoint.
    pub fn bounds(&self) -> Option<Bounds> {
        self.root.map(|root| self.nodes[root].bounds)
    }

    /// All entries within `radius` (inclusive) of `point`.
    pub fn query_radius(&self, point: [f64; 3], radius: f64) -> Vec<&IndexedWaypoint> {
        let mut found = Vec::new();
        if radius.is_nan() || radius < 0.0 {
            return found;
        }
        let radius_sq = radius * radius;

        let mut stack: Vec<usize> = self.root.into_iter().collect();
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if node.bounds.squared_distance_to(point) > radius_sq {
                continue;
            }
            let entry = &self.entries[node.entry];
            if squared_distance(entry.waypoint.position(), point) <= radius_sq {
                found.push(entry);
            }
            stack.extend(node.left);
            stack.extend(node.right);
        }
        found
    }

    /// Closest indexed entry to `point` and its distance.
    pub fn nearest(&self, point: [f64; 3]) -> Option<(&IndexedWaypoint, f64)> {
        let root = self.root?;
        let mut best: Option<(usize, f64)> = None;
        self.nearest_in(root, point, &mut best);
        best.map(|(entry, dist_sq)| (&self.entries[entry], dist_sq.sqrt()))
    }

    fn nearest_in(&self, idx: usize, point: [f64; 3], best: &mut Option<(usize, f64)>) {
        let node = &self.nodes[idx];
        if let Some((_, best_sq)) = *best {
            if node.bounds.squared_distance_to(point) > best_sq {
                return;
            }
        }

        let entry = &self.entries[node.entry];
        let dist_sq = squared_distance(entry.waypoint.position(), point);
        if best.map_or(true, |(_, best_sq)| dist_sq < best_sq) {
            *best = Some((node.entry, dist_sq));
        }

        // Descend into the side containing the query point first
        let (near, far) = if point[node.axis] < entry.coord(node.axis) {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };
        if let Some(near) = near {
            self.nearest_in(near, point, best);
        }
        if let Some(far) = far {
            self.nearest_in(far, point, best);
        }
    }
}

fn build_subtree(
    entries: &[IndexedWaypoint],
    order: &mut [usize],
    nodes: &mut Vec<Node>,
) -> Option<usize> {
    let bounds = Bounds::around(order.iter().map(|&i| entries[i].waypoint.position()))?;
    let axis = bounds.widest_axis();
    let median = order.len() / 2;
    order.select_nth_unstable_by(median, |&a, &b| {
        entries[a].coord(axis).total_cmp(&entries[b].coord(axis))
    });

    let slot = nodes.len();
    nodes.push(Node {
        entry: order[median],
        axis,
        bounds,
        left: None,
        right: None,
    });

    let (lower, rest) = order.split_at_mut(median);
    let left = build_subtree(entries, lower, nodes);
    let right = build_subtree(entries, &mut rest[1..], nodes);
    nodes[slot].left = left;
    nodes[slot].right = right;
    Some(slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::euclidean_distance;
    use chrono::{Duration, TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn drone(id: &str, points: &[[f64; 3]]) -> Drone {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let waypoints = points
            .iter()
            .enumerate()
            .map(|(i, p)| Waypoint::new(p[0], p[1], p[2], t0 + Duration::seconds(i as i64)))
            .collect();
        Drone::new(id, waypoints).unwrap()
    }

    fn random_drones(rng: &mut StdRng, count: usize, per_drone: usize) -> Vec<Drone> {
        (0..count)
            .map(|i| {
                let points: Vec<[f64; 3]> = (0..per_drone)
                    .map(|_| {
                        [
                            rng.random_range(0.0..500.0),
                            rng.random_range(0.0..500.0),
                            rng.random_range(0.0..100.0),
                        ]
                    })
                    .collect();
                drone(&format!("D{i}"), &points)
            })
            .collect()
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = SpatialIndex::build(std::iter::empty());
        assert!(index.is_empty());
        assert!(index.bounds().is_none());
        assert!(index.query_radius([0.0, 0.0, 0.0], 100.0).is_empty());
        assert!(index.nearest([0.0, 0.0, 0.0]).is_none());
    }

    #[test]
    fn radius_query_is_inclusive_and_tags_owner() {
        let a = drone("A", &[[0.0, 0.0, 0.0], [100.0, 0.0, 0.0]]);
        let b = drone("B", &[[10.0, 0.0, 0.0]]);
        let index = SpatialIndex::build([&a, &b]);
        assert_eq!(index.len(), 3);

        let hits = index.query_radius([0.0, 0.0, 0.0], 10.0);
        let mut owners: Vec<&str> = hits.iter().map(|h| &*h.drone_id).collect();
        owners.sort();
        assert_eq!(owners, vec!["A", "B"]);

        let hits = index.query_radius([100.0, 0.0, 0.0], 0.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].sequence, 1);
    }

    #[test]
    fn radius_query_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(7);
        let drones = random_drones(&mut rng, 40, 12);
        let index = SpatialIndex::build(&drones);

        for _ in 0..50 {
            let center = [
                rng.random_range(0.0..500.0),
                rng.random_range(0.0..500.0),
                rng.random_range(0.0..100.0),
            ];
            let radius = rng.random_range(5.0..80.0);

            let mut expected: Vec<(String, usize)> = drones
                .iter()
                .flat_map(|d| {
                    d.waypoints()
                        .iter()
                        .enumerate()
                        .filter(|(_, wp)| euclidean_distance(wp.position(), center) <= radius)
                        .map(|(i, _)| (d.id().to_string(), i))
                        .collect::<Vec<_>>()
                })
                .collect();
            let mut actual: Vec<(String, usize)> = index
                .query_radius(center, radius)
                .into_iter()
                .map(|hit| (hit.drone_id.to_string(), hit.sequence))
                .collect();
            expected.sort();
            actual.sort();
            assert_eq!(actual, expected);
        }
    }

    #[test]
    fn nearest_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(11);
        let drones = random_drones(&mut rng, 25, 8);
        let index = SpatialIndex::build(&drones);

        for _ in 0..30 {
            let probe = [
                rng.random_range(-50.0..550.0),
                rng.random_range(-50.0..550.0),
                rng.random_range(0.0..100.0),
            ];
            let expected = drones
                .iter()
                .flat_map(|d| d.waypoints())
                .map(|wp| euclidean_distance(wp.position(), probe))
                .fold(f64::INFINITY, f64::min);
            let (_, dist) = index.nearest(probe).unwrap();
            assert!((dist - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn bounds_cover_all_points() {
        let a = drone("A", &[[-5.0, 2.0, 1.0], [7.0, -3.0, 9.0]]);
        let index = SpatialIndex::build([&a]);
        let bounds = index.bounds().unwrap();
        assert_eq!(bounds.min, [-5.0, -3.0, 1.0]);
        assert_eq!(bounds.max, [7.0, 2.0, 9.0]);
    }
}
