//! Mission-window index used as a coarse pre-filter.

use crate::models::MissionWindow;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct TemporalIndex {
    buffer: Duration,
    windows: HashMap<String, MissionWindow>,
}

impl TemporalIndex {
    pub fn new(buffer: Duration) -> Self {
        Self {
            buffer,
            windows: HashMap::new(),
        }
    }

    pub fn buffer(&self) -> Duration {
        self.buffer
    }

    pub fn insert(&mut self, drone_id: impl Into<String>, window: MissionWindow) {
        self.windows.insert(drone_id.into(), window);
    }

    pub fn remove(&mut self, drone_id: &str) -> Option<MissionWindow> {
        self.windows.remove(drone_id)
    }

    pub fn window(&self, drone_id: &str) -> Option<MissionWindow> {
        self.windows.get(drone_id).copied()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Drones whose window may overlap `[start, end]`, sorted by id.
    ///
    /// Conservative: never drops a pair that could conflict, may keep
    /// pairs that turn out to be clear.
    pub fn overlapping(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<String> {
        let query = MissionWindow { start, end };
        let mut ids: Vec<String> = self
            .windows
            .iter()
            .filter(|(_, window)| window.overlaps(&query, self.buffer))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn window(start: i64, end: i64) -> MissionWindow {
        MissionWindow {
            start: t(start),
            end: t(end),
        }
    }

    #[test]
    fn overlapping_applies_buffer_on_both_sides() {
        let mut index = TemporalIndex::new(Duration::minutes(15));
        index.insert("early", window(0, 10));
        index.insert("late", window(40, 50));
        index.insert("edge", window(46, 60));

        // Candidate 25..30: "early" ends 15 minutes before, "edge" starts 16 after
        assert_eq!(index.overlapping(t(25), t(30)), vec!["early", "late"]);
        assert_eq!(index.overlapping(t(26), t(30)), vec!["late"]);
    }

    #[test]
    fn results_are_sorted_by_id() {
        let mut index = TemporalIndex::new(Duration::minutes(1));
        for id in ["charlie", "alpha", "bravo"] {
            index.insert(id, window(0, 10));
        }
        assert_eq!(index.overlapping(t(5), t(5)), vec!["alpha", "bravo", "charlie"]);
    }

    #[test]
    fn remove_drops_window() {
        let mut index = TemporalIndex::new(Duration::minutes(15));
        index.insert("A", window(0, 10));
        assert_eq!(index.len(), 1);
        assert_eq!(index.remove("A"), Some(window(0, 10)));
        assert!(index.remove("A").is_none());
        assert!(index.overlapping(t(0), t(10)).is_empty());
    }

    #[test]
    fn degenerate_windows_still_match() {
        let mut index = TemporalIndex::new(Duration::seconds(1));
        index.insert("point", window(5, 5));
        assert_eq!(index.overlapping(t(5), t(5)), vec!["point"]);
        assert!(index.window("point").is_some());
    }
}
