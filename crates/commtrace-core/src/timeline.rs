//! Timeline - sorted, binary-searchable event index
//!
//! All merged events live here in ascending `ts` order. The two bound
//! queries mirror C++'s `lower_bound`/`upper_bound` and cost O(log n);
//! everything downstream (window reconciliation, neighbor lookups, stats)
//! slices the timeline through them instead of scanning.

use crate::model::SpatialEvent;
use serde::{Deserialize, Serialize};

/// Deduplicated spatial events sorted ascending by timestamp.
///
/// Invariant: `events[i].ts <= events[i+1].ts` for all `i`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timeline {
    events: Vec<SpatialEvent>,
}

impl Timeline {
    /// Build a timeline, sorting the events defensively. Extraction should
    /// not reorder records, but the constructor does not assume it.
    pub fn new(mut events: Vec<SpatialEvent>) -> Self {
        events.sort_by_key(|e| e.ts);
        Self { events }
    }

    pub fn events(&self) -> &[SpatialEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SpatialEvent> {
        self.events.iter()
    }

    /// First index with `ts >= t`.
    pub fn lower_bound(&self, t: i64) -> usize {
        self.events.partition_point(|e| e.ts < t)
    }

    /// First index with `ts > t`.
    pub fn upper_bound(&self, t: i64) -> usize {
        self.events.partition_point(|e| e.ts <= t)
    }

    /// Events with `t0 <= ts <= t1`.
    pub fn slice_between(&self, t0: i64, t1: i64) -> &[SpatialEvent] {
        let lo = self.lower_bound(t0);
        let hi = self.upper_bound(t1);
        &self.events[lo..hi.max(lo)]
    }

    /// Earliest and latest timestamps, when non-empty.
    pub fn time_bounds(&self) -> Option<(i64, i64)> {
        match (self.events.first(), self.events.last()) {
            (Some(a), Some(b)) => Some((a.ts, b.ts)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventKind, PortalRef};

    fn ev(ts: i64) -> SpatialEvent {
        SpatialEvent {
            ts,
            kind: EventKind::Capture,
            player: "A".into(),
            team: None,
            faction: None,
            portals: vec![PortalRef {
                guid: None,
                lat: 0.0,
                lng: 0.0,
                name: None,
            }],
        }
    }

    #[test]
    fn test_sorted_on_construction() {
        let tl = Timeline::new(vec![ev(30), ev(10), ev(20), ev(10)]);
        let ts: Vec<_> = tl.iter().map(|e| e.ts).collect();
        assert_eq!(ts, vec![10, 10, 20, 30]);
        for w in tl.events().windows(2) {
            assert!(w[0].ts <= w[1].ts);
        }
    }

    #[test]
    fn test_bounds() {
        let tl = Timeline::new(vec![ev(10), ev(20), ev(20), ev(30)]);
        assert_eq!(tl.lower_bound(20), 1);
        assert_eq!(tl.upper_bound(20), 3);
        assert_eq!(tl.lower_bound(5), 0);
        assert_eq!(tl.upper_bound(35), 4);
        assert_eq!(tl.slice_between(15, 25).len(), 2);
        assert_eq!(tl.time_bounds(), Some((10, 30)));
        assert_eq!(Timeline::default().time_bounds(), None);
    }
}
