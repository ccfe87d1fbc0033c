//! Per-player movement segments with smoothing and speed metrics
//!
//! Consecutive anchored events of a player form a segment between two
//! portals. Raw anchors are noisy (a player acts at portal edges, not at
//! portal centers), so each endpoint can be replaced by a time-windowed
//! weighted centroid of the player's nearby activity.
//!
//! Speeds are deliberately lower bounds. Every event only proves the
//! player was somewhere within interaction range of the portal, so each
//! endpoint gets an uncertainty allowance before the speed is computed.

use crate::geo::{haversine_km, GeoPoint};
use commtrace_core::model::{EventKind, Faction, SpatialEvent};
use commtrace_core::Timeline;
use serde::{Deserialize, Serialize};

/// Portal interaction radius expressed as a distance floor, kilometers.
/// Distances at or under this floor yield a minimum speed of zero.
pub const ANCHOR_FLOOR_KM: f64 = 0.08;

/// Endpoint smoothing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothingConfig {
    pub enabled: bool,
    /// Half-width of the centroid window around an event, milliseconds.
    pub window_ms: i64,
    pub weight_capture: f64,
    pub weight_deploy: f64,
    pub weight_link: f64,
    /// Destroying a resonator can happen from an adjacent portal, so it
    /// pins the player's position far less tightly.
    pub weight_destroy_reso: f64,
    /// Below this total weight the centroid is unreliable and the raw
    /// anchor is used instead.
    pub min_weight_sum: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 60_000,
            weight_capture: 1.0,
            weight_deploy: 1.0,
            weight_link: 1.0,
            weight_destroy_reso: 0.15,
            min_weight_sum: 0.5,
        }
    }
}

impl SmoothingConfig {
    /// Positional confidence weight of an event kind. Zero means the kind
    /// does not participate in centroids at all.
    pub fn weight_for(&self, kind: EventKind) -> f64 {
        match kind {
            EventKind::Capture => self.weight_capture,
            EventKind::Deploy => self.weight_deploy,
            EventKind::Link => self.weight_link,
            EventKind::DestroyReso => self.weight_destroy_reso,
            EventKind::LinkDestroyed => 0.0,
        }
    }
}

/// One movement step between two consecutive anchored events of a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub player: String,
    pub team: Option<Faction>,
    pub from_ts: i64,
    pub to_ts: i64,
    pub from_kind: EventKind,
    pub to_kind: EventKind,
    /// Endpoint positions after smoothing (raw anchors when smoothing is
    /// off or falls back).
    pub from_point: GeoPoint,
    pub to_point: GeoPoint,
    pub distance_km: f64,
    pub dt_ms: i64,
    /// Lower bound on the player's speed over this segment, km/h. Zero
    /// when the distance is within the anchor floor or time stands still.
    pub min_speed_kmh: f64,
}

impl Segment {
    /// Whether this segment is physically implausible at the given
    /// threshold (e.g. faster than any ground transport).
    pub fn is_anomalous(&self, threshold_kmh: f64) -> bool {
        self.min_speed_kmh > threshold_kmh
    }
}

/// Builds movement segments for players against a merged timeline.
pub struct SegmentBuilder<'a> {
    timeline: &'a Timeline,
    smoothing: SmoothingConfig,
}

impl<'a> SegmentBuilder<'a> {
    pub fn new(timeline: &'a Timeline) -> Self {
        Self {
            timeline,
            smoothing: SmoothingConfig::default(),
        }
    }

    pub fn with_smoothing(mut self, smoothing: SmoothingConfig) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Segments for one player, in timeline order. Consecutive events at
    /// the same portal produce no segment.
    pub fn for_player(&self, player: &str) -> Vec<Segment> {
        let anchored: Vec<&SpatialEvent> = self
            .timeline
            .iter()
            .filter(|e| e.player == player && e.kind.has_anchor())
            .collect();

        let mut segments = Vec::new();
        for pair in anchored.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            if from.anchor().same_portal(to.anchor()) {
                continue;
            }
            let from_point = self.endpoint(from);
            let to_point = self.endpoint(to);
            let distance_km = haversine_km(from_point, to_point);
            let dt_ms = to.ts - from.ts;
            segments.push(Segment {
                player: player.to_string(),
                team: from.team.or(to.team),
                from_ts: from.ts,
                to_ts: to.ts,
                from_kind: from.kind,
                to_kind: to.kind,
                from_point,
                to_point,
                distance_km,
                dt_ms,
                min_speed_kmh: min_speed_kmh(distance_km, dt_ms),
            });
        }
        segments
    }

    /// Segments for several players, interleaved in ascending start time.
    pub fn for_players<S: AsRef<str>>(&self, players: &[S]) -> Vec<Segment> {
        let mut all: Vec<Segment> = players
            .iter()
            .flat_map(|p| self.for_player(p.as_ref()))
            .collect();
        all.sort_by_key(|s| s.from_ts);
        all
    }

    /// Smoothed position for one event: the weighted centroid of the
    /// player's anchored activity within the smoothing window, falling
    /// back to the raw anchor when the window carries too little weight.
    fn endpoint(&self, event: &SpatialEvent) -> GeoPoint {
        let anchor = event.anchor();
        let raw = GeoPoint::new(anchor.lat, anchor.lng);
        if !self.smoothing.enabled {
            return raw;
        }

        let window = self
            .timeline
            .slice_between(event.ts - self.smoothing.window_ms, event.ts + self.smoothing.window_ms);
        let mut sum_w = 0.0;
        let mut sum_lat = 0.0;
        let mut sum_lng = 0.0;
        for e in window {
            if e.player != event.player || !e.kind.has_anchor() {
                continue;
            }
            let w = self.smoothing.weight_for(e.kind);
            if w <= 0.0 {
                continue;
            }
            let a = e.anchor();
            sum_w += w;
            sum_lat += a.lat * w;
            sum_lng += a.lng * w;
        }
        if sum_w < self.smoothing.min_weight_sum {
            return raw;
        }
        GeoPoint::new(sum_lat / sum_w, sum_lng / sum_w)
    }
}

/// Minimum-speed estimate: each endpoint could be anywhere within the
/// anchor floor of its portal, so that slack is subtracted first.
fn min_speed_kmh(distance_km: f64, dt_ms: i64) -> f64 {
    if distance_km <= ANCHOR_FLOOR_KM || dt_ms <= 0 {
        return 0.0;
    }
    (distance_km - ANCHOR_FLOOR_KM) / (dt_ms as f64 / 3_600_000.0)
}
