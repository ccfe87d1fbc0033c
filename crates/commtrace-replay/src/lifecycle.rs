//! Time-windowed visual lifecycles
//!
//! The controller owns every derived visual whose existence is a function
//! of the clock: uncertainty halos around recent anchors, attack rings and
//! direction wedges for resonator destruction, and link lines alive over
//! their born/dead interval. Each reconcile pass diffs the set of visuals
//! that *should* exist at `now` against the set that *does*, creating,
//! fading, and reviving as needed.
//!
//! Fade-out is a discrete state machine advanced once per host frame, so
//! replay stays deterministic: a fade of `duration_ms` over `steps` steps
//! holds each step for `duration_ms / steps / FRAME_INTERVAL_MS` frames.

use crate::clock::FRAME_INTERVAL_MS;
use crate::config::ReplayConfig;
use crate::surface::{DrawSurface, Handle, Style};
use commtrace_core::model::{EventKind, Faction, PortalRef, SpatialEvent};
use commtrace_track::geo::{angle_delta_deg, bearing_deg, dest_point, haversine_km};
use commtrace_track::GeoPoint;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Portal identity for lifecycle keys: stable guid when present, else
/// coordinates quantized to micro-degrees.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PortalKey {
    Guid(String),
    Coord(i64, i64),
}

impl PortalKey {
    pub fn of(portal: &PortalRef) -> Self {
        match &portal.guid {
            Some(g) => Self::Guid(g.clone()),
            None => Self::Coord(
                (portal.lat * 1e6).round() as i64,
                (portal.lng * 1e6).round() as i64,
            ),
        }
    }
}

/// Identity of one per-event visual.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub ts: i64,
    pub player: String,
    pub kind: EventKind,
    pub portal: PortalKey,
}

impl ObjectKey {
    fn of(event: &SpatialEvent) -> Self {
        Self {
            ts: event.ts,
            player: event.player.clone(),
            kind: event.kind,
            portal: PortalKey::of(event.anchor()),
        }
    }
}

/// Undirected portal-pair identity of a link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkKey(PortalKey, PortalKey);

impl LinkKey {
    fn of(a: &PortalRef, b: &PortalRef) -> Self {
        let (ka, kb) = (PortalKey::of(a), PortalKey::of(b));
        if ka <= kb {
            Self(ka, kb)
        } else {
            Self(kb, ka)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Live,
    Fading {
        steps_left: u32,
        steps_total: u32,
        ticks_until_step: u32,
        ticks_per_step: u32,
    },
}

/// One visual currently on the surface, possibly multi-shape (a destroy
/// visual is a ring plus an optional wedge and tick).
#[derive(Debug)]
struct LiveObject {
    handles: Vec<(Handle, Style)>,
    phase: Phase,
    fade_steps: u32,
    fade_ticks_per_step: u32,
}

impl LiveObject {
    fn new(handles: Vec<(Handle, Style)>, fade_duration_ms: i64, fade_steps: u32) -> Self {
        let per_step = fade_duration_ms / i64::from(fade_steps.max(1)) / FRAME_INTERVAL_MS;
        Self {
            handles,
            phase: Phase::Live,
            fade_steps: fade_steps.max(1),
            fade_ticks_per_step: per_step.max(1) as u32,
        }
    }
}

/// A link's existence interval, with missing bounds extended to the clock
/// range so pre-existing or never-destroyed links still render.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkLifecycle {
    pub from: GeoPoint,
    pub to: GeoPoint,
    pub faction: Option<Faction>,
    pub born_ts: i64,
    pub dead_ts: i64,
}

impl LinkLifecycle {
    pub fn alive_at(&self, now: i64) -> bool {
        self.born_ts <= now && now < self.dead_ts
    }
}

/// Counters for diagnostics and UI readouts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerStats {
    pub live_halos: usize,
    pub live_attacks: usize,
    pub live_links: usize,
    pub fading: usize,
    pub created_total: usize,
    pub removed_total: usize,
}

/// Reconciles time-windowed visuals against a [`DrawSurface`].
#[derive(Debug, Default)]
pub struct LifecycleController {
    /// Anchor events of the selected players, ascending by ts.
    events: Vec<SpatialEvent>,
    /// Per-player anchored positions used by attack direction inference.
    anchors_by_player: IndexMap<String, Vec<(i64, GeoPoint)>>,
    links: IndexMap<LinkKey, LinkLifecycle>,
    live: IndexMap<ObjectKey, LiveObject>,
    live_links: IndexMap<LinkKey, LiveObject>,
    created_total: usize,
    removed_total: usize,
}

impl LifecycleController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the working event set (already filtered to the selected
    /// players) and rebuild derived indexes. `range` is the clock's full
    /// time range, used to extend unbounded link intervals. Any previously
    /// drawn visuals are removed from `surface` immediately.
    pub fn set_events(
        &mut self,
        events: Vec<SpatialEvent>,
        range: (i64, i64),
        surface: &mut dyn DrawSurface,
    ) {
        self.reset(surface);
        let mut events = events;
        events.sort_by_key(|e| e.ts);

        let mut anchors: IndexMap<String, Vec<(i64, GeoPoint)>> = IndexMap::new();
        for e in &events {
            if matches!(e.kind, EventKind::Capture | EventKind::Deploy | EventKind::Link) {
                let a = e.anchor();
                anchors
                    .entry(e.player.clone())
                    .or_default()
                    .push((e.ts, GeoPoint::new(a.lat, a.lng)));
            }
        }

        self.links = build_link_lifecycles(&events, range);
        self.anchors_by_player = anchors;
        self.events = events;
        log::debug!(
            "lifecycle set: {} events, {} link intervals",
            self.events.len(),
            self.links.len()
        );
    }

    /// Remove every visual and forget all live state. The event set and
    /// link intervals survive; only drawn shapes are dropped.
    pub fn reset(&mut self, surface: &mut dyn DrawSurface) {
        let objects = self
            .live
            .drain(..)
            .map(|(_, o)| o)
            .chain(self.live_links.drain(..).map(|(_, o)| o));
        for obj in objects {
            for (h, _) in &obj.handles {
                surface.remove(*h);
            }
            self.removed_total += 1;
        }
    }

    pub fn link_lifecycles(&self) -> impl Iterator<Item = &LinkLifecycle> {
        self.links.values()
    }

    pub fn stats(&self) -> ControllerStats {
        let fading = self
            .live
            .values()
            .chain(self.live_links.values())
            .filter(|o| matches!(o.phase, Phase::Fading { .. }))
            .count();
        ControllerStats {
            live_halos: self
                .live
                .iter()
                .filter(|(k, _)| k.kind != EventKind::DestroyReso)
                .count(),
            live_attacks: self
                .live
                .iter()
                .filter(|(k, _)| k.kind == EventKind::DestroyReso)
                .count(),
            live_links: self.live_links.len(),
            fading,
            created_total: self.created_total,
            removed_total: self.removed_total,
        }
    }

    /// Per-frame reconcile: visuals leaving the window fade out over
    /// their configured duration.
    pub fn on_tick(&mut self, now: i64, config: &ReplayConfig, surface: &mut dyn DrawSurface) {
        self.reconcile(now, config, surface, false);
    }

    /// Seek reconcile: the timeline jumped, so visuals that no longer
    /// belong are removed without a fade.
    pub fn on_seek(&mut self, now: i64, config: &ReplayConfig, surface: &mut dyn DrawSurface) {
        self.reconcile(now, config, surface, true);
    }

    fn reconcile(
        &mut self,
        now: i64,
        config: &ReplayConfig,
        surface: &mut dyn DrawSurface,
        immediate: bool,
    ) {
        let window_start = now - config.halo_window_past_ms;
        let window_end = now + config.halo_window_future_ms;

        // Enter / revive per-event visuals.
        let lo = self.events.partition_point(|e| e.ts < window_start);
        let hi = self.events.partition_point(|e| e.ts <= window_end);
        for i in lo..hi {
            let event = &self.events[i];
            if event.kind == EventKind::LinkDestroyed {
                // Link teardown renders through the link lifecycle only.
                continue;
            }
            let key = ObjectKey::of(event);
            if let Some(obj) = self.live.get_mut(&key) {
                if !matches!(obj.phase, Phase::Live) {
                    revive(obj, surface);
                }
                continue;
            }
            let handles = match event.kind {
                EventKind::DestroyReso => draw_destroy_visual(
                    event,
                    &self.anchors_by_player,
                    config,
                    surface,
                ),
                _ => draw_halo_visual(event, config, surface),
            };
            if !handles.is_empty() {
                let (dur, steps) = if event.kind == EventKind::DestroyReso {
                    (config.attack_fade_duration_ms, config.attack_fade_steps)
                } else {
                    (config.halo_fade_duration_ms, config.halo_fade_steps)
                };
                self.created_total += 1;
                self.live.insert(key, LiveObject::new(handles, dur, steps));
            }
        }

        // Exit: events whose ts left the window.
        for (key, obj) in self.live.iter_mut() {
            let in_window = (window_start..=window_end).contains(&key.ts);
            if !in_window && matches!(obj.phase, Phase::Live) {
                begin_fade(obj);
            }
        }

        // Links: alive intervals against `now`.
        for (key, link) in &self.links {
            let alive = link.alive_at(now);
            match self.live_links.entry(key.clone()) {
                indexmap::map::Entry::Occupied(mut entry) => {
                    let obj = entry.get_mut();
                    if alive {
                        if !matches!(obj.phase, Phase::Live) {
                            revive(obj, surface);
                        }
                    } else if matches!(obj.phase, Phase::Live) {
                        begin_fade(obj);
                    }
                }
                indexmap::map::Entry::Vacant(entry) => {
                    if !alive {
                        continue;
                    }
                    let style = Style::solid(
                        config.link_color(link.faction),
                        config.link_stroke,
                        config.link_opacity,
                    );
                    let h = surface.draw_segment(link.from, link.to, &style);
                    self.created_total += 1;
                    entry.insert(LiveObject::new(
                        vec![(h, style)],
                        config.link_fade_duration_ms,
                        config.link_fade_steps,
                    ));
                }
            }
        }

        // Advance fades (or cut them short on seek).
        self.removed_total += step_fades(&mut self.live, surface, immediate);
        self.removed_total += step_fades(&mut self.live_links, surface, immediate);
    }
}

/// Restore a fading object's full-opacity styles and mark it live again.
fn revive(obj: &mut LiveObject, surface: &mut dyn DrawSurface) {
    for (h, style) in &obj.handles {
        surface.set_style(*h, style);
    }
    obj.phase = Phase::Live;
}

fn begin_fade(obj: &mut LiveObject) {
    obj.phase = Phase::Fading {
        steps_left: obj.fade_steps,
        steps_total: obj.fade_steps,
        ticks_until_step: obj.fade_ticks_per_step,
        ticks_per_step: obj.fade_ticks_per_step,
    };
}

/// Advance every fading object by one frame; returns how many finished
/// and were removed. With `immediate`, fading objects are removed now.
fn step_fades<K: std::hash::Hash + Eq>(
    live: &mut IndexMap<K, LiveObject>,
    surface: &mut dyn DrawSurface,
    immediate: bool,
) -> usize {
    let mut done: Vec<usize> = Vec::new();
    for (idx, (_, obj)) in live.iter_mut().enumerate() {
        let Phase::Fading {
            steps_left,
            steps_total,
            ticks_until_step,
            ticks_per_step,
        } = &mut obj.phase
        else {
            continue;
        };
        if immediate {
            done.push(idx);
            continue;
        }
        *ticks_until_step -= 1;
        if *ticks_until_step > 0 {
            continue;
        }
        *ticks_until_step = *ticks_per_step;
        *steps_left -= 1;
        if *steps_left == 0 {
            done.push(idx);
            continue;
        }
        let factor = f64::from(*steps_left) / f64::from(*steps_total);
        for (h, style) in &obj.handles {
            surface.set_style(*h, &style.faded(factor));
        }
    }
    // Remove back to front so indexes stay valid.
    for idx in done.iter().rev() {
        if let Some((_, obj)) = live.shift_remove_index(*idx) {
            for (h, _) in &obj.handles {
                surface.remove(*h);
            }
        }
    }
    done.len()
}

/// Group link events into undirected portal pairs and derive each pair's
/// existence interval. Birth is the earliest `link` event; death is the
/// earliest `link_destroyed` at or after birth. Missing bounds extend to
/// the clock range.
fn build_link_lifecycles(
    events: &[SpatialEvent],
    range: (i64, i64),
) -> IndexMap<LinkKey, LinkLifecycle> {
    struct Raw {
        from: GeoPoint,
        to: GeoPoint,
        faction: Option<Faction>,
        born: Option<i64>,
        deaths: Vec<i64>,
    }
    let mut raw: IndexMap<LinkKey, Raw> = IndexMap::new();
    for e in events {
        if !e.kind.is_link_family() || e.portals.len() < 2 {
            continue;
        }
        let (a, b) = (&e.portals[0], &e.portals[1]);
        let entry = raw.entry(LinkKey::of(a, b)).or_insert_with(|| Raw {
            from: GeoPoint::new(a.lat, a.lng),
            to: GeoPoint::new(b.lat, b.lng),
            faction: e.faction,
            born: None,
            deaths: Vec::new(),
        });
        match e.kind {
            EventKind::Link => {
                entry.born = Some(entry.born.map_or(e.ts, |b| b.min(e.ts)));
                if entry.faction.is_none() {
                    entry.faction = e.faction;
                }
            }
            EventKind::LinkDestroyed => entry.deaths.push(e.ts),
            _ => unreachable!(),
        }
    }

    raw.into_iter()
        .map(|(key, r)| {
            let born_ts = r.born.unwrap_or(range.0);
            let dead_ts = r
                .deaths
                .iter()
                .copied()
                .filter(|&d| d >= born_ts)
                .min()
                .unwrap_or(range.1);
            (
                key,
                LinkLifecycle {
                    from: r.from,
                    to: r.to,
                    faction: r.faction,
                    born_ts,
                    dead_ts,
                },
            )
        })
        .collect()
}

/// Draw the uncertainty halo for a capture/deploy/link event, degrading
/// to a plain marker when the halo would render below legibility.
fn draw_halo_visual(
    event: &SpatialEvent,
    config: &ReplayConfig,
    surface: &mut dyn DrawSurface,
) -> Vec<(Handle, Style)> {
    let anchor = event.anchor();
    let center = GeoPoint::new(anchor.lat, anchor.lng);
    let style = Style::solid(
        config.resolve_color(&event.player, event.team),
        config.halo_stroke,
        config.halo_opacity,
    )
    .with_fill(config.halo_fill_opacity)
    .with_dash(config.halo_dash.clone());

    let px_radius = surface.pixels_per_meter(center.lat) * config.halo_radius_m;
    let handle = if px_radius < config.halo_min_pixel_radius {
        surface.draw_marker(center, &style)
    } else {
        surface.draw_halo(center, config.halo_radius_m, &style)
    };
    vec![(handle, style)]
}

/// Draw the destroy visual: a small hit ring, plus a direction wedge and
/// outward tick when neighboring anchors hint where the attacker moved
/// from or to.
fn draw_destroy_visual(
    event: &SpatialEvent,
    anchors_by_player: &IndexMap<String, Vec<(i64, GeoPoint)>>,
    config: &ReplayConfig,
    surface: &mut dyn DrawSurface,
) -> Vec<(Handle, Style)> {
    let anchor = event.anchor();
    let center = GeoPoint::new(anchor.lat, anchor.lng);
    let color = config.resolve_color(&event.player, event.team);

    let ring_style = Style::solid(color, config.attack_ring_stroke, config.attack_stroke_opacity)
        .with_fill(config.attack_fill_opacity);
    let mut handles = vec![(
        surface.draw_halo(center, config.attack_ring_radius_m, &ring_style),
        ring_style,
    )];

    let anchors = anchors_by_player
        .get(&event.player)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let prev = neighbor_anchor(anchors, center, event.ts, config, Direction::Before);
    let next = neighbor_anchor(anchors, center, event.ts, config, Direction::After);
    let Some((start_deg, end_deg, mid_deg)) = wedge_angles(center, prev, next, config) else {
        return handles;
    };

    let arc_style = Style::solid(color, 2.0, config.attack_stroke_opacity);
    handles.push((
        surface.draw_arc(
            center,
            config.attack_wedge_radius_m,
            start_deg,
            end_deg,
            &arc_style,
        ),
        arc_style.clone(),
    ));

    // Outward normal tick at the wedge midpoint.
    let mid = dest_point(center, mid_deg, config.attack_wedge_radius_m / 1000.0);
    let tip = dest_point(mid, mid_deg, config.attack_tick_len_m / 1000.0);
    handles.push((surface.draw_segment(mid, tip, &arc_style), arc_style));
    handles
}

enum Direction {
    Before,
    After,
}

/// Nearest anchored position of the player before/after `ts`, accepted
/// when within the attack time window OR within the spatial threshold of
/// the destroyed portal. The scan stops once the time window is exceeded
/// and the candidate is also too far away.
fn neighbor_anchor(
    anchors: &[(i64, GeoPoint)],
    center: GeoPoint,
    ts: i64,
    config: &ReplayConfig,
    direction: Direction,
) -> Option<GeoPoint> {
    let split = anchors.partition_point(|(t, _)| *t <= ts);
    let candidates: Box<dyn Iterator<Item = &(i64, GeoPoint)>> = match direction {
        Direction::Before => Box::new(anchors[..split].iter().rev()),
        Direction::After => Box::new(anchors[split..].iter()),
    };
    for (t, point) in candidates {
        let dt_ok = (ts - t).abs() <= config.attack_window_ms;
        let dist_ok =
            haversine_km(center, *point) * 1000.0 <= config.attack_spatial_threshold_m;
        if dt_ok || dist_ok {
            return Some(*point);
        }
        if !dt_ok {
            break;
        }
    }
    None
}

/// Wedge `(start, end, mid)` bearings. Two neighbors span the angle
/// between their bearings, clamped to the configured range; one neighbor
/// centers a 90 degree wedge on its bearing; none yields no wedge.
fn wedge_angles(
    center: GeoPoint,
    prev: Option<GeoPoint>,
    next: Option<GeoPoint>,
    config: &ReplayConfig,
) -> Option<(f64, f64, f64)> {
    let b_prev = prev.map(|p| bearing_deg(center, p));
    let b_next = next.map(|p| bearing_deg(center, p));
    match (b_prev, b_next) {
        (Some(a), Some(b)) => {
            let d = angle_delta_deg(a, b);
            let span = d.abs().clamp(config.attack_wedge_min_deg, config.attack_wedge_max_deg);
            let sign = if d >= 0.0 { 1.0 } else { -1.0 };
            Some((
                a,
                (a + sign * span).rem_euclid(360.0),
                (a + sign * span / 2.0).rem_euclid(360.0),
            ))
        }
        (Some(base), None) | (None, Some(base)) => {
            let span = 90.0;
            Some((
                (base - span / 2.0).rem_euclid(360.0),
                (base + span / 2.0).rem_euclid(360.0),
                base,
            ))
        }
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{RecordingSurface, Shape};
    use commtrace_core::model::PortalRef;

    fn portal(guid: &str, lat: f64, lng: f64) -> PortalRef {
        PortalRef {
            guid: Some(guid.to_string()),
            lat,
            lng,
            name: None,
        }
    }

    fn ev(ts: i64, kind: EventKind, player: &str, portals: Vec<PortalRef>) -> SpatialEvent {
        SpatialEvent {
            ts,
            kind,
            player: player.to_string(),
            team: Some(Faction::Enlightened),
            faction: if kind.is_link_family() {
                Some(Faction::Enlightened)
            } else {
                None
            },
            portals,
        }
    }

    fn capture(ts: i64, lat: f64) -> SpatialEvent {
        ev(ts, EventKind::Capture, "A", vec![portal(&format!("p{lat}"), lat, 139.0)])
    }

    fn setup(events: Vec<SpatialEvent>, range: (i64, i64)) -> (LifecycleController, RecordingSurface) {
        let mut surface = RecordingSurface::new();
        let mut ctl = LifecycleController::new();
        ctl.set_events(events, range, &mut surface);
        (ctl, surface)
    }

    #[test]
    fn test_halo_enters_and_leaves_window() {
        let cfg = ReplayConfig::default();
        let (mut ctl, mut surface) = setup(vec![capture(100_000, 35.0)], (0, 1_000_000));

        ctl.on_tick(0, &cfg, &mut surface);
        assert_eq!(surface.live_count(), 0);

        // Event within [now - 60s, now + 60s].
        ctl.on_tick(50_000, &cfg, &mut surface);
        assert_eq!(surface.halos().len(), 1);
        assert_eq!(ctl.stats().live_halos, 1);

        // Leaving the window starts a fade, not an instant removal.
        ctl.on_tick(200_000, &cfg, &mut surface);
        assert_eq!(ctl.stats().fading, 1);
        assert_eq!(surface.live_count(), 1);

        // 6 steps x 4 frames per step: gone after 24 ticks.
        for _ in 0..24 {
            ctl.on_tick(200_000, &cfg, &mut surface);
        }
        assert_eq!(surface.live_count(), 0);
        assert_eq!(ctl.stats().fading, 0);
    }

    #[test]
    fn test_fade_steps_reduce_opacity_monotonically() {
        let cfg = ReplayConfig::default();
        let (mut ctl, mut surface) = setup(vec![capture(100_000, 35.0)], (0, 1_000_000));
        ctl.on_tick(100_000, &cfg, &mut surface);
        ctl.on_tick(300_000, &cfg, &mut surface); // begin fade

        for _ in 0..4 {
            ctl.on_tick(300_000, &cfg, &mut surface);
        }
        let (h, shape) = surface.live_shapes().next().unwrap();
        let after_one_step = shape.style().opacity;
        assert!(after_one_step < cfg.halo_opacity);
        for _ in 0..4 {
            ctl.on_tick(300_000, &cfg, &mut surface);
        }
        assert!(surface.get(h).unwrap().style().opacity < after_one_step);
    }

    #[test]
    fn test_reentering_window_revives_fading_halo() {
        let cfg = ReplayConfig::default();
        let (mut ctl, mut surface) = setup(vec![capture(100_000, 35.0)], (0, 1_000_000));
        ctl.on_tick(100_000, &cfg, &mut surface);
        ctl.on_tick(300_000, &cfg, &mut surface);
        for _ in 0..8 {
            ctl.on_tick(300_000, &cfg, &mut surface);
        }
        assert_eq!(ctl.stats().fading, 1);

        // Scrub back into the window: same object, full opacity again.
        ctl.on_tick(100_000, &cfg, &mut surface);
        assert_eq!(ctl.stats().fading, 0);
        assert_eq!(surface.live_count(), 1);
        let (_, shape) = surface.live_shapes().next().unwrap();
        assert_eq!(shape.style().opacity, cfg.halo_opacity);
    }

    #[test]
    fn test_seek_removes_without_fade() {
        let cfg = ReplayConfig::default();
        let (mut ctl, mut surface) = setup(vec![capture(100_000, 35.0)], (0, 1_000_000));
        ctl.on_tick(100_000, &cfg, &mut surface);
        assert_eq!(surface.live_count(), 1);
        ctl.on_seek(900_000, &cfg, &mut surface);
        assert_eq!(surface.live_count(), 0);
    }

    #[test]
    fn test_sub_pixel_halo_degrades_to_marker() {
        let cfg = ReplayConfig::default();
        // 0.1 px/m: a 40 m halo would be 4 px, below the 12 px floor.
        let mut surface = RecordingSurface::new().with_pixels_per_meter(0.1);
        let mut ctl = LifecycleController::new();
        ctl.set_events(vec![capture(100_000, 35.0)], (0, 1_000_000), &mut surface);
        ctl.on_tick(100_000, &cfg, &mut surface);
        assert_eq!(surface.halos().len(), 0);
        assert_eq!(surface.markers().len(), 1);
    }

    #[test]
    fn test_link_alive_interval() {
        let cfg = ReplayConfig::default();
        let events = vec![
            ev(
                100_000,
                EventKind::Link,
                "A",
                vec![portal("a", 35.0, 139.0), portal("b", 35.01, 139.0)],
            ),
            ev(
                500_000,
                EventKind::LinkDestroyed,
                "B",
                vec![portal("a", 35.0, 139.0), portal("b", 35.01, 139.0)],
            ),
        ];
        let (mut ctl, mut surface) = setup(events, (0, 1_000_000));
        let link = ctl.link_lifecycles().next().unwrap().clone();
        assert_eq!(link.born_ts, 100_000);
        assert_eq!(link.dead_ts, 500_000);

        ctl.on_tick(50_000, &cfg, &mut surface);
        assert_eq!(ctl.stats().live_links, 0);
        ctl.on_tick(100_000, &cfg, &mut surface);
        assert_eq!(ctl.stats().live_links, 1);
        assert_eq!(surface.segments().len(), 1);
        match surface.segments()[0] {
            Shape::Segment { style, .. } => assert_eq!(style.color, "#00b000"),
            _ => unreachable!(),
        }

        // Death starts the link fade (5 steps x 3 frames).
        ctl.on_seek(500_000, &cfg, &mut surface);
        assert_eq!(surface.segments().len(), 0);
    }

    #[test]
    fn test_undirected_pair_and_extended_bounds() {
        // Destroyed-only pair: born extends to range start. Reversed
        // endpoint order must map to the same pair.
        let events = vec![
            ev(
                300_000,
                EventKind::LinkDestroyed,
                "B",
                vec![portal("b", 35.01, 139.0), portal("a", 35.0, 139.0)],
            ),
            ev(
                600_000,
                EventKind::Link,
                "A",
                vec![portal("a", 35.0, 139.0), portal("b", 35.01, 139.0)],
            ),
        ];
        let (ctl, _surface) = setup(events, (0, 1_000_000));
        let links: Vec<_> = ctl.link_lifecycles().collect();
        assert_eq!(links.len(), 1);
        // The destroy predates the (re)link, so it does not kill it; the
        // link survives to the range end.
        assert_eq!(links[0].born_ts, 600_000);
        assert_eq!(links[0].dead_ts, 1_000_000);
    }

    #[test]
    fn test_destroy_draws_ring_and_wedge() {
        let cfg = ReplayConfig::default();
        // Prior capture north of the destroyed portal within the time
        // window gives the wedge a bearing.
        let events = vec![
            capture(50_000, 35.002),
            ev(
                100_000,
                EventKind::DestroyReso,
                "A",
                vec![portal("x", 35.0, 139.0)],
            ),
        ];
        let (mut ctl, mut surface) = setup(events, (0, 1_000_000));
        ctl.on_tick(100_000, &cfg, &mut surface);

        // Ring halo + arc + tick segment (plus the capture's own halo).
        assert_eq!(surface.arcs().len(), 1);
        match surface.arcs()[0] {
            Shape::Arc {
                radius_m,
                from_deg,
                to_deg,
                ..
            } => {
                assert_eq!(*radius_m, 40.0);
                // Single neighbor due north: 90 degree wedge centered on 0.
                assert!((from_deg - 315.0).abs() < 1e-6);
                assert!((to_deg - 45.0).abs() < 1e-6);
            }
            _ => unreachable!(),
        }
        assert_eq!(ctl.stats().live_attacks, 1);
    }

    #[test]
    fn test_destroy_without_neighbors_draws_ring_only() {
        let cfg = ReplayConfig::default();
        let events = vec![ev(
            100_000,
            EventKind::DestroyReso,
            "A",
            vec![portal("x", 35.0, 139.0)],
        )];
        let (mut ctl, mut surface) = setup(events, (0, 1_000_000));
        ctl.on_tick(100_000, &cfg, &mut surface);
        assert_eq!(surface.halos().len(), 1);
        assert!(surface.arcs().is_empty());
        assert!(surface.segments().is_empty());
    }

    #[test]
    fn test_wedge_span_clamped() {
        let cfg = ReplayConfig::default();
        let center = GeoPoint::new(35.0, 139.0);
        // Nearly opposite bearings clamp to the max span.
        let prev = Some(GeoPoint::new(35.01, 139.0)); // north
        let next = Some(GeoPoint::new(35.0, 139.01)); // east-ish: 90 deg apart
        let (s, e, m) = wedge_angles(center, prev, next, &cfg).unwrap();
        assert!((s - 0.0).abs() < 1e-3);
        assert!((e - 90.0).abs() < 1e-2);
        assert!((m - 45.0).abs() < 1e-2);

        // Tiny angle clamps up to the minimum span.
        let next = Some(GeoPoint::new(35.01, 139.0005));
        let (s2, e2, _) = wedge_angles(center, prev, next, &cfg).unwrap();
        assert!((angle_delta_deg(s2, e2).abs() - cfg.attack_wedge_min_deg).abs() < 1e-6);
    }

    #[test]
    fn test_reset_clears_halos_and_links_together() {
        let cfg = ReplayConfig::default();
        let events = vec![
            capture(100_000, 35.0),
            ev(
                100_000,
                EventKind::Link,
                "A",
                vec![portal("a", 35.0, 139.0), portal("b", 35.01, 139.0)],
            ),
        ];
        let (mut ctl, mut surface) = setup(events, (0, 1_000_000));
        ctl.on_tick(100_000, &cfg, &mut surface);
        assert!(ctl.stats().live_halos >= 1);
        assert_eq!(ctl.stats().live_links, 1);

        ctl.reset(&mut surface);
        assert_eq!(surface.live_count(), 0);
        let stats = ctl.stats();
        assert_eq!(stats.live_halos + stats.live_attacks + stats.live_links, 0);
    }

    #[test]
    fn test_selection_reset_clears_surface() {
        let cfg = ReplayConfig::default();
        let (mut ctl, mut surface) = setup(vec![capture(100_000, 35.0)], (0, 1_000_000));
        ctl.on_tick(100_000, &cfg, &mut surface);
        assert_eq!(surface.live_count(), 1);
        ctl.set_events(vec![capture(100_000, 36.0)], (0, 1_000_000), &mut surface);
        assert_eq!(surface.live_count(), 0);
        ctl.on_tick(100_000, &cfg, &mut surface);
        assert_eq!(surface.live_count(), 1);
    }
}
