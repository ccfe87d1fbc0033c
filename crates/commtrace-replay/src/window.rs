//! Trailing segment window renderer
//!
//! During playback only the recent slice of a player's trajectory is
//! drawn: segments whose arrival time falls in `[now - past, now +
//! future]`. Time updates arrive faster than redraws are worth doing, so
//! the window only records that it became dirty; the host calls
//! [`SegmentWindow::flush`] once per frame (or when idle) and gets a
//! single coalesced redraw.

use crate::config::ReplayConfig;
use crate::surface::{DrawSurface, Handle, Style};
use commtrace_track::Segment;

/// Redraws the in-window slice of the selected players' segments.
#[derive(Debug, Default)]
pub struct SegmentWindow {
    segments: Vec<Segment>,
    handles: Vec<Handle>,
    pending_now: Option<i64>,
    dirty: bool,
    redraws: usize,
}

impl SegmentWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the working segment set (already built for the current
    /// selection and smoothing settings).
    pub fn set_segments(&mut self, mut segments: Vec<Segment>) {
        segments.sort_by_key(|s| s.from_ts);
        self.segments = segments;
        self.dirty = true;
    }

    /// Note a clock change. Cheap; consecutive calls coalesce into one
    /// redraw at the latest time.
    pub fn on_time_changed(&mut self, now: i64) {
        self.pending_now = Some(now);
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Total redraw passes performed, for diagnostics.
    pub fn redraws(&self) -> usize {
        self.redraws
    }

    /// Redraw if anything changed since the last flush.
    pub fn flush(&mut self, config: &ReplayConfig, surface: &mut dyn DrawSurface) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        for h in self.handles.drain(..) {
            surface.remove(h);
        }
        let Some(now) = self.pending_now else {
            return;
        };

        let t0 = now - config.seg_window_past_ms;
        let t1 = now + config.seg_window_future_ms;
        for seg in &self.segments {
            if seg.to_ts < t0 || seg.to_ts > t1 {
                continue;
            }
            let doubtful = config
                .max_speed_kmh
                .is_some_and(|max| seg.is_anomalous(max));
            let opacity = if doubtful {
                config.doubtful_opacity
            } else {
                config.stroke_opacity
            };
            let style = Style::solid(
                config.resolve_color(&seg.player, seg.team),
                config.stroke_weight,
                opacity,
            )
            .with_dash(config.stroke_dash.clone());
            self.handles
                .push(surface.draw_segment(seg.from_point, seg.to_point, &style));
        }
        self.redraws += 1;
    }

    /// Remove all drawn segments and forget the pending time.
    pub fn clear(&mut self, surface: &mut dyn DrawSurface) {
        for h in self.handles.drain(..) {
            surface.remove(h);
        }
        self.pending_now = None;
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RecordingSurface;
    use commtrace_core::model::EventKind;
    use commtrace_track::GeoPoint;

    fn seg(from_ts: i64, to_ts: i64) -> Segment {
        Segment {
            player: "A".into(),
            team: None,
            from_ts,
            to_ts,
            from_kind: EventKind::Capture,
            to_kind: EventKind::Capture,
            from_point: GeoPoint::new(35.0, 139.0),
            to_point: GeoPoint::new(35.01, 139.0),
            distance_km: 1.1,
            dt_ms: to_ts - from_ts,
            min_speed_kmh: 0.0,
        }
    }

    #[test]
    fn test_only_trailing_window_is_drawn() {
        let cfg = ReplayConfig::default();
        let mut surface = RecordingSurface::new();
        let mut window = SegmentWindow::new();
        window.set_segments(vec![
            seg(0, 100_000),
            seg(100_000, 500_000),
            seg(500_000, 2_000_000),
        ]);

        // Past window is 10 minutes: at t=650k only to_ts in
        // [50k, 650k] qualifies.
        window.on_time_changed(650_000);
        window.flush(&cfg, &mut surface);
        assert_eq!(surface.live_count(), 2);
    }

    #[test]
    fn test_updates_coalesce_into_one_redraw() {
        let cfg = ReplayConfig::default();
        let mut surface = RecordingSurface::new();
        let mut window = SegmentWindow::new();
        window.set_segments(vec![seg(0, 100_000)]);

        for t in (0..200_000).step_by(2_500) {
            window.on_time_changed(t);
        }
        window.flush(&cfg, &mut surface);
        assert_eq!(window.redraws(), 1);
        // Latest time wins: 197_500 is within 100_000 + 10 min.
        assert_eq!(surface.live_count(), 1);

        // Clean flush does nothing.
        window.flush(&cfg, &mut surface);
        assert_eq!(window.redraws(), 1);
    }

    #[test]
    fn test_flush_before_any_time_draws_nothing() {
        let cfg = ReplayConfig::default();
        let mut surface = RecordingSurface::new();
        let mut window = SegmentWindow::new();
        window.set_segments(vec![seg(0, 100_000)]);
        window.flush(&cfg, &mut surface);
        assert_eq!(surface.live_count(), 0);
    }

    #[test]
    fn test_segment_color_resolves_per_player() {
        let mut cfg = ReplayConfig::default();
        cfg.set_player_color("A", "#112233").unwrap();
        let mut surface = RecordingSurface::new();
        let mut window = SegmentWindow::new();

        let mut other = seg(0, 100_000);
        other.player = "B".into();
        other.team = Some(commtrace_core::Faction::Resistance);
        window.set_segments(vec![seg(0, 100_000), other]);
        window.on_time_changed(100_000);
        window.flush(&cfg, &mut surface);

        let colors: Vec<&str> = surface
            .segments()
            .iter()
            .map(|s| s.style().color.as_str())
            .collect();
        // Pinned player color for A, faction color for B.
        assert!(colors.contains(&"#112233"));
        assert!(colors.contains(&"#007bff"));
    }

    #[test]
    fn test_over_speed_segment_is_dimmed() {
        let mut cfg = ReplayConfig::default();
        cfg.max_speed_kmh = Some(300.0);
        let mut surface = RecordingSurface::new();
        let mut window = SegmentWindow::new();

        let mut fast = seg(100_000, 200_000);
        fast.min_speed_kmh = 900.0;
        window.set_segments(vec![seg(0, 100_000), fast]);
        window.on_time_changed(200_000);
        window.flush(&cfg, &mut surface);

        let opacities: Vec<f64> = surface
            .segments()
            .iter()
            .map(|s| s.style().opacity)
            .collect();
        assert!(opacities.contains(&cfg.doubtful_opacity));
        assert!(opacities.contains(&cfg.stroke_opacity));
    }

    #[test]
    fn test_clear_removes_drawn_segments() {
        let cfg = ReplayConfig::default();
        let mut surface = RecordingSurface::new();
        let mut window = SegmentWindow::new();
        window.set_segments(vec![seg(0, 100_000)]);
        window.on_time_changed(100_000);
        window.flush(&cfg, &mut surface);
        assert_eq!(surface.live_count(), 1);
        window.clear(&mut surface);
        assert_eq!(surface.live_count(), 0);
        assert!(!window.is_dirty());
    }
}
