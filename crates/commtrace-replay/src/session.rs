//! Replay session - the top-level object a frontend drives
//!
//! Owns the merged timeline, the virtual clock, the lifecycle controller,
//! and the segment window, and keeps them consistent across the host's
//! entry points: file loads, selection changes, transport controls, and
//! the per-frame tick. The host supplies its [`DrawSurface`] to every
//! call that may change what is drawn.
//!
//! Typical frame loop:
//!
//! ```ignore
//! session.tick(&mut surface);       // advance virtual time, halos/links
//! session.idle_flush(&mut surface); // coalesced segment redraw
//! ```

use crate::clock::{ClockState, SubscriptionId, VirtualClock};
use crate::config::ReplayConfig;
use crate::error::Result;
use crate::lifecycle::{ControllerStats, LifecycleController};
use crate::surface::DrawSurface;
use crate::window::SegmentWindow;
use commtrace_core::extract::ExtractorConfig;
use commtrace_core::merge::{merge_sources, FileSummary, LogSource, MergeStats, PlayerIndex};
use commtrace_core::Timeline;
use commtrace_track::{SegmentBuilder, SmoothingConfig};

/// One loaded-and-replayable dataset with its clock and visuals.
#[derive(Default)]
pub struct ReplaySession {
    extractor: ExtractorConfig,
    smoothing: SmoothingConfig,
    config: ReplayConfig,
    clock: VirtualClock,
    controller: LifecycleController,
    window: SegmentWindow,
    timeline: Timeline,
    players: PlayerIndex,
    stats: MergeStats,
    summaries: Vec<FileSummary>,
    selection: Vec<String>,
}

impl ReplaySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extractor(mut self, extractor: ExtractorConfig) -> Self {
        self.extractor = extractor;
        self
    }

    /// Merge a batch of sources and make it the session's dataset. The
    /// clock range becomes the data's time span, the position rewinds to
    /// its start, and the selection defaults to every observed player.
    pub fn load_sources(
        &mut self,
        sources: &[LogSource],
        surface: &mut dyn DrawSurface,
    ) -> &MergeStats {
        let outcome = merge_sources(sources, &self.extractor);
        self.timeline = outcome.timeline;
        self.players = outcome.players;
        self.stats = outcome.stats;
        self.summaries = outcome.summaries;

        let (start, end) = self.timeline.time_bounds().unwrap_or((0, 0));
        // Bounds come out of the sorted timeline, so start <= end holds.
        let _ = self.clock.set_range(start, end);
        self.clock.pause();
        self.clock.seek(start);

        self.selection = self
            .players
            .players_by_activity()
            .iter()
            .map(|s| s.to_string())
            .collect();
        self.rebuild(surface);
        log::info!(
            "session loaded: {} events, {} players",
            self.timeline.len(),
            self.players.len()
        );
        &self.stats
    }

    /// Restrict replay to the given players. Unknown names are kept but
    /// match nothing.
    pub fn set_selection(&mut self, players: Vec<String>, surface: &mut dyn DrawSurface) {
        self.selection = players;
        self.rebuild(surface);
    }

    pub fn set_smoothing(&mut self, smoothing: SmoothingConfig, surface: &mut dyn DrawSurface) {
        self.smoothing = smoothing;
        self.rebuild(surface);
    }

    /// Advance one host frame. Returns the new virtual time when playing.
    pub fn tick(&mut self, surface: &mut dyn DrawSurface) -> Option<i64> {
        let (_, now) = self.clock.advance_frame()?;
        self.controller.on_tick(now, &self.config, surface);
        self.window.on_time_changed(now);
        Some(now)
    }

    /// Flush the coalesced segment redraw. Call when the frame has spare
    /// time, or at least once per few frames.
    pub fn idle_flush(&mut self, surface: &mut dyn DrawSurface) {
        self.window.flush(&self.config, surface);
    }

    /// Jump to a time (clamped to the data range), reconciling all
    /// visuals immediately. Returns the actual position.
    pub fn seek(&mut self, ts: i64, surface: &mut dyn DrawSurface) -> i64 {
        let now = self.clock.seek(ts);
        self.controller.on_seek(now, &self.config, surface);
        self.window.on_time_changed(now);
        self.window.flush(&self.config, surface);
        now
    }

    /// Re-evaluate every visual at the current position, e.g. after the
    /// host's zoom changed the screen scale and sub-pixel decisions must
    /// be re-made.
    pub fn refresh(&mut self, surface: &mut dyn DrawSurface) {
        let now = self.clock.now();
        self.controller.reset(surface);
        self.controller.on_seek(now, &self.config, surface);
        self.window.on_time_changed(now);
        self.window.flush(&self.config, surface);
    }

    pub fn play(&mut self) {
        self.clock.start();
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn set_speed(&mut self, speed: i64) {
        self.clock.set_speed(speed);
    }

    pub fn set_track_color(&mut self, value: &str) -> Result<()> {
        self.config.set_track_color(value)?;
        self.window.on_time_changed(self.clock.now());
        Ok(())
    }

    pub fn set_player_color(&mut self, player: &str, value: &str) -> Result<()> {
        self.config.set_player_color(player, value)?;
        self.window.on_time_changed(self.clock.now());
        Ok(())
    }

    /// Register an external clock listener, e.g. a time scrubber UI.
    pub fn subscribe_time(&mut self, cb: Box<dyn FnMut(i64, i64)>) -> SubscriptionId {
        self.clock.subscribe(cb)
    }

    pub fn unsubscribe_time(&mut self, id: SubscriptionId) -> bool {
        self.clock.unsubscribe(id)
    }

    pub fn clock(&self) -> ClockState {
        self.clock.state()
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn players(&self) -> &PlayerIndex {
        &self.players
    }

    pub fn merge_stats(&self) -> &MergeStats {
        &self.stats
    }

    pub fn file_summaries(&self) -> &[FileSummary] {
        &self.summaries
    }

    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    pub fn controller_stats(&self) -> ControllerStats {
        self.controller.stats()
    }

    /// Rebuild derived state after the dataset, selection, or smoothing
    /// changed, then reconcile at the current position.
    fn rebuild(&mut self, surface: &mut dyn DrawSurface) {
        let events = self
            .timeline
            .iter()
            .filter(|e| self.selection.iter().any(|p| *p == e.player))
            .cloned()
            .collect();
        self.controller
            .set_events(events, self.clock.range(), surface);

        let segments = SegmentBuilder::new(&self.timeline)
            .with_smoothing(self.smoothing.clone())
            .for_players(&self.selection);
        self.window.clear(surface);
        self.window.set_segments(segments);

        let now = self.clock.now();
        self.controller.on_seek(now, &self.config, surface);
        self.window.on_time_changed(now);
        self.window.flush(&self.config, surface);
    }
}
