//! Virtual replay clock
//!
//! The clock maps host frames onto virtual log time: every call to
//! [`VirtualClock::advance_frame`] while playing moves virtual time
//! forward by `speed * frame_interval_ms`. The host owns the cadence -
//! the clock never schedules itself, so replay stays deterministic and
//! testable without timers.
//!
//! Subscribers are notified on every time change. A panicking subscriber
//! is caught and logged; it never poisons the clock or the remaining
//! subscribers.

use crate::error::{Error, Result};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Virtual milliseconds advanced per frame at speed 1.
pub const FRAME_INTERVAL_MS: i64 = 50;

/// Speed multipliers offered by the transport UI, slowest first.
pub const SPEED_PRESETS: [i64; 7] = [1, 10, 25, 50, 100, 200, 400];

/// Index into [`SPEED_PRESETS`] used until the host picks another speed.
pub const DEFAULT_SPEED_INDEX: usize = 3;

/// Opaque handle returned by [`VirtualClock::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Point-in-time snapshot of the clock, safe to hand to UI code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockState {
    pub now: i64,
    pub range_start: i64,
    pub range_end: i64,
    pub speed: i64,
    pub playing: bool,
}

type TimeCallback = Box<dyn FnMut(i64, i64)>;

/// Scrubbable virtual clock over a fixed time range.
pub struct VirtualClock {
    range_start: i64,
    range_end: i64,
    now: i64,
    speed: i64,
    playing: bool,
    subscribers: Vec<(u64, TimeCallback)>,
    next_sub_id: u64,
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualClock {
    pub fn new() -> Self {
        Self {
            range_start: 0,
            range_end: 0,
            now: 0,
            speed: SPEED_PRESETS[DEFAULT_SPEED_INDEX],
            playing: false,
            subscribers: Vec::new(),
            next_sub_id: 0,
        }
    }

    pub fn state(&self) -> ClockState {
        ClockState {
            now: self.now,
            range_start: self.range_start,
            range_end: self.range_end,
            speed: self.speed,
            playing: self.playing,
        }
    }

    pub fn now(&self) -> i64 {
        self.now
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn speed(&self) -> i64 {
        self.speed
    }

    pub fn range(&self) -> (i64, i64) {
        (self.range_start, self.range_end)
    }

    /// Set the replayable time range. A position below the new start is
    /// raised to it; a position past the new end is left alone and gets
    /// pulled back by the next tick or seek. Subscribers are not notified.
    pub fn set_range(&mut self, start: i64, end: i64) -> Result<()> {
        if end < start {
            return Err(Error::InvalidRange { start, end });
        }
        self.range_start = start;
        self.range_end = end;
        if self.now < start {
            self.now = start;
        }
        Ok(())
    }

    /// Set the speed multiplier. Values under 1 are clamped to 1.
    pub fn set_speed(&mut self, speed: i64) {
        if speed < 1 {
            log::warn!("speed multiplier {speed} below 1, clamping");
        }
        self.speed = speed.max(1);
    }

    /// Begin advancing. Starting from an exhausted range rewinds to the
    /// range start, which counts as a time change and notifies
    /// subscribers like a seek would.
    pub fn start(&mut self) {
        if self.now >= self.range_end && self.range_start < self.range_end {
            self.now = self.range_start;
            let now = self.now;
            self.notify(now, now);
        }
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Jump to `ts`, clamped into the range. Seeking always pauses and
    /// notifies subscribers exactly once, even if the position did not
    /// change.
    pub fn seek(&mut self, ts: i64) -> i64 {
        self.playing = false;
        self.now = ts.clamp(self.range_start, self.range_end);
        let now = self.now;
        self.notify(now, now);
        now
    }

    /// Advance one host frame. Returns `(previous, now)` when time moved,
    /// `None` when paused. Reaching the end of the range pauses playback
    /// with `now` pinned to the range end.
    pub fn advance_frame(&mut self) -> Option<(i64, i64)> {
        if !self.playing {
            return None;
        }
        let prev = self.now;
        let step = self.speed.saturating_mul(FRAME_INTERVAL_MS);
        self.now = prev.saturating_add(step).min(self.range_end);
        if self.now >= self.range_end {
            self.playing = false;
        }
        let now = self.now;
        self.notify(prev, now);
        Some((prev, now))
    }

    /// Register a time-change callback, invoked as `cb(previous, now)`.
    pub fn subscribe(&mut self, cb: TimeCallback) -> SubscriptionId {
        let id = self.next_sub_id;
        self.next_sub_id += 1;
        self.subscribers.push((id, cb));
        SubscriptionId(id)
    }

    /// Remove a callback. Returns false when the id is unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub_id, _)| *sub_id != id.0);
        self.subscribers.len() != before
    }

    fn notify(&mut self, prev: i64, now: i64) {
        for (id, cb) in &mut self.subscribers {
            if catch_unwind(AssertUnwindSafe(|| cb(prev, now))).is_err() {
                log::warn!("clock subscriber {id} panicked at t={now}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ticking_clock(start: i64, end: i64) -> VirtualClock {
        let mut clock = VirtualClock::new();
        clock.set_range(start, end).unwrap();
        clock
    }

    #[test]
    fn test_advance_is_speed_times_interval() {
        let mut clock = ticking_clock(0, 1_000_000);
        clock.set_speed(50);
        clock.start();
        assert_eq!(clock.advance_frame(), Some((0, 2_500)));
        assert_eq!(clock.advance_frame(), Some((2_500, 5_000)));
    }

    #[test]
    fn test_paused_clock_does_not_advance() {
        let mut clock = ticking_clock(0, 1_000_000);
        assert_eq!(clock.advance_frame(), None);
        clock.start();
        clock.advance_frame().unwrap();
        clock.pause();
        assert_eq!(clock.advance_frame(), None);
    }

    #[test]
    fn test_end_of_range_clamps_and_pauses() {
        let mut clock = ticking_clock(0, 100);
        clock.set_speed(400);
        clock.start();
        assert_eq!(clock.advance_frame(), Some((0, 100)));
        assert!(!clock.is_playing());
        assert_eq!(clock.advance_frame(), None);
        // Starting again rewinds from the exhausted range.
        clock.start();
        assert_eq!(clock.now(), 0);
    }

    #[test]
    fn test_seek_clamps_into_range() {
        let mut clock = ticking_clock(1_000, 5_000);
        assert_eq!(clock.seek(10_000), 5_000);
        assert_eq!(clock.seek(0), 1_000);
        assert_eq!(clock.seek(3_000), 3_000);
        assert!(!clock.is_playing());
    }

    #[test]
    fn test_seek_notifies_exactly_once() {
        let mut clock = ticking_clock(0, 10_000);
        let seen: Rc<RefCell<Vec<(i64, i64)>>> = Rc::default();
        let sink = Rc::clone(&seen);
        clock.subscribe(Box::new(move |prev, now| sink.borrow_mut().push((prev, now))));
        clock.seek(4_000);
        assert_eq!(*seen.borrow(), vec![(4_000, 4_000)]);
    }

    #[test]
    fn test_restart_rewind_notifies_subscribers() {
        let mut clock = ticking_clock(1_000, 5_000);
        clock.seek(5_000);
        let seen: Rc<RefCell<Vec<(i64, i64)>>> = Rc::default();
        let sink = Rc::clone(&seen);
        clock.subscribe(Box::new(move |prev, now| sink.borrow_mut().push((prev, now))));

        clock.start();
        assert_eq!(clock.now(), 1_000);
        assert_eq!(*seen.borrow(), vec![(1_000, 1_000)]);

        // Starting mid-range moves nothing and stays silent.
        clock.pause();
        seen.borrow_mut().clear();
        clock.start();
        assert_eq!(clock.now(), 1_000);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_speed_clamped_to_minimum() {
        let mut clock = ticking_clock(0, 1_000);
        clock.set_speed(0);
        assert_eq!(clock.speed(), 1);
        clock.set_speed(-5);
        assert_eq!(clock.speed(), 1);
    }

    #[test]
    fn test_extreme_speed_saturates_at_range_end() {
        let mut clock = ticking_clock(0, 1_000_000);
        clock.set_speed(i64::MAX);
        clock.start();
        assert_eq!(clock.advance_frame(), Some((0, 1_000_000)));
        assert!(!clock.is_playing());
    }

    #[test]
    fn test_invalid_range_rejected() {
        let mut clock = VirtualClock::new();
        assert!(clock.set_range(100, 0).is_err());
    }

    #[test]
    fn test_set_range_raises_position_below_start() {
        let mut clock = ticking_clock(0, 10_000);
        clock.seek(2_000);
        clock.set_range(4_000, 8_000).unwrap();
        assert_eq!(clock.now(), 4_000);

        // A position past the new end is left for the next seek to fix.
        clock.set_range(0, 3_000).unwrap();
        assert_eq!(clock.now(), 4_000);
        assert_eq!(clock.seek(4_000), 3_000);
    }

    #[test]
    fn test_panicking_subscriber_does_not_poison_others() {
        let mut clock = ticking_clock(0, 10_000);
        clock.subscribe(Box::new(|_, _| panic!("bad subscriber")));
        let seen: Rc<RefCell<Vec<i64>>> = Rc::default();
        let sink = Rc::clone(&seen);
        clock.subscribe(Box::new(move |_, now| sink.borrow_mut().push(now)));
        clock.start();
        clock.advance_frame().unwrap();
        assert_eq!(seen.borrow().len(), 1);
        // The clock itself keeps working.
        assert!(clock.advance_frame().is_some());
    }

    #[test]
    fn test_unsubscribe() {
        let mut clock = ticking_clock(0, 10_000);
        let seen: Rc<RefCell<Vec<i64>>> = Rc::default();
        let sink = Rc::clone(&seen);
        let id = clock.subscribe(Box::new(move |_, now| sink.borrow_mut().push(now)));
        assert!(clock.unsubscribe(id));
        assert!(!clock.unsubscribe(id));
        clock.seek(1_000);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_replay_is_deterministic() {
        let run = || {
            let mut clock = ticking_clock(0, 100_000);
            clock.set_speed(25);
            clock.start();
            let mut trace = Vec::new();
            while let Some((_, now)) = clock.advance_frame() {
                trace.push(now);
            }
            trace
        };
        assert_eq!(run(), run());
    }
}
