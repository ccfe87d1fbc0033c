//! commtrace-replay - scrubbable replay of merged COMM timelines
//!
//! Builds on [`commtrace_core`] (timeline) and [`commtrace_track`]
//! (segments) to drive a map frontend through time:
//!
//! - [`clock`] - host-driven virtual clock with subscriptions
//! - [`config`] - rendering and timing parameters with tuned defaults
//! - [`surface`] - the drawing seam, plus an in-memory test surface
//! - [`lifecycle`] - time-windowed halos, attack wedges, link intervals
//! - [`window`] - trailing-window segment renderer with coalesced redraws
//! - [`session`] - the top-level object a frontend drives
//!
//! The crate never schedules itself: the host calls
//! [`session::ReplaySession::tick`] once per frame and
//! [`session::ReplaySession::idle_flush`] when the frame has spare time,
//! which keeps replay deterministic and unit-testable.

pub mod clock;
pub mod config;
pub mod lifecycle;
pub mod session;
pub mod surface;
pub mod window;

mod error;

pub use clock::{ClockState, VirtualClock, SPEED_PRESETS};
pub use config::ReplayConfig;
pub use error::{Error, Result};
pub use lifecycle::LifecycleController;
pub use session::ReplaySession;
pub use surface::{DrawSurface, Handle, Style};
pub use window::SegmentWindow;
