//! commtrace-track - trajectory construction over merged event timelines
//!
//! - [`geo`] - spherical-Earth distance, bearing, and projection helpers
//! - [`segment`] - per-player movement segments with endpoint smoothing
//!   and lower-bound speed metrics

pub mod geo;
pub mod segment;

pub use geo::GeoPoint;
pub use segment::{Segment, SegmentBuilder, SmoothingConfig};
