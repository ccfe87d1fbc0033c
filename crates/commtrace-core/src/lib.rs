//! commtrace-core - COMM log ingestion for trajectory replay
//!
//! This crate turns exported COMM chat logs into a clean, queryable event
//! timeline:
//!
//! - [`model`] - raw log records and the normalized [`model::SpatialEvent`]
//! - [`extract`] - keyword classification of raw records into events
//! - [`merge`] - multi-file merge, dedup, stats, and player indexing
//! - [`timeline`] - the sorted, binary-searchable event store
//! - [`hash`] - stable content hashing used by dedup
//!
//! # Example
//!
//! ```
//! use commtrace_core::extract::ExtractorConfig;
//! use commtrace_core::merge::{merge_sources, LogSource};
//!
//! let source = LogSource::new(
//!     "comm.json",
//!     r#"{"messages": [{
//!         "time": 1700000000000,
//!         "guid": "abc",
//!         "markup": [
//!             ["PLAYER", {"plain": "Alice", "team": "RESISTANCE"}],
//!             ["TEXT", {"plain": " captured "}],
//!             ["PORTAL", {"latE6": 35123456, "lngE6": 139765432, "name": "Shrine"}]
//!         ]
//!     }]}"#,
//! );
//! let out = merge_sources(&[source], &ExtractorConfig::default());
//! assert_eq!(out.timeline.len(), 1);
//! assert_eq!(out.players.players_by_activity(), vec!["Alice"]);
//! ```

pub mod extract;
pub mod hash;
pub mod merge;
pub mod model;
pub mod timeline;

mod error;

pub use error::{Error, Result};
pub use model::{EventKind, Faction, PortalRef, SpatialEvent};
pub use timeline::Timeline;
