//! Data model for COMM log records and normalized spatial events
//!
//! Two layers live here:
//! - `RawLogMessage` - one opaque record from an exported COMM log. The
//!   export format is loosely structured, so field access goes through an
//!   explicit ordered list of extraction strategies rather than a fixed
//!   schema.
//! - `SpatialEvent` - the canonical unit of the replay core, produced by
//!   the extractor in [`crate::extract`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Epsilon (degrees) under which two coordinates count as the same portal.
/// Roughly 0.11 m of latitude.
pub const SAME_PORTAL_EPS_DEG: f64 = 1e-6;

/// One raw record from an exported COMM log.
///
/// The record is kept as opaque JSON; known fields are resolved on demand.
/// Different export shapes put the same information in different places, so
/// each accessor tries a fixed, ordered list of paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawLogMessage(Value);

/// Field paths tried in order when resolving a timestamp.
const TIME_PATHS: &[&[&str]] = &[&["time"], &["plext", "timestampMs"], &["ts"]];

/// Field paths tried in order when resolving a global identifier.
const GUID_PATHS: &[&[&str]] = &[&["guid"], &["plext", "guid"]];

/// Field paths tried in order when resolving the acting player's name.
const PLAYER_PATHS: &[&[&str]] = &[&["player"], &["plext", "plextOwner"]];

impl RawLogMessage {
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    fn lookup(&self, path: &[&str]) -> Option<&Value> {
        let mut v = &self.0;
        for key in path {
            v = v.get(key)?;
        }
        Some(v)
    }

    /// Resolve the record's timestamp in epoch milliseconds, if any.
    pub fn time_ms(&self) -> Option<i64> {
        TIME_PATHS.iter().find_map(|path| {
            let v = self.lookup(path)?;
            v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))
        })
    }

    /// Resolve the record's global identifier, if any.
    pub fn guid(&self) -> Option<&str> {
        GUID_PATHS
            .iter()
            .find_map(|path| self.lookup(path)?.as_str())
    }

    /// Resolve the acting player's name: direct fields first, then the
    /// first PLAYER markup token's display text.
    pub fn player(&self) -> Option<&str> {
        let direct = PLAYER_PATHS
            .iter()
            .find_map(|path| self.lookup(path)?.as_str());
        direct.or_else(|| {
            self.markup()
                .find(|t| t.kind == "PLAYER")
                .and_then(|t| t.plain())
        })
    }

    /// Iterate the record's markup tokens. Records without a markup array
    /// yield nothing.
    pub fn markup(&self) -> impl Iterator<Item = MarkupToken<'_>> {
        self.0
            .get("markup")
            .and_then(Value::as_array)
            .map(|a| a.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(MarkupToken::from_entry)
    }

    /// Serialized form used for content hashing.
    pub fn serialized(&self) -> String {
        self.0.to_string()
    }
}

/// One `[KIND, {attrs}]` entry from a record's markup array.
#[derive(Debug, Clone, Copy)]
pub struct MarkupToken<'a> {
    pub kind: &'a str,
    pub attrs: &'a Value,
}

impl<'a> MarkupToken<'a> {
    fn from_entry(entry: &'a Value) -> Option<Self> {
        let arr = entry.as_array()?;
        Some(Self {
            kind: arr.first()?.as_str()?,
            attrs: arr.get(1)?,
        })
    }

    /// The token's plain display text, if present.
    pub fn plain(&self) -> Option<&'a str> {
        self.attrs.get("plain")?.as_str()
    }

    /// The token's faction tag (`team` attribute), if present.
    pub fn team(&self) -> Option<&'a str> {
        self.attrs.get("team")?.as_str()
    }

    /// Portal coordinates from integer micro-degrees, if this is a PORTAL
    /// token with both present.
    pub fn portal_ref(&self) -> Option<PortalRef> {
        if self.kind != "PORTAL" {
            return None;
        }
        let lat_e6 = self.attrs.get("latE6")?.as_i64()?;
        let lng_e6 = self.attrs.get("lngE6")?.as_i64()?;
        Some(PortalRef {
            guid: self
                .attrs
                .get("guid")
                .and_then(Value::as_str)
                .map(str::to_owned),
            lat: lat_e6 as f64 / 1e6,
            lng: lng_e6 as f64 / 1e6,
            name: self
                .attrs
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_owned),
        })
    }
}

/// Game faction. `Machina` is the synthetic fourth faction assigned to
/// non-player actors that the log reports as neutral with a stylised
/// glyph name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Faction {
    Enlightened,
    Resistance,
    Neutral,
    Machina,
}

impl Faction {
    /// Parse a faction tag as it appears in markup token attributes.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "ENLIGHTENED" => Some(Self::Enlightened),
            "RESISTANCE" => Some(Self::Resistance),
            "NEUTRAL" => Some(Self::Neutral),
            "MACHINA" => Some(Self::Machina),
            _ => None,
        }
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Enlightened => "ENLIGHTENED",
            Self::Resistance => "RESISTANCE",
            Self::Neutral => "NEUTRAL",
            Self::Machina => "MACHINA",
        };
        f.write_str(s)
    }
}

/// Classified event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Capture,
    Deploy,
    Link,
    LinkDestroyed,
    DestroyReso,
}

impl EventKind {
    /// Link-family events carry two portal endpoints instead of one.
    pub fn is_link_family(&self) -> bool {
        matches!(self, Self::Link | Self::LinkDestroyed)
    }

    /// Whether this kind pins the acting player to a single portal and can
    /// therefore serve as a trajectory anchor. `LinkDestroyed` has no
    /// stable single anchor (either endpoint could be the attack site).
    pub fn has_anchor(&self) -> bool {
        !matches!(self, Self::LinkDestroyed)
    }
}

/// Reference to a portal: optional stable id plus coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalRef {
    pub guid: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub name: Option<String>,
}

impl PortalRef {
    /// Two portals are "the same" when their guids match, or - lacking
    /// guids on both sides - when their coordinates agree within
    /// [`SAME_PORTAL_EPS_DEG`] on both axes.
    pub fn same_portal(&self, other: &PortalRef) -> bool {
        match (&self.guid, &other.guid) {
            (Some(a), Some(b)) => a == b,
            _ => {
                (self.lat - other.lat).abs() < SAME_PORTAL_EPS_DEG
                    && (self.lng - other.lng).abs() < SAME_PORTAL_EPS_DEG
            }
        }
    }
}

/// Player name used when a record carries no resolvable player.
pub const UNKNOWN_PLAYER: &str = "UNKNOWN";

/// A normalized, spatially anchored player action.
///
/// Invariants (enforced by the extractor):
/// - `portals` is never empty;
/// - link-family events carry exactly 2 portals, all others exactly 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialEvent {
    /// Epoch milliseconds.
    pub ts: i64,
    pub kind: EventKind,
    pub player: String,
    /// The acting player's faction, when resolvable.
    pub team: Option<Faction>,
    /// The faction owning a link; meaningful only for link-family events.
    pub faction: Option<Faction>,
    pub portals: Vec<PortalRef>,
}

impl SpatialEvent {
    /// The event's spatial anchor: the first portal. For links this is the
    /// origin portal, which is where the acting player stood.
    pub fn anchor(&self) -> &PortalRef {
        &self.portals[0]
    }
}
