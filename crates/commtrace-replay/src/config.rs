//! Replay rendering and timing configuration
//!
//! Every knob a frontend can turn lives here with its tuned default. The
//! defaults are calibrated to portal-game geometry: 40 m is the portal
//! interaction range, 10 minutes is a plausible on-foot gap between
//! actions, and fade timings are short enough not to lag a 400x replay.

use commtrace_core::Faction;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Validate a `#rgb` or `#rrggbb` hex color.
pub fn is_valid_color(value: &str) -> bool {
    let Some(hex) = value.strip_prefix('#') else {
        return false;
    };
    matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
}

/// All rendering and timing parameters of a replay session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Fallback track color when neither player nor faction resolves.
    pub stroke_color: String,
    pub stroke_weight: f64,
    pub stroke_opacity: f64,
    pub stroke_dash: String,
    pub color_by_faction: IndexMap<Faction, String>,
    pub color_by_player: IndexMap<String, String>,

    // Uncertainty halos around capture/deploy/link anchors.
    pub halo_radius_m: f64,
    pub halo_stroke: f64,
    pub halo_opacity: f64,
    pub halo_fill_opacity: f64,
    pub halo_dash: String,
    pub halo_window_past_ms: i64,
    pub halo_window_future_ms: i64,
    pub halo_fade_duration_ms: i64,
    pub halo_fade_steps: u32,
    /// Below this on-screen radius a halo degrades to a plain marker.
    pub halo_min_pixel_radius: f64,

    // Link lines.
    pub link_stroke: f64,
    pub link_opacity: f64,
    pub link_fade_duration_ms: i64,
    pub link_fade_steps: u32,

    // Attack direction inference for resonator destruction.
    pub attack_window_ms: i64,
    pub attack_spatial_threshold_m: f64,
    pub attack_wedge_radius_m: f64,
    pub attack_wedge_min_deg: f64,
    pub attack_wedge_max_deg: f64,
    pub attack_tick_len_m: f64,
    pub attack_ring_radius_m: f64,
    pub attack_ring_stroke: f64,
    pub attack_stroke_opacity: f64,
    pub attack_fill_opacity: f64,
    pub attack_fade_duration_ms: i64,
    pub attack_fade_steps: u32,

    // Trailing window for movement segments.
    pub seg_window_past_ms: i64,
    pub seg_window_future_ms: i64,
    /// Segments whose minimum speed exceeds this are physically doubtful
    /// and drawn dimmed. `None` disables the check.
    pub max_speed_kmh: Option<f64>,
    pub doubtful_opacity: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        let mut color_by_faction = IndexMap::new();
        color_by_faction.insert(Faction::Enlightened, "#00b000".to_string());
        color_by_faction.insert(Faction::Resistance, "#007bff".to_string());
        color_by_faction.insert(Faction::Machina, "#cc0000".to_string());
        color_by_faction.insert(Faction::Neutral, "#808080".to_string());
        Self {
            stroke_color: "#800080".to_string(),
            stroke_weight: 3.0,
            stroke_opacity: 0.9,
            stroke_dash: "6, 6".to_string(),
            color_by_faction,
            color_by_player: IndexMap::new(),

            halo_radius_m: 40.0,
            halo_stroke: 1.5,
            halo_opacity: 0.35,
            halo_fill_opacity: 0.12,
            halo_dash: "4, 4".to_string(),
            halo_window_past_ms: 60_000,
            halo_window_future_ms: 60_000,
            halo_fade_duration_ms: 1_200,
            halo_fade_steps: 6,
            halo_min_pixel_radius: 12.0,

            link_stroke: 3.0,
            link_opacity: 0.85,
            link_fade_duration_ms: 800,
            link_fade_steps: 5,

            attack_window_ms: 10 * 60 * 1000,
            attack_spatial_threshold_m: 250.0,
            attack_wedge_radius_m: 40.0,
            attack_wedge_min_deg: 40.0,
            attack_wedge_max_deg: 140.0,
            attack_tick_len_m: 8.0,
            attack_ring_radius_m: 10.0,
            attack_ring_stroke: 2.0,
            attack_stroke_opacity: 0.45,
            attack_fill_opacity: 0.22,
            attack_fade_duration_ms: 1_200,
            attack_fade_steps: 6,

            seg_window_past_ms: 10 * 60 * 1000,
            seg_window_future_ms: 0,
            max_speed_kmh: None,
            doubtful_opacity: 0.4,
        }
    }
}

impl ReplayConfig {
    /// Set the fallback track color. An invalid value is rejected and the
    /// previous color kept.
    pub fn set_track_color(&mut self, value: &str) -> Result<()> {
        if !is_valid_color(value) {
            log::warn!("rejecting track color {value:?}, keeping {:?}", self.stroke_color);
            return Err(Error::InvalidColor {
                value: value.to_string(),
            });
        }
        self.stroke_color = value.to_string();
        Ok(())
    }

    /// Pin one player to a fixed color, overriding their faction color.
    pub fn set_player_color(&mut self, player: &str, value: &str) -> Result<()> {
        if !is_valid_color(value) {
            log::warn!("rejecting color {value:?} for player {player}");
            return Err(Error::InvalidColor {
                value: value.to_string(),
            });
        }
        self.color_by_player
            .insert(player.to_string(), value.to_string());
        Ok(())
    }

    /// Color for a player's visuals: explicit player color, then faction
    /// color, then the fallback stroke color.
    pub fn resolve_color(&self, player: &str, faction: Option<Faction>) -> &str {
        if let Some(c) = self.color_by_player.get(player) {
            return c;
        }
        if let Some(c) = faction.and_then(|f| self.color_by_faction.get(&f)) {
            return c;
        }
        &self.stroke_color
    }

    /// Color for a link, by owning faction only.
    pub fn link_color(&self, faction: Option<Faction>) -> &str {
        faction
            .and_then(|f| self.color_by_faction.get(&f))
            .map(String::as_str)
            .unwrap_or(&self.stroke_color)
    }
}
