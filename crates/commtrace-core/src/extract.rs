//! Event extraction - one raw COMM record in, zero-or-one typed event out
//!
//! Classification is keyword-driven and inherently heuristic: the log text
//! is produced for humans, not machines. The keyword sets therefore live in
//! [`ExtractorConfig`] as plain data (per-locale phrasing can be swapped
//! without touching code), and anything malformed or ambiguous yields
//! `None` rather than an error.

use crate::model::{
    EventKind, Faction, PortalRef, RawLogMessage, SpatialEvent, UNKNOWN_PLAYER,
};
use serde::{Deserialize, Serialize};

/// Display name the game uses for the non-player Machina actor: an
/// underscore-wrapped "MACHINA" buried in combining diacritics. Exact
/// glyph sequences vary between client versions, so matching also goes
/// through a diacritic-insensitive fallback (see [`looks_like_machina`]).
pub const DEFAULT_MACHINA_GLYPH: &str =
    "_\u{0336}\u{0331}M\u{0337}A\u{0304}C\u{0334}H\u{0336}I\u{0335}N\u{0335}A\u{0344}_\u{0334}";

/// Keyword configuration for the classifier.
///
/// `*_keywords` lists match when any entry is contained in the lower-cased
/// concatenated TEXT of a record. `*_patterns` lists hold groups of words
/// that must all be present (covering phrasings like
/// "destroyed the <faction> Link ..." without a full regex engine).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    pub link_keywords: Vec<String>,
    pub link_destroyed_patterns: Vec<Vec<String>>,
    pub capture_keywords: Vec<String>,
    pub deploy_keywords: Vec<String>,
    pub destroy_reso_patterns: Vec<Vec<String>>,
    /// Exact stylised display name remapped to [`Faction::Machina`].
    pub machina_glyph: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        let words = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            link_keywords: words(&["linked"]),
            link_destroyed_patterns: vec![words(&["destroyed", "link"])],
            capture_keywords: words(&["captured"]),
            deploy_keywords: words(&["deployed a resonator on"]),
            destroy_reso_patterns: vec![words(&["destroyed", "resonator on"])],
            machina_glyph: DEFAULT_MACHINA_GLYPH.to_string(),
        }
    }
}

impl ExtractorConfig {
    fn any_keyword(&self, text: &str, keywords: &[String]) -> bool {
        keywords.iter().any(|k| text.contains(k.as_str()))
    }

    fn any_pattern(&self, text: &str, patterns: &[Vec<String>]) -> bool {
        patterns
            .iter()
            .any(|group| group.iter().all(|k| text.contains(k.as_str())))
    }
}

/// Extract a typed [`SpatialEvent`] from one raw record.
///
/// Pure function of its input and the configuration; malformed or
/// irrelevant records (chat, system narrowcasts, records without a
/// timestamp or spatial anchor) yield `None` and never panic.
pub fn extract_event(msg: &RawLogMessage, config: &ExtractorConfig) -> Option<SpatialEvent> {
    let ts = msg.time_ms()?;

    let mut portals: Vec<PortalRef> = msg.markup().filter_map(|t| t.portal_ref()).collect();
    if portals.is_empty() {
        return None; // no spatial anchor
    }

    let text: String = msg
        .markup()
        .filter(|t| t.kind == "TEXT")
        .filter_map(|t| t.plain())
        .collect::<String>()
        .to_lowercase();

    // Most specific first: portal count narrows the candidates, keywords
    // pick within them.
    let kind = if portals.len() >= 2 && config.any_keyword(&text, &config.link_keywords) {
        EventKind::Link
    } else if portals.len() >= 2 && config.any_pattern(&text, &config.link_destroyed_patterns) {
        EventKind::LinkDestroyed
    } else if config.any_keyword(&text, &config.capture_keywords) {
        EventKind::Capture
    } else if config.any_keyword(&text, &config.deploy_keywords) {
        EventKind::Deploy
    } else if config.any_pattern(&text, &config.destroy_reso_patterns) {
        EventKind::DestroyReso
    } else {
        return None;
    };

    // Truncate to the anchor count the kind defines; a link-family event
    // that cannot keep two endpoints is malformed.
    let wanted = if kind.is_link_family() { 2 } else { 1 };
    if portals.len() < wanted {
        return None;
    }
    portals.truncate(wanted);

    let team = extract_player_team(msg, config);
    let mut faction = if kind.is_link_family() {
        extract_link_faction(msg)
    } else {
        None
    };
    // Machina link creations often lack a FACTION token; infer ownership
    // from the acting actor.
    if kind == EventKind::Link && faction.is_none() && team == Some(Faction::Machina) {
        faction = Some(Faction::Machina);
    }

    Some(SpatialEvent {
        ts,
        kind,
        player: msg.player().unwrap_or(UNKNOWN_PLAYER).to_string(),
        team,
        faction,
        portals,
    })
}

/// Resolve the acting player's faction from markup.
///
/// A PLAYER token reported as `NEUTRAL` but carrying the Machina glyph
/// name is remapped to [`Faction::Machina`]; otherwise the PLAYER token's
/// faction wins, with a FACTION token as a last resort for system lines
/// that tag Machina activity without a player entry.
fn extract_player_team(msg: &RawLogMessage, config: &ExtractorConfig) -> Option<Faction> {
    for token in msg.markup() {
        if token.kind != "PLAYER" {
            continue;
        }
        let team = token.team().and_then(Faction::parse);
        if let Some(f) = team {
            let plain = token.plain().unwrap_or("");
            if f == Faction::Neutral && looks_like_machina(plain, &config.machina_glyph) {
                return Some(Faction::Machina);
            }
            return Some(f);
        }
    }
    msg.markup()
        .filter(|t| t.kind == "FACTION")
        .find_map(|t| t.team().and_then(Faction::parse))
        .filter(|f| *f == Faction::Machina)
}

/// Resolve the faction owning a link from a FACTION markup token.
fn extract_link_faction(msg: &RawLogMessage) -> Option<Faction> {
    msg.markup()
        .filter(|t| t.kind == "FACTION")
        .find_map(|t| t.team().and_then(Faction::parse))
}

/// Diacritic-insensitive check for the Machina display name: exact glyph
/// match, or "MACHINA" surviving once combining marks and punctuation are
/// stripped.
fn looks_like_machina(plain: &str, glyph: &str) -> bool {
    if plain == glyph {
        return true;
    }
    let stripped: String = plain
        .chars()
        .filter(|c| c.is_alphabetic() && c.is_ascii())
        .collect::<String>()
        .to_uppercase();
    stripped.contains("MACHINA")
}
