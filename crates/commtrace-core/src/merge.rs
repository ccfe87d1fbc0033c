//! Merge / dedup / index - combine exported log files into one timeline
//!
//! Each source file is parsed and validated independently: a file that is
//! not valid JSON, or lacks the expected top-level `messages` array, is
//! skipped with a per-file reason without aborting the batch. Zero valid
//! sources is not an error - it just yields an empty timeline.
//!
//! Dedup keys prefer the record's global identifier plus timestamp, fall
//! back to timestamp plus content hash, and finally to the content hash
//! alone. First occurrence wins.

use crate::extract::{extract_event, ExtractorConfig};
use crate::hash::content_hash;
use crate::model::{EventKind, Faction, RawLogMessage, SpatialEvent};
use crate::timeline::Timeline;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// One named source document (typically the text of one exported file).
#[derive(Debug, Clone)]
pub struct LogSource {
    pub name: String,
    pub text: String,
}

impl LogSource {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Read a source from disk. I/O failures are real errors (unlike
    /// per-file parse failures, which are summarized during merging).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, text })
    }
}

/// Per-file outcome of a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileSummary {
    Loaded { name: String, count: usize },
    Failed { name: String, reason: String },
}

impl FileSummary {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }
}

/// Summary statistics over the merged dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub file_count: usize,
    pub raw_count: usize,
    pub unique_count: usize,
    pub time_start: Option<i64>,
    pub time_end: Option<i64>,
    /// Players with at least one spatial event.
    pub players_total: usize,
}

fn format_ts(ms: Option<i64>) -> String {
    ms.and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

impl fmt::Display for MergeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Files:              {}", self.file_count)?;
        writeln!(f, "Messages (raw):     {}", self.raw_count)?;
        writeln!(f, "Messages (unique):  {}", self.unique_count)?;
        writeln!(
            f,
            "Time range:         {} ~ {}",
            format_ts(self.time_start),
            format_ts(self.time_end)
        )?;
        write!(f, "Players (spatial):  {}", self.players_total)
    }
}

/// Per-player activity summary, aggregated from extracted events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerActivity {
    pub count: usize,
    pub captures: usize,
    pub deploys: usize,
    pub links: usize,
    pub links_destroyed: usize,
    pub resos_destroyed: usize,
    pub first_ts: i64,
    pub last_ts: i64,
    pub team: Option<Faction>,
}

impl PlayerActivity {
    fn record(&mut self, ev: &SpatialEvent) {
        self.count += 1;
        match ev.kind {
            EventKind::Capture => self.captures += 1,
            EventKind::Deploy => self.deploys += 1,
            EventKind::Link => self.links += 1,
            EventKind::LinkDestroyed => self.links_destroyed += 1,
            EventKind::DestroyReso => self.resos_destroyed += 1,
        }
        self.first_ts = self.first_ts.min(ev.ts);
        self.last_ts = self.last_ts.max(ev.ts);
        if self.team.is_none() {
            self.team = ev.team;
        }
    }
}

/// Players keyed by name, in first-seen order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerIndex {
    players: IndexMap<String, PlayerActivity>,
}

impl PlayerIndex {
    fn build(events: &[SpatialEvent]) -> Self {
        let mut players: IndexMap<String, PlayerActivity> = IndexMap::new();
        for ev in events {
            let entry = players.entry(ev.player.clone()).or_insert(PlayerActivity {
                first_ts: ev.ts,
                last_ts: ev.ts,
                ..Default::default()
            });
            entry.record(ev);
        }
        Self { players }
    }

    pub fn get(&self, name: &str) -> Option<&PlayerActivity> {
        self.players.get(name)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PlayerActivity)> {
        self.players.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Player names ordered by descending event count (selection UIs show
    /// the busiest players first).
    pub fn players_by_activity(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.players.iter().collect();
        names.sort_by(|a, b| b.1.count.cmp(&a.1.count));
        names.into_iter().map(|(k, _)| k.as_str()).collect()
    }
}

/// Result of merging a batch of sources.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub timeline: Timeline,
    pub stats: MergeStats,
    pub summaries: Vec<FileSummary>,
    pub players: PlayerIndex,
}

/// Dedup key, most specific available form first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DedupKey {
    GuidTs(String, i64),
    TsHash(i64, u32),
    Hash(u32),
}

impl DedupKey {
    fn for_message(msg: &RawLogMessage) -> Self {
        match (msg.guid(), msg.time_ms()) {
            (Some(g), Some(t)) => Self::GuidTs(g.to_string(), t),
            (None, Some(t)) => Self::TsHash(t, content_hash(msg)),
            _ => Self::Hash(content_hash(msg)),
        }
    }
}

fn parse_source(source: &LogSource) -> std::result::Result<Vec<RawLogMessage>, String> {
    let doc: Value =
        serde_json::from_str(&source.text).map_err(|_| "invalid JSON".to_string())?;
    let messages = doc
        .get("messages")
        .and_then(Value::as_array)
        .ok_or_else(|| "missing \"messages\" array".to_string())?;
    Ok(messages
        .iter()
        .cloned()
        .map(RawLogMessage::from_value)
        .collect())
}

/// Merge all sources into one deduplicated, sorted timeline.
pub fn merge_sources(sources: &[LogSource], config: &ExtractorConfig) -> MergeOutcome {
    let mut summaries = Vec::with_capacity(sources.len());
    let mut all_messages: Vec<RawLogMessage> = Vec::new();
    let mut raw_count = 0usize;

    for source in sources {
        match parse_source(source) {
            Ok(messages) => {
                raw_count += messages.len();
                summaries.push(FileSummary::Loaded {
                    name: source.name.clone(),
                    count: messages.len(),
                });
                all_messages.extend(messages);
            }
            Err(reason) => {
                log::warn!("skipping source {}: {}", source.name, reason);
                summaries.push(FileSummary::Failed {
                    name: source.name.clone(),
                    reason,
                });
            }
        }
    }

    // Dedup: first occurrence wins.
    let mut seen = std::collections::HashSet::with_capacity(all_messages.len());
    let mut deduped: Vec<RawLogMessage> = Vec::with_capacity(all_messages.len());
    for msg in all_messages {
        if seen.insert(DedupKey::for_message(&msg)) {
            deduped.push(msg);
        }
    }

    // Stable sort keeps encounter order for equal timestamps; records
    // without a resolvable time sort to the front as 0.
    deduped.sort_by_key(|m| m.time_ms().unwrap_or(0));

    let time_start = deduped.first().and_then(RawLogMessage::time_ms);
    let time_end = deduped.last().and_then(RawLogMessage::time_ms);
    let unique_count = deduped.len();

    let events: Vec<SpatialEvent> = deduped
        .iter()
        .filter_map(|m| extract_event(m, config))
        .collect();
    let timeline = Timeline::new(events);
    let players = PlayerIndex::build(timeline.events());

    let stats = MergeStats {
        file_count: sources.len(),
        raw_count,
        unique_count,
        time_start,
        time_end,
        players_total: players.len(),
    };
    log::debug!(
        "merged {} sources: {} raw, {} unique, {} events",
        sources.len(),
        raw_count,
        unique_count,
        timeline.len()
    );

    MergeOutcome {
        timeline,
        stats,
        summaries,
        players,
    }
}
