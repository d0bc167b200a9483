// Song - Arrangement data model
// Pattern groups, song rows and performance tracks as plain serde data

use crate::sequencer::harmony::HarmonyContext;
use crate::sequencer::note::{NoteId, PerformanceNote};
use crate::sequencer::pattern::Pattern;
use crate::sequencer::timeline::TimeGrid;
use serde::{Deserialize, Serialize};

pub type GroupId = String;
pub type TrackId = String;
pub type RowId = String;
pub type PerformanceTrackId = String;

/// How an instrument turns trigger calls into sound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentClass {
    /// Shared trigger from the registry
    #[default]
    Sampled,
    /// Shared trigger, chord resolved per step
    Harmonic,
    /// Per-note voice that disposes itself after its release
    Transient,
}

/// Declared source of a track's instrument
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentSource {
    pub pack: String,
    pub instrument: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
    #[serde(default)]
    pub class: InstrumentClass,
}

impl InstrumentSource {
    pub fn new(pack: &str, instrument: &str) -> Self {
        Self {
            pack: pack.to_string(),
            instrument: instrument.to_string(),
            character: None,
            class: InstrumentClass::Sampled,
        }
    }

    pub fn with_character(mut self, character: &str) -> Self {
        self.character = Some(character.to_string());
        self
    }

    pub fn with_class(mut self, class: InstrumentClass) -> Self {
        self.class = class;
        self
    }
}

/// One track of a pattern group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupTrack {
    pub id: TrackId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Pattern>,
    #[serde(default)]
    pub muted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<InstrumentSource>,
}

impl GroupTrack {
    pub fn new(id: &str, source: InstrumentSource, pattern: Pattern) -> Self {
        Self {
            id: id.to_string(),
            pattern: Some(pattern),
            muted: false,
            source: Some(source),
        }
    }
}

/// A named, reusable loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternGroup {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub tracks: Vec<GroupTrack>,
}

impl PatternGroup {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            tracks: Vec::new(),
        }
    }

    pub fn with_track(mut self, track: GroupTrack) -> Self {
        self.tracks.push(track);
        self
    }

    pub fn track(&self, id: &str) -> Option<&GroupTrack> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn track_mut(&mut self, id: &str) -> Option<&mut GroupTrack> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }
}

/// One arrangement lane
///
/// A row either holds one pattern-group slot per column or points at a
/// performance track; when both are set the performance track wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongRow {
    pub id: RowId,
    #[serde(default)]
    pub slots: Vec<Option<GroupId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_track: Option<PerformanceTrackId>,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub solo: bool,
    /// Row velocity (0.0 - 1.0)
    #[serde(default = "default_row_velocity")]
    pub velocity: f32,
}

fn default_row_velocity() -> f32 {
    1.0
}

impl SongRow {
    pub fn with_slots(id: &str, slots: Vec<Option<GroupId>>) -> Self {
        Self {
            id: id.to_string(),
            slots,
            performance_track: None,
            muted: false,
            solo: false,
            velocity: default_row_velocity(),
        }
    }

    pub fn with_performance(id: &str, track: &str) -> Self {
        Self {
            performance_track: Some(track.to_string()),
            ..Self::with_slots(id, Vec::new())
        }
    }

    /// Group id assigned at a column
    pub fn slot(&self, column: usize) -> Option<&str> {
        self.slots.get(column).and_then(|slot| slot.as_deref())
    }
}

/// A live-captured performance spanning the whole song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceTrack {
    pub id: PerformanceTrackId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<InstrumentSource>,
    /// Track color (optional, for UI)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[u8; 3]>,
    /// Notes, kept sorted by start tick
    #[serde(default)]
    pub notes: Vec<PerformanceNote>,
}

impl PerformanceTrack {
    pub fn new(id: &str, name: &str, source: Option<InstrumentSource>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            source,
            color: None,
            notes: Vec::new(),
        }
    }

    /// Append a note and restore start-tick order (stable for ties)
    pub fn insert_note(&mut self, note: PerformanceNote, grid: &TimeGrid) {
        self.notes.push(note);
        self.notes.sort_by_cached_key(|n| n.start_ticks(grid));
    }

    pub fn contains_note(&self, id: NoteId) -> bool {
        self.notes.iter().any(|n| n.id == id)
    }

    pub fn clear_notes(&mut self) {
        self.notes.clear();
    }
}

/// The whole arrangement
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    /// Number of song columns (sections)
    pub columns: usize,
    #[serde(default)]
    pub rows: Vec<SongRow>,
    #[serde(default)]
    pub groups: Vec<PatternGroup>,
    #[serde(default)]
    pub performance_tracks: Vec<PerformanceTrack>,
    #[serde(default)]
    pub harmony: HarmonyContext,
}

impl Song {
    pub fn new(columns: usize) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    pub fn group(&self, id: &str) -> Option<&PatternGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn group_mut(&mut self, id: &str) -> Option<&mut PatternGroup> {
        self.groups.iter_mut().find(|g| g.id == id)
    }

    pub fn row(&self, id: &str) -> Option<&SongRow> {
        self.rows.iter().find(|r| r.id == id)
    }

    pub fn row_mut(&mut self, id: &str) -> Option<&mut SongRow> {
        self.rows.iter_mut().find(|r| r.id == id)
    }

    pub fn performance_track(&self, id: &str) -> Option<&PerformanceTrack> {
        self.performance_tracks.iter().find(|t| t.id == id)
    }

    pub fn performance_track_mut(&mut self, id: &str) -> Option<&mut PerformanceTrack> {
        self.performance_tracks.iter_mut().find(|t| t.id == id)
    }

    /// Remove a performance track and unbind every row pointing at it
    pub fn remove_performance_track(&mut self, id: &str) -> Option<PerformanceTrack> {
        let index = self.performance_tracks.iter().position(|t| t.id == id)?;
        for row in self.rows.iter_mut() {
            if row.performance_track.as_deref() == Some(id) {
                row.performance_track = None;
            }
        }
        Some(self.performance_tracks.remove(index))
    }

    /// True if any row is soloed
    pub fn any_solo(&self) -> bool {
        self.rows.iter().any(|r| r.solo)
    }

    /// Apply a pure updater to one track's pattern
    ///
    /// Returns None if the track or its pattern does not exist, otherwise
    /// whether scheduling modifiers changed.
    pub fn update_pattern<F>(&mut self, group: &str, track: &str, updater: F) -> Option<bool>
    where
        F: FnOnce(Pattern) -> Pattern,
    {
        let pattern = self
            .group_mut(group)?
            .track_mut(track)?
            .pattern
            .as_mut()?;
        Some(pattern.update(updater))
    }

    /// Length of the whole song in ticks
    pub fn span_ticks(&self, grid: &TimeGrid, section_measures: u32) -> u64 {
        self.columns as u64 * section_measures as u64 * grid.ticks_per_measure()
    }
}
