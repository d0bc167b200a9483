// Note representation for the sequencer
// Note names, MIDI numbers and captured performance notes

use crate::sequencer::timeline::TimeGrid;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for recorded notes
pub type NoteId = Uuid;

/// Generate a unique note ID
pub fn generate_note_id() -> NoteId {
    Uuid::new_v4()
}

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Get the note name for a MIDI number (e.g., 60 -> "C4", 70 -> "A#4")
pub fn midi_to_note_name(midi: i32) -> String {
    let octave = midi.div_euclid(12) - 1;
    let note_index = midi.rem_euclid(12) as usize;
    format!("{}{}", NOTE_NAMES[note_index], octave)
}

/// Pitch class (0-11) of a note letter with optional accidentals ("C", "F#", "Bb")
pub fn pitch_class(name: &str) -> Option<i32> {
    let mut chars = name.trim().chars();
    let base: i32 = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let mut offset = 0;
    for c in chars {
        match c {
            '#' => offset += 1,
            'b' => offset -= 1,
            _ => return None,
        }
    }
    Some((base + offset).rem_euclid(12))
}

/// Parse a note name with octave ("C4", "Eb3", "F#-1") into a MIDI number
pub fn note_name_to_midi(name: &str) -> Option<i32> {
    let name = name.trim();
    let split = name.find(|c: char| c == '-' || c.is_ascii_digit())?;
    let (letter, octave) = name.split_at(split);
    let octave: i32 = octave.parse().ok()?;
    Some((octave + 1) * 12 + pitch_class(letter)?)
}

/// A live-captured note as persisted in a performance track
///
/// Positions and durations are notation strings so the persisted shape stays
/// plain data; `start_ticks` and `duration_ticks` resolve them on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceNote {
    /// Unique identifier, used to deduplicate live previews
    pub id: NoteId,

    /// Transport position ("bar:beat:sixteenth")
    pub time: String,

    /// Note name ("C4")
    pub note: String,

    /// Duration notation ("16n", "0.300s")
    pub duration: String,

    /// Velocity (0.0 - 1.0)
    pub velocity: f32,
}

impl PerformanceNote {
    /// Build a note from tick values
    pub fn from_ticks(
        grid: &TimeGrid,
        start_ticks: u64,
        duration_ticks: u64,
        note: String,
        velocity: f32,
    ) -> Self {
        Self {
            id: generate_note_id(),
            time: grid.ticks_to_transport_position(start_ticks),
            note,
            duration: grid.ticks_to_duration_notation(duration_ticks),
            velocity: velocity.clamp(0.0, 1.0),
        }
    }

    pub fn start_ticks(&self, grid: &TimeGrid) -> u64 {
        grid.to_ticks(&self.time)
    }

    pub fn duration_ticks(&self, grid: &TimeGrid) -> u64 {
        grid.to_ticks(&self.duration)
    }
}
