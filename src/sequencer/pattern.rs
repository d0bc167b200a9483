// Pattern - One instrument's step or event data for one loop
// A pattern is the atomic playable unit ("chunk")

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// How a pattern is scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimingMode {
    /// Step-grid quantized
    #[default]
    Sync,
    /// Event-list based
    Free,
}

/// A free-timing note event, times in ticks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub time: u64,
    pub note: String,
    pub duration: u64,
    pub velocity: f32,
}

/// A step pattern
///
/// `steps` defines the grid size. `velocities` and `pitches` are parallel to
/// it but may have any length; they are resampled to whatever grid is played.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    /// Binary activity flags, one per grid position
    pub steps: Vec<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocities: Option<Vec<Option<f32>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitches: Option<Vec<Option<f32>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Explicit release in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sustain: Option<f64>,

    #[serde(default = "default_velocity_factor")]
    pub velocity_factor: f32,

    #[serde(default)]
    pub pitch_offset: f32,

    /// Swing amount (0.0 - 1.0)
    #[serde(default)]
    pub swing: f32,

    /// Humanize amount (0.0 - 1.0)
    #[serde(default)]
    pub humanize: f32,

    #[serde(default)]
    pub timing_mode: TimingMode,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub note_events: Vec<NoteEvent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_loop_length: Option<u64>,

    /// Base scale degree for harmonic instruments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harmonia_degree: Option<i32>,

    /// Per-step scale degree overrides for harmonic instruments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harmonia_step_degrees: Option<Vec<Option<i32>>>,
}

fn default_velocity_factor() -> f32 {
    1.0
}

impl Pattern {
    /// Default grid size
    pub const DEFAULT_STEPS: usize = 16;

    /// Create an empty sync pattern with `step_count` steps
    pub fn default_for_steps(step_count: usize) -> Self {
        Self {
            steps: vec![0; step_count],
            velocities: None,
            pitches: None,
            note: None,
            sustain: None,
            velocity_factor: 1.0,
            pitch_offset: 0.0,
            swing: 0.0,
            humanize: 0.0,
            timing_mode: TimingMode::Sync,
            note_events: Vec::new(),
            note_loop_length: None,
            harmonia_degree: None,
            harmonia_step_degrees: None,
        }
    }

    /// Create a sync pattern from 0/1 flags
    pub fn from_steps(steps: &[u8]) -> Self {
        Self {
            steps: steps.iter().map(|&s| u8::from(s != 0)).collect(),
            ..Self::default_for_steps(steps.len())
        }
    }

    /// Create a free-timing pattern from note events
    pub fn from_events(events: Vec<NoteEvent>) -> Self {
        Self {
            timing_mode: TimingMode::Free,
            note_events: events,
            ..Self::default_for_steps(Self::DEFAULT_STEPS)
        }
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Activity of a step, wrapping around the grid
    pub fn is_step_active(&self, index: usize) -> bool {
        if self.steps.is_empty() {
            return false;
        }
        self.steps[index % self.steps.len()] != 0
    }

    /// Velocity of a step on a grid of `grid_size` (defaults to 1.0)
    pub fn step_velocity(&self, index: usize, grid_size: usize) -> f32 {
        resampled(self.velocities.as_deref(), index, grid_size).unwrap_or(1.0)
    }

    /// Pitch of a step on a grid of `grid_size` (defaults to 0.0)
    pub fn step_pitch(&self, index: usize, grid_size: usize) -> f32 {
        resampled(self.pitches.as_deref(), index, grid_size).unwrap_or(0.0)
    }

    /// Scale degree of a step, falling back to the base degree
    pub fn step_degree(&self, index: usize, grid_size: usize) -> Option<i32> {
        resampled(self.harmonia_step_degrees.as_deref(), index, grid_size)
            .or(self.harmonia_degree)
    }

    /// Fingerprint of the fields whose change requires a new subscription
    ///
    /// Step flags, per-step arrays and event contents are excluded: those are
    /// re-read on every tick and can be swapped in place.
    pub fn modifier_fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.note.hash(&mut hasher);
        self.sustain.map(f64::to_bits).hash(&mut hasher);
        self.velocity_factor.to_bits().hash(&mut hasher);
        self.pitch_offset.to_bits().hash(&mut hasher);
        self.swing.to_bits().hash(&mut hasher);
        self.humanize.to_bits().hash(&mut hasher);
        self.timing_mode.hash(&mut hasher);
        self.note_loop_length.hash(&mut hasher);
        if self.timing_mode == TimingMode::Free {
            self.free_loop_length().hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Loop length of the event list in ticks
    /// Explicit `note_loop_length` wins, otherwise the end of the last event.
    pub fn free_loop_length(&self) -> u64 {
        match self.note_loop_length {
            Some(length) if length > 0 => length,
            _ => self
                .note_events
                .iter()
                .max_by_key(|e| e.time)
                .map_or(0, |last| last.time.saturating_add(last.duration)),
        }
    }

    /// Apply a pure updater and report whether scheduling modifiers changed
    pub fn update<F>(&mut self, updater: F) -> bool
    where
        F: FnOnce(Pattern) -> Pattern,
    {
        let before = self.modifier_fingerprint();
        let current = std::mem::replace(self, Pattern::default_for_steps(0));
        *self = updater(current);
        before != self.modifier_fingerprint()
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Self::default_for_steps(Self::DEFAULT_STEPS)
    }
}

/// Nearest-neighbor index mapping from a grid of `target_len` to `source_len`
/// Returns None when either length is 0.
pub fn resample_index(index: usize, target_len: usize, source_len: usize) -> Option<usize> {
    if target_len == 0 || source_len == 0 {
        return None;
    }
    let index = index % target_len;
    Some((index * source_len / target_len).min(source_len - 1))
}

fn resampled<T: Copy>(values: Option<&[Option<T>]>, index: usize, grid_size: usize) -> Option<T> {
    let values = values?;
    let source = resample_index(index, grid_size, values.len())?;
    values[source]
}
