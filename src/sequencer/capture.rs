// Capture - Live performance recording and quantization
// Turns performed notes into sorted, persisted performance-track notes

use crate::sequencer::clock::TransportPosition;
use crate::sequencer::note::PerformanceNote;
use crate::sequencer::pattern::TimingMode;
use crate::sequencer::timeline::TimeGrid;
use crate::song::{PerformanceTrackId, Song};

/// Recording state of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    /// Record enabled, waiting for a focused instrument panel and a target
    Armed,
    /// Accepting performed notes
    Recording,
}

/// A raw note played live, as delivered by the input layer
#[derive(Debug, Clone, PartialEq)]
pub struct PerformedNote {
    /// Clock time of the note-on in seconds
    pub event_time: f64,
    /// Note name; empty means the instrument's default note
    pub note_name: String,
    pub velocity: f32,
    pub duration_seconds: Option<f64>,
    pub mode: TimingMode,
}

/// Fallbacks taken from the instrument being played
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureDefaults {
    pub note: String,
    /// Default note length in seconds
    pub sustain_seconds: Option<f64>,
}

impl Default for CaptureDefaults {
    fn default() -> Self {
        Self {
            note: "C4".to_string(),
            sustain_seconds: None,
        }
    }
}

/// The single, process-wide recording session
///
/// Owns the recording target, the global quantize toggle and the ghost
/// buffer. Only one target exists, so selecting a new one deactivates the
/// previous one.
#[derive(Debug, Clone, Default)]
pub struct RecordingSession {
    record_enabled: bool,
    panel_focused: bool,
    target: Option<PerformanceTrackId>,
    quantize: bool,
    defaults: CaptureDefaults,
    ghost_notes: Vec<PerformanceNote>,
}

impl RecordingSession {
    pub fn new(quantize: bool) -> Self {
        Self {
            quantize,
            ..Self::default()
        }
    }

    pub fn state(&self) -> RecordingState {
        match (self.record_enabled, self.panel_focused, &self.target) {
            (true, true, Some(_)) => RecordingState::Recording,
            (true, _, _) => RecordingState::Armed,
            _ => RecordingState::Idle,
        }
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn quantize(&self) -> bool {
        self.quantize
    }

    pub fn set_quantize(&mut self, quantize: bool) {
        self.quantize = quantize;
    }

    pub fn defaults(&self) -> &CaptureDefaults {
        &self.defaults
    }

    /// Notes captured this session, not yet part of a re-resolved arrangement
    pub fn ghost_notes(&self) -> &[PerformanceNote] {
        &self.ghost_notes
    }

    /// Enable or disable recording; disabling ends the session
    pub fn set_record_enabled(&mut self, enabled: bool) {
        self.record_enabled = enabled;
        if !enabled {
            self.flush();
        }
    }

    /// Instrument panel focus; closing the panel ends the session
    pub fn set_panel_focused(&mut self, focused: bool) {
        self.panel_focused = focused;
        if !focused {
            self.flush();
        }
    }

    /// Select the recording target, replacing any previous one
    pub fn set_target(&mut self, target: Option<PerformanceTrackId>) {
        if self.target != target {
            self.flush();
            self.target = target;
        }
    }

    /// Switch the instrument being played
    pub fn set_defaults(&mut self, defaults: CaptureDefaults) {
        if self.defaults != defaults {
            self.flush();
            self.defaults = defaults;
        }
    }

    /// Stop recording and flush previews
    pub fn stop(&mut self) {
        self.record_enabled = false;
        self.flush();
    }

    /// Drop ghost notes
    pub fn flush(&mut self) {
        if !self.ghost_notes.is_empty() {
            log::trace!("Flushing {} ghost notes", self.ghost_notes.len());
        }
        self.ghost_notes.clear();
    }

    /// Empty the ghost buffer and the target track's notes
    pub fn clear(&mut self, song: &mut Song) {
        self.flush();
        if let Some(track) = self
            .target
            .as_deref()
            .and_then(|id| song.performance_track_mut(id))
        {
            track.clear_notes();
        }
    }

    /// Accept a performed note
    ///
    /// Returns the persisted note, or None when the note was dropped: not
    /// recording, or the target track no longer exists (the session then
    /// falls back to no target).
    pub fn on_performance_note_recorded(
        &mut self,
        event: &PerformedNote,
        transport: &dyn TransportPosition,
        grid: &TimeGrid,
        song: &mut Song,
    ) -> Option<PerformanceNote> {
        if self.state() != RecordingState::Recording {
            return None;
        }
        let target = self.target.clone()?;
        if song.performance_track(&target).is_none() {
            log::warn!(
                "Recording target '{}' no longer exists, dropping back to idle",
                target
            );
            self.target = None;
            self.flush();
            return None;
        }

        let note = self.capture(event, transport, grid);
        self.ghost_notes.push(note.clone());
        if let Some(track) = song.performance_track_mut(&target) {
            track.insert_note(note.clone(), grid);
        }
        Some(note)
    }

    /// Quantize and convert a performed note
    fn capture(
        &self,
        event: &PerformedNote,
        transport: &dyn TransportPosition,
        grid: &TimeGrid,
    ) -> PerformanceNote {
        let velocity = if event.velocity.is_finite() {
            event.velocity.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let note_name = match event.note_name.trim() {
            "" => self.defaults.note.clone(),
            name => name.to_string(),
        };

        let raw_start = transport
            .ticks_at(event.event_time)
            .filter(|ticks| ticks.is_finite() && *ticks >= 0.0)
            .unwrap_or_else(|| transport.current_ticks() as f64);

        // Sync notes are always quantized, free notes only with the global toggle
        let quantize = event.mode == TimingMode::Sync || self.quantize;

        let start = if quantize {
            grid.quantize_to_sixteenth(raw_start)
        } else {
            raw_start.round() as u64
        };

        let mut duration = event
            .duration_seconds
            .or(self.defaults.sustain_seconds)
            .map(|seconds| grid.seconds_to_ticks(seconds))
            .unwrap_or(f64::NAN);
        if !duration.is_finite() || duration <= 0.0 {
            duration = grid.ticks_per_quarter() as f64;
        }

        let duration = if quantize {
            grid.quantize_duration(duration)
        } else {
            (duration.round() as u64).max(1)
        };

        PerformanceNote::from_ticks(grid, start, duration, note_name, velocity)
    }
}
