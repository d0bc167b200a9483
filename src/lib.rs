// loopgrid - Step-sequencer scheduling, quantization and arrangement engine

pub mod arrangement;
pub mod config;
pub mod error;
pub mod midi;
pub mod project;
pub mod sequencer;
pub mod song;

// Re-export commonly used types for convenience
pub use arrangement::{ArrangementPlayer, RowStatus, TrackPlayer};
pub use config::EngineConfig;
pub use error::{SequencerError, SequencerResult, TimeParseError};
pub use midi::{MidiEvent, MidiEventTimed};
pub use sequencer::{
    Clock, NoteEvent, Pattern, PerformanceNote, PerformedNote, RecordingSession, RecordingState,
    Tempo, TimeGrid, TimingMode, Transport, TransportState, Trigger, TriggerCall, TriggerLog,
    TriggerRegistry,
};
pub use song::{
    GroupTrack, InstrumentClass, InstrumentSource, PatternGroup, PerformanceTrack, Song, SongRow,
};
