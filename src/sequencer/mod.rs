// Sequencer module
// Musical time, the shared clock, pattern players and live capture

pub mod capture;
pub mod clock;
pub mod free_player;
pub mod harmony;
pub mod note;
pub mod pattern;
pub mod step_player;
pub mod timeline;
pub mod transport;
pub mod trigger;

pub use capture::{CaptureDefaults, PerformedNote, RecordingSession, RecordingState};
pub use clock::{Clock, ClockListener, SubscriptionId, TickContext, TransportPosition};
pub use free_player::FreePlayer;
pub use harmony::{ChordComplexity, HarmonyContext, ResolvedChord, ScaleKind, resolve_chord};
pub use note::{NoteId, PerformanceNote};
pub use pattern::{NoteEvent, Pattern, TimingMode};
pub use step_player::StepPlayer;
pub use timeline::{Tempo, TimeGrid, TimeValue};
pub use transport::{Transport, TransportState};
pub use trigger::{
    ActivityPredicate, InstrumentKey, Trigger, TriggerCall, TriggerLog, TriggerPayload,
    TriggerRegistry, VoiceFactory, VoicePool,
};
