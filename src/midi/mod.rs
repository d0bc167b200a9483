// MIDI live input

pub mod event;

pub use event::{MidiEvent, MidiEventTimed};
