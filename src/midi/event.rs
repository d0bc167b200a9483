// MIDI events - Raw message parsing for live input
// Note-ons become performed notes for the capture session

use crate::sequencer::capture::PerformedNote;
use crate::sequencer::note::midi_to_note_name;
use crate::sequencer::pattern::TimingMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    ControlChange { controller: u8, value: u8 },
    PitchBend { value: i16 },
}

/// MIDI event stamped with the clock time it arrived at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidiEventTimed {
    pub event: MidiEvent,
    /// Clock time in seconds
    pub time: f64,
}

impl MidiEvent {
    /// Parse a raw MIDI message; the channel nibble is ignored
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        let [first, second, ..] = *data else {
            return None;
        };

        match status & 0xF0 {
            // Velocity 0 is a note-off
            0x90 if second == 0 => Some(MidiEvent::NoteOff { note: first }),
            0x90 => Some(MidiEvent::NoteOn {
                note: first,
                velocity: second,
            }),
            0x80 => Some(MidiEvent::NoteOff { note: first }),
            0xB0 => Some(MidiEvent::ControlChange {
                controller: first,
                value: second,
            }),
            0xE0 => Some(MidiEvent::PitchBend {
                value: ((second as i16) << 7) | first as i16,
            }),
            _ => None,
        }
    }
}

impl MidiEventTimed {
    pub fn new(event: MidiEvent, time: f64) -> Self {
        Self { event, time }
    }

    /// Convert a note-on into a performed note
    ///
    /// Other messages yield None: capture records on note-on and takes the
    /// note length from the instrument's default.
    pub fn to_performed_note(&self, mode: TimingMode) -> Option<PerformedNote> {
        match self.event {
            MidiEvent::NoteOn { note, velocity } => Some(PerformedNote {
                event_time: self.time,
                note_name: midi_to_note_name(note as i32),
                velocity: velocity as f32 / 127.0,
                duration_seconds: None,
                mode,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on() {
        let event = MidiEvent::from_bytes(&[0x90, 60, 100]).unwrap();
        assert_eq!(
            event,
            MidiEvent::NoteOn {
                note: 60,
                velocity: 100
            }
        );
    }

    #[test]
    fn test_note_off_forms() {
        assert_eq!(
            MidiEvent::from_bytes(&[0x80, 60, 0]),
            Some(MidiEvent::NoteOff { note: 60 })
        );
        assert_eq!(
            MidiEvent::from_bytes(&[0x90, 64, 0]),
            Some(MidiEvent::NoteOff { note: 64 })
        );
    }

    #[test]
    fn test_control_change_and_pitch_bend() {
        assert_eq!(
            MidiEvent::from_bytes(&[0xB0, 7, 127]),
            Some(MidiEvent::ControlChange {
                controller: 7,
                value: 127
            })
        );
        // Centered pitch bend
        assert_eq!(
            MidiEvent::from_bytes(&[0xE0, 0x00, 0x40]),
            Some(MidiEvent::PitchBend { value: 8192 })
        );
    }

    #[test]
    fn test_invalid_messages() {
        assert!(MidiEvent::from_bytes(&[]).is_none());
        assert!(MidiEvent::from_bytes(&[0x90, 60]).is_none());
        assert!(MidiEvent::from_bytes(&[0xF0, 0x00, 0x00]).is_none());
    }

    #[test]
    fn test_channel_ignored() {
        assert_eq!(
            MidiEvent::from_bytes(&[0x90, 60, 100]),
            MidiEvent::from_bytes(&[0x9F, 60, 100])
        );
    }

    #[test]
    fn test_note_on_to_performed_note() {
        let timed = MidiEventTimed::new(
            MidiEvent::NoteOn {
                note: 69,
                velocity: 127,
            },
            1.5,
        );
        let performed = timed.to_performed_note(TimingMode::Free).unwrap();
        assert_eq!(performed.note_name, "A4");
        assert_eq!(performed.velocity, 1.0);
        assert_eq!(performed.event_time, 1.5);
        assert_eq!(performed.duration_seconds, None);

        let off = MidiEventTimed::new(MidiEvent::NoteOff { note: 69 }, 2.0);
        assert!(off.to_performed_note(TimingMode::Free).is_none());
    }
}
