// Serialization utilities for song persistence

use crate::error::{SequencerError, SequencerResult};
use crate::song::Song;
use ron::ser::PrettyConfig;

/// Serialize a song to RON format
pub fn serialize_to_ron(song: &Song) -> SequencerResult<String> {
    ron::ser::to_string_pretty(song, PrettyConfig::default()).map_err(|e| {
        SequencerError::SerializationError(format!("Failed to serialize to RON: {}", e))
    })
}

/// Deserialize a song from RON format
pub fn deserialize_from_ron(ron_data: &str) -> SequencerResult<Song> {
    ron::from_str(ron_data).map_err(|e| {
        SequencerError::SerializationError(format!("Failed to deserialize from RON: {}", e))
    })
}

/// Serialize a song to JSON format
pub fn serialize_to_json(song: &Song) -> SequencerResult<String> {
    serde_json::to_string_pretty(song).map_err(|e| {
        SequencerError::SerializationError(format!("Failed to serialize to JSON: {}", e))
    })
}

/// Deserialize a song from JSON format
pub fn deserialize_from_json(json_data: &str) -> SequencerResult<Song> {
    serde_json::from_str(json_data).map_err(|e| {
        SequencerError::SerializationError(format!("Failed to deserialize from JSON: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::note::PerformanceNote;
    use crate::sequencer::pattern::{NoteEvent, Pattern};
    use crate::sequencer::timeline::TimeGrid;
    use crate::song::{GroupTrack, InstrumentClass, InstrumentSource, PatternGroup, PerformanceTrack, SongRow};

    fn sample_song() -> Song {
        let grid = TimeGrid::default();
        let mut song = Song::new(2);

        let mut lead = Pattern::from_events(vec![NoteEvent {
            time: 0,
            note: "C4".to_string(),
            duration: 96,
            velocity: 0.9,
        }]);
        lead.note_loop_length = Some(768);

        song.groups.push(
            PatternGroup::new("g1", "Verse")
                .with_track(GroupTrack::new(
                    "kick",
                    InstrumentSource::new("core", "kick"),
                    Pattern::from_steps(&[1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0]),
                ))
                .with_track(GroupTrack::new(
                    "lead",
                    InstrumentSource::new("core", "pad").with_class(InstrumentClass::Harmonic),
                    lead,
                )),
        );
        song.rows.push(SongRow::with_slots("r1", vec![Some("g1".to_string()), None]));
        song.rows.push(SongRow::with_performance("r2", "p1"));

        let mut track = PerformanceTrack::new("p1", "Keys", Some(InstrumentSource::new("core", "keys")));
        track.color = Some([200, 80, 40]);
        track.insert_note(
            PerformanceNote::from_ticks(&grid, 100, 48, "E4".to_string(), 0.7),
            &grid,
        );
        song.performance_tracks.push(track);
        song
    }

    #[test]
    fn test_ron_preserves_song() {
        let song = sample_song();
        let text = serialize_to_ron(&song).unwrap();
        assert_eq!(deserialize_from_ron(&text).unwrap(), song);
    }

    #[test]
    fn test_json_shape_is_camel_case() {
        let song = sample_song();
        let json = serialize_to_json(&song).unwrap();
        assert!(json.contains("\"performanceTracks\""));
        assert!(json.contains("\"timingMode\": \"free\""));
        assert!(json.contains("\"noteLoopLength\": 768"));
        assert_eq!(deserialize_from_json(&json).unwrap(), song);
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(
            deserialize_from_json("{\"columns\": \"two\"}"),
            Err(SequencerError::SerializationError(_))
        ));
        assert!(matches!(
            deserialize_from_ron("(columns: "),
            Err(SequencerError::SerializationError(_))
        ));
    }
}
