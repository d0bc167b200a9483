// Song persistence helpers
// Plain serde data in and out; storage itself belongs to the host application

pub mod serialization;

pub use serialization::{
    deserialize_from_json, deserialize_from_ron, serialize_to_json, serialize_to_ron,
};

use crate::error::{SequencerError, SequencerResult};
use crate::song::Song;
use std::collections::HashSet;

/// Helper function to validate song structure
///
/// Dangling slot or performance-track references are tolerated at playback
/// time (the row stays silent); this check is for import paths that want to
/// reject them up front.
pub fn validate_song_structure(song: &Song) -> SequencerResult<()> {
    let mut group_ids = HashSet::new();
    for group in &song.groups {
        if !group_ids.insert(group.id.as_str()) {
            return Err(SequencerError::InvalidConfig(format!(
                "Duplicate pattern group id '{}'",
                group.id
            )));
        }
    }

    let mut track_ids = HashSet::new();
    for track in &song.performance_tracks {
        if !track_ids.insert(track.id.as_str()) {
            return Err(SequencerError::InvalidConfig(format!(
                "Duplicate performance track id '{}'",
                track.id
            )));
        }
    }

    let mut row_ids = HashSet::new();
    for row in &song.rows {
        if !row_ids.insert(row.id.as_str()) {
            return Err(SequencerError::InvalidConfig(format!(
                "Duplicate row id '{}'",
                row.id
            )));
        }

        if !(0.0..=1.0).contains(&row.velocity) {
            return Err(SequencerError::InvalidConfig(format!(
                "Row '{}' velocity must be between 0 and 1",
                row.id
            )));
        }

        if let Some(missing) = row
            .slots
            .iter()
            .flatten()
            .find(|id| !group_ids.contains(id.as_str()))
        {
            return Err(SequencerError::InvalidConfig(format!(
                "Row '{}' references unknown pattern group '{}'",
                row.id, missing
            )));
        }

        if let Some(track) = row
            .performance_track
            .as_ref()
            .filter(|id| !track_ids.contains(id.as_str()))
        {
            return Err(SequencerError::InvalidConfig(format!(
                "Row '{}' references unknown performance track '{}'",
                row.id, track
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song::{PatternGroup, PerformanceTrack, SongRow};

    fn valid_song() -> Song {
        let mut song = Song::new(2);
        song.groups.push(PatternGroup::new("g1", "Intro"));
        song.performance_tracks
            .push(PerformanceTrack::new("p1", "Keys", None));
        song.rows.push(SongRow::with_slots("r1", vec![Some("g1".to_string()), None]));
        song.rows.push(SongRow::with_performance("r2", "p1"));
        song
    }

    #[test]
    fn test_validate_song_structure_valid() {
        assert!(validate_song_structure(&valid_song()).is_ok());
    }

    #[test]
    fn test_validate_song_structure_dangling_slot() {
        let mut song = valid_song();
        song.rows[0].slots[1] = Some("g9".to_string());
        assert!(validate_song_structure(&song).is_err());
    }

    #[test]
    fn test_validate_song_structure_dangling_performance() {
        let mut song = valid_song();
        song.rows[1].performance_track = Some("p9".to_string());
        assert!(validate_song_structure(&song).is_err());
    }

    #[test]
    fn test_validate_song_structure_duplicate_ids() {
        let mut song = valid_song();
        song.groups.push(PatternGroup::new("g1", "Copy"));
        assert!(validate_song_structure(&song).is_err());

        let mut song = valid_song();
        song.rows.push(SongRow::with_slots("r1", Vec::new()));
        assert!(validate_song_structure(&song).is_err());
    }

    #[test]
    fn test_validate_song_structure_row_velocity() {
        let mut song = valid_song();
        song.rows[0].velocity = 1.5;
        assert!(validate_song_structure(&song).is_err());
    }
}
