// Quick demonstration of song playback and live capture
// Run with: cargo run --bin demo_song_playback

use loopgrid::sequencer::capture::CaptureDefaults;
use loopgrid::sequencer::clock::TransportPosition;
use loopgrid::sequencer::trigger::InstrumentKey;
use loopgrid::{
    ArrangementPlayer, EngineConfig, GroupTrack, InstrumentClass, InstrumentSource, MidiEvent,
    MidiEventTimed, Pattern, PatternGroup, PerformanceTrack, RecordingSession, Song, SongRow,
    TimingMode, TriggerCall, TriggerLog, TriggerRegistry,
};
use std::sync::Arc;

fn build_song(config: &EngineConfig) -> Song {
    let mut song = Song::new(2);

    let mut kick = Pattern::default_for_steps(config.steps_per_measure);
    for step in (0..kick.step_count()).step_by(4) {
        kick.steps[step] = 1;
    }

    let mut hat = Pattern::from_steps(&[0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 1]);
    hat.swing = 0.4;
    hat.velocity_factor = 0.6;

    let mut chords = Pattern::from_steps(&[1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0]);
    chords.harmonia_step_degrees = Some(vec![Some(1), None, None, None, None, None, None, None, Some(5)]);

    song.groups.push(
        PatternGroup::new("verse", "Verse")
            .with_track(GroupTrack::new("kick", InstrumentSource::new("core", "kick"), kick.clone()))
            .with_track(GroupTrack::new("hat", InstrumentSource::new("core", "hat"), hat)),
    );
    song.groups.push(
        PatternGroup::new("chorus", "Chorus")
            .with_track(GroupTrack::new("kick", InstrumentSource::new("core", "kick"), kick))
            .with_track(GroupTrack::new(
                "chords",
                InstrumentSource::new("core", "pad").with_class(InstrumentClass::Harmonic),
                chords,
            )),
    );

    song.rows.push(SongRow::with_slots(
        "drums",
        vec![Some("verse".to_string()), Some("chorus".to_string())],
    ));
    song.rows.push(SongRow::with_performance("keys", "take-1"));
    song.performance_tracks.push(PerformanceTrack::new(
        "take-1",
        "Keys take",
        Some(InstrumentSource::new("core", "keys")),
    ));
    song
}

fn print_calls(label: &str, calls: &[TriggerCall]) {
    println!("\n{} ({} calls)", label, calls.len());
    for call in calls {
        println!(
            "   {:>7.3}s  note={:<5} vel={:.2} sustain={:.3}s",
            call.time,
            call.note.as_deref().unwrap_or("-"),
            call.velocity.unwrap_or(1.0),
            call.sustain.unwrap_or(0.0)
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🎵 loopgrid - Song Playback Demo");
    println!("================================");

    let config = EngineConfig::from_ron_str("(bpm: 100.0, humanize_seed: Some(42))")?;
    let grid = config.grid();
    println!("   - Tempo: {}", grid.tempo());
    println!("   - Ticks per sixteenth: {}", grid.ticks_per_sixteenth());

    let log = TriggerLog::new();
    let mut registry = TriggerRegistry::new();
    for instrument in ["kick", "hat", "pad", "keys"] {
        registry.register(InstrumentKey::new("core", instrument, None), log.clone());
    }

    let mut song = build_song(&config);
    let mut session = RecordingSession::new(config.quantize);
    let mut player = ArrangementPlayer::new(config.clone(), registry);

    player.start(&song, &session);
    println!("\n▶️  Started: {} subscriptions", player.subscription_count());

    player.advance_to(grid.ticks_per_measure() - 1, &song, &session);
    print_calls("Column 0 (verse)", &log.calls());
    log.clear();

    player.advance_to(grid.ticks_per_measure() * 2 - 1, &song, &session);
    print_calls("Column 1 (chorus)", &log.calls());
    log.clear();

    // Live capture into the performance row
    session.set_target(Some("take-1".to_string()));
    session.set_defaults(CaptureDefaults {
        note: "C4".to_string(),
        sustain_seconds: Some(0.2),
    });
    session.set_record_enabled(true);
    session.set_panel_focused(true);
    println!("\n⏺️  Recording state: {:?}", session.state());

    for (bytes, offset) in [([0x90u8, 60, 110], 0.05), ([0x90, 64, 90], 0.31), ([0x90, 67, 70], 0.62)] {
        let Some(event) = MidiEvent::from_bytes(&bytes) else {
            continue;
        };
        let time = player.clock().seconds_at(player.clock().current_ticks()) + offset;
        let timed = MidiEventTimed::new(event, time);
        if let Some(performed) = timed.to_performed_note(TimingMode::Free) {
            if let Some(note) =
                session.on_performance_note_recorded(&performed, player.clock(), &grid, &mut song)
            {
                println!("   captured {} at {} ({})", note.note, note.time, note.duration);
            }
        }
    }
    player.resolve(&song, &session);

    if let Some(row) = song.row("keys") {
        println!("   keys row status: {:?}", player.row_status(row, &session));
    }

    session.stop();
    player.advance_to(song.span_ticks(&grid, config.section_measures) * 2 - 1, &song, &session);
    let replayed = log
        .calls()
        .iter()
        .filter(|call| call.payload.is_none())
        .count();
    println!("\n🔁 Replayed performance notes over the next loop: {}", replayed);

    player.stop();
    println!("\n⏹️  Stopped: {} subscriptions", player.subscription_count());

    let json = loopgrid::project::serialize_to_json(&song)?;
    println!("\n💾 Song JSON: {} bytes", json.len());

    Ok(())
}
