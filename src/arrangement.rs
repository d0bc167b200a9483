// Arrangement - Song arrangement resolver
// Decides per section which patterns play on which trigger, and keeps clock
// subscriptions alive across re-resolutions when nothing relevant changed

use crate::config::EngineConfig;
use crate::sequencer::capture::{RecordingSession, RecordingState};
use crate::sequencer::clock::{Clock, ClockListener, SubscriptionId, TickContext};
use crate::sequencer::free_player::{FreePlayer, performance_events};
use crate::sequencer::harmony::HarmonyContext;
use crate::sequencer::note::PerformanceNote;
use crate::sequencer::pattern::{Pattern, TimingMode};
use crate::sequencer::step_player::StepPlayer;
use crate::sequencer::timeline::TimeGrid;
use crate::sequencer::transport::{Transport, TransportState};
use crate::sequencer::trigger::{ActivityPredicate, Trigger, TriggerRegistry};
use crate::song::{GroupTrack, InstrumentClass, PerformanceTrack, Song, SongRow};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

/// Any player the arrangement can put on the clock
pub enum TrackPlayer {
    Step(StepPlayer),
    Free(FreePlayer),
}

impl ClockListener for TrackPlayer {
    fn on_tick(&mut self, ctx: &TickContext, grid: &TimeGrid) {
        match self {
            TrackPlayer::Step(player) => player.on_tick(ctx, grid),
            TrackPlayer::Free(player) => player.on_tick(ctx, grid),
        }
    }
}

impl From<StepPlayer> for TrackPlayer {
    fn from(player: StepPlayer) -> Self {
        TrackPlayer::Step(player)
    }
}

impl From<FreePlayer> for TrackPlayer {
    fn from(player: FreePlayer) -> Self {
        TrackPlayer::Free(player)
    }
}

/// Row status exposed to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    /// Target of an active recording
    Recording,
    /// Target of an armed, not yet recording session
    Armed,
    /// Something on this row is subscribed to the clock
    Live,
    Idle,
}

/// Mute/solo snapshot read by every activity predicate
#[derive(Debug, Default)]
struct MixState {
    muted_rows: HashSet<String>,
    solo_rows: HashSet<String>,
    /// (group, track) pairs
    muted_tracks: HashSet<(String, String)>,
}

impl MixState {
    fn from_song(song: &Song) -> Self {
        let mut mix = Self::default();
        for row in &song.rows {
            if row.muted {
                mix.muted_rows.insert(row.id.clone());
            }
            if row.solo {
                mix.solo_rows.insert(row.id.clone());
            }
        }
        for group in &song.groups {
            for track in group.tracks.iter().filter(|t| t.muted) {
                mix.muted_tracks
                    .insert((group.id.clone(), track.id.clone()));
            }
        }
        mix
    }

    /// Row not muted, track not muted, and no solo elsewhere
    fn is_audible(&self, row: &str, track: Option<&(String, String)>) -> bool {
        !self.muted_rows.contains(row)
            && track.is_none_or(|t| !self.muted_tracks.contains(t))
            && (self.solo_rows.is_empty() || self.solo_rows.contains(row))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SlotKey {
    Track {
        row: String,
        group: String,
        track: String,
    },
    Performance {
        row: String,
        track: String,
    },
}

impl SlotKey {
    fn row(&self) -> &str {
        match self {
            SlotKey::Track { row, .. } | SlotKey::Performance { row, .. } => row,
        }
    }
}

struct ActiveSlot {
    subscription: SubscriptionId,
    fingerprint: u64,
}

/// What a slot should be playing after resolution
enum Desired {
    Pattern {
        pattern: Pattern,
        trigger: Arc<dyn Trigger>,
        harmony: Option<HarmonyContext>,
        character: Option<String>,
        velocity: f32,
        fingerprint: u64,
    },
    Performance {
        notes: Vec<PerformanceNote>,
        trigger: Arc<dyn Trigger>,
        character: Option<String>,
        velocity: f32,
        span: u64,
        fingerprint: u64,
    },
}

/// Plays a song on one shared clock
pub struct ArrangementPlayer {
    clock: Clock<TrackPlayer>,
    registry: TriggerRegistry,
    config: EngineConfig,
    transport: Transport,
    active_column: usize,
    mix: Arc<RwLock<MixState>>,
    slots: HashMap<SlotKey, ActiveSlot>,
}

impl ArrangementPlayer {
    pub fn new(config: EngineConfig, mut registry: TriggerRegistry) -> Self {
        registry.set_release_tail(config.transient_release_seconds);
        Self {
            clock: Clock::new(config.grid()),
            registry,
            config,
            transport: Transport::new(),
            active_column: 0,
            mix: Arc::new(RwLock::new(MixState::default())),
            slots: HashMap::new(),
        }
    }

    /// The shared clock, also the transport position for live capture
    pub fn clock(&self) -> &Clock<TrackPlayer> {
        &self.clock
    }

    pub fn grid(&self) -> &TimeGrid {
        self.clock.grid()
    }

    pub fn registry(&self) -> &TriggerRegistry {
        &self.registry
    }

    /// Register or replace triggers; call `resolve` afterwards
    pub fn registry_mut(&mut self) -> &mut TriggerRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn is_started(&self) -> bool {
        self.transport.is_started()
    }

    pub fn active_column(&self) -> usize {
        self.active_column
    }

    pub fn subscription_count(&self) -> usize {
        self.clock.subscription_count()
    }

    /// Start playback from the current position
    ///
    /// Free-timing players joining mid-loop fire the rest of that loop first.
    pub fn start(&mut self, song: &Song, session: &RecordingSession) {
        if session.state() == RecordingState::Recording {
            self.transport.record();
        } else {
            self.transport.play();
        }
        self.active_column = self.column_at(self.clock.position_ticks(), song);
        self.reconcile(song, session, true);
    }

    /// Stop playback, dispose every player and rewind
    pub fn stop(&mut self) {
        self.transport.stop();
        self.dispose_all();
        if let Ok(mut pool) = self.registry.voice_pool().lock() {
            pool.stop_all();
        }
        self.clock.seek(0);
        self.active_column = 0;
    }

    /// Pause playback, keeping the playhead for the next `start`
    /// Notes already handed to triggers ahead of time are the voice layer's to cancel.
    pub fn pause(&mut self) {
        if self.transport.state() == TransportState::Stopped {
            return;
        }
        self.transport.pause();
        self.dispose_all();
        if let Ok(mut pool) = self.registry.voice_pool().lock() {
            pool.stop_all();
        }
    }

    /// Jump to a song column and re-resolve
    pub fn set_active_column(&mut self, column: usize, song: &Song, session: &RecordingSession) {
        if column != self.active_column {
            log::debug!("Section change: column {} -> {}", self.active_column, column);
            self.active_column = column;
            self.resolve(song, session);
        }
    }

    /// Reconcile clock subscriptions with the song
    ///
    /// Called once per section change and once per arrangement edit.
    /// Subscriptions whose scheduling fingerprint is unchanged are updated
    /// in place; only new or changed slots are re-subscribed.
    pub fn resolve(&mut self, song: &Song, session: &RecordingSession) {
        self.reconcile(song, session, false);
    }

    /// `catch_up` fires the rest of the current loop for free-timing
    /// players subscribed mid-loop
    fn reconcile(&mut self, song: &Song, session: &RecordingSession, catch_up: bool) {
        if let Ok(mut mix) = self.mix.write() {
            *mix = MixState::from_song(song);
        }

        if !self.transport.is_started() {
            self.dispose_all();
            return;
        }

        let desired = self.desired_slots(song, session);

        let stale: Vec<SlotKey> = self
            .slots
            .keys()
            .filter(|key| !desired.contains_key(*key))
            .cloned()
            .collect();
        for key in stale {
            self.dispose(&key);
        }

        // Stable subscription order within a tick
        let mut desired: Vec<(SlotKey, Desired)> = desired.into_iter().collect();
        desired.sort_by(|(a, _), (b, _)| slot_order(song, a).cmp(&slot_order(song, b)));

        for (key, want) in desired {
            let fingerprint = match &want {
                Desired::Pattern { fingerprint, .. } | Desired::Performance { fingerprint, .. } => {
                    *fingerprint
                }
            };

            let unchanged = self
                .slots
                .get(&key)
                .is_some_and(|slot| slot.fingerprint == fingerprint);
            if unchanged {
                self.update_in_place(&key, want);
            } else {
                self.dispose(&key);
                self.subscribe(key, want, catch_up);
            }
        }
    }

    /// Advance the clock, re-resolving at every section boundary
    pub fn advance_to(&mut self, target_tick: u64, song: &Song, session: &RecordingSession) {
        let section = self.config.section_ticks(self.clock.grid());
        if self.transport.is_started() && section > 0 && song.columns > 0 {
            loop {
                let boundary = (self.clock.position_ticks() / section + 1) * section;
                if boundary > target_tick {
                    break;
                }
                self.clock.advance_to(boundary - 1);
                let column = self.column_at(boundary, song);
                if column != self.active_column {
                    self.active_column = column;
                    self.resolve(song, session);
                }
                self.clock.advance_to(boundary);
            }
        }
        self.clock.advance_to(target_tick);
        self.transport.set_position_ticks(self.clock.position_ticks());

        let now = self.clock.seconds_at(self.clock.position_ticks());
        if let Ok(mut pool) = self.registry.voice_pool().lock() {
            pool.collect(now);
        }
    }

    pub fn advance_by(&mut self, ticks: u64, song: &Song, session: &RecordingSession) {
        self.advance_to(self.clock.position_ticks() + ticks, song, session);
    }

    /// Status of one row for the UI
    pub fn row_status(&self, row: &SongRow, session: &RecordingSession) -> RowStatus {
        let targeted = row.performance_track.is_some()
            && row.performance_track.as_deref() == session.target();
        if targeted {
            match session.state() {
                RecordingState::Recording => return RowStatus::Recording,
                RecordingState::Armed => return RowStatus::Armed,
                RecordingState::Idle => {}
            }
        }

        if self.transport.is_started() && self.slots.keys().any(|key| key.row() == row.id) {
            RowStatus::Live
        } else {
            RowStatus::Idle
        }
    }

    fn column_at(&self, tick: u64, song: &Song) -> usize {
        let section = self.config.section_ticks(self.clock.grid());
        if section == 0 || song.columns == 0 {
            return 0;
        }
        ((tick / section) as usize) % song.columns
    }

    fn desired_slots(&self, song: &Song, session: &RecordingSession) -> HashMap<SlotKey, Desired> {
        let mut desired = HashMap::new();
        let span = song.span_ticks(self.clock.grid(), self.config.section_measures);

        for row in &song.rows {
            let velocity = row.velocity;

            if let Some(track_id) = &row.performance_track {
                let Some(track) = song.performance_track(track_id) else {
                    log::debug!("Row '{}' points at missing performance track '{}'", row.id, track_id);
                    continue;
                };
                if let Some(want) = self.desired_performance(track, session, velocity, span) {
                    desired.insert(
                        SlotKey::Performance {
                            row: row.id.clone(),
                            track: track.id.clone(),
                        },
                        want,
                    );
                }
                continue;
            }

            let Some(group) = row.slot(self.active_column).and_then(|id| song.group(id)) else {
                continue;
            };
            for track in &group.tracks {
                if let Some(want) = self.desired_pattern(track, &song.harmony, velocity) {
                    desired.insert(
                        SlotKey::Track {
                            row: row.id.clone(),
                            group: group.id.clone(),
                            track: track.id.clone(),
                        },
                        want,
                    );
                }
            }
        }
        desired
    }

    fn desired_pattern(
        &self,
        track: &GroupTrack,
        harmony: &HarmonyContext,
        velocity: f32,
    ) -> Option<Desired> {
        let pattern = track.pattern.as_ref()?;
        let source = track.source.as_ref()?;
        let Some(trigger) = self.registry.resolve(source) else {
            log::debug!("No trigger for track '{}', leaving it silent", track.id);
            return None;
        };

        let harmonic = source.class == InstrumentClass::Harmonic;
        let mut hasher = DefaultHasher::new();
        pattern.modifier_fingerprint().hash(&mut hasher);
        self.registry.resolution_id(source).hash(&mut hasher);
        harmonic.hash(&mut hasher);
        source.character.hash(&mut hasher);

        Some(Desired::Pattern {
            pattern: pattern.clone(),
            trigger,
            harmony: harmonic.then(|| harmony.clone()),
            character: source.character.clone(),
            velocity,
            fingerprint: hasher.finish(),
        })
    }

    fn desired_performance(
        &self,
        track: &PerformanceTrack,
        session: &RecordingSession,
        velocity: f32,
        span: u64,
    ) -> Option<Desired> {
        let source = track.source.as_ref()?;
        let Some(trigger) = self.registry.resolve(source) else {
            log::debug!("No trigger for performance track '{}', leaving it silent", track.id);
            return None;
        };

        // Persisted notes plus live previews not yet persisted
        let mut notes = track.notes.clone();
        if session.target() == Some(track.id.as_str()) {
            notes.extend(
                session
                    .ghost_notes()
                    .iter()
                    .filter(|ghost| !track.contains_note(ghost.id))
                    .cloned(),
            );
        }

        let mut hasher = DefaultHasher::new();
        span.hash(&mut hasher);
        self.registry.resolution_id(source).hash(&mut hasher);
        source.character.hash(&mut hasher);

        Some(Desired::Performance {
            notes,
            trigger,
            character: source.character.clone(),
            velocity,
            span,
            fingerprint: hasher.finish(),
        })
    }

    fn subscribe(&mut self, key: SlotKey, want: Desired, catch_up: bool) {
        let predicate = self.predicate(&key);
        let (player, fingerprint): (Option<TrackPlayer>, u64) = match want {
            Desired::Pattern {
                pattern,
                trigger,
                harmony,
                character,
                velocity,
                fingerprint,
            } => {
                let player = match pattern.timing_mode {
                    TimingMode::Sync => {
                        let mut player = StepPlayer::new(Arc::new(pattern), trigger, predicate)
                            .with_velocity_scale(velocity)
                            .with_harmony(harmony)
                            .with_character(character);
                        if let Some(seed) = self.config.humanize_seed {
                            player = player.with_humanize_seed(seed ^ slot_seed(&key));
                        }
                        Some(TrackPlayer::Step(player))
                    }
                    TimingMode::Free => FreePlayer::for_pattern(Arc::new(pattern), trigger, predicate)
                        .map(|p| TrackPlayer::Free(p.with_velocity_scale(velocity).with_character(character))),
                };
                (player, fingerprint)
            }
            Desired::Performance {
                notes,
                trigger,
                character,
                velocity,
                span,
                fingerprint,
            } => {
                let player = FreePlayer::for_performance(&notes, self.clock.grid(), span, trigger, predicate)
                    .map(|p| TrackPlayer::Free(p.with_velocity_scale(velocity).with_character(character)));
                (player, fingerprint)
            }
        };

        let Some(player) = player else {
            log::debug!("Nothing to schedule for {:?}", key);
            return;
        };

        let subscription = match player {
            TrackPlayer::Step(player) => player.subscribe(&mut self.clock),
            TrackPlayer::Free(player) => {
                if catch_up {
                    player.catch_up(&self.clock);
                }
                player.subscribe(&mut self.clock)
            }
        };
        self.slots.insert(
            key,
            ActiveSlot {
                subscription,
                fingerprint,
            },
        );
    }

    fn update_in_place(&mut self, key: &SlotKey, want: Desired) {
        let Some(subscription) = self.slots.get(key).map(|slot| slot.subscription) else {
            return;
        };
        let grid = *self.clock.grid();
        let Some(player) = self.clock.listener_mut(subscription) else {
            return;
        };

        match (player, want) {
            (
                TrackPlayer::Step(player),
                Desired::Pattern {
                    pattern,
                    trigger,
                    harmony,
                    velocity,
                    ..
                },
            ) => {
                player.set_pattern(Arc::new(pattern));
                player.set_trigger(trigger);
                player.set_velocity_scale(velocity);
                player.set_harmony(harmony);
            }
            (
                TrackPlayer::Free(player),
                Desired::Pattern {
                    pattern,
                    trigger,
                    velocity,
                    ..
                },
            ) => {
                player.set_pattern(Arc::new(pattern));
                player.set_trigger(trigger);
                player.set_velocity_scale(velocity);
            }
            (
                TrackPlayer::Free(player),
                Desired::Performance {
                    notes,
                    trigger,
                    velocity,
                    ..
                },
            ) => {
                player.set_events(&performance_events(&notes, &grid));
                player.set_trigger(trigger);
                player.set_velocity_scale(velocity);
            }
            (TrackPlayer::Step(_), Desired::Performance { .. }) => {}
        }
    }

    fn predicate(&self, key: &SlotKey) -> ActivityPredicate {
        let mix = Arc::clone(&self.mix);
        let row = key.row().to_string();
        let track = match key {
            SlotKey::Track { group, track, .. } => Some((group.clone(), track.clone())),
            SlotKey::Performance { .. } => None,
        };
        Arc::new(move || {
            mix.read()
                .map(|mix| mix.is_audible(&row, track.as_ref()))
                .unwrap_or(false)
        })
    }

    fn dispose(&mut self, key: &SlotKey) {
        if let Some(slot) = self.slots.remove(key) {
            self.clock.unsubscribe(slot.subscription);
        }
    }

    fn dispose_all(&mut self) {
        self.slots.clear();
        self.clock.clear();
    }
}

/// Row index then track index, so firing order follows the arrangement
fn slot_order(song: &Song, key: &SlotKey) -> (usize, usize, String) {
    let row_index = song
        .rows
        .iter()
        .position(|r| r.id == key.row())
        .unwrap_or(usize::MAX);
    match key {
        SlotKey::Track { group, track, .. } => {
            let track_index = song
                .group(group)
                .and_then(|g| g.tracks.iter().position(|t| &t.id == track))
                .unwrap_or(usize::MAX);
            (row_index, track_index, track.clone())
        }
        SlotKey::Performance { track, .. } => (row_index, 0, track.clone()),
    }
}

fn slot_seed(key: &SlotKey) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}
