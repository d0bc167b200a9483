// Free Player - Event-list scheduler for free-timing patterns and performance tracks
// One recurring callback per loop; every event is fired relative to the loop start

use crate::sequencer::clock::{Clock, ClockListener, SubscriptionId, TickContext};
use crate::sequencer::note::PerformanceNote;
use crate::sequencer::pattern::{NoteEvent, Pattern, TimingMode};
use crate::sequencer::timeline::TimeGrid;
use crate::sequencer::trigger::{ActivityPredicate, Trigger, TriggerCall, TriggerPayload};
use std::sync::Arc;

/// Events sorted by start tick, ties kept in their original order
pub fn sorted_events(events: &[NoteEvent]) -> Vec<NoteEvent> {
    let mut sorted = events.to_vec();
    sorted.sort_by_key(|e| e.time);
    sorted
}

/// Loop length in ticks: explicit if positive, else the end of the last event
pub fn loop_length(sorted: &[NoteEvent], explicit: Option<u64>) -> u64 {
    match explicit {
        Some(length) if length > 0 => length,
        _ => sorted.last().map_or(0, |last| last.time.saturating_add(last.duration)),
    }
}

/// Convert recorded notes to tick events
pub fn performance_events(notes: &[PerformanceNote], grid: &TimeGrid) -> Vec<NoteEvent> {
    notes
        .iter()
        .map(|note| NoteEvent {
            time: note.start_ticks(grid),
            note: note.note.clone(),
            duration: note.duration_ticks(grid),
            velocity: note.velocity,
        })
        .collect()
}

/// Scheduler for one event list
pub struct FreePlayer {
    events: Vec<NoteEvent>,
    loop_length: u64,
    pattern: Option<Arc<Pattern>>,
    trigger: Arc<dyn Trigger>,
    active: ActivityPredicate,
    velocity_scale: f32,
    character_id: Option<String>,
}

impl FreePlayer {
    /// Player for a free-timing pattern
    ///
    /// None when the pattern is not free-timed, has no events, or its loop
    /// length is not positive: such a pattern never subscribes.
    pub fn for_pattern(
        pattern: Arc<Pattern>,
        trigger: Arc<dyn Trigger>,
        active: ActivityPredicate,
    ) -> Option<Self> {
        if pattern.timing_mode != TimingMode::Free || pattern.note_events.is_empty() {
            return None;
        }
        let events = sorted_events(&pattern.note_events);
        let loop_length = loop_length(&events, pattern.note_loop_length);
        if loop_length == 0 {
            return None;
        }

        Some(Self {
            events,
            loop_length,
            pattern: Some(pattern),
            trigger,
            active,
            velocity_scale: 1.0,
            character_id: None,
        })
    }

    /// Player for a performance track spanning `span_ticks`
    pub fn for_performance(
        notes: &[PerformanceNote],
        grid: &TimeGrid,
        span_ticks: u64,
        trigger: Arc<dyn Trigger>,
        active: ActivityPredicate,
    ) -> Option<Self> {
        let events = sorted_events(&performance_events(notes, grid));
        if events.is_empty() || span_ticks == 0 {
            return None;
        }

        Some(Self {
            events,
            loop_length: span_ticks,
            pattern: None,
            trigger,
            active,
            velocity_scale: 1.0,
            character_id: None,
        })
    }

    pub fn with_velocity_scale(mut self, scale: f32) -> Self {
        self.set_velocity_scale(scale);
        self
    }

    pub fn with_character(mut self, character_id: Option<String>) -> Self {
        self.character_id = character_id;
        self
    }

    /// Hand the player to a clock, firing once per loop
    pub fn subscribe<L>(self, clock: &mut Clock<L>) -> SubscriptionId
    where
        L: ClockListener + From<FreePlayer>,
    {
        let interval = self.loop_length;
        clock.subscribe_repeating(interval, L::from(self))
    }

    pub fn loop_length(&self) -> u64 {
        self.loop_length
    }

    pub fn events(&self) -> &[NoteEvent] {
        &self.events
    }

    /// Replace events in place; the loop length is part of the subscription
    /// and is left untouched
    pub fn set_events(&mut self, events: &[NoteEvent]) {
        self.events = sorted_events(events);
    }

    pub fn set_pattern(&mut self, pattern: Arc<Pattern>) {
        self.events = sorted_events(&pattern.note_events);
        self.pattern = Some(pattern);
    }

    pub fn set_trigger(&mut self, trigger: Arc<dyn Trigger>) {
        self.trigger = trigger;
    }

    pub fn set_velocity_scale(&mut self, scale: f32) {
        self.velocity_scale = scale.clamp(0.0, 1.0);
    }

    /// Calls for one loop iteration starting at `loop_start`
    pub fn loop_calls(&self, loop_start: f64, grid: &TimeGrid) -> Vec<TriggerCall> {
        self.calls_from(loop_start, grid, 0)
    }

    /// Fire the remainder of the loop the clock is already inside
    ///
    /// A new subscription first fires at the next aligned loop start. Events
    /// of the current loop at or after the first unprocessed tick are
    /// triggered here instead.
    pub fn catch_up<L: ClockListener>(&self, clock: &Clock<L>) {
        let from = clock.next_unfired();
        let offset = from % self.loop_length;
        if offset == 0 {
            return;
        }
        let loop_start = clock.seconds_at(from - offset);
        for call in self.calls_from(loop_start, clock.grid(), offset) {
            self.trigger.trigger(&call);
        }
    }

    fn calls_from(&self, loop_start: f64, grid: &TimeGrid, min_tick: u64) -> Vec<TriggerCall> {
        let (velocity_factor, pitch_offset) = self
            .pattern
            .as_ref()
            .map_or((1.0, None), |p| (p.velocity_factor, Some(p.pitch_offset)));

        self.events
            .iter()
            .filter(|event| event.time >= min_tick && (self.active)())
            .map(|event| TriggerCall {
                time: loop_start + grid.ticks_to_seconds(event.time),
                velocity: Some((event.velocity * velocity_factor * self.velocity_scale).clamp(0.0, 1.0)),
                pitch: pitch_offset,
                note: Some(event.note.clone()),
                sustain: Some(grid.ticks_to_seconds(event.duration)),
                payload: self.pattern.as_ref().map(|p| TriggerPayload::Pattern(Arc::clone(p))),
                character_id: self.character_id.clone(),
            })
            .collect()
    }
}

impl ClockListener for FreePlayer {
    fn on_tick(&mut self, ctx: &TickContext, grid: &TimeGrid) {
        for call in self.loop_calls(ctx.time, grid) {
            self.trigger.trigger(&call);
        }
    }
}
