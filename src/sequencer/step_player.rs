// Step Player - Per-track 16th-note scheduler for sync patterns
// Reads a pattern on every sixteenth tick and turns active steps into trigger calls

use crate::sequencer::clock::{Clock, ClockListener, SubscriptionId, TickContext};
use crate::sequencer::harmony::{HarmonyContext, resolve_chord};
use crate::sequencer::pattern::Pattern;
use crate::sequencer::timeline::TimeGrid;
use crate::sequencer::trigger::{ActivityPredicate, Trigger, TriggerCall, TriggerPayload};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Degree used by harmonic instruments when the pattern names none
const DEFAULT_DEGREE: i32 = 1;

/// Number of steps a note on `index` may hold: itself plus the inactive steps
/// up to the next active one, wrapping around the pattern
pub fn hold_steps(pattern: &Pattern, index: usize) -> usize {
    let step_count = pattern.step_count();
    let inactive = (1..step_count)
        .take_while(|offset| !pattern.is_step_active(index + offset))
        .count();
    inactive + 1
}

/// Scheduler for one sync pattern on one track
pub struct StepPlayer {
    pattern: Arc<Pattern>,
    trigger: Arc<dyn Trigger>,
    active: ActivityPredicate,
    /// Row-level velocity multiplier
    velocity_scale: f32,
    /// Set for harmonic instruments
    harmony: Option<HarmonyContext>,
    character_id: Option<String>,
    rng: StdRng,
}

impl StepPlayer {
    pub fn new(pattern: Arc<Pattern>, trigger: Arc<dyn Trigger>, active: ActivityPredicate) -> Self {
        Self {
            pattern,
            trigger,
            active,
            velocity_scale: 1.0,
            harmony: None,
            character_id: None,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_velocity_scale(mut self, scale: f32) -> Self {
        self.set_velocity_scale(scale);
        self
    }

    pub fn with_harmony(mut self, harmony: Option<HarmonyContext>) -> Self {
        self.harmony = harmony;
        self
    }

    pub fn with_character(mut self, character_id: Option<String>) -> Self {
        self.character_id = character_id;
        self
    }

    /// Deterministic humanize jitter
    pub fn with_humanize_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Ticks between firings
    pub fn interval(grid: &TimeGrid) -> u64 {
        grid.ticks_per_sixteenth()
    }

    /// Hand the player to a clock, firing every sixteenth
    pub fn subscribe<L>(self, clock: &mut Clock<L>) -> SubscriptionId
    where
        L: ClockListener + From<StepPlayer>,
    {
        let interval = Self::interval(clock.grid());
        clock.subscribe_repeating(interval, L::from(self))
    }

    pub fn pattern(&self) -> &Arc<Pattern> {
        &self.pattern
    }

    /// Swap pattern data in place; the next tick reads the new steps
    pub fn set_pattern(&mut self, pattern: Arc<Pattern>) {
        self.pattern = pattern;
    }

    pub fn set_trigger(&mut self, trigger: Arc<dyn Trigger>) {
        self.trigger = trigger;
    }

    pub fn set_velocity_scale(&mut self, scale: f32) {
        self.velocity_scale = scale.clamp(0.0, 1.0);
    }

    pub fn set_harmony(&mut self, harmony: Option<HarmonyContext>) {
        self.harmony = harmony;
    }

    /// Compute the trigger call for a step without firing it
    ///
    /// Returns None for inactive steps or when the activity predicate fails.
    pub fn step_call(&self, step: usize, step_time: f64, grid: &TimeGrid) -> Option<TriggerCall> {
        let pattern = &self.pattern;
        let step_count = pattern.step_count();
        if step_count == 0 || !pattern.is_step_active(step) || !(self.active)() {
            return None;
        }

        let index = step % step_count;
        let step_seconds = grid.sixteenth_seconds();

        let velocity = (pattern.step_velocity(index, step_count)
            * pattern.velocity_factor
            * self.velocity_scale)
            .clamp(0.0, 1.0);
        let pitch = pattern.step_pitch(index, step_count) + pattern.pitch_offset;

        let swing_delay = if index % 2 == 1 {
            pattern.swing.clamp(0.0, 1.0) as f64 * 0.5 * step_seconds
        } else {
            0.0
        };

        let hold = hold_steps(pattern, index) as f64 * step_seconds;
        let sustain = match pattern.sustain {
            Some(explicit) if explicit.is_finite() => explicit.clamp(0.0, hold),
            _ => hold,
        };

        let (note, payload) = match &self.harmony {
            Some(harmony) => {
                let degree = pattern
                    .step_degree(index, step_count)
                    .unwrap_or(DEFAULT_DEGREE);
                let chord = resolve_chord(degree, harmony);
                (
                    Some(chord.root.clone()),
                    TriggerPayload::Chord {
                        pattern: Arc::clone(pattern),
                        chord,
                    },
                )
            }
            None => (
                pattern.note.clone(),
                TriggerPayload::Pattern(Arc::clone(pattern)),
            ),
        };

        Some(TriggerCall {
            time: step_time + swing_delay,
            velocity: Some(velocity),
            pitch: Some(pitch),
            note,
            sustain: Some(sustain),
            payload: Some(payload),
            character_id: self.character_id.clone(),
        })
    }

    /// Random late offset of up to one 32nd note, scaled by humanize
    fn humanize_offset(&mut self, grid: &TimeGrid) -> f64 {
        let amount = self.pattern.humanize.clamp(0.0, 1.0) as f64;
        if amount <= 0.0 {
            return 0.0;
        }
        self.rng.gen_range(0.0..=1.0) * amount * grid.thirty_second_seconds()
    }
}

impl ClockListener for StepPlayer {
    fn on_tick(&mut self, ctx: &TickContext, grid: &TimeGrid) {
        let step = (ctx.tick / grid.ticks_per_sixteenth()) as usize;
        if let Some(mut call) = self.step_call(step, ctx.time, grid) {
            call.time += self.humanize_offset(grid);
            self.trigger.trigger(&call);
        }
    }
}
