// Clock - The single cooperative timeline driving every recurring callback
// Subscriptions fire in registration order within a tick, monotonic across ticks

use crate::sequencer::timeline::{TimeGrid, Tempo};

/// Handle returned by `Clock::subscribe_repeating`
pub type SubscriptionId = u64;

/// What a listener sees when its subscription fires
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    /// Tick the callback is scheduled at
    pub tick: u64,
    /// Scheduled time in seconds
    pub time: f64,
    /// Number of times this subscription fired before
    pub iteration: u64,
    /// Subscription interval in ticks
    pub interval: u64,
}

/// A recurring callback owned by the clock
pub trait ClockListener {
    fn on_tick(&mut self, ctx: &TickContext, grid: &TimeGrid);
}

/// Read access to the audio clock, used by live capture
pub trait TransportPosition {
    /// Current position in ticks
    fn current_ticks(&self) -> u64;

    /// Fractional tick position at a clock time, None if unknown
    fn ticks_at(&self, time: f64) -> Option<f64>;
}

struct Subscription<L> {
    id: SubscriptionId,
    interval: u64,
    next_tick: u64,
    iteration: u64,
    listener: L,
}

/// Shared clock
///
/// Listeners are owned by the clock, so unsubscribing drops them before
/// the next tick can reach them.
pub struct Clock<L> {
    grid: TimeGrid,
    position_ticks: u64,
    /// First tick whose callbacks have not run yet
    next_unfired: u64,
    /// Clock time of tick 0 in seconds
    origin_seconds: f64,
    subscriptions: Vec<Subscription<L>>,
    next_id: SubscriptionId,
}

impl<L: ClockListener> Clock<L> {
    pub fn new(grid: TimeGrid) -> Self {
        Self {
            grid,
            position_ticks: 0,
            next_unfired: 0,
            origin_seconds: 0.0,
            subscriptions: Vec::new(),
            next_id: 1,
        }
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    /// Change tempo, keeping the current position's clock time fixed
    pub fn set_tempo(&mut self, tempo: Tempo) {
        let now = self.seconds_at(self.position_ticks);
        self.grid.set_tempo(tempo);
        self.origin_seconds = now - self.grid.ticks_to_seconds(self.position_ticks);
    }

    pub fn position_ticks(&self) -> u64 {
        self.position_ticks
    }

    /// First tick not yet processed by `advance_to`
    pub fn next_unfired(&self) -> u64 {
        self.next_unfired
    }

    /// Clock time of a tick
    pub fn seconds_at(&self, tick: u64) -> f64 {
        self.origin_seconds + self.grid.ticks_to_seconds(tick)
    }

    /// Subscribe a listener firing every `interval` ticks
    ///
    /// The first firing is the first multiple of `interval` that has not
    /// been processed yet, so loops stay aligned to the transport.
    pub fn subscribe_repeating(&mut self, interval: u64, listener: L) -> SubscriptionId {
        let interval = interval.max(1);
        let next_tick = self.next_unfired.div_ceil(interval) * interval;
        let id = self.next_id;
        self.next_id += 1;

        log::trace!(
            "Clock subscription {} every {} ticks from tick {}",
            id,
            interval,
            next_tick
        );
        self.subscriptions.push(Subscription {
            id,
            interval,
            next_tick,
            iteration: 0,
            listener,
        });
        id
    }

    /// Remove a subscription, returning its listener
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> Option<L> {
        let index = self.subscriptions.iter().position(|s| s.id == id)?;
        log::trace!("Clock subscription {} removed", id);
        Some(self.subscriptions.remove(index).listener)
    }

    /// Remove every subscription
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.subscriptions.iter().any(|s| s.id == id)
    }

    pub fn listener(&self, id: SubscriptionId) -> Option<&L> {
        self.subscriptions
            .iter()
            .find(|s| s.id == id)
            .map(|s| &s.listener)
    }

    /// Mutate a listener in place without touching its schedule
    pub fn listener_mut(&mut self, id: SubscriptionId) -> Option<&mut L> {
        self.subscriptions
            .iter_mut()
            .find(|s| s.id == id)
            .map(|s| &mut s.listener)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Fire every callback due up to and including `target_tick`
    pub fn advance_to(&mut self, target_tick: u64) {
        while let Some(due) = self
            .subscriptions
            .iter()
            .map(|s| s.next_tick)
            .filter(|&tick| tick <= target_tick)
            .min()
        {
            self.position_ticks = self.position_ticks.max(due);
            let time = self.origin_seconds + self.grid.ticks_to_seconds(due);

            for subscription in self.subscriptions.iter_mut() {
                if subscription.next_tick != due {
                    continue;
                }
                let ctx = TickContext {
                    tick: due,
                    time,
                    iteration: subscription.iteration,
                    interval: subscription.interval,
                };
                subscription.listener.on_tick(&ctx, &self.grid);
                subscription.next_tick += subscription.interval;
                subscription.iteration += 1;
            }
        }
        self.position_ticks = self.position_ticks.max(target_tick);
        self.next_unfired = self.next_unfired.max(target_tick + 1);
    }

    pub fn advance_by(&mut self, ticks: u64) {
        self.advance_to(self.position_ticks + ticks);
    }

    /// Advance to a clock time in seconds
    pub fn advance_to_seconds(&mut self, seconds: f64) {
        if let Some(ticks) = self.ticks_at(seconds) {
            self.advance_to(ticks.floor() as u64);
        }
    }

    /// Jump to a position without firing anything in between
    pub fn seek(&mut self, tick: u64) {
        let now = self.seconds_at(self.position_ticks);
        self.position_ticks = tick;
        self.next_unfired = tick;
        self.origin_seconds = now - self.grid.ticks_to_seconds(tick);
        for subscription in self.subscriptions.iter_mut() {
            subscription.next_tick = tick.div_ceil(subscription.interval) * subscription.interval;
        }
    }
}

impl<L: ClockListener> TransportPosition for Clock<L> {
    fn current_ticks(&self) -> u64 {
        self.position_ticks
    }

    fn ticks_at(&self, time: f64) -> Option<f64> {
        let ticks = self.grid.seconds_to_ticks(time - self.origin_seconds);
        (ticks.is_finite() && ticks >= 0.0).then_some(ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type FireLog = Arc<Mutex<Vec<(&'static str, u64)>>>;

    struct Recorder {
        name: &'static str,
        log: FireLog,
    }

    impl ClockListener for Recorder {
        fn on_tick(&mut self, ctx: &TickContext, _grid: &TimeGrid) {
            self.log.lock().unwrap().push((self.name, ctx.tick));
        }
    }

    fn recorder(name: &'static str, log: &FireLog) -> Recorder {
        Recorder {
            name,
            log: Arc::clone(log),
        }
    }

    #[test]
    fn test_registration_order_within_tick() {
        let log = FireLog::default();
        let mut clock = Clock::new(TimeGrid::default());
        clock.subscribe_repeating(48, recorder("a", &log));
        clock.subscribe_repeating(96, recorder("b", &log));
        clock.subscribe_repeating(48, recorder("c", &log));

        clock.advance_to(96);

        let fired = log.lock().unwrap().clone();
        assert_eq!(
            fired,
            vec![
                ("a", 0),
                ("b", 0),
                ("c", 0),
                ("a", 48),
                ("c", 48),
                ("a", 96),
                ("b", 96),
                ("c", 96),
            ]
        );
    }

    #[test]
    fn test_unsubscribe_stops_firing() {
        let log = FireLog::default();
        let mut clock = Clock::new(TimeGrid::default());
        let a = clock.subscribe_repeating(48, recorder("a", &log));
        clock.subscribe_repeating(48, recorder("b", &log));

        clock.advance_to(48);
        assert!(clock.unsubscribe(a).is_some());
        assert!(!clock.is_subscribed(a));
        assert!(clock.unsubscribe(a).is_none());

        clock.advance_to(480);
        let fired = log.lock().unwrap().clone();
        assert!(fired.iter().filter(|(name, _)| *name == "a").all(|&(_, t)| t <= 48));
        assert_eq!(fired.iter().filter(|(name, _)| *name == "b").count(), 11);
    }

    #[test]
    fn test_subscription_aligns_to_interval() {
        let log = FireLog::default();
        let mut clock = Clock::new(TimeGrid::default());
        clock.advance_to(100);
        clock.subscribe_repeating(48, recorder("a", &log));
        clock.advance_to(150);

        assert_eq!(log.lock().unwrap().clone(), vec![("a", 144)]);
        assert_eq!(clock.position_ticks(), 150);
    }

    #[test]
    fn test_time_conversion() {
        let clock: Clock<Recorder> = Clock::new(TimeGrid::default());
        // 120 BPM, 192 ticks per quarter: 384 ticks per second
        assert!((clock.seconds_at(384) - 1.0).abs() < 1e-12);
        assert!((clock.ticks_at(0.5).unwrap() - 192.0).abs() < 1e-9);
        assert_eq!(clock.ticks_at(-1.0), None);
        assert_eq!(clock.ticks_at(f64::NAN), None);
    }

    #[test]
    fn test_tempo_change_keeps_current_time() {
        let mut clock: Clock<Recorder> = Clock::new(TimeGrid::default());
        clock.advance_to(384);
        clock.set_tempo(Tempo::new(60.0));

        assert!((clock.seconds_at(384) - 1.0).abs() < 1e-12);
        // One more second is 192 ticks at 60 BPM
        assert!((clock.seconds_at(576) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_listener_mut_keeps_schedule() {
        let log = FireLog::default();
        let other = FireLog::default();
        let mut clock = Clock::new(TimeGrid::default());
        let id = clock.subscribe_repeating(48, recorder("a", &log));
        clock.advance_to(0);

        clock.listener_mut(id).unwrap().log = Arc::clone(&other);
        clock.advance_to(48);

        assert_eq!(log.lock().unwrap().len(), 1);
        assert_eq!(other.lock().unwrap().clone(), vec![("a", 48)]);
    }

    #[test]
    fn test_subscription_skips_processed_tick() {
        let log = FireLog::default();
        let mut clock = Clock::new(TimeGrid::default());
        clock.subscribe_repeating(48, recorder("a", &log));
        clock.advance_to(96);
        clock.subscribe_repeating(48, recorder("b", &log));
        clock.advance_to(144);

        let fired = log.lock().unwrap().clone();
        assert_eq!(fired.iter().filter(|(name, _)| *name == "b").count(), 1);
        assert_eq!(fired.last(), Some(&("b", 144)));
    }

    #[test]
    fn test_seek_realigns() {
        let log = FireLog::default();
        let mut clock = Clock::new(TimeGrid::default());
        clock.subscribe_repeating(96, recorder("a", &log));
        clock.seek(1000);
        clock.advance_to(1100);

        assert_eq!(log.lock().unwrap().clone(), vec![("a", 1056)]);
    }
}
