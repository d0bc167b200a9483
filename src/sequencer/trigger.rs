// Trigger - Interface to the instrument/voice layer
// The core only decides when and with what parameters a trigger is called

use crate::sequencer::harmony::ResolvedChord;
use crate::sequencer::pattern::Pattern;
use crate::song::{InstrumentClass, InstrumentSource};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Pattern data attached to a trigger call
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerPayload {
    /// The pattern as stored
    Pattern(Arc<Pattern>),
    /// The pattern plus the chord resolved for this step
    Chord {
        pattern: Arc<Pattern>,
        chord: ResolvedChord,
    },
}

/// Parameters of a single trigger call
/// Every field but `time` may be omitted; instruments must tolerate any subset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TriggerCall {
    /// Scheduled time in seconds on the shared clock
    pub time: f64,
    pub velocity: Option<f32>,
    pub pitch: Option<f32>,
    pub note: Option<String>,
    /// Release in seconds
    pub sustain: Option<f64>,
    pub payload: Option<TriggerPayload>,
    pub character_id: Option<String>,
}

impl TriggerCall {
    pub fn at(time: f64) -> Self {
        Self {
            time,
            ..Self::default()
        }
    }
}

/// A voice trigger supplied by the instrument layer
///
/// Implementations must not block: they are invoked from inside the shared
/// clock's callbacks.
pub trait Trigger: Send + Sync {
    fn trigger(&self, call: &TriggerCall);
}

impl<F> Trigger for F
where
    F: Fn(&TriggerCall) + Send + Sync,
{
    fn trigger(&self, call: &TriggerCall) {
        self(call)
    }
}

/// Decides per call whether a track is currently audible
pub type ActivityPredicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Predicate for players with no mute/solo context
pub fn always_active() -> ActivityPredicate {
    Arc::new(|| true)
}

/// Trigger that records every call, for previews, tests and the demo binary
#[derive(Debug, Default)]
pub struct TriggerLog {
    calls: Mutex<Vec<TriggerCall>>,
}

impl TriggerLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of all recorded calls
    pub fn calls(&self) -> Vec<TriggerCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }
}

impl Trigger for TriggerLog {
    fn trigger(&self, call: &TriggerCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.clone());
        }
    }
}

/// Lookup key for a registered trigger
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstrumentKey {
    pub pack: String,
    pub instrument: String,
    pub character: Option<String>,
}

impl InstrumentKey {
    pub fn new(pack: &str, instrument: &str, character: Option<&str>) -> Self {
        Self {
            pack: pack.to_string(),
            instrument: instrument.to_string(),
            character: character.map(str::to_string),
        }
    }

    pub fn from_source(source: &InstrumentSource) -> Self {
        Self {
            pack: source.pack.clone(),
            instrument: source.instrument.clone(),
            character: source.character.clone(),
        }
    }

    fn without_character(&self) -> Self {
        Self {
            character: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.character {
            Some(character) => write!(f, "{}/{}/{}", self.pack, self.instrument, character),
            None => write!(f, "{}/{}", self.pack, self.instrument),
        }
    }
}

/// A short-lived voice created per note by transient instruments
pub trait TransientVoice: Send {
    fn start(&mut self, call: &TriggerCall);
    fn stop(&mut self);
}

/// Builds transient voices from a source declaration
pub trait VoiceFactory: Send + Sync {
    /// Returns None when the source lacks what the voice needs
    fn create(&self, source: &InstrumentSource) -> Option<Box<dyn TransientVoice>>;
}

/// Live transient voices awaiting disposal
#[derive(Default)]
pub struct VoicePool {
    voices: Vec<(f64, Box<dyn TransientVoice>)>,
}

impl VoicePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, dispose_at: f64, voice: Box<dyn TransientVoice>) {
        self.voices.push((dispose_at, voice));
    }

    /// Stop and drop every voice whose disposal time has passed
    pub fn collect(&mut self, now: f64) {
        self.voices.retain_mut(|(dispose_at, voice)| {
            if *dispose_at <= now {
                voice.stop();
                false
            } else {
                true
            }
        });
    }

    /// Stop everything (transport stop)
    pub fn stop_all(&mut self) {
        for (_, voice) in self.voices.iter_mut() {
            voice.stop();
        }
        self.voices.clear();
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}

/// Trigger for instruments that synthesize their own voice per note
pub struct TransientTrigger {
    source: InstrumentSource,
    factory: Arc<dyn VoiceFactory>,
    pool: Arc<Mutex<VoicePool>>,
    release_tail: f64,
}

impl TransientTrigger {
    pub fn new(
        source: InstrumentSource,
        factory: Arc<dyn VoiceFactory>,
        pool: Arc<Mutex<VoicePool>>,
        release_tail: f64,
    ) -> Self {
        Self {
            source,
            factory,
            pool,
            release_tail: release_tail.max(0.0),
        }
    }
}

impl Trigger for TransientTrigger {
    fn trigger(&self, call: &TriggerCall) {
        let Some(mut voice) = self.factory.create(&self.source) else {
            log::debug!(
                "No transient voice for {}, skipping note",
                InstrumentKey::from_source(&self.source)
            );
            return;
        };

        voice.start(call);
        let dispose_at = call.time + call.sustain.unwrap_or(0.0).max(0.0) + self.release_tail;

        // A poisoned pool only loses bookkeeping; the voice still sounded
        if let Ok(mut pool) = self.pool.lock() {
            pool.collect(call.time);
            pool.push(dispose_at, voice);
        }
    }
}

/// Triggers registered by the instrument layer
#[derive(Default, Clone)]
pub struct TriggerRegistry {
    triggers: HashMap<InstrumentKey, Arc<dyn Trigger>>,
    voice_factory: Option<Arc<dyn VoiceFactory>>,
    voice_pool: Arc<Mutex<VoicePool>>,
    release_tail: f64,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: InstrumentKey, trigger: Arc<dyn Trigger>) {
        self.triggers.insert(key, trigger);
    }

    pub fn unregister(&mut self, key: &InstrumentKey) -> Option<Arc<dyn Trigger>> {
        self.triggers.remove(key)
    }

    /// Install the factory used by transient instruments
    pub fn set_voice_factory(&mut self, factory: Arc<dyn VoiceFactory>) {
        self.voice_factory = Some(factory);
    }

    /// Seconds a transient voice outlives its sustain
    pub fn set_release_tail(&mut self, seconds: f64) {
        self.release_tail = seconds.max(0.0);
    }

    pub fn voice_pool(&self) -> Arc<Mutex<VoicePool>> {
        Arc::clone(&self.voice_pool)
    }

    /// Resolve a source to a trigger
    ///
    /// Transient instruments bypass the map. Otherwise the exact key is
    /// tried first, then the key without character. None means "nothing
    /// assigned yet" and the track stays silent.
    pub fn resolve(&self, source: &InstrumentSource) -> Option<Arc<dyn Trigger>> {
        if source.class == InstrumentClass::Transient {
            let factory = self.voice_factory.as_ref()?;
            return Some(Arc::new(TransientTrigger::new(
                source.clone(),
                Arc::clone(factory),
                Arc::clone(&self.voice_pool),
                self.release_tail,
            )));
        }

        let key = InstrumentKey::from_source(source);
        self.triggers
            .get(&key)
            .or_else(|| self.triggers.get(&key.without_character()))
            .cloned()
    }

    /// Stable identity of whatever `resolve` would return
    pub fn resolution_id(&self, source: &InstrumentSource) -> Option<usize> {
        if source.class == InstrumentClass::Transient {
            return self
                .voice_factory
                .as_ref()
                .map(|f| Arc::as_ptr(f) as *const () as usize);
        }
        let key = InstrumentKey::from_source(source);
        self.triggers
            .get(&key)
            .or_else(|| self.triggers.get(&key.without_character()))
            .map(|t| Arc::as_ptr(t) as *const () as usize)
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}
