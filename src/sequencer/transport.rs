// Transport - Play state of the arrangement
// `is_started` is the flag players are (re)subscribed against

/// Transport state (play/stop/record)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Recording,
    Paused,
}

impl TransportState {
    /// Playing or Recording
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing | TransportState::Recording)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, TransportState::Recording)
    }

    /// Stopped or Paused
    pub fn is_stopped(&self) -> bool {
        matches!(self, TransportState::Stopped | TransportState::Paused)
    }
}

/// Transport controller
///
/// The clock owns musical time; the transport only mirrors the playhead so a
/// paused arrangement resumes where it left off.
#[derive(Debug, Clone, Default)]
pub struct Transport {
    state: TransportState,
    position_ticks: u64,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Players hold clock subscriptions only while started
    pub fn is_started(&self) -> bool {
        self.state.is_playing()
    }

    pub fn position_ticks(&self) -> u64 {
        self.position_ticks
    }

    pub fn set_position_ticks(&mut self, ticks: u64) {
        self.position_ticks = ticks;
    }

    pub fn play(&mut self) {
        self.state = TransportState::Playing;
    }

    pub fn record(&mut self) {
        self.state = TransportState::Recording;
    }

    /// Pause, keeping the playhead
    pub fn pause(&mut self) {
        if self.state.is_playing() {
            self.state = TransportState::Paused;
        }
    }

    /// Stop and rewind to tick 0
    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        self.position_ticks = 0;
    }
}
