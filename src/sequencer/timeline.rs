// Timeline - Musical time representation
// Handles conversion between ticks, notation strings, transport positions and seconds

use crate::error::TimeParseError;
use std::fmt;

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    pub const MIN_BPM: f64 = 20.0;
    pub const MAX_BPM: f64 = 999.0;

    /// Creates a new tempo
    /// BPM must be in range [20.0, 999.0]
    pub fn new(bpm: f64) -> Self {
        assert!(
            (Self::MIN_BPM..=Self::MAX_BPM).contains(&bpm),
            "BPM must be between 20 and 999"
        );
        Self { bpm }
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one quarter note in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(120.0)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

/// A time value as it arrives from pattern or song data
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeValue<'a> {
    /// Musical notation ("4n", "1m", "0:2:1", "0.250s", "96i")
    Notation(&'a str),
    /// Whole measures
    Measures(f64),
    /// Absent value, resolves to zero
    Missing,
}

impl<'a> From<&'a str> for TimeValue<'a> {
    fn from(value: &'a str) -> Self {
        TimeValue::Notation(value)
    }
}

impl<'a> From<&'a String> for TimeValue<'a> {
    fn from(value: &'a String) -> Self {
        TimeValue::Notation(value.as_str())
    }
}

impl From<f64> for TimeValue<'_> {
    fn from(value: f64) -> Self {
        TimeValue::Measures(value)
    }
}

impl From<u32> for TimeValue<'_> {
    fn from(value: u32) -> Self {
        TimeValue::Measures(value as f64)
    }
}

impl<'a> From<Option<&'a str>> for TimeValue<'a> {
    fn from(value: Option<&'a str>) -> Self {
        value.map_or(TimeValue::Missing, TimeValue::Notation)
    }
}

/// Tick grid configuration
///
/// A measure is always 16 sixteenth notes. Ticks are the only unit the
/// schedulers compare; every other representation converts through here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeGrid {
    ticks_per_quarter: u32,
    tempo: Tempo,
}

impl TimeGrid {
    /// Default PPQN (pulses per quarter note)
    pub const DEFAULT_TICKS_PER_QUARTER: u32 = 192;

    /// Sixteenth notes per measure
    pub const SIXTEENTHS_PER_MEASURE: u64 = 16;

    /// Subdivisions tried when naming a duration, largest first
    const NOTE_DIVISIONS: [u64; 6] = [1, 2, 4, 8, 16, 32];

    /// Creates a new grid
    /// `ticks_per_quarter` must be a positive multiple of 8 so a 32nd note is whole ticks
    pub fn new(ticks_per_quarter: u32, tempo: Tempo) -> Self {
        assert!(
            ticks_per_quarter > 0 && ticks_per_quarter % 8 == 0,
            "Ticks per quarter must be a positive multiple of 8"
        );
        Self {
            ticks_per_quarter,
            tempo,
        }
    }

    pub fn ticks_per_quarter(&self) -> u64 {
        self.ticks_per_quarter as u64
    }

    pub fn ticks_per_sixteenth(&self) -> u64 {
        self.ticks_per_quarter() / 4
    }

    pub fn ticks_per_thirty_second(&self) -> u64 {
        self.ticks_per_quarter() / 8
    }

    pub fn ticks_per_measure(&self) -> u64 {
        Self::SIXTEENTHS_PER_MEASURE * self.ticks_per_sixteenth()
    }

    pub fn tempo(&self) -> &Tempo {
        &self.tempo
    }

    pub fn set_tempo(&mut self, tempo: Tempo) {
        self.tempo = tempo;
    }

    /// Duration of one tick in seconds
    pub fn seconds_per_tick(&self) -> f64 {
        self.tempo.beat_duration_seconds() / self.ticks_per_quarter as f64
    }

    pub fn ticks_to_seconds(&self, ticks: u64) -> f64 {
        ticks as f64 * self.seconds_per_tick()
    }

    /// Convert seconds to fractional ticks (no rounding)
    pub fn seconds_to_ticks(&self, seconds: f64) -> f64 {
        seconds / self.seconds_per_tick()
    }

    pub fn sixteenth_seconds(&self) -> f64 {
        self.ticks_to_seconds(self.ticks_per_sixteenth())
    }

    pub fn thirty_second_seconds(&self) -> f64 {
        self.ticks_to_seconds(self.ticks_per_thirty_second())
    }

    /// Resolve any time value to ticks
    ///
    /// Numbers are whole measures. Unparsable notation is logged and resolves
    /// to 0 so playback continues with a zero-length fallback.
    pub fn to_ticks<'a>(&self, value: impl Into<TimeValue<'a>>) -> u64 {
        match value.into() {
            TimeValue::Missing => 0,
            TimeValue::Measures(measures) => {
                if measures.is_finite() && measures > 0.0 {
                    (measures * self.ticks_per_measure() as f64).round() as u64
                } else {
                    0
                }
            }
            TimeValue::Notation(text) => match self.parse_notation(text) {
                Ok(ticks) => ticks,
                Err(e) => {
                    log::warn!("Failed to parse time '{}': {}, using 0 ticks", text, e);
                    0
                }
            },
        }
    }

    /// Strict notation parser
    ///
    /// Accepts `Nm` (measures), `Nn` / `Nn.` / `Nt` (note value, dotted,
    /// triplet), `Ni` (raw ticks), `Ns` (seconds), `bars:beats:sixteenths`
    /// and bare numbers (measures).
    pub fn parse_notation(&self, text: &str) -> Result<u64, TimeParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TimeParseError::Empty);
        }

        let ticks = if text.contains(':') {
            self.parse_transport_position(text)?
        } else if let Some(value) = text.strip_suffix("n.") {
            self.note_value_ticks(text, value)? * 1.5
        } else if let Some(value) = text.strip_suffix('n') {
            self.note_value_ticks(text, value)?
        } else if let Some(value) = text.strip_suffix('t') {
            self.note_value_ticks(text, value)? * 2.0 / 3.0
        } else if let Some(value) = text.strip_suffix('m') {
            parse_number(text, value)? * self.ticks_per_measure() as f64
        } else if let Some(value) = text.strip_suffix('i') {
            parse_number(text, value)?
        } else if let Some(value) = text.strip_suffix('s') {
            self.seconds_to_ticks(parse_number(text, value)?)
        } else if text.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-') {
            parse_number(text, text)? * self.ticks_per_measure() as f64
        } else {
            return Err(TimeParseError::UnknownUnit(text.to_string()));
        };

        if ticks < 0.0 {
            return Err(TimeParseError::Negative(text.to_string()));
        }
        Ok(ticks.round() as u64)
    }

    fn note_value_ticks(&self, text: &str, value: &str) -> Result<f64, TimeParseError> {
        let division = parse_number(text, value)?;
        if division <= 0.0 {
            return Err(TimeParseError::InvalidNumber(text.to_string()));
        }
        Ok(self.ticks_per_measure() as f64 / division)
    }

    fn parse_transport_position(&self, text: &str) -> Result<f64, TimeParseError> {
        let parts: Vec<&str> = text.split(':').collect();
        if parts.len() > 3 {
            return Err(TimeParseError::InvalidPosition(text.to_string()));
        }

        let units = [
            self.ticks_per_measure() as f64,
            self.ticks_per_quarter() as f64,
            self.ticks_per_sixteenth() as f64,
        ];

        let mut ticks = 0.0;
        for (part, unit) in parts.iter().zip(units) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let value: f64 = part
                .parse()
                .map_err(|_| TimeParseError::InvalidPosition(text.to_string()))?;
            if !value.is_finite() {
                return Err(TimeParseError::InvalidPosition(text.to_string()));
            }
            ticks += value * unit;
        }
        Ok(ticks)
    }

    /// Format ticks as a zero-based `bar:beat:sixteenth` position
    /// The sixteenth part carries a fraction when ticks fall between grid lines.
    pub fn ticks_to_transport_position(&self, ticks: u64) -> String {
        let tpm = self.ticks_per_measure();
        let tpq = self.ticks_per_quarter();
        let tps = self.ticks_per_sixteenth();

        let bars = ticks / tpm;
        let beats = (ticks % tpm) / tpq;
        let remainder = ticks % tpq;

        if remainder % tps == 0 {
            format!("{}:{}:{}", bars, beats, remainder / tps)
        } else {
            // Enough digits that the rounding error stays under half a tick
            let precision = tps.to_string().len().max(3);
            let sixteenths = format!("{:.*}", precision, remainder as f64 / tps as f64);
            let sixteenths = sixteenths.trim_end_matches('0').trim_end_matches('.');
            format!("{}:{}:{}", bars, beats, sixteenths)
        }
    }

    /// Name a duration in notation, falling back to a literal seconds string
    /// Durations are floored to one 32nd note first.
    pub fn ticks_to_duration_notation(&self, ticks: u64) -> String {
        let ticks = ticks.max(self.ticks_per_thirty_second());
        let tpm = self.ticks_per_measure();

        if ticks % tpm == 0 {
            return format!("{}m", ticks / tpm);
        }

        for division in Self::NOTE_DIVISIONS {
            let base = tpm / division;
            if ticks == base {
                return format!("{}n", division);
            }
            if (base * 3) % 2 == 0 && ticks == base * 3 / 2 {
                return format!("{}n.", division);
            }
            if (base * 2) % 3 == 0 && ticks == base * 2 / 3 {
                return format!("{}t", division);
            }
        }

        format!("{:.3}s", self.ticks_to_seconds(ticks))
    }

    /// Round ticks to the nearest sixteenth note
    pub fn quantize_to_sixteenth(&self, ticks: f64) -> u64 {
        if !ticks.is_finite() || ticks <= 0.0 {
            return 0;
        }
        let tps = self.ticks_per_sixteenth() as f64;
        ((ticks / tps).round() * tps) as u64
    }

    /// Quantize a duration: nearest sixteenth, at least one sixteenth
    pub fn quantize_duration(&self, ticks: f64) -> u64 {
        self.quantize_to_sixteenth(ticks)
            .max(self.ticks_per_sixteenth())
    }
}

impl Default for TimeGrid {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TICKS_PER_QUARTER, Tempo::default())
    }
}

fn parse_number(text: &str, value: &str) -> Result<f64, TimeParseError> {
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| TimeParseError::InvalidNumber(text.to_string()))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(TimeParseError::InvalidNumber(text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> TimeGrid {
        TimeGrid::default()
    }

    #[test]
    fn test_tempo() {
        let tempo = Tempo::new(120.0);
        assert_eq!(tempo.bpm(), 120.0);
        assert_eq!(tempo.beat_duration_seconds(), 0.5);
        assert_eq!(tempo.to_string(), "120.0 BPM");
    }

    #[test]
    fn test_grid_units() {
        let grid = grid();
        assert_eq!(grid.ticks_per_quarter(), 192);
        assert_eq!(grid.ticks_per_sixteenth(), 48);
        assert_eq!(grid.ticks_per_thirty_second(), 24);
        assert_eq!(grid.ticks_per_measure(), 768);

        // At 120 BPM a sixteenth is 0.125s
        assert!((grid.sixteenth_seconds() - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_numbers_are_measures() {
        let grid = grid();
        assert_eq!(grid.to_ticks(1u32), 768);
        assert_eq!(grid.to_ticks(0.5), 384);
        assert_eq!(grid.to_ticks(-2.0), 0);
        assert_eq!(grid.to_ticks(f64::NAN), 0);
        assert_eq!(grid.to_ticks(TimeValue::Missing), 0);
    }

    #[test]
    fn test_note_notation() {
        let grid = grid();
        assert_eq!(grid.to_ticks("4n"), 192);
        assert_eq!(grid.to_ticks("16n"), 48);
        assert_eq!(grid.to_ticks("8n."), 144);
        assert_eq!(grid.to_ticks("4t"), 128);
        assert_eq!(grid.to_ticks("2m"), 1536);
        assert_eq!(grid.to_ticks("96i"), 96);
        assert_eq!(grid.to_ticks("0.5s"), 192);
        assert_eq!(grid.to_ticks("1:2:3"), 768 + 384 + 144);
        assert_eq!(grid.to_ticks("0:0:1.5"), 72);
    }

    #[test]
    fn test_malformed_notation_resolves_to_zero() {
        let grid = grid();
        assert_eq!(grid.to_ticks("banana"), 0);
        assert_eq!(grid.to_ticks(""), 0);
        assert_eq!(grid.to_ticks("0n"), 0);
        assert_eq!(grid.to_ticks("1:x:0"), 0);

        assert_eq!(grid.parse_notation(""), Err(TimeParseError::Empty));
        assert!(matches!(
            grid.parse_notation("4q"),
            Err(TimeParseError::UnknownUnit(_))
        ));
        assert!(matches!(
            grid.parse_notation("-1m"),
            Err(TimeParseError::Negative(_))
        ));
    }

    #[test]
    fn test_transport_position_format() {
        let grid = grid();
        assert_eq!(grid.ticks_to_transport_position(0), "0:0:0");
        assert_eq!(grid.ticks_to_transport_position(768 + 192 + 48), "1:1:1");
        assert_eq!(grid.ticks_to_transport_position(72), "0:0:1.5");
        assert_eq!(grid.ticks_to_transport_position(1), "0:0:0.021");
    }

    #[test]
    fn test_transport_position_round_trip() {
        let grid = grid();
        let step = grid.ticks_per_thirty_second();
        for i in 0..512 {
            let ticks = i * step;
            let position = grid.ticks_to_transport_position(ticks);
            assert_eq!(grid.to_ticks(position.as_str()), ticks, "{}", position);
        }

        // Off-grid integer ticks survive the fractional sixteenth as well
        for ticks in 0..200u64 {
            let position = grid.ticks_to_transport_position(ticks);
            assert_eq!(grid.to_ticks(position.as_str()), ticks);
        }
    }

    #[test]
    fn test_transport_position_round_trip_high_resolution() {
        let grid = TimeGrid::new(9600, Tempo::default());
        for ticks in (0..40_000u64).step_by(7).chain([1, 2399, 12345]) {
            let position = grid.ticks_to_transport_position(ticks);
            assert_eq!(grid.to_ticks(position.as_str()), ticks, "{}", position);
        }
    }

    #[test]
    fn test_duration_notation() {
        let grid = grid();
        assert_eq!(grid.ticks_to_duration_notation(768), "1m");
        assert_eq!(grid.ticks_to_duration_notation(1536), "2m");
        assert_eq!(grid.ticks_to_duration_notation(192), "4n");
        assert_eq!(grid.ticks_to_duration_notation(48), "16n");
        assert_eq!(grid.ticks_to_duration_notation(24), "32n");
        assert_eq!(grid.ticks_to_duration_notation(144), "8n.");
        assert_eq!(grid.ticks_to_duration_notation(128), "4t");

        // Below a 32nd note floors to a 32nd
        assert_eq!(grid.ticks_to_duration_notation(0), "32n");
        assert_eq!(grid.ticks_to_duration_notation(5), "32n");

        // Five sixteenths has no clean name
        assert_eq!(grid.ticks_to_duration_notation(240), "0.625s");
        assert_eq!(grid.to_ticks("0.625s"), 240);
    }

    #[test]
    fn test_quantize_to_sixteenth() {
        let grid = grid();
        assert_eq!(grid.quantize_to_sixteenth(20.0), 0);
        assert_eq!(grid.quantize_to_sixteenth(30.0), 48);
        assert_eq!(grid.quantize_to_sixteenth(100.0), 96);
        assert_eq!(grid.quantize_to_sixteenth(-5.0), 0);

        // Already quantized values are unchanged
        for i in 0..64u64 {
            let ticks = i * grid.ticks_per_sixteenth();
            assert_eq!(grid.quantize_to_sixteenth(ticks as f64), ticks);
        }

        assert_eq!(grid.quantize_duration(3.0), 48);
        assert_eq!(grid.quantize_duration(80.0), 96);
    }

    #[test]
    #[should_panic(expected = "Ticks per quarter must be a positive multiple of 8")]
    fn test_invalid_resolution() {
        TimeGrid::new(100, Tempo::default());
    }
}
