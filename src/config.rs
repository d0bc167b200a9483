// Config - Engine settings
// Loaded from RON or JSON; every field has a default

use crate::error::{SequencerError, SequencerResult};
use crate::sequencer::timeline::{Tempo, TimeGrid};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tick resolution (default: 192, must be a multiple of 8)
    pub ticks_per_quarter: u32,
    /// Tempo (default: 120, range: 20-999)
    pub bpm: f64,
    /// Grid size of new patterns (default: 16)
    pub steps_per_measure: usize,
    /// Global quantize toggle for live capture (default: false)
    pub quantize: bool,
    /// Seed for humanize jitter; random when unset
    pub humanize_seed: Option<u64>,
    /// Measures per song column (default: 1)
    pub section_measures: u32,
    /// Tail kept after a transient voice's sustain before it is disposed
    pub transient_release_seconds: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ticks_per_quarter: TimeGrid::DEFAULT_TICKS_PER_QUARTER,
            bpm: 120.0,
            steps_per_measure: 16,
            quantize: false,
            humanize_seed: None,
            section_measures: 1,
            transient_release_seconds: 0.5,
        }
    }
}

impl EngineConfig {
    pub fn from_ron_str(text: &str) -> SequencerResult<Self> {
        let config: Self = ron::from_str(text).map_err(|e| {
            SequencerError::SerializationError(format!("Failed to parse RON config: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> SequencerResult<Self> {
        let config: Self = serde_json::from_str(text).map_err(|e| {
            SequencerError::SerializationError(format!("Failed to parse JSON config: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.ron` or `.json` file
    pub fn load(path: &Path) -> SequencerResult<Self> {
        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        let text = match extension.to_lowercase().as_str() {
            "ron" | "json" => std::fs::read_to_string(path)?,
            _ => return Err(SequencerError::UnsupportedConfigFormat(path.to_path_buf())),
        };

        if extension.eq_ignore_ascii_case("ron") {
            Self::from_ron_str(&text)
        } else {
            Self::from_json_str(&text)
        }
    }

    pub fn validate(&self) -> SequencerResult<()> {
        if self.ticks_per_quarter == 0 || self.ticks_per_quarter % 8 != 0 {
            return Err(SequencerError::InvalidConfig(format!(
                "ticks_per_quarter must be a positive multiple of 8, got {}",
                self.ticks_per_quarter
            )));
        }
        if !(Tempo::MIN_BPM..=Tempo::MAX_BPM).contains(&self.bpm) {
            return Err(SequencerError::InvalidConfig(format!(
                "bpm must be between {} and {}, got {}",
                Tempo::MIN_BPM,
                Tempo::MAX_BPM,
                self.bpm
            )));
        }
        if self.steps_per_measure == 0 {
            return Err(SequencerError::InvalidConfig(
                "steps_per_measure must be positive".to_string(),
            ));
        }
        if self.section_measures == 0 {
            return Err(SequencerError::InvalidConfig(
                "section_measures must be positive".to_string(),
            ));
        }
        if !self.transient_release_seconds.is_finite() || self.transient_release_seconds < 0.0 {
            return Err(SequencerError::InvalidConfig(format!(
                "transient_release_seconds must be non-negative, got {}",
                self.transient_release_seconds
            )));
        }
        Ok(())
    }

    /// Tick grid for these settings
    pub fn grid(&self) -> TimeGrid {
        TimeGrid::new(self.ticks_per_quarter, Tempo::new(self.bpm))
    }

    /// Length of one song column in ticks
    pub fn section_ticks(&self, grid: &TimeGrid) -> u64 {
        self.section_measures as u64 * grid.ticks_per_measure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.grid().ticks_per_sixteenth(), 48);
        assert_eq!(config.section_ticks(&config.grid()), 768);
    }

    #[test]
    fn test_partial_ron() {
        let config = EngineConfig::from_ron_str("(bpm: 90.0, quantize: true)").unwrap();
        assert_eq!(config.bpm, 90.0);
        assert!(config.quantize);
        assert_eq!(config.ticks_per_quarter, 192);
    }

    #[test]
    fn test_json() {
        let config =
            EngineConfig::from_json_str(r#"{"ticks_per_quarter": 96, "humanize_seed": 7}"#).unwrap();
        assert_eq!(config.ticks_per_quarter, 96);
        assert_eq!(config.humanize_seed, Some(7));
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            EngineConfig::from_ron_str("(ticks_per_quarter: 100)"),
            Err(SequencerError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"bpm": 5.0}"#),
            Err(SequencerError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str("{not json"),
            Err(SequencerError::SerializationError(_))
        ));
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let ron_path = dir.path().join("engine.ron");
        let mut file = std::fs::File::create(&ron_path).unwrap();
        writeln!(file, "(section_measures: 2)").unwrap();
        assert_eq!(EngineConfig::load(&ron_path).unwrap().section_measures, 2);

        let json_path = dir.path().join("engine.json");
        std::fs::write(&json_path, r#"{"steps_per_measure": 32}"#).unwrap();
        assert_eq!(EngineConfig::load(&json_path).unwrap().steps_per_measure, 32);

        let toml_path = dir.path().join("engine.toml");
        std::fs::write(&toml_path, "bpm = 100").unwrap();
        assert!(matches!(
            EngineConfig::load(&toml_path),
            Err(SequencerError::UnsupportedConfigFormat(_))
        ));

        assert!(matches!(
            EngineConfig::load(&dir.path().join("missing.ron")),
            Err(SequencerError::Io(_))
        ));
    }
}
