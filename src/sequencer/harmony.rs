// Harmony - Chord resolution for harmonic instruments
// Pure functions of (degree, tonal center, scale, complexity), evaluated per triggered step

use crate::sequencer::note::{midi_to_note_name, pitch_class};
use serde::{Deserialize, Serialize};

/// Scale used to build diatonic chords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleKind {
    #[default]
    Major,
    Minor,
    Dorian,
    Mixolydian,
    HarmonicMinor,
}

impl ScaleKind {
    /// Semitone offsets of the seven scale degrees
    pub fn intervals(&self) -> [i32; 7] {
        match self {
            ScaleKind::Major => [0, 2, 4, 5, 7, 9, 11],
            ScaleKind::Minor => [0, 2, 3, 5, 7, 8, 10],
            ScaleKind::Dorian => [0, 2, 3, 5, 7, 9, 10],
            ScaleKind::Mixolydian => [0, 2, 4, 5, 7, 9, 10],
            ScaleKind::HarmonicMinor => [0, 2, 3, 5, 7, 8, 11],
        }
    }

    /// Parallel scale that borrowed chords are taken from
    pub fn parallel(&self) -> ScaleKind {
        match self {
            ScaleKind::Major | ScaleKind::Mixolydian => ScaleKind::Minor,
            ScaleKind::Minor | ScaleKind::Dorian | ScaleKind::HarmonicMinor => ScaleKind::Major,
        }
    }
}

/// Number of stacked thirds in a chord
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChordComplexity {
    #[default]
    Triad,
    Seventh,
    Ninth,
}

impl ChordComplexity {
    fn voice_count(&self) -> i32 {
        match self {
            ChordComplexity::Triad => 3,
            ChordComplexity::Seventh => 4,
            ChordComplexity::Ninth => 5,
        }
    }
}

/// Live harmonic context for chord resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarmonyContext {
    /// Tonal center note letter ("C", "F#", "Bb")
    pub tonal_center: String,
    pub scale: ScaleKind,
    pub complexity: ChordComplexity,
    /// Take chords from the parallel scale
    #[serde(default)]
    pub borrowed: bool,
    /// Octave of the tonic
    #[serde(default = "default_octave")]
    pub octave: i32,
}

fn default_octave() -> i32 {
    3
}

impl Default for HarmonyContext {
    fn default() -> Self {
        Self {
            tonal_center: "C".to_string(),
            scale: ScaleKind::Major,
            complexity: ChordComplexity::Triad,
            borrowed: false,
            octave: default_octave(),
        }
    }
}

/// Concrete chord data substituted into a trigger call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChord {
    /// Root note name
    pub root: String,
    /// All chord tones, root first
    pub notes: Vec<String>,
    /// Semitone offsets of each tone from the root
    pub intervals: Vec<i32>,
}

/// Resolve a 1-based scale degree to a chord
///
/// Degrees beyond 7 continue into the next octave, degrees below 1 into the
/// previous one. An unparsable tonal center falls back to C.
pub fn resolve_chord(degree: i32, context: &HarmonyContext) -> ResolvedChord {
    let scale = if context.borrowed {
        context.scale.parallel()
    } else {
        context.scale
    };
    let intervals = scale.intervals();
    let center = pitch_class(&context.tonal_center).unwrap_or(0);
    let tonic = (context.octave + 1) * 12 + center;

    // Semitones above the tonic for a zero-based scale step
    let step_offset = |step: i32| -> i32 {
        let octave = step.div_euclid(7);
        intervals[step.rem_euclid(7) as usize] + 12 * octave
    };

    let root_step = degree - 1;
    let root_offset = step_offset(root_step);

    let chord_intervals: Vec<i32> = (0..context.complexity.voice_count())
        .map(|voice| step_offset(root_step + voice * 2) - root_offset)
        .collect();

    let root_midi = tonic + root_offset;
    ResolvedChord {
        root: midi_to_note_name(root_midi),
        notes: chord_intervals
            .iter()
            .map(|interval| midi_to_note_name(root_midi + interval))
            .collect(),
        intervals: chord_intervals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(center: &str, scale: ScaleKind, complexity: ChordComplexity) -> HarmonyContext {
        HarmonyContext {
            tonal_center: center.to_string(),
            scale,
            complexity,
            borrowed: false,
            octave: 3,
        }
    }

    #[test]
    fn test_major_triads() {
        let ctx = context("C", ScaleKind::Major, ChordComplexity::Triad);

        let one = resolve_chord(1, &ctx);
        assert_eq!(one.root, "C3");
        assert_eq!(one.notes, vec!["C3", "E3", "G3"]);
        assert_eq!(one.intervals, vec![0, 4, 7]);

        // ii is minor
        assert_eq!(resolve_chord(2, &ctx).intervals, vec![0, 3, 7]);

        // vii is diminished
        assert_eq!(resolve_chord(7, &ctx).intervals, vec![0, 3, 6]);
    }

    #[test]
    fn test_seventh_and_ninth() {
        let ctx = context("G", ScaleKind::Major, ChordComplexity::Seventh);
        let five = resolve_chord(5, &ctx);
        // D dominant seventh in G major
        assert_eq!(five.root, "D4");
        assert_eq!(five.intervals, vec![0, 4, 7, 10]);

        let ctx = context("C", ScaleKind::Major, ChordComplexity::Ninth);
        assert_eq!(resolve_chord(1, &ctx).intervals, vec![0, 4, 7, 11, 14]);
    }

    #[test]
    fn test_degree_wraps_octaves() {
        let ctx = context("C", ScaleKind::Major, ChordComplexity::Triad);
        assert_eq!(resolve_chord(8, &ctx).root, "C4");
        assert_eq!(resolve_chord(0, &ctx).root, "B2");
    }

    #[test]
    fn test_borrowed_chord_uses_parallel_scale() {
        let mut ctx = context("C", ScaleKind::Major, ChordComplexity::Triad);
        ctx.borrowed = true;

        // iv borrowed from C minor
        let four = resolve_chord(4, &ctx);
        assert_eq!(four.root, "F3");
        assert_eq!(four.intervals, vec![0, 3, 7]);
    }

    #[test]
    fn test_resolution_is_pure() {
        let ctx = context("Eb", ScaleKind::Minor, ChordComplexity::Seventh);
        assert_eq!(resolve_chord(3, &ctx), resolve_chord(3, &ctx));
    }
}
