use super::features::{Feature, FeatureSet};
use std::collections::BTreeMap;

/// The ten diagnosis dimensions. Declaration order is the CSV column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Diagnosis {
    Tonalness,
    Pitch,
    Attack,
    Duration,
    Brightness,
    BassPresence,
    RhythmDensity,
    DynamicRange,
    Loudness,
    Timbre,
}

impl Diagnosis {
    pub const ALL: [Diagnosis; 10] = [
        Diagnosis::Tonalness,
        Diagnosis::Pitch,
        Diagnosis::Attack,
        Diagnosis::Duration,
        Diagnosis::Brightness,
        Diagnosis::BassPresence,
        Diagnosis::RhythmDensity,
        Diagnosis::DynamicRange,
        Diagnosis::Loudness,
        Diagnosis::Timbre,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Tonalness => "diag_tonalness",
            Self::Pitch => "diag_pitch",
            Self::Attack => "diag_attack",
            Self::Duration => "diag_duration",
            Self::Brightness => "diag_brightness",
            Self::BassPresence => "diag_bass_presence",
            Self::RhythmDensity => "diag_rhythm_density",
            Self::DynamicRange => "diag_dynamic_range",
            Self::Loudness => "diag_loudness",
            Self::Timbre => "diag_timbre",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.key() == key)
    }
}

/// Categorical labels for one audio file, one per dimension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosisSet {
    labels: BTreeMap<Diagnosis, String>,
}

impl DiagnosisSet {
    pub fn get(&self, diagnosis: Diagnosis) -> Option<&str> {
        self.labels.get(&diagnosis).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Diagnosis, &str)> + '_ {
        self.labels.iter().map(|(d, l)| (*d, l.as_str()))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Ascending exclusive thresholds: the first `value < limit` wins, anything
/// at or above the last limit (and NaN) gets `top`.
struct Ladder {
    diagnosis: Diagnosis,
    feature: Feature,
    steps: &'static [(f64, &'static str)],
    top: &'static str,
}

impl Ladder {
    fn label(&self, value: f64) -> &'static str {
        self.steps
            .iter()
            .find(|(limit, _)| value < *limit)
            .map(|(_, label)| *label)
            .unwrap_or(self.top)
    }
}

const LADDERS: [Ladder; 9] = [
    Ladder {
        diagnosis: Diagnosis::Tonalness,
        feature: Feature::Harmonicity,
        steps: &[(0.2, "Noisy"), (0.4, "Atonal"), (0.6, "Weakly Tonal"), (0.8, "Tonal")],
        top: "Clear Pitch",
    },
    Ladder {
        diagnosis: Diagnosis::Attack,
        feature: Feature::AttackMs,
        steps: &[
            (5.0, "Click"),
            (20.0, "Transient"),
            (50.0, "Pluck"),
            (200.0, "Soft"),
            (1000.0, "Pad"),
        ],
        top: "Swell",
    },
    Ladder {
        diagnosis: Diagnosis::Duration,
        feature: Feature::EffectiveDurationS,
        steps: &[(0.15, "Stab"), (0.5, "Short"), (2.0, "Medium"), (5.0, "Long")],
        top: "Pad/Tail",
    },
    Ladder {
        diagnosis: Diagnosis::Brightness,
        feature: Feature::SpectralCentroid,
        steps: &[(500.0, "Dark"), (1500.0, "Mellow"), (3000.0, "Present"), (5000.0, "Bright")],
        top: "Airy",
    },
    Ladder {
        diagnosis: Diagnosis::BassPresence,
        feature: Feature::BassPresenceRatio,
        steps: &[(0.01, "No Lows"), (0.1, "Thin"), (0.2, "Balanced"), (0.35, "Full")],
        top: "Sub-Heavy",
    },
    Ladder {
        diagnosis: Diagnosis::RhythmDensity,
        feature: Feature::RhythmicDensityOps,
        steps: &[(0.2, "Sparse"), (1.5, "One-Shot"), (3.5, "Groove"), (7.0, "Roll")],
        top: "Dense",
    },
    Ladder {
        diagnosis: Diagnosis::DynamicRange,
        feature: Feature::DynamicRangeDb,
        steps: &[(4.0, "Sausage"), (8.0, "Compressed"), (14.0, "Dynamic"), (20.0, "Punchy")],
        top: "Spiky",
    },
    Ladder {
        diagnosis: Diagnosis::Loudness,
        feature: Feature::LoudnessDbfs,
        steps: &[(-40.0, "Silent"), (-25.0, "Quiet"), (-12.0, "Medium"), (-3.0, "Loud")],
        top: "Clipped",
    },
    Ladder {
        diagnosis: Diagnosis::Timbre,
        feature: Feature::SpectralBandwidth,
        steps: &[(100.0, "Pure Tone"), (500.0, "Simple"), (1500.0, "Rich"), (3500.0, "Complex")],
        top: "Noisy",
    },
];

/// Label used for `diag_pitch` when no fundamental was found.
pub const NO_PITCH: &str = "N/A";

const NOTE_NAMES: [&str; 12] = [
    "C", "C♯", "D", "D♯", "E", "F", "F♯", "G", "G♯", "A", "A♯", "B",
];

/// Map a feature set to its ten diagnosis labels.
///
/// Total and pure: absent features take their neutral default (0, or -60
/// dBFS for loudness), so every dimension always gets a label.
pub fn diagnose(features: &FeatureSet) -> DiagnosisSet {
    let mut labels = BTreeMap::new();

    for ladder in &LADDERS {
        let value = features.value_or_default(ladder.feature);
        labels.insert(ladder.diagnosis, ladder.label(value).to_string());
    }

    let f0 = features.value_or_default(Feature::FundamentalPitch);
    let pitch = if f0 > 0.0 {
        hz_to_note(f0).unwrap_or_else(|| NO_PITCH.to_string())
    } else {
        NO_PITCH.to_string()
    };
    labels.insert(Diagnosis::Pitch, pitch);

    DiagnosisSet { labels }
}

/// Nearest 12-TET note name with octave, A4 = 440 Hz (e.g. 261.63 → "C4").
/// `None` for non-positive or non-finite input.
pub fn hz_to_note(hz: f64) -> Option<String> {
    if !hz.is_finite() || hz <= 0.0 {
        return None;
    }
    let midi = (12.0 * (hz / 440.0).log2() + 69.0).round() as i64;
    let name = NOTE_NAMES[midi.rem_euclid(12) as usize];
    let octave = midi.div_euclid(12) - 1;
    Some(format!("{name}{octave}"))
}
