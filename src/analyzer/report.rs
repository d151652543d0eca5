use super::diagnosis::{Diagnosis, DiagnosisSet};
use super::features::{Feature, FeatureSet};
use std::path::Path;

/// Analysis CSV header, in order. The qualification sorter reads this file
/// by column position, so reordering here is a breaking change for it.
pub const ANALYSIS_COLUMNS: [&str; 26] = [
    "filename",
    "audiolength",
    // Diagnoses
    "diag_tonalness",
    "diag_pitch",
    "diag_attack",
    "diag_duration",
    "diag_brightness",
    "diag_bass_presence",
    "diag_rhythm_density",
    "diag_dynamic_range",
    "diag_loudness",
    "diag_timbre",
    // Raw scores
    "harmonicity",
    "fundamental_pitch",
    "attack_ms",
    "effective_duration_s",
    "spectral_centroid",
    "bass_presence_ratio",
    "rhythmic_density_ops",
    "dynamic_range_db",
    "loudness_dbfs",
    "spectral_bandwidth",
    // Other features
    "spectral_flatness",
    "rms_energy",
    "zero_crossing_rate",
    "spectral_rolloff",
];

/// One analyzed audio file.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRow {
    pub filename: String,
    pub features: FeatureSet,
    pub diagnoses: DiagnosisSet,
}

impl AnalysisRow {
    /// Cell text for one column; empty when the row has no value for it.
    pub fn cell(&self, column: &str) -> String {
        if column == "filename" {
            return self.filename.clone();
        }
        if let Some(d) = Diagnosis::from_key(column) {
            return self.diagnoses.get(d).unwrap_or_default().to_string();
        }
        if let Some(f) = Feature::from_key(column) {
            return self.features.get(f).map(format_value).unwrap_or_default();
        }
        String::new()
    }

    /// Cells in `ANALYSIS_COLUMNS` order.
    pub fn to_record(&self) -> Vec<String> {
        ANALYSIS_COLUMNS.iter().map(|c| self.cell(c)).collect()
    }
}

/// Round half away from zero to 4 decimal places.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Shortest round-trip text for the rounded value. Whole numbers keep a
/// trailing `.0` (`3.0`, `-0.0`) so float columns never read as integers.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    let rounded = round4(value);
    if rounded.is_finite() && rounded.fract() == 0.0 {
        format!("{rounded:.1}")
    } else {
        format!("{rounded}")
    }
}

/// Write header + rows, replacing any existing file. Creates parent dirs.
pub fn write_analysis_csv(path: &Path, rows: &[AnalysisRow]) -> Result<(), csv::Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(ANALYSIS_COLUMNS)?;
    for row in rows {
        writer.write_record(row.to_record())?;
    }
    writer.flush()?;
    Ok(())
}
