pub mod decode;
pub mod diagnosis;
pub mod features;
pub mod report;

use crate::AUDIO_EXTENSIONS;
use crate::config::AppConfig;
use features::{FeatureExtractor, SpectralExtractor};
use indicatif::{ProgressBar, ProgressStyle};
use report::AnalysisRow;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("Decode error: {0}")]
    Decode(#[from] decode::DecodeError),
    #[error("Feature extraction error: {0}")]
    Extraction(#[from] features::ExtractError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub struct AnalyzeResult {
    /// Audio files found in the folder.
    pub found: u64,
    pub analyzed: u64,
    /// Files that decoded to an empty signal.
    pub skipped: u64,
    pub failed: u64,
    /// `None` when nothing was found and no CSV was written.
    pub output: Option<PathBuf>,
}

/// Decodes, extracts and diagnoses every preview in a folder, then writes
/// one analysis CSV. Runs strictly sequentially.
pub struct BatchAnalyzer<E = SpectralExtractor> {
    sample_rate: u32,
    extractor: E,
}

impl BatchAnalyzer<SpectralExtractor> {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_extractor(sample_rate, SpectralExtractor)
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.audio.sample_rate)
    }
}

impl<E: FeatureExtractor> BatchAnalyzer<E> {
    pub fn with_extractor(sample_rate: u32, extractor: E) -> Self {
        Self {
            sample_rate,
            extractor,
        }
    }

    /// Analyze one file. `Ok(None)` when it decodes to an empty signal.
    pub fn analyze_file(&self, path: &Path) -> Result<Option<AnalysisRow>, AnalyzeError> {
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();

        let audio = decode::load_mono(path, self.sample_rate)?;
        if audio.samples.is_empty() {
            return Ok(None);
        }

        let features = self.extractor.extract(&audio.samples, audio.sample_rate)?;
        let diagnoses = diagnosis::diagnose(&features);

        Ok(Some(AnalysisRow {
            filename,
            features,
            diagnoses,
        }))
    }

    /// Analyze every supported file directly inside `audio_folder` and write
    /// the rows to `output_csv`. Per-file failures are logged and skipped;
    /// only writing the CSV can fail the batch. When no audio is found
    /// nothing is written.
    pub fn analyze_folder(
        &self,
        audio_folder: &Path,
        output_csv: &Path,
    ) -> Result<AnalyzeResult, AnalyzeError> {
        let files = find_audio_files(audio_folder);

        let mut result = AnalyzeResult {
            found: files.len() as u64,
            analyzed: 0,
            skipped: 0,
            failed: 0,
            output: None,
        };

        if files.is_empty() {
            log::warn!("No audio files found in '{}'", audio_folder.display());
            return Ok(result);
        }

        log::info!("Found {} audio files. Starting analysis...", files.len());

        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );

        let mut rows: Vec<AnalysisRow> = Vec::with_capacity(files.len());

        for path in &files {
            let name = path.file_name().and_then(|f| f.to_str()).unwrap_or("?");
            log::info!("Processing: {}", name);

            match self.analyze_file(path) {
                Ok(Some(row)) => {
                    rows.push(row);
                    result.analyzed += 1;
                }
                Ok(None) => {
                    log::warn!("Skipping empty file: {}", name);
                    result.skipped += 1;
                }
                Err(e) => {
                    log::error!("Error processing {}: {}", name, e);
                    result.failed += 1;
                }
            }

            pb.inc(1);
            pb.set_message(format!("{} analyzed, {} failed", result.analyzed, result.failed));
        }

        pb.finish_and_clear();

        report::write_analysis_csv(output_csv, &rows)?;
        log::info!("Analysis complete! Data saved to {}", output_csv.display());
        result.output = Some(output_csv.to_path_buf());

        Ok(result)
    }
}

/// Non-recursive scan for preview files, grouped by extension in
/// `AUDIO_EXTENSIONS` order and sorted by name within each group.
/// Extensions match exactly (lowercase). An unreadable folder counts as empty.
pub fn find_audio_files(folder: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Could not read {}: {}", folder.display(), e);
            return Vec::new();
        }
    };

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    candidates.sort();

    let mut files = Vec::new();
    for ext in AUDIO_EXTENSIONS {
        files.extend(
            candidates
                .iter()
                .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(*ext))
                .cloned(),
        );
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use diagnosis::Diagnosis;
    use features::{ExtractError, Feature, FeatureSet};
    use std::fs;
    use tempfile::TempDir;

    /// Returns fixed features regardless of the signal.
    struct FixedExtractor(FeatureSet);

    impl FeatureExtractor for FixedExtractor {
        fn extract(&self, _samples: &[f32], sample_rate: u32) -> Result<FeatureSet, ExtractError> {
            Ok(self
                .0
                .clone()
                .with(Feature::AudioLength, sample_rate as f64 / 1000.0))
        }
    }

    fn kick_features() -> FeatureSet {
        FeatureSet::new()
            .with(Feature::Harmonicity, 0.1)
            .with(Feature::AttackMs, 3.0)
            .with(Feature::SpectralCentroid, 321.987_654)
    }

    fn write_wav(path: &Path, frames: usize) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            writer.write_sample(((i % 100) as i16 - 50) * 100).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn finds_only_supported_extensions_flat() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.wav"), b"").unwrap();
        fs::write(dir.path().join("a.flac"), b"").unwrap();
        fs::write(dir.path().join("a.wav"), b"").unwrap();
        fs::write(dir.path().join("c.WAV"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        fs::create_dir(dir.path().join("sub.wav")).unwrap();
        fs::write(dir.path().join("sub.wav/deep.wav"), b"").unwrap();

        let names: Vec<String> = find_audio_files(dir.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.wav", "b.wav", "a.flac"]);
    }

    #[test]
    fn empty_folder_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out/analysis.csv");
        let analyzer = BatchAnalyzer::with_extractor(44100, FixedExtractor(kick_features()));

        let result = analyzer.analyze_folder(dir.path(), &out).unwrap();
        assert_eq!(result.found, 0);
        assert!(result.output.is_none());
        assert!(!out.exists());
    }

    #[test]
    fn analyze_file_diagnoses_features() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kick_01.wav");
        write_wav(&path, 4410);

        let analyzer = BatchAnalyzer::with_extractor(44100, FixedExtractor(kick_features()));
        let row = analyzer.analyze_file(&path).unwrap().unwrap();
        assert_eq!(row.filename, "kick_01.wav");
        assert_eq!(row.diagnoses.get(Diagnosis::Tonalness), Some("Noisy"));
        assert_eq!(row.diagnoses.get(Diagnosis::Attack), Some("Click"));
        assert_eq!(row.diagnoses.get(Diagnosis::Brightness), Some("Dark"));
    }

    #[test]
    fn bad_and_empty_files_are_skipped_batch_continues() {
        let dir = TempDir::new().unwrap();
        write_wav(&dir.path().join("kick_01.wav"), 4410);
        write_wav(&dir.path().join("silent.wav"), 0);
        fs::write(dir.path().join("broken.wav"), b"RIFF nonsense").unwrap();
        let out = dir.path().join("results/analysis.csv");

        let analyzer = BatchAnalyzer::with_extractor(44100, FixedExtractor(kick_features()));
        let result = analyzer.analyze_folder(dir.path(), &out).unwrap();

        assert_eq!(result.found, 3);
        assert_eq!(result.analyzed, 1);
        assert_eq!(result.skipped + result.failed, 2);
        assert_eq!(result.output.as_deref(), Some(out.as_path()));

        let mut reader = csv::Reader::from_path(&out).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "kick_01.wav");
        assert_eq!(&rows[0][1], "44.1");
        assert_eq!(&rows[0][2], "Noisy");
        assert_eq!(&rows[0][4], "Click");
        assert_eq!(&rows[0][12], "0.1");
        assert_eq!(&rows[0][14], "3.0");
        // spectral_centroid rounded to 4 places
        assert_eq!(&rows[0][16], "321.9877");
        // never extracted -> empty cell
        assert_eq!(&rows[0][25], "");
    }
}
