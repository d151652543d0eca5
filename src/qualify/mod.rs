pub mod lookup;

use crate::config::{AppConfig, ConfigError};
use crate::fsutil::{copy_preserving_times, dotted_extension};
use crate::presets::sanitize::sanitize_tag;
use crate::{DEFAULT_PRESET_EXTENSION, SORTED_AUDIO_EXTENSION};
use lookup::{PresetLookup, preset_base_name};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SortError {
    #[error("Could not read clean preset folder {path}: {source}")]
    PresetFolder {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not read analysis CSV {path}: {source}")]
    AnalysisCsv { path: PathBuf, source: csv::Error },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Positional layout of the analysis CSV as the sorter reads it.
///
/// The sorter never looks at header names: column 0 is the preview
/// filename, column 13 the 1-5 score and columns 14..=19 the six naming
/// attributes. With the analyzer's own column order those land on
/// `fundamental_pitch` and the raw scores after it, so a hand-edited sheet
/// (or any other tool) must put its values at these positions.
pub struct AnalysisLayout;

impl AnalysisLayout {
    pub const FILENAME: usize = 0;
    pub const SCORE: usize = 13;
    pub const ATTRIBUTES: [usize; 6] = [14, 15, 16, 17, 18, 19];
}

/// Destination folder number, always 1 through 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScoreBucket(u8);

impl ScoreBucket {
    pub const ALL: [ScoreBucket; 5] = [
        ScoreBucket(1),
        ScoreBucket(2),
        ScoreBucket(3),
        ScoreBucket(4),
        ScoreBucket(5),
    ];

    pub fn new(score: i64) -> Option<Self> {
        (1..=5).contains(&score).then_some(Self(score as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Parse a score cell: float first, then truncate toward zero
    /// ("3.9" is bucket 3).
    pub fn parse(cell: &str) -> Result<Self, RowError> {
        let value: f64 = cell
            .trim()
            .parse()
            .map_err(|_| RowError::BadScore(cell.to_string()))?;
        if !value.is_finite() {
            return Err(RowError::BadScore(cell.to_string()));
        }
        let score = value.trunc() as i64;
        Self::new(score).ok_or(RowError::ScoreOutOfRange(score))
    }
}

impl fmt::Display for ScoreBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum RowError {
    #[error("missing column {0}")]
    MissingColumn(usize),
    #[error("score '{0}' is not a number")]
    BadScore(String),
    #[error("invalid score '{0}'")]
    ScoreOutOfRange(i64),
}

/// One usable analysis row.
#[derive(Debug, Clone, PartialEq)]
pub struct SortRow {
    pub filename: String,
    pub bucket: ScoreBucket,
    /// Sanitized, in column order.
    pub attributes: [String; 6],
}

impl SortRow {
    /// `Ok(None)` for rows that are not previews (empty or non-`.wav` name).
    pub fn from_record(record: &csv::StringRecord) -> Result<Option<Self>, RowError> {
        let cell = |i: usize| record.get(i).ok_or(RowError::MissingColumn(i));

        let filename = cell(AnalysisLayout::FILENAME)?;
        if filename.is_empty() || !filename.ends_with(SORTED_AUDIO_EXTENSION) {
            return Ok(None);
        }

        let bucket = ScoreBucket::parse(cell(AnalysisLayout::SCORE)?)?;

        let mut attributes: [String; 6] = Default::default();
        for (slot, index) in attributes.iter_mut().zip(AnalysisLayout::ATTRIBUTES) {
            *slot = sanitize_tag(cell(index)?);
        }

        Ok(Some(Self {
            filename: filename.to_string(),
            bucket,
            attributes,
        }))
    }

    /// Attribute names joined with `_`.
    pub fn new_base_name(&self) -> String {
        self.attributes.join("_")
    }
}

#[derive(Debug, Default)]
pub struct SortResult {
    /// Previews copied into a bucket.
    pub processed: u64,
    /// Rejected rows plus missing or failed audio and preset copies.
    pub errors: u64,
}

/// Copies previews and their cleaned presets into `{output}/{score}/` under
/// names built from the analysis attributes.
pub struct QualificationSorter {
    preview_folder: PathBuf,
    clean_preset_folder: PathBuf,
    analysis_file: PathBuf,
    output_base: PathBuf,
}

impl QualificationSorter {
    pub fn new(
        preview_folder: PathBuf,
        clean_preset_folder: PathBuf,
        analysis_file: PathBuf,
        output_base: PathBuf,
    ) -> Self {
        Self {
            preview_folder,
            clean_preset_folder,
            analysis_file,
            output_base,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.preview_folder()?,
            config.clean_preset_folder()?,
            config.analysis_results()?,
            config.output_dir()?,
        ))
    }

    pub fn output_base(&self) -> &Path {
        &self.output_base
    }

    /// Run the sort. Only an unreadable preset folder or analysis CSV
    /// fails the whole run; everything per row is logged and counted.
    pub fn sort_and_rename(&self) -> Result<SortResult, SortError> {
        log::info!("Starting preset sorting and renaming");

        for bucket in ScoreBucket::ALL {
            std::fs::create_dir_all(self.bucket_dir(bucket))?;
        }

        let lookup =
            PresetLookup::build(&self.clean_preset_folder).map_err(|source| {
                SortError::PresetFolder {
                    path: self.clean_preset_folder.clone(),
                    source,
                }
            })?;
        log::info!("Found {} clean presets", lookup.len());

        let csv_error = |source: csv::Error| SortError::AnalysisCsv {
            path: self.analysis_file.clone(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.analysis_file)
            .map_err(csv_error)?;

        let mut result = SortResult::default();

        // Blank lines never reach this loop; the csv reader drops them.
        for record in reader.records() {
            let record = match record {
                Ok(r) => r,
                Err(e) if e.is_io_error() => return Err(csv_error(e)),
                Err(e) => {
                    log::warn!("Skipping row. Could not read data: {}", e);
                    result.errors += 1;
                    continue;
                }
            };

            let row = match SortRow::from_record(&record) {
                Ok(Some(row)) => row,
                Ok(None) => continue,
                Err(RowError::ScoreOutOfRange(score)) => {
                    log::warn!(
                        "Skipping '{}'. Invalid score '{}'.",
                        record.get(AnalysisLayout::FILENAME).unwrap_or_default(),
                        score
                    );
                    result.errors += 1;
                    continue;
                }
                Err(e) => {
                    log::warn!("Skipping row. Could not read data: {}", e);
                    result.errors += 1;
                    continue;
                }
            };

            self.place(&row, &lookup, &mut result);
        }

        log::info!("Successfully processed {} files", result.processed);
        if result.errors > 0 {
            log::warn!("Encountered {} errors/warnings", result.errors);
        }
        log::info!("All files sorted into: {}", self.output_base.display());

        Ok(result)
    }

    fn bucket_dir(&self, bucket: ScoreBucket) -> PathBuf {
        self.output_base.join(bucket.to_string())
    }

    /// Copy one row's preview and preset. The two are independent: a missing
    /// preset does not stop the preview from being placed.
    fn place(&self, row: &SortRow, lookup: &PresetLookup, result: &mut SortResult) {
        let dest = self.bucket_dir(row.bucket);
        let new_base = row.new_base_name();

        let source_audio = self.preview_folder.join(&row.filename);
        if source_audio.exists() {
            let target = dest.join(format!("{new_base}{SORTED_AUDIO_EXTENSION}"));
            match copy_preserving_times(&source_audio, &target) {
                Ok(_) => {
                    log::debug!("{} -> {}", source_audio.display(), target.display());
                    result.processed += 1;
                }
                Err(e) => {
                    log::error!("Failed to copy {}: {}", source_audio.display(), e);
                    result.errors += 1;
                }
            }
        } else {
            log::warn!("Audio file not found: {}", source_audio.display());
            result.errors += 1;
        }

        let base = preset_base_name(&row.filename);
        let Some(preset_name) = lookup.get(&base) else {
            log::warn!("No preset file found for base: {}", base);
            result.errors += 1;
            return;
        };

        let source_preset = self.clean_preset_folder.join(preset_name);
        if !source_preset.exists() {
            log::warn!("Preset file not found: {}", source_preset.display());
            result.errors += 1;
            return;
        }

        let extension = match dotted_extension(preset_name) {
            ext if ext.is_empty() => DEFAULT_PRESET_EXTENSION.to_string(),
            ext => ext,
        };
        let target = dest.join(format!("{new_base}{extension}"));
        if let Err(e) = copy_preserving_times(&source_preset, &target) {
            log::error!("Failed to copy {}: {}", source_preset.display(), e);
            result.errors += 1;
        }
    }
}
