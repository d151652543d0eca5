pub mod categorize;
pub mod sanitize;

use crate::config::{AppConfig, ConfigError};
use crate::fsutil::{copy_preserving_times, dotted_extension};
use categorize::{Categorizer, Category};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum CleanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// One row of the preset metadata CSV. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresetMetadataRecord {
    pub filename: String,
    pub category: String,
    pub subcategory: String,
    pub suggested_preview_length_ms: u32,
    pub suggested_note: i32,
}

pub struct CleanResult {
    pub records: Vec<PresetMetadataRecord>,
    pub processed: u64,
    pub errors: u64,
}

/// Copies presets out of a nested source tree into one flat folder with
/// `{CATEGORY}_{SUBCATEGORY}_{sanitized stem}{ext}` names.
pub struct PresetCleaner {
    source_folder: PathBuf,
    clean_folder: PathBuf,
    metadata_file: PathBuf,
    /// Lowercase, dotted.
    extensions: Vec<String>,
    categorizer: Categorizer,
}

impl PresetCleaner {
    pub fn new(
        source_folder: PathBuf,
        clean_folder: PathBuf,
        metadata_file: PathBuf,
        extensions: &[String],
        categorizer: Categorizer,
    ) -> Self {
        Self {
            source_folder,
            clean_folder,
            metadata_file,
            extensions: extensions.iter().map(|e| e.to_lowercase()).collect(),
            categorizer,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.source_folder()?,
            config.clean_preset_folder()?,
            config.metadata_file()?,
            &config.vst.supported_extensions,
            Categorizer::from_config(config),
        ))
    }

    pub fn clean_folder(&self) -> &Path {
        &self.clean_folder
    }

    pub fn metadata_file(&self) -> &Path {
        &self.metadata_file
    }

    /// Case-insensitive suffix check against the supported preset extensions.
    pub fn is_supported(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        self.extensions.iter().any(|ext| lower.ends_with(ext.as_str()))
    }

    /// The cleaned filename a preset receives, plus its category.
    pub fn clean_name(&self, file_name: &str) -> (String, Category) {
        clean_filename(&self.categorizer, file_name)
    }

    /// Walk the source tree and copy every supported preset into the clean
    /// folder. Copy failures are logged and skipped. Two sources that clean
    /// to the same name overwrite each other; the later one in walk order
    /// (sorted by file name) is what remains.
    pub fn process_presets(&self) -> Result<CleanResult, CleanError> {
        log::info!(
            "Starting preset processing from: {}",
            self.source_folder.display()
        );

        std::fs::create_dir_all(&self.clean_folder)?;
        if let Some(parent) = self.metadata_file.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut presets: Vec<walkdir::DirEntry> = Vec::new();
        for entry in WalkDir::new(&self.source_folder).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if self.is_supported(&entry.file_name().to_string_lossy()) {
                presets.push(entry);
            }
        }

        let pb = ProgressBar::new(presets.len() as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );

        let mut result = CleanResult {
            records: Vec::new(),
            processed: 0,
            errors: 0,
        };

        for entry in &presets {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let (new_filename, category) = self.clean_name(&file_name);
            let new_path = self.clean_folder.join(&new_filename);

            match copy_preserving_times(entry.path(), &new_path) {
                Ok(_) => {
                    log::debug!("Copied: {} -> {}", entry.path().display(), new_path.display());
                    result.records.push(PresetMetadataRecord {
                        filename: new_filename,
                        category: category.category,
                        subcategory: category.subcategory,
                        suggested_preview_length_ms: category.preview_length_ms,
                        suggested_note: category.note,
                    });
                    result.processed += 1;
                }
                Err(e) => {
                    log::error!("Failed to copy {}: {}", entry.path().display(), e);
                    result.errors += 1;
                }
            }

            pb.inc(1);
        }

        pb.finish_and_clear();
        log::info!("Successfully processed {} presets", result.processed);

        Ok(result)
    }

    /// Write the metadata CSV (header + one row per record), replacing any
    /// previous file.
    pub fn save_metadata(&self, records: &[PresetMetadataRecord]) -> Result<(), CleanError> {
        write_metadata_csv(&self.metadata_file, records)?;
        log::info!("Metadata saved to: {}", self.metadata_file.display());
        Ok(())
    }
}

/// `{CATEGORY}_{SUBCATEGORY}_{sanitized stem}{ext}` with underscore runs
/// collapsed, plus the category it was built from.
pub fn clean_filename(categorizer: &Categorizer, file_name: &str) -> (String, Category) {
    let category = categorizer.categorize(file_name);
    let stem = sanitize::sanitize_filename(file_name);
    let extension = dotted_extension(file_name);
    let raw = format!(
        "{}_{}_{}{}",
        category.category, category.subcategory, stem, extension
    );
    (sanitize::collapse_underscores(&raw), category)
}

pub const METADATA_COLUMNS: [&str; 5] = [
    "filename",
    "category",
    "subcategory",
    "suggested_preview_length_ms",
    "suggested_note",
];

pub fn write_metadata_csv(path: &Path, records: &[PresetMetadataRecord]) -> Result<(), CleanError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    // Header is written explicitly so an empty run still produces it.
    writer.write_record(METADATA_COLUMNS)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
