use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use preset_qualifier::analyzer::BatchAnalyzer;
use preset_qualifier::config::AppConfig;
use preset_qualifier::presets::categorize::Categorizer;
use preset_qualifier::presets::{PresetCleaner, clean_filename};
use preset_qualifier::qualify::QualificationSorter;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "preset-qualifier",
    version,
    about = "Clean, analyze and sort VST presets by their rendered previews"
)]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy presets into the clean folder with categorized names and write the metadata CSV
    Clean,

    /// Analyze audio previews and write the analysis CSV
    Analyze {
        /// Folder of previews (defaults to paths.preview_folder)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output CSV (defaults to paths.analysis_results)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Sort previews and presets into score folders using the analysis CSV
    Sort,

    /// Analyze a single audio file and print its features and diagnoses
    Diagnose {
        /// Audio file to analyze
        file: PathBuf,
    },

    /// Show the category and cleaned name preset files would receive
    Categorize {
        /// Preset filenames
        #[arg(required = true)]
        names: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    // Set up logging: -v flags > config level > info
    let log_level = match cli.verbose {
        0 => config.logging.level.clone().unwrap_or_else(|| "info".to_string()),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level));
    builder.format_timestamp(None);
    if let Some(log_file) = config.log_file() {
        let file = open_log_file(&log_file)
            .with_context(|| format!("Failed to open log file {}", log_file.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
    }
    builder.init();

    match &config.source_file {
        Some(path) => log::info!("Loaded config from {}", path.display()),
        None => log::debug!("No config file found, using defaults"),
    }

    match cli.command {
        Commands::Clean => {
            let cleaner = PresetCleaner::from_config(&config)?;
            let result = cleaner.process_presets().context("Preset cleaning failed")?;
            cleaner
                .save_metadata(&result.records)
                .context("Failed to write preset metadata")?;
            println!(
                "Cleaning complete: {} processed, {} errors",
                result.processed, result.errors
            );
            println!("Clean presets: {}", cleaner.clean_folder().display());
            println!("Metadata:      {}", cleaner.metadata_file().display());
        }

        Commands::Analyze { input, output } => {
            let input = match input {
                Some(p) => p,
                None => config.preview_folder()?,
            };
            let output = match output {
                Some(p) => p,
                None => config.analysis_results()?,
            };

            let analyzer = BatchAnalyzer::from_config(&config);
            let result = analyzer
                .analyze_folder(&input, &output)
                .context("Analysis failed")?;

            match result.output {
                Some(path) => {
                    println!(
                        "Analysis complete: {} analyzed, {} skipped, {} failed",
                        result.analyzed, result.skipped, result.failed
                    );
                    println!("Data saved to {}", path.display());
                }
                None => println!("No audio files found in {}", input.display()),
            }
        }

        Commands::Sort => {
            let sorter = QualificationSorter::from_config(&config)?;
            let result = sorter.sort_and_rename().context("Sorting failed")?;
            println!(
                "Sorting complete: {} processed, {} errors",
                result.processed, result.errors
            );
            println!("Output: {}", sorter.output_base().display());
        }

        Commands::Diagnose { file } => {
            let analyzer = BatchAnalyzer::from_config(&config);
            let row = analyzer
                .analyze_file(&file)
                .with_context(|| format!("Failed to analyze {}", file.display()))?;

            let Some(row) = row else {
                println!("{} contains no audio.", file.display());
                return Ok(());
            };

            println!("{}", row.filename);
            println!();
            println!("Diagnosis:");
            for (diagnosis, label) in row.diagnoses.iter() {
                println!("  {:<22} {}", diagnosis.key(), label);
            }
            println!();
            println!("Features:");
            for (feature, value) in row.features.iter() {
                println!("  {:<22} {:.4}", feature.key(), value);
            }
        }

        Commands::Categorize { names } => {
            let categorizer = Categorizer::from_config(&config);
            for name in &names {
                let (new_name, category) = clean_filename(&categorizer, name);
                println!(
                    "{} -> {}  [{}/{}, note {}, {} ms]",
                    name,
                    new_name,
                    category.category,
                    category.subcategory,
                    category.note,
                    category.preview_length_ms
                );
            }
        }
    }

    Ok(())
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    File::options().create(true).append(true).open(path)
}

/// Log sink writing to stderr and the configured log file.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}
