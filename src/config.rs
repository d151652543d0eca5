use std::fmt;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use serde::de::{Deserializer, MapAccess, SeqAccess, Visitor};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("No path configured for `paths.{0}`")]
    MissingPath(&'static str),
}

/// Application configuration loaded from a YAML file.
///
/// Built once per run and handed to each component; there is no global
/// instance. Every section is optional and falls back to the defaults the
/// preset pipeline has always used.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub audio: AudioConfig,
    pub vst: VstConfig,
    /// Category rules in file order. First match wins, so order matters.
    pub categories: CategoryRules,
    pub default_category: String,
    pub default_subcategory: String,
    pub logging: LoggingConfig,
    /// Directory relative paths are resolved against (the config file's directory).
    #[serde(skip)]
    pub base_dir: PathBuf,
    /// File this config was read from; `None` for built-in defaults.
    #[serde(skip)]
    pub source_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            audio: AudioConfig::default(),
            vst: VstConfig::default(),
            categories: CategoryRules::default(),
            default_category: "UNKNOWN".to_string(),
            default_subcategory: "UNTITLED".to_string(),
            logging: LoggingConfig::default(),
            base_dir: PathBuf::new(),
            source_file: None,
        }
    }
}

/// Input/output locations. Relative entries are resolved against `AppConfig::base_dir`.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct PathsConfig {
    pub source_folder: Option<PathBuf>,
    pub clean_preset_folder: Option<PathBuf>,
    pub metadata_file: Option<PathBuf>,
    pub preview_folder: Option<PathBuf>,
    pub analysis_results: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Rate every preview is resampled to before feature extraction.
    pub sample_rate: u32,
    /// Preview length suggested for presets whose rule doesn't set one.
    pub preview_length_ms: u32,
    /// MIDI note suggested for presets whose rule doesn't set one.
    pub other_note: i32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            preview_length_ms: 5000,
            other_note: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VstConfig {
    /// Preset extensions (with leading dot) the cleaner copies. Compared case-insensitively.
    pub supported_extensions: Vec<String>,
}

impl Default for VstConfig {
    fn default() -> Self {
        Self {
            supported_extensions: vec![".fxp".to_string(), ".serumpreset".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log filter when no `-v` flag is given (e.g. "info").
    pub level: Option<String>,
}

/// Per-category settings as written in the config file.
/// Unset fields fall back to the global defaults when rules are built.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CategorySettings {
    pub keywords: Vec<String>,
    pub subcategory: Option<String>,
    pub note: Option<i32>,
    pub preview_length_ms: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct CategoryEntry {
    pub name: String,
    pub settings: CategorySettings,
}

/// Ordered category rules.
///
/// Accepts either a YAML mapping (`KICK: {keywords: [...]}`), whose key order
/// is kept, or a list of `{name: KICK, keywords: [...]}` entries.
#[derive(Debug, Default, Clone)]
pub struct CategoryRules(pub Vec<CategoryEntry>);

impl CategoryRules {
    pub fn iter(&self) -> impl Iterator<Item = &CategoryEntry> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Deserialize)]
struct NamedCategory {
    name: String,
    #[serde(flatten)]
    settings: CategorySettings,
}

impl<'de> Deserialize<'de> for CategoryRules {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RulesVisitor;

        impl<'de> Visitor<'de> for RulesVisitor {
            type Value = CategoryRules;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping or list of category rules")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some((name, settings)) = map.next_entry::<String, CategorySettings>()? {
                    entries.push(CategoryEntry { name, settings });
                }
                Ok(CategoryRules(entries))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some(named) = seq.next_element::<NamedCategory>()? {
                    entries.push(CategoryEntry {
                        name: named.name,
                        settings: named.settings,
                    });
                }
                Ok(CategoryRules(entries))
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E> {
                Ok(CategoryRules::default())
            }

            fn visit_none<E>(self) -> Result<Self::Value, E> {
                Ok(CategoryRules::default())
            }
        }

        deserializer.deserialize_any(RulesVisitor)
    }
}

impl AppConfig {
    /// Load config from an explicit path, or from the first file found in
    /// `./config/default.yaml` then `~/.config/preset-qualifier/config.yaml`.
    /// Falls back to defaults only when no file exists at all; a file that
    /// exists but can't be read or parsed is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => Self::discover(),
        };

        match path {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut config =
            Self::from_yaml_str(&contents, base_dir).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.source_file = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse YAML text. Relative paths in the result resolve against `base_dir`.
    pub fn from_yaml_str(contents: &str, base_dir: PathBuf) -> Result<Self, serde_yaml::Error> {
        let mut config = if contents.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str::<AppConfig>(contents)?
        };
        config.base_dir = base_dir;
        Ok(config)
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from("config").join("default.yaml");
        if local.exists() {
            return Some(local);
        }
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.yaml"))
            .filter(|p| p.exists())
    }

    fn resolve(&self, value: &Option<PathBuf>, key: &'static str) -> Result<PathBuf, ConfigError> {
        let path = value.as_ref().ok_or(ConfigError::MissingPath(key))?;
        if path.is_absolute() {
            Ok(path.clone())
        } else {
            Ok(self.base_dir.join(path))
        }
    }

    pub fn source_folder(&self) -> Result<PathBuf, ConfigError> {
        self.resolve(&self.paths.source_folder, "source_folder")
    }

    pub fn clean_preset_folder(&self) -> Result<PathBuf, ConfigError> {
        self.resolve(&self.paths.clean_preset_folder, "clean_preset_folder")
    }

    pub fn metadata_file(&self) -> Result<PathBuf, ConfigError> {
        self.resolve(&self.paths.metadata_file, "metadata_file")
    }

    pub fn preview_folder(&self) -> Result<PathBuf, ConfigError> {
        self.resolve(&self.paths.preview_folder, "preview_folder")
    }

    pub fn analysis_results(&self) -> Result<PathBuf, ConfigError> {
        self.resolve(&self.paths.analysis_results, "analysis_results")
    }

    pub fn output_dir(&self) -> Result<PathBuf, ConfigError> {
        self.resolve(&self.paths.output_dir, "output_dir")
    }

    /// Optional log file; `None` when unset.
    pub fn log_file(&self) -> Option<PathBuf> {
        self.resolve(&self.paths.log_file, "log_file").ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
paths:
  source_folder: raw/presets
  clean_preset_folder: /abs/clean
audio:
  sample_rate: 22050
vst:
  supported_extensions: [".fxp"]
categories:
  SYNTH_BASS:
    keywords: ["bass", "sub"]
    subcategory: SYNTH
    note: 36
  KICK:
    keywords: ["kick"]
    preview_length_ms: 1000
  ARP:
    keywords: ["arp"]
default_category: OTHER
"#;

    #[test]
    fn parses_sections_and_defaults() {
        let config = AppConfig::from_yaml_str(SAMPLE, PathBuf::from("/project")).unwrap();
        assert_eq!(config.audio.sample_rate, 22050);
        assert_eq!(config.audio.preview_length_ms, 5000);
        assert_eq!(config.audio.other_note, 60);
        assert_eq!(config.vst.supported_extensions, vec![".fxp"]);
        assert_eq!(config.default_category, "OTHER");
        assert_eq!(config.default_subcategory, "UNTITLED");
    }

    #[test]
    fn mapping_categories_keep_file_order() {
        let config = AppConfig::from_yaml_str(SAMPLE, PathBuf::new()).unwrap();
        let names: Vec<&str> = config.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["SYNTH_BASS", "KICK", "ARP"]);
        assert_eq!(config.categories.0[0].settings.note, Some(36));
        assert_eq!(config.categories.0[1].settings.subcategory, None);
    }

    #[test]
    fn list_categories_are_accepted() {
        let yaml = r#"
categories:
  - name: PAD
    keywords: ["pad"]
    subcategory: ATMOS
  - name: LEAD
    keywords: ["lead"]
"#;
        let config = AppConfig::from_yaml_str(yaml, PathBuf::new()).unwrap();
        assert_eq!(config.categories.len(), 2);
        assert_eq!(config.categories.0[0].name, "PAD");
        assert_eq!(config.categories.0[0].settings.subcategory.as_deref(), Some("ATMOS"));
        assert_eq!(config.categories.0[1].name, "LEAD");
    }

    #[test]
    fn empty_document_is_default() {
        let config = AppConfig::from_yaml_str("  \n", PathBuf::new()).unwrap();
        assert!(config.categories.is_empty());
        assert_eq!(config.audio.sample_rate, 44100);
        assert_eq!(config.vst.supported_extensions, vec![".fxp", ".serumpreset"]);
    }

    #[test]
    fn relative_paths_resolve_against_base_dir() {
        let config = AppConfig::from_yaml_str(SAMPLE, PathBuf::from("/project")).unwrap();
        assert_eq!(
            config.source_folder().unwrap(),
            PathBuf::from("/project/raw/presets")
        );
        assert_eq!(config.clean_preset_folder().unwrap(), PathBuf::from("/abs/clean"));
    }

    #[test]
    fn missing_path_is_reported_by_key() {
        let config = AppConfig::from_yaml_str(SAMPLE, PathBuf::new()).unwrap();
        match config.output_dir() {
            Err(ConfigError::MissingPath(key)) => assert_eq!(key, "output_dir"),
            other => panic!("expected MissingPath, got {:?}", other),
        }
        assert!(config.log_file().is_none());
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn from_file_records_its_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "audio:\n  sample_rate: 48000\n").unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.source_file.as_deref(), Some(path.as_path()));
        assert_eq!(config.base_dir, dir.path());
        assert_eq!(config.audio.sample_rate, 48000);

        assert!(AppConfig::default().source_file.is_none());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "audio: [unclosed").unwrap();
        let err = AppConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
