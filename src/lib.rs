pub mod analyzer;
pub mod config;
pub mod fsutil;
pub mod presets;
pub mod qualify;

/// Audio preview extensions picked up by the batch analyzer (flat scan).
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "aif", "aiff"];

/// Extension the sorter expects on analyzed preview filenames.
pub const SORTED_AUDIO_EXTENSION: &str = ".wav";

/// Preset extension assumed when no cleaned preset matches a preview.
pub const DEFAULT_PRESET_EXTENSION: &str = ".fxp";

/// Application name for XDG paths
pub const APP_NAME: &str = "preset-qualifier";
