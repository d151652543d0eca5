use crate::fsutil::stem_of;
use std::collections::HashMap;
use std::io;
use std::path::Path;

/// Cleaned preset filenames keyed by their stem.
#[derive(Debug, Default)]
pub struct PresetLookup {
    by_stem: HashMap<String, String>,
}

impl PresetLookup {
    /// List `folder` (non-recursive, dot-files skipped). Entries are visited
    /// in name order; when two names share a stem the later one wins.
    pub fn build(folder: &Path) -> io::Result<Self> {
        let mut names: Vec<String> = std::fs::read_dir(folder)?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| !name.starts_with('.'))
            .collect();
        names.sort();

        let mut lookup = Self::default();
        for name in names {
            lookup.insert(name);
        }
        Ok(lookup)
    }

    pub fn insert(&mut self, filename: String) {
        self.by_stem.insert(stem_of(&filename), filename);
    }

    pub fn get(&self, stem: &str) -> Option<&str> {
        self.by_stem.get(stem).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_stem.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_stem.is_empty()
    }
}

/// Preset join key for an analyzed preview: the filename with two
/// extensions removed, so `lead.fxp.wav` -> `lead`. Previews named without
/// the embedded preset suffix lose a real part of their name instead
/// (`kick.01.wav` -> `kick`).
pub fn preset_base_name(audio_filename: &str) -> String {
    stem_of(&stem_of(audio_filename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn keys_by_stem_and_skips_dot_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("KICK_DRUMS_kick_01.fxp"), b"k").unwrap();
        fs::write(dir.path().join("BASS_SYNTH_Deep.SerumPreset"), b"b").unwrap();
        fs::write(dir.path().join(".DS_Store"), b"").unwrap();

        let lookup = PresetLookup::build(dir.path()).unwrap();
        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup.get("KICK_DRUMS_kick_01"), Some("KICK_DRUMS_kick_01.fxp"));
        assert_eq!(lookup.get("BASS_SYNTH_Deep"), Some("BASS_SYNTH_Deep.SerumPreset"));
        assert_eq!(lookup.get(".DS_Store"), None);
        assert_eq!(lookup.get(""), None);
    }

    #[test]
    fn duplicate_stems_keep_last_by_name() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("lead.fxp"), b"").unwrap();
        fs::write(dir.path().join("lead.serumpreset"), b"").unwrap();

        let lookup = PresetLookup::build(dir.path()).unwrap();
        assert_eq!(lookup.len(), 1);
        assert_eq!(lookup.get("lead"), Some("lead.serumpreset"));
    }

    #[test]
    fn unreadable_folder_is_an_error() {
        assert!(PresetLookup::build(Path::new("/no/such/folder")).is_err());
    }

    #[test]
    fn base_name_strips_two_extensions() {
        assert_eq!(preset_base_name("KICK_DRUMS_kick_01.fxp.wav"), "KICK_DRUMS_kick_01");
        assert_eq!(preset_base_name("lead.serumpreset.wav"), "lead");
    }

    #[test]
    fn base_name_without_embedded_suffix_is_unchanged_or_truncated() {
        // Single-extension previews keep their stem...
        assert_eq!(preset_base_name("kick_01.wav"), "kick_01");
        // ...but a dotted stem loses its last segment.
        assert_eq!(preset_base_name("kick.01.wav"), "kick");
    }
}
