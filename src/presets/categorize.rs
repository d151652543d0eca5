use regex::Regex;
use std::sync::LazyLock;

use crate::config::AppConfig;

// Separators that all read as a word break in preset names.
static SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[_\-\s]+").unwrap());

// Preset suffixes stripped wherever they appear, regardless of config.
static PRESET_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\.fxp|\.serumpreset)").unwrap());

/// Where a preset lands and how its preview should be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub category: String,
    pub subcategory: String,
    pub note: i32,
    pub preview_length_ms: u32,
}

/// One keyword rule with all defaults already applied.
#[derive(Debug, Clone)]
pub struct CategoryRule {
    pub name: String,
    /// Compared as written against the lowercased name; any substring hit
    /// selects the rule.
    pub keywords: Vec<String>,
    pub subcategory: String,
    pub note: i32,
    pub preview_length_ms: u32,
}

/// Keyword-based preset classifier. Rules are tried in configuration order.
#[derive(Debug, Clone)]
pub struct Categorizer {
    rules: Vec<CategoryRule>,
    fallback: Category,
    extensions: Vec<String>,
}

impl Categorizer {
    pub fn new(rules: Vec<CategoryRule>, fallback: Category, extensions: Vec<String>) -> Self {
        let extensions = extensions.into_iter().map(|e| e.to_lowercase()).collect();
        Self {
            rules,
            fallback,
            extensions,
        }
    }

    /// Build rules from config, filling unset per-rule fields from the
    /// global defaults (`default_subcategory`, `audio.other_note`,
    /// `audio.preview_length_ms`).
    pub fn from_config(config: &AppConfig) -> Self {
        let rules = config
            .categories
            .iter()
            .map(|entry| CategoryRule {
                name: entry.name.clone(),
                keywords: entry.settings.keywords.clone(),
                subcategory: entry
                    .settings
                    .subcategory
                    .clone()
                    .unwrap_or_else(|| config.default_subcategory.clone()),
                note: entry.settings.note.unwrap_or(config.audio.other_note),
                preview_length_ms: entry
                    .settings
                    .preview_length_ms
                    .unwrap_or(config.audio.preview_length_ms),
            })
            .collect();

        let fallback = Category {
            category: config.default_category.clone(),
            subcategory: config.default_subcategory.clone(),
            note: config.audio.other_note,
            preview_length_ms: config.audio.preview_length_ms,
        };

        Self::new(rules, fallback, config.vst.supported_extensions.clone())
    }

    /// Lowercase the name, turn separator runs into single spaces, strip
    /// preset extensions and trim.
    pub fn normalize_name(&self, filename: &str) -> String {
        let lowered = filename.to_lowercase();
        let spaced = SEPARATOR_RE.replace_all(&lowered, " ");
        let mut name = PRESET_SUFFIX_RE.replace_all(&spaced, "").into_owned();
        for ext in &self.extensions {
            if !ext.is_empty() {
                name = name.replace(ext.as_str(), "");
            }
        }
        name.trim().to_string()
    }

    /// Classify a preset filename. The first rule (in config order) with a
    /// keyword contained in the normalized name wins; no scoring.
    pub fn categorize(&self, filename: &str) -> Category {
        let name = self.normalize_name(filename);

        for rule in &self.rules {
            if rule.keywords.iter().any(|kw| name.contains(kw.as_str())) {
                log::trace!("{} matched category {}", filename, rule.name);
                return Category {
                    category: rule.name.clone(),
                    subcategory: rule.subcategory.clone(),
                    note: rule.note,
                    preview_length_ms: rule.preview_length_ms,
                };
            }
        }

        self.fallback.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn categorizer(yaml: &str) -> Categorizer {
        let config = AppConfig::from_yaml_str(yaml, PathBuf::new()).unwrap();
        Categorizer::from_config(&config)
    }

    const RULES: &str = r#"
audio:
  preview_length_ms: 4000
  other_note: 48
categories:
  KICK:
    keywords: ["kick", "bd"]
    subcategory: DRUMS
    note: 36
    preview_length_ms: 1000
  BASS:
    keywords: ["bass"]
    subcategory: LOW
  LEAD:
    keywords: ["lead", "Saw"]
default_category: MISC
default_subcategory: OTHER
"#;

    #[test]
    fn normalizes_separators_case_and_extension() {
        let c = categorizer(RULES);
        assert_eq!(c.normalize_name("My_Deep--Bass  01.fxp"), "my deep bass 01");
        assert_eq!(c.normalize_name("  Lead.SerumPreset "), "lead");
        assert_eq!(c.normalize_name("pad.fxp.bak"), "pad.bak");
    }

    #[test]
    fn first_matching_rule_wins() {
        let c = categorizer(RULES);
        let cat = c.categorize("Kick_Hard.fxp");
        assert_eq!(
            cat,
            Category {
                category: "KICK".into(),
                subcategory: "DRUMS".into(),
                note: 36,
                preview_length_ms: 1000,
            }
        );
    }

    #[test]
    fn overlapping_keywords_respect_config_order() {
        // "kick bass" hits both KICK and BASS; KICK is listed first.
        let c = categorizer(RULES);
        assert_eq!(c.categorize("kick_bass.fxp").category, "KICK");

        let reversed = r#"
categories:
  BASS:
    keywords: ["bass"]
  KICK:
    keywords: ["kick"]
"#;
        let c = categorizer(reversed);
        assert_eq!(c.categorize("kick_bass.fxp").category, "BASS");
    }

    #[test]
    fn rule_gaps_fall_back_to_globals() {
        let c = categorizer(RULES);
        let cat = c.categorize("Wobble Bass.fxp");
        assert_eq!(cat.category, "BASS");
        assert_eq!(cat.subcategory, "LOW");
        assert_eq!(cat.note, 48);
        assert_eq!(cat.preview_length_ms, 4000);

        let lead = c.categorize("Lead_Pluck.fxp");
        assert_eq!(lead.category, "LEAD");
        assert_eq!(lead.subcategory, "OTHER");
        assert_eq!(lead.note, 48);
    }

    #[test]
    fn keywords_are_not_case_folded() {
        // Names are lowercased before matching, keywords are not, so an
        // uppercase keyword can never hit.
        let c = categorizer(RULES);
        assert_eq!(c.categorize("SuperSaw.fxp").category, "MISC");
        assert_eq!(c.categorize("Saw Wave.fxp").category, "MISC");
    }

    #[test]
    fn unmatched_gets_default_category() {
        let c = categorizer(RULES);
        let cat = c.categorize("Ambient Texture.fxp");
        assert_eq!(cat.category, "MISC");
        assert_eq!(cat.subcategory, "OTHER");
        assert_eq!(cat.note, 48);
        assert_eq!(cat.preview_length_ms, 4000);
    }

    #[test]
    fn keywords_match_across_separators() {
        let c = categorizer("categories:\n  PLUCK:\n    keywords: [\"soft pluck\"]\n");
        assert_eq!(c.categorize("Soft-Pluck_03.fxp").category, "PLUCK");
        assert_eq!(c.categorize("SoftPluck.fxp").category, "UNKNOWN");
    }

    #[test]
    fn extension_is_not_matched_as_keyword() {
        let c = categorizer("categories:\n  FX:\n    keywords: [\"fxp\"]\n");
        assert_eq!(c.categorize("Riser.fxp").category, "UNKNOWN");
    }
}
