use std::collections::HashSet;
use std::path::Path;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::config::TriageConfig;

#[derive(Debug)]
pub struct RuleSet {
    hidden: NameMatcher,
    exclusions: NameMatcher,
    noise_substrings: Vec<String>,
    default_applications: HashSet<String>,
}

impl RuleSet {
    pub fn from_config(config: &TriageConfig, warnings: &mut Vec<String>) -> Self {
        Self {
            hidden: NameMatcher::new(&config.hidden_name_patterns, warnings),
            exclusions: NameMatcher::new(&config.secondary_exclusions, warnings),
            noise_substrings: config
                .noise_substrings
                .iter()
                .map(|value| value.trim().to_lowercase())
                .filter(|value| !value.is_empty())
                .collect(),
            default_applications: config
                .default_applications
                .iter()
                .map(|name| bundle_base_name(name).to_lowercase())
                .collect(),
        }
    }

    pub fn is_hidden_name(&self, name: &str) -> bool {
        self.hidden.is_match(name)
    }

    pub fn is_noise_path(&self, path: &Path) -> bool {
        if self.noise_substrings.is_empty() {
            return false;
        }
        let lowered = path.to_string_lossy().replace('\\', "/").to_lowercase();
        self.noise_substrings
            .iter()
            .any(|pattern| lowered.contains(pattern))
    }

    pub fn is_whitelisted_default(&self, name: &str) -> bool {
        self.default_applications
            .contains(&bundle_base_name(name).to_lowercase())
    }

    pub fn is_excluded_child(&self, name: &str) -> bool {
        self.exclusions.is_match(name)
    }
}

pub fn bundle_base_name(name: &str) -> &str {
    let len = name.len();
    if len > 4 && name.is_char_boundary(len - 4) && name[len - 4..].eq_ignore_ascii_case(".app") {
        &name[..len - 4]
    } else {
        name
    }
}

#[derive(Debug)]
struct NameMatcher {
    globset: Option<GlobSet>,
    literals: Vec<String>,
}

impl NameMatcher {
    fn new(patterns: &[String], warnings: &mut Vec<String>) -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut literals = Vec::new();
        let mut globs = 0_usize;
        for pattern in patterns {
            let pattern = pattern.trim();
            if pattern.is_empty() {
                continue;
            }

            if is_plain_pattern(pattern) {
                literals.push(pattern.to_lowercase());
                continue;
            }

            match GlobBuilder::new(pattern).case_insensitive(true).build() {
                Ok(glob) => {
                    builder.add(glob);
                    globs += 1;
                }
                Err(err) => {
                    warnings.push(format!(
                        "invalid name pattern '{pattern}': {err}; matching it literally."
                    ));
                    literals.push(pattern.to_lowercase());
                }
            }
        }

        let globset = if globs == 0 {
            None
        } else {
            match builder.build() {
                Ok(set) => Some(set),
                Err(err) => {
                    warnings.push(format!(
                        "failed to compile name patterns: {err}; glob matching disabled."
                    ));
                    None
                }
            }
        };

        Self { globset, literals }
    }

    fn is_match(&self, name: &str) -> bool {
        if let Some(globset) = &self.globset {
            if globset.is_match(name) {
                return true;
            }
        }
        if self.literals.is_empty() {
            return false;
        }
        let lowered = name.to_lowercase();
        self.literals.iter().any(|literal| *literal == lowered)
    }
}

fn is_plain_pattern(pattern: &str) -> bool {
    !pattern
        .chars()
        .any(|ch| matches!(ch, '*' | '?' | '[' | ']' | '{' | '}'))
}
