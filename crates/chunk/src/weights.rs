use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid weight config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Weight multiplier for a tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagWeight {
    pub tag: String,
    pub weight: f32,
}

/// Weight multiplier for a status value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusWeight {
    pub status: String,
    pub weight: f32,
}

/// Customizable retrieval weighting: per-tag and per-status multipliers
/// applied to every chunk of a note at rerank time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightConfig {
    #[serde(default)]
    pub tag_weights: Vec<TagWeight>,

    #[serde(default)]
    pub status_weights: Vec<StatusWeight>,

    /// Weight when no tag rule matches.
    #[serde(default = "default_weight")]
    pub default_weight: f32,

    /// Multiply all matching tag weights instead of taking the maximum.
    #[serde(default)]
    pub multiply_tag_weights: bool,
}

fn default_weight() -> f32 {
    1.0
}

impl Default for WeightConfig {
    /// The shipped ruleset: Zettelkasten note kinds, PARA-style project
    /// tags, and the standard status ladder.
    fn default() -> Self {
        let tag = |tag: &str, weight: f32| TagWeight {
            tag: tag.to_string(),
            weight,
        };
        let status = |status: &str, weight: f32| StatusWeight {
            status: status.to_string(),
            weight,
        };
        Self {
            tag_weights: vec![
                tag("permanent-note", 1.3),
                tag("literature-note", 1.1),
                tag("fleeting-notes", 0.8),
                tag("reference", 1.0),
                tag("project", 1.2),
                tag("product", 1.1),
                tag("business", 1.1),
                tag("archive", 0.6),
                tag("customer-research", 1.25),
                tag("validation", 1.2),
                tag("vision", 1.3),
                tag("positioning", 1.15),
            ],
            status_weights: vec![
                status("active", 1.0),
                status("draft", 0.9),
                status("superseded", 0.5),
                status("deprecated", 0.5),
            ],
            default_weight: 1.0,
            multiply_tag_weights: false,
        }
    }
}

impl WeightConfig {
    /// Load from a JSON file; a missing file falls back to the shipped
    /// defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Final weight for a note: tag weight (max of matches, or product when
    /// `multiply_tag_weights`, else `default_weight`) times the first
    /// matching status weight.
    #[must_use]
    pub fn calculate(&self, tags: &[String], status: &str) -> f32 {
        let mut matched = false;
        let tag_weight = if self.multiply_tag_weights {
            let mut product = 1.0;
            for tag in tags {
                for rule in &self.tag_weights {
                    if tags_match(tag, &rule.tag) {
                        product *= rule.weight;
                        matched = true;
                    }
                }
            }
            if matched {
                product
            } else {
                self.default_weight
            }
        } else {
            let mut max = f32::NEG_INFINITY;
            for tag in tags {
                for rule in &self.tag_weights {
                    if tags_match(tag, &rule.tag) {
                        matched = true;
                        if rule.weight > max {
                            max = rule.weight;
                        }
                    }
                }
            }
            if matched {
                max
            } else {
                self.default_weight
            }
        };

        let status_weight = self
            .status_weights
            .iter()
            .find(|rule| rule.status.eq_ignore_ascii_case(status))
            .map_or(1.0, |rule| rule.weight);

        tag_weight * status_weight
    }
}

/// Case-insensitive tag comparison after stripping any `#` prefix.
fn tags_match(a: &str, b: &str) -> bool {
    a.trim_start_matches('#')
        .eq_ignore_ascii_case(b.trim_start_matches('#'))
}
