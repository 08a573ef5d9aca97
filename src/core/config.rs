//! Configuration types for the norn driver.
//!
//! The structures here mirror what the CLI and library callers can tune:
//! which messages are enabled, how confident a finding must be to survive,
//! how many workers a run may use, and checker-specific options.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::errors::{NornError, Result};
use crate::core::msgs::Confidence;

/// Main configuration for a norn run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NornConfig {
    /// Message enablement and confidence filtering
    #[serde(default)]
    pub messages: MessagesConfig,

    /// Run-level settings
    #[serde(default)]
    pub run: RunConfig,

    /// Duplicate-line detection options
    #[serde(default)]
    pub similarity: SimilarityConfig,

    /// Raw line-checker options
    #[serde(default)]
    pub raw: RawConfig,
}

impl NornConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            NornError::io(format!("failed to read config file: {}", path.display()), e)
        })?;
        let config: NornConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as YAML.
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate field ranges; returns the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.run.jobs == 0 {
            return Err(NornError::config_field("jobs must be at least 1", "run.jobs"));
        }
        if self.similarity.min_similarity_lines == 0 {
            return Err(NornError::config_field(
                "min_similarity_lines must be at least 1",
                "similarity.min_similarity_lines",
            ));
        }
        if self.raw.max_line_length == 0 {
            return Err(NornError::config_field(
                "max_line_length must be at least 1",
                "raw.max_line_length",
            ));
        }
        if let Some(levels) = &self.messages.confidence {
            for level in levels {
                level.parse::<Confidence>()?;
            }
        }
        Ok(())
    }

    /// The running tool version, used for message version gates.
    pub fn tool_version() -> (u16, u16) {
        let mut parts = env!("CARGO_PKG_VERSION").split('.');
        let major = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        (major, minor)
    }
}

/// Which messages may fire, and at what confidence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagesConfig {
    /// Names (ids, symbols, category letters, checker names, `all`) to
    /// enable; applied after `disable`
    #[serde(default)]
    pub enable: Vec<String>,

    /// Names to disable; applied first
    #[serde(default)]
    pub disable: Vec<String>,

    /// Confidence allow-list; `None` disables confidence filtering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Vec<String>>,
}

/// Run-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Worker count; 1 selects the sequential driver
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig { jobs: default_jobs() }
    }
}

fn default_jobs() -> usize {
    1
}

/// Options for the duplicate-line detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Minimum number of content-bearing matching lines to report
    #[serde(default = "default_min_similarity_lines")]
    pub min_similarity_lines: usize,

    /// Strip comments before comparison
    #[serde(default = "default_true")]
    pub ignore_comments: bool,

    /// Strip doc-string lines before comparison
    #[serde(default = "default_true")]
    pub ignore_docstrings: bool,

    /// Strip import statements before comparison
    #[serde(default)]
    pub ignore_imports: bool,

    /// Strip callable signature lines before comparison
    #[serde(default)]
    pub ignore_signatures: bool,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        SimilarityConfig {
            min_similarity_lines: default_min_similarity_lines(),
            ignore_comments: true,
            ignore_docstrings: true,
            ignore_imports: false,
            ignore_signatures: false,
        }
    }
}

fn default_min_similarity_lines() -> usize {
    4
}

fn default_true() -> bool {
    true
}

/// Options for the raw line checkers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawConfig {
    /// Maximum allowed physical line length
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

impl Default for RawConfig {
    fn default() -> Self {
        RawConfig {
            max_line_length: default_max_line_length(),
        }
    }
}

fn default_max_line_length() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        NornConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_jobs_is_rejected_with_field_context() {
        let mut config = NornConfig::default();
        config.run.jobs = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            NornError::Config { field: Some(ref f), .. } if f == "run.jobs"
        ));
    }

    #[test]
    fn unknown_confidence_level_is_rejected() {
        let mut config = NornConfig::default();
        config.messages.confidence = Some(vec!["VERY_SURE".to_string()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn yaml_round_trip() {
        let mut config = NornConfig::default();
        config.run.jobs = 4;
        config.messages.disable = vec!["C".to_string()];
        config.similarity.min_similarity_lines = 6;

        let yaml = config.to_yaml_string().unwrap();
        let parsed: NornConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }
}
