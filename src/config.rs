//! Service configuration
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! file (or no file) yields a working configuration.

use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::core::collaborators::SamplingConfig;
use crate::core::feedback::{default_rules, FeedbackRule};
use crate::types::VolumePrior;
use crate::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub gating: GatingConfig,
    pub estimator: EstimatorConfig,
    pub remediation: RemediationConfig,
    pub prompts: PromptConfig,
    pub feedback: FeedbackConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    pub log_level: String,
    /// Budget for each collaborator call
    pub upstream_timeout_ms: u64,
    /// How long the stream logger waits for a response to finish
    pub stream_log_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8000".to_string(),
            log_level: "info".to_string(),
            upstream_timeout_ms: 10_000,
            stream_log_timeout_ms: 120_000,
        }
    }
}

impl ServerConfig {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    pub fn stream_log_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_log_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatingConfig {
    pub containment_ceiling: f64,
    pub similarity_ceiling: f64,
    pub target_language: String,
}

impl Default for GatingConfig {
    fn default() -> Self {
        Self {
            containment_ceiling: crate::CONTAINMENT_CEILING,
            similarity_ceiling: crate::SIMILARITY_CEILING,
            target_language: crate::TARGET_LANGUAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub default_prior: VolumePrior,
    pub target_percentile: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            default_prior: VolumePrior::default(),
            target_percentile: crate::TARGET_PERCENTILE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemediationConfig {
    pub reading_rate: f64,
    pub candidate_count: usize,
    /// Least-similar hits must score at or below this
    pub search_threshold: f64,
    pub char_budget: usize,
    pub sampling: SamplingConfig,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            reading_rate: crate::READING_RATE,
            candidate_count: crate::REMEDIATION_CANDIDATES,
            search_threshold: 1.0,
            char_budget: crate::CHUNK_CHAR_BUDGET,
            sampling: SamplingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub pass: String,
    pub fail: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            pass: "Good job summarizing this page! You can move on to the next page.".to_string(),
            fail: "Before moving on, revisit the part of the page your summary missed.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub rules: Vec<FeedbackRule>,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self { rules: default_rules() }
    }
}

impl Config {
    /// Load from a TOML file, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_toml(&raw)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, value: f64| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(Error::Config(format!("{} must be within [0, 1], got {}", name, value)))
            }
        };
        unit("gating.containment_ceiling", self.gating.containment_ceiling)?;
        unit("gating.similarity_ceiling", self.gating.similarity_ceiling)?;

        let pct = self.estimator.target_percentile;
        if !(pct > 0.0 && pct < 1.0) {
            return Err(Error::Config(format!("estimator.target_percentile must be within (0, 1), got {}", pct)));
        }
        if !self.estimator.default_prior.is_proper() || self.estimator.default_prior.support <= 0.0 {
            return Err(Error::Config("estimator.default_prior needs alpha > 1 and support > 0".into()));
        }
        if !(self.remediation.reading_rate > 0.0) {
            return Err(Error::Config("remediation.reading_rate must be positive".into()));
        }
        if self.remediation.candidate_count == 0 || self.remediation.char_budget == 0 {
            return Err(Error::Config("remediation.candidate_count and char_budget must be non-zero".into()));
        }
        if self.gating.target_language.trim().is_empty() {
            return Err(Error::Config("gating.target_language must be set".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.feedback.rules.len(), default_rules().len());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [gating]
            containment_ceiling = 0.5

            [estimator.default_prior]
            mean = 1.0
            support = 4.0
            alpha = 3.0
            beta = 2.0
            "#,
        )
        .unwrap();
        assert_eq!(config.gating.containment_ceiling, 0.5);
        assert_eq!(config.gating.target_language, "en");
        assert_eq!(config.estimator.default_prior.mean, 1.0);
        assert_eq!(config.remediation.char_budget, crate::CHUNK_CHAR_BUDGET);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_comparator_rejected_at_load() {
        let err = Config::from_toml(
            r#"
            [[feedback.rules]]
            name = "content"
            comparator = "about"
            messages = ["no", "yes"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let mut config = Config::default();
        config.gating.containment_ceiling = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.estimator.default_prior.alpha = 1.0;
        assert!(config.validate().is_err());
    }
}
