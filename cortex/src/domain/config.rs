// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Judgement Configuration Types
//
// Defines the YAML schema for configuring a judgement link:
// - Distance metric selection
// - Skip thresholds
// - Learning-rate bounds
// - Update-scope thresholds and parameter sets
// - History capacity and activity window

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::metric::MetricType;
use super::policy::{
    string_set, AdaptiveLearningRatePolicy, ThresholdSkipPolicy, ThresholdUpdateScopePolicy,
};

/// Default number of judgements retained per link.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Top-level judgement configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgementConfig {
    /// Distance metric used to compare expected and actual patterns
    #[serde(default = "default_metric")]
    pub metric: MetricType,

    /// Maximum number of judgements kept in a link's history
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// A link reports recent activity if it judged within this many seconds
    #[serde(default = "default_activity_window_seconds")]
    pub activity_window_seconds: u64,

    #[serde(default)]
    pub skip: SkipConfig,

    #[serde(default)]
    pub learning_rate: LearningRateConfig,

    #[serde(default)]
    pub update_scope: UpdateScopeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipConfig {
    pub low_threshold: f64,
    pub high_threshold: f64,
}

impl Default for SkipConfig {
    fn default() -> Self {
        Self {
            low_threshold: 0.01,
            high_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningRateConfig {
    pub base_rate: f64,
    #[serde(default = "default_scaling_factor")]
    pub scaling_factor: f64,
    pub min_rate: f64,
    pub max_rate: f64,
}

impl Default for LearningRateConfig {
    fn default() -> Self {
        Self {
            base_rate: 0.01,
            scaling_factor: default_scaling_factor(),
            min_rate: 1e-4,
            max_rate: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateScopeConfig {
    pub low_threshold: f64,
    pub high_threshold: f64,
    pub focused_parameters: BTreeSet<String>,
    pub default_parameters: BTreeSet<String>,
    pub full_parameters: BTreeSet<String>,
}

impl Default for UpdateScopeConfig {
    fn default() -> Self {
        Self {
            low_threshold: 0.1,
            high_threshold: 0.7,
            focused_parameters: string_set(&["output_bias"]),
            default_parameters: string_set(&["output_weights", "output_bias"]),
            full_parameters: string_set(&[
                "input_weights",
                "hidden_weights",
                "output_weights",
                "output_bias",
            ]),
        }
    }
}

fn default_metric() -> MetricType {
    MetricType::Cosine
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_activity_window_seconds() -> u64 {
    60
}

fn default_scaling_factor() -> f64 {
    1.0
}

impl Default for JudgementConfig {
    fn default() -> Self {
        Self {
            metric: default_metric(),
            history_capacity: default_history_capacity(),
            activity_window_seconds: default_activity_window_seconds(),
            skip: SkipConfig::default(),
            learning_rate: LearningRateConfig::default(),
            update_scope: UpdateScopeConfig::default(),
        }
    }
}

impl JudgementConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Candidate config locations, highest precedence first:
    /// `$PCORTEX_CONFIG_PATH`, `./pcortex-config.yaml`, `~/.pcortex/config.yaml`,
    /// then the system-wide file for the platform.
    pub fn search_paths() -> Vec<PathBuf> {
        let env_path = std::env::var_os("PCORTEX_CONFIG_PATH").map(PathBuf::from);
        let user_path = dirs::home_dir().map(|home| home.join(".pcortex").join("config.yaml"));

        #[cfg(windows)]
        let system_path = PathBuf::from(r"C:\ProgramData\PCortex\config.yaml");
        #[cfg(not(windows))]
        let system_path = PathBuf::from("/etc/pcortex/config.yaml");

        env_path
            .into_iter()
            .chain(std::iter::once(PathBuf::from("pcortex-config.yaml")))
            .chain(user_path)
            .chain(std::iter::once(system_path))
            .collect()
    }

    /// First entry of [`Self::search_paths`] that exists on disk.
    pub fn discover_config() -> Option<PathBuf> {
        Self::search_paths().into_iter().find(|path| path.is_file())
    }

    /// Load from `cli_path` when given (it must exist), else from the first
    /// discovered file, else defaults. Environment overrides apply last in
    /// every case.
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let source = match cli_path {
            Some(path) => Some(path),
            None => Self::discover_config(),
        };

        let mut config = match source {
            Some(path) => {
                tracing::info!(path = %path.display(), "Reading judgement config");
                Self::from_yaml_file(&path)
                    .with_context(|| format!("Failed to load config at {}", path.display()))?
            }
            None => {
                tracing::warn!("No judgement config found; using built-in defaults");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PCORTEX_METRIC") {
            match val.parse::<MetricType>() {
                Ok(metric) => {
                    tracing::info!("Environment override: PCORTEX_METRIC={}", metric);
                    self.metric = metric;
                }
                Err(e) => {
                    tracing::warn!("Invalid value for PCORTEX_METRIC: '{}' ({}). Ignoring.", val, e);
                }
            }
        }

        if let Ok(val) = std::env::var("PCORTEX_HISTORY_CAPACITY") {
            match val.parse::<usize>() {
                Ok(capacity) if capacity > 0 => {
                    tracing::info!("Environment override: PCORTEX_HISTORY_CAPACITY={}", capacity);
                    self.history_capacity = capacity;
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for PCORTEX_HISTORY_CAPACITY: '{}'. Expected a positive integer. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.history_capacity == 0 {
            anyhow::bail!("history_capacity must be greater than zero");
        }
        self.skip_policy()
            .map_err(|e| anyhow::anyhow!("Invalid skip configuration: {}", e))?;
        self.learning_rate_policy()
            .map_err(|e| anyhow::anyhow!("Invalid learning_rate configuration: {}", e))?;
        self.update_scope_policy()
            .map_err(|e| anyhow::anyhow!("Invalid update_scope configuration: {}", e))?;
        Ok(())
    }

    pub fn skip_policy(&self) -> crate::domain::JudgementResult<ThresholdSkipPolicy> {
        ThresholdSkipPolicy::new(self.skip.low_threshold, self.skip.high_threshold)
    }

    pub fn learning_rate_policy(&self) -> crate::domain::JudgementResult<AdaptiveLearningRatePolicy> {
        AdaptiveLearningRatePolicy::new(
            self.learning_rate.base_rate,
            self.learning_rate.scaling_factor,
            self.learning_rate.min_rate,
            self.learning_rate.max_rate,
        )
    }

    pub fn update_scope_policy(&self) -> crate::domain::JudgementResult<ThresholdUpdateScopePolicy> {
        ThresholdUpdateScopePolicy::new(
            self.update_scope.low_threshold,
            self.update_scope.high_threshold,
            self.update_scope.focused_parameters.clone(),
            self.update_scope.default_parameters.clone(),
            self.update_scope.full_parameters.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = JudgementConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.metric, MetricType::Cosine);
        assert_eq!(config.history_capacity, 100);
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = JudgementConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed = JudgementConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
metric: kl_divergence
skip:
  low_threshold: 0.05
  high_threshold: 0.4
"#;
        let config = JudgementConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.metric, MetricType::KlDivergence);
        assert_eq!(config.skip.low_threshold, 0.05);
        assert_eq!(config.learning_rate, LearningRateConfig::default());
        assert_eq!(config.history_capacity, DEFAULT_HISTORY_CAPACITY);
    }

    #[test]
    fn test_unknown_metric_rejected() {
        assert!(JudgementConfig::from_yaml_str("metric: manhattan").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = JudgementConfig::default();
        config.skip.low_threshold = 0.9;
        assert!(config.validate().is_err());

        let mut config = JudgementConfig::default();
        config.history_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = JudgementConfig::default();
        config.learning_rate.min_rate = 1.0;
        assert!(config.validate().is_err());

        let mut config = JudgementConfig::default();
        config.update_scope.full_parameters.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pcortex-config.yaml");

        let mut config = JudgementConfig::default();
        config.metric = MetricType::EarthMovers;
        config.to_yaml_file(&path).unwrap();

        let loaded = JudgementConfig::load_or_default(Some(path)).unwrap();
        assert_eq!(loaded.skip, config.skip);
        assert_eq!(loaded.update_scope, config.update_scope);
    }

    #[test]
    fn test_missing_explicit_path_fails() {
        let result = JudgementConfig::load_or_default(Some(PathBuf::from("/nonexistent/pcortex.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_search_paths_precedence() {
        let paths = JudgementConfig::search_paths();
        let local = paths
            .iter()
            .position(|p| p == Path::new("pcortex-config.yaml"))
            .unwrap();
        let system = paths.len() - 1;

        assert!(local < system);
        assert!(paths[system].ends_with("config.yaml"));
        assert!(paths[system].is_absolute());
        if let Some(home) = dirs::home_dir() {
            let user = paths.iter().position(|p| p.starts_with(&home)).unwrap();
            assert!(local < user && user < system);
        }
    }
}
