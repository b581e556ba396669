//! Configuration loading and validation for loopcraft.
//!
//! Loads configuration from a TOML file with environment variable
//! overrides. Validates all settings at startup; the resulting `AppConfig`
//! is read-only afterwards — the loops take their budgets and thresholds
//! from it at construction time and never consult it again.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// The root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default model name
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per completion
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Reasoning loop budgets
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// Quality judge and improvement loop settings
    #[serde(default)]
    pub quality: QualityConfig,

    /// Stability verification settings
    #[serde(default)]
    pub stability: StabilityConfig,
}

fn default_model() -> String {
    "claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

/// Budgets for the ReAct reasoning loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Maximum reason-act-observe iterations before the loop aborts.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Seconds to wait on a single tool call before abandoning it.
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Character cap applied to tool output before it is shown to the model.
    #[serde(default = "default_observation_cap")]
    pub observation_cap: usize,
}

fn default_max_iterations() -> u32 {
    20
}
fn default_tool_timeout_secs() -> u64 {
    300
}
fn default_observation_cap() -> usize {
    10_000
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tool_timeout_secs: default_tool_timeout_secs(),
            observation_cap: default_observation_cap(),
        }
    }
}

/// Quality threshold and improvement budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// An answer with overall score below this is a candidate for improvement.
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Maximum regenerate-and-rejudge rounds per answer.
    #[serde(default = "default_improvement_iterations")]
    pub max_improvement_iterations: u32,
}

fn default_threshold() -> f64 {
    0.75
}
fn default_improvement_iterations() -> u32 {
    2
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            max_improvement_iterations: default_improvement_iterations(),
        }
    }
}

/// Stability verification budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityConfig {
    /// Consecutive successful runs required to call an artifact stable.
    #[serde(default = "default_required_runs")]
    pub required_runs: u32,

    /// Regenerate-and-retry cycles allowed before giving up.
    #[serde(default = "default_max_fix_attempts")]
    pub max_fix_attempts: u32,

    /// Pause between successful runs, in milliseconds. Inserted only
    /// between successes so timing-sensitive failures are not masked.
    #[serde(default = "default_run_pause_ms")]
    pub run_pause_ms: u64,
}

fn default_required_runs() -> u32 {
    3
}
fn default_max_fix_attempts() -> u32 {
    3
}
fn default_run_pause_ms() -> u64 {
    500
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            required_runs: default_required_runs(),
            max_fix_attempts: default_max_fix_attempts(),
            run_pause_ms: default_run_pause_ms(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            reasoning: ReasoningConfig::default(),
            quality: QualityConfig::default(),
            stability: StabilityConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// Load configuration from a TOML file, apply environment overrides,
    /// and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: AppConfig = toml::from_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        debug!(model = %config.default_model, "Configuration loaded");
        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(model) = std::env::var("LOOPCRAFT_MODEL") {
            self.default_model = model;
        }
        if let Ok(temp) = std::env::var("LOOPCRAFT_TEMPERATURE")
            && let Ok(parsed) = temp.parse::<f32>()
        {
            self.default_temperature = parsed;
        }
        if let Ok(max_iter) = std::env::var("LOOPCRAFT_MAX_ITERATIONS")
            && let Ok(parsed) = max_iter.parse::<u32>()
        {
            self.reasoning.max_iterations = parsed;
        }
    }

    /// Validate ranges. Budgets must be at least 1; the threshold and
    /// temperature must be within their unit ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.quality.threshold) {
            return Err(ConfigError::Invalid(format!(
                "quality.threshold must be within [0, 1], got {}",
                self.quality.threshold
            )));
        }
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::Invalid(format!(
                "default_temperature must be within [0, 2], got {}",
                self.default_temperature
            )));
        }
        if self.reasoning.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "reasoning.max_iterations must be at least 1".into(),
            ));
        }
        if self.reasoning.observation_cap == 0 {
            return Err(ConfigError::Invalid(
                "reasoning.observation_cap must be at least 1".into(),
            ));
        }
        if self.stability.required_runs == 0 {
            return Err(ConfigError::Invalid(
                "stability.required_runs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
