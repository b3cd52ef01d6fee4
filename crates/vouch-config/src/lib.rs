//! Configuration management for Vouch
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. CLI arguments (highest precedence)
//! 2. Environment variables (VOUCH_* prefix, `__` between sections)
//! 3. vouch.local.toml (gitignored, local overrides)
//! 4. vouch.toml (git-tracked, project config)
//! 5. ~/.config/vouch/config.toml (user defaults)
//! 6. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::{LOCAL_CONFIG_FILE, PROJECT_CONFIG_FILE, Paths};

/// Main Vouch configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VouchConfig {
    pub engine: EngineConfig,
    pub validator: ValidatorConfig,
    pub normalizer: NormalizerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Submission files live under `<fs_root>/<release>/<project>/`.
    pub fs_root: PathBuf,
    /// Per-run error reports and normalized output.
    pub report_dir: PathBuf,
    /// Validations allowed to run at the same time.
    pub max_simultaneous: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fs_root: PathBuf::from("data/submissions"),
            report_dir: PathBuf::from("data/reports"),
            max_simultaneous: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Stop a file's structural checks at its first error.
    pub fail_fast: bool,
    /// Rows between cancellation polls.
    pub cancel_check_interval: u64,
    /// Rows between progress log lines.
    pub progress_log_interval: u64,
    /// Values that mean "not provided" in optional key columns.
    pub missing_codes: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            cancel_check_interval: 10_000,
            progress_log_interval: 1_000_000,
            missing_codes: vec!["-777".to_string(), "-888".to_string(), "-999".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Largest tolerated ratio of controlled to total observations.
    pub error_threshold: f64,
    /// Mark controlled observations without emitting masked copies.
    pub marking_only: bool,
    pub steps: StepsConfig,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            error_threshold: 0.1,
            marking_only: false,
            steps: StepsConfig::default(),
        }
    }
}

/// Enable flags for the optional normalization steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepsConfig {
    pub masking: bool,
    pub duplicates: bool,
}

impl Default for StepsConfig {
    fn default() -> Self {
        Self {
            masking: true,
            duplicates: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl VouchConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Read a single TOML file, without layering.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.max_simultaneous == 0 {
            return Err(ConfigError::ValidationError(
                "engine.max_simultaneous must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.normalizer.error_threshold) {
            return Err(ConfigError::ValidationError(format!(
                "normalizer.error_threshold must be within [0, 1], got {}",
                self.normalizer.error_threshold
            )));
        }
        if self.validator.cancel_check_interval == 0 || self.validator.progress_log_interval == 0 {
            return Err(ConfigError::ValidationError(
                "validator intervals must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        if self.engine.fs_root.is_relative() {
            self.engine.fs_root = base.join(&self.engine.fs_root);
        }

        if self.engine.report_dir.is_relative() {
            self.engine.report_dir = base.join(&self.engine.report_dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = VouchConfig::default();
        assert_eq!(config.engine.max_simultaneous, 1);
        assert_eq!(config.validator.cancel_check_interval, 10_000);
        assert_eq!(config.validator.progress_log_interval, 1_000_000);
        assert!((config.normalizer.error_threshold - 0.1).abs() < f64::EPSILON);
        assert!(config.normalizer.steps.masking);
        assert!(config.normalizer.steps.duplicates);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_workers() {
        let mut config = VouchConfig::default();
        config.engine.max_simultaneous = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validation_rejects_threshold_out_of_range() {
        let mut config = VouchConfig::default();
        config.normalizer.error_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = VouchConfig::default();
        let rendered = config.to_toml().expect("render");
        let parsed: VouchConfig = toml::from_str(&rendered).expect("parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_from_file_partial() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[normalizer]\nmarking_only = true\n[normalizer.steps]\nduplicates = false\n",
        )
        .expect("write");

        let config = VouchConfig::from_file(&path).expect("load");
        assert!(config.normalizer.marking_only);
        assert!(!config.normalizer.steps.duplicates);
        assert!(config.normalizer.steps.masking);
    }

    #[test]
    fn test_from_file_missing() {
        let result = VouchConfig::from_file("/nonexistent/vouch.toml");
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_path_resolution() {
        let mut config = VouchConfig::default();
        config.resolve_paths("/srv/vouch");

        assert_eq!(
            config.engine.fs_root,
            PathBuf::from("/srv/vouch/data/submissions")
        );
        assert_eq!(
            config.engine.report_dir,
            PathBuf::from("/srv/vouch/data/reports")
        );
    }
}
